//! World configuration with documented defaults
//!
//! A `WatorConfig` is immutable once a simulation has been built from it.
//! Defaults mirror the settings the historical desktop shell shipped with.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, WatorError};
use crate::core::types::Kind;

/// Configuration for a Wa-Tor world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatorConfig {
    // === WORLD ===
    /// Number of columns (x axis)
    pub width: usize,

    /// Number of rows (y axis)
    ///
    /// Rows are what the scheduler partitions across workers, so tall
    /// worlds parallelize better than wide ones.
    pub height: usize,

    // === POPULATION ===
    /// Prey placed at world initialization
    pub initial_prey: usize,

    /// Predators placed at world initialization
    pub initial_predators: usize,

    /// A prey older than this many rounds breeds instead of moving
    pub prey_breed_threshold: u32,

    /// A predator older than this many rounds breeds instead of moving
    pub predator_breed_threshold: u32,

    /// A predator starves once its hunger exceeds this many rounds
    pub predator_starve_threshold: u32,

    // === PARALLELIZATION ===
    /// Workers per logical processor before halving
    ///
    /// At 3 on an 8-way machine the pool starts at 24 workers (12 per
    /// phase) and is halved until every worker owns at least four rows.
    pub worker_factor: usize,

    // === RUN CONTROL ===
    /// Seed for world placement and agent random streams (`None` = entropy)
    pub seed: Option<u64>,

    /// Stop issuing rounds once both populations are extinct
    pub halt_on_extinction: bool,
}

impl Default for WatorConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,

            initial_prey: 100,
            initial_predators: 80,
            prey_breed_threshold: 20,
            predator_breed_threshold: 30,
            predator_starve_threshold: 50,

            worker_factor: 3,

            seed: None,
            halt_on_extinction: true,
        }
    }
}

impl WatorConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a config from a TOML file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject worlds without cells
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WatorError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Total number of cells in the world
    pub fn capacity(&self) -> usize {
        self.width * self.height
    }

    /// Caller-side guard for initial placement.
    ///
    /// Placement samples random cells until it hits a free one, so it only
    /// terminates while at least one cell stays free. Grid construction does
    /// not check this; shells must call it first.
    pub fn check_capacity(&self) -> Result<()> {
        let requested = self.initial_prey + self.initial_predators;
        let capacity = self.capacity();
        if requested >= capacity {
            return Err(WatorError::PopulationExceedsCapacity { requested, capacity });
        }
        Ok(())
    }

    /// Breed threshold for the given kind
    pub fn breed_threshold(&self, kind: Kind) -> u32 {
        match kind {
            Kind::Prey => self.prey_breed_threshold,
            Kind::Predator => self.predator_breed_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WatorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.check_capacity().is_ok());
        assert_eq!(config.worker_factor, 3);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = WatorConfig { width: 0, ..WatorConfig::default() };
        assert!(matches!(
            config.validate(),
            Err(WatorError::InvalidDimensions { width: 0, .. })
        ));

        let config = WatorConfig { height: 0, ..WatorConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capacity_check() {
        let config = WatorConfig {
            width: 4,
            height: 4,
            initial_prey: 10,
            initial_predators: 6,
            ..WatorConfig::default()
        };
        assert!(matches!(
            config.check_capacity(),
            Err(WatorError::PopulationExceedsCapacity { requested: 16, capacity: 16 })
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WatorConfig::from_toml_str("width = 64\nheight = 32\nseed = 7\n").unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 32);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.initial_prey, 100);
    }

    #[test]
    fn test_negative_dimension_is_parse_error() {
        let result = WatorConfig::from_toml_str("width = -3\n");
        assert!(matches!(result, Err(WatorError::ConfigParse(_))));
    }

    #[test]
    fn test_breed_threshold_by_kind() {
        let config = WatorConfig::default();
        assert_eq!(config.breed_threshold(Kind::Prey), 20);
        assert_eq!(config.breed_threshold(Kind::Predator), 30);
    }
}
