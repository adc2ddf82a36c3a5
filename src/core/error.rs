use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatorError {
    #[error("Invalid world dimensions: {width}x{height} (both must be > 0)")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Initial population {requested} does not fit into {capacity} cells")]
    PopulationExceedsCapacity { requested: usize, capacity: usize },

    #[error("Position ({x}, {y}) is outside the world")]
    OutOfBounds { x: usize, y: usize },

    #[error("Cell ({x}, {y}) is already occupied")]
    CellOccupied { x: usize, y: usize },

    #[error("Worker plan covers {plan} rows but the world has {grid}")]
    PlanMismatch { plan: usize, grid: usize },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Simulation control thread panicked")]
    ControlThreadPanicked,

    #[error("Round cancelled before completion")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WatorError>;
