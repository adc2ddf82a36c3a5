//! Toroidal world grid
//!
//! Cells are stored row-major. Every cell knows the indices of its four
//! neighbors, wrapping on both axes, so agents never do edge arithmetic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::MutexGuard;

use rand::Rng;
use rayon::prelude::*;

use crate::agent::{Agent, AgentRecord};
use crate::core::config::WatorConfig;
use crate::core::error::{Result, WatorError};
use crate::core::types::{AgentId, CellState, Direction, Kind, Position, Round};
use crate::world::cell::Cell;
use crate::world::seam::SeamLocks;
use crate::world::snapshot::Snapshot;

/// Cells above which classification fans out across rayon
const PARALLEL_CLASSIFY_THRESHOLD: usize = 64 * 1024;

/// Live agent totals from a full grid scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    pub prey: usize,
    pub predators: usize,
}

impl Census {
    pub fn occupied(&self) -> usize {
        self.prey + self.predators
    }
}

pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    seam: SeamLocks,
    next_id: AtomicU64,
}

impl Grid {
    /// Empty torus of `width` x `height` cells
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(WatorError::InvalidDimensions { width, height });
        }

        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let left = (x + width - 1) % width;
                let right = (x + 1) % width;
                let up = (y + height - 1) % height;
                let down = (y + 1) % height;

                let mut neighbors = [0; 4];
                neighbors[Direction::Up.index()] = up * width + x;
                neighbors[Direction::Down.index()] = down * width + x;
                neighbors[Direction::Left.index()] = y * width + left;
                neighbors[Direction::Right.index()] = y * width + right;

                cells.push(Cell::new(Position::new(x, y), neighbors));
            }
        }

        Ok(Self {
            width,
            height,
            cells,
            seam: SeamLocks::for_grid(width, height),
            next_id: AtomicU64::new(0),
        })
    }

    /// Allocate the world and scatter the initial population.
    ///
    /// Caller obligation: the population must leave at least one free cell
    /// (see [`WatorConfig::check_capacity`]); placement retries random cells
    /// until it finds a free one and is not bounded otherwise.
    pub fn initialize<R: Rng + ?Sized>(config: &WatorConfig, rng: &mut R) -> Result<Self> {
        let mut grid = Self::new(config.width, config.height)?;
        grid.populate(config.initial_prey, config.initial_predators, rng);
        Ok(grid)
    }

    /// Rejection-sample free cells, alternating prey and predators
    pub fn populate<R: Rng + ?Sized>(&mut self, prey: usize, predators: usize, rng: &mut R) {
        let (mut prey, mut predators) = (prey, predators);
        while prey + predators > 0 {
            if prey > 0 {
                let index = self.random_free_index(rng);
                self.place_new(index, Kind::Prey, rng);
                prey -= 1;
            }
            if predators > 0 {
                let index = self.random_free_index(rng);
                self.place_new(index, Kind::Predator, rng);
                predators -= 1;
            }
        }
    }

    fn random_free_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        loop {
            let x = rng.gen_range(0..self.width);
            let y = rng.gen_range(0..self.height);
            let index = y * self.width + x;
            if self.cells[index].is_free() {
                return index;
            }
        }
    }

    fn place_new<R: Rng + ?Sized>(&mut self, index: usize, kind: Kind, rng: &mut R) -> AgentId {
        let id = self.allocate_id();
        let agent = Agent::new(id, kind, 0, rng.gen());
        self.cells[index].insert(agent, false);
        id
    }

    /// Place a fresh agent of `kind` at `position`
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        position: Position,
        kind: Kind,
        rng: &mut R,
    ) -> Result<AgentId> {
        let index = self.checked_free_index(position)?;
        Ok(self.place_new(index, kind, rng))
    }

    /// Place a prepared agent at `position`
    pub fn place(&mut self, position: Position, agent: Agent) -> Result<()> {
        let index = self.checked_free_index(position)?;
        self.cells[index].insert(agent, false);
        Ok(())
    }

    fn checked_free_index(&self, position: Position) -> Result<usize> {
        let index = self.try_index(position).ok_or(WatorError::OutOfBounds {
            x: position.x,
            y: position.y,
        })?;
        if !self.cells[index].is_free() {
            return Err(WatorError::CellOccupied { x: position.x, y: position.y });
        }
        Ok(index)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn index(&self, position: Position) -> usize {
        position.y * self.width + position.x
    }

    pub fn try_index(&self, position: Position) -> Option<usize> {
        (position.x < self.width && position.y < self.height).then(|| self.index(position))
    }

    #[inline]
    pub fn position(&self, index: usize) -> Position {
        Position::new(index % self.width, index / self.width)
    }

    #[inline]
    pub fn cell(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    pub fn cell_at(&self, position: Position) -> Option<&Cell> {
        self.try_index(position).map(|index| &self.cells[index])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn neighbor(&self, index: usize, direction: Direction) -> usize {
        self.cells[index].neighbor(direction)
    }

    pub fn neighbor_of(&self, position: Position, direction: Direction) -> Position {
        self.position(self.neighbor(self.index(position), direction))
    }

    pub fn state_at(&self, position: Position) -> CellState {
        self.cell_at(position).map(Cell::state).unwrap_or(CellState::Water)
    }

    /// Whether moving from `index` in `direction` wraps between the last
    /// and first rows
    pub fn crosses_seam(&self, index: usize, direction: Direction) -> bool {
        let row = index / self.width;
        match direction {
            Direction::Up => row == 0,
            Direction::Down => row == self.height - 1,
            Direction::Left | Direction::Right => false,
        }
    }

    /// Lock the neighbor of `index` in `direction` if the move crosses the seam
    pub(crate) fn seam_guard(
        &self,
        index: usize,
        direction: Direction,
    ) -> Option<MutexGuard<'_, ()>> {
        if !self.crosses_seam(index, direction) {
            return None;
        }
        let target = self.neighbor(index, direction);
        tracing::trace!(from = index, to = target, "seam lock");
        self.seam.guard(target)
    }

    pub fn seam_locks(&self) -> &SeamLocks {
        &self.seam
    }

    pub(crate) fn allocate_id(&self) -> AgentId {
        AgentId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Clear every occupant's moved flag.
    ///
    /// Runs between rounds while no worker is inside a phase.
    pub fn finish_round(&self) {
        for cell in &self.cells {
            cell.clear_moved();
        }
    }

    /// Classify every cell as water, prey or predator
    pub fn classify(&self, round: Round) -> Snapshot {
        let cells: Vec<CellState> = if self.cells.len() >= PARALLEL_CLASSIFY_THRESHOLD {
            self.cells.par_iter().map(Cell::state).collect()
        } else {
            self.cells.iter().map(Cell::state).collect()
        };
        Snapshot::new(round, self.width, self.height, cells)
    }

    /// Count occupants by kind
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for cell in &self.cells {
            match cell.state() {
                CellState::Prey => census.prey += 1,
                CellState::Predator => census.predators += 1,
                CellState::Water => {}
            }
        }
        census
    }

    /// Agent at `position` through exclusive access
    pub fn agent_mut(&mut self, position: Position) -> Option<&mut Agent> {
        let index = self.try_index(position)?;
        self.cells[index].agent_mut()
    }

    /// Records for every agent, row-major
    ///
    /// # Safety
    /// No thread may be writing agent payloads during the call.
    pub(crate) unsafe fn agent_records(&self) -> Vec<AgentRecord> {
        self.cells
            .iter()
            .filter_map(|cell| cell.peek().map(|agent| agent.record(cell.position())))
            .collect()
    }

    /// Records for every agent through exclusive access
    pub fn records(&mut self) -> Vec<AgentRecord> {
        // SAFETY: `&mut self` rules out concurrent writers.
        unsafe { self.agent_records() }
    }
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("census", &self.census())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(Grid::new(0, 5), Err(WatorError::InvalidDimensions { .. })));
        assert!(matches!(Grid::new(5, 0), Err(WatorError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_corner_neighbors_wrap() {
        let grid = Grid::new(4, 3).unwrap();
        let origin = Position::new(0, 0);
        assert_eq!(grid.neighbor_of(origin, Direction::Up), Position::new(0, 2));
        assert_eq!(grid.neighbor_of(origin, Direction::Left), Position::new(3, 0));
        assert_eq!(grid.neighbor_of(origin, Direction::Down), Position::new(0, 1));
        assert_eq!(grid.neighbor_of(origin, Direction::Right), Position::new(1, 0));

        let corner = Position::new(3, 2);
        assert_eq!(grid.neighbor_of(corner, Direction::Down), Position::new(3, 0));
        assert_eq!(grid.neighbor_of(corner, Direction::Right), Position::new(0, 2));
    }

    #[test]
    fn test_initialize_places_exact_population() {
        let config = WatorConfig {
            width: 20,
            height: 10,
            initial_prey: 37,
            initial_predators: 12,
            ..WatorConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let grid = Grid::initialize(&config, &mut rng).unwrap();
        assert_eq!(grid.census(), Census { prey: 37, predators: 12 });
    }

    #[test]
    fn test_fill_all_but_one_cell() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut grid = Grid::new(3, 3).unwrap();
        grid.populate(5, 3, &mut rng);
        assert_eq!(grid.census().occupied(), 8);
    }

    #[test]
    fn test_spawn_rejects_occupied_and_out_of_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut grid = Grid::new(3, 3).unwrap();
        grid.spawn(Position::new(1, 1), Kind::Prey, &mut rng).unwrap();

        assert!(matches!(
            grid.spawn(Position::new(1, 1), Kind::Predator, &mut rng),
            Err(WatorError::CellOccupied { x: 1, y: 1 })
        ));
        assert!(matches!(
            grid.spawn(Position::new(3, 0), Kind::Prey, &mut rng),
            Err(WatorError::OutOfBounds { x: 3, y: 0 })
        ));
    }

    #[test]
    fn test_finish_round_clears_moved_flags() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut grid = Grid::new(4, 4).unwrap();
        grid.populate(6, 2, &mut rng);
        for cell in grid.cells() {
            cell.mark_moved();
        }
        assert!(grid.cells().iter().all(|c| !c.awaits_step()));

        grid.finish_round();
        let waiting = grid.cells().iter().filter(|c| c.awaits_step()).count();
        assert_eq!(waiting, 8);
        assert_eq!(grid.census().occupied(), 8);
    }

    #[test]
    fn test_classify_matches_census() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut grid = Grid::new(16, 8).unwrap();
        grid.populate(20, 10, &mut rng);
        let snapshot = grid.classify(0);
        assert_eq!(snapshot.count(CellState::Prey), 20);
        assert_eq!(snapshot.count(CellState::Predator), 10);
        assert_eq!(snapshot.count(CellState::Water), 16 * 8 - 30);
    }

    #[test]
    fn test_crosses_seam_only_on_vertical_wrap() {
        let grid = Grid::new(3, 4).unwrap();
        let top = grid.index(Position::new(1, 0));
        let bottom = grid.index(Position::new(1, 3));
        let middle = grid.index(Position::new(1, 2));

        assert!(grid.crosses_seam(top, Direction::Up));
        assert!(!grid.crosses_seam(top, Direction::Down));
        assert!(grid.crosses_seam(bottom, Direction::Down));
        assert!(!grid.crosses_seam(bottom, Direction::Left));
        assert!(!grid.crosses_seam(middle, Direction::Down));
        assert!(grid.seam_guard(top, Direction::Up).is_some());
        assert!(grid.seam_guard(middle, Direction::Up).is_none());
    }

    #[test]
    fn test_records_report_positions() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut grid = Grid::new(5, 5).unwrap();
        grid.spawn(Position::new(2, 3), Kind::Predator, &mut rng).unwrap();
        let records = grid.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position, Position::new(2, 3));
        assert_eq!(records[0].kind, Kind::Predator);
        assert_eq!(records[0].hunger, Some(0));
    }
}
