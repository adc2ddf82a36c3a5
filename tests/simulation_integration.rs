//! End-to-end simulation behavior

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use wator::agent::{step_agent_at, Action, Agent, BehaviorRules, StepOutcome};
use wator::core::types::{AgentId, CellState, Direction, Kind, Position};
use wator::simulation::{PopulationCounters, SchedulerMode, Simulation, WorkerPlan};
use wator::world::Grid;
use wator::WatorConfig;

fn adjacent(grid: &Grid, a: Position, b: Position) -> bool {
    Direction::ALL.iter().any(|&d| grid.neighbor_of(a, d) == b)
}

fn busy_config() -> WatorConfig {
    WatorConfig {
        width: 40,
        height: 48,
        initial_prey: 300,
        initial_predators: 120,
        prey_breed_threshold: 3,
        predator_breed_threshold: 6,
        predator_starve_threshold: 4,
        worker_factor: 2,
        seed: Some(1234),
        halt_on_extinction: true,
    }
}

#[test]
fn test_lone_prey_breeds_on_third_round() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut grid = Grid::new(10, 10).unwrap();
    let parent = grid.spawn(Position::new(0, 0), Kind::Prey, &mut rng).unwrap();

    let config = WatorConfig {
        width: 10,
        height: 10,
        initial_prey: 1,
        initial_predators: 0,
        prey_breed_threshold: 2,
        ..WatorConfig::default()
    };
    let mut sim = Simulation::from_grid(config, grid, SchedulerMode::Phased).unwrap();

    // Ages 1 and 2 are not above the threshold: the prey only moves
    assert_eq!(sim.step().unwrap().prey, 1);
    assert_eq!(sim.step().unwrap().prey, 1);

    // Age 3 breeds
    let summary = sim.step().unwrap();
    assert_eq!(summary.round, 3);
    assert_eq!(summary.prey, 2);
    assert_eq!(summary.predators, 0);

    let agents = sim.agents();
    assert_eq!(agents.len(), 2);
    let parent = agents.iter().find(|a| a.id == parent).unwrap();
    let child = agents.iter().find(|a| a.id != parent.id).unwrap();
    assert_eq!(parent.age, 3);
    assert_eq!(child.age, 0);
    assert_eq!(child.born_round, 3);
    assert!(adjacent(sim.grid(), parent.position, child.position));

    // The parent wandered at most two cells away from the origin
    let wrap = |d: usize| d.min(10 - d);
    assert!(wrap(parent.position.x) + wrap(parent.position.y) <= 2);

    sim.shutdown();
}

#[test]
fn test_counters_match_grid_scan_every_round() {
    let mut sim = Simulation::new(busy_config())
        .unwrap()
        .with_plan(WorkerPlan::new(48, 4, 2))
        .unwrap();
    assert_eq!(sim.plan().per_phase(), 4);

    for _ in 0..30 {
        let summary = sim.step().unwrap();
        let census = sim.census();
        assert_eq!(summary.prey, census.prey);
        assert_eq!(summary.predators, census.predators);
        assert_eq!(sim.counters().total(), census.occupied());
    }
    sim.shutdown();
}

#[test]
fn test_every_agent_steps_once_per_round() {
    let mut sim = Simulation::new(busy_config())
        .unwrap()
        .with_plan(WorkerPlan::new(48, 4, 2))
        .unwrap();

    for _ in 0..20 {
        sim.step().unwrap();
        let round = sim.round();
        for agent in sim.agents() {
            // Age counts steps independently of the moved flag
            assert_eq!(
                u64::from(agent.age),
                round - agent.born_round,
                "agent {:?} stepped the wrong number of times",
                agent.id
            );
        }
        assert!(sim.grid().cells().iter().all(|cell| !cell.is_moved()));
    }
    sim.shutdown();
}

#[test]
fn test_breeding_fills_exactly_the_free_neighbor() {
    let mut grid = Grid::new(3, 3).unwrap();
    let centre = Position::new(1, 1);
    grid.place(centre, Agent::new(AgentId(0), Kind::Predator, 0, 3).with_age(9))
        .unwrap();
    // Block every neighbor but the one below with predators
    for (i, pos) in [Position::new(1, 0), Position::new(0, 1), Position::new(2, 1)]
        .into_iter()
        .enumerate()
    {
        grid.place(pos, Agent::new(AgentId(i as u64 + 1), Kind::Predator, 0, 3))
            .unwrap();
    }
    let counters = PopulationCounters::from_census(grid.census());
    let rules = BehaviorRules {
        prey_breed_threshold: 20,
        predator_breed_threshold: 5,
        predator_starve_threshold: 20,
    };

    let outcome = step_agent_at(&mut grid, &counters, &rules, 1, centre);
    assert_eq!(
        outcome,
        Some(StepOutcome::Acted { ate: false, action: Action::Bred, at: centre })
    );
    assert_eq!(counters.predators(), 5);
    assert_eq!(grid.state_at(Position::new(1, 2)), CellState::Predator);
    assert_eq!(grid.census().predators, 5);
}

#[test]
fn test_starving_predator_leaves_an_empty_cell() {
    let mut grid = Grid::new(6, 6).unwrap();
    let spot = Position::new(4, 5);
    grid.place(spot, Agent::new(AgentId(7), Kind::Predator, 0, 1).with_hunger(10))
        .unwrap();
    grid.place(Position::new(0, 0), Agent::new(AgentId(8), Kind::Prey, 0, 1))
        .unwrap();
    let counters = PopulationCounters::from_census(grid.census());
    let rules = BehaviorRules {
        prey_breed_threshold: 20,
        predator_breed_threshold: 20,
        predator_starve_threshold: 10,
    };

    assert_eq!(
        step_agent_at(&mut grid, &counters, &rules, 1, spot),
        Some(StepOutcome::Starved)
    );
    assert_eq!(counters.predators(), 0);
    assert_eq!(counters.prey(), 1);
    assert_eq!(grid.state_at(spot), CellState::Water);
    assert!(grid.records().iter().all(|r| r.id != AgentId(7)));
}

#[test]
fn test_snapshot_classifies_every_cell() {
    let mut sim = Simulation::new(busy_config()).unwrap();
    sim.run(5).unwrap();

    let census = sim.census();
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.round(), 5);
    assert_eq!(snapshot.len(), 40 * 48);
    assert_eq!(snapshot.count(CellState::Prey), census.prey);
    assert_eq!(snapshot.count(CellState::Predator), census.predators);

    let visited = snapshot.into_iter().count();
    assert_eq!(visited, 40 * 48);
    sim.shutdown();
}

#[test]
fn test_seeded_reference_runs_repeat() {
    let run = || {
        let mut sim = Simulation::with_mode(busy_config(), SchedulerMode::Sequential).unwrap();
        sim.run(15).unwrap();
        sim.snapshot()
    };
    let first = run();
    let second = run();
    assert!(first.same_layout(&second));
}

#[test]
fn test_predators_without_prey_die_out() {
    let config = WatorConfig {
        width: 20,
        height: 20,
        initial_prey: 0,
        initial_predators: 30,
        predator_breed_threshold: 100,
        predator_starve_threshold: 3,
        seed: Some(5),
        ..WatorConfig::default()
    };
    let mut sim = Simulation::new(config).unwrap();

    let summaries = sim.run(4).unwrap();
    assert_eq!(summaries[2].predators, 30);
    assert_eq!(summaries[3].predators, 0);
    assert_eq!(sim.census().occupied(), 0);
    sim.shutdown();
}
