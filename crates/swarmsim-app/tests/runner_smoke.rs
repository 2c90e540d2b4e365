use std::time::Duration;

use swarmsim_app::{RunOptions, run, run_for_ticks};
use swarmsim_core::{SwarmConfig, SwarmWorld};

fn seeded_world(seed: u64) -> SwarmWorld {
    let config = SwarmConfig {
        species_a_count: 6,
        species_b_count: 6,
        food_source_count: 2,
        rng_seed: Some(seed),
        ..SwarmConfig::default()
    };
    let mut world = SwarmWorld::new(config).expect("world");
    world.seed_population();
    world
}

#[test]
fn fixed_tick_runs_are_reproducible() {
    let first = run_for_ticks(&mut seeded_world(7), 120, 0);
    let second = run_for_ticks(&mut seeded_world(7), 120, 0);
    assert_eq!(first, second);
    assert_eq!(first.ticks, 120);
    assert_eq!(first.food_sources, 2);
}

#[test]
fn extinct_population_stops_the_run_early() {
    let config = SwarmConfig {
        species_a_count: 3,
        species_b_count: 0,
        food_source_count: 0,
        starting_energy: (1.0, 1.0),
        base_decay: 1.0,
        rng_seed: Some(8),
        ..SwarmConfig::default()
    };
    let mut world = SwarmWorld::new(config).expect("world");
    world.seed_population();

    let report = run_for_ticks(&mut world, 500, 0);
    assert!(report.ticks < 500, "run should stop once everyone starved");
    assert_eq!(report.species_a, 0);
    assert_eq!(report.deaths, 3);
}

#[test]
fn zero_duration_run_returns_immediately() {
    let mut world = seeded_world(9);
    let options = RunOptions {
        duration: Duration::ZERO,
        ..RunOptions::default()
    };
    let report = run(&mut world, &options);
    assert_eq!(report.ticks, 0);
    assert_eq!(report.species_a + report.species_b, 12);
}
