use swarmsim_core::{AgentKind, SwarmConfig, SwarmWorld, Tick};

fn seeded_config(seed: u64) -> SwarmConfig {
    SwarmConfig {
        species_a_count: 10,
        species_b_count: 10,
        food_source_count: 3,
        rng_seed: Some(seed),
        history_capacity: 128,
        ..SwarmConfig::default()
    }
}

#[test]
fn populations_stay_inside_the_arena() {
    let config = seeded_config(41);
    let half_extent = config.arena_half_extent;
    let mut world = SwarmWorld::new(config).expect("world");
    world.seed_population();

    for _ in 0..200 {
        world.step();
        for agent in world.agents().rows() {
            assert!(
                agent.position.x.abs() <= half_extent && agent.position.y.abs() <= half_extent,
                "agent escaped the arena at ({}, {})",
                agent.position.x,
                agent.position.y
            );
        }
    }
}

#[test]
fn food_sources_survive_the_whole_run() {
    let mut world = SwarmWorld::new(seeded_config(42)).expect("world");
    world.seed_population();
    let food_before = world.food_snapshots();
    assert_eq!(food_before.len(), 3);

    for _ in 0..150 {
        world.step();
    }

    let food_after = world.food_snapshots();
    assert_eq!(food_after.len(), 3);
    for (before, after) in food_before.iter().zip(&food_after) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.data.position, after.data.position);
        assert_eq!(before.data.energy, after.data.energy);
    }
}

#[test]
fn starved_agents_leave_the_live_set() {
    // Aggressive drain so deaths actually occur within the run.
    let config = SwarmConfig {
        base_decay: 2.5,
        starting_energy: (20.0, 40.0),
        ..seeded_config(43)
    };
    let mut world = SwarmWorld::new(config).expect("world");
    world.seed_population();
    let initial_mobile = world.mobile_count();

    let mut all_starved = Vec::new();
    for _ in 0..60 {
        let events = world.step();
        for id in &events.starved {
            assert!(
                !world.agents().contains(*id),
                "starved agent still present after cull"
            );
        }
        all_starved.extend(events.starved);
    }

    assert!(!all_starved.is_empty(), "drain should have starved someone");
    assert_eq!(world.mobile_count(), initial_mobile - all_starved.len());
    assert_eq!(world.alive_count(Some(AgentKind::FoodSource)), 3);
}

#[test]
fn lockstep_worlds_agree_tick_for_tick() {
    let mut left = SwarmWorld::new(seeded_config(44)).expect("world");
    let mut right = SwarmWorld::new(seeded_config(44)).expect("world");
    left.seed_population();
    right.seed_population();

    for _ in 0..80 {
        let left_events = left.step();
        let right_events = right.step();
        assert_eq!(left_events, right_events);
        assert_eq!(left.agents().rows(), right.agents().rows());
    }
    assert_eq!(left.tick(), Tick(80));
}

#[test]
fn history_matches_live_counts() {
    let mut world = SwarmWorld::new(seeded_config(45)).expect("world");
    world.seed_population();
    for _ in 0..30 {
        world.step();
    }
    let last = world.history().last().expect("summary recorded");
    assert_eq!(last.tick, Tick(30));
    assert_eq!(last.mobile_count, world.mobile_count());
    assert_eq!(last.mobile_count, world.mobile_snapshots().len());
    assert_eq!(last.food_count, world.alive_count(Some(AgentKind::FoodSource)));
    assert_eq!(world.history().count(), 30);
}
