use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use swarmsim_core::{AgentData, AgentKind, Position, SwarmConfig, SwarmWorld, Velocity};

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for &agents in &[50_usize, 500, 2000] {
        group.bench_function(format!("steps64_agents{agents}"), |b| {
            b.iter_batched(
                || {
                    let config = SwarmConfig {
                        rng_seed: Some(0xBEEF),
                        history_capacity: 1,
                        ..SwarmConfig::default()
                    };
                    let mut world = SwarmWorld::new(config).expect("world");
                    for seed in 0..agents {
                        // Deterministic scatter so neighbor density is stable
                        // across runs without pulling in the world RNG.
                        let x = (seed % 400) as f64 - 200.0;
                        let y = ((seed * 37) % 400) as f64 - 200.0;
                        let kind = if seed % 2 == 0 {
                            AgentKind::SpeciesA
                        } else {
                            AgentKind::SpeciesB
                        };
                        world.spawn_agent(AgentData::new(
                            Position::new(x, y),
                            Velocity::ZERO,
                            kind,
                            5.0,
                            1_000.0,
                        ));
                    }
                    world
                },
                |mut world| {
                    for _ in 0..64 {
                        world.step();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
