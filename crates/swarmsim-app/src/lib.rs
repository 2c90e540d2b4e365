//! Shared plumbing for the headless swarm runner: the wall-clock tick
//! scheduler and the run loop.

use std::thread;
use std::time::{Duration, Instant};

use swarmsim_core::{AgentKind, SwarmWorld, TickEvents};
use tracing::{debug, info};

/// Upper bound on simulation steps executed per clock poll, so a stalled
/// process catches up gradually instead of spiraling.
const MAX_STEPS_PER_POLL: usize = 8;

/// Longest nap between clock polls.
const MAX_POLL_NAP: Duration = Duration::from_millis(5);

/// Fixed-timestep scheduler translating wall-clock progress into owed
/// simulation steps. Rendering frame rate (when a renderer exists) never
/// feeds back into this: ticks are owed purely by elapsed time.
#[derive(Debug)]
pub struct SimulationClock {
    tick_interval: Duration,
    accumulator: f64,
    last_poll: Instant,
}

impl SimulationClock {
    /// Create a clock that owes one step per `tick_interval` of elapsed
    /// time, starting from `start`.
    #[must_use]
    pub fn new(tick_interval: Duration, start: Instant) -> Self {
        Self {
            tick_interval,
            accumulator: 0.0,
            last_poll: start,
        }
    }

    /// Number of simulation steps owed since the previous poll, capped at
    /// [`MAX_STEPS_PER_POLL`]. Excess backlog beyond the cap is discarded.
    pub fn owed_steps(&mut self, now: Instant) -> usize {
        let delta = now.saturating_duration_since(self.last_poll);
        self.last_poll = now;

        let step = self.tick_interval.as_secs_f64();
        if step <= 0.0 {
            return 0;
        }
        self.accumulator += delta.as_secs_f64();
        let cap = step * MAX_STEPS_PER_POLL as f64;
        if self.accumulator > cap {
            self.accumulator = cap;
        }
        let steps = (self.accumulator / step).floor() as usize;
        let steps = steps.min(MAX_STEPS_PER_POLL);
        self.accumulator -= step * steps as f64;
        steps
    }
}

/// Options controlling a timed run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wall-clock budget for the whole run.
    pub duration: Duration,
    /// Time quantum between simulation ticks.
    pub tick_interval: Duration,
    /// Ticks between logged summaries; zero disables summaries.
    pub summary_interval: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(20),
            tick_interval: Duration::from_secs_f64(1.0 / 24.0),
            summary_interval: 24,
        }
    }
}

/// Final accounting for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    pub species_a: usize,
    pub species_b: usize,
    pub food_sources: usize,
    pub feedings: u64,
    pub deaths: u64,
}

impl RunReport {
    fn capture(world: &SwarmWorld, ticks: u64, feedings: u64, deaths: u64) -> Self {
        Self {
            ticks,
            species_a: world.alive_count(Some(AgentKind::SpeciesA)),
            species_b: world.alive_count(Some(AgentKind::SpeciesB)),
            food_sources: world.alive_count(Some(AgentKind::FoodSource)),
            feedings,
            deaths,
        }
    }
}

/// Drive the world against wall-clock time until the duration elapses or
/// every mobile agent has starved. Sleeping between clock polls is the
/// only blocking point; each `step()` runs to completion before the next.
pub fn run(world: &mut SwarmWorld, options: &RunOptions) -> RunReport {
    let start = Instant::now();
    let mut clock = SimulationClock::new(options.tick_interval, start);
    let nap = options.tick_interval.min(MAX_POLL_NAP);
    let mut ticks = 0u64;
    let mut feedings = 0u64;
    let mut deaths = 0u64;

    while start.elapsed() < options.duration && world.mobile_count() > 0 {
        let owed = clock.owed_steps(Instant::now());
        for _ in 0..owed {
            let events = world.step();
            ticks = events.tick.0;
            feedings += events.fed.len() as u64;
            deaths += events.starved.len() as u64;
            log_transitions(&events);
            maybe_log_summary(world, options.summary_interval, events.tick.0);
            if world.mobile_count() == 0 {
                break;
            }
        }
        thread::sleep(nap);
    }

    RunReport::capture(world, ticks, feedings, deaths)
}

/// Run exactly `max_ticks` steps as fast as possible, ignoring wall-clock
/// pacing. Stops early when every mobile agent has starved.
pub fn run_for_ticks(world: &mut SwarmWorld, max_ticks: u64, summary_interval: u64) -> RunReport {
    let mut ticks = 0u64;
    let mut feedings = 0u64;
    let mut deaths = 0u64;
    for _ in 0..max_ticks {
        if world.mobile_count() == 0 {
            break;
        }
        let events = world.step();
        ticks = events.tick.0;
        feedings += events.fed.len() as u64;
        deaths += events.starved.len() as u64;
        log_transitions(&events);
        maybe_log_summary(world, summary_interval, events.tick.0);
    }
    RunReport::capture(world, ticks, feedings, deaths)
}

fn log_transitions(events: &TickEvents) {
    for id in &events.fed {
        debug!(tick = events.tick.0, ?id, "agent fed");
    }
    for id in &events.newly_distressed {
        debug!(tick = events.tick.0, ?id, "agent distressed");
    }
    for id in &events.starved {
        debug!(tick = events.tick.0, ?id, "agent starved");
    }
}

fn maybe_log_summary(world: &SwarmWorld, summary_interval: u64, tick: u64) {
    if summary_interval == 0 || !tick.is_multiple_of(summary_interval) {
        return;
    }
    if let Some(summary) = world.history().last() {
        info!(
            tick = summary.tick.0,
            mobile = summary.mobile_count,
            food = summary.food_count,
            avg_energy = summary.average_energy,
            feedings = summary.feedings,
            deaths = summary.deaths,
            "tick summary",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_owes_steps_as_time_elapses() {
        let start = Instant::now();
        // Quarter-second quantum keeps the arithmetic exact in f64.
        let mut clock = SimulationClock::new(Duration::from_millis(250), start);
        assert_eq!(clock.owed_steps(start), 0);
        assert_eq!(clock.owed_steps(start + Duration::from_millis(500)), 2);
        assert_eq!(clock.owed_steps(start + Duration::from_millis(875)), 1);
        assert_eq!(clock.owed_steps(start + Duration::from_millis(1000)), 1);
    }

    #[test]
    fn clock_clamps_runaway_backlog() {
        let start = Instant::now();
        let mut clock = SimulationClock::new(Duration::from_millis(250), start);
        let owed = clock.owed_steps(start + Duration::from_secs(120));
        assert_eq!(owed, MAX_STEPS_PER_POLL);
        // Backlog beyond the cap was discarded, not deferred.
        assert_eq!(clock.owed_steps(start + Duration::from_secs(120)), 0);
    }

    #[test]
    fn clock_ignores_non_monotonic_polls() {
        let start = Instant::now();
        let mut clock = SimulationClock::new(Duration::from_millis(250), start);
        assert_eq!(clock.owed_steps(start + Duration::from_millis(500)), 2);
        // A poll that does not advance owes nothing.
        assert_eq!(clock.owed_steps(start), 0);
    }
}
