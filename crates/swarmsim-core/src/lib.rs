//! Core types for the swarm simulation: the agent model, the rule engine,
//! and the per-tick update pipeline.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use swarmsim_index::{IndexError, ProximityIndex, SweepWindowIndex};
use thiserror::Error;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Nominal energy assigned to food sources. Never drained; food sources do
/// not participate in the energy lifecycle.
const FOOD_SOURCE_ENERGY: f64 = 1.0;

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Closed set of agent kinds. Interaction rules dispatch on the pair of
/// kinds; food sources never move, never drain, and are never culled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgentKind {
    FoodSource,
    SpeciesA,
    SpeciesB,
}

impl AgentKind {
    /// Whether agents of this kind integrate, steer, and age.
    #[must_use]
    pub const fn is_mobile(self) -> bool {
        !matches!(self, Self::FoodSource)
    }
}

/// Axis-aligned 2D world position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Arena origin.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Per-tick world-space displacement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    /// Zero displacement.
    pub const ZERO: Self = Self { vx: 0.0, vy: 0.0 };

    /// Construct a new velocity vector.
    #[must_use]
    pub const fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    /// Euclidean magnitude.
    #[must_use]
    pub fn speed(self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Unit vector pointing from `from` toward `to`, or `None` when the two
/// points coincide and the direction is undefined.
#[must_use]
pub fn unit_towards(from: Position, to: Position) -> Option<(f64, f64)> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length = dx.hypot(dy);
    if length <= f64::EPSILON {
        return None;
    }
    Some((dx / length, dy / length))
}

/// Scalar fields for a single agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentData {
    pub position: Position,
    pub velocity: Velocity,
    pub kind: AgentKind,
    /// Interaction radius; neighbor and collision thresholds scale with the
    /// larger size of a pair.
    pub size: f64,
    pub energy: f64,
    /// Set while energy sits at or below the configured distress threshold.
    pub distressed: bool,
}

impl AgentData {
    /// Creates a new agent payload with the provided scalar fields.
    #[must_use]
    pub const fn new(
        position: Position,
        velocity: Velocity,
        kind: AgentKind,
        size: f64,
        energy: f64,
    ) -> Self {
        Self {
            position,
            velocity,
            kind,
            size,
            energy,
            distressed: false,
        }
    }

    /// Current speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.speed()
    }

    /// Advance the position by one tick of velocity, bouncing off the arena
    /// walls. A coordinate that lands at or beyond `half_extent` has its
    /// velocity component sign-flipped and is clamped to `inset` units
    /// inside the wall, so the position is always in bounds on return.
    /// No-op for food sources.
    pub fn integrate(&mut self, half_extent: f64, inset: f64) {
        if !self.kind.is_mobile() {
            return;
        }
        self.position.x += self.velocity.vx;
        self.position.y += self.velocity.vy;
        let clamp_to = half_extent - inset;
        if self.position.x >= half_extent {
            self.velocity.vx = -self.velocity.vx;
            self.position.x = clamp_to;
        } else if self.position.x <= -half_extent {
            self.velocity.vx = -self.velocity.vx;
            self.position.x = -clamp_to;
        }
        if self.position.y >= half_extent {
            self.velocity.vy = -self.velocity.vy;
            self.position.y = clamp_to;
        } else if self.position.y <= -half_extent {
            self.velocity.vy = -self.velocity.vy;
            self.position.y = -clamp_to;
        }
    }

    /// Add `scale * direction` to the velocity. Callers must not pass a
    /// zero direction; normalize through [`unit_towards`] first.
    pub fn apply_impulse(&mut self, direction: (f64, f64), scale: f64) {
        self.velocity.vx += scale * direction.0;
        self.velocity.vy += scale * direction.1;
    }

    /// Drain energy by a base cost plus a cost proportional to speed.
    /// No-op for food sources.
    pub fn consume_energy(&mut self, base_cost: f64, speed_cost: f64) {
        if !self.kind.is_mobile() {
            return;
        }
        self.energy -= base_cost + speed_cost * self.speed();
    }

    /// Replenish energy after colliding with a food source.
    pub fn feed(&mut self, gain: f64) {
        self.energy += gain;
    }
}

/// Combined handle and scalar data for read-only consumers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub data: AgentData,
}

/// Dense agent storage addressed by generational handles.
///
/// Rows live in a dense vector for cheap pair iteration; the slot map
/// resolves stable [`AgentId`]s to row indices across removals.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    rows: Vec<AgentData>,
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no agents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over live agent handles in dense row order.
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    /// Dense row slice in iteration order.
    #[must_use]
    pub fn rows(&self) -> &[AgentData] {
        &self.rows
    }

    /// Mutable dense row slice.
    #[must_use]
    pub fn rows_mut(&mut self) -> &mut [AgentData] {
        &mut self.rows
    }

    /// Mutable rows alongside the parallel handle slice, for stages that
    /// mutate agents while recording events against their ids.
    #[must_use]
    pub fn rows_and_handles_mut(&mut self) -> (&mut [AgentData], &[AgentId]) {
        (&mut self.rows, &self.handles)
    }

    /// Returns the dense row index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Returns true if `id` refers to a live agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Borrow the row for `id`.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&AgentData> {
        self.index_of(id).map(|idx| &self.rows[idx])
    }

    /// Mutably borrow the row for `id`.
    #[must_use]
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentData> {
        let idx = self.index_of(id)?;
        Some(&mut self.rows[idx])
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, agent: AgentData) -> AgentId {
        let index = self.rows.len();
        self.rows.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id` returning its scalar data if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<AgentData> {
        let index = self.slots.remove(id)?;
        let removed = self.rows.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        Some(removed)
    }

    /// Remove all agents whose ids are contained in `dead`, preserving the
    /// iteration order of survivors.
    pub fn remove_many(&mut self, dead: &HashSet<AgentId>) -> usize {
        if dead.is_empty() {
            return 0;
        }
        let mut write = 0;
        for read in 0..self.handles.len() {
            let id = self.handles[read];
            if dead.contains(&id) {
                self.slots.remove(id);
                continue;
            }
            if write != read {
                self.handles[write] = id;
                self.rows[write] = self.rows[read];
            }
            if let Some(slot) = self.slots.get_mut(id) {
                *slot = write;
            }
            write += 1;
        }
        let removed = self.handles.len().saturating_sub(write);
        self.handles.truncate(write);
        self.rows.truncate(write);
        removed
    }

    /// Produce a copy of the scalar data for `id`.
    #[must_use]
    pub fn snapshot(&self, id: AgentId) -> Option<AgentData> {
        self.get(id).copied()
    }

    /// Clear all stored agents.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.rows.clear();
    }
}

/// Errors that can occur when constructing a swarm world.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    /// Indicates an unusable proximity index configuration.
    #[error("invalid proximity index configuration: {0}")]
    Index(#[from] IndexError),
}

/// Static configuration for a swarm world. Immutable once the world is
/// constructed; every tunable the rule pipeline reads lives here.
/// Fields omitted from a deserialized overlay fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Initial population of species A.
    pub species_a_count: u32,
    /// Initial population of species B.
    pub species_b_count: u32,
    /// Number of stationary food sources.
    pub food_source_count: u32,
    /// Arena half-extent; positions live in `[-half_extent, half_extent]`.
    pub arena_half_extent: f64,
    /// Distance inside the wall a bounced coordinate is clamped to.
    pub wall_inset: f64,
    /// Same-kind separation impulse on collision.
    pub separation_weight: f64,
    /// Impulse away from the arena origin.
    pub center_avoidance_weight: f64,
    /// Pull toward a same-kind neighbor's velocity, divided by the live
    /// population of that kind.
    pub alignment_weight: f64,
    /// Pull toward the agent's own-kind centroid.
    pub centroid_weight: f64,
    /// Uniform random jitter scale.
    pub jitter_weight: f64,
    /// Repulsion between neighboring agents of different species.
    pub cross_species_weight: f64,
    /// Attraction toward a neighboring food source.
    pub food_weight: f64,
    /// Per-tick multiplicative velocity decay, strictly inside `(0, 1)`.
    pub dampening: f64,
    /// Neighbor threshold is `neighbor_radius_scale * max(size)`.
    pub neighbor_radius_scale: f64,
    /// Collision threshold is `max(size) / collision_radius_divisor`.
    pub collision_radius_divisor: f64,
    /// Interaction radius of mobile agents.
    pub species_size: f64,
    /// Interaction radius of food sources.
    pub food_size: f64,
    /// Initial per-axis velocity is drawn from `[-spawn_speed, spawn_speed]`.
    pub spawn_speed: f64,
    /// Starting energy range `(lo, hi)`; `lo` is used directly when the
    /// range is empty.
    pub starting_energy: (f64, f64),
    /// Flat energy cost per life-tick.
    pub base_decay: f64,
    /// Additional energy cost per unit of speed per tick.
    pub speed_decay: f64,
    /// Energy gained when colliding with a food source.
    pub feed_gain: f64,
    /// Energy at or below this level marks an agent distressed.
    pub distress_threshold: f64,
    /// Sweep window size for the proximity index.
    pub index_window: usize,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            species_a_count: 20,
            species_b_count: 20,
            food_source_count: 3,
            arena_half_extent: 250.0,
            wall_inset: 10.0,
            separation_weight: 0.05,
            center_avoidance_weight: 0.01,
            alignment_weight: 0.4,
            centroid_weight: 0.02,
            jitter_weight: 0.1,
            cross_species_weight: 0.05,
            food_weight: 0.08,
            dampening: 0.95,
            neighbor_radius_scale: 1.5,
            collision_radius_divisor: 1.75,
            species_size: 5.0,
            food_size: 8.0,
            spawn_speed: 10.0,
            starting_energy: (80.0, 120.0),
            base_decay: 0.1,
            speed_decay: 0.01,
            feed_gain: 25.0,
            distress_threshold: 20.0,
            index_window: swarmsim_index::DEFAULT_WINDOW,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl SwarmConfig {
    /// Validates the configuration. The simulation never starts from a
    /// partially usable configuration; any violation here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.species_a_count == 0 && self.species_b_count == 0 {
            return Err(ConfigError::Invalid(
                "at least one mobile agent is required",
            ));
        }
        if !(self.arena_half_extent > 0.0) || !self.arena_half_extent.is_finite() {
            return Err(ConfigError::Invalid("arena_half_extent must be positive"));
        }
        if !(self.wall_inset > 0.0) || self.wall_inset >= self.arena_half_extent {
            return Err(ConfigError::Invalid(
                "wall_inset must lie strictly between zero and the half-extent",
            ));
        }
        let weights = [
            self.separation_weight,
            self.center_avoidance_weight,
            self.alignment_weight,
            self.centroid_weight,
            self.jitter_weight,
            self.cross_species_weight,
            self.food_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid(
                "rule weights must be finite and non-negative",
            ));
        }
        if !(self.dampening > 0.0 && self.dampening < 1.0) {
            return Err(ConfigError::Invalid(
                "dampening must lie strictly inside (0, 1)",
            ));
        }
        if !(self.neighbor_radius_scale > 0.0) || !(self.collision_radius_divisor > 0.0) {
            return Err(ConfigError::Invalid(
                "distance multipliers must be positive",
            ));
        }
        if !(self.species_size > 0.0) || !(self.food_size > 0.0) {
            return Err(ConfigError::Invalid("agent sizes must be positive"));
        }
        if !(self.spawn_speed >= 0.0) || !self.spawn_speed.is_finite() {
            return Err(ConfigError::Invalid(
                "spawn_speed must be finite and non-negative",
            ));
        }
        let (lo, hi) = self.starting_energy;
        if !(lo > 0.0) || hi < lo || !hi.is_finite() {
            return Err(ConfigError::Invalid(
                "starting_energy must be a positive, non-inverted range",
            ));
        }
        if self.base_decay < 0.0
            || self.speed_decay < 0.0
            || self.feed_gain < 0.0
            || self.distress_threshold < 0.0
        {
            return Err(ConfigError::Invalid(
                "energy parameters must be non-negative",
            ));
        }
        if self.index_window < 2 {
            return Err(ConfigError::Invalid(
                "index_window must hold at least two entries",
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be non-zero"));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

/// State-transition events emitted after processing a world tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickEvents {
    pub tick: Tick,
    /// Mobile agents that collided with a food source this tick; an agent
    /// appears once per feeding.
    pub fed: Vec<AgentId>,
    /// Agents removed from the live set after their energy reached zero.
    pub starved: Vec<AgentId>,
    /// Agents whose energy first crossed the distress threshold this tick.
    pub newly_distressed: Vec<AgentId>,
}

/// Aggregate counters recorded once per tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub mobile_count: usize,
    pub food_count: usize,
    /// Summed energy of live mobile agents.
    pub total_energy: f64,
    pub average_energy: f64,
    pub feedings: usize,
    pub deaths: usize,
}

/// Payload handed to tick observers; borrows the tick's summary and events.
#[derive(Debug, Clone, Copy)]
pub struct TickReport<'a> {
    pub summary: &'a TickSummary,
    pub events: &'a TickEvents,
}

/// Observer invoked after each tick. Rendering and audio collaborators
/// subscribe here (or poll snapshots); the core never calls into them
/// directly.
pub trait TickObserver: Send {
    fn on_tick(&mut self, report: &TickReport<'_>);
}

/// No-op observer.
#[derive(Debug, Default)]
pub struct NullObserver;

impl TickObserver for NullObserver {
    fn on_tick(&mut self, _report: &TickReport<'_>) {}
}

/// Mean positions of live mobile agents, one per species. A kind with no
/// live members keeps the origin as its defined neutral centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct KindCentroids {
    species_a: Position,
    species_b: Position,
}

impl KindCentroids {
    fn get(self, kind: AgentKind) -> Position {
        match kind {
            AgentKind::SpeciesA => self.species_a,
            AgentKind::SpeciesB => self.species_b,
            AgentKind::FoodSource => Position::ORIGIN,
        }
    }
}

/// Live mobile population per species, sampled at the start of the
/// pairwise stage.
#[derive(Debug, Clone, Copy, Default)]
struct KindCounts {
    species_a: usize,
    species_b: usize,
}

impl KindCounts {
    fn get(self, kind: AgentKind) -> usize {
        match kind {
            AgentKind::SpeciesA => self.species_a,
            AgentKind::SpeciesB => self.species_b,
            AgentKind::FoodSource => 0,
        }
    }
}

fn axis_gaps(a: Position, b: Position) -> (f64, f64) {
    ((a.x - b.x).abs(), (a.y - b.y).abs())
}

/// Component-wise proximity test: both axis gaps within `threshold`.
fn within(a: &AgentData, b: &AgentData, threshold: f64) -> bool {
    let (gx, gy) = axis_gaps(a.position, b.position);
    gx <= threshold && gy <= threshold
}

fn neighboring(a: &AgentData, b: &AgentData, radius_scale: f64) -> bool {
    within(a, b, radius_scale * a.size.max(b.size))
}

fn colliding(a: &AgentData, b: &AgentData, radius_divisor: f64) -> bool {
    within(a, b, a.size.max(b.size) / radius_divisor)
}

/// Pull both velocities toward each other; `weight` is already divided by
/// the kind's live population.
fn align_pair(a: &mut AgentData, b: &mut AgentData, weight: f64) {
    let dvx = b.velocity.vx - a.velocity.vx;
    let dvy = b.velocity.vy - a.velocity.vy;
    a.velocity.vx += dvx * weight;
    a.velocity.vy += dvy * weight;
    b.velocity.vx -= dvx * weight;
    b.velocity.vy -= dvy * weight;
}

/// Push both agents apart along the connecting line. Skipped when the two
/// positions coincide and no direction exists.
fn push_apart(a: &mut AgentData, b: &mut AgentData, weight: f64) {
    let Some(away) = unit_towards(b.position, a.position) else {
        return;
    };
    a.apply_impulse(away, weight);
    b.apply_impulse((-away.0, -away.1), weight);
}

/// Pull a mobile agent toward a food source. Skipped on coincident
/// positions.
fn attract_to_food(mobile: &mut AgentData, food: &AgentData, weight: f64) {
    let Some(toward) = unit_towards(mobile.position, food.position) else {
        return;
    };
    mobile.apply_impulse(toward, weight);
}

/// Disjoint mutable borrows of two dense rows.
fn pair_mut(rows: &mut [AgentData], i: usize, j: usize) -> (&mut AgentData, &mut AgentData) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = rows.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = rows.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

/// Aggregate simulation state: the live agent set, the proximity index,
/// and the bounded history of tick summaries.
///
/// The world exclusively owns the agent collection; only [`SwarmWorld::step`]
/// and the stages it calls mutate velocity, position, or energy in bulk.
pub struct SwarmWorld {
    config: SwarmConfig,
    tick: Tick,
    rng: SmallRng,
    agents: AgentArena,
    index: SweepWindowIndex,
    centroids: KindCentroids,
    scratch_positions: Vec<(f64, f64)>,
    pending_deaths: Vec<AgentId>,
    observer: Box<dyn TickObserver>,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for SwarmWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwarmWorld")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .finish()
    }
}

impl SwarmWorld {
    /// Instantiate an empty world using the supplied configuration.
    pub fn new(config: SwarmConfig) -> Result<Self, ConfigError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Instantiate an empty world with a tick observer attached.
    pub fn with_observer(
        config: SwarmConfig,
        observer: Box<dyn TickObserver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let index = SweepWindowIndex::new(config.index_window)?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        Ok(Self {
            config,
            tick: Tick::zero(),
            rng,
            agents: AgentArena::new(),
            index,
            centroids: KindCentroids::default(),
            scratch_positions: Vec::new(),
            pending_deaths: Vec::new(),
            observer,
            history: VecDeque::with_capacity(history_capacity),
        })
    }

    /// Spawn the initial population described by the configuration: mobile
    /// agents at the origin with randomized velocity and energy, food
    /// sources at random positions inside the walls.
    pub fn seed_population(&mut self) {
        for _ in 0..self.config.species_a_count {
            let agent = self.random_mobile(AgentKind::SpeciesA);
            self.agents.insert(agent);
        }
        for _ in 0..self.config.species_b_count {
            let agent = self.random_mobile(AgentKind::SpeciesB);
            self.agents.insert(agent);
        }
        for _ in 0..self.config.food_source_count {
            let food = self.random_food();
            self.agents.insert(food);
        }
    }

    fn random_mobile(&mut self, kind: AgentKind) -> AgentData {
        let speed = self.config.spawn_speed;
        let (lo, hi) = self.config.starting_energy;
        let energy = if hi > lo {
            self.rng.random_range(lo..hi)
        } else {
            lo
        };
        AgentData::new(
            Position::ORIGIN,
            Velocity::new(
                self.rng.random_range(-speed..=speed),
                self.rng.random_range(-speed..=speed),
            ),
            kind,
            self.config.species_size,
            energy,
        )
    }

    fn random_food(&mut self) -> AgentData {
        let span = self.config.arena_half_extent - self.config.wall_inset;
        AgentData::new(
            Position::new(
                self.rng.random_range(-span..=span),
                self.rng.random_range(-span..=span),
            ),
            Velocity::ZERO,
            AgentKind::FoodSource,
            self.config.food_size,
            FOOD_SOURCE_ENERGY,
        )
    }

    /// Execute one simulation tick, returning the emitted transition
    /// events. The call is atomic with respect to agent state: no other
    /// component reads or writes mid-tick.
    pub fn step(&mut self) -> TickEvents {
        let next_tick = self.tick.next();
        let mut events = TickEvents {
            tick: next_tick,
            ..TickEvents::default()
        };

        self.stage_integrate();
        self.stage_centroids();
        self.stage_pairwise(&mut events);
        self.stage_steering();
        self.stage_energy(&mut events);
        let deaths = self.stage_cull(&mut events);
        self.stage_report(&events, deaths);

        self.tick = next_tick;
        events
    }

    /// Wall bounce plus position advance for every mobile agent.
    fn stage_integrate(&mut self) {
        let half_extent = self.config.arena_half_extent;
        let inset = self.config.wall_inset;
        for agent in self.agents.rows_mut() {
            agent.integrate(half_extent, inset);
        }
    }

    /// Recompute the per-kind mean position of live mobile agents.
    fn stage_centroids(&mut self) {
        let mut sum_a = (0.0, 0.0);
        let mut sum_b = (0.0, 0.0);
        let mut count_a = 0usize;
        let mut count_b = 0usize;
        for agent in self.agents.rows() {
            match agent.kind {
                AgentKind::SpeciesA => {
                    sum_a.0 += agent.position.x;
                    sum_a.1 += agent.position.y;
                    count_a += 1;
                }
                AgentKind::SpeciesB => {
                    sum_b.0 += agent.position.x;
                    sum_b.1 += agent.position.y;
                    count_b += 1;
                }
                AgentKind::FoodSource => {}
            }
        }
        self.centroids = KindCentroids {
            species_a: if count_a > 0 {
                Position::new(sum_a.0 / count_a as f64, sum_a.1 / count_a as f64)
            } else {
                Position::ORIGIN
            },
            species_b: if count_b > 0 {
                Position::new(sum_b.0 / count_b as f64, sum_b.1 / count_b as f64)
            } else {
                Position::ORIGIN
            },
        };
    }

    /// Rebuild the proximity index and apply pairwise rules to every
    /// candidate pair. Candidates are an approximation: pairs may repeat
    /// across window combinations and are applied as often as they appear,
    /// never deduplicated.
    fn stage_pairwise(&mut self, events: &mut TickEvents) {
        self.scratch_positions.clear();
        self.scratch_positions
            .extend(self.agents.rows().iter().map(|a| (a.position.x, a.position.y)));
        self.index.rebuild(&self.scratch_positions);

        let mut counts = KindCounts::default();
        for agent in self.agents.rows() {
            match agent.kind {
                AgentKind::SpeciesA => counts.species_a += 1,
                AgentKind::SpeciesB => counts.species_b += 1,
                AgentKind::FoodSource => {}
            }
        }

        let config = &self.config;
        let (rows, handles) = self.agents.rows_and_handles_mut();
        for (i, j) in self.index.candidate_pairs() {
            let (a, b) = pair_mut(rows, i, j);
            if neighboring(a, b, config.neighbor_radius_scale) {
                match (a.kind, b.kind) {
                    (AgentKind::FoodSource, AgentKind::FoodSource) => {}
                    (AgentKind::FoodSource, _) => {
                        attract_to_food(b, a, config.food_weight);
                    }
                    (_, AgentKind::FoodSource) => {
                        attract_to_food(a, b, config.food_weight);
                    }
                    (ka, kb) if ka == kb => {
                        let population = counts.get(ka).max(1) as f64;
                        align_pair(a, b, config.alignment_weight / population);
                    }
                    _ => {
                        push_apart(a, b, config.cross_species_weight);
                    }
                }
            }
            if colliding(a, b, config.collision_radius_divisor) {
                match (a.kind, b.kind) {
                    (AgentKind::FoodSource, AgentKind::FoodSource) => {}
                    (AgentKind::FoodSource, _) => {
                        b.feed(config.feed_gain);
                        events.fed.push(handles[j]);
                    }
                    (_, AgentKind::FoodSource) => {
                        a.feed(config.feed_gain);
                        events.fed.push(handles[i]);
                    }
                    (ka, kb) if ka == kb => {
                        push_apart(a, b, config.separation_weight);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Global per-agent impulses: away from the origin, toward the own-kind
    /// centroid, random jitter; then velocity dampening. Impulses with no
    /// defined direction (agent at the origin or at its centroid) are
    /// skipped.
    fn stage_steering(&mut self) {
        let centroids = self.centroids;
        let center_weight = self.config.center_avoidance_weight;
        let centroid_weight = self.config.centroid_weight;
        let jitter_weight = self.config.jitter_weight;
        let dampening = self.config.dampening;
        for agent in self.agents.rows_mut() {
            if !agent.kind.is_mobile() {
                continue;
            }
            if let Some(away) = unit_towards(Position::ORIGIN, agent.position) {
                agent.apply_impulse(away, center_weight);
            }
            if let Some(toward) = unit_towards(agent.position, centroids.get(agent.kind)) {
                agent.apply_impulse(toward, centroid_weight);
            }
            let jx: f64 = self.rng.random_range(-1.0..=1.0);
            let jy: f64 = self.rng.random_range(-1.0..=1.0);
            agent.velocity.vx += jx * jitter_weight;
            agent.velocity.vy += jy * jitter_weight;
            agent.velocity.vx *= dampening;
            agent.velocity.vy *= dampening;
        }
    }

    /// Drain energy, flag distress crossings, and queue starved agents for
    /// removal. Removal itself is deferred so pair iteration never observes
    /// a half-dead agent.
    fn stage_energy(&mut self, events: &mut TickEvents) {
        let base = self.config.base_decay;
        let speed_factor = self.config.speed_decay;
        let distress = self.config.distress_threshold;
        let (rows, handles) = self.agents.rows_and_handles_mut();
        for (idx, agent) in rows.iter_mut().enumerate() {
            if !agent.kind.is_mobile() {
                continue;
            }
            agent.consume_energy(base, speed_factor);
            let now_distressed = agent.energy <= distress;
            if now_distressed && !agent.distressed {
                events.newly_distressed.push(handles[idx]);
            }
            agent.distressed = now_distressed;
            if agent.energy <= 0.0 {
                self.pending_deaths.push(handles[idx]);
            }
        }
    }

    /// Remove every queued agent in one compaction pass.
    fn stage_cull(&mut self, events: &mut TickEvents) -> usize {
        if self.pending_deaths.is_empty() {
            return 0;
        }
        let mut dead = HashSet::new();
        for id in self.pending_deaths.drain(..) {
            if dead.insert(id) {
                events.starved.push(id);
            }
        }
        self.agents.remove_many(&dead)
    }

    /// Record the tick summary and notify the observer.
    fn stage_report(&mut self, events: &TickEvents, deaths: usize) {
        let mut mobile_count = 0usize;
        let mut food_count = 0usize;
        let mut total_energy = 0.0;
        for agent in self.agents.rows() {
            if agent.kind.is_mobile() {
                mobile_count += 1;
                total_energy += agent.energy;
            } else {
                food_count += 1;
            }
        }
        let average_energy = if mobile_count > 0 {
            total_energy / mobile_count as f64
        } else {
            0.0
        };
        let summary = TickSummary {
            tick: events.tick,
            mobile_count,
            food_count,
            total_energy,
            average_energy,
            feedings: events.fed.len(),
            deaths,
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        let report = TickReport {
            summary: &summary,
            events,
        };
        self.observer.on_tick(&report);
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Read-only access to the agent arena.
    #[must_use]
    pub fn agents(&self) -> &AgentArena {
        &self.agents
    }

    /// Number of live agents, optionally restricted to one kind.
    #[must_use]
    pub fn alive_count(&self, kind: Option<AgentKind>) -> usize {
        match kind {
            None => self.agents.len(),
            Some(kind) => self
                .agents
                .rows()
                .iter()
                .filter(|agent| agent.kind == kind)
                .count(),
        }
    }

    /// Number of live mobile agents across both species.
    #[must_use]
    pub fn mobile_count(&self) -> usize {
        self.agents
            .rows()
            .iter()
            .filter(|agent| agent.kind.is_mobile())
            .count()
    }

    /// Snapshot of every live mobile agent, for drawing.
    #[must_use]
    pub fn mobile_snapshots(&self) -> Vec<AgentSnapshot> {
        self.snapshots_where(|agent| agent.kind.is_mobile())
    }

    /// Snapshot of every live food source, for drawing.
    #[must_use]
    pub fn food_snapshots(&self) -> Vec<AgentSnapshot> {
        self.snapshots_where(|agent| !agent.kind.is_mobile())
    }

    fn snapshots_where(&self, keep: impl Fn(&AgentData) -> bool) -> Vec<AgentSnapshot> {
        self.agents
            .iter_handles()
            .zip(self.agents.rows().iter().copied())
            .filter(|(_, data)| keep(data))
            .map(|(id, data)| AgentSnapshot { id, data })
            .collect()
    }

    /// Produce a copy of the scalar data for `id`.
    #[must_use]
    pub fn snapshot_agent(&self, id: AgentId) -> Option<AgentData> {
        self.agents.snapshot(id)
    }

    /// Mean position of live agents of `kind`, as of the last tick; the
    /// origin when no such agent exists.
    #[must_use]
    pub fn centroid(&self, kind: AgentKind) -> Position {
        self.centroids.get(kind)
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Replace the tick observer.
    pub fn set_observer(&mut self, observer: Box<dyn TickObserver>) {
        self.observer = observer;
    }

    /// Spawn an agent, returning its handle.
    pub fn spawn_agent(&mut self, agent: AgentData) -> AgentId {
        self.agents.insert(agent)
    }

    /// Remove an agent by handle, returning its last known data.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<AgentData> {
        self.agents.remove(id)
    }
}
