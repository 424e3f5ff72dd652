//! Shared configuration types for the EVTC analysis core
//!
//! This crate contains serializable configuration and descriptor types that are
//! shared between the analysis core (evtc-core) and whatever front end embeds it.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Buff Descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// How live instances of a buff coexist on one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingType {
    /// Independent stacks, all ticking at once. When full, the weakest stack
    /// is evicted if the incoming one is at least as long.
    #[default]
    Intensity,
    /// Independent stacks that never evict: once full, further applications
    /// are rejected.
    ConditionalLoss,
    /// A single slot that is always replaced by the latest application.
    ForceOverride,
    /// One active timer with waiting applications queued behind it.
    Queue,
    /// Like `Queue`, with the waiting applications kept longest first.
    Duration,
    /// Queued applications with no capacity limit.
    CappedDuration,
}

impl StackingType {
    /// Returns true if every live stack consumes time simultaneously.
    ///
    /// Duration-family buffs only consume their head stack.
    pub fn ticks_all_stacks(&self) -> bool {
        matches!(
            self,
            StackingType::Intensity | StackingType::ConditionalLoss | StackingType::ForceOverride
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            StackingType::Intensity => "Intensity",
            StackingType::ConditionalLoss => "Conditional Loss",
            StackingType::ForceOverride => "Force Override",
            StackingType::Queue => "Queue",
            StackingType::Duration => "Duration",
            StackingType::CappedDuration => "Capped Duration",
        }
    }
}

/// Static description of a buff archetype: what the simulator needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffDescriptor {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stacking: StackingType,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl BuffDescriptor {
    pub fn new(id: u32, name: impl Into<String>, stacking: StackingType, capacity: usize) -> Self {
        Self {
            id,
            name: name.into(),
            stacking,
            capacity,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Analysis Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    1
}

fn default_extension_race_tolerance_ms() -> i64 {
    50
}

fn default_queue_override_delay_ms() -> i64 {
    15
}

/// Settings for the agent identity resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Team-change events also carry the team the agent is leaving.
    /// Enabled for logs recorded by builds that emit team changes on despawn.
    #[serde(default = "default_true")]
    pub team_change_on_despawn: bool,
    /// Split players whose build or subgroup changes between combat entries.
    #[serde(default = "default_true")]
    pub split_players_by_enter_combat: bool,
    /// Collapse several player records sharing one account.
    #[serde(default = "default_true")]
    pub regroup_players_by_account: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            team_change_on_despawn: true,
            split_players_by_enter_combat: true,
            regroup_players_by_account: true,
        }
    }
}

/// Settings for buff stack replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// How long (ms) an expired stack stays eligible to seed an extension
    /// that raced with its removal.
    #[serde(default = "default_extension_race_tolerance_ms")]
    pub extension_race_tolerance_ms: i64,
    /// Margin (ms) a queued application must beat the shortest waiting one by
    /// before it replaces it.
    #[serde(default = "default_queue_override_delay_ms")]
    pub queue_override_delay_ms: i64,
    /// Run independent (buff, actor) simulations on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            extension_race_tolerance_ms: default_extension_race_tolerance_ms(),
            queue_override_delay_ms: default_queue_override_delay_ms(),
            parallel: true,
        }
    }
}

/// Top-level configuration for one log analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Buff archetypes known to this pass. Unlisted buffs are not simulated.
    #[serde(default, rename = "buff")]
    pub buffs: Vec<BuffDescriptor>,
}

impl AnalysisConfig {
    /// Look up a buff descriptor by id. Later entries win over earlier ones.
    pub fn descriptor(&self, buff_id: u32) -> Option<&BuffDescriptor> {
        self.buffs.iter().rev().find(|b| b.id == buff_id)
    }
}
