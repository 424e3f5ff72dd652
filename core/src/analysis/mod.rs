//! One log's analysis pass
//!
//! Sort → regroup → caller redirects → split → bind buff events → simulate
//! every (buff, actor) pair. After `run` returns, agents and events are no
//! longer mutated; timelines borrow the finished simulations.

mod error;

pub use error::AnalysisError;

use crate::agents::{AgentDirectory, AgentId, ResolutionError, ResolutionStats, Resolver};
use crate::buffs::{BuffEvent, Simulations, group_buff_events};
use crate::combat_log::{CombatItem, sort_by_time};
use crate::context::{AnalysisConfig, AnalysisConfigExt};
use crate::stats::{BuffPresence, BuffTimeline, Phase};

#[derive(Debug)]
pub struct LogAnalysis {
    events: Vec<CombatItem>,
    agents: AgentDirectory,
    resolution: ResolutionStats,
    simulations: Simulations,
    window_start: i64,
    window_end: i64,
}

impl LogAnalysis {
    pub fn run(events: Vec<CombatItem>, agents: AgentDirectory, config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::run_with(events, agents, config, |_| Ok(()))
    }

    /// Run the pass, letting the caller apply encounter-specific redirects
    /// between regrouping and splitting.
    pub fn run_with<F>(
        mut events: Vec<CombatItem>,
        mut agents: AgentDirectory,
        config: &AnalysisConfig,
        redirects: F,
    ) -> Result<Self, AnalysisError>
    where
        F: FnOnce(&mut Resolver<'_>) -> Result<(), ResolutionError>,
    {
        config.validate()?;
        sort_by_time(&mut events);

        let resolution = {
            let mut resolver = Resolver::new(&mut events, &mut agents, &config.resolver);
            resolver.regroup()?;
            redirects(&mut resolver)?;
            resolver.split_players()?;
            resolver.finish()
        };

        // Redirects may have inserted state copies ahead of the first event
        let window_start = events.first().map_or(0, |e| e.time);
        let window_end = events.last().map_or(window_start, |e| e.time);

        let mut buff_events = Vec::new();
        for item in &events {
            if let Some(event) = BuffEvent::from_item(item, &agents)? {
                buff_events.push(event);
            }
        }
        let groups = group_buff_events(buff_events);
        let simulations = Simulations::run_all(&groups, config, window_start, window_end)?;

        tracing::info!(
            agents = agents.len(),
            events = events.len(),
            simulations = simulations.len(),
            "Log analysis complete"
        );

        Ok(Self {
            events,
            agents,
            resolution,
            simulations,
            window_start,
            window_end,
        })
    }

    pub fn events(&self) -> &[CombatItem] {
        &self.events
    }

    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    pub fn resolution(&self) -> ResolutionStats {
        self.resolution
    }

    pub fn simulations(&self) -> &Simulations {
        &self.simulations
    }

    pub fn window(&self) -> (i64, i64) {
        (self.window_start, self.window_end)
    }

    pub fn full_phase(&self) -> Phase {
        Phase::full(self.window_start, self.window_end)
    }

    pub fn timeline(&self, buff_id: u32, actor: AgentId) -> Option<BuffTimeline<'_>> {
        self.simulations.get(buff_id, actor).map(BuffTimeline::new)
    }

    /// Presence of a buff on an actor, one entry per phase.
    pub fn presence(&self, buff_id: u32, actor: AgentId, phases: &[Phase]) -> Vec<BuffPresence> {
        let Some(mut timeline) = self.timeline(buff_id, actor) else {
            return Vec::new();
        };
        phases.iter().map(|phase| timeline.presence(phase)).collect()
    }
}
