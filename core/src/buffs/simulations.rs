use hashbrown::HashMap;
use rayon::prelude::*;

use crate::agents::AgentId;
use crate::context::{AnalysisConfig, BuffDescriptor, SimulationConfig};

use super::SimulationError;
use super::events::BuffEvent;
use super::pool::StackItemPool;
use super::simulation::BuffSimulation;
use super::simulator::BuffSimulator;

type PairKey = (u32, AgentId);

/// Simulation results of one log, keyed by (buff id, actor).
#[derive(Debug, Default)]
pub struct Simulations {
    results: HashMap<PairKey, BuffSimulation>,
}

impl Simulations {
    /// Simulate every grouped event stream whose buff has a descriptor.
    ///
    /// Pairs are independent, so with `parallel` set they run on the rayon
    /// pool, each worker reusing its own `StackItemPool`.
    pub fn run_all(
        groups: &HashMap<PairKey, Vec<BuffEvent>>,
        config: &AnalysisConfig,
        window_start: i64,
        window_end: i64,
    ) -> Result<Self, SimulationError> {
        let mut jobs: Vec<(PairKey, &BuffDescriptor, &[BuffEvent])> = Vec::with_capacity(groups.len());
        for (&key, events) in groups {
            match config.descriptor(key.0) {
                Some(descriptor) => jobs.push((key, descriptor, events.as_slice())),
                None => tracing::debug!(buff_id = key.0, "No descriptor, skipping buff"),
            }
        }
        jobs.sort_unstable_by_key(|(key, _, _)| *key);

        let settings = &config.simulation;
        let simulated: Vec<(PairKey, BuffSimulation)> = if settings.parallel {
            jobs.par_iter()
                .map_init(StackItemPool::new, |pool, &(key, descriptor, events)| {
                    run_one(pool, descriptor, settings, key.1, events, window_start, window_end)
                        .map(|sim| (key, sim))
                })
                .collect::<Result<_, _>>()?
        } else {
            let mut pool = StackItemPool::new();
            jobs.iter()
                .map(|&(key, descriptor, events)| {
                    run_one(&mut pool, descriptor, settings, key.1, events, window_start, window_end)
                        .map(|sim| (key, sim))
                })
                .collect::<Result<_, _>>()?
        };

        tracing::debug!(pairs = simulated.len(), parallel = settings.parallel, "Buff simulations complete");
        Ok(Self {
            results: simulated.into_iter().collect(),
        })
    }

    pub fn get(&self, buff_id: u32, actor: AgentId) -> Option<&BuffSimulation> {
        self.results.get(&(buff_id, actor))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &BuffSimulation)> {
        self.results.iter()
    }

    /// All simulations of one buff, in actor order.
    pub fn for_buff(&self, buff_id: u32) -> Vec<&BuffSimulation> {
        let mut sims: Vec<&BuffSimulation> = self
            .results
            .iter()
            .filter(|((id, _), _)| *id == buff_id)
            .map(|(_, sim)| sim)
            .collect();
        sims.sort_unstable_by_key(|s| s.actor);
        sims
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn run_one(
    pool: &mut StackItemPool,
    descriptor: &BuffDescriptor,
    settings: &SimulationConfig,
    actor: AgentId,
    events: &[BuffEvent],
    window_start: i64,
    window_end: i64,
) -> Result<BuffSimulation, SimulationError> {
    BuffSimulator::new(descriptor, settings, pool, actor, window_start, window_end)?.simulate(events)
}
