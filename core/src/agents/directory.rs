//! Agent directory
//!
//! Arena of every agent seen or synthesized during one log's analysis, plus
//! the lookup indexes downstream code uses: by raw address and time, by
//! type, and by instance id. Only `Active` agents are indexed; retired,
//! pending and englobed agents stay reachable by id for provenance.

use std::ops::{Index, IndexMut};

use hashbrown::HashMap;

use crate::combat_log::{AgentHandle, CombatItem};

use super::{AgentId, AgentItem, AgentStatus, AgentType, ResolutionError};

#[derive(Debug, Clone)]
pub struct AgentDirectory {
    agents: Vec<AgentItem>,
    by_handle: HashMap<AgentHandle, Vec<AgentId>>,
    by_type: HashMap<AgentType, Vec<AgentId>>,
    by_inst_id: HashMap<u16, Vec<AgentId>>,
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDirectory {
    pub fn new() -> Self {
        let mut unknown = AgentItem::unknown();
        unknown.status = AgentStatus::Retired;
        Self {
            agents: vec![unknown],
            by_handle: HashMap::new(),
            by_type: HashMap::new(),
            by_inst_id: HashMap::new(),
        }
    }

    /// Register a raw agent and index it.
    pub fn add_agent(&mut self, agent: AgentItem) -> Result<AgentId, ResolutionError> {
        if let Some(master) = agent.master() {
            if !agent.overlaps(self.agent(master)?) {
                return Err(ResolutionError::MasterOutsideInterval {
                    agent: AgentId::from_index(self.agents.len()),
                    master,
                });
            }
        }
        let id = self.push(agent, AgentStatus::Active)?;
        self.index_agent(id);
        Ok(id)
    }

    /// Register an agent created mid-resolution without indexing it yet.
    /// It becomes canonical when passed to `replace_agents`.
    pub(crate) fn reserve_agent(&mut self, agent: AgentItem) -> Result<AgentId, ResolutionError> {
        self.push(agent, AgentStatus::Pending)
    }

    fn push(&mut self, mut agent: AgentItem, status: AgentStatus) -> Result<AgentId, ResolutionError> {
        let id = AgentId::from_index(self.agents.len());
        if agent.first_aware() > agent.last_aware() {
            return Err(ResolutionError::MalformedInterval {
                agent: id,
                first_aware: agent.first_aware(),
                last_aware: agent.last_aware(),
            });
        }
        agent.id = id;
        agent.status = status;
        self.agents.push(agent);
        Ok(id)
    }

    /// Create a sub-agent copying `from`'s identity over `[start, end]`.
    pub fn add_custom_agent_from(
        &mut self,
        from: AgentId,
        start: i64,
        end: i64,
        spec: u32,
        subgroup: u16,
    ) -> Result<AgentId, ResolutionError> {
        let mut agent = self.agent(from)?.fresh_copy();
        agent.override_aware_times(start, end)?;
        agent.spec = spec;
        agent.subgroup = subgroup;
        agent.is_custom = true;
        self.push(agent, AgentStatus::Englobed)
    }

    // ─── Lookups ───────────────────────────────────────────────────────────────

    pub fn get(&self, id: AgentId) -> Option<&AgentItem> {
        self.agents.get(id.index())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut AgentItem> {
        self.agents.get_mut(id.index())
    }

    /// Like `get`, failing with `UnknownAgentId` for ids from another directory.
    pub fn agent(&self, id: AgentId) -> Result<&AgentItem, ResolutionError> {
        self.get(id).ok_or(ResolutionError::UnknownAgentId(id))
    }

    /// Canonical agent behind a raw address at a given time.
    /// Address 0 always resolves to `AgentId::UNKNOWN`.
    pub fn get_agent(&self, handle: AgentHandle, time: i64) -> Option<AgentId> {
        if handle == 0 {
            return Some(AgentId::UNKNOWN);
        }
        self.by_handle
            .get(&handle)?
            .iter()
            .copied()
            .find(|&id| self.agents[id.index()].in_aware_times(time))
    }

    pub fn resolve_agent(&self, handle: AgentHandle, time: i64) -> Result<AgentId, ResolutionError> {
        self.get_agent(handle, time)
            .ok_or(ResolutionError::MissingAgent { handle, time })
    }

    /// Agent an event's src refers to, honouring resolver overrides.
    pub fn resolve_src(&self, event: &CombatItem) -> Option<AgentId> {
        match event.src_override() {
            Some(id) => Some(id),
            None if event.src_is_agent() => self.get_agent(event.src_agent, event.time),
            None => None,
        }
    }

    /// Agent an event's dst refers to, honouring resolver overrides.
    pub fn resolve_dst(&self, event: &CombatItem) -> Option<AgentId> {
        match event.dst_override() {
            Some(id) => Some(id),
            None if event.dst_is_agent() => self.get_agent(event.dst_agent, event.time),
            None => None,
        }
    }

    /// Canonical agents of a type, ordered by first appearance.
    pub fn by_type(&self, agent_type: AgentType) -> &[AgentId] {
        self.by_type.get(&agent_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_inst_id(&self, inst_id: u16) -> &[AgentId] {
        self.by_inst_id.get(&inst_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All canonical agents, in id order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentItem> {
        self.agents.iter().filter(|a| a.is_active())
    }

    /// Number of canonical agents.
    pub fn len(&self) -> usize {
        self.agents().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sub-agent of `agent` live at `time`, or `agent` itself when it was never split.
    pub fn englobed_agent_at(&self, agent: AgentId, time: i64) -> AgentId {
        self.get(agent)
            .and_then(|a| {
                a.englobed()
                    .iter()
                    .copied()
                    .find(|&sub| self.agents[sub.index()].in_aware_times(time))
            })
            .unwrap_or(agent)
    }

    // ─── Mutation ──────────────────────────────────────────────────────────────

    /// Swap a set of agents for another, then rebuild the indexes.
    pub fn replace_agents(&mut self, to_remove: &[AgentId], to_add: &[AgentId]) {
        for &id in to_remove {
            if let Some(agent) = self.agents.get_mut(id.index()) {
                agent.status = AgentStatus::Retired;
            }
        }
        for &id in to_add {
            if let Some(agent) = self.agents.get_mut(id.index()) {
                agent.status = AgentStatus::Active;
            }
        }
        self.refresh();
    }

    /// Attach `master` to `agent`. Their validity intervals must overlap.
    pub fn set_master(&mut self, agent: AgentId, master: AgentId) -> Result<(), ResolutionError> {
        self.check_master(agent, master)?;
        self.agents[agent.index()].set_master_unchecked(Some(master));
        Ok(())
    }

    fn check_master(&self, agent: AgentId, master: AgentId) -> Result<(), ResolutionError> {
        let dependent = self.agent(agent)?;
        let owner = self.agent(master)?;
        if !dependent.overlaps(owner) {
            return Err(ResolutionError::MasterOutsideInterval { agent, master });
        }
        Ok(())
    }

    /// Re-parent every dependent of `from` onto `to`.
    pub fn swap_masters(&mut self, from: AgentId, to: AgentId) {
        for agent in self.agents.iter_mut() {
            if agent.master() == Some(from) {
                agent.set_master_unchecked(Some(to));
            }
        }
    }

    pub(crate) fn set_englobing(&mut self, englobed: AgentId, englobing: AgentId) {
        self.agents[englobed.index()].set_englobing(englobing);
        self.agents[englobing.index()].push_englobed(englobed);
    }

    /// Rebuild every index from the arena.
    pub fn refresh(&mut self) {
        self.by_handle.clear();
        self.by_type.clear();
        self.by_inst_id.clear();
        let active: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|a| a.is_active())
            .map(|a| a.id)
            .collect();
        for id in active {
            self.index_agent(id);
        }
    }

    fn index_agent(&mut self, id: AgentId) {
        let agent = &self.agents[id.index()];
        let (handle, agent_type, inst_id) = (agent.handle, agent.agent_type, agent.inst_id);
        let key = (agent.first_aware(), id);
        let agents = &self.agents;
        let insert = |ids: &mut Vec<AgentId>| {
            let at = ids.partition_point(|&other| (agents[other.index()].first_aware(), other) < key);
            ids.insert(at, id);
        };
        insert(self.by_handle.entry(handle).or_default());
        insert(self.by_type.entry(agent_type).or_default());
        insert(self.by_inst_id.entry(inst_id).or_default());
    }
}

impl Index<AgentId> for AgentDirectory {
    type Output = AgentItem;

    /// Panics on an id that did not come from this directory.
    fn index(&self, id: AgentId) -> &AgentItem {
        &self.agents[id.index()]
    }
}

impl IndexMut<AgentId> for AgentDirectory {
    fn index_mut(&mut self, id: AgentId) -> &mut AgentItem {
        &mut self.agents[id.index()]
    }
}
