use std::fmt;

use crate::combat_log::AgentHandle;
use crate::context::{IStr, empty_istr};

use super::ResolutionError;

/// Index of an agent in its `AgentDirectory`. Stable for the whole analysis
/// pass: agents replaced during resolution are retired, never freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AgentId(u32);

impl AgentId {
    /// The placeholder agent behind raw address 0.
    pub const UNKNOWN: AgentId = AgentId(0);

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AgentType {
    /// Squad member.
    Player,
    /// Player character outside the squad (allies and enemies in open content).
    NonSquadPlayer,
    /// Non-player character.
    #[default]
    Npc,
    /// Transient object: attack targets, turrets, spawned hazards.
    Gadget,
}

impl AgentType {
    /// NPCs and gadgets, the only agents events may be redirected between.
    pub fn is_npc(&self) -> bool {
        matches!(self, AgentType::Npc | AgentType::Gadget)
    }

    pub fn is_player(&self) -> bool {
        matches!(self, AgentType::Player | AgentType::NonSquadPlayer)
    }
}

/// Where an agent sits in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentStatus {
    /// Canonical and attributable.
    #[default]
    Active,
    /// Created during a resolution pass, not yet swapped in.
    Pending,
    /// Replaced by a regrouped agent; kept for provenance.
    Retired,
    /// Sub-agent view over part of an englobing agent's window.
    Englobed,
}

/// A raw agent folded into another one over `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedAgent {
    pub merged: AgentId,
    pub start: i64,
    pub end: i64,
}

impl MergedAgent {
    pub fn contains(&self, time: i64) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Canonical actor of one encounter.
#[derive(Debug, Clone)]
pub struct AgentItem {
    pub id: AgentId,
    pub handle: AgentHandle,
    pub inst_id: u16,
    /// Content id: species for NPCs and gadgets, profession for players.
    pub species_id: i32,
    pub agent_type: AgentType,
    pub name: IStr,
    pub account: Option<IStr>,
    /// Build specialization. 0 when unknown.
    pub spec: u32,
    pub subgroup: u16,
    /// Last team id observed on team-change events.
    pub team_id: Option<u64>,
    /// Non-squad players only: shares the squad's team.
    pub is_friendly: bool,
    pub is_custom: bool,
    pub(crate) status: AgentStatus,
    first_aware: i64,
    last_aware: i64,
    master: Option<AgentId>,
    merged_from: Vec<MergedAgent>,
    regrouped: Vec<MergedAgent>,
    englobing: Option<AgentId>,
    englobed: Vec<AgentId>,
}

impl AgentItem {
    /// Create a detached agent. The id is assigned by `AgentDirectory::add_agent`.
    pub fn new(
        handle: AgentHandle,
        inst_id: u16,
        agent_type: AgentType,
        first_aware: i64,
        last_aware: i64,
    ) -> Self {
        Self {
            id: AgentId::UNKNOWN,
            handle,
            inst_id,
            species_id: 0,
            agent_type,
            name: empty_istr(),
            account: None,
            spec: 0,
            subgroup: 0,
            team_id: None,
            is_friendly: false,
            is_custom: false,
            status: AgentStatus::Active,
            first_aware,
            last_aware,
            master: None,
            merged_from: Vec::new(),
            regrouped: Vec::new(),
            englobing: None,
            englobed: Vec::new(),
        }
    }

    pub(crate) fn unknown() -> Self {
        Self::new(0, 0, AgentType::Npc, i64::MIN, i64::MAX)
    }

    pub fn with_species(mut self, species_id: i32) -> Self {
        self.species_id = species_id;
        self
    }

    pub fn with_name(mut self, name: IStr) -> Self {
        self.name = name;
        self
    }

    pub fn with_account(mut self, account: IStr) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_build(mut self, spec: u32, subgroup: u16) -> Self {
        self.spec = spec;
        self.subgroup = subgroup;
        self
    }

    pub fn with_master(mut self, master: AgentId) -> Self {
        self.master = Some(master);
        self
    }

    // ─── Validity interval ─────────────────────────────────────────────────────

    pub fn first_aware(&self) -> i64 {
        self.first_aware
    }

    pub fn last_aware(&self) -> i64 {
        self.last_aware
    }

    #[inline]
    pub fn in_aware_times(&self, time: i64) -> bool {
        self.first_aware <= time && time <= self.last_aware
    }

    pub fn overlaps(&self, other: &AgentItem) -> bool {
        self.first_aware <= other.last_aware && other.first_aware <= self.last_aware
    }

    pub fn override_aware_times(&mut self, first_aware: i64, last_aware: i64) -> Result<(), ResolutionError> {
        if first_aware > last_aware {
            return Err(ResolutionError::MalformedInterval {
                agent: self.id,
                first_aware,
                last_aware,
            });
        }
        self.first_aware = first_aware;
        self.last_aware = last_aware;
        Ok(())
    }

    // ─── Relations ─────────────────────────────────────────────────────────────

    pub fn master(&self) -> Option<AgentId> {
        self.master
    }

    pub(crate) fn set_master_unchecked(&mut self, master: Option<AgentId>) {
        self.master = master;
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Agents whose events were redirected into this one.
    pub fn merged_from(&self) -> &[MergedAgent] {
        &self.merged_from
    }

    /// Raw agents this one was regrouped from, with their original windows.
    pub fn regrouped(&self) -> &[MergedAgent] {
        &self.regrouped
    }

    pub fn englobing(&self) -> Option<AgentId> {
        self.englobing
    }

    /// Sub-agents splitting this agent's window, in time order.
    pub fn englobed(&self) -> &[AgentId] {
        &self.englobed
    }

    pub(crate) fn add_merge_from(&mut self, merged: AgentId, start: i64, end: i64) {
        self.merged_from.push(MergedAgent { merged, start, end });
    }

    pub(crate) fn add_regrouped_from(&mut self, merged: AgentId, start: i64, end: i64) {
        self.regrouped.push(MergedAgent { merged, start, end });
    }

    pub(crate) fn set_englobing(&mut self, englobing: AgentId) {
        self.englobing = Some(englobing);
    }

    pub(crate) fn push_englobed(&mut self, englobed: AgentId) {
        self.englobed.push(englobed);
    }

    /// Copy carrying identity and build but none of the provenance.
    pub(crate) fn fresh_copy(&self) -> Self {
        Self {
            merged_from: Vec::new(),
            regrouped: Vec::new(),
            englobing: None,
            englobed: Vec::new(),
            ..self.clone()
        }
    }
}
