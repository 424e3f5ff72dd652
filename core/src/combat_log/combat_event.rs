use crate::agents::{AgentId, AgentItem};

/// Raw agent address as written by the recorder. Address 0 means "no agent".
pub type AgentHandle = u64;

/// State change discriminator of a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StateChange {
    /// Not a state change: damage, buff application/extension/removal.
    #[default]
    None,
    EnterCombat,
    ExitCombat,
    ChangeUp,
    ChangeDead,
    ChangeDown,
    Spawn,
    Despawn,
    HealthUpdate,
    MaxHealthUpdate,
    BarrierUpdate,
    BreakbarState,
    BreakbarPercent,
    Position,
    Rotation,
    Velocity,
    TeamChange,
    AttackTarget,
    Targetable,
    SquadCombatStart,
    SquadCombatEnd,
    BuffInitial,
}

impl StateChange {
    /// State changes whose src is an agent.
    pub fn src_is_agent(&self) -> bool {
        !matches!(self, StateChange::SquadCombatStart | StateChange::SquadCombatEnd)
    }

    /// State changes whose dst field holds an agent rather than a payload.
    pub fn dst_is_agent(&self) -> bool {
        matches!(self, StateChange::None | StateChange::BuffInitial | StateChange::AttackTarget)
    }
}

/// Buff removal discriminator of a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuffRemove {
    #[default]
    None,
    /// Every stack of the buff was removed.
    All,
    /// One stack, identified by its stack id, was removed.
    Single,
    /// Bookkeeping removal emitted per stack after an `All`; carries no extra information.
    Manual,
}

/// One time-stamped raw event.
///
/// Agent references can be rewritten in place by the identity resolver; once
/// overridden, an event matches its new agent regardless of raw address.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatItem {
    pub time: i64,
    pub src_agent: AgentHandle,
    /// Agent address, or a payload for state changes whose dst is not an agent:
    /// subgroup for combat entries, team id for team changes, on/off flag for targetable.
    pub dst_agent: AgentHandle,
    pub src_instid: u16,
    pub dst_instid: u16,
    /// Damage, health %, spec, buff duration or extension amount depending on kind.
    /// Team changes carry the team the agent is leaving here.
    pub value: i64,
    pub buff_dmg: i64,
    /// For buff applications: the stack's duration after the event.
    pub overstack_value: i64,
    pub skill_id: u32,
    pub state_change: StateChange,
    pub buff_remove: BuffRemove,
    pub is_buff: bool,
    /// Non-zero marks a buff application as an extension of a live stack.
    pub is_offcycle: u8,
    /// Stack id for buff events.
    pub pad: u32,
    pub(crate) src_override: Option<AgentId>,
    pub(crate) dst_override: Option<AgentId>,
}

impl Default for CombatItem {
    fn default() -> Self {
        Self {
            time: 0,
            src_agent: 0,
            dst_agent: 0,
            src_instid: 0,
            dst_instid: 0,
            value: 0,
            buff_dmg: 0,
            overstack_value: 0,
            skill_id: 0,
            state_change: StateChange::None,
            buff_remove: BuffRemove::None,
            is_buff: false,
            is_offcycle: 0,
            pad: 0,
            src_override: None,
            dst_override: None,
        }
    }
}

impl CombatItem {
    pub fn state(time: i64, state_change: StateChange, src_agent: AgentHandle) -> Self {
        Self {
            time,
            src_agent,
            state_change,
            ..Default::default()
        }
    }

    // ─── Classification ────────────────────────────────────────────────────────

    pub fn is_state_change(&self) -> bool {
        self.state_change != StateChange::None
    }

    pub fn src_is_agent(&self) -> bool {
        self.state_change.src_is_agent() && self.src_agent != 0
    }

    pub fn dst_is_agent(&self) -> bool {
        self.state_change.dst_is_agent() && self.dst_agent != 0
    }

    pub fn is_buff_apply(&self) -> bool {
        self.is_buff
            && self.state_change == StateChange::None
            && self.buff_remove == BuffRemove::None
            && self.buff_dmg == 0
            && self.value != 0
    }

    pub fn is_buff_extension(&self) -> bool {
        self.is_buff_apply() && self.is_offcycle > 0
    }

    pub fn is_buff_removal(&self) -> bool {
        self.is_buff && self.state_change == StateChange::None && self.buff_remove != BuffRemove::None
    }

    pub fn is_damage(&self) -> bool {
        self.state_change == StateChange::None && !self.is_buff && self.buff_remove == BuffRemove::None
    }

    // ─── Agent matching ────────────────────────────────────────────────────────

    pub fn src_override(&self) -> Option<AgentId> {
        self.src_override
    }

    pub fn dst_override(&self) -> Option<AgentId> {
        self.dst_override
    }

    pub fn src_matches_agent(&self, agent: &AgentItem) -> bool {
        match self.src_override {
            Some(id) => id == agent.id,
            None => {
                self.src_is_agent()
                    && self.src_agent == agent.handle
                    && agent.in_aware_times(self.time)
            }
        }
    }

    pub fn dst_matches_agent(&self, agent: &AgentItem) -> bool {
        match self.dst_override {
            Some(id) => id == agent.id,
            None => {
                self.dst_is_agent()
                    && self.dst_agent == agent.handle
                    && agent.in_aware_times(self.time)
            }
        }
    }

    pub fn override_src_agent(&mut self, agent: &AgentItem) {
        self.src_agent = agent.handle;
        self.src_instid = agent.inst_id;
        self.src_override = Some(agent.id);
    }

    pub fn override_dst_agent(&mut self, agent: &AgentItem) {
        self.dst_agent = agent.handle;
        self.dst_instid = agent.inst_id;
        self.dst_override = Some(agent.id);
    }

    pub fn override_time(&mut self, time: i64) {
        self.time = time;
    }
}

/// Stable sort by time. Events sharing a timestamp keep their relative order.
pub fn sort_by_time(events: &mut [CombatItem]) {
    events.sort_by_key(|e| e.time);
}
