use hashbrown::HashMap;

use crate::agents::{AgentDirectory, AgentId, ResolutionError};
use crate::combat_log::{BuffRemove, CombatItem, StateChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffEventKind {
    Apply { duration: i64, stack_id: u32 },
    /// `old_value` is the stack's total duration before the extension.
    Extend { old_value: i64, extension: i64 },
    Remove { kind: BuffRemove, removed: i64, stack_id: u32 },
}

/// A resolved buff event on one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuffEvent {
    pub time: i64,
    pub buff_id: u32,
    /// Applier for applications and extensions; remover for removals.
    pub src: AgentId,
    /// Agent carrying the buff.
    pub actor: AgentId,
    pub kind: BuffEventKind,
}

impl BuffEvent {
    pub fn apply(time: i64, buff_id: u32, src: AgentId, actor: AgentId, duration: i64) -> Self {
        Self {
            time,
            buff_id,
            src,
            actor,
            kind: BuffEventKind::Apply { duration, stack_id: 0 },
        }
    }

    pub fn extend(time: i64, buff_id: u32, src: AgentId, actor: AgentId, old_value: i64, extension: i64) -> Self {
        Self {
            time,
            buff_id,
            src,
            actor,
            kind: BuffEventKind::Extend { old_value, extension },
        }
    }

    pub fn remove(time: i64, buff_id: u32, actor: AgentId, kind: BuffRemove, removed: i64) -> Self {
        Self {
            time,
            buff_id,
            src: AgentId::UNKNOWN,
            actor,
            kind: BuffEventKind::Remove {
                kind,
                removed,
                stack_id: 0,
            },
        }
    }

    /// Extract a buff event from a resolved raw event.
    ///
    /// Removal events name the agent losing the buff as src and the remover
    /// as dst; applications the other way round. Returns `Ok(None)` for
    /// events that carry no buff information.
    pub fn from_item(item: &CombatItem, agents: &AgentDirectory) -> Result<Option<Self>, ResolutionError> {
        let initial = item.state_change == StateChange::BuffInitial;
        if !(item.is_buff || initial) || (item.is_state_change() && !initial) {
            return Ok(None);
        }
        // An applier with address 0 is the unknown agent, not a missing one
        let src = || {
            if item.src_agent == 0 && item.src_override().is_none() {
                return Ok(AgentId::UNKNOWN);
            }
            agents
                .resolve_src(item)
                .ok_or(ResolutionError::MissingAgent {
                    handle: item.src_agent,
                    time: item.time,
                })
        };
        let dst = || {
            agents
                .resolve_dst(item)
                .ok_or(ResolutionError::MissingAgent {
                    handle: item.dst_agent,
                    time: item.time,
                })
        };

        let event = if item.is_buff_removal() {
            Self {
                time: item.time,
                buff_id: item.skill_id,
                src: agents.resolve_dst(item).unwrap_or(AgentId::UNKNOWN),
                actor: src()?,
                kind: BuffEventKind::Remove {
                    kind: item.buff_remove,
                    removed: item.value,
                    stack_id: item.pad,
                },
            }
        } else if item.is_buff_extension() {
            Self {
                time: item.time,
                buff_id: item.skill_id,
                src: src()?,
                actor: dst()?,
                kind: BuffEventKind::Extend {
                    old_value: item.overstack_value - item.value,
                    extension: item.value,
                },
            }
        } else if initial || item.is_buff_apply() {
            Self {
                time: item.time,
                buff_id: item.skill_id,
                src: src()?,
                actor: dst()?,
                kind: BuffEventKind::Apply {
                    duration: item.value,
                    stack_id: item.pad,
                },
            }
        } else {
            return Ok(None);
        };
        Ok(Some(event))
    }
}

/// Buff events keyed by (buff id, actor), each list in time order.
pub fn group_buff_events(events: impl IntoIterator<Item = BuffEvent>) -> HashMap<(u32, AgentId), Vec<BuffEvent>> {
    let mut groups: HashMap<(u32, AgentId), Vec<BuffEvent>> = HashMap::new();
    for event in events {
        groups.entry((event.buff_id, event.actor)).or_default().push(event);
    }
    for list in groups.values_mut() {
        list.sort_by_key(|e| e.time);
    }
    groups
}
