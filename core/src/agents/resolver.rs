//! Agent identity resolution
//!
//! Reconciles raw agent records into canonical agents: regroups duplicate
//! identities, redirects events between NPC identities, and splits players
//! whose build or subgroup changes mid-encounter. Every pass mutates the event
//! list and the directory in place; once resolution is finished both are
//! treated as read-only.

use hashbrown::HashMap;

use crate::combat_log::{AgentHandle, CombatItem, StateChange, sort_by_time};
use crate::context::ResolverConfig;

use super::{AgentDirectory, AgentId, AgentItem, AgentType, ResolutionError};

/// Per-event veto used by redirects: `(event, from, to)`. Returning `false`
/// leaves the event untouched.
pub type RedirectFilter<'f> = &'f dyn Fn(&CombatItem, &AgentItem, &AgentItem) -> bool;

/// Last-known-state kinds copied onto a redirect target, highest priority
/// first. Kinds sharing a slot compete: only the latest of them is copied.
const STATE_COPY_PRIORITY: &[&[StateChange]] = &[
    &[StateChange::BreakbarState],
    &[StateChange::MaxHealthUpdate],
    &[StateChange::HealthUpdate],
    &[StateChange::BreakbarPercent],
    &[StateChange::BarrierUpdate],
    &[StateChange::EnterCombat, StateChange::ExitCombat],
    &[
        StateChange::Spawn,
        StateChange::Despawn,
        StateChange::ChangeDead,
        StateChange::ChangeDown,
        StateChange::ChangeUp,
    ],
];

const POSITIONAL_STATES: &[StateChange] = &[
    StateChange::Position,
    StateChange::Rotation,
    StateChange::Velocity,
];

/// Counters reported once resolution finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub regrouped_agents: usize,
    pub created_agents: usize,
    pub split_agents: usize,
    pub redirected_events: usize,
    pub copied_events: usize,
}

/// One combat entry of a player: the build it entered combat with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatTransition {
    pub time: i64,
    pub spec: u32,
    pub subgroup: u16,
}

/// A candidate split point while walking a player's transitions.
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    start: i64,
    copy_from: AgentId,
    spec: u32,
    subgroup: u16,
    check_exit: bool,
}

/// Midpoint of two timestamps, rounded toward zero.
#[inline]
fn midpoint(a: i64, b: i64) -> i64 {
    ((a as i128 + b as i128) / 2) as i64
}

pub struct Resolver<'a> {
    events: &'a mut Vec<CombatItem>,
    agents: &'a mut AgentDirectory,
    config: &'a ResolverConfig,
    stats: ResolutionStats,
}

impl<'a> Resolver<'a> {
    pub fn new(
        events: &'a mut Vec<CombatItem>,
        agents: &'a mut AgentDirectory,
        config: &'a ResolverConfig,
    ) -> Self {
        Self {
            events,
            agents,
            config,
            stats: ResolutionStats::default(),
        }
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    /// End the resolution pass and report what it did.
    pub fn finish(self) -> ResolutionStats {
        tracing::info!(
            regrouped = self.stats.regrouped_agents,
            created = self.stats.created_agents,
            split = self.stats.split_agents,
            redirected_events = self.stats.redirected_events,
            copied_events = self.stats.copied_events,
            "Agent resolution complete"
        );
        self.stats
    }

    // ─── Redirect ───────────────────────────────────────────────────────────

    /// Move `from`'s events inside `to`'s validity window onto `to`, and give
    /// `to` the last known state of `state_sources` at its first appearance.
    ///
    /// Both agents must be NPCs or gadgets. Returns the number of events
    /// rewritten.
    pub fn redirect(
        &mut self,
        from: AgentId,
        state_sources: &[AgentId],
        to: AgentId,
        copy_positional_from_attack_target: bool,
    ) -> Result<usize, ResolutionError> {
        self.redirect_filtered(from, state_sources, to, copy_positional_from_attack_target, None)
    }

    /// `redirect` with a per-event veto.
    pub fn redirect_filtered(
        &mut self,
        from: AgentId,
        state_sources: &[AgentId],
        to: AgentId,
        copy_positional_from_attack_target: bool,
        filter: Option<RedirectFilter<'_>>,
    ) -> Result<usize, ResolutionError> {
        let from_item = self.agents.agent(from)?;
        let to_item = self.agents.agent(to)?;
        if !(from_item.agent_type.is_npc() && to_item.agent_type.is_npc()) {
            return Err(ResolutionError::IncompatibleAgentTypes {
                operation: "redirect",
                from,
                from_type: from_item.agent_type,
                to,
                to_type: to_item.agent_type,
            });
        }
        let sources = state_sources
            .iter()
            .map(|&id| self.agents.agent(id))
            .collect::<Result<Vec<_>, _>>()?;
        let (first_aware, last_aware) = (to_item.first_aware(), to_item.last_aware());
        let copy_time = first_aware.saturating_sub(1);

        let mut redirected = 0;
        for event in self.events.iter_mut() {
            if !to_item.in_aware_times(event.time) {
                continue;
            }
            let src_matches = event.src_matches_agent(from_item);
            let dst_matches = event.dst_matches_agent(from_item);
            if !(src_matches || dst_matches) {
                continue;
            }
            if filter.is_some_and(|f| !f(&*event, from_item, to_item)) {
                continue;
            }
            if src_matches {
                event.override_src_agent(to_item);
            }
            if dst_matches {
                event.override_dst_agent(to_item);
            }
            redirected += 1;
        }

        // Attack targets pointing at `from` now point at `to` too
        let mut copies = Vec::new();
        let mut attack_targets: Vec<&AgentItem> = Vec::new();
        for event in self.events.iter().filter(|e| {
            e.state_change == StateChange::AttackTarget && e.dst_matches_agent(from_item)
        }) {
            let mut copy = event.clone();
            copy.override_time(copy_time);
            copy.override_dst_agent(to_item);
            copies.push(copy);

            let Some(target) = self.agents.resolve_src(event).and_then(|id| self.agents.get(id)) else {
                continue;
            };
            let targetable = self.events.iter().any(|e| {
                e.state_change == StateChange::Targetable && e.dst_agent == 1 && e.src_matches_agent(target)
            });
            if targetable && !attack_targets.iter().any(|a| a.id == target.id) {
                attack_targets.push(target);
            }
        }

        let positional_from_targets = copy_positional_from_attack_target && !attack_targets.is_empty();
        let mut state_events: Vec<&CombatItem> = Vec::new();
        for kinds in STATE_COPY_PRIORITY {
            state_events.extend(last_state_before(self.events.as_slice(), kinds, &sources, first_aware));
        }
        let positional_sources = if positional_from_targets { &attack_targets } else { &sources };
        for kind in POSITIONAL_STATES {
            state_events.extend(last_state_before(
                self.events.as_slice(),
                std::slice::from_ref(kind),
                positional_sources,
                first_aware,
            ));
        }
        for event in state_events {
            let mut copy = event.clone();
            copy.override_time(copy_time);
            copy.override_src_agent(to_item);
            copies.push(copy);
        }

        let copied = copies.len();
        if copied > 0 {
            self.events.extend(copies);
            sort_by_time(self.events.as_mut_slice());
        }

        // Minions spawned by `from` while `to` is live now belong to `to`
        let minions: Vec<AgentId> = [AgentType::Npc, AgentType::Gadget]
            .iter()
            .flat_map(|&t| self.agents.by_type(t).iter().copied())
            .filter(|&id| {
                let minion = &self.agents[id];
                minion.master() == Some(from) && first_aware <= minion.first_aware() && minion.first_aware() <= last_aware
            })
            .collect();
        for id in minions {
            self.agents[id].set_master_unchecked(Some(to));
        }

        self.agents[to].add_merge_from(from, first_aware, last_aware);
        self.stats.redirected_events += redirected;
        self.stats.copied_events += copied;
        tracing::debug!(%from, %to, redirected, copied, "Redirected agent events");
        Ok(redirected)
    }

    /// Move every event of `from` onto `to` regardless of validity windows.
    /// Dependents of `from` are re-parented onto `to`.
    pub fn redirect_all(
        &mut self,
        from: AgentId,
        to: AgentId,
        filter: Option<RedirectFilter<'_>>,
    ) -> Result<usize, ResolutionError> {
        let from_item = self.agents.agent(from)?;
        let to_item = self.agents.agent(to)?;
        let (first_aware, last_aware) = (from_item.first_aware(), from_item.last_aware());

        let mut redirected = 0;
        for event in self.events.iter_mut() {
            let src_matches = event.src_matches_agent(from_item);
            let dst_matches = event.dst_matches_agent(from_item);
            if !(src_matches || dst_matches) {
                continue;
            }
            if filter.is_some_and(|f| !f(&*event, from_item, to_item)) {
                continue;
            }
            if src_matches {
                event.override_src_agent(to_item);
            }
            if dst_matches {
                event.override_dst_agent(to_item);
            }
            redirected += 1;
        }

        self.agents.swap_masters(from, to);
        self.agents[to].add_merge_from(from, first_aware, last_aware);
        self.stats.redirected_events += redirected;
        Ok(redirected)
    }

    // ─── Regroup ────────────────────────────────────────────────────────────

    /// Collapse duplicate raw identities into single canonical agents.
    ///
    /// - NPCs sharing an instance id are regrouped when consecutive records
    ///   share species, master and squad combat segment.
    /// - Non-squad players get their team inferred from squad members' team
    ///   changes, then are regrouped by instance id.
    /// - Players are regrouped by account when configured.
    ///
    /// Returns the number of canonical agents created.
    pub fn regroup(&mut self) -> Result<usize, ResolutionError> {
        let mut segment_bounds = vec![i64::MIN];
        segment_bounds.extend(
            self.events
                .iter()
                .filter(|e| {
                    matches!(e.state_change, StateChange::SquadCombatStart | StateChange::SquadCombatEnd)
                })
                .map(|e| e.time),
        );
        segment_bounds.push(i64::MAX);

        let mut src_events: HashMap<AgentId, Vec<usize>> = HashMap::new();
        let mut dst_events: HashMap<AgentId, Vec<usize>> = HashMap::new();
        for (index, event) in self.events.iter().enumerate() {
            if let Some(id) = self.agents.resolve_src(event) {
                src_events.entry(id).or_default().push(index);
            }
            if let Some(id) = self.agents.resolve_dst(event) {
                dst_events.entry(id).or_default().push(index);
            }
        }

        let mut to_remove = Vec::new();
        let mut to_add = Vec::new();
        let index = EventIndex {
            src: &src_events,
            dst: &dst_events,
        };

        for run in self.npc_runs(&segment_bounds) {
            self.regroup_agents(&run, &index, &mut to_add, &mut to_remove)?;
        }

        if !self.agents.by_type(AgentType::NonSquadPlayer).is_empty() {
            self.assign_non_squad_teams();
            let agents = &*self.agents;
            let groups = group_by_key(agents, agents.by_type(AgentType::NonSquadPlayer), |a| Some(a.inst_id));
            for run in groups {
                self.regroup_agents(&run, &index, &mut to_add, &mut to_remove)?;
            }
        }

        if self.config.regroup_players_by_account {
            let agents = &*self.agents;
            let groups = group_by_key(agents, agents.by_type(AgentType::Player), |a| a.account);
            for run in groups {
                self.regroup_agents(&run, &index, &mut to_add, &mut to_remove)?;
            }
        }

        self.agents.replace_agents(&to_remove, &to_add);
        self.stats.regrouped_agents += to_remove.len();
        self.stats.created_agents += to_add.len();
        tracing::debug!(removed = to_remove.len(), added = to_add.len(), "Regrouped agents");
        Ok(to_add.len())
    }

    /// Consecutive same-instance NPC records eligible for regrouping.
    fn npc_runs(&self, segment_bounds: &[i64]) -> Vec<Vec<AgentId>> {
        let segment_of = |agent: &AgentItem| {
            let mid = midpoint(agent.first_aware(), agent.last_aware());
            let idx = segment_bounds.partition_point(|&b| b <= mid);
            segment_bounds[idx.saturating_sub(1)]
        };

        let mut by_inst: HashMap<u16, Vec<AgentId>> = HashMap::new();
        for &id in self.agents.by_type(AgentType::Npc) {
            let agent = &self.agents[id];
            if agent.species_id != 0 {
                by_inst.entry(agent.inst_id).or_default().push(id);
            }
        }
        let mut inst_ids: Vec<u16> = by_inst.keys().copied().collect();
        inst_ids.sort_unstable();

        let mut runs = Vec::new();
        for inst_id in inst_ids {
            let mut run: Vec<AgentId> = Vec::new();
            let mut run_segment = i64::MIN;
            for &id in &by_inst[&inst_id] {
                let current = &self.agents[id];
                let segment = segment_of(current);
                let same = run.first().is_some_and(|&head| {
                    let head = &self.agents[head];
                    head.species_id == current.species_id
                        && head.master() == current.master()
                        && segment == run_segment
                });
                if same {
                    run.push(id);
                } else {
                    if run.len() > 1 {
                        runs.push(std::mem::take(&mut run));
                    }
                    run = vec![id];
                    run_segment = segment;
                }
            }
            if run.len() > 1 {
                runs.push(run);
            }
        }
        runs
    }

    /// Mark non-squad players sharing the squad's majority team as friendly.
    fn assign_non_squad_teams(&mut self) {
        let include_coming_from = self.config.team_change_on_despawn;
        let mut team_changes: HashMap<AgentHandle, Vec<&CombatItem>> = HashMap::new();
        for event in self.events.iter().filter(|e| e.state_change == StateChange::TeamChange) {
            team_changes.entry(event.src_agent).or_default().push(event);
        }
        let teams_of = |agent: &AgentItem| -> Vec<u64> {
            let Some(changes) = team_changes.get(&agent.handle) else {
                return Vec::new();
            };
            let mut teams = Vec::new();
            for change in changes.iter().filter(|e| e.src_matches_agent(agent)) {
                teams.push(change.dst_agent);
                if include_coming_from {
                    teams.push(change.value as u64);
                }
            }
            teams.retain(|&t| t != 0);
            teams
        };

        // team -> (squad members seen on it, events, first seen)
        let mut tally: HashMap<u64, (usize, usize, usize)> = HashMap::new();
        let mut order = 0;
        for &id in self.agents.by_type(AgentType::Player) {
            let teams = teams_of(&self.agents[id]);
            let mut seen_by_member: Vec<u64> = Vec::new();
            for team in teams {
                let entry = tally.entry(team).or_insert_with(|| {
                    order += 1;
                    (0, 0, order)
                });
                entry.1 += 1;
                if !seen_by_member.contains(&team) {
                    seen_by_member.push(team);
                    entry.0 += 1;
                }
            }
        }
        let green_team = tally
            .iter()
            .max_by(|(_, a), (_, b)| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(b.2.cmp(&a.2)))
            .map(|(&team, _)| team);
        if green_team.is_none() {
            tracing::warn!("No squad team changes found, non-squad players left unfriendly");
        }

        let updates: Vec<(AgentId, Vec<u64>)> = self
            .agents
            .by_type(AgentType::NonSquadPlayer)
            .iter()
            .map(|&id| (id, teams_of(&self.agents[id])))
            .collect();
        for (id, teams) in updates {
            if teams.is_empty() {
                continue;
            }
            let agent = &mut self.agents[id];
            agent.is_friendly = green_team.is_some_and(|green| teams.contains(&green));
            agent.team_id = teams.first().copied();
        }
    }

    /// Fold `run` into one new pending agent spanning the union of their windows.
    fn regroup_agents(
        &mut self,
        run: &[AgentId],
        index: &EventIndex<'_>,
        to_add: &mut Vec<AgentId>,
        to_remove: &mut Vec<AgentId>,
    ) -> Result<Option<AgentId>, ResolutionError> {
        if run.is_empty() {
            return Err(ResolutionError::EmptyRegroup);
        }
        if run.len() == 1 {
            return Ok(None);
        }
        let mut ordered = run.to_vec();
        ordered.sort_by_key(|&id| self.agents[id].first_aware());
        for pair in ordered.windows(2) {
            if self.agents[pair[1]].first_aware() <= self.agents[pair[0]].last_aware() {
                return Err(ResolutionError::OverlappingIntervals {
                    first: pair[0],
                    second: pair[1],
                });
            }
        }

        let first_aware = ordered.iter().map(|&id| self.agents[id].first_aware()).min();
        let last_aware = ordered.iter().map(|&id| self.agents[id].last_aware()).max();
        let (Some(first_aware), Some(last_aware)) = (first_aware, last_aware) else {
            return Err(ResolutionError::EmptyRegroup);
        };
        let mut merged = self.agents[ordered[0]].fresh_copy();
        merged.override_aware_times(first_aware, last_aware)?;
        let merged_id = self.agents.reserve_agent(merged)?;

        for &id in &ordered {
            let target = &self.agents[merged_id];
            for &i in index.src.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                self.events[i].override_src_agent(target);
            }
            for &i in index.dst.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                self.events[i].override_dst_agent(target);
            }
            self.agents.swap_masters(id, merged_id);
            let (start, end) = (self.agents[id].first_aware(), self.agents[id].last_aware());
            self.agents[merged_id].add_regrouped_from(id, start, end);
        }

        to_remove.extend(ordered);
        to_add.push(merged_id);
        Ok(Some(merged_id))
    }

    // ─── Split ──────────────────────────────────────────────────────────────

    /// Combat entries and exits of an agent, in time order.
    pub fn combat_transitions(&self, agent: AgentId) -> Result<(Vec<CombatTransition>, Vec<i64>), ResolutionError> {
        let item = self.agents.agent(agent)?;
        let mut enters = Vec::new();
        let mut exits = Vec::new();
        for event in self.events.iter().filter(|e| e.src_matches_agent(item)) {
            match event.state_change {
                StateChange::EnterCombat => enters.push(CombatTransition {
                    time: event.time,
                    spec: event.value as u32,
                    subgroup: event.dst_agent as u16,
                }),
                StateChange::ExitCombat => exits.push(event.time),
                _ => {}
            }
        }
        Ok((enters, exits))
    }

    /// Split a player into contiguous sub-agents, one per build/subgroup.
    ///
    /// The exact switch time is unknown: a boundary is placed halfway between
    /// the last combat exit and the combat entry with the new build, or
    /// halfway between the agent's first appearance and that entry when there
    /// is no exit. Boundaries are approximate by construction.
    ///
    /// Sub-agents are englobed views; events keep referencing `agent`.
    /// Returns the created sub-agents in time order (empty if no split).
    pub fn split(
        &mut self,
        agent: AgentId,
        enters: &[CombatTransition],
        exits: &[i64],
        split_by_enter_combat: bool,
    ) -> Result<Vec<AgentId>, ResolutionError> {
        let original = self.agents.agent(agent)?;
        if !original.agent_type.is_player() {
            return Err(ResolutionError::NotAPlayer {
                operation: "split",
                agent,
                agent_type: original.agent_type,
            });
        }

        let mut candidates = Vec::new();
        let (mut previous_spec, mut previous_subgroup) = (original.spec, original.subgroup);
        if split_by_enter_combat {
            let ignore_ungrouped = original.agent_type == AgentType::Player;
            for enter in enters {
                if (ignore_ungrouped && enter.subgroup == 0) || enter.spec == 0 {
                    continue;
                }
                if enter.spec == previous_spec && enter.subgroup == previous_subgroup {
                    continue;
                }
                previous_spec = enter.spec;
                previous_subgroup = enter.subgroup;
                let copy_from = original
                    .regrouped()
                    .iter()
                    .rev()
                    .find(|r| r.contains(enter.time))
                    .map_or(agent, |r| r.merged);
                candidates.push(SplitCandidate {
                    start: enter.time,
                    copy_from,
                    spec: enter.spec,
                    subgroup: enter.subgroup,
                    check_exit: true,
                });
            }
        }
        for regrouped in original.regrouped() {
            let source = self.agents.agent(regrouped.merged)?;
            candidates.push(SplitCandidate {
                start: regrouped.start,
                copy_from: regrouped.merged,
                spec: source.spec,
                subgroup: source.subgroup,
                check_exit: false,
            });
        }
        candidates.sort_by_key(|c| c.start);

        let mut created = Vec::new();
        let mut previous = agent;
        let mut previous_start = original.first_aware().saturating_sub(1);
        let (mut previous_spec, mut previous_subgroup) = (original.spec, original.subgroup);
        for candidate in candidates {
            if candidate.spec == previous_spec && candidate.subgroup == previous_subgroup {
                continue;
            }
            previous_spec = candidate.spec;
            previous_subgroup = candidate.subgroup;

            let mut start = candidate.start;
            let previous_exit = if candidate.check_exit {
                exits
                    .iter()
                    .copied()
                    .filter(|&t| t < start && t > previous_start)
                    .max()
            } else {
                None
            };
            if let Some(exit) = previous_exit {
                start = midpoint(exit + 1, start);
            }
            let end = self.agents[previous].last_aware();
            let first_split = created.is_empty();
            if first_split && candidate.check_exit && previous_exit.is_none() {
                start = midpoint(self.agents[previous].first_aware(), start);
            }
            let start = start.max(self.agents[previous].first_aware() + 1);
            if start > end {
                tracing::debug!(%agent, time = candidate.start, "Build change too late to split, ignored");
                continue;
            }

            if first_split {
                let head = &self.agents[previous];
                let (first_aware, spec, subgroup) = (head.first_aware(), head.spec, head.subgroup);
                let head = self.agents.add_custom_agent_from(previous, first_aware, start - 1, spec, subgroup)?;
                self.agents.set_englobing(head, agent);
                created.push(head);
                previous = head;
            }

            let next = self.agents.add_custom_agent_from(
                candidate.copy_from,
                start,
                end,
                candidate.spec,
                candidate.subgroup,
            )?;
            self.agents.set_englobing(next, agent);
            let first_aware = self.agents[previous].first_aware();
            self.agents[previous].override_aware_times(first_aware, start - 1)?;
            created.push(next);
            previous = next;
            previous_start = start;
        }

        if !created.is_empty() {
            self.stats.split_agents += 1;
            tracing::debug!(%agent, parts = created.len(), "Split player by build");
        }
        Ok(created)
    }

    /// Split every player and non-squad player along their build changes.
    pub fn split_players(&mut self) -> Result<usize, ResolutionError> {
        let players: Vec<AgentId> = [AgentType::Player, AgentType::NonSquadPlayer]
            .iter()
            .flat_map(|&t| self.agents.by_type(t).iter().copied())
            .collect();
        let by_enter_combat = self.config.split_players_by_enter_combat;
        let mut split = 0;
        for id in players {
            let (enters, exits) = self.combat_transitions(id)?;
            if !self.split(id, &enters, &exits, by_enter_combat)?.is_empty() {
                split += 1;
            }
        }
        Ok(split)
    }
}

/// Event indices per resolved agent, built once per regroup pass.
struct EventIndex<'m> {
    src: &'m HashMap<AgentId, Vec<usize>>,
    dst: &'m HashMap<AgentId, Vec<usize>>,
}

/// Group agents by a key, keeping groups of two or more in first-seen order.
fn group_by_key<K, F>(agents: &AgentDirectory, ids: &[AgentId], key: F) -> Vec<Vec<AgentId>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&AgentItem) -> Option<K>,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<AgentId>> = Vec::new();
    for &id in ids {
        let Some(k) = key(&agents[id]) else {
            continue;
        };
        let slot = *slots.entry(k).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(id);
    }
    groups.retain(|g| g.len() > 1);
    groups
}

/// Latest event of one of `kinds` from any of `sources` at or before `time`.
fn last_state_before<'e>(
    events: &'e [CombatItem],
    kinds: &[StateChange],
    sources: &[&AgentItem],
    time: i64,
) -> Option<&'e CombatItem> {
    events.iter().rev().find(|e| {
        e.time <= time && kinds.contains(&e.state_change) && sources.iter().any(|s| e.src_matches_agent(s))
    })
}
