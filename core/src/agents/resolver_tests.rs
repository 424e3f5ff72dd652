//! Tests for agent identity resolution
//!
//! Builds small hand-written event streams and checks how redirect, regroup
//! and split rewrite events and agents.

use crate::combat_log::{AgentHandle, CombatItem, StateChange};
use crate::context::{ResolverConfig, intern_account};

use super::{AgentDirectory, AgentId, AgentItem, AgentStatus, AgentType, MergedAgent, RedirectFilter, ResolutionError, Resolver};

// ═══════════════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn npc(handle: AgentHandle, inst_id: u16, species: i32, first: i64, last: i64) -> AgentItem {
    AgentItem::new(handle, inst_id, AgentType::Npc, first, last).with_species(species)
}

fn player(handle: AgentHandle, inst_id: u16, first: i64, last: i64, spec: u32, subgroup: u16) -> AgentItem {
    AgentItem::new(handle, inst_id, AgentType::Player, first, last).with_build(spec, subgroup)
}

fn non_squad(handle: AgentHandle, inst_id: u16, first: i64, last: i64) -> AgentItem {
    AgentItem::new(handle, inst_id, AgentType::NonSquadPlayer, first, last)
}

fn damage(time: i64, src: AgentHandle, dst: AgentHandle) -> CombatItem {
    CombatItem {
        time,
        src_agent: src,
        dst_agent: dst,
        value: 100,
        ..Default::default()
    }
}

fn state(time: i64, state_change: StateChange, src: AgentHandle, value: i64) -> CombatItem {
    CombatItem {
        value,
        ..CombatItem::state(time, state_change, src)
    }
}

fn enter_combat(time: i64, src: AgentHandle, spec: u32, subgroup: u16) -> CombatItem {
    CombatItem {
        dst_agent: subgroup as AgentHandle,
        value: spec as i64,
        ..CombatItem::state(time, StateChange::EnterCombat, src)
    }
}

fn team_change(time: i64, src: AgentHandle, into: u64, coming_from: i64) -> CombatItem {
    CombatItem {
        dst_agent: into,
        value: coming_from,
        ..CombatItem::state(time, StateChange::TeamChange, src)
    }
}

fn add(directory: &mut AgentDirectory, agent: AgentItem) -> AgentId {
    directory.add_agent(agent).expect("valid agent")
}

// ═══════════════════════════════════════════════════════════════════════════
// Directory
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_directory_resolves_handle_by_time() {
    let mut dir = AgentDirectory::new();
    let early = add(&mut dir, npc(0x10, 1, 100, 0, 100));
    let late = add(&mut dir, npc(0x10, 1, 100, 200, 300));

    assert_eq!(dir.get_agent(0x10, 50), Some(early));
    assert_eq!(dir.get_agent(0x10, 250), Some(late));
    assert_eq!(dir.get_agent(0x10, 150), None);
    assert_eq!(dir.get_agent(0, 150), Some(AgentId::UNKNOWN));
    assert!(matches!(
        dir.resolve_agent(0x10, 150),
        Err(ResolutionError::MissingAgent { handle: 0x10, time: 150 })
    ));
    assert_eq!(dir.by_type(AgentType::Npc), &[early, late]);
    assert!(dir.by_type(AgentType::Player).is_empty());
}

#[test]
fn test_directory_rejects_malformed_interval() {
    let mut dir = AgentDirectory::new();
    let result = dir.add_agent(npc(0x10, 1, 100, 300, 200));
    assert!(matches!(result, Err(ResolutionError::MalformedInterval { .. })));
    assert!(dir.is_empty());
}

#[test]
fn test_set_master_requires_overlap() {
    let mut dir = AgentDirectory::new();
    let minion = add(&mut dir, npc(0x10, 1, 100, 0, 100));
    let stranger = add(&mut dir, npc(0x11, 2, 200, 200, 300));
    let owner = add(&mut dir, npc(0x12, 3, 300, 50, 250));

    assert!(matches!(
        dir.set_master(minion, stranger),
        Err(ResolutionError::MasterOutsideInterval { .. })
    ));
    assert_eq!(dir[minion].master(), None);

    dir.set_master(minion, owner).expect("intervals overlap");
    assert_eq!(dir[minion].master(), Some(owner));

    let orphan = npc(0x13, 4, 400, 500, 600).with_master(owner);
    assert!(matches!(
        dir.add_agent(orphan),
        Err(ResolutionError::MasterOutsideInterval { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// Redirect
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_redirect_rejects_players() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, player(0x1, 1, 0, 1000, 10, 1));
    let to = add(&mut dir, npc(0x20, 2, 200, 500, 1000));
    let mut events = vec![damage(600, 0x1, 0x20)];
    let config = ResolverConfig::default();

    let mut resolver = Resolver::new(&mut events, &mut dir, &config);
    let result = resolver.redirect(from, &[from], to, false);
    assert!(matches!(
        result,
        Err(ResolutionError::IncompatibleAgentTypes {
            from_type: AgentType::Player,
            ..
        })
    ));
    assert_eq!(events[0].src_override(), None);
}

#[test]
fn test_redirect_leaves_events_outside_window() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, npc(0x10, 1, 100, 0, 1000));
    let to = add(&mut dir, npc(0x20, 2, 200, 500, 1000));
    let mut events = vec![
        damage(100, 0x10, 0x99),
        damage(600, 0x10, 0x99),
        damage(700, 0x99, 0x10),
    ];
    let config = ResolverConfig::default();

    let redirected = Resolver::new(&mut events, &mut dir, &config)
        .redirect(from, &[], to, false)
        .expect("npc redirect");

    assert_eq!(redirected, 2);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].src_override(), None);
    assert_eq!(events[0].src_agent, 0x10);
    assert_eq!(events[1].src_override(), Some(to));
    assert_eq!(events[1].src_agent, 0x20);
    assert_eq!(events[2].dst_override(), Some(to));
    assert_eq!(events[2].src_override(), None);
}

#[test]
fn test_redirect_copies_last_known_state() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, npc(0x10, 1, 100, 0, 1000));
    let to = add(&mut dir, npc(0x20, 2, 100, 500, 1000));
    let mut events = vec![
        state(100, StateChange::HealthUpdate, 0x10, 9000),
        state(300, StateChange::Position, 0x10, 3),
        state(400, StateChange::HealthUpdate, 0x10, 5000),
        damage(550, 0x10, 0x99),
        state(600, StateChange::HealthUpdate, 0x10, 4000),
    ];
    let config = ResolverConfig::default();

    let mut resolver = Resolver::new(&mut events, &mut dir, &config);
    let redirected = resolver.redirect(from, &[from], to, false).expect("npc redirect");
    assert_eq!(redirected, 2);
    assert_eq!(resolver.stats().copied_events, 2);

    assert_eq!(events.len(), 7);
    assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    let copies: Vec<&CombatItem> = events.iter().filter(|e| e.time == 499).collect();
    assert_eq!(copies.len(), 2);
    assert_eq!(copies[0].state_change, StateChange::HealthUpdate);
    assert_eq!(copies[0].value, 5000);
    assert_eq!(copies[1].state_change, StateChange::Position);
    assert!(copies.iter().all(|c| c.src_override() == Some(to)));
}

#[test]
fn test_redirect_takes_position_from_attack_target() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, npc(0x10, 1, 100, 0, 1000));
    let to = add(&mut dir, npc(0x20, 2, 100, 500, 1000));
    add(&mut dir, AgentItem::new(0x30, 3, AgentType::Gadget, 0, 1000));
    let mut events = vec![
        CombatItem {
            dst_agent: 0x10,
            ..CombatItem::state(50, StateChange::AttackTarget, 0x30)
        },
        CombatItem {
            dst_agent: 1,
            ..CombatItem::state(60, StateChange::Targetable, 0x30)
        },
        state(200, StateChange::Position, 0x30, 7),
        state(300, StateChange::Position, 0x10, 3),
    ];
    let config = ResolverConfig::default();

    Resolver::new(&mut events, &mut dir, &config)
        .redirect(from, &[from], to, true)
        .expect("npc redirect");

    let copies: Vec<&CombatItem> = events.iter().filter(|e| e.time == 499).collect();
    assert_eq!(copies.len(), 2);
    let attack_target = copies
        .iter()
        .find(|c| c.state_change == StateChange::AttackTarget)
        .expect("attack target copied");
    assert_eq!(attack_target.dst_override(), Some(to));
    let position = copies
        .iter()
        .find(|c| c.state_change == StateChange::Position)
        .expect("position copied");
    assert_eq!(position.value, 7);
    assert_eq!(position.src_override(), Some(to));
}

#[test]
fn test_redirect_reparents_minions_and_records_provenance() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, npc(0x10, 1, 100, 0, 1000));
    let to = add(&mut dir, npc(0x20, 2, 100, 500, 1000));
    let late_minion = add(&mut dir, npc(0x40, 4, 300, 600, 700).with_master(from));
    let early_minion = add(&mut dir, npc(0x41, 5, 300, 100, 200).with_master(from));
    let mut events = Vec::new();
    let config = ResolverConfig::default();

    Resolver::new(&mut events, &mut dir, &config)
        .redirect(from, &[from], to, false)
        .expect("npc redirect");

    assert_eq!(dir[late_minion].master(), Some(to));
    assert_eq!(dir[early_minion].master(), Some(from));
    assert_eq!(
        dir[to].merged_from(),
        &[MergedAgent {
            merged: from,
            start: 500,
            end: 1000
        }]
    );
}

#[test]
fn test_redirect_filter_vetoes_events() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, npc(0x10, 1, 100, 0, 1000));
    let to = add(&mut dir, npc(0x20, 2, 100, 500, 1000));
    let mut events = vec![
        damage(600, 0x10, 0x99),
        state(700, StateChange::HealthUpdate, 0x10, 5000),
    ];
    let config = ResolverConfig::default();
    let only_direct: RedirectFilter<'_> = &|e, _, _| !e.is_state_change();

    let redirected = Resolver::new(&mut events, &mut dir, &config)
        .redirect_filtered(from, &[], to, false, Some(only_direct))
        .expect("npc redirect");

    assert_eq!(redirected, 1);
    assert_eq!(events[0].src_override(), Some(to));
    assert_eq!(events[1].src_override(), None);
}

#[test]
fn test_redirect_all_ignores_windows() {
    let mut dir = AgentDirectory::new();
    let from = add(&mut dir, npc(0x10, 1, 100, 0, 400));
    let to = add(&mut dir, npc(0x20, 2, 100, 500, 1000));
    let minion = add(&mut dir, npc(0x40, 4, 300, 100, 200).with_master(from));
    let mut events = vec![damage(100, 0x10, 0x99), damage(300, 0x99, 0x10)];
    let config = ResolverConfig::default();

    let redirected = Resolver::new(&mut events, &mut dir, &config)
        .redirect_all(from, to, None)
        .expect("redirect all");

    assert_eq!(redirected, 2);
    assert_eq!(events[0].src_override(), Some(to));
    assert_eq!(events[1].dst_override(), Some(to));
    assert_eq!(dir[minion].master(), Some(to));
    assert_eq!(dir[to].merged_from()[0].start, 0);
    assert_eq!(dir[to].merged_from()[0].end, 400);
}

// ═══════════════════════════════════════════════════════════════════════════
// Regroup
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_regroup_colliding_instance_ids() {
    let mut dir = AgentDirectory::new();
    let first = add(&mut dir, npc(0x10, 7, 100, 0, 100));
    let second = add(&mut dir, npc(0x11, 7, 100, 150, 300));
    let mut events = vec![
        damage(50, 0x10, 0x99),
        damage(200, 0x99, 0x11),
        damage(250, 0x11, 0x99),
    ];
    let config = ResolverConfig::default();

    let created = Resolver::new(&mut events, &mut dir, &config)
        .regroup()
        .expect("disjoint windows");
    assert_eq!(created, 1);

    let npcs = dir.by_type(AgentType::Npc);
    assert_eq!(npcs.len(), 1);
    let merged = npcs[0];
    assert_eq!(dir[merged].first_aware(), 0);
    assert_eq!(dir[merged].last_aware(), 300);
    assert_eq!(dir[merged].regrouped().len(), 2);
    assert_eq!(dir[merged].regrouped()[1].start, 150);
    assert_eq!(dir[first].status(), AgentStatus::Retired);
    assert_eq!(dir[second].status(), AgentStatus::Retired);

    assert_eq!(events[0].src_override(), Some(merged));
    assert_eq!(events[1].dst_override(), Some(merged));
    assert_eq!(events[2].src_override(), Some(merged));
    assert!(events.iter().all(|e| dir.resolve_src(e) == Some(merged) || dir.resolve_dst(e) == Some(merged)));
}

#[test]
fn test_regroup_keeps_distinct_runs_apart() {
    let mut dir = AgentDirectory::new();
    // Different squad combat segments
    add(&mut dir, npc(0x10, 7, 100, 0, 100));
    add(&mut dir, npc(0x11, 7, 100, 150, 300));
    // Different species
    add(&mut dir, npc(0x20, 8, 100, 0, 100));
    add(&mut dir, npc(0x21, 8, 101, 150, 300));
    // Unidentified species
    add(&mut dir, npc(0x30, 9, 0, 0, 100));
    add(&mut dir, npc(0x31, 9, 0, 150, 300));
    let mut events = vec![
        CombatItem::state(120, StateChange::SquadCombatEnd, 0),
        CombatItem::state(140, StateChange::SquadCombatStart, 0),
    ];
    let config = ResolverConfig::default();

    let created = Resolver::new(&mut events, &mut dir, &config)
        .regroup()
        .expect("nothing to merge");
    assert_eq!(created, 0);
    assert_eq!(dir.by_type(AgentType::Npc).len(), 6);
}

#[test]
fn test_regroup_overlapping_windows_is_fatal() {
    let mut dir = AgentDirectory::new();
    add(&mut dir, npc(0x10, 7, 100, 0, 200));
    add(&mut dir, npc(0x11, 7, 100, 150, 300));
    let mut events = Vec::new();
    let config = ResolverConfig::default();

    let result = Resolver::new(&mut events, &mut dir, &config).regroup();
    assert!(matches!(result, Err(ResolutionError::OverlappingIntervals { .. })));
}

#[test]
fn test_regroup_players_by_account() {
    let build = |dir: &mut AgentDirectory| {
        add(dir, player(0x1, 1, 0, 100, 10, 1).with_account(intern_account(":Tester.1234")));
        add(dir, player(0x2, 2, 200, 400, 10, 1).with_account(intern_account("Tester.1234")));
    };

    let mut dir = AgentDirectory::new();
    build(&mut dir);
    let mut events = Vec::new();
    let config = ResolverConfig::default();
    Resolver::new(&mut events, &mut dir, &config).regroup().expect("regroup");
    let players = dir.by_type(AgentType::Player);
    assert_eq!(players.len(), 1);
    assert_eq!(dir[players[0]].first_aware(), 0);
    assert_eq!(dir[players[0]].last_aware(), 400);
    assert_eq!(dir[players[0]].account, Some(intern_account("Tester.1234")));

    let mut dir = AgentDirectory::new();
    build(&mut dir);
    let config = ResolverConfig {
        regroup_players_by_account: false,
        ..ResolverConfig::default()
    };
    Resolver::new(&mut events, &mut dir, &config).regroup().expect("regroup");
    assert_eq!(dir.by_type(AgentType::Player).len(), 2);
}

#[test]
fn test_non_squad_team_follows_squad_majority() {
    let mut dir = AgentDirectory::new();
    add(&mut dir, player(0x1, 1, 0, 5000, 10, 1));
    add(&mut dir, player(0x2, 2, 0, 5000, 10, 1));
    add(&mut dir, non_squad(0x5, 5, 0, 1000));
    let enemy = add(&mut dir, non_squad(0x6, 6, 0, 1000));
    add(&mut dir, non_squad(0x7, 5, 2000, 3000));
    let mut events = vec![
        team_change(10, 0x1, 705, 0),
        team_change(10, 0x2, 705, 0),
        team_change(10, 0x2, 706, 0),
        team_change(10, 0x5, 705, 0),
        team_change(10, 0x6, 706, 0),
    ];
    let config = ResolverConfig::default();

    let created = Resolver::new(&mut events, &mut dir, &config)
        .regroup()
        .expect("regroup");
    assert_eq!(created, 1);

    let non_squad = dir.by_type(AgentType::NonSquadPlayer);
    assert_eq!(non_squad.len(), 2);
    let merged = non_squad
        .iter()
        .copied()
        .find(|&id| id != enemy)
        .expect("regrouped non-squad player");
    assert_eq!(dir[merged].last_aware(), 3000);
    assert!(dir[merged].is_friendly);
    assert_eq!(dir[merged].team_id, Some(705));
    assert!(!dir[enemy].is_friendly);
    assert_eq!(dir[enemy].team_id, Some(706));
}

#[test]
fn test_non_squad_team_tie_goes_to_most_changes() {
    let mut dir = AgentDirectory::new();
    add(&mut dir, player(0x1, 1, 0, 5000, 10, 1));
    add(&mut dir, player(0x2, 2, 0, 5000, 10, 1));
    let first_seen = add(&mut dir, non_squad(0x5, 5, 0, 1000));
    let busier = add(&mut dir, non_squad(0x6, 6, 0, 1000));
    // Both teams have two squad members; 706 has three changes to 705's two
    let mut events = vec![
        team_change(10, 0x1, 705, 0),
        team_change(20, 0x1, 706, 0),
        team_change(30, 0x1, 706, 0),
        team_change(10, 0x2, 705, 0),
        team_change(20, 0x2, 706, 0),
        team_change(10, 0x5, 705, 0),
        team_change(10, 0x6, 706, 0),
    ];
    let config = ResolverConfig::default();

    Resolver::new(&mut events, &mut dir, &config).regroup().expect("regroup");

    assert!(dir[busier].is_friendly);
    assert!(!dir[first_seen].is_friendly);
}

fn despawn_teams(team_change_on_despawn: bool) -> (bool, bool) {
    let mut dir = AgentDirectory::new();
    add(&mut dir, player(0x1, 1, 0, 5000, 10, 1));
    add(&mut dir, player(0x2, 2, 0, 5000, 10, 1));
    add(&mut dir, player(0x3, 3, 0, 5000, 10, 1));
    let old_team = add(&mut dir, non_squad(0x5, 5, 0, 1000));
    let new_team = add(&mut dir, non_squad(0x6, 6, 0, 1000));
    let mut events = vec![
        team_change(10, 0x1, 706, 705),
        team_change(10, 0x2, 706, 705),
        team_change(10, 0x3, 705, 0),
        team_change(10, 0x5, 705, 0),
        team_change(10, 0x6, 706, 0),
    ];
    let config = ResolverConfig {
        team_change_on_despawn,
        ..ResolverConfig::default()
    };

    Resolver::new(&mut events, &mut dir, &config).regroup().expect("regroup");
    (dir[old_team].is_friendly, dir[new_team].is_friendly)
}

#[test]
fn test_coming_from_team_counts_only_when_enabled() {
    // With the flag, 705 gains the two members that left it
    assert_eq!(despawn_teams(true), (true, false));
    assert_eq!(despawn_teams(false), (false, true));
}

// ═══════════════════════════════════════════════════════════════════════════
// Split
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_split_between_exit_and_enter() {
    let mut dir = AgentDirectory::new();
    let p = add(&mut dir, player(0x1, 1, 0, 10_000, 10, 1));
    let mut events = vec![
        enter_combat(100, 0x1, 10, 1),
        state(3000, StateChange::ExitCombat, 0x1, 0),
        enter_combat(5000, 0x1, 20, 1),
    ];
    let config = ResolverConfig::default();

    let mut resolver = Resolver::new(&mut events, &mut dir, &config);
    let (enters, exits) = resolver.combat_transitions(p).expect("known agent");
    assert_eq!(enters.len(), 2);
    assert_eq!(exits, vec![3000]);
    let parts = resolver.split(p, &enters, &exits, true).expect("player split");

    assert_eq!(parts.len(), 2);
    let (head, tail) = (parts[0], parts[1]);
    assert_eq!((dir[head].first_aware(), dir[head].last_aware()), (0, 3999));
    assert_eq!((dir[tail].first_aware(), dir[tail].last_aware()), (4000, 10_000));
    assert_eq!(dir[head].spec, 10);
    assert_eq!(dir[tail].spec, 20);
    assert_eq!(dir[tail].englobing(), Some(p));
    assert_eq!(dir[tail].status(), AgentStatus::Englobed);
    assert_eq!(dir[p].englobed(), &[head, tail]);
    assert!(dir[p].is_active());
    assert_eq!(dir.englobed_agent_at(p, 100), head);
    assert_eq!(dir.englobed_agent_at(p, 4500), tail);
}

#[test]
fn test_split_without_exit_uses_half_window() {
    let mut dir = AgentDirectory::new();
    let p = add(&mut dir, player(0x1, 1, 0, 10_000, 10, 1));
    let mut events = vec![enter_combat(6000, 0x1, 20, 2)];
    let config = ResolverConfig::default();

    let mut resolver = Resolver::new(&mut events, &mut dir, &config);
    assert_eq!(resolver.split_players().expect("player split"), 1);

    let parts = dir[p].englobed().to_vec();
    assert_eq!(parts.len(), 2);
    assert_eq!(dir[parts[0]].last_aware(), 2999);
    assert_eq!(dir[parts[1]].first_aware(), 3000);
    assert_eq!(dir[parts[1]].subgroup, 2);
}

#[test]
fn test_split_ignores_unknown_builds() {
    let mut dir = AgentDirectory::new();
    let p = add(&mut dir, player(0x1, 1, 0, 10_000, 10, 1));
    let mut events = vec![enter_combat(5000, 0x1, 20, 0), enter_combat(6000, 0x1, 0, 2)];
    let config = ResolverConfig::default();

    let mut resolver = Resolver::new(&mut events, &mut dir, &config);
    let (enters, exits) = resolver.combat_transitions(p).expect("known agent");
    let parts = resolver.split(p, &enters, &exits, true).expect("player split");
    assert!(parts.is_empty());
    assert!(dir[p].englobed().is_empty());
}

#[test]
fn test_split_rejects_npcs() {
    let mut dir = AgentDirectory::new();
    let boss = add(&mut dir, npc(0x10, 1, 100, 0, 1000));
    let mut events = Vec::new();
    let config = ResolverConfig::default();

    let result = Resolver::new(&mut events, &mut dir, &config).split(boss, &[], &[], true);
    assert!(matches!(result, Err(ResolutionError::NotAPlayer { .. })));
}

#[test]
fn test_split_follows_regrouped_provenance() {
    let mut dir = AgentDirectory::new();
    add(&mut dir, player(0x1, 1, 0, 1000, 10, 1).with_account(intern_account("Tester.1234")));
    add(&mut dir, player(0x2, 2, 2000, 3000, 20, 1).with_account(intern_account("Tester.1234")));
    let mut events = Vec::new();
    let config = ResolverConfig::default();

    let mut resolver = Resolver::new(&mut events, &mut dir, &config);
    resolver.regroup().expect("regroup");
    assert_eq!(resolver.split_players().expect("player split"), 1);
    let stats = resolver.finish();
    assert_eq!(stats.regrouped_agents, 2);
    assert_eq!(stats.split_agents, 1);

    let merged = dir.by_type(AgentType::Player)[0];
    let late = dir.englobed_agent_at(merged, 2500);
    assert_ne!(late, merged);
    assert_eq!(dir[late].spec, 20);
    assert_eq!(dir[late].handle, 0x2);
    assert_eq!(dir[late].first_aware(), 2000);
    let early = dir.englobed_agent_at(merged, 500);
    assert_eq!(dir[early].spec, 10);
    assert_eq!(dir[early].last_aware(), 1999);
}
