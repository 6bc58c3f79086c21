//! Standalone battle simulator and manual `CreateBattle` publisher.
//!
//! Two modes, selected by the first argument:
//! - (default) `simulate`: drives the domain engine directly, no Redis,
//!   letting an operator pick attack/block zones each turn via an
//!   interactive prompt. Falls back to a scripted transcript when not
//!   attached to a terminal.
//! - `create-battle`: publishes a `CreateBattle` command onto the Redis
//!   stream bus for a running `fistfight-server` to pick up (spec.md §6,
//!   SPEC_FULL.md §A).

use std::env;

use dialoguer::{theme::ColorfulTheme, Select};

use fistfight_engine::combat_math::derive_stats;
use fistfight_engine::domain::resolve;
use fistfight_service::CreateBattleCommand;
use fistfight_types::{
    BattleDomainState, BattleEvent, BattleId, CombatBalance, MatchId, Phase, PlayerAction, PlayerId, PlayerState,
    PlayerStats, Ruleset, UtcMillis, Zone,
};

const CREATE_BATTLE_STREAM: &str = "bus:create_battle";

fn is_terminal() -> bool {
    dialoguer::console::Term::stderr().is_term()
}

fn default_stats() -> PlayerStats {
    PlayerStats { strength: 5.0, stamina: 10.0, agility: 1.0, intuition: 1.0 }
}

fn initial_state(seed: u32) -> BattleDomainState {
    let ruleset = Ruleset { version: 1, turn_seconds: 10, no_action_limit: 3, seed, combat_balance: CombatBalance::default() };
    let balance = ruleset.combat_balance;
    let stats_a = default_stats();
    let stats_b = default_stats();
    let derived_a = derive_stats(&stats_a, &balance);
    let derived_b = derive_stats(&stats_b, &balance);

    BattleDomainState {
        battle_id: BattleId::from("local-sim"),
        match_id: MatchId::from("local-sim"),
        player_a_id: PlayerId::from("player-a"),
        player_b_id: PlayerId::from("player-b"),
        ruleset,
        phase: Phase::TurnOpen,
        turn_index: 1,
        no_action_streak_both: 0,
        last_resolved_turn_index: 0,
        player_a: PlayerState { player_id: PlayerId::from("player-a"), max_hp: derived_a.hp_max, current_hp: derived_a.hp_max, stats: stats_a },
        player_b: PlayerState { player_id: PlayerId::from("player-b"), max_hp: derived_b.hp_max, current_hp: derived_b.hp_max, stats: stats_b },
        deadline_unix_ms: 0,
        version: 1,
        end_reason: None,
        winner_player_id: None,
    }
}

fn pick_zone(prompt: &str) -> Zone {
    let names = ["Head", "Chest", "Belly", "Waist", "Legs"];
    let idx = Select::with_theme(&ColorfulTheme::default()).with_prompt(prompt).items(&names).default(0).interact().unwrap();
    Zone::ALL[idx]
}

fn pick_action_interactive(who: &str) -> PlayerAction {
    let attack_zone = pick_zone(&format!("{who}: attack zone"));
    let block_choices = ["No block", "Single zone", "Two adjacent zones"];
    let block_idx =
        Select::with_theme(&ColorfulTheme::default()).with_prompt(format!("{who}: block pattern")).items(&block_choices).default(0).interact().unwrap();

    match block_idx {
        0 => PlayerAction::Attack { attack_zone, block_zone_primary: None, block_zone_secondary: None },
        1 => {
            let primary = pick_zone(&format!("{who}: block zone"));
            PlayerAction::Attack { attack_zone, block_zone_primary: Some(primary), block_zone_secondary: None }
        }
        _ => {
            let primary = pick_zone(&format!("{who}: block zone (primary)"));
            let secondary_candidates: Vec<Zone> = Zone::ALL.into_iter().filter(|z| *z != primary && primary.is_adjacent_to(*z)).collect();
            if secondary_candidates.is_empty() {
                PlayerAction::Attack { attack_zone, block_zone_primary: Some(primary), block_zone_secondary: None }
            } else {
                let names: Vec<String> = secondary_candidates.iter().map(|z| format!("{z:?}")).collect();
                let sidx = Select::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("{who}: second block zone (adjacent to {primary:?})"))
                    .items(&names)
                    .default(0)
                    .interact()
                    .unwrap();
                PlayerAction::Attack { attack_zone, block_zone_primary: Some(primary), block_zone_secondary: Some(secondary_candidates[sidx]) }
            }
        }
    }
}

/// A deterministic, non-interactive stand-in for a player: cycles through
/// attack zones turn over turn, never blocks. Used for both sides when
/// this binary isn't attached to a terminal.
fn scripted_action(cycle_index: u64) -> PlayerAction {
    let attack_zone = Zone::ALL[(cycle_index as usize) % Zone::ALL.len()];
    PlayerAction::Attack { attack_zone, block_zone_primary: None, block_zone_secondary: None }
}

fn print_events(events: &[BattleEvent]) {
    for event in events {
        match event {
            BattleEvent::PlayerDamaged { player_id, damage, remaining_hp, .. } => {
                println!("  {player_id} takes {damage} damage ({remaining_hp} hp left)");
            }
            BattleEvent::TurnResolved { turn_index } => {
                println!("  turn {turn_index} resolved, no damage dealt");
            }
            BattleEvent::BattleEnded { reason, winner_player_id } => match winner_player_id {
                Some(winner) => println!("  battle ended ({reason:?}): {winner} wins"),
                None => println!("  battle ended ({reason:?}): no winner"),
            },
        }
    }
}

fn run_simulation(is_tty: bool, seed: u32) {
    let mut state = initial_state(seed);
    println!("\n  =========================");
    println!("    F I S T F I G H T");
    println!("  =========================\n");
    println!("  seed {seed}, {} hp each\n", state.player_a.max_hp);

    loop {
        println!(
            "  turn {} | {}: {} hp | {}: {} hp",
            state.turn_index, state.player_a.player_id, state.player_a.current_hp, state.player_b.player_id, state.player_b.current_hp
        );

        let (action_a, action_b) = if is_tty {
            (pick_action_interactive(state.player_a.player_id.as_str()), pick_action_interactive(state.player_b.player_id.as_str()))
        } else {
            (scripted_action(state.turn_index), scripted_action(state.turn_index + 1))
        };

        let turn_index = state.turn_index;
        state.phase = Phase::Resolving;
        let (mut new_state, events) =
            resolve(&state, turn_index, action_a, action_b).expect("locally managed state always satisfies resolve's preconditions");
        print_events(&events);

        if new_state.phase == Phase::Ended {
            state = new_state;
            break;
        }

        new_state.turn_index = turn_index + 1;
        new_state.phase = Phase::TurnOpen;
        state = new_state;
    }

    println!("\n  === BATTLE OVER ===");
    println!("  {}: {} hp | {}: {} hp", state.player_a.player_id, state.player_a.current_hp, state.player_b.player_id, state.player_b.current_hp);
}

fn parse_seed(args: &[String]) -> u32 {
    let mut i = 0;
    while i < args.len() {
        if (args[i] == "--seed" || args[i] == "-s") && i + 1 < args.len() {
            if let Ok(seed) = args[i + 1].parse() {
                return seed;
            }
        }
        i += 1;
    }
    42
}

async fn create_battle_command(args: &[String]) {
    let mut battle_id = BattleId::generate();
    let mut match_id = MatchId::from("manual-match");
    let mut player_a_id = PlayerId::from("player-a");
    let mut player_b_id = PlayerId::from("player-b");

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--battle-id" if i + 1 < args.len() => {
                battle_id = BattleId::from(args[i + 1].as_str());
                i += 1;
            }
            "--match-id" if i + 1 < args.len() => {
                match_id = MatchId::from(args[i + 1].as_str());
                i += 1;
            }
            "--player-a" if i + 1 < args.len() => {
                player_a_id = PlayerId::from(args[i + 1].as_str());
                i += 1;
            }
            "--player-b" if i + 1 < args.len() => {
                player_b_id = PlayerId::from(args[i + 1].as_str());
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    let command = CreateBattleCommand {
        battle_id: battle_id.clone(),
        match_id,
        player_a_id,
        player_b_id,
        ruleset: Ruleset { version: 1, turn_seconds: 10, no_action_limit: 3, seed: 42, combat_balance: CombatBalance::default() },
        requested_at: UtcMillis::from_system_now(),
    };

    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client = redis::Client::open(redis_url.as_str()).expect("invalid REDIS_URL");
    let mut conn = client.get_connection_manager().await.expect("failed to connect to redis");

    let payload = serde_json::to_string(&command).expect("CreateBattle command always serializes");
    let _id: String = redis::AsyncCommands::xadd(&mut conn, CREATE_BATTLE_STREAM, "*", &[("payload", payload.as_str())])
        .await
        .expect("failed to publish CreateBattle onto the bus stream");

    println!("published CreateBattle for battle {battle_id}");
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.get(1).map(String::as_str) == Some("create-battle") {
        create_battle_command(&args[2..]).await;
        return;
    }

    let seed = parse_seed(&args[1..]);
    run_simulation(is_terminal(), seed);
}
