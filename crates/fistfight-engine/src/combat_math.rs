//! Pure combat formulas: derived stats, dodge/crit chance, attack
//! resolution (spec.md §4.3).

use fistfight_types::{CombatBalance, CritEffect, PlayerAction, PlayerStats};

use crate::rng::TurnRng;

/// Per-player stats derived from raw attributes + the battle's balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedStats {
    pub hp_max: u32,
    pub damage_min: f64,
    pub damage_max: f64,
    pub mf_dodge: f64,
    pub mf_anti_dodge: f64,
    pub mf_crit: f64,
    pub mf_anti_crit: f64,
}

/// Computes §4.3's derived stats for one player.
pub fn derive_stats(stats: &PlayerStats, balance: &CombatBalance) -> DerivedStats {
    let hp_max = balance.base_hp + stats.stamina * balance.hp_per_stamina;
    let base_damage = balance.base_weapon_damage
        + stats.strength * balance.damage_per_strength
        + stats.agility * balance.damage_per_agility
        + stats.intuition * balance.damage_per_intuition;
    let damage_min = (base_damage * balance.damage_spread_min).floor();
    let damage_max = (base_damage * balance.damage_spread_max).ceil();
    let mf_dodge = stats.agility * balance.mf_per_agility;
    let mf_crit = stats.intuition * balance.mf_per_intuition;

    DerivedStats {
        hp_max: hp_max.max(0.0) as u32,
        damage_min,
        damage_max,
        mf_dodge,
        mf_anti_dodge: mf_dodge,
        mf_crit,
        mf_anti_crit: mf_crit,
    }
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// `chance(diff) = clamp(base + scale * diff / (|diff| + kBase), min, max)`.
fn chance(diff: f64, base: f64, scale: f64, k_base: f64, min: f64, max: f64) -> f64 {
    let adjusted = base + scale * diff / (diff.abs() + k_base);
    clamp(adjusted, min, max)
}

pub fn dodge_chance(balance: &CombatBalance, defender_mf_dodge: f64, attacker_mf_anti_dodge: f64) -> f64 {
    let diff = defender_mf_dodge - attacker_mf_anti_dodge;
    chance(
        diff,
        balance.dodge_chance_base,
        balance.dodge_chance_scale,
        balance.dodge_chance_k_base,
        balance.dodge_chance_min,
        balance.dodge_chance_max,
    )
}

pub fn crit_chance(balance: &CombatBalance, attacker_mf_crit: f64, defender_mf_anti_crit: f64) -> f64 {
    let diff = attacker_mf_crit - defender_mf_anti_crit;
    chance(
        diff,
        balance.crit_chance_base,
        balance.crit_chance_scale,
        balance.crit_chance_k_base,
        balance.crit_chance_min,
        balance.crit_chance_max,
    )
}

/// The outcome of one player's attack against the other, in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    NoAction,
    Dodged,
    Blocked,
    Hit { damage: u32 },
    CriticalHit { damage: u32 },
    CriticalBypassBlock { damage: u32 },
    CriticalHybridBlocked { damage: u32 },
}

impl AttackOutcome {
    pub fn damage(self) -> u32 {
        match self {
            AttackOutcome::NoAction | AttackOutcome::Dodged | AttackOutcome::Blocked => 0,
            AttackOutcome::Hit { damage }
            | AttackOutcome::CriticalHit { damage }
            | AttackOutcome::CriticalBypassBlock { damage }
            | AttackOutcome::CriticalHybridBlocked { damage } => damage,
        }
    }
}

/// Resolves one attacker's attack against one defender, rolling dodge,
/// crit, and (if applicable) damage from `rng` — the stream dedicated to
/// this attacker/defender direction (spec.md §4.3 "Attack resolution").
pub fn resolve_attack(
    attacker_action: PlayerAction,
    defender_action: PlayerAction,
    attacker: &DerivedStats,
    defender: &DerivedStats,
    balance: &CombatBalance,
    rng: &mut TurnRng,
) -> AttackOutcome {
    let Some(attack_zone) = attacker_action.attack_zone() else {
        return AttackOutcome::NoAction;
    };

    let dodge = dodge_chance(balance, defender.mf_dodge, attacker.mf_anti_dodge);
    if rng.next_fraction() < dodge {
        return AttackOutcome::Dodged;
    }

    let crit = rng.next_fraction() < crit_chance(balance, attacker.mf_crit, defender.mf_anti_crit);
    let blocked = defender_action.blocks(attack_zone);

    if blocked {
        if !crit {
            return AttackOutcome::Blocked;
        }
        return match balance.crit_effect {
            CritEffect::Multiplier => AttackOutcome::Blocked,
            CritEffect::BypassBlock => {
                let damage = rng.next_damage(attacker.damage_min, attacker.damage_max);
                let damage = (f64::from(damage) * balance.crit_multiplier).round() as u32;
                AttackOutcome::CriticalBypassBlock { damage }
            }
            CritEffect::Hybrid => {
                let damage = rng.next_damage(attacker.damage_min, attacker.damage_max);
                let damage = (f64::from(damage) * balance.crit_multiplier * balance.crit_hybrid_block_multiplier)
                    .round() as u32;
                AttackOutcome::CriticalHybridBlocked { damage }
            }
        };
    }

    let damage = rng.next_damage(attacker.damage_min, attacker.damage_max);
    if crit {
        let damage = (f64::from(damage) * balance.crit_multiplier).round() as u32;
        AttackOutcome::CriticalHit { damage }
    } else {
        AttackOutcome::Hit { damage }
    }
}
