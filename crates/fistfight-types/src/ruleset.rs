//! The immutable per-battle parameter bundle.

use serde::{Deserialize, Serialize};

/// How a critical hit interacts with a blocked attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CritEffect {
    /// A crit on a blocked zone is still fully blocked.
    Multiplier,
    /// A crit bypasses the block entirely, dealing full damage.
    BypassBlock,
    /// A crit partially bypasses the block (reduced multiplier).
    Hybrid,
}

/// HP/damage/dodge/crit constants, injected per-battle.
///
/// The distilled spec's source exposed two ruleset normalizers, one that
/// injects `CombatBalance` and one that doesn't; this is the authoritative,
/// balance-injected shape (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatBalance {
    pub base_hp: f64,
    pub hp_per_stamina: f64,
    pub base_weapon_damage: f64,
    pub damage_per_strength: f64,
    pub damage_per_agility: f64,
    pub damage_per_intuition: f64,
    pub damage_spread_min: f64,
    pub damage_spread_max: f64,
    pub mf_per_agility: f64,
    pub mf_per_intuition: f64,
    pub dodge_chance_base: f64,
    pub dodge_chance_scale: f64,
    pub dodge_chance_min: f64,
    pub dodge_chance_max: f64,
    pub dodge_chance_k_base: f64,
    pub crit_chance_base: f64,
    pub crit_chance_scale: f64,
    pub crit_chance_min: f64,
    pub crit_chance_max: f64,
    pub crit_chance_k_base: f64,
    pub crit_multiplier: f64,
    pub crit_effect: CritEffect,
    pub crit_hybrid_block_multiplier: f64,
}

impl Default for CombatBalance {
    /// Baseline balance matching scenario S1 in spec.md §8: with
    /// `damage_per_strength = 2` two players at `stamina=10, str=5` trade
    /// 10 damage per unblocked hit.
    fn default() -> Self {
        Self {
            base_hp: 50.0,
            hp_per_stamina: 5.0,
            base_weapon_damage: 0.0,
            damage_per_strength: 2.0,
            damage_per_agility: 0.0,
            damage_per_intuition: 0.0,
            damage_spread_min: 1.0,
            damage_spread_max: 1.0,
            mf_per_agility: 1.0,
            mf_per_intuition: 1.0,
            dodge_chance_base: 0.05,
            dodge_chance_scale: 0.25,
            dodge_chance_min: 0.0,
            dodge_chance_max: 0.6,
            dodge_chance_k_base: 10.0,
            crit_chance_base: 0.05,
            crit_chance_scale: 0.25,
            crit_chance_min: 0.0,
            crit_chance_max: 0.6,
            crit_chance_k_base: 10.0,
            crit_multiplier: 2.0,
            crit_effect: CritEffect::Multiplier,
            crit_hybrid_block_multiplier: 0.5,
        }
    }
}

/// The immutable value per battle: timing, limits, seed, and balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub version: u32,
    pub turn_seconds: u32,
    pub no_action_limit: u32,
    pub seed: u32,
    pub combat_balance: CombatBalance,
}

/// A validation bound from spec.md §6 was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesetValidationError {
    #[error("turnSeconds must be in [1, 60], got {0}")]
    TurnSecondsOutOfBounds(u32),
    #[error("noActionLimit must be in [1, 10], got {0}")]
    NoActionLimitOutOfBounds(u32),
    #[error("combatBalance.hpPerStamina must be >= 1, got {0}")]
    HpPerStaminaTooLow(f64),
    #[error("combatBalance.damagePerStrength must be >= 1, got {0}")]
    DamagePerStrengthTooLow(f64),
    #[error("ruleset.version must be >= 1, got {0}")]
    VersionTooLow(u32),
}

impl Ruleset {
    /// Validates the bounds in spec.md §6. Returns the first violation
    /// found; callers in the Lifecycle Service treat any violation as
    /// non-retryable (§4.8 step 1, §7).
    pub fn validate(&self) -> Result<(), RulesetValidationError> {
        use RulesetValidationError::*;

        if !(1..=60).contains(&self.turn_seconds) {
            return Err(TurnSecondsOutOfBounds(self.turn_seconds));
        }
        if !(1..=10).contains(&self.no_action_limit) {
            return Err(NoActionLimitOutOfBounds(self.no_action_limit));
        }
        if self.combat_balance.hp_per_stamina < 1.0 {
            return Err(HpPerStaminaTooLow(self.combat_balance.hp_per_stamina));
        }
        if self.combat_balance.damage_per_strength < 1.0 {
            return Err(DamagePerStrengthTooLow(self.combat_balance.damage_per_strength));
        }
        if self.version < 1 {
            return Err(VersionTooLow(self.version));
        }
        Ok(())
    }
}
