//! `PlayerAction` — the normalized per-turn, per-player intent.

use serde::{Deserialize, Serialize};

use crate::zone::{is_valid_block_pattern, Zone};

/// A player's submitted intent for one turn, already normalized: any raw
/// payload whose attack zone is absent, or whose block pair is
/// non-adjacent, becomes `NoAction` before this type is ever constructed
/// (spec.md §4.4 "Normalization").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    NoAction,
    Attack {
        attack_zone: Zone,
        block_zone_primary: Option<Zone>,
        block_zone_secondary: Option<Zone>,
    },
}

impl PlayerAction {
    pub fn is_no_action(self) -> bool {
        matches!(self, PlayerAction::NoAction)
    }

    /// Zone the attack targets, if this is an attack action.
    pub fn attack_zone(self) -> Option<Zone> {
        match self {
            PlayerAction::Attack { attack_zone, .. } => Some(attack_zone),
            PlayerAction::NoAction => None,
        }
    }

    /// True iff `zone` is covered by this action's block pattern.
    pub fn blocks(self, zone: Zone) -> bool {
        match self {
            PlayerAction::NoAction => false,
            PlayerAction::Attack { block_zone_primary: None, .. } => false,
            PlayerAction::Attack { block_zone_primary: Some(primary), block_zone_secondary, .. } => {
                crate::zone::zone_is_blocked(zone, primary, block_zone_secondary)
            }
        }
    }
}

/// The wire shape of `SubmitTurnAction.payload` (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActionPayload {
    pub attack_zone: Option<Zone>,
    pub block_zone_primary: Option<Zone>,
    pub block_zone_secondary: Option<Zone>,
}

/// Normalizes a raw payload into a `PlayerAction`, reducing any invalid
/// shape to `NoAction` per spec.md §4.4 and §4.7.1 step 4.
pub fn normalize(raw: RawActionPayload) -> PlayerAction {
    let Some(attack_zone) = raw.attack_zone else {
        return PlayerAction::NoAction;
    };
    if let Some(primary) = raw.block_zone_primary {
        if !is_valid_block_pattern(primary, raw.block_zone_secondary) {
            return PlayerAction::NoAction;
        }
    } else if raw.block_zone_secondary.is_some() {
        // A secondary zone with no primary is a malformed pair.
        return PlayerAction::NoAction;
    }
    PlayerAction::Attack {
        attack_zone,
        block_zone_primary: raw.block_zone_primary,
        block_zone_secondary: raw.block_zone_secondary,
    }
}

/// Parses and normalizes a raw `SubmitTurnAction` JSON payload. An empty
/// or malformed payload normalizes to `NoAction` rather than erroring
/// (spec.md §4.7.1 step 4).
pub fn normalize_payload_bytes(payload: &[u8]) -> PlayerAction {
    if payload.is_empty() {
        return PlayerAction::NoAction;
    }
    match serde_json::from_slice::<RawActionPayload>(payload) {
        Ok(raw) => normalize(raw),
        Err(_) => PlayerAction::NoAction,
    }
}
