//! Attack/block target zones and the block adjacency relation.
//!
//! `Zone` order is fixed top-to-bottom (`Head, Chest, Belly, Waist, Legs`)
//! and is itself the adjacency relation: two zones are adjacent iff their
//! positions in this list differ by exactly one. The relation is linear,
//! not circular — `Head` and `Legs` are not adjacent.

use serde::{Deserialize, Serialize};

/// One of the five attack/block targets, ordered top-to-bottom on the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Zone {
    Head,
    Chest,
    Belly,
    Waist,
    Legs,
}

impl Zone {
    pub const ALL: [Zone; 5] = [Zone::Head, Zone::Chest, Zone::Belly, Zone::Waist, Zone::Legs];

    fn position(self) -> usize {
        Self::ALL.iter().position(|&z| z == self).expect("Zone::ALL is exhaustive")
    }

    /// True iff `self` and `other` are adjacent under the fixed body order.
    pub fn is_adjacent_to(self, other: Zone) -> bool {
        self.position().abs_diff(other.position()) == 1
    }
}

/// Checks whether a (primary, secondary) block pair is a valid adjacency
/// pattern: either there is no secondary (single-zone block), or the two
/// zones are adjacent and distinct.
pub fn is_valid_block_pattern(primary: Zone, secondary: Option<Zone>) -> bool {
    match secondary {
        None => true,
        Some(secondary) => primary != secondary && primary.is_adjacent_to(secondary),
    }
}

/// True iff `attack_zone` is covered by the given block pattern.
pub fn zone_is_blocked(attack_zone: Zone, block_primary: Zone, block_secondary: Option<Zone>) -> bool {
    if !is_valid_block_pattern(block_primary, block_secondary) {
        return false;
    }
    attack_zone == block_primary || block_secondary == Some(attack_zone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_pairs() {
        assert!(Zone::Head.is_adjacent_to(Zone::Chest));
        assert!(Zone::Chest.is_adjacent_to(Zone::Belly));
        assert!(Zone::Belly.is_adjacent_to(Zone::Waist));
        assert!(Zone::Waist.is_adjacent_to(Zone::Legs));
    }

    #[test]
    fn non_adjacent_pairs() {
        assert!(!Zone::Head.is_adjacent_to(Zone::Belly));
        assert!(!Zone::Head.is_adjacent_to(Zone::Legs));
        assert!(!Zone::Chest.is_adjacent_to(Zone::Legs));
        assert!(!Zone::Head.is_adjacent_to(Zone::Head));
    }

    #[test]
    fn single_zone_block_always_valid() {
        for &z in &Zone::ALL {
            assert!(is_valid_block_pattern(z, None));
        }
    }

    #[test]
    fn double_zone_block_requires_adjacency() {
        assert!(is_valid_block_pattern(Zone::Chest, Some(Zone::Belly)));
        assert!(is_valid_block_pattern(Zone::Chest, Some(Zone::Head)));
        assert!(!is_valid_block_pattern(Zone::Head, Some(Zone::Waist)));
        assert!(!is_valid_block_pattern(Zone::Head, Some(Zone::Head)));
    }

    #[test]
    fn blocked_zone_matches_either_member() {
        assert!(zone_is_blocked(Zone::Chest, Zone::Chest, Some(Zone::Belly)));
        assert!(zone_is_blocked(Zone::Belly, Zone::Chest, Some(Zone::Belly)));
        assert!(!zone_is_blocked(Zone::Head, Zone::Chest, Some(Zone::Belly)));
    }

    #[test]
    fn invalid_block_pattern_blocks_nothing() {
        assert!(!zone_is_blocked(Zone::Head, Zone::Head, Some(Zone::Waist)));
    }
}
