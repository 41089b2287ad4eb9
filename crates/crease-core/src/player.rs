// Player pool: the candidate set for one session, plus contest-relative points.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::SlotCatalog;
use crate::ids::{PlayerId, SlotId};
use crate::selection::Selection;

/// A selectable player as supplied by the players service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Real-world team affiliation (e.g. "DV SPARTANS").
    #[serde(default)]
    pub team: String,
    pub slot_id: SlotId,
    #[serde(default)]
    pub price: f64,
    /// Global (lifetime) points. Contest-relative points come from a
    /// [`PointsTable`].
    #[serde(default)]
    pub points: f64,
}

/// A per-contest points override row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsOverride {
    pub player_id: PlayerId,
    pub points: f64,
}

// ---------------------------------------------------------------------------
// PlayerPool
// ---------------------------------------------------------------------------

/// Read-only snapshot of the selectable players.
///
/// Eligibility filtering (e.g. allowed teams for a restricted contest) is the
/// supplier's job; the pool only drops players whose slot is unknown to the
/// catalog, since they could never be placed.
#[derive(Debug, Clone, Default)]
pub struct PlayerPool {
    players: Vec<Player>,
    index: HashMap<PlayerId, usize>,
}

impl PlayerPool {
    pub fn new(players: Vec<Player>, catalog: &SlotCatalog) -> Self {
        let mut kept: Vec<Player> = Vec::with_capacity(players.len());
        let mut index = HashMap::with_capacity(players.len());

        for player in players {
            if !catalog.contains(&player.slot_id) {
                warn!(
                    "Dropping player '{}' ({}): unknown slot '{}'",
                    player.name, player.id, player.slot_id
                );
                continue;
            }
            if index.contains_key(&player.id) {
                warn!("Dropping duplicate player id '{}'", player.id);
                continue;
            }
            index.insert(player.id.clone(), kept.len());
            kept.push(player);
        }

        PlayerPool {
            players: kept,
            index,
        }
    }

    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.index.get(id).map(|&i| &self.players[i])
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.index.contains_key(id)
    }

    pub fn slot_of(&self, id: &PlayerId) -> Option<&SlotId> {
        self.get(id).map(|p| &p.slot_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players belonging to one slot, in pool order.
    pub fn in_slot(&self, slot: &SlotId) -> impl Iterator<Item = &Player> + '_ {
        let slot = slot.clone();
        self.players.iter().filter(move |p| p.slot_id == slot)
    }

    /// Case-insensitive search on name or team within one slot.
    pub fn search(&self, slot: &SlotId, query: &str) -> Vec<&Player> {
        let query = query.trim().to_lowercase();
        self.in_slot(slot)
            .filter(|p| {
                query.is_empty()
                    || p.name.to_lowercase().contains(&query)
                    || p.team.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Same-slot players that could take `target`'s place in `selection`.
    pub fn replacement_candidates(&self, target: &PlayerId, selection: &Selection) -> Vec<&Player> {
        let Some(slot) = self.slot_of(target) else {
            return Vec::new();
        };
        self.in_slot(slot)
            .filter(|p| !selection.contains(&p.id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PointsTable
// ---------------------------------------------------------------------------

/// Contest-scoped points used for display. Players without an override show
/// their global points.
#[derive(Debug, Clone, Default)]
pub struct PointsTable {
    overrides: HashMap<PlayerId, f64>,
}

impl PointsTable {
    pub fn from_overrides(rows: Vec<PointsOverride>) -> Self {
        PointsTable {
            overrides: rows.into_iter().map(|r| (r.player_id, r.points)).collect(),
        }
    }

    pub fn points_for(&self, player: &Player) -> f64 {
        self.overrides
            .get(&player.id)
            .copied()
            .unwrap_or(player.points)
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
