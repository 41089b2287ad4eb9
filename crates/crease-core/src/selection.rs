// Selection state: the squad-in-progress and the guarded mutations over it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::SlotCatalog;
use crate::ids::{PlayerId, SlotId};
use crate::player::{Player, PlayerPool, PointsTable};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A rejected selection mutation. The `Display` text is the reason shown to
/// the user; the selection is unchanged whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("You can select at most {max} players from {slot_name}.")]
    SlotLimitExceeded { slot_name: String, max: usize },

    #[error("You can select at most {max} players in total.")]
    TotalLimitExceeded { max: usize },

    #[error("Player {0} is not available for selection.")]
    UnknownPlayer(PlayerId),

    #[error("Player {0} is not in your team.")]
    NotSelected(PlayerId),

    #[error("Player {0} is already in your team.")]
    AlreadySelected(PlayerId),

    #[error("A {expected} can only be replaced by another {expected}.")]
    ReplaceSlotMismatch { expected: String },
}

/// What a successful toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Chosen player ids plus captain / vice-captain designation.
///
/// Ids are kept in pick order so the review step and the submitted payload
/// are stable, but membership is what the invariants are stated over: two
/// selections with the same members and leaders are equal in any order.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    player_ids: Vec<PlayerId>,
    captain: Option<PlayerId>,
    vice_captain: Option<PlayerId>,
}

// Ids are unique within a selection, so equal length plus containment is
// set equality.
impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.captain == other.captain
            && self.vice_captain == other.vice_captain
            && self.player_ids.len() == other.player_ids.len()
            && self.player_ids.iter().all(|id| other.contains(id))
    }
}

impl Eq for Selection {}

impl Selection {
    pub fn player_ids(&self) -> &[PlayerId] {
        &self.player_ids
    }

    pub fn captain(&self) -> Option<&PlayerId> {
        self.captain.as_ref()
    }

    pub fn vice_captain(&self) -> Option<&PlayerId> {
        self.vice_captain.as_ref()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.player_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.player_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.player_ids.is_empty()
    }

    fn clear_roles_of(&mut self, id: &PlayerId) {
        if self.captain.as_ref() == Some(id) {
            self.captain = None;
        }
        if self.vice_captain.as_ref() == Some(id) {
            self.vice_captain = None;
        }
    }
}

/// Totals over the current selection, for the review step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquadSummary {
    pub players: usize,
    pub total_price: f64,
    pub total_points: f64,
}

// ---------------------------------------------------------------------------
// SelectionState
// ---------------------------------------------------------------------------

/// Owns one session's [`Selection`] and validates every mutation against
/// the catalog and pool snapshots it was built with.
#[derive(Debug, Clone)]
pub struct SelectionState {
    catalog: Arc<SlotCatalog>,
    pool: Arc<PlayerPool>,
    selection: Selection,
}

impl SelectionState {
    pub fn new(catalog: Arc<SlotCatalog>, pool: Arc<PlayerPool>) -> Self {
        SelectionState {
            catalog,
            pool,
            selection: Selection::default(),
        }
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    pub fn pool(&self) -> &PlayerPool {
        &self.pool
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Add an unselected player or remove a selected one.
    ///
    /// Removing a player also clears any captain or vice-captain role it
    /// held. Adding is refused when the total cap or the player's slot cap
    /// is already reached.
    pub fn toggle(&mut self, id: &PlayerId) -> Result<Toggle, SelectionError> {
        if self.selection.contains(id) {
            self.selection.player_ids.retain(|p| p != id);
            self.selection.clear_roles_of(id);
            self.check_invariants();
            return Ok(Toggle::Removed);
        }

        let player = self.known_player(id)?;
        if let Err(e) = self.check_room_for(player) {
            debug!("Rejected selection of {}: {}", id, e);
            return Err(e);
        }

        self.selection.player_ids.push(id.clone());
        self.check_invariants();
        Ok(Toggle::Added)
    }

    /// Make a selected player captain. A vice-captain role held by the same
    /// player is dropped.
    pub fn set_captain(&mut self, id: &PlayerId) -> Result<(), SelectionError> {
        if !self.selection.contains(id) {
            return Err(SelectionError::NotSelected(id.clone()));
        }
        if self.selection.captain.as_ref() == Some(id) {
            return Ok(());
        }
        if self.selection.vice_captain.as_ref() == Some(id) {
            self.selection.vice_captain = None;
        }
        self.selection.captain = Some(id.clone());
        self.check_invariants();
        Ok(())
    }

    /// Make a selected player vice-captain. A captain role held by the same
    /// player is dropped.
    pub fn set_vice_captain(&mut self, id: &PlayerId) -> Result<(), SelectionError> {
        if !self.selection.contains(id) {
            return Err(SelectionError::NotSelected(id.clone()));
        }
        if self.selection.vice_captain.as_ref() == Some(id) {
            return Ok(());
        }
        if self.selection.captain.as_ref() == Some(id) {
            self.selection.captain = None;
        }
        self.selection.vice_captain = Some(id.clone());
        self.check_invariants();
        Ok(())
    }

    /// Swap `old` for `new` within the same slot, in place.
    ///
    /// This is the only mutation that carries a role across an identity
    /// change: if `old` was captain or vice-captain, `new` takes that role.
    pub fn replace(&mut self, old: &PlayerId, new: &PlayerId) -> Result<(), SelectionError> {
        let position = self
            .selection
            .player_ids
            .iter()
            .position(|p| p == old)
            .ok_or_else(|| SelectionError::NotSelected(old.clone()))?;
        if self.selection.contains(new) {
            return Err(SelectionError::AlreadySelected(new.clone()));
        }

        let incoming = self.known_player(new)?;
        let outgoing = self.known_player(old)?;
        if incoming.slot_id != outgoing.slot_id {
            let expected = self
                .catalog
                .get(&outgoing.slot_id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| outgoing.slot_id.to_string());
            return Err(SelectionError::ReplaceSlotMismatch { expected });
        }

        self.selection.player_ids[position] = new.clone();
        if self.selection.captain.as_ref() == Some(old) {
            self.selection.captain = Some(new.clone());
        }
        if self.selection.vice_captain.as_ref() == Some(old) {
            self.selection.vice_captain = Some(new.clone());
        }
        self.check_invariants();
        Ok(())
    }

    /// Drop every pick and both roles.
    pub fn clear(&mut self) {
        self.selection = Selection::default();
    }

    /// Rebuild the selection from a persisted team by replaying it through
    /// the guarded operations. Entries that no longer fit (player gone from
    /// the pool, slot now over its cap) are skipped and returned.
    pub fn seed(
        &mut self,
        player_ids: &[PlayerId],
        captain: Option<&PlayerId>,
        vice_captain: Option<&PlayerId>,
    ) -> Vec<SelectionError> {
        self.clear();
        let mut skipped = Vec::new();

        for id in player_ids {
            if self.selection.contains(id) {
                continue;
            }
            if let Err(e) = self.toggle(id) {
                warn!("Skipping {} while restoring saved team: {}", id, e);
                skipped.push(e);
            }
        }
        if let Some(id) = captain {
            if let Err(e) = self.set_captain(id) {
                warn!("Saved captain {} not restored: {}", id, e);
                skipped.push(e);
            }
        }
        if let Some(id) = vice_captain {
            if let Err(e) = self.set_vice_captain(id) {
                warn!("Saved vice-captain {} not restored: {}", id, e);
                skipped.push(e);
            }
        }
        skipped
    }

    // ----- Queries -----

    pub fn count_for_slot(&self, slot: &SlotId) -> usize {
        self.selection
            .player_ids
            .iter()
            .filter(|id| self.pool.slot_of(id) == Some(slot))
            .count()
    }

    /// True when the slot has reached its `max_select`. Unknown slots count
    /// as full.
    pub fn is_slot_full(&self, slot: &SlotId) -> bool {
        match self.catalog.get(slot) {
            Some(s) => self.count_for_slot(slot) >= s.max_select,
            None => true,
        }
    }

    pub fn is_total_full(&self) -> bool {
        self.selection.len() >= self.catalog.total_max()
    }

    /// Every slot meets its minimum. Maxima do not have to be reached.
    pub fn is_complete(&self) -> bool {
        self.catalog
            .iter()
            .all(|s| self.count_for_slot(&s.id) >= s.min_select)
    }

    pub fn slot_minimum_met(&self, slot: &SlotId) -> bool {
        match self.catalog.get(slot) {
            Some(s) => self.count_for_slot(slot) >= s.min_select,
            None => false,
        }
    }

    /// Whether the pick control for a player should be disabled. A selected
    /// player is never disabled, so a full slot can always be deselected.
    pub fn is_player_disabled(&self, id: &PlayerId) -> bool {
        if self.selection.contains(id) {
            return false;
        }
        match self.pool.slot_of(id) {
            Some(slot) => self.is_total_full() || self.is_slot_full(slot),
            None => true,
        }
    }

    /// Selected players of one slot, in pick order.
    pub fn selected_in_slot(&self, slot: &SlotId) -> Vec<&Player> {
        self.selection
            .player_ids
            .iter()
            .filter_map(|id| self.pool.get(id))
            .filter(|p| &p.slot_id == slot)
            .collect()
    }

    pub fn summary(&self, points: &PointsTable) -> SquadSummary {
        let players: Vec<&Player> = self
            .selection
            .player_ids
            .iter()
            .filter_map(|id| self.pool.get(id))
            .collect();
        SquadSummary {
            players: players.len(),
            total_price: players.iter().map(|p| p.price).sum(),
            total_points: players.iter().map(|p| points.points_for(p)).sum(),
        }
    }

    // ----- Internals -----

    fn known_player(&self, id: &PlayerId) -> Result<&Player, SelectionError> {
        self.pool
            .get(id)
            .ok_or_else(|| SelectionError::UnknownPlayer(id.clone()))
    }

    fn check_room_for(&self, player: &Player) -> Result<(), SelectionError> {
        let max_total = self.catalog.total_max();
        if self.selection.len() >= max_total {
            return Err(SelectionError::TotalLimitExceeded { max: max_total });
        }
        let slot = self
            .catalog
            .get(&player.slot_id)
            .ok_or_else(|| SelectionError::UnknownPlayer(player.id.clone()))?;
        if self.count_for_slot(&player.slot_id) >= slot.max_select {
            return Err(SelectionError::SlotLimitExceeded {
                slot_name: slot.name.clone(),
                max: slot.max_select,
            });
        }
        Ok(())
    }

    fn check_invariants(&self) {
        let sel = &self.selection;
        debug_assert!(
            sel.captain.is_none() || sel.captain != sel.vice_captain,
            "captain and vice-captain must differ"
        );
        debug_assert!(
            sel.captain.as_ref().map_or(true, |c| sel.contains(c)),
            "captain must be selected"
        );
        debug_assert!(
            sel.vice_captain.as_ref().map_or(true, |v| sel.contains(v)),
            "vice-captain must be selected"
        );
        debug_assert!(sel.len() <= self.catalog.total_max(), "total cap exceeded");
        debug_assert!(
            self.catalog
                .iter()
                .all(|s| self.count_for_slot(&s.id) <= s.max_select),
            "slot cap exceeded"
        );
    }
}
