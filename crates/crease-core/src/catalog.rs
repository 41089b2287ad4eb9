// Slot catalog: the ordered team-composition categories and their pick limits.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::SlotId;

/// Pick limit assumed for a slot record that arrives without `max_select`.
pub const DEFAULT_SLOT_LIMIT: usize = 4;

fn default_max_select() -> usize {
    DEFAULT_SLOT_LIMIT
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("slot catalog is empty")]
    Empty,

    #[error("slot `{slot}` has min_select {min} greater than max_select {max}")]
    InvertedLimits { slot: SlotId, min: usize, max: usize },

    #[error("slot `{0}` appears more than once in the catalog")]
    DuplicateSlot(SlotId),

    #[error("total cap {cap} is smaller than the sum of slot minimums {minimum}")]
    CapBelowMinimum { cap: usize, minimum: usize },
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// A named category of players with its own pick range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    #[serde(default)]
    pub min_select: usize,
    #[serde(default = "default_max_select")]
    pub max_select: usize,
}

impl Slot {
    pub fn new(id: impl Into<SlotId>, name: &str, min_select: usize, max_select: usize) -> Self {
        Slot {
            id: id.into(),
            name: name.to_string(),
            min_select,
            max_select,
        }
    }
}

// ---------------------------------------------------------------------------
// SlotCatalog
// ---------------------------------------------------------------------------

/// Immutable, ordered snapshot of the slots for one team-build session.
///
/// Catalog order is the order the wizard walks through slots, so it is kept
/// exactly as supplied by the slots service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCatalog {
    slots: Vec<Slot>,
    total_cap: Option<usize>,
}

impl SlotCatalog {
    /// Build a catalog, rejecting inverted limits and duplicate slot ids.
    pub fn new(slots: Vec<Slot>) -> Result<Self, CatalogError> {
        if slots.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for slot in &slots {
            if slot.min_select > slot.max_select {
                return Err(CatalogError::InvertedLimits {
                    slot: slot.id.clone(),
                    min: slot.min_select,
                    max: slot.max_select,
                });
            }
            if !seen.insert(slot.id.clone()) {
                return Err(CatalogError::DuplicateSlot(slot.id.clone()));
            }
        }

        Ok(SlotCatalog {
            slots,
            total_cap: None,
        })
    }

    /// Apply an explicit roster-wide cap instead of the sum of slot maxima.
    ///
    /// A cap below the sum of the slot minimums would make every squad
    /// incompletable, so it is rejected.
    pub fn with_total_cap(mut self, cap: usize) -> Result<Self, CatalogError> {
        let minimum = self.minimum_total();
        if cap < minimum {
            return Err(CatalogError::CapBelowMinimum { cap, minimum });
        }
        self.total_cap = Some(cap);
        Ok(self)
    }

    /// Maximum number of players a squad may hold.
    pub fn total_max(&self) -> usize {
        self.total_cap
            .unwrap_or_else(|| self.slots.iter().map(|s| s.max_select).sum())
    }

    /// Sum of the slot minimums (smallest complete squad).
    pub fn minimum_total(&self) -> usize {
        self.slots.iter().map(|s| s.min_select).sum()
    }

    pub fn get(&self, id: &SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| &s.id == id)
    }

    /// Catalog index of a slot.
    pub fn position(&self, id: &SlotId) -> Option<usize> {
        self.slots.iter().position(|s| &s.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn contains(&self, id: &SlotId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    /// Guidance line shown above the player list in the picking step.
    pub fn instruction(&self) -> String {
        let mins: HashSet<usize> = self.slots.iter().map(|s| s.min_select).collect();
        if mins.len() == 1 {
            if let Some(min) = mins.into_iter().next() {
                return format!("Select {min} players in each Slot and press Next to proceed.");
            }
        }
        "Meet the minimum required players in each Slot and press Next to proceed.".to_string()
    }
}
