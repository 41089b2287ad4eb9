// Wizard controller: pick players slot by slot, choose leaders, review.
//
// The wizard owns only navigation. Every forward transition is checked
// against a borrowed SelectionState; there is no setter that moves forward
// without going through a guard.

use thiserror::Error;

use crate::ids::SlotId;
use crate::selection::SelectionState;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A refused wizard transition. Displayed next to the disabled control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Please select a captain.")]
    MissingCaptain,

    #[error("Please select a vice-captain.")]
    MissingViceCaptain,

    #[error("Captain and vice-captain must be different players.")]
    DuplicateCaptainVice,

    #[error("Select at least {min} players from {slot_name} to continue.")]
    SlotMinimumNotMet { slot_name: String, min: usize },

    #[error("Meet the minimum number of players in every slot before submitting.")]
    SelectionIncomplete,

    #[error("Cannot jump ahead to {target:?}; use the forward action of the current step.")]
    ForwardJump { target: WizardStep },

    #[error("Already on the last slot.")]
    NoNextSlot,

    #[error("Already on the first slot.")]
    NoPreviousSlot,

    #[error("Unknown slot {0}.")]
    UnknownSlot(SlotId),

    #[error("That action is not available in {0:?}.")]
    WrongStep(WizardStep),
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    SelectPlayers,
    ChooseLeaders,
    Review,
}

impl WizardStep {
    /// 1-based step number, as shown in the step headers.
    pub fn number(self) -> u8 {
        match self {
            WizardStep::SelectPlayers => 1,
            WizardStep::ChooseLeaders => 2,
            WizardStep::Review => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::SelectPlayers => "Select Players",
            WizardStep::ChooseLeaders => "Captain & Vice-Captain",
            WizardStep::Review => "Review & Submit",
        }
    }
}

/// The single forward control the UI shows for the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardAction {
    /// Move to the next slot within step 1.
    NextSlot,
    /// On the last slot: continue to captain selection.
    Continue,
    /// Leaders chosen: continue to review.
    Finalize,
    /// Review: hand off to submission.
    Submit,
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wizard {
    step: WizardStep,
    active_slot: usize,
}

impl Default for Wizard {
    fn default() -> Self {
        Wizard::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Wizard {
            step: WizardStep::SelectPlayers,
            active_slot: 0,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn step_number(&self) -> u8 {
        self.step.number()
    }

    /// Step 1 renders as a compact summary once the user has moved past it.
    pub fn step1_collapsed(&self) -> bool {
        self.step != WizardStep::SelectPlayers
    }

    pub fn active_slot_index(&self) -> usize {
        self.active_slot
    }

    pub fn active_slot_id<'a>(&self, state: &'a SelectionState) -> Option<&'a SlotId> {
        state.catalog().at(self.active_slot).map(|s| &s.id)
    }

    pub fn is_on_last_slot(&self, state: &SelectionState) -> bool {
        self.active_slot >= state.catalog().last_index()
    }

    // ----- Slot navigation (step 1) -----

    /// Advance to the next slot once the active slot meets its minimum.
    pub fn next_slot(&mut self, state: &SelectionState) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectPlayers)?;
        if self.is_on_last_slot(state) {
            return Err(WizardError::NoNextSlot);
        }
        self.check_active_slot(state)?;
        self.active_slot += 1;
        Ok(())
    }

    /// Going back a slot is never gated.
    pub fn prev_slot(&mut self) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectPlayers)?;
        if self.active_slot == 0 {
            return Err(WizardError::NoPreviousSlot);
        }
        self.active_slot -= 1;
        Ok(())
    }

    /// Jump straight to a slot tab. Tabs are free navigation within step 1.
    pub fn select_slot(&mut self, state: &SelectionState, slot: &SlotId) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectPlayers)?;
        let index = state
            .catalog()
            .position(slot)
            .ok_or_else(|| WizardError::UnknownSlot(slot.clone()))?;
        self.active_slot = index;
        Ok(())
    }

    // ----- Step transitions -----

    /// Step 1 -> 2. Only available on the last slot, and only once that
    /// slot meets its minimum.
    pub fn continue_to_leaders(&mut self, state: &SelectionState) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectPlayers)?;
        if !self.is_on_last_slot(state) {
            return Err(WizardError::ForwardJump {
                target: WizardStep::ChooseLeaders,
            });
        }
        self.check_active_slot(state)?;
        self.step = WizardStep::ChooseLeaders;
        Ok(())
    }

    /// Step 2 -> 3. Requires both leaders, and they must differ.
    pub fn continue_to_review(&mut self, state: &SelectionState) -> Result<(), WizardError> {
        self.require_step(WizardStep::ChooseLeaders)?;
        check_leaders(state)?;
        self.step = WizardStep::Review;
        Ok(())
    }

    /// Set the current step directly. Only backward (or same-step) moves are
    /// accepted; forward moves must go through their guarded transition.
    /// Re-opening step 1 keeps the active slot so the user lands where they
    /// left off.
    pub fn go_to(&mut self, target: WizardStep) -> Result<(), WizardError> {
        if target > self.step {
            return Err(WizardError::ForwardJump { target });
        }
        self.step = target;
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Wizard::new();
    }

    // ----- Queries -----

    /// Which forward control the UI should show.
    pub fn forward_action(&self, state: &SelectionState) -> ForwardAction {
        match self.step {
            WizardStep::SelectPlayers if self.is_on_last_slot(state) => ForwardAction::Continue,
            WizardStep::SelectPlayers => ForwardAction::NextSlot,
            WizardStep::ChooseLeaders => ForwardAction::Finalize,
            WizardStep::Review => ForwardAction::Submit,
        }
    }

    /// Why the forward control is disabled, or `Ok` if it is enabled.
    pub fn forward_blocker(&self, state: &SelectionState) -> Result<(), WizardError> {
        match self.step {
            WizardStep::SelectPlayers => self.check_active_slot(state),
            WizardStep::ChooseLeaders => check_leaders(state),
            WizardStep::Review => check_submittable(state),
        }
    }

    // ----- Internals -----

    fn require_step(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep(self.step));
        }
        Ok(())
    }

    fn check_active_slot(&self, state: &SelectionState) -> Result<(), WizardError> {
        let slot = state
            .catalog()
            .at(self.active_slot)
            .ok_or(WizardError::NoNextSlot)?;
        if state.count_for_slot(&slot.id) < slot.min_select {
            return Err(WizardError::SlotMinimumNotMet {
                slot_name: slot.name.clone(),
                min: slot.min_select,
            });
        }
        Ok(())
    }
}

fn check_leaders(state: &SelectionState) -> Result<(), WizardError> {
    let sel = state.selection();
    let captain = sel.captain().ok_or(WizardError::MissingCaptain)?;
    let vice = sel.vice_captain().ok_or(WizardError::MissingViceCaptain)?;
    if captain == vice {
        return Err(WizardError::DuplicateCaptainVice);
    }
    Ok(())
}

/// Everything submission needs from the selection: minimums met and both
/// leaders assigned.
pub fn check_submittable(state: &SelectionState) -> Result<(), WizardError> {
    if !state.is_complete() {
        return Err(WizardError::SelectionIncomplete);
    }
    check_leaders(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Slot, SlotCatalog};
    use crate::ids::PlayerId;
    use crate::player::{Player, PlayerPool};

    fn test_state() -> SelectionState {
        let catalog = SlotCatalog::new(vec![
            Slot::new("bat", "Batsman", 2, 4),
            Slot::new("bowl", "Bowler", 2, 4),
        ])
        .unwrap();
        let players = ["bat1", "bat2", "bat3", "bowl1", "bowl2", "bowl3"]
            .iter()
            .map(|id| Player {
                id: PlayerId::from(*id),
                name: id.to_string(),
                team: String::new(),
                slot_id: SlotId::from(if id.starts_with("bat") { "bat" } else { "bowl" }),
                price: 0.0,
                points: 0.0,
            })
            .collect();
        let pool = PlayerPool::new(players, &catalog);
        SelectionState::new(Arc::new(catalog), Arc::new(pool))
    }

    fn pick(state: &mut SelectionState, ids: &[&str]) {
        for id in ids {
            state.toggle(&PlayerId::from(*id)).unwrap();
        }
    }

    #[test]
    fn starts_on_first_slot_of_step_one() {
        let state = test_state();
        let wizard = Wizard::new();
        assert_eq!(wizard.step_number(), 1);
        assert!(!wizard.step1_collapsed());
        assert_eq!(wizard.active_slot_id(&state), Some(&SlotId::from("bat")));
        assert_eq!(wizard.forward_action(&state), ForwardAction::NextSlot);
    }

    #[test]
    fn next_slot_gated_by_active_slot_minimum() {
        let mut state = test_state();
        let mut wizard = Wizard::new();
        pick(&mut state, &["bat1"]);
        assert_eq!(
            wizard.next_slot(&state),
            Err(WizardError::SlotMinimumNotMet {
                slot_name: "Batsman".to_string(),
                min: 2
            })
        );
        assert!(wizard.forward_blocker(&state).is_err());

        pick(&mut state, &["bat2"]);
        wizard.next_slot(&state).unwrap();
        assert_eq!(wizard.active_slot_id(&state), Some(&SlotId::from("bowl")));
        assert_eq!(wizard.forward_action(&state), ForwardAction::Continue);
        assert_eq!(wizard.next_slot(&state), Err(WizardError::NoNextSlot));
    }

    #[test]
    fn continue_only_from_last_slot() {
        let mut state = test_state();
        let mut wizard = Wizard::new();
        pick(&mut state, &["bat1", "bat2", "bowl1", "bowl2"]);
        assert_eq!(
            wizard.continue_to_leaders(&state),
            Err(WizardError::ForwardJump {
                target: WizardStep::ChooseLeaders
            })
        );
        wizard.next_slot(&state).unwrap();
        wizard.continue_to_leaders(&state).unwrap();
        assert_eq!(wizard.step(), WizardStep::ChooseLeaders);
        assert!(wizard.step1_collapsed());
    }

    #[test]
    fn leaders_required_before_review() {
        let mut state = test_state();
        let mut wizard = Wizard::new();
        pick(&mut state, &["bat1", "bat2", "bowl1", "bowl2"]);
        wizard.next_slot(&state).unwrap();
        wizard.continue_to_leaders(&state).unwrap();

        assert_eq!(
            wizard.continue_to_review(&state),
            Err(WizardError::MissingCaptain)
        );
        state.set_captain(&PlayerId::from("bat1")).unwrap();
        assert_eq!(
            wizard.continue_to_review(&state),
            Err(WizardError::MissingViceCaptain)
        );
        state.set_vice_captain(&PlayerId::from("bowl1")).unwrap();
        wizard.continue_to_review(&state).unwrap();
        assert_eq!(wizard.step(), WizardStep::Review);
        assert_eq!(wizard.forward_action(&state), ForwardAction::Submit);
    }

    #[test]
    fn direct_jump_forward_rejected() {
        let state = test_state();
        let mut wizard = Wizard::new();
        assert_eq!(
            wizard.go_to(WizardStep::Review),
            Err(WizardError::ForwardJump {
                target: WizardStep::Review
            })
        );
        assert_eq!(
            wizard.continue_to_review(&state),
            Err(WizardError::WrongStep(WizardStep::SelectPlayers))
        );
        assert_eq!(wizard.step(), WizardStep::SelectPlayers);
    }

    #[test]
    fn backward_moves_always_allowed() {
        let mut state = test_state();
        let mut wizard = Wizard::new();
        pick(&mut state, &["bat1", "bat2", "bowl1", "bowl2"]);
        wizard.next_slot(&state).unwrap();
        wizard.continue_to_leaders(&state).unwrap();

        wizard.go_to(WizardStep::SelectPlayers).unwrap();
        assert_eq!(wizard.step_number(), 1);
        assert!(!wizard.step1_collapsed());
        assert_eq!(wizard.active_slot_index(), 1);

        wizard.prev_slot().unwrap();
        assert_eq!(wizard.prev_slot(), Err(WizardError::NoPreviousSlot));
    }

    #[test]
    fn slot_tabs_move_freely() {
        let state = test_state();
        let mut wizard = Wizard::new();
        wizard.select_slot(&state, &SlotId::from("bowl")).unwrap();
        assert_eq!(wizard.active_slot_index(), 1);
        assert_eq!(
            wizard.select_slot(&state, &SlotId::from("wk")),
            Err(WizardError::UnknownSlot(SlotId::from("wk")))
        );
    }

    #[test]
    fn review_blocks_incomplete_selection() {
        let mut state = test_state();
        pick(&mut state, &["bat1", "bowl1"]);
        state.set_captain(&PlayerId::from("bat1")).unwrap();
        state.set_vice_captain(&PlayerId::from("bowl1")).unwrap();
        assert_eq!(
            check_submittable(&state),
            Err(WizardError::SelectionIncomplete)
        );
    }
}
