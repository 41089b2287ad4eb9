// Team-builder session: one page visit's worth of reconciliation, selection,
// wizard and submission, owned by whichever UI surface drives it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, FantasyApi, Team};
use crate::catalog::{CatalogError, SlotCatalog};
use crate::enrollment::{
    InconsistencyPolicy, MountGuard, ReconcileError, Reconciler, Reconciliation,
    DEFAULT_LOOKUP_TIMEOUT,
};
use crate::ids::{ContestId, PlayerId, SlotId};
use crate::player::{PlayerPool, PointsTable};
use crate::selection::{SelectionError, SelectionState, Toggle};
use crate::submit::{
    build_draft, EnrollOutcome, SubmissionAdapter, SubmissionOutcome, SubmitError,
};
use crate::wizard::{Wizard, WizardError, WizardStep};

/// Callback receiving the reason for a refused selection change.
pub type BlockedHandler = Box<dyn FnMut(&str) + Send>;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Explicit roster cap; defaults to the sum of slot maxima.
    pub total_cap: Option<usize>,
    pub lookup_timeout: Duration,
    pub inconsistency_policy: InconsistencyPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            total_cap: None,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            inconsistency_policy: InconsistencyPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("invalid slot catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("could not load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: ApiError,
    },
}

/// What the page should show after loading.
pub enum PageView {
    /// Already entered with a team: read-only squad, no builder.
    ViewOnly {
        reconciliation: Reconciliation,
        team: Team,
    },
    /// Enrolled but the team is missing, and policy keeps the builder closed.
    SupportNeeded { reconciliation: Reconciliation },
    Builder(Box<TeamBuilder>),
}

// ---------------------------------------------------------------------------
// TeamBuilder
// ---------------------------------------------------------------------------

pub struct TeamBuilder {
    contest: Option<ContestId>,
    reconciliation: Option<Reconciliation>,
    state: SelectionState,
    wizard: Wizard,
    points: PointsTable,
    team_name: String,
    known_team: Option<Team>,
    enrolled: bool,
    restore_skipped: Vec<SelectionError>,
    on_blocked: Option<BlockedHandler>,
    submitter: SubmissionAdapter,
}

impl TeamBuilder {
    /// Reconcile enrollment for `contest` (if any) and, when the builder is
    /// to be offered, fetch the slot catalog, player pool and contest points.
    ///
    /// When the user is already entered with a team, nothing beyond the
    /// enrollment lookups is fetched.
    pub async fn load(
        api: Arc<dyn FantasyApi>,
        contest: Option<ContestId>,
        opts: &SessionOptions,
        mount: &MountGuard,
    ) -> Result<PageView, SessionError> {
        let reconciliation = match &contest {
            Some(contest_id) => {
                let r = Reconciler::new(Arc::clone(&api))
                    .with_timeout(opts.lookup_timeout)
                    .with_policy(opts.inconsistency_policy)
                    .reconcile(contest_id, mount)
                    .await?;
                if !r.wizard_enabled() {
                    return Ok(match r.existing_team.clone() {
                        Some(team) if !r.needs_support() => PageView::ViewOnly {
                            reconciliation: r,
                            team,
                        },
                        _ => PageView::SupportNeeded { reconciliation: r },
                    });
                }
                Some(r)
            }
            None => None,
        };

        let slots = api.slots().await.map_err(|source| SessionError::Load {
            what: "slots",
            source,
        })?;
        mount.check()?;
        let mut catalog = SlotCatalog::new(slots)?;
        if let Some(cap) = opts.total_cap {
            catalog = catalog.with_total_cap(cap)?;
        }

        let players = api
            .players(contest.as_ref())
            .await
            .map_err(|source| SessionError::Load {
                what: "players",
                source,
            })?;
        mount.check()?;
        let pool = PlayerPool::new(players, &catalog);
        info!("Loaded {} slots and {} players", catalog.len(), pool.len());

        let points = match &contest {
            Some(contest_id) => match api.contest_points(contest_id).await {
                Ok(rows) => PointsTable::from_overrides(rows),
                Err(e) => {
                    warn!("Contest points unavailable, showing global points: {}", e);
                    PointsTable::default()
                }
            },
            None => PointsTable::default(),
        };
        mount.check()?;

        let mut builder = TeamBuilder {
            // A builder is only offered without a resolvable entry, so the
            // first save always enters the contest.
            enrolled: false,
            contest,
            state: SelectionState::new(Arc::new(catalog), Arc::new(pool)),
            wizard: Wizard::new(),
            points,
            team_name: String::new(),
            known_team: None,
            restore_skipped: Vec::new(),
            on_blocked: None,
            submitter: SubmissionAdapter::new(api),
            reconciliation,
        };

        let existing = builder
            .reconciliation
            .as_ref()
            .and_then(|r| r.existing_team.clone());
        if let Some(team) = existing {
            builder.restore(team);
        }

        Ok(PageView::Builder(Box::new(builder)))
    }

    /// Pre-seed from a saved team (edit mode).
    fn restore(&mut self, team: Team) {
        info!("Editing existing team {} ({})", team.id, team.team_name);
        self.restore_skipped = self.state.seed(
            &team.player_ids,
            team.captain_id.as_ref(),
            team.vice_captain_id.as_ref(),
        );
        self.team_name = team.team_name.clone();
        self.known_team = Some(team);
    }

    pub fn on_blocked(&mut self, handler: BlockedHandler) {
        self.on_blocked = Some(handler);
    }

    // ----- Accessors -----

    pub fn contest(&self) -> Option<&ContestId> {
        self.contest.as_ref()
    }

    pub fn reconciliation(&self) -> Option<&Reconciliation> {
        self.reconciliation.as_ref()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn points(&self) -> &PointsTable {
        &self.points
    }

    pub fn team_name(&self) -> &str {
        &self.team_name
    }

    pub fn set_team_name(&mut self, name: impl Into<String>) {
        self.team_name = name.into();
    }

    /// The saved team this session edits, if any.
    pub fn known_team(&self) -> Option<&Team> {
        self.known_team.as_ref()
    }

    pub fn is_edit_mode(&self) -> bool {
        self.known_team.is_some()
    }

    /// Saved picks that could not be restored into the current pool.
    pub fn restore_skipped(&self) -> &[SelectionError] {
        &self.restore_skipped
    }

    pub fn active_slot_id(&self) -> Option<&SlotId> {
        self.wizard.active_slot_id(&self.state)
    }

    // ----- Selection -----

    pub fn toggle(&mut self, id: &PlayerId) -> Result<Toggle, SelectionError> {
        let result = self.state.toggle(id);
        self.report(result)
    }

    pub fn set_captain(&mut self, id: &PlayerId) -> Result<(), SelectionError> {
        let result = self.state.set_captain(id);
        self.report(result)
    }

    pub fn set_vice_captain(&mut self, id: &PlayerId) -> Result<(), SelectionError> {
        let result = self.state.set_vice_captain(id);
        self.report(result)
    }

    pub fn replace(&mut self, old: &PlayerId, new: &PlayerId) -> Result<(), SelectionError> {
        let result = self.state.replace(old, new);
        self.report(result)
    }

    /// Empty the selection and return the wizard to the first slot of step 1.
    pub fn clear_all(&mut self) {
        self.state.clear();
        self.wizard.reset();
    }

    // ----- Wizard -----

    pub fn next_slot(&mut self) -> Result<(), WizardError> {
        self.wizard.next_slot(&self.state)
    }

    pub fn prev_slot(&mut self) -> Result<(), WizardError> {
        self.wizard.prev_slot()
    }

    pub fn select_slot(&mut self, slot: &SlotId) -> Result<(), WizardError> {
        self.wizard.select_slot(&self.state, slot)
    }

    pub fn continue_to_leaders(&mut self) -> Result<(), WizardError> {
        self.wizard.continue_to_leaders(&self.state)
    }

    pub fn continue_to_review(&mut self) -> Result<(), WizardError> {
        self.wizard.continue_to_review(&self.state)
    }

    pub fn go_to(&mut self, step: WizardStep) -> Result<(), WizardError> {
        self.wizard.go_to(step)
    }

    // ----- Submission -----

    /// Save the squad from the review step.
    ///
    /// Updates the known team if there is one, otherwise creates it, then
    /// enters it into the bound contest unless already entered. On error
    /// nothing in the session changes.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome, SubmitError> {
        if self.wizard.step() != WizardStep::Review {
            return Err(WizardError::WrongStep(self.wizard.step()).into());
        }
        let draft = build_draft(&self.team_name, &self.state, self.contest.as_ref())?;
        let existing = self.known_team.as_ref().map(|t| t.id.clone());
        let enroll_in = if self.enrolled {
            None
        } else {
            self.contest.clone()
        };

        let outcome = self
            .submitter
            .submit(draft, existing.as_ref(), enroll_in.as_ref())
            .await?;

        if matches!(outcome.enrollment, EnrollOutcome::Enrolled(_)) {
            self.enrolled = true;
        }
        self.known_team = Some(outcome.team.clone());
        Ok(outcome)
    }

    fn report<T>(&mut self, result: Result<T, SelectionError>) -> Result<T, SelectionError> {
        if let Err(e) = &result {
            debug!("Selection change refused: {}", e);
            if let Some(handler) = self.on_blocked.as_mut() {
                handler(&e.to_string());
            }
        }
        result
    }
}
