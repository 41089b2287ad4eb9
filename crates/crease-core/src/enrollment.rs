// Enrollment reconciler: decides at page load whether the user already has
// a squad in this contest and whether the builder should be offered.
//
// Three reads run as a waterfall, each bounded by its own timeout:
//   1. the user's enrollments, looking for an active one in this contest
//   2. the team referenced by that enrollment
//   3. the user's teams, scanned for one bound to this contest
// A later read only runs when the earlier one came back empty. Failed or
// timed-out reads degrade to "absent" and never block the page.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, EnrollmentRecord, FantasyApi, Team};
use crate::ids::ContestId;

/// Per-read timeout used when none is configured.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(5_000);

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentState {
    /// Lookups still in flight.
    Checking,
    NotEnrolled,
    /// Active enrollment with a resolvable team: show it read-only.
    EnrolledWithTeam,
    /// Active enrollment but no team could be resolved for it.
    EnrolledWithoutTeam,
}

/// What to do with an enrollment whose team cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyPolicy {
    /// Offer the builder as if the user were not enrolled.
    #[default]
    SelfHeal,
    /// Keep the builder closed and ask the user to contact support.
    Block,
}

// ---------------------------------------------------------------------------
// Lookup trace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Enrollments,
    TeamById,
    TeamsByContest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found,
    Absent,
    Failed(String),
    TimedOut,
    /// Not needed: an earlier read already answered the question.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupStep {
    pub source: LookupSource,
    pub outcome: LookupOutcome,
}

// ---------------------------------------------------------------------------
// MountGuard
// ---------------------------------------------------------------------------

/// Shared flag telling in-flight work whether its owner is still around.
/// Cloned into whatever awaits; the owner calls [`MountGuard::detach`] when
/// it goes away.
#[derive(Debug, Clone)]
pub struct MountGuard(Arc<AtomicBool>);

impl Default for MountGuard {
    fn default() -> Self {
        MountGuard::new()
    }
}

impl MountGuard {
    pub fn new() -> Self {
        MountGuard(Arc::new(AtomicBool::new(true)))
    }

    pub fn detach(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Detached)` once the owner has gone away.
    pub fn check(&self) -> Result<(), ReconcileError> {
        if self.is_mounted() {
            Ok(())
        } else {
            debug!("Discarding lookup result: session detached");
            Err(ReconcileError::Detached)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("session was closed while enrollment lookups were in flight")]
    Detached,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub contest_id: ContestId,
    pub state: EnrollmentState,
    pub policy: InconsistencyPolicy,
    /// The active enrollment for this contest, if one was found.
    pub enrollment: Option<EnrollmentRecord>,
    /// A team bound to this contest, from either team lookup.
    pub existing_team: Option<Team>,
    pub trace: Vec<LookupStep>,
}

impl Reconciliation {
    pub fn checking(contest_id: ContestId, policy: InconsistencyPolicy) -> Self {
        Reconciliation {
            contest_id,
            state: EnrollmentState::Checking,
            policy,
            enrollment: None,
            existing_team: None,
            trace: Vec::new(),
        }
    }

    /// Whether the builder (and its player fetch) should be offered.
    pub fn wizard_enabled(&self) -> bool {
        match self.state {
            EnrollmentState::Checking | EnrollmentState::EnrolledWithTeam => false,
            EnrollmentState::NotEnrolled => true,
            EnrollmentState::EnrolledWithoutTeam => self.policy == InconsistencyPolicy::SelfHeal,
        }
    }

    /// The inconsistent state is kept closed and needs a support notice.
    pub fn needs_support(&self) -> bool {
        self.state == EnrollmentState::EnrolledWithoutTeam
            && self.policy == InconsistencyPolicy::Block
    }

    pub fn outcome_of(&self, source: LookupSource) -> Option<&LookupOutcome> {
        self.trace
            .iter()
            .find(|s| s.source == source)
            .map(|s| &s.outcome)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    api: Arc<dyn FantasyApi>,
    step_timeout: Duration,
    policy: InconsistencyPolicy,
}

impl Reconciler {
    pub fn new(api: Arc<dyn FantasyApi>) -> Self {
        Reconciler {
            api,
            step_timeout: DEFAULT_LOOKUP_TIMEOUT,
            policy: InconsistencyPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn with_policy(mut self, policy: InconsistencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the lookup waterfall for `contest`.
    ///
    /// `mount` is checked after every awaited read; once it is detached the
    /// partial result is dropped and `ReconcileError::Detached` returned.
    pub async fn reconcile(
        &self,
        contest: &ContestId,
        mount: &MountGuard,
    ) -> Result<Reconciliation, ReconcileError> {
        let mut result = Reconciliation::checking(contest.clone(), self.policy);

        // 1. Enrollments.
        let enrollments = self
            .bounded(LookupSource::Enrollments, self.api.my_enrollments())
            .await;
        mount.check()?;
        let enrollment = match enrollments {
            Ok(records) => {
                let active = records
                    .into_iter()
                    .find(|r| &r.contest_id == contest && r.is_active());
                let outcome = if active.is_some() {
                    LookupOutcome::Found
                } else {
                    LookupOutcome::Absent
                };
                result.trace.push(step(LookupSource::Enrollments, outcome));
                active
            }
            Err(outcome) => {
                result.trace.push(step(LookupSource::Enrollments, outcome));
                None
            }
        };

        // 2. Team referenced by the enrollment.
        let mut team: Option<Team> = None;
        match enrollment.as_ref().and_then(|e| e.team_id.clone()) {
            Some(team_id) => {
                let fetched = self
                    .bounded(LookupSource::TeamById, self.api.get_team(&team_id))
                    .await;
                mount.check()?;
                match fetched {
                    Ok(t) => {
                        result.trace.push(step(LookupSource::TeamById, LookupOutcome::Found));
                        team = Some(t);
                    }
                    Err(outcome) => result.trace.push(step(LookupSource::TeamById, outcome)),
                }
            }
            None => result
                .trace
                .push(step(LookupSource::TeamById, LookupOutcome::Skipped)),
        }

        // 3. Scan the user's teams for one bound to this contest.
        if team.is_none() {
            let teams = self
                .bounded(LookupSource::TeamsByContest, self.api.my_teams())
                .await;
            mount.check()?;
            match teams {
                Ok(teams) => {
                    team = teams
                        .into_iter()
                        .find(|t| t.contest_id.as_ref() == Some(contest));
                    let outcome = if team.is_some() {
                        LookupOutcome::Found
                    } else {
                        LookupOutcome::Absent
                    };
                    result.trace.push(step(LookupSource::TeamsByContest, outcome));
                }
                Err(outcome) => result.trace.push(step(LookupSource::TeamsByContest, outcome)),
            }
        } else {
            result
                .trace
                .push(step(LookupSource::TeamsByContest, LookupOutcome::Skipped));
        }

        result.state = match (&enrollment, &team) {
            (Some(_), Some(_)) => EnrollmentState::EnrolledWithTeam,
            (Some(e), None) => {
                warn!(
                    "Active enrollment in contest {} has no resolvable team (team_id={:?}); policy={:?}",
                    contest, e.team_id, self.policy
                );
                EnrollmentState::EnrolledWithoutTeam
            }
            (None, _) => EnrollmentState::NotEnrolled,
        };
        result.enrollment = enrollment;
        result.existing_team = team;

        info!(
            "Enrollment for contest {}: {:?} (builder {})",
            contest,
            result.state,
            if result.wizard_enabled() { "enabled" } else { "disabled" }
        );
        Ok(result)
    }

    /// Run one read under the step timeout, mapping "not found" to Absent
    /// and every other failure to an explicit outcome.
    async fn bounded<T, F>(&self, source: LookupSource, read: F) -> Result<T, LookupOutcome>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        match tokio::time::timeout(self.step_timeout, read).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_not_found() => {
                debug!("{:?} lookup: not found ({})", source, e);
                Err(LookupOutcome::Absent)
            }
            Ok(Err(e)) => {
                warn!("{:?} lookup failed, treating as absent: {}", source, e);
                Err(LookupOutcome::Failed(e.to_string()))
            }
            Err(_) => {
                warn!(
                    "{:?} lookup timed out after {:?}, treating as absent",
                    source, self.step_timeout
                );
                Err(LookupOutcome::TimedOut)
            }
        }
    }
}

fn step(source: LookupSource, outcome: LookupOutcome) -> LookupStep {
    LookupStep { source, outcome }
}
