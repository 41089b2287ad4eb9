// Submission adapter: turns a finished selection into create / update /
// enroll calls and reports partial success.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, EnrollmentRecord, FantasyApi, Team, TeamDraft, TeamPatch};
use crate::ids::{ContestId, TeamId};
use crate::selection::SelectionState;
use crate::wizard::{check_submittable, WizardError};

/// Longest team name the backend accepts.
pub const MAX_TEAM_NAME_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Submission failed before anything was saved. The caller's selection and
/// wizard state are untouched and the user can retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    NotReady(#[from] WizardError),

    #[error("{0}")]
    TeamName(String),

    #[error("Could not create team: {0}")]
    Create(ApiError),

    #[error("Could not update team: {0}")]
    Update(ApiError),
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollOutcome {
    /// No contest bound, or already enrolled.
    NotRequested,
    Enrolled(EnrollmentRecord),
    /// The team was saved but joining the contest failed. Nothing is rolled
    /// back.
    Failed(ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    pub team: Team,
    pub action: SaveAction,
    pub enrollment: EnrollOutcome,
}

impl SubmissionOutcome {
    /// Saved, but the contest join did not go through.
    pub fn is_partial(&self) -> bool {
        matches!(self.enrollment, EnrollOutcome::Failed(_))
    }

    /// Message for the banner shown after submit.
    pub fn banner(&self) -> String {
        let saved = match self.action {
            SaveAction::Created => "Team created",
            SaveAction::Updated => "Team updated",
        };
        match &self.enrollment {
            EnrollOutcome::NotRequested => format!("{saved}."),
            EnrollOutcome::Enrolled(_) => format!("{saved} and entered into the contest."),
            EnrollOutcome::Failed(e) => format!("Team saved, contest join failed: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft building
// ---------------------------------------------------------------------------

/// Trimmed, length-checked team name.
pub fn validate_team_name(name: &str) -> Result<String, SubmitError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SubmitError::TeamName("Please enter a team name.".to_string()));
    }
    if trimmed.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(SubmitError::TeamName(format!(
            "Team name must be at most {MAX_TEAM_NAME_LEN} characters."
        )));
    }
    Ok(trimmed.to_string())
}

/// Snapshot the selection into a create payload, refusing anything that
/// would not pass review.
pub fn build_draft(
    name: &str,
    state: &SelectionState,
    contest: Option<&ContestId>,
) -> Result<TeamDraft, SubmitError> {
    check_submittable(state)?;
    let team_name = validate_team_name(name)?;
    let sel = state.selection();
    Ok(TeamDraft {
        team_name,
        player_ids: sel.player_ids().to_vec(),
        captain_id: sel.captain().cloned(),
        vice_captain_id: sel.vice_captain().cloned(),
        contest_id: contest.cloned(),
    })
}

// ---------------------------------------------------------------------------
// SubmissionAdapter
// ---------------------------------------------------------------------------

pub struct SubmissionAdapter {
    api: Arc<dyn FantasyApi>,
}

impl SubmissionAdapter {
    pub fn new(api: Arc<dyn FantasyApi>) -> Self {
        SubmissionAdapter { api }
    }

    /// Persist `draft`.
    ///
    /// With `existing` set the team is updated in place with the full
    /// payload; otherwise it is created. Then, if `enroll_in` is set, the
    /// saved team is entered into that contest. An enroll failure after a
    /// successful save is reported in the outcome, not as an error.
    pub async fn submit(
        &self,
        draft: TeamDraft,
        existing: Option<&TeamId>,
        enroll_in: Option<&ContestId>,
    ) -> Result<SubmissionOutcome, SubmitError> {
        let (team, action) = match existing {
            Some(id) => {
                let patch = TeamPatch::from(draft);
                let team = self
                    .api
                    .update_team(id, &patch)
                    .await
                    .map_err(SubmitError::Update)?;
                info!("Updated team {} ({})", team.id, team.team_name);
                (team, SaveAction::Updated)
            }
            None => {
                let team = self
                    .api
                    .create_team(&draft)
                    .await
                    .map_err(SubmitError::Create)?;
                info!("Created team {} ({})", team.id, team.team_name);
                (team, SaveAction::Created)
            }
        };

        let enrollment = match enroll_in {
            None => EnrollOutcome::NotRequested,
            Some(contest) => match self.api.enroll(contest, &team.id).await {
                Ok(record) => {
                    info!("Enrolled team {} in contest {}", team.id, contest);
                    EnrollOutcome::Enrolled(record)
                }
                Err(e) => {
                    warn!(
                        "Team {} saved but enrollment in contest {} failed: {}",
                        team.id, contest, e
                    );
                    EnrollOutcome::Failed(e)
                }
            },
        };

        Ok(SubmissionOutcome {
            team,
            action,
            enrollment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PlayerId;

    fn saved_team() -> Team {
        Team {
            id: TeamId::from("t1"),
            team_name: "Spartans XI".to_string(),
            player_ids: vec![PlayerId::from("p1")],
            captain_id: None,
            vice_captain_id: None,
            contest_id: None,
        }
    }

    #[test]
    fn team_name_is_trimmed_and_bounded() {
        assert_eq!(validate_team_name("  Spartans XI ").unwrap(), "Spartans XI");
        assert!(matches!(validate_team_name("   "), Err(SubmitError::TeamName(_))));
        assert!(validate_team_name(&"x".repeat(MAX_TEAM_NAME_LEN)).is_ok());
        assert!(matches!(
            validate_team_name(&"x".repeat(MAX_TEAM_NAME_LEN + 1)),
            Err(SubmitError::TeamName(_))
        ));
    }

    #[test]
    fn partial_success_banner_is_distinct() {
        let outcome = SubmissionOutcome {
            team: saved_team(),
            action: SaveAction::Created,
            enrollment: EnrollOutcome::Failed(ApiError::Http {
                status: 500,
                detail: "Internal Server Error".to_string(),
            }),
        };
        assert!(outcome.is_partial());
        assert!(outcome.banner().starts_with("Team saved, contest join failed"));

        let create_failed = SubmitError::Create(ApiError::Transport("reset".into()));
        assert_ne!(create_failed.to_string(), outcome.banner());
        assert!(create_failed.to_string().starts_with("Could not create team"));
    }

    #[test]
    fn full_success_banner() {
        let outcome = SubmissionOutcome {
            team: saved_team(),
            action: SaveAction::Updated,
            enrollment: EnrollOutcome::NotRequested,
        };
        assert!(!outcome.is_partial());
        assert_eq!(outcome.banner(), "Team updated.");
    }
}
