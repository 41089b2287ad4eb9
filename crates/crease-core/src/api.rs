// Collaborator contract: the reads and writes the engine performs against
// the fantasy backend, and the records that cross that boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Slot;
use crate::ids::{ContestId, PlayerId, TeamId};
use crate::player::{Player, PointsOverride};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A persisted fantasy team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub team_name: String,
    pub player_ids: Vec<PlayerId>,
    #[serde(default)]
    pub captain_id: Option<PlayerId>,
    #[serde(default)]
    pub vice_captain_id: Option<PlayerId>,
    #[serde(default)]
    pub contest_id: Option<ContestId>,
}

/// Payload for creating a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDraft {
    pub team_name: String,
    pub player_ids: Vec<PlayerId>,
    pub captain_id: Option<PlayerId>,
    pub vice_captain_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<ContestId>,
}

/// Partial update of a team. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_ids: Option<Vec<PlayerId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captain_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vice_captain_id: Option<PlayerId>,
}

impl From<TeamDraft> for TeamPatch {
    /// A full-payload patch, as sent when re-submitting an existing entry.
    fn from(draft: TeamDraft) -> Self {
        TeamPatch {
            team_name: Some(draft.team_name),
            player_ids: Some(draft.player_ids),
            captain_id: draft.captain_id,
            vice_captain_id: draft.vice_captain_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Removed,
    #[serde(other)]
    Other,
}

/// The association of one of the user's teams with a contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub contest_id: ContestId,
    #[serde(default)]
    pub team_id: Option<TeamId>,
    pub status: EnrollmentStatus,
    #[serde(with = "utc_or_naive")]
    pub enrolled_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }
}

/// Timestamps arrive either as RFC 3339 or as naive UTC without an offset.
mod utc_or_naive {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-success HTTP status, with the backend's `detail` message if any.
    #[error("request failed with status {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("could not reach the server: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The backend refused the request on a business rule.
    #[error("{0}")]
    Rejected(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_) | ApiError::Http { status: 404, .. })
    }
}

// ---------------------------------------------------------------------------
// FantasyApi
// ---------------------------------------------------------------------------

/// Everything the engine needs from the outside world. Implemented over HTTP
/// and over a local SQLite store; tests use in-memory doubles.
#[async_trait]
pub trait FantasyApi: Send + Sync {
    /// Slot catalog, in display order.
    async fn slots(&self) -> Result<Vec<Slot>, ApiError>;

    /// Selectable players, already filtered for the contest's eligibility
    /// rules when a contest is given.
    async fn players(&self, contest: Option<&ContestId>) -> Result<Vec<Player>, ApiError>;

    /// Contest-scoped points overrides. Empty when the contest has none.
    async fn contest_points(&self, contest: &ContestId) -> Result<Vec<PointsOverride>, ApiError>;

    /// The current user's enrollments, across all contests.
    async fn my_enrollments(&self) -> Result<Vec<EnrollmentRecord>, ApiError>;

    async fn get_team(&self, id: &TeamId) -> Result<Team, ApiError>;

    /// The current user's teams.
    async fn my_teams(&self) -> Result<Vec<Team>, ApiError>;

    async fn create_team(&self, draft: &TeamDraft) -> Result<Team, ApiError>;

    async fn update_team(&self, id: &TeamId, patch: &TeamPatch) -> Result<Team, ApiError>;

    async fn enroll(&self, contest: &ContestId, team: &TeamId) -> Result<EnrollmentRecord, ApiError>;
}
