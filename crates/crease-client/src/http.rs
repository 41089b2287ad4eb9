// REST client for the fantasy backend.
//
// Maps the backend's JSON shapes onto the engine's records and its error
// responses (`{"detail": "..."}`) onto `ApiError`. No retries: a failed
// request is reported once and the engine decides what to do with it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crease_core::api::{ApiError, EnrollmentRecord, FantasyApi, Team, TeamDraft, TeamPatch};
use crease_core::catalog::{Slot, DEFAULT_SLOT_LIMIT};
use crease_core::ids::{ContestId, PlayerId, SlotId, TeamId};
use crease_core::player::{Player, PointsOverride};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_SLOTS_PATH: &str = "/api/admin/slots";

/// Upper bound the players endpoint accepts for `limit`.
const PLAYER_PAGE_LIMIT: u32 = 1000;
const SLOT_PAGE_SIZE: u32 = 100;
const TEAM_PAGE_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Scheme and host, e.g. `https://fantasy.example.com`.
    pub base_url: String,
    pub slots_path: String,
    pub timeout: Duration,
    /// Bearer token for the signed-in user.
    pub token: Option<String>,
}

impl HttpSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpSettings {
            base_url: base_url.into(),
            slots_path: DEFAULT_SLOTS_PATH.to_string(),
            timeout: Duration::from_secs(10),
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SlotOut {
    id: String,
    #[serde(default)]
    code: Option<String>,
    name: String,
    #[serde(default)]
    min_select: usize,
    #[serde(default)]
    max_select: Option<usize>,
}

impl From<SlotOut> for Slot {
    /// Players reference slots by code, so the code wins over the record id.
    fn from(s: SlotOut) -> Self {
        let id = s.code.filter(|c| !c.is_empty()).unwrap_or(s.id);
        Slot {
            id: SlotId::new(id),
            name: s.name,
            min_select: s.min_select,
            max_select: s.max_select.unwrap_or(DEFAULT_SLOT_LIMIT),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SlotsResponse {
    Paged { slots: Vec<SlotOut> },
    Plain(Vec<SlotOut>),
}

#[derive(Debug, Deserialize)]
struct PlayerOut {
    id: String,
    name: String,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    price: f64,
    /// Numeric on the public endpoint, string on admin ones.
    slot: Value,
    #[serde(default)]
    points: f64,
}

impl PlayerOut {
    fn into_player(self) -> Option<Player> {
        let slot = match self.slot {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.is_empty() => s,
            _ => return None,
        };
        Some(Player {
            id: PlayerId::new(self.id),
            name: self.name,
            team: self.team.unwrap_or_default(),
            slot_id: SlotId::new(slot),
            price: self.price,
            points: self.points,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TeamsListResponse {
    teams: Vec<Team>,
}

#[derive(Debug, Serialize)]
struct EnrollBody<'a> {
    team_id: &'a TeamId,
}

// ---------------------------------------------------------------------------
// HttpApi
// ---------------------------------------------------------------------------

pub struct HttpApi {
    http: reqwest::Client,
    settings: HttpSettings,
}

impl HttpApi {
    pub fn new(settings: HttpSettings) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(HttpApi { http, settings })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let url = join_url(&self.settings.base_url, path);
        debug!("{} {}", method, url);

        let mut req = self.http.request(method, &url).query(query);
        if let Some(token) = &self.settings.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.request(method, path, &[], Some(body)).await
    }
}

#[async_trait]
impl FantasyApi for HttpApi {
    async fn slots(&self) -> Result<Vec<Slot>, ApiError> {
        let query = [("page", "1".to_string()), ("page_size", SLOT_PAGE_SIZE.to_string())];
        let resp: SlotsResponse = self.get(&self.settings.slots_path, &query).await?;
        let slots = match resp {
            SlotsResponse::Paged { slots } | SlotsResponse::Plain(slots) => slots,
        };
        Ok(slots.into_iter().map(Slot::from).collect())
    }

    /// The backend applies contest eligibility itself; the contest is only
    /// logged here.
    async fn players(&self, contest: Option<&ContestId>) -> Result<Vec<Player>, ApiError> {
        debug!("Fetching players (contest={:?})", contest.map(|c| c.as_str()));
        let rows: Vec<PlayerOut> = self
            .get("/api/players", &[("limit", PLAYER_PAGE_LIMIT.to_string())])
            .await?;
        Ok(rows.into_iter().filter_map(PlayerOut::into_player).collect())
    }

    /// The public API exposes contest points only per enrolled team, so
    /// there is nothing to show before a team exists.
    async fn contest_points(&self, contest: &ContestId) -> Result<Vec<PointsOverride>, ApiError> {
        debug!("No per-contest points read for contest {}", contest);
        Ok(Vec::new())
    }

    async fn my_enrollments(&self) -> Result<Vec<EnrollmentRecord>, ApiError> {
        self.get("/api/contests/enrollments/me", &[]).await
    }

    async fn get_team(&self, id: &TeamId) -> Result<Team, ApiError> {
        self.get(&format!("/api/teams/{id}"), &[]).await
    }

    async fn my_teams(&self) -> Result<Vec<Team>, ApiError> {
        let query = [("skip", "0".to_string()), ("limit", TEAM_PAGE_LIMIT.to_string())];
        let resp: TeamsListResponse = self.get("/api/teams/", &query).await?;
        Ok(resp.teams)
    }

    async fn create_team(&self, draft: &TeamDraft) -> Result<Team, ApiError> {
        self.send(Method::POST, "/api/teams/", draft).await
    }

    async fn update_team(&self, id: &TeamId, patch: &TeamPatch) -> Result<Team, ApiError> {
        self.send(Method::PUT, &format!("/api/teams/{id}"), patch).await
    }

    async fn enroll(&self, contest: &ContestId, team: &TeamId) -> Result<EnrollmentRecord, ApiError> {
        self.send(
            Method::POST,
            &format!("/api/contests/{contest}/enroll"),
            &EnrollBody { team_id: team },
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Join a base URL and an absolute path without doubling or dropping `/`.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pull the `detail` message out of an error body.
///
/// FastAPI sends either `{"detail": "text"}` or, for validation errors,
/// `{"detail": [{"msg": "..."}, ...]}`.
pub(crate) fn parse_detail(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    match v.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let detail = parse_detail(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    });
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Rejected(detail),
        _ => ApiError::Http {
            status: status.as_u16(),
            detail,
        },
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}
