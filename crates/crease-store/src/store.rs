// SQLite-backed local backend: slots, players, contests, teams and
// enrollments for a single signed-in user.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crease_core::api::{
    ApiError, EnrollmentRecord, EnrollmentStatus, FantasyApi, Team, TeamDraft, TeamPatch,
};
use crease_core::catalog::Slot;
use crease_core::ids::{ContestId, PlayerId, SlotId, TeamId};
use crease_core::player::{Player, PointsOverride};

/// Largest squad the team rules accept, whatever the slot catalog says.
pub const MAX_TEAM_PLAYERS: usize = 16;
const MAX_TEAM_NAME_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("failed to encode column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A team or enrollment rule was broken. The text is user-facing.
    #[error("{0}")]
    Rule(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound(what.to_string()),
            StoreError::Rule(msg) => ApiError::Rejected(msg),
            StoreError::Json(e) => ApiError::Decode(e.to_string()),
            StoreError::Corrupt(msg) => ApiError::Decode(msg),
            other => ApiError::Transport(other.to_string()),
        }
    }
}

fn rule(msg: &str) -> StoreError {
    StoreError::Rule(msg.to_string())
}

// ---------------------------------------------------------------------------
// Seed records
// ---------------------------------------------------------------------------

fn default_status() -> String {
    "open".to_string()
}

fn default_visibility() -> String {
    "public".to_string()
}

/// A contest as configured for the local backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContestSeed {
    pub id: ContestId,
    pub name: String,
    /// `open`, `live`, `completed` or `archived`.
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    /// Team affiliations eligible for this contest. Empty means all.
    #[serde(default)]
    pub allowed_teams: Vec<String>,
}

impl ContestSeed {
    pub fn open(id: &str, name: &str) -> Self {
        ContestSeed {
            id: ContestId::from(id),
            name: name.to_string(),
            status: default_status(),
            visibility: default_visibility(),
            allowed_teams: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// LocalStore
// ---------------------------------------------------------------------------

pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open (or create) the store at `path` and ensure all tables exist.
    /// Pass `":memory:"` for an ephemeral store.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS slots (
                id         TEXT PRIMARY KEY,
                position   INTEGER NOT NULL,
                name       TEXT NOT NULL,
                min_select INTEGER NOT NULL,
                max_select INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS players (
                id      TEXT PRIMARY KEY,
                name    TEXT NOT NULL,
                team    TEXT NOT NULL DEFAULT '',
                slot_id TEXT NOT NULL REFERENCES slots(id),
                price   REAL NOT NULL DEFAULT 0,
                points  REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS contests (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                status        TEXT NOT NULL DEFAULT 'open',
                visibility    TEXT NOT NULL DEFAULT 'public',
                allowed_teams TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS contest_points (
                contest_id TEXT NOT NULL REFERENCES contests(id),
                player_id  TEXT NOT NULL REFERENCES players(id),
                points     REAL NOT NULL,
                PRIMARY KEY (contest_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS teams (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT NOT NULL UNIQUE,
                team_name       TEXT NOT NULL,
                player_ids      TEXT NOT NULL,
                captain_id      TEXT,
                vice_captain_id TEXT,
                contest_id      TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS enrollments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                contest_id  TEXT NOT NULL REFERENCES contests(id),
                team_id     TEXT NOT NULL REFERENCES teams(id),
                status      TEXT NOT NULL,
                enrolled_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_enrollments_contest ON enrollments(contest_id);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A poisoned lock only means another caller panicked mid-call; SQLite
    /// keeps the connection consistent, so the guard is recovered.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ----- Seeding -----

    /// Insert or update slots, keeping the given order as display order.
    pub fn upsert_slots(&self, slots: &[Slot]) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for (position, slot) in slots.iter().enumerate() {
            tx.execute(
                "INSERT INTO slots (id, position, name, min_select, max_select)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    position   = excluded.position,
                    name       = excluded.name,
                    min_select = excluded.min_select,
                    max_select = excluded.max_select",
                params![
                    slot.id.as_str(),
                    position as i64,
                    slot.name,
                    slot.min_select as i64,
                    slot.max_select as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Insert or update players. Players whose slot is not in the store are
    /// skipped with a warning. Returns how many were stored.
    pub fn upsert_players(&self, players: &[Player]) -> Result<usize, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut stored = 0;
        for p in players {
            let slot_known: bool = tx
                .query_row(
                    "SELECT 1 FROM slots WHERE id = ?1",
                    params![p.slot_id.as_str()],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if !slot_known {
                warn!("Skipping player '{}': unknown slot '{}'", p.name, p.slot_id);
                continue;
            }
            tx.execute(
                "INSERT INTO players (id, name, team, slot_id, price, points)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name    = excluded.name,
                    team    = excluded.team,
                    slot_id = excluded.slot_id,
                    price   = excluded.price,
                    points  = excluded.points",
                params![p.id.as_str(), p.name, p.team, p.slot_id.as_str(), p.price, p.points],
            )?;
            stored += 1;
        }
        tx.commit()?;
        info!("Stored {} of {} players", stored, players.len());
        Ok(stored)
    }

    pub fn upsert_contest(&self, contest: &ContestSeed) -> Result<(), StoreError> {
        let allowed = serde_json::to_string(&contest.allowed_teams)?;
        self.conn().execute(
            "INSERT INTO contests (id, name, status, visibility, allowed_teams)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name          = excluded.name,
                status        = excluded.status,
                visibility    = excluded.visibility,
                allowed_teams = excluded.allowed_teams",
            params![
                contest.id.as_str(),
                contest.name,
                contest.status,
                contest.visibility,
                allowed
            ],
        )?;
        Ok(())
    }

    pub fn set_contest_points(
        &self,
        contest: &ContestId,
        rows: &[PointsOverride],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO contest_points (contest_id, player_id, points)
                 VALUES (?1, ?2, ?3)",
                params![contest.as_str(), row.player_id.as_str(), row.points],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ----- Reads -----

    pub fn list_slots(&self) -> Result<Vec<Slot>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, min_select, max_select FROM slots ORDER BY position",
        )?;
        let slots = stmt
            .query_map([], |row| {
                Ok(Slot {
                    id: SlotId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    min_select: row.get::<_, i64>(2)? as usize,
                    max_select: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(slots)
    }

    /// Players, restricted to the contest's allowed teams when it has any.
    pub fn list_players(&self, contest: Option<&ContestId>) -> Result<Vec<Player>, StoreError> {
        let allowed: Vec<String> = match contest {
            Some(c) => self
                .contest_allowed_teams(c)?
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
            None => Vec::new(),
        };

        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, team, slot_id, price, points FROM players ORDER BY name",
        )?;
        let players = stmt
            .query_map([], |row| {
                Ok(Player {
                    id: PlayerId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    team: row.get(2)?,
                    slot_id: SlotId::new(row.get::<_, String>(3)?),
                    price: row.get(4)?,
                    points: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if allowed.is_empty() {
            return Ok(players);
        }
        Ok(players
            .into_iter()
            .filter(|p| allowed.contains(&p.team.trim().to_lowercase()))
            .collect())
    }

    fn contest_allowed_teams(&self, contest: &ContestId) -> Result<Vec<String>, StoreError> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT allowed_teams FROM contests WHERE id = ?1",
                params![contest.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn list_contest_points(&self, contest: &ContestId) -> Result<Vec<PointsOverride>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT player_id, points FROM contest_points WHERE contest_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![contest.as_str()], |row| {
                Ok(PointsOverride {
                    player_id: PlayerId::new(row.get::<_, String>(0)?),
                    points: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_team(&self, id: &TeamId) -> Result<Team, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, team_name, player_ids, captain_id, vice_captain_id, contest_id
                 FROM teams WHERE id = ?1",
                params![id.as_str()],
                TeamRow::from_row,
            )
            .optional()?;
        row.ok_or(StoreError::NotFound("Team"))?.into_team()
    }

    pub fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, team_name, player_ids, captain_id, vice_captain_id, contest_id
             FROM teams ORDER BY seq",
        )?;
        let rows = stmt
            .query_map([], TeamRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TeamRow::into_team).collect()
    }

    pub fn list_enrollments(&self) -> Result<Vec<EnrollmentRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT contest_id, team_id, status, enrolled_at FROM enrollments ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], EnrollmentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(EnrollmentRow::into_record).collect()
    }

    // ----- Writes -----

    pub fn create_team(&self, draft: &TeamDraft) -> Result<Team, StoreError> {
        let mut conn = self.conn();
        check_team(
            &conn,
            &draft.team_name,
            &draft.player_ids,
            draft.captain_id.as_ref(),
            draft.vice_captain_id.as_ref(),
        )?;

        let tx = conn.transaction()?;
        let next: i64 = tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM teams", [], |r| r.get(0))?;
        let id = TeamId::new(format!("team-{next}"));
        tx.execute(
            "INSERT INTO teams (id, team_name, player_ids, captain_id, vice_captain_id, contest_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.as_str(),
                draft.team_name.trim(),
                serde_json::to_string(&draft.player_ids)?,
                draft.captain_id.as_ref().map(|p| p.as_str()),
                draft.vice_captain_id.as_ref().map(|p| p.as_str()),
                draft.contest_id.as_ref().map(|c| c.as_str()),
            ],
        )?;
        tx.commit()?;
        drop(conn);

        debug!("Created team {}", id);
        self.get_team(&id)
    }

    /// Apply a partial update, then re-check the merged team against the
    /// same rules as creation.
    pub fn update_team(&self, id: &TeamId, patch: &TeamPatch) -> Result<Team, StoreError> {
        let mut team = self.get_team(id)?;
        if let Some(name) = &patch.team_name {
            team.team_name = name.trim().to_string();
        }
        if let Some(ids) = &patch.player_ids {
            team.player_ids = ids.clone();
        }
        if let Some(c) = &patch.captain_id {
            team.captain_id = Some(c.clone());
        }
        if let Some(v) = &patch.vice_captain_id {
            team.vice_captain_id = Some(v.clone());
        }

        let conn = self.conn();
        check_team(
            &conn,
            &team.team_name,
            &team.player_ids,
            team.captain_id.as_ref(),
            team.vice_captain_id.as_ref(),
        )?;
        conn.execute(
            "UPDATE teams SET team_name = ?2, player_ids = ?3, captain_id = ?4, vice_captain_id = ?5
             WHERE id = ?1",
            params![
                id.as_str(),
                team.team_name,
                serde_json::to_string(&team.player_ids)?,
                team.captain_id.as_ref().map(|p| p.as_str()),
                team.vice_captain_id.as_ref().map(|p| p.as_str()),
            ],
        )?;
        debug!("Updated team {}", id);
        Ok(team)
    }

    /// Enter a team into a contest.
    ///
    /// The contest must exist, be public, and not be completed or archived.
    /// Re-entering a team that is already actively enrolled returns the
    /// existing enrollment.
    pub fn enroll(&self, contest: &ContestId, team: &TeamId) -> Result<EnrollmentRecord, StoreError> {
        let conn = self.conn();

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT status, visibility FROM contests WHERE id = ?1",
                params![contest.as_str()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (status, visibility) = row.ok_or(StoreError::NotFound("Contest"))?;
        if visibility != "public" {
            return Err(StoreError::NotFound("Contest"));
        }
        if status == "completed" || status == "archived" {
            return Err(rule("Contest is not open for enrollment"));
        }

        let team_exists = conn
            .query_row("SELECT 1 FROM teams WHERE id = ?1", params![team.as_str()], |_| Ok(()))
            .optional()?
            .is_some();
        if !team_exists {
            return Err(StoreError::NotFound("Team"));
        }

        let existing = conn
            .query_row(
                "SELECT contest_id, team_id, status, enrolled_at FROM enrollments
                 WHERE contest_id = ?1 AND team_id = ?2 AND status = 'active'",
                params![contest.as_str(), team.as_str()],
                EnrollmentRow::from_row,
            )
            .optional()?;
        if let Some(row) = existing {
            debug!("Team {} already enrolled in {}", team, contest);
            return row.into_record();
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO enrollments (contest_id, team_id, status, enrolled_at)
             VALUES (?1, ?2, 'active', ?3)",
            params![contest.as_str(), team.as_str(), now.to_rfc3339()],
        )?;
        info!("Enrolled team {} in contest {}", team, contest);
        Ok(EnrollmentRecord {
            contest_id: contest.clone(),
            team_id: Some(team.clone()),
            status: EnrollmentStatus::Active,
            enrolled_at: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Team rules
// ---------------------------------------------------------------------------

fn check_team(
    conn: &Connection,
    name: &str,
    player_ids: &[PlayerId],
    captain: Option<&PlayerId>,
    vice_captain: Option<&PlayerId>,
) -> Result<(), StoreError> {
    let name_len = name.trim().chars().count();
    if name_len == 0 || name_len > MAX_TEAM_NAME_LEN {
        return Err(rule("Team name must be between 1 and 100 characters"));
    }
    if player_ids.is_empty() {
        return Err(rule("At least 1 player is required"));
    }
    if player_ids.len() > MAX_TEAM_PLAYERS {
        return Err(rule("Maximum 16 players allowed"));
    }
    if !captain.is_some_and(|c| player_ids.contains(c)) {
        return Err(rule("Captain must be one of the selected players"));
    }
    if !vice_captain.is_some_and(|v| player_ids.contains(v)) {
        return Err(rule("Vice-captain must be one of the selected players"));
    }
    if captain == vice_captain {
        return Err(rule("Captain and vice-captain must be different players"));
    }

    let mut stmt = conn.prepare("SELECT 1 FROM players WHERE id = ?1")?;
    for id in player_ids {
        if !stmt.exists(params![id.as_str()])? {
            return Err(rule("Some player IDs are invalid"));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct TeamRow {
    id: String,
    team_name: String,
    player_ids: String,
    captain_id: Option<String>,
    vice_captain_id: Option<String>,
    contest_id: Option<String>,
}

impl TeamRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(TeamRow {
            id: row.get(0)?,
            team_name: row.get(1)?,
            player_ids: row.get(2)?,
            captain_id: row.get(3)?,
            vice_captain_id: row.get(4)?,
            contest_id: row.get(5)?,
        })
    }

    fn into_team(self) -> Result<Team, StoreError> {
        Ok(Team {
            id: TeamId::new(self.id),
            team_name: self.team_name,
            player_ids: serde_json::from_str(&self.player_ids)?,
            captain_id: self.captain_id.map(PlayerId::new),
            vice_captain_id: self.vice_captain_id.map(PlayerId::new),
            contest_id: self.contest_id.map(ContestId::new),
        })
    }
}

struct EnrollmentRow {
    contest_id: String,
    team_id: String,
    status: String,
    enrolled_at: String,
}

impl EnrollmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EnrollmentRow {
            contest_id: row.get(0)?,
            team_id: row.get(1)?,
            status: row.get(2)?,
            enrolled_at: row.get(3)?,
        })
    }

    fn into_record(self) -> Result<EnrollmentRecord, StoreError> {
        let enrolled_at = DateTime::parse_from_rfc3339(&self.enrolled_at)
            .map_err(|e| StoreError::Corrupt(format!("enrolled_at '{}': {e}", self.enrolled_at)))?
            .with_timezone(&Utc);
        let status = match self.status.as_str() {
            "active" => EnrollmentStatus::Active,
            "removed" => EnrollmentStatus::Removed,
            _ => EnrollmentStatus::Other,
        };
        Ok(EnrollmentRecord {
            contest_id: ContestId::new(self.contest_id),
            team_id: Some(TeamId::new(self.team_id)),
            status,
            enrolled_at,
        })
    }
}

// ---------------------------------------------------------------------------
// FantasyApi
// ---------------------------------------------------------------------------

#[async_trait]
impl FantasyApi for LocalStore {
    async fn slots(&self) -> Result<Vec<Slot>, ApiError> {
        Ok(self.list_slots()?)
    }

    async fn players(&self, contest: Option<&ContestId>) -> Result<Vec<Player>, ApiError> {
        Ok(self.list_players(contest)?)
    }

    async fn contest_points(&self, contest: &ContestId) -> Result<Vec<PointsOverride>, ApiError> {
        Ok(self.list_contest_points(contest)?)
    }

    async fn my_enrollments(&self) -> Result<Vec<EnrollmentRecord>, ApiError> {
        Ok(self.list_enrollments()?)
    }

    async fn get_team(&self, id: &TeamId) -> Result<Team, ApiError> {
        Ok(LocalStore::get_team(self, id)?)
    }

    async fn my_teams(&self) -> Result<Vec<Team>, ApiError> {
        Ok(self.list_teams()?)
    }

    async fn create_team(&self, draft: &TeamDraft) -> Result<Team, ApiError> {
        Ok(LocalStore::create_team(self, draft)?)
    }

    async fn update_team(&self, id: &TeamId, patch: &TeamPatch) -> Result<Team, ApiError> {
        Ok(LocalStore::update_team(self, id, patch)?)
    }

    async fn enroll(&self, contest: &ContestId, team: &TeamId) -> Result<EnrollmentRecord, ApiError> {
        Ok(LocalStore::enroll(self, contest, team)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> LocalStore {
        let store = LocalStore::open(":memory:").expect("in-memory store should open");
        store
            .upsert_slots(&[
                Slot::new("bat", "Batsman", 2, 4),
                Slot::new("bowl", "Bowler", 2, 4),
            ])
            .unwrap();
        let players: Vec<Player> = ["bat1", "bat2", "bowl1", "bowl2"]
            .iter()
            .map(|id| Player {
                id: PlayerId::from(*id),
                name: id.to_uppercase(),
                team: if id.ends_with('1') { "DV SPARTANS" } else { "Royal Strikers" }.to_string(),
                slot_id: SlotId::from(if id.starts_with("bat") { "bat" } else { "bowl" }),
                price: 100.0,
                points: 1.0,
            })
            .collect();
        store.upsert_players(&players).unwrap();
        store.upsert_contest(&ContestSeed::open("c1", "Weekend Cup")).unwrap();
        store
    }

    fn draft(captain: &str, vice: &str) -> TeamDraft {
        TeamDraft {
            team_name: "Spartans XI".to_string(),
            player_ids: ["bat1", "bat2", "bowl1", "bowl2"].iter().map(|s| PlayerId::from(*s)).collect(),
            captain_id: Some(PlayerId::from(captain)),
            vice_captain_id: Some(PlayerId::from(vice)),
            contest_id: Some(ContestId::from("c1")),
        }
    }

    #[test]
    fn open_creates_tables() {
        let store = LocalStore::open(":memory:").unwrap();
        let conn = store.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('slots', 'players', 'contests', 'contest_points', 'teams', 'enrollments')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn slots_keep_insertion_order() {
        let store = test_store();
        let ids: Vec<String> = store
            .list_slots()
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["bat", "bowl"]);
    }

    #[test]
    fn players_with_unknown_slot_skipped() {
        let store = test_store();
        let stored = store
            .upsert_players(&[Player {
                id: PlayerId::from("wk1"),
                name: "Keeper".into(),
                team: String::new(),
                slot_id: SlotId::from("wk"),
                price: 0.0,
                points: 0.0,
            }])
            .unwrap();
        assert_eq!(stored, 0);
        assert_eq!(store.list_players(None).unwrap().len(), 4);
    }

    #[test]
    fn allowed_teams_filter_players() {
        let store = test_store();
        let mut restricted = ContestSeed::open("c2", "Spartans Only");
        restricted.allowed_teams = vec![" dv spartans ".to_string()];
        store.upsert_contest(&restricted).unwrap();

        let players = store.list_players(Some(&ContestId::from("c2"))).unwrap();
        assert_eq!(players.len(), 2);
        assert!(players.iter().all(|p| p.team == "DV SPARTANS"));
        assert_eq!(store.list_players(Some(&ContestId::from("c1"))).unwrap().len(), 4);
    }

    #[test]
    fn create_and_reload_team() {
        let store = test_store();
        let team = store.create_team(&draft("bat1", "bowl1")).unwrap();
        assert_eq!(team.id, TeamId::from("team-1"));
        assert_eq!(store.get_team(&team.id).unwrap(), team);
        assert_eq!(store.list_teams().unwrap().len(), 1);
    }

    #[test]
    fn team_rules_enforced() {
        let store = test_store();
        let err = store.create_team(&draft("bat1", "bat1")).unwrap_err();
        assert_eq!(err.to_string(), "Captain and vice-captain must be different players");

        let mut outsider = draft("bat1", "bowl1");
        outsider.captain_id = Some(PlayerId::from("ghost"));
        assert_eq!(
            store.create_team(&outsider).unwrap_err().to_string(),
            "Captain must be one of the selected players"
        );

        let mut unknown = draft("bat1", "bowl1");
        unknown.player_ids.push(PlayerId::from("ghost"));
        assert_eq!(
            store.create_team(&unknown).unwrap_err().to_string(),
            "Some player IDs are invalid"
        );

        let mut blank = draft("bat1", "bowl1");
        blank.team_name = "   ".into();
        assert!(matches!(store.create_team(&blank), Err(StoreError::Rule(_))));
    }

    #[test]
    fn update_rechecks_merged_team() {
        let store = test_store();
        let team = store.create_team(&draft("bat1", "bowl1")).unwrap();

        let drop_captain = TeamPatch {
            player_ids: Some(vec![PlayerId::from("bat2"), PlayerId::from("bowl1")]),
            ..TeamPatch::default()
        };
        assert!(store.update_team(&team.id, &drop_captain).is_err());

        let rename = TeamPatch {
            team_name: Some("Renamed".into()),
            ..TeamPatch::default()
        };
        let updated = store.update_team(&team.id, &rename).unwrap();
        assert_eq!(updated.team_name, "Renamed");
        assert_eq!(updated.captain_id, Some(PlayerId::from("bat1")));
    }

    #[test]
    fn enroll_is_idempotent() {
        let store = test_store();
        let team = store.create_team(&draft("bat1", "bowl1")).unwrap();
        let c1 = ContestId::from("c1");
        let first = store.enroll(&c1, &team.id).unwrap();
        let second = store.enroll(&c1, &team.id).unwrap();
        assert_eq!(first.enrolled_at.timestamp(), second.enrolled_at.timestamp());
        assert_eq!(store.list_enrollments().unwrap().len(), 1);
    }

    #[test]
    fn enroll_rejects_closed_and_unknown_contests() {
        let store = test_store();
        let team = store.create_team(&draft("bat1", "bowl1")).unwrap();

        let mut done = ContestSeed::open("c9", "Last Season");
        done.status = "completed".into();
        store.upsert_contest(&done).unwrap();
        let err = store.enroll(&ContestId::from("c9"), &team.id).unwrap_err();
        assert_eq!(err.to_string(), "Contest is not open for enrollment");

        let err = store.enroll(&ContestId::from("nope"), &team.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Contest")));
        assert!(ApiError::from(err).is_not_found());
    }
}
