// CSV loading for the player pool and contest points.
//
// Expected player columns: id, name, team, slot, price, points.
// Expected contest-points columns: player_id, points.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crease_core::ids::{PlayerId, SlotId};
use crease_core::player::{Player, PointsOverride};

use crate::store::StoreError;

#[derive(Debug, Deserialize)]
struct RawPlayerRow {
    id: String,
    name: String,
    #[serde(default)]
    team: String,
    slot: String,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    points: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawPointsRow {
    player_id: String,
    points: f64,
}

fn open_csv(path: &Path) -> Result<File, StoreError> {
    File::open(path).map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Load players from a CSV file.
pub fn load_players(path: &Path) -> Result<Vec<Player>, StoreError> {
    let file = open_csv(path)?;
    let players = players_from_reader(file).map_err(|e| StoreError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    info!("Loaded {} players from {}", players.len(), path.display());
    Ok(players)
}

/// Load players from any reader. Rows that fail to parse, or that carry a
/// blank id or slot, are skipped with a warning.
pub fn players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut players = Vec::new();

    for (line, result) in reader.deserialize::<RawPlayerRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping malformed player row {}: {}", line + 2, e);
                continue;
            }
        };
        if row.id.is_empty() || row.slot.is_empty() {
            warn!("Skipping player row {}: missing id or slot", line + 2);
            continue;
        }
        let price = row.price.unwrap_or(0.0);
        let points = row.points.unwrap_or(0.0);
        if !price.is_finite() || !points.is_finite() {
            warn!("Skipping player '{}': non-numeric price or points", row.name);
            continue;
        }
        players.push(Player {
            id: PlayerId::new(row.id),
            name: row.name,
            team: row.team,
            slot_id: SlotId::new(row.slot),
            price,
            points,
        });
    }

    Ok(players)
}

/// Load per-contest points overrides from a CSV file.
pub fn load_contest_points(path: &Path) -> Result<Vec<PointsOverride>, StoreError> {
    let file = open_csv(path)?;
    points_from_reader(file).map_err(|e| StoreError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn points_from_reader<R: Read>(rdr: R) -> Result<Vec<PointsOverride>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawPointsRow>() {
        match result {
            Ok(r) if r.points.is_finite() => rows.push(PointsOverride {
                player_id: PlayerId::new(r.player_id),
                points: r.points,
            }),
            Ok(r) => warn!("Skipping points for '{}': not finite", r.player_id),
            Err(e) => warn!("Skipping malformed points row: {}", e),
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_players_and_defaults_missing_numbers() {
        let csv = "\
id,name,team,slot,price,points
p1,Arjun Rao,DV SPARTANS,1,9.5,120
p2, Sam Patel ,Royal Strikers,2,,
";
        let players = players_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].slot_id, SlotId::from("1"));
        assert_eq!(players[0].points, 120.0);
        assert_eq!(players[1].name, "Sam Patel");
        assert_eq!(players[1].price, 0.0);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let csv = "\
id,name,team,slot,price,points
p1,Arjun Rao,DV SPARTANS,1,cheap,120
,Nobody,,1,1,1
p3,Kiran Das,DV SPARTANS,3,7,NaN
p4,Dev Shah,DV SPARTANS,3,7,40
";
        let players = players_from_reader(csv.as_bytes()).unwrap();
        let ids: Vec<&str> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p4"]);
    }

    #[test]
    fn parses_contest_points() {
        let csv = "player_id,points\np1,55.5\np2,oops\n";
        let rows = points_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].points, 55.5);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_players(Path::new("/nonexistent/players.csv")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
