// Player pool loading.
//
// Reads the event's RSVP list from a CSV with columns
// `id,name,position,rating,avatar_url`. Only `id` and `name` are required.

use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::draft::team::Player;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlayerPoolError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV row (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: String,
    name: String,
    #[serde(default)]
    position: Option<String>,
    /// Unparseable ratings are treated as missing.
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rating: Option<f64>,
    #[serde(default)]
    avatar_url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse players from any CSV reader. Rows that fail to parse or have a blank
/// ID are skipped with a warning. A repeated ID is an error, since captains
/// and picks are keyed by ID.
pub fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, PlayerPoolError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let headers = reader.headers().map_err(|e| PlayerPoolError::Csv {
        path: "<input>".to_string(),
        source: e,
    })?;
    for required in ["id", "name"] {
        if !headers.iter().any(|h| h == required) {
            return Err(PlayerPoolError::Validation(format!(
                "missing required column '{required}'"
            )));
        }
    }

    let mut players = Vec::new();
    let mut seen = HashSet::new();

    for (row, result) in reader.deserialize::<RawPlayer>().enumerate() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping player row {}: {}", row + 1, e);
                continue;
            }
        };

        let id = raw.id.trim().to_string();
        if id.is_empty() {
            warn!("skipping player row {}: blank id", row + 1);
            continue;
        }
        if !seen.insert(id.clone()) {
            return Err(PlayerPoolError::Validation(format!(
                "duplicate player id '{id}' on row {}",
                row + 1
            )));
        }

        let rating = raw.rating.filter(|r| {
            let ok = r.is_finite();
            if !ok {
                warn!("ignoring non-finite rating for player '{}'", id);
            }
            ok
        });

        players.push(Player {
            id,
            name: raw.name.trim().to_string(),
            position: non_blank(raw.position),
            rating,
            avatar_url: non_blank(raw.avatar_url),
        });
    }

    Ok(players)
}

/// Load the player pool from a CSV file.
pub fn load_players(path: &Path) -> Result<Vec<Player>, PlayerPoolError> {
    let file = std::fs::File::open(path).map_err(|e| PlayerPoolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let players = load_players_from_reader(file).map_err(|e| match e {
        PlayerPoolError::Csv { source, .. } => PlayerPoolError::Csv {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;
    info!("Loaded {} players from {}", players.len(), path.display());
    Ok(players)
}
