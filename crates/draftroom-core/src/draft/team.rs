// Teams and players taking part in an event draft.

use serde::{Deserialize, Serialize};

/// A player who RSVP'd to the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Preferred position, free-form (e.g. "GK", "Handler").
    #[serde(default)]
    pub position: Option<String>,
    /// Self-reported or organizer-assigned skill rating.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Player {
            id: id.into(),
            name: name.into(),
            position: None,
            rating: None,
            avatar_url: None,
        }
    }
}

/// One side of the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team identifier (e.g., "blue").
    pub id: String,
    /// Display name of the team.
    pub name: String,
    /// Jersey or badge color, if the organizer set one.
    pub color: Option<String>,
    /// Player ID of the captain. Captains are assigned before the draft and
    /// never enter the available pool.
    pub captain_id: String,
    /// Drafted player IDs in pick order. Does not include the captain.
    pub roster: Vec<String>,
}

impl Team {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        color: Option<String>,
        captain_id: impl Into<String>,
    ) -> Self {
        Team {
            id: id.into(),
            name: name.into(),
            color,
            captain_id: captain_id.into(),
            roster: Vec::new(),
        }
    }

    /// Captain first, then drafted players in pick order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.captain_id.as_str()).chain(self.roster.iter().map(String::as_str))
    }
}
