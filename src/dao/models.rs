use std::{
    collections::BTreeSet,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker carried by `host_user_id` for games started before sign-in.
pub const GUEST_MARKER: &str = "guest";

/// Player taking part in a game, with one stroke count per played hole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier for the player within the game.
    pub id: String,
    /// Display name shown on the scorecard.
    pub name: String,
    /// Strokes per hole, in hole order. Shorter than the hole count while the game runs.
    pub strokes: Vec<u8>,
}

impl PlayerEntity {
    /// Sum of strokes recorded so far.
    pub fn total_strokes(&self) -> u32 {
        self.strokes.iter().map(|s| u32::from(*s)).sum()
    }
}

/// Aggregate game record persisted by both stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: String,
    /// Owner of the game; contains [`GUEST_MARKER`] for guest games.
    pub host_user_id: String,
    /// Course identifier derived from the course name and location, when known.
    pub course_id: Option<String>,
    /// Human readable location name.
    pub location_name: Option<String>,
    /// Number of holes on the scorecard.
    pub number_of_holes: u8,
    /// Participants in display order.
    pub players: Vec<PlayerEntity>,
    /// Start of the round.
    pub started_at: SystemTime,
    /// Whether the round has been finished.
    pub completed: bool,
}

impl GameEntity {
    /// Start a fresh game with a random id, truncating the start time to whole milliseconds
    /// so it survives the remote projection unchanged.
    pub fn new(host_user_id: impl Into<String>, number_of_holes: u8) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            host_user_id: host_user_id.into(),
            course_id: None,
            location_name: None,
            number_of_holes,
            players: Vec::new(),
            started_at: now_millis(),
            completed: false,
        }
    }

    /// Whether the host marks this game as a guest game.
    pub fn is_guest_game(&self) -> bool {
        self.host_user_id.contains(GUEST_MARKER)
    }
}

/// Signed-in user, referenced only for the orphaned guest game check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Games this user owns or joined.
    pub game_ids: BTreeSet<String>,
}

impl UserEntity {
    /// Create a user with no referenced games.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            game_ids: BTreeSet::new(),
        }
    }

    /// Whether the user references `game_id`.
    pub fn references(&self, game_id: &str) -> bool {
        self.game_ids.contains(game_id)
    }
}

fn now_millis() -> SystemTime {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();
    UNIX_EPOCH + Duration::from_millis(millis)
}
