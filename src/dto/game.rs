use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dao::models::{GameEntity, PlayerEntity};

/// Largest scorecard accepted on the wire.
const MAX_HOLES: u8 = 36;
/// Longest player name accepted on the wire.
const MAX_PLAYER_NAME: usize = 32;

/// Transport projection of a game, stored as one document keyed by `id`.
///
/// Optional fields are omitted when absent so that a merge write leaves the stored
/// value untouched.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDto {
    /// Document key, equal to the game id.
    pub id: String,
    /// Owner of the game.
    pub host_user_id: String,
    /// Derived course identifier, omitted when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    /// Location name, omitted when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    /// Holes on the scorecard, 1 to 36.
    pub number_of_holes: u8,
    /// Participants in display order.
    #[serde(default)]
    pub players: Vec<PlayerDto>,
    /// Start of the round as epoch milliseconds; finer precision is rejected.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub started_at: SystemTime,
    /// Whether the round has been finished.
    #[serde(default)]
    pub completed: bool,
}

/// Transport projection of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDto {
    /// Player id within the game.
    pub id: String,
    /// Display name, 1 to 32 characters.
    pub name: String,
    /// Strokes per played hole.
    #[serde(default)]
    pub strokes: Vec<u8>,
}

impl Validate for GameDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.id.is_empty() {
            errors.add("id", ValidationError::new("empty"));
        }
        if self.host_user_id.is_empty() {
            errors.add("hostUserId", ValidationError::new("empty"));
        }
        if self.number_of_holes == 0 || self.number_of_holes > MAX_HOLES {
            let mut err = ValidationError::new("hole_count");
            err.message = Some(
                format!(
                    "number of holes must be between 1 and {MAX_HOLES} (got {})",
                    self.number_of_holes
                )
                .into(),
            );
            errors.add("numberOfHoles", err);
        }

        if !is_whole_millis(self.started_at) {
            let mut err = ValidationError::new("sub_millisecond");
            err.message = Some("start time must be a whole number of milliseconds".into());
            errors.add("startedAt", err);
        }

        for player in &self.players {
            if player.id.is_empty() {
                errors.add("players", ValidationError::new("player_id_empty"));
            }
            let name_len = player.name.chars().count();
            if name_len == 0 || name_len > MAX_PLAYER_NAME {
                let mut err = ValidationError::new("player_name_length");
                err.message = Some(
                    format!(
                        "player name must be 1 to {MAX_PLAYER_NAME} characters (got {name_len})"
                    )
                    .into(),
                );
                errors.add("players", err);
            }
            if player.strokes.len() > usize::from(self.number_of_holes) {
                let mut err = ValidationError::new("strokes_exceed_holes");
                err.message = Some(
                    format!(
                        "player `{}` has {} stroke entries for {} holes",
                        player.id,
                        player.strokes.len(),
                        self.number_of_holes
                    )
                    .into(),
                );
                errors.add("strokes", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Whether `time` survives the epoch-milliseconds encoding unchanged.
fn is_whole_millis(time: SystemTime) -> bool {
    let offset = time
        .duration_since(UNIX_EPOCH)
        .or_else(|_| UNIX_EPOCH.duration_since(time));
    offset.is_ok_and(|offset| offset.subsec_nanos() % 1_000_000 == 0)
}

impl GameDto {
    /// Project a game for transport, rejecting games that would not decode back.
    pub fn from_entity(game: &GameEntity) -> Result<Self, ValidationErrors> {
        let dto = Self {
            id: game.id.clone(),
            host_user_id: game.host_user_id.clone(),
            course_id: game.course_id.clone(),
            location_name: game.location_name.clone(),
            number_of_holes: game.number_of_holes,
            players: game.players.iter().cloned().map(Into::into).collect(),
            started_at: game.started_at,
            completed: game.completed,
        };
        dto.validate()?;
        Ok(dto)
    }

    /// Validate a stored document and turn it back into a game.
    pub fn into_entity(self) -> Result<GameEntity, ValidationErrors> {
        self.validate()?;
        Ok(GameEntity {
            id: self.id,
            host_user_id: self.host_user_id,
            course_id: self.course_id,
            location_name: self.location_name,
            number_of_holes: self.number_of_holes,
            players: self.players.into_iter().map(Into::into).collect(),
            started_at: self.started_at,
            completed: self.completed,
        })
    }
}

impl From<PlayerEntity> for PlayerDto {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            strokes: value.strokes,
        }
    }
}

impl From<PlayerDto> for PlayerEntity {
    fn from(value: PlayerDto) -> Self {
        Self {
            id: value.id,
            name: value.name,
            strokes: value.strokes,
        }
    }
}
