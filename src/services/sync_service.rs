//! Caller-driven transfers between the on-device store and the remote collection.
//! Nothing here runs on its own; each call composes a few store operations.

use tracing::{info, warn};

use crate::{
    dao::{
        game_store::{local::LocalGameStore, remote::RemoteGameStore},
        models::{GUEST_MARKER, GameEntity},
    },
    dto::game::GameDto,
    error::ServiceError,
};

/// Outcome of a push or pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Ids the caller asked for.
    pub requested: usize,
    /// Games found in the source store and written to the target.
    pub transferred: usize,
}

/// Moves games between the on-device store and the remote collection on request.
#[derive(Clone)]
pub struct SyncService {
    local: LocalGameStore,
    remote: RemoteGameStore,
}

impl SyncService {
    /// Compose the two stores.
    pub fn new(local: LocalGameStore, remote: RemoteGameStore) -> Self {
        Self { local, remote }
    }

    /// Copy the listed local games to the remote collection.
    pub async fn push(&self, ids: Vec<String>) -> Result<SyncReport, ServiceError> {
        ensure_ids(&ids)?;
        let requested = ids.len();
        let games = self.local.fetch_games(ids).await?;
        let transferred = games.len();

        self.remote.save_games(games).await?;
        info!(requested, transferred, "pushed games to remote store");
        Ok(SyncReport {
            requested,
            transferred,
        })
    }

    /// Copy the listed remote games into the local store.
    pub async fn pull(&self, ids: Vec<String>) -> Result<SyncReport, ServiceError> {
        ensure_ids(&ids)?;
        let requested = ids.len();
        let games = self.remote.fetch_games(ids).await?;
        let transferred = games.len();

        self.local.save_games(games).await?;
        info!(requested, transferred, "pulled games from remote store");
        Ok(SyncReport {
            requested,
            transferred,
        })
    }

    /// Hand the orphaned guest game over to a signed-in user.
    ///
    /// The game keeps its id; the remote copy is written first, then the local record is
    /// overwritten and the id is added to the user's games.
    pub async fn claim_guest_game(&self, user_id: &str) -> Result<GameEntity, ServiceError> {
        if user_id.trim().is_empty() || user_id.contains(GUEST_MARKER) {
            return Err(ServiceError::InvalidInput(format!(
                "`{user_id}` is not a signed-in user id"
            )));
        }

        let mut user = self
            .local
            .fetch_user(user_id.to_owned())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user `{user_id}`")))?;
        let mut game = self
            .local
            .fetch_guest_game()
            .await?
            .ok_or_else(|| ServiceError::NotFound("orphaned guest game".into()))?;

        game.host_user_id = user_id.to_owned();
        GameDto::from_entity(&game)?;

        self.remote.save_game(game.clone()).await.inspect_err(|err| {
            warn!(id = %game.id, error = %err, "failed to upload claimed guest game");
        })?;
        self.local.save_game(game.clone()).await?;

        user.game_ids.insert(game.id.clone());
        self.local.save_user(user).await?;

        info!(id = %game.id, user_id, "guest game claimed");
        Ok(game)
    }
}

fn ensure_ids(ids: &[String]) -> Result<(), ServiceError> {
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ServiceError::InvalidInput("game ids must not be empty".into()));
    }
    Ok(())
}
