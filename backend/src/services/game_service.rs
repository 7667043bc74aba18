//! Read access to published games.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::game::{GameRecord, GameRow, Genre, GAME_COLUMNS};

#[derive(Clone)]
pub struct GameService {
    db: SqlitePool,
}

impl GameService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: Uuid) -> Result<GameRecord> {
        let row = sqlx::query_as::<_, GameRow>(&format!(
            "SELECT {} FROM games WHERE id = ?",
            GAME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Game {} not found", id)))?;

        GameRecord::try_from(row)
    }

    /// Newest first. Returns the page and the total count.
    pub async fn list(
        &self,
        genre: Option<Genre>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<GameRecord>, i64)> {
        let genre = genre.map(|g| g.as_str());

        let rows = sqlx::query_as::<_, GameRow>(&format!(
            "SELECT {} FROM games WHERE (? IS NULL OR genre = ?) \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
            GAME_COLUMNS
        ))
        .bind(genre)
        .bind(genre)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM games WHERE (? IS NULL OR genre = ?)")
                .bind(genre)
                .bind(genre)
                .fetch_one(&self.db)
                .await?;

        let games = rows
            .into_iter()
            .map(GameRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((games, total))
    }

    /// Whether the database answers queries.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
