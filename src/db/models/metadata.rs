//! Per-post metadata such as tags.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

pub const METADATA_TAG: &str = "tag";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Metadata {
    pub mid: i64,
    pub pid: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl Metadata {
    pub async fn create(
        db: &SqlitePool,
        pid: i64,
        kind: &str,
        text: &str,
    ) -> Result<Metadata, sqlx::Error> {
        let result = sqlx::query("INSERT INTO metadata (pid, type, text) VALUES (?, ?, ?)")
            .bind(pid)
            .bind(kind)
            .bind(text)
            .execute(db)
            .await?;

        sqlx::query_as("SELECT * FROM metadata WHERE mid = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(db)
            .await
    }

    /// Tag texts attached to a post, in insertion order
    pub async fn tags_for_post(db: &SqlitePool, pid: i64) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar("SELECT text FROM metadata WHERE pid = ? AND type = ? ORDER BY mid ASC")
            .bind(pid)
            .bind(METADATA_TAG)
            .fetch_all(db)
            .await
    }

    pub async fn delete_for_post(db: &SqlitePool, pid: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM metadata WHERE pid = ?")
            .bind(pid)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }
}
