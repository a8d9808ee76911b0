//! Likes on posts and comments.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// What a like points at. `sid` is a pid for posts and a cid for comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeTarget::Post => "POST",
            LikeTarget::Comment => "COMMENT",
        }
    }

    /// Table and key column holding the target's like counter
    fn counter_table(&self) -> (&'static str, &'static str) {
        match self {
            LikeTarget::Post => ("posts", "pid"),
            LikeTarget::Comment => ("comments", "cid"),
        }
    }
}

impl std::fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LikeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "POST" => Ok(LikeTarget::Post),
            "COMMENT" => Ok(LikeTarget::Comment),
            _ => Err(format!("Unknown like type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Like {
    pub lid: i64,
    pub uid: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub sid: i64,
    pub created_at: String,
}

impl Like {
    pub async fn find(
        db: &SqlitePool,
        uid: i64,
        target: LikeTarget,
        sid: i64,
    ) -> Result<Option<Like>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM likes WHERE uid = ? AND type = ? AND sid = ?")
            .bind(uid)
            .bind(target.as_str())
            .bind(sid)
            .fetch_optional(db)
            .await
    }

    /// Flip `uid`'s like on a target and keep the target's counter in step.
    ///
    /// Returns whether the like is now present and the target's new count.
    pub async fn toggle(
        db: &SqlitePool,
        uid: i64,
        target: LikeTarget,
        sid: i64,
    ) -> Result<(bool, i64), sqlx::Error> {
        let (table, key) = target.counter_table();

        let liked = match Self::find(db, uid, target, sid).await? {
            Some(existing) => {
                sqlx::query("DELETE FROM likes WHERE lid = ?")
                    .bind(existing.lid)
                    .execute(db)
                    .await?;
                sqlx::query(&format!(
                    r#"UPDATE {table} SET "like" = MAX("like" - 1, 0) WHERE {key} = ?"#
                ))
                .bind(sid)
                .execute(db)
                .await?;
                false
            }
            None => {
                sqlx::query("INSERT INTO likes (uid, type, sid, created_at) VALUES (?, ?, ?, ?)")
                    .bind(uid)
                    .bind(target.as_str())
                    .bind(sid)
                    .bind(chrono::Utc::now().to_rfc3339())
                    .execute(db)
                    .await?;
                sqlx::query(&format!(
                    r#"UPDATE {table} SET "like" = "like" + 1 WHERE {key} = ?"#
                ))
                .bind(sid)
                .execute(db)
                .await?;
                true
            }
        };

        let count: i64 = sqlx::query_scalar(&format!(
            r#"SELECT "like" FROM {table} WHERE {key} = ?"#
        ))
        .bind(sid)
        .fetch_one(db)
        .await?;

        Ok((liked, count))
    }

    pub async fn delete_for_target(
        db: &SqlitePool,
        target: LikeTarget,
        sid: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM likes WHERE type = ? AND sid = ?")
            .bind(target.as_str())
            .bind(sid)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete likes on every comment of a post
    pub async fn delete_for_post_comments(db: &SqlitePool, pid: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM likes WHERE type = 'COMMENT' AND sid IN (SELECT cid FROM comments WHERE pid = ?)",
        )
        .bind(pid)
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete every like cast by a user, taking each one off its target's counter
    pub async fn delete_by_user(db: &SqlitePool, uid: i64) -> Result<u64, sqlx::Error> {
        for target in [LikeTarget::Post, LikeTarget::Comment] {
            let (table, key) = target.counter_table();
            sqlx::query(&format!(
                r#"UPDATE {table} SET "like" = MAX("like" - 1, 0)
                   WHERE {key} IN (SELECT sid FROM likes WHERE uid = ? AND type = ?)"#
            ))
            .bind(uid)
            .bind(target.as_str())
            .execute(db)
            .await?;
        }

        let result = sqlx::query("DELETE FROM likes WHERE uid = ?")
            .bind(uid)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub token: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_target_parse() {
        assert_eq!("POST".parse::<LikeTarget>().unwrap(), LikeTarget::Post);
        assert_eq!("COMMENT".parse::<LikeTarget>().unwrap(), LikeTarget::Comment);
        assert!("post".parse::<LikeTarget>().is_err());
        assert!("USER".parse::<LikeTarget>().is_err());
    }

    #[test]
    fn test_like_target_display() {
        assert_eq!(LikeTarget::Post.to_string(), "POST");
        assert_eq!(LikeTarget::Comment.to_string(), "COMMENT");
    }
}
