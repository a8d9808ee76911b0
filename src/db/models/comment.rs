//! Comments on posts.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::AuthorRef;

/// Comment status values stored in `comments.status`
pub mod comment_status {
    pub const NORMAL: i64 = 0;
    pub const FLAGGED: i64 = 2;
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub cid: i64,
    pub pid: i64,
    pub sender: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub ip: String,
    pub agent: String,
    pub like: i64,
    pub dislike: i64,
    pub status: i64,
    pub created_at: String,
}

/// Public listing row
#[derive(Debug, Clone, FromRow)]
pub struct CommentListItem {
    pub cid: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub like: i64,
    pub dislike: i64,
    pub created_at: String,
    pub sender: i64,
    pub sender_nickname: String,
    pub sender_avatar: Option<String>,
}

/// Moderation listing row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentSummary {
    pub cid: i64,
    pub text: String,
    pub ip: String,
    pub agent: String,
    pub reply_to: Option<i64>,
    pub status: i64,
    pub created_at: String,
    pub sender: i64,
    pub sender_name: String,
    pub sender_nickname: String,
    pub pid: i64,
    pub post_title: String,
}

/// Fields for inserting a new comment
#[derive(Debug, Clone)]
pub struct NewComment<'a> {
    pub pid: i64,
    pub sender: i64,
    pub text: &'a str,
    pub reply_to: Option<i64>,
    pub ip: &'a str,
    pub agent: &'a str,
}

impl Comment {
    pub async fn create(db: &SqlitePool, new: &NewComment<'_>) -> Result<Comment, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO comments (pid, sender, text, reply_to, ip, agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.pid)
        .bind(new.sender)
        .bind(new.text)
        .bind(new.reply_to)
        .bind(new.ip)
        .bind(new.agent)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(db)
        .await?;

        Self::get_by_id(db, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(db: &SqlitePool, cid: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM comments WHERE cid = ?")
            .bind(cid)
            .fetch_optional(db)
            .await
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(db)
            .await
    }

    /// Visible comments of a post, newest first. Flagged comments are skipped.
    pub async fn list_for_post(
        db: &SqlitePool,
        pid: i64,
    ) -> Result<Vec<CommentListItem>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT c.cid, c.text, c.reply_to, c."like" AS "like", c.dislike, c.created_at,
                   c.sender, u.nickname AS sender_nickname, u.avatar AS sender_avatar
            FROM comments c
            INNER JOIN users u ON u.uid = c.sender
            WHERE c.pid = ? AND c.status != ?
            ORDER BY c.created_at DESC, c.cid DESC
            "#,
        )
        .bind(pid)
        .bind(comment_status::FLAGGED)
        .fetch_all(db)
        .await
    }

    pub async fn list_page_admin(
        db: &SqlitePool,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<CommentSummary>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT c.cid, c.text, c.ip, c.agent, c.reply_to, c.status, c.created_at,
                   c.sender, u.name AS sender_name, u.nickname AS sender_nickname,
                   c.pid, p.title AS post_title
            FROM comments c
            INNER JOIN users u ON u.uid = c.sender
            INNER JOIN posts p ON p.pid = c.pid
            ORDER BY c.cid ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(db)
        .await
    }

    pub async fn set_status(db: &SqlitePool, cid: i64, status: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE comments SET status = ? WHERE cid = ?")
            .bind(status)
            .bind(cid)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn reassign_sender(db: &SqlitePool, from: i64, to: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE comments SET sender = ? WHERE sender = ?")
            .bind(to)
            .bind(from)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete a comment and the likes pointing at it
    pub async fn delete(db: &SqlitePool, cid: i64) -> Result<bool, sqlx::Error> {
        super::Like::delete_for_target(db, super::LikeTarget::Comment, cid).await?;

        let result = sqlx::query("DELETE FROM comments WHERE cid = ?")
            .bind(cid)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a comment only if `sender` still owns it
    pub async fn delete_owned(db: &SqlitePool, cid: i64, sender: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE cid = ? AND sender = ?")
            .bind(cid)
            .bind(sender)
            .execute(db)
            .await?;

        if result.rows_affected() > 0 {
            super::Like::delete_for_target(db, super::LikeTarget::Comment, cid).await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn delete_for_post(db: &SqlitePool, pid: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE pid = ?")
            .bind(pid)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentRequest {
    pub token: String,
    pub pid: i64,
    pub text: String,
    pub agent: String,
    #[serde(default)]
    pub reply_to: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentRequest {
    pub token: String,
    pub cid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment: Comment,
}

/// Comment as served in a post's thread
#[derive(Debug, Serialize)]
pub struct CommentEntry {
    pub cid: i64,
    pub text: String,
    pub reply_to: Option<i64>,
    pub like: i64,
    pub dislike: i64,
    pub created_at: String,
    pub user: AuthorRef,
}

impl From<CommentListItem> for CommentEntry {
    fn from(item: CommentListItem) -> Self {
        Self {
            cid: item.cid,
            text: item.text,
            reply_to: item.reply_to,
            like: item.like,
            dislike: item.dislike,
            created_at: item.created_at,
            user: AuthorRef {
                uid: item.sender,
                nickname: item.sender_nickname,
                avatar: item.sender_avatar,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentEntry>,
}
