//! Blog posts.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub pid: i64,
    pub title: String,
    pub text: String,
    pub author: i64,
    pub like: i64,
    pub view_count: i64,
    pub allow_comment: i64,
    pub publish: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Author fields embedded in post and comment listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRef {
    pub uid: i64,
    pub nickname: String,
    pub avatar: Option<String>,
}

/// Public listing row: post joined with its author and comment count
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostListItem {
    pub pid: i64,
    pub title: String,
    pub text: String,
    pub like: i64,
    pub view_count: i64,
    pub allow_comment: i64,
    pub created_at: String,
    pub author: i64,
    pub author_nickname: String,
    pub author_avatar: Option<String>,
    pub comment_count: i64,
}

/// Admin listing row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostSummary {
    pub pid: i64,
    pub title: String,
    pub text: String,
    pub like: i64,
    pub view_count: i64,
    pub allow_comment: i64,
    pub created_at: String,
    pub updated_at: String,
    pub author: i64,
    pub author_name: String,
    pub author_nickname: String,
    pub comment_count: i64,
}

/// Listing excerpts keep this many characters when a post is longer than
/// [`EXCERPT_THRESHOLD`].
pub const EXCERPT_LENGTH: usize = 80;
pub const EXCERPT_THRESHOLD: usize = 100;

/// Shorten long post bodies for listings
pub fn excerpt(text: &str) -> String {
    if text.chars().count() > EXCERPT_THRESHOLD {
        let mut short: String = text.chars().take(EXCERPT_LENGTH).collect();
        short.push_str("...");
        short
    } else {
        text.to_string()
    }
}

impl Post {
    pub fn comments_allowed(&self) -> bool {
        self.allow_comment != 0
    }

    pub async fn create(
        db: &SqlitePool,
        author: i64,
        title: &str,
        text: &str,
    ) -> Result<Post, sqlx::Error> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO posts (title, text, author, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(text)
        .bind(author)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(db: &SqlitePool, pid: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM posts WHERE pid = ?")
            .bind(pid)
            .fetch_optional(db)
            .await
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(db)
            .await
    }

    /// Newest-first page of posts for the public listing
    pub async fn list_page(
        db: &SqlitePool,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<PostListItem>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT p.pid, p.title, p.text, p."like" AS "like", p.view_count, p.allow_comment,
                   p.created_at, p.author,
                   u.nickname AS author_nickname, u.avatar AS author_avatar,
                   (SELECT COUNT(*) FROM comments c WHERE c.pid = p.pid) AS comment_count
            FROM posts p
            INNER JOIN users u ON u.uid = p.author
            ORDER BY p.created_at DESC, p.pid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(db)
        .await
    }

    /// All posts by one author, newest first
    pub async fn list_for_author(
        db: &SqlitePool,
        author: i64,
    ) -> Result<Vec<PostListItem>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT p.pid, p.title, p.text, p."like" AS "like", p.view_count, p.allow_comment,
                   p.created_at, p.author,
                   u.nickname AS author_nickname, u.avatar AS author_avatar,
                   (SELECT COUNT(*) FROM comments c WHERE c.pid = p.pid) AS comment_count
            FROM posts p
            INNER JOIN users u ON u.uid = p.author
            WHERE p.author = ?
            ORDER BY p.created_at DESC, p.pid DESC
            "#,
        )
        .bind(author)
        .fetch_all(db)
        .await
    }

    /// Ascending-pid page of posts for moderation
    pub async fn list_page_admin(
        db: &SqlitePool,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<PostSummary>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT p.pid, p.title, p.text, p."like" AS "like", p.view_count, p.allow_comment,
                   p.created_at, p.updated_at, p.author,
                   u.name AS author_name, u.nickname AS author_nickname,
                   (SELECT COUNT(*) FROM comments c WHERE c.pid = p.pid) AS comment_count
            FROM posts p
            INNER JOIN users u ON u.uid = p.author
            ORDER BY p.pid ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(db)
        .await
    }

    /// Update title and text of a post owned by `author`.
    ///
    /// Returns `None` when no row matched, i.e. the post vanished or changed
    /// hands between the ownership check and the write.
    pub async fn update_owned(
        db: &SqlitePool,
        pid: i64,
        author: i64,
        title: &str,
        text: &str,
    ) -> Result<Option<Post>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET title = ?, text = ?, updated_at = ? WHERE pid = ? AND author = ?",
        )
        .bind(title)
        .bind(text)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(pid)
        .bind(author)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Self::get_by_id(db, pid).await
    }

    pub async fn increment_views(db: &SqlitePool, pid: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE pid = ?")
            .bind(pid)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn set_allow_comment(
        db: &SqlitePool,
        pid: i64,
        allow: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE posts SET allow_comment = ?, updated_at = ? WHERE pid = ?")
            .bind(if allow { 1i64 } else { 0i64 })
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(pid)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hand every post of `from` over to `to`
    pub async fn reassign_author(db: &SqlitePool, from: i64, to: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE posts SET author = ? WHERE author = ?")
            .bind(to)
            .bind(from)
            .execute(db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete a post together with its comments, likes and metadata.
    ///
    /// These are independent statements without a transaction; a failure part
    /// way through leaves the rows deleted so far.
    pub async fn delete_cascade(db: &SqlitePool, pid: i64) -> Result<bool, sqlx::Error> {
        super::Like::delete_for_post_comments(db, pid).await?;
        super::Comment::delete_for_post(db, pid).await?;
        super::Like::delete_for_target(db, super::LikeTarget::Post, pid).await?;
        super::Metadata::delete_for_post(db, pid).await?;

        let result = sqlx::query("DELETE FROM posts WHERE pid = ?")
            .bind(pid)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cascade delete that only touches a post still owned by `author`.
    ///
    /// Returns `false` without removing anything when no such post exists.
    pub async fn delete_owned(db: &SqlitePool, pid: i64, author: i64) -> Result<bool, sqlx::Error> {
        const OWNED: &str = "SELECT pid FROM posts WHERE pid = ? AND author = ?";

        let owned: Option<i64> = sqlx::query_scalar(OWNED)
            .bind(pid)
            .bind(author)
            .fetch_optional(db)
            .await?;
        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query(&format!(
            "DELETE FROM likes WHERE type = 'COMMENT' AND sid IN \
             (SELECT cid FROM comments WHERE pid IN ({OWNED}))"
        ))
        .bind(pid)
        .bind(author)
        .execute(db)
        .await?;
        for statement in [
            format!("DELETE FROM comments WHERE pid IN ({OWNED})"),
            format!("DELETE FROM likes WHERE type = 'POST' AND sid IN ({OWNED})"),
            format!("DELETE FROM metadata WHERE pid IN ({OWNED})"),
        ] {
            sqlx::query(&statement)
                .bind(pid)
                .bind(author)
                .execute(db)
                .await?;
        }

        let result = sqlx::query("DELETE FROM posts WHERE pid = ? AND author = ?")
            .bind(pid)
            .bind(author)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl PostListItem {
    pub fn author_ref(&self) -> AuthorRef {
        AuthorRef {
            uid: self.author,
            nickname: self.author_nickname.clone(),
            avatar: self.author_avatar.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostIdQuery {
    pub pid: i64,
}

#[derive(Debug, Deserialize)]
pub struct NewPostRequest {
    pub token: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditPostRequest {
    pub token: String,
    pub pid: i64,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePostRequest {
    pub token: String,
    pub pid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub page: i64,
    pub count: i64,
    pub posts: Vec<PostListEntry>,
}

/// Listing entry with the author nested, as served to clients
#[derive(Debug, Serialize)]
pub struct PostListEntry {
    pub pid: i64,
    pub title: String,
    pub text: String,
    pub like: i64,
    pub view_count: i64,
    pub allow_comment: i64,
    pub created_at: String,
    pub comment_count: i64,
    pub user: AuthorRef,
}

impl From<PostListItem> for PostListEntry {
    fn from(item: PostListItem) -> Self {
        let user = item.author_ref();
        Self {
            pid: item.pid,
            title: item.title,
            text: excerpt(&item.text),
            like: item.like,
            view_count: item.view_count,
            allow_comment: item.allow_comment,
            created_at: item.created_at,
            comment_count: item.comment_count,
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub user: Option<AuthorRef>,
    pub tags: Vec<String>,
}
