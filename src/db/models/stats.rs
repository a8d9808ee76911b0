//! Dashboard figures and paginated list envelopes for the admin surface.

use serde::Serialize;
use sqlx::SqlitePool;

use super::{Comment, Post, User};

/// Newest account as shown on the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct LatestUser {
    pub uid: i64,
    pub name: String,
    pub nickname: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub user_count: i64,
    pub post_count: i64,
    pub comment_count: i64,
    pub latest_user: Option<LatestUser>,
}

impl DashboardData {
    pub async fn collect(db: &SqlitePool) -> Result<Self, sqlx::Error> {
        let user_count = User::count(db).await?;
        let post_count = Post::count(db).await?;
        let comment_count = Comment::count(db).await?;
        let latest_user = User::latest(db).await?.map(|u| LatestUser {
            uid: u.uid,
            name: u.name,
            nickname: u.nickname,
            created_at: u.created_at,
        });

        Ok(Self {
            user_count,
            post_count,
            comment_count,
            latest_user,
        })
    }
}

/// One page of an admin listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub page: i64,
    pub count: i64,
    pub items: Vec<T>,
}
