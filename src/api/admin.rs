//! Moderation surface.
//!
//! Every handler here requires the `ADMIN` role. Requests carry the token in
//! the JSON body like the rest of the API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{
    authorize, protect_system_account, require_found, IdentityClaims, Requirement, ADMIN_ONLY,
};
use crate::db::{
    comment_status, status, Comment, CommentSummary, DashboardData, Like, Page, Post,
    PostSummary, User, UserSummary, ANONYMOUS_USERNAME,
};
use crate::AppState;

use super::error::ApiError;
use super::validation::MAX_PAGE;

/// Rows per page on admin listings
const ADMIN_PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminListRequest {
    pub token: String,
    #[serde(default)]
    pub page: Option<i64>,
}

impl AdminListRequest {
    fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminUserRequest {
    pub token: String,
    pub uid: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdminPostRequest {
    pub token: String,
    pub pid: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdminCommentRequest {
    pub token: String,
    pub cid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

fn require_admin(state: &AppState, token: &str) -> Result<IdentityClaims, ApiError> {
    let verification = state.tokens.verify(token);
    let claims = authorize(&verification, Requirement::Role(ADMIN_ONLY))?;
    Ok(claims.clone())
}

pub async fn get_dashboard_data(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminRequest>,
) -> Result<Json<DashboardData>, ApiError> {
    require_admin(&state, &req.token)?;
    Ok(Json(DashboardData::collect(&state.db).await?))
}

// -------------------------------------------------------------------------
// Users
// -------------------------------------------------------------------------

pub async fn get_user_list(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminListRequest>,
) -> Result<Json<Page<UserSummary>>, ApiError> {
    require_admin(&state, &req.token)?;

    let page = req.page();
    let count = User::count(&state.db).await?;
    let items = User::list_page(&state.db, page, ADMIN_PAGE_SIZE).await?;

    Ok(Json(Page { page, count, items }))
}

/// Delete an account. Its posts and comments move to the anonymous account;
/// its likes are dropped.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminUserRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let admin = require_admin(&state, &req.token)?;

    let target = require_found(User::get_by_id(&state.db, req.uid).await?, "user")?;
    protect_system_account(&target)?;

    let anonymous = User::get_by_name(&state.db, ANONYMOUS_USERNAME)
        .await?
        .ok_or_else(|| ApiError::internal("Anonymous account is missing"))?;

    let posts = Post::reassign_author(&state.db, target.uid, anonymous.uid).await?;
    let comments = Comment::reassign_sender(&state.db, target.uid, anonymous.uid).await?;
    let likes = Like::delete_by_user(&state.db, target.uid).await?;
    User::delete(&state.db, target.uid).await?;

    tracing::info!(
        admin = admin.id,
        uid = target.uid,
        posts,
        comments,
        likes,
        "Deleted user"
    );

    Ok(ActionResponse::new(format!("User {} deleted", target.name)))
}

async fn set_user_status(
    state: &AppState,
    req: &AdminUserRequest,
    new_status: i64,
) -> Result<(IdentityClaims, User), ApiError> {
    let admin = require_admin(state, &req.token)?;
    let target = require_found(User::get_by_id(&state.db, req.uid).await?, "user")?;
    User::set_status(&state.db, target.uid, new_status).await?;
    Ok((admin, target))
}

pub async fn ban_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminUserRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let (admin, target) = set_user_status(&state, &req, status::BANNED).await?;
    tracing::info!(admin = admin.id, uid = target.uid, "Banned user");
    Ok(ActionResponse::new(format!("User {} banned", target.name)))
}

pub async fn unban_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminUserRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let (admin, target) = set_user_status(&state, &req, status::ACTIVE).await?;
    tracing::info!(admin = admin.id, uid = target.uid, "Unbanned user");
    Ok(ActionResponse::new(format!("User {} unbanned", target.name)))
}

// -------------------------------------------------------------------------
// Posts
// -------------------------------------------------------------------------

pub async fn get_post_list(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminListRequest>,
) -> Result<Json<Page<PostSummary>>, ApiError> {
    require_admin(&state, &req.token)?;

    let page = req.page();
    let count = Post::count(&state.db).await?;
    let items = Post::list_page_admin(&state.db, page, ADMIN_PAGE_SIZE).await?;

    Ok(Json(Page { page, count, items }))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminPostRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let admin = require_admin(&state, &req.token)?;
    let post = require_found(Post::get_by_id(&state.db, req.pid).await?, "post")?;

    Post::delete_cascade(&state.db, post.pid).await?;

    tracing::info!(admin = admin.id, pid = post.pid, "Deleted post");
    Ok(ActionResponse::new(format!("Post {} deleted", post.pid)))
}

async fn set_post_comments(
    state: &AppState,
    req: &AdminPostRequest,
    allow: bool,
) -> Result<Json<ActionResponse>, ApiError> {
    let admin = require_admin(state, &req.token)?;
    let post = require_found(Post::get_by_id(&state.db, req.pid).await?, "post")?;

    Post::set_allow_comment(&state.db, post.pid, allow).await?;

    tracing::info!(admin = admin.id, pid = post.pid, allow, "Changed comment permission");
    let verb = if allow { "opened" } else { "closed" };
    Ok(ActionResponse::new(format!(
        "Comments {} for post {}",
        verb, post.pid
    )))
}

pub async fn prohibit_post_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminPostRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    set_post_comments(&state, &req, false).await
}

pub async fn allow_post_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminPostRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    set_post_comments(&state, &req, true).await
}

// -------------------------------------------------------------------------
// Comments
// -------------------------------------------------------------------------

pub async fn get_comment_list(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminListRequest>,
) -> Result<Json<Page<CommentSummary>>, ApiError> {
    require_admin(&state, &req.token)?;

    let page = req.page();
    let count = Comment::count(&state.db).await?;
    let items = Comment::list_page_admin(&state.db, page, ADMIN_PAGE_SIZE).await?;

    Ok(Json(Page { page, count, items }))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminCommentRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let admin = require_admin(&state, &req.token)?;
    let comment = require_found(Comment::get_by_id(&state.db, req.cid).await?, "comment")?;

    Comment::delete(&state.db, comment.cid).await?;

    tracing::info!(admin = admin.id, cid = comment.cid, "Deleted comment");
    Ok(ActionResponse::new(format!("Comment {} deleted", comment.cid)))
}

async fn set_comment_status(
    state: &AppState,
    req: &AdminCommentRequest,
    new_status: i64,
) -> Result<Json<ActionResponse>, ApiError> {
    let admin = require_admin(state, &req.token)?;
    let comment = require_found(Comment::get_by_id(&state.db, req.cid).await?, "comment")?;

    Comment::set_status(&state.db, comment.cid, new_status).await?;

    tracing::info!(
        admin = admin.id,
        cid = comment.cid,
        status = new_status,
        "Changed comment status"
    );
    Ok(ActionResponse::new(format!(
        "Comment {} status set to {}",
        comment.cid, new_status
    )))
}

pub async fn ban_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminCommentRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    set_comment_status(&state, &req, comment_status::FLAGGED).await
}

pub async fn approve_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminCommentRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    set_comment_status(&state, &req, comment_status::NORMAL).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_page_defaults_and_clamps() {
        let req = |page| AdminListRequest {
            token: String::new(),
            page,
        };
        assert_eq!(req(None).page(), 1);
        assert_eq!(req(Some(0)).page(), 1);
        assert_eq!(req(Some(-5)).page(), 1);
        assert_eq!(req(Some(3)).page(), 3);
        assert_eq!(req(Some(i64::MAX)).page(), MAX_PAGE);
    }
}
