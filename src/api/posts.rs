use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::{authorize, require_account, require_found, AuthzError, Requirement};
use crate::db::{
    AuthorRef, Comment, CommentEntry, CommentListResponse, CommentResponse, DeleteCommentRequest,
    DeletePostRequest, EditPostRequest, Like, LikeRequest, LikeResponse, LikeTarget, Metadata,
    NewComment, NewCommentRequest, NewPostRequest, PageQuery, Post, PostDetailResponse,
    PostIdQuery, PostListEntry, PostListResponse, PostResponse, User, METADATA_TAG,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{parse_page, validate_required, validate_title};

/// Posts per page on the public listing
const POSTS_PER_PAGE: i64 = 20;

/// Most tags kept per post
const MAX_TAGS: usize = 10;

/// Client address recorded with comments when nothing better is known
const UNKNOWN_IP: &str = "unknown";

/// Extract the client IP from proxy headers, falling back to the socket address
fn extract_client_ip(headers: &HeaderMap, conn_info: Option<&SocketAddr>) -> Option<String> {
    // X-Forwarded-For is a comma-separated chain; the first entry is the client
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let ip = first.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let ip = real_ip.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    conn_info.map(|addr| addr.ip().to_string())
}

/// Owner-scoped writes match nothing when the row vanished or changed hands
/// after the ownership check. Tell the two apart for the caller.
async fn lost_post_race(state: &AppState, pid: i64) -> Result<ApiError, ApiError> {
    Ok(match Post::get_by_id(&state.db, pid).await? {
        Some(_) => AuthzError::forbidden("not permitted").into(),
        None => AuthzError::not_found("post").into(),
    })
}

/// Newest-first page of published posts
pub async fn get_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let page = parse_page(query.page.as_deref());
    let count = Post::count(&state.db).await?;
    let posts = Post::list_page(&state.db, page, POSTS_PER_PAGE)
        .await?
        .into_iter()
        .map(PostListEntry::from)
        .collect();

    Ok(Json(PostListResponse { page, count, posts }))
}

/// Full post with author and tags. Each read counts as a view.
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostIdQuery>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let mut post = require_found(Post::get_by_id(&state.db, query.pid).await?, "post")?;

    Post::increment_views(&state.db, post.pid).await?;
    post.view_count += 1;

    let user = User::get_by_id(&state.db, post.author)
        .await?
        .map(|u| AuthorRef {
            uid: u.uid,
            nickname: u.nickname,
            avatar: u.avatar,
        });
    let tags = Metadata::tags_for_post(&state.db, post.pid).await?;

    Ok(Json(PostDetailResponse { post, user, tags }))
}

pub async fn new_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let verification = state.tokens.verify(&req.token);
    let claims = authorize(&verification, Requirement::Authenticated)?;

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("title", validate_title(&req.title))
        .check("text", validate_required(&req.text, "Text"));
    errors.finish()?;

    require_account(User::get_by_id(&state.db, claims.id).await?)?;

    let post = Post::create(&state.db, claims.id, req.title.trim(), &req.text).await?;

    let mut tags: Vec<&str> = Vec::new();
    for tag in req.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    for tag in &tags {
        Metadata::create(&state.db, post.pid, METADATA_TAG, tag).await?;
    }

    tracing::info!(pid = post.pid, author = claims.id, tags = tags.len(), "Created post");

    Ok((StatusCode::CREATED, Json(PostResponse { post })))
}

/// Replace title and text of the caller's own post
pub async fn edit_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditPostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let verification = state.tokens.verify(&req.token);
    authorize(&verification, Requirement::Authenticated)?;

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("title", validate_title(&req.title))
        .check("text", validate_required(&req.text, "Text"));
    errors.finish()?;

    let existing = require_found(Post::get_by_id(&state.db, req.pid).await?, "post")?;
    let claims = authorize(&verification, Requirement::Owner(existing.author))?;

    let post = match Post::update_owned(
        &state.db,
        existing.pid,
        claims.id,
        req.title.trim(),
        &req.text,
    )
    .await?
    {
        Some(post) => post,
        None => return Err(lost_post_race(&state, existing.pid).await?),
    };

    tracing::info!(pid = post.pid, author = claims.id, "Edited post");

    Ok(Json(PostResponse { post }))
}

/// Delete the caller's own post along with its comments and likes
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeletePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let verification = state.tokens.verify(&req.token);
    authorize(&verification, Requirement::Authenticated)?;

    let post = require_found(Post::get_by_id(&state.db, req.pid).await?, "post")?;
    let claims = authorize(&verification, Requirement::Owner(post.author))?;

    if !Post::delete_owned(&state.db, post.pid, claims.id).await? {
        return Err(lost_post_race(&state, post.pid).await?);
    }

    tracing::info!(pid = post.pid, author = claims.id, "Deleted post");

    Ok(Json(PostResponse { post }))
}

/// Visible comments of a post
pub async fn get_comment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PostIdQuery>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = Comment::list_for_post(&state.db, query.pid)
        .await?
        .into_iter()
        .map(CommentEntry::from)
        .collect();

    Ok(Json(CommentListResponse { comments }))
}

pub async fn new_comment(
    State(state): State<Arc<AppState>>,
    conn_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<NewCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let verification = state.tokens.verify(&req.token);
    let claims = authorize(&verification, Requirement::Authenticated)?;

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("text", validate_required(&req.text, "Text"))
        .check("agent", validate_required(&req.agent, "Agent"));
    errors.finish()?;

    require_account(User::get_by_id(&state.db, claims.id).await?)?;

    let post = require_found(Post::get_by_id(&state.db, req.pid).await?, "post")?;
    if !post.comments_allowed() {
        return Err(ApiError::forbidden("Comments are closed for this post"));
    }

    if let Some(reply_to) = req.reply_to {
        let parent = require_found(Comment::get_by_id(&state.db, reply_to).await?, "comment")?;
        if parent.pid != post.pid {
            return Err(ApiError::validation_field(
                "replyTo",
                "Replied comment belongs to another post",
            ));
        }
    }

    let ip = extract_client_ip(&headers, conn_info.as_ref().map(|ConnectInfo(addr)| addr))
        .unwrap_or_else(|| UNKNOWN_IP.to_string());

    let comment = Comment::create(
        &state.db,
        &NewComment {
            pid: post.pid,
            sender: claims.id,
            text: &req.text,
            reply_to: req.reply_to,
            ip: &ip,
            agent: &req.agent,
        },
    )
    .await?;

    tracing::info!(cid = comment.cid, pid = post.pid, sender = claims.id, "Created comment");

    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// Delete one of the caller's own comments
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let verification = state.tokens.verify(&req.token);
    authorize(&verification, Requirement::Authenticated)?;

    let comment = require_found(Comment::get_by_id(&state.db, req.cid).await?, "comment")?;
    let claims = authorize(&verification, Requirement::Owner(comment.sender))?;

    if !Comment::delete_owned(&state.db, comment.cid, claims.id).await? {
        let err = match Comment::get_by_id(&state.db, comment.cid).await? {
            Some(_) => AuthzError::forbidden("not permitted"),
            None => AuthzError::not_found("comment"),
        };
        return Err(err.into());
    }

    tracing::info!(cid = comment.cid, sender = claims.id, "Deleted comment");

    Ok(Json(CommentResponse { comment }))
}

/// Toggle the caller's like on a post or comment
pub async fn like(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LikeRequest>,
) -> Result<Json<LikeResponse>, ApiError> {
    let verification = state.tokens.verify(&req.token);
    let claims = authorize(&verification, Requirement::Authenticated)?;

    let target: LikeTarget = req
        .kind
        .parse()
        .map_err(|e: String| ApiError::validation_field("type", e))?;

    require_account(User::get_by_id(&state.db, claims.id).await?)?;

    match target {
        LikeTarget::Post => {
            require_found(Post::get_by_id(&state.db, req.sid).await?, "post")?;
        }
        LikeTarget::Comment => {
            require_found(Comment::get_by_id(&state.db, req.sid).await?, "comment")?;
        }
    }

    let (liked, count) = Like::toggle(&state.db, claims.id, target, req.sid).await?;

    tracing::debug!(uid = claims.id, target = %target, sid = req.sid, liked, "Toggled like");

    Ok(Json(LikeResponse { liked, count }))
}
