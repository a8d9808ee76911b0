use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::auth::{authorize, require_account, require_found, IdentityClaims, Requirement};
use crate::crypto::{password_hash, verify_password};
use crate::db::{
    status, EditUserRequest, LoginRequest, LoginResponse, NewUser, Post, PostListEntry,
    RegisterRequest, Role, User, UserInfoQuery, UserProfile, UserResponse, VerifyRequest,
    VerifyResponse,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_avatar, validate_email, validate_nickname, validate_password, validate_sex,
    validate_username,
};

const DEFAULT_SEX: &str = "SECRET";

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("username", validate_username(&req.username))
        .check("nickname", validate_nickname(&req.nickname))
        .check("password", validate_password(&req.password))
        .check("email", validate_email(&req.email));
    if let Some(sex) = &req.sex {
        errors.check("sex", validate_sex(sex));
    }
    errors.finish()
}

/// Create a self-registered account
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_register_request(&req)?;

    if User::get_by_name(&state.db, &req.username).await?.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }
    if User::get_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let hash = password_hash(&req.password, &req.username);
    let user = User::create(
        &state.db,
        &NewUser {
            name: &req.username,
            nickname: req.nickname.trim(),
            password_hash: &hash,
            email: &req.email,
            sex: req.sex.as_deref().unwrap_or(DEFAULT_SEX),
            role: Role::User,
            status: status::ACTIVE,
        },
    )
    .await?;

    tracing::info!(uid = user.uid, name = %user.name, "Registered user");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Exchange username and password for a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // Same message for unknown users and wrong passwords
    let invalid = || ApiError::bad_request("Invalid username or password");

    let user = User::get_by_name(&state.db, &req.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.name, &user.password_hash) {
        tracing::debug!(name = %req.username, "Rejected login: bad password");
        return Err(invalid());
    }

    if user.is_banned() {
        return Err(ApiError::forbidden("This account has been banned"));
    }

    User::touch_login(&state.db, user.uid).await?;
    let token = state.tokens.issue(&IdentityClaims::from(&user))?;

    tracing::info!(uid = user.uid, "User logged in");

    Ok(Json(LoginResponse {
        id: user.uid,
        token,
    }))
}

/// Check that a token is valid and belongs to `uid`
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let verification = state.tokens.verify(&req.token);
    let claims = authorize(&verification, Requirement::Owner(req.uid))?;

    Ok(Json(VerifyResponse { uid: claims.id }))
}

/// Public profile with the user's posts
pub async fn get_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserInfoQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = require_found(User::get_by_id(&state.db, query.uid).await?, "user")?;
    let posts = Post::list_for_author(&state.db, user.uid)
        .await?
        .into_iter()
        .map(PostListEntry::from)
        .collect();

    Ok(Json(UserProfile {
        uid: user.uid,
        name: user.name,
        nickname: user.nickname,
        sex: user.sex,
        status: user.status,
        avatar: user.avatar,
        posts,
    }))
}

/// Edit the caller's own nickname, password or avatar
pub async fn edit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let verification = state.tokens.verify(&req.token);
    let claims = authorize(&verification, Requirement::Authenticated)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(nickname) = &req.nickname {
        errors.check("nickname", validate_nickname(nickname));
    }
    if let Some(password) = &req.password {
        errors.check("password", validate_password(password));
    }
    if let Some(avatar) = &req.avatar {
        errors.check("avatar", validate_avatar(avatar));
    }
    if req.nickname.is_none() && req.password.is_none() && req.avatar.is_none() {
        errors.add("request", "Nothing to update");
    }
    errors.finish()?;

    let user = require_account(User::get_by_id(&state.db, claims.id).await?)?;

    let hash = req
        .password
        .as_deref()
        .map(|password| password_hash(password, &user.name));

    let updated = User::update_profile(
        &state.db,
        user.uid,
        req.nickname.as_deref().map(str::trim),
        hash.as_deref(),
        req.avatar.as_deref(),
    )
    .await?;

    tracing::info!(uid = updated.uid, password_changed = hash.is_some(), "Updated profile");

    Ok(Json(UserResponse::from(updated)))
}
