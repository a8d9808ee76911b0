//! User accounts and roles.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use super::PostListEntry;

/// Account roles.
///
/// There is no implied ordering between roles: each operation names the exact
/// set of roles it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Reserved accounts (`system`, `anonymous`); never deletable
    System,
    /// Moderators with access to the admin surface
    Admin,
    /// Self-registered accounts
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SYSTEM" => Ok(Role::System),
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Account status values stored in `users.status`
pub mod status {
    pub const ACTIVE: i64 = 0;
    pub const BANNED: i64 = 2;
}

/// Name of the reserved account that owns the `system` role
pub const SYSTEM_USERNAME: &str = "system";

/// Name of the reserved account that inherits content of deleted users
pub const ANONYMOUS_USERNAME: &str = "anonymous";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub uid: i64,
    pub name: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub sex: String,
    pub role: String,
    pub status: i64,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub logged_at: Option<String>,
}

impl User {
    /// Parse the stored role. Unknown values degrade to the least privileged role.
    pub fn role_enum(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    pub fn is_banned(&self) -> bool {
        self.status == status::BANNED
    }

    pub async fn create(db: &SqlitePool, new: &NewUser<'_>) -> Result<User, sqlx::Error> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, nickname, password_hash, email, sex, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.name)
        .bind(new.nickname)
        .bind(new.password_hash)
        .bind(new.email)
        .bind(new.sex)
        .bind(new.role.as_str())
        .bind(new.status)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_by_id(db, result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_id(db: &SqlitePool, uid: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(db)
            .await
    }

    pub async fn get_by_name(db: &SqlitePool, name: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(db)
            .await
    }

    pub async fn get_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    /// Most recently registered account
    pub async fn latest(db: &SqlitePool) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users ORDER BY uid DESC LIMIT 1")
            .fetch_optional(db)
            .await
    }

    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
    }

    /// Page through accounts in ascending uid order with their content counts
    pub async fn list_page(
        db: &SqlitePool,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<UserSummary>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT u.uid, u.name, u.email, u.nickname, u.sex, u.status, u.role, u.avatar,
                   u.created_at, u.logged_at,
                   (SELECT COUNT(*) FROM posts p WHERE p.author = u.uid) AS post_count,
                   (SELECT COUNT(*) FROM comments c WHERE c.sender = u.uid) AS comment_count
            FROM users u
            ORDER BY u.uid ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(db)
        .await
    }

    /// Apply a profile edit. `None` fields keep their current value.
    pub async fn update_profile(
        db: &SqlitePool,
        uid: i64,
        nickname: Option<&str>,
        password_hash: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let existing = Self::get_by_id(db, uid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            UPDATE users
            SET nickname = ?, password_hash = ?, avatar = ?, updated_at = ?
            WHERE uid = ?
            "#,
        )
        .bind(nickname.unwrap_or(&existing.nickname))
        .bind(password_hash.unwrap_or(&existing.password_hash))
        .bind(avatar.or(existing.avatar.as_deref()))
        .bind(&now)
        .bind(uid)
        .execute(db)
        .await?;

        Self::get_by_id(db, uid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn set_status(db: &SqlitePool, uid: i64, status: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE uid = ?")
            .bind(status)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(uid)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_login(db: &SqlitePool, uid: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET logged_at = ? WHERE uid = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(uid)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &SqlitePool, uid: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE uid = ?")
            .bind(uid)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Fields for inserting a new account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub nickname: &'a str,
    pub password_hash: &'a str,
    pub email: &'a str,
    pub sex: &'a str,
    pub role: Role,
    pub status: i64,
}

/// Admin listing row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub uid: i64,
    pub name: String,
    pub email: String,
    pub nickname: String,
    pub sex: String,
    pub status: i64,
    pub role: String,
    pub avatar: Option<String>,
    pub created_at: String,
    pub logged_at: Option<String>,
    pub post_count: i64,
    pub comment_count: i64,
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub uid: i64,
    pub name: String,
    pub nickname: String,
    pub email: String,
    pub sex: String,
    pub role: String,
    pub status: i64,
    pub avatar: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            uid: user.uid,
            name: user.name,
            nickname: user.nickname,
            email: user.email,
            sex: user.sex,
            role: user.role,
            status: user.status,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub nickname: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub sex: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub id: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub uid: i64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    pub token: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoQuery {
    pub uid: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub uid: i64,
}

/// Public profile with the account's posts
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub uid: i64,
    pub name: String,
    pub nickname: String,
    pub sex: String,
    pub status: i64,
    pub avatar: Option<String>,
    pub posts: Vec<PostListEntry>,
}
