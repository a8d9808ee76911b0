//! Database seeders for built-in accounts
//!
//! The reserved accounts are created on every startup if missing. They carry a
//! placeholder password hash that no derived hash can equal, so nobody can log
//! in as them.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use super::models::{status, NewUser, Role, User, ANONYMOUS_USERNAME, SYSTEM_USERNAME};
use crate::crypto::password_hash;

/// Stored in place of a hash for accounts that must not log in
const LOCKED_PASSWORD_HASH: &str = "!";

pub const ADMIN_USERNAME: &str = "admin";

/// Seed the `system` and `anonymous` accounts (runs on every startup)
pub async fn ensure_reserved_accounts(pool: &SqlitePool) -> Result<()> {
    // Format: (name, email, nickname)
    let reserved: [(&str, &str, &str); 2] = [
        (SYSTEM_USERNAME, "system@inkpost.local", "System"),
        (ANONYMOUS_USERNAME, "anonymous@inkpost.local", "Anonymous"),
    ];

    let now = chrono::Utc::now().to_rfc3339();
    for (name, email, nickname) in reserved {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO users
            (name, nickname, password_hash, email, sex, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'SECRET', ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(nickname)
        .bind(LOCKED_PASSWORD_HASH)
        .bind(email)
        .bind(Role::System.as_str())
        .bind(status::BANNED)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(account = name, "Created reserved account");
        }
    }

    Ok(())
}

/// Ensure the `admin` account exists, creating it with `password` if missing.
///
/// An existing admin keeps its current password.
pub async fn ensure_admin_user(pool: &SqlitePool, password: &str) -> Result<()> {
    if User::get_by_name(pool, ADMIN_USERNAME).await?.is_some() {
        return Ok(());
    }

    let hash = password_hash(password, ADMIN_USERNAME);
    User::create(
        pool,
        &NewUser {
            name: ADMIN_USERNAME,
            nickname: "Administrator",
            password_hash: &hash,
            email: "admin@inkpost.local",
            sex: "SECRET",
            role: Role::Admin,
            status: status::ACTIVE,
        },
    )
    .await?;

    info!("Created admin account '{}'", ADMIN_USERNAME);
    Ok(())
}
