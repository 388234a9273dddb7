//! PostgreSQL-backed user repository

use crate::{
    error::{IdentityError, Result},
    models::{OtpPurpose, Role, User},
    otp::OtpChallenge,
    repository::UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, role, is_active, is_verified, \
     otp_code_hash, otp_expires_at, otp_purpose, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    password_hash: String,
    role: String,
    is_active: bool,
    is_verified: bool,
    otp_code_hash: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    otp_purpose: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = IdentityError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role: Role = row.role.parse().map_err(IdentityError::Storage)?;
        let otp = match (row.otp_code_hash, row.otp_expires_at, row.otp_purpose) {
            (Some(code_hash), Some(expires_at), Some(purpose)) => Some(OtpChallenge {
                code_hash,
                expires_at,
                purpose: purpose.parse::<OtpPurpose>().map_err(IdentityError::Storage)?,
            }),
            _ => None,
        };
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            role,
            is_active: row.is_active,
            is_verified: row.is_verified,
            otp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL-backed user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        debug!(user_id = %user.id, "Inserting user");
        let otp = user.otp.as_ref();
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (
                id, name, email, phone, password_hash, role, is_active, is_verified,
                otp_code_hash, otp_expires_at, otp_purpose, created_at, updated_at
            ) VALUES ($1, $2, LOWER($3), $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(otp.map(|o| o.code_hash.as_str()))
        .bind(otp.map(|o| o.expires_at))
        .bind(otp.map(|o| o.purpose.as_str()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let otp = user.otp.as_ref();
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                name = $2, email = LOWER($3), phone = $4, password_hash = $5, role = $6,
                is_active = $7, is_verified = $8,
                otp_code_hash = $9, otp_expires_at = $10, otp_purpose = $11,
                updated_at = $12
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(otp.map(|o| o.code_hash.as_str()))
        .bind(otp.map(|o| o.expires_at))
        .bind(otp.map(|o| o.purpose.as_str()))
        .bind(user.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(IdentityError::UserNotFound)?.try_into()
    }
}
