//! PostgreSQL-backed center and test repositories

use crate::{
    error::{CenterError, CenterResult},
    models::*,
    repository::{CenterRepository, TestRepository},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

const CENTER_COLUMNS: &str = "id, name, description, street, city, state, zip_code, country, \
     phone, email, operating_hours, services, admin_id, is_active, rating, total_reviews, \
     created_at, updated_at";

const TEST_COLUMNS: &str = "id, center_id, name, category, price, duration_minutes, description, \
     preparation_instructions, requirements, is_active, created_at, updated_at";

#[derive(FromRow)]
struct CenterRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    street: String,
    city: String,
    state: String,
    zip_code: String,
    country: String,
    phone: String,
    email: String,
    operating_hours: Option<String>,
    services: Vec<String>,
    admin_id: Uuid,
    is_active: bool,
    rating: f64,
    total_reviews: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CenterRow> for DiagnosticCenter {
    fn from(row: CenterRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            address: Address {
                street: row.street,
                city: row.city,
                state: row.state,
                zip_code: row.zip_code,
                country: row.country,
            },
            phone: row.phone,
            email: row.email,
            operating_hours: row.operating_hours,
            services: row.services,
            admin_id: row.admin_id,
            is_active: row.is_active,
            rating: row.rating,
            total_reviews: row.total_reviews,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TestRow {
    id: Uuid,
    center_id: Uuid,
    name: String,
    category: String,
    price: Decimal,
    duration_minutes: i32,
    description: Option<String>,
    preparation_instructions: Option<String>,
    requirements: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TestRow> for DiagnosticTest {
    fn from(row: TestRow) -> Self {
        Self {
            id: row.id,
            center_id: row.center_id,
            name: row.name,
            category: row.category,
            price: row.price,
            duration_minutes: row.duration_minutes,
            description: row.description,
            preparation_instructions: row.preparation_instructions,
            requirements: row.requirements,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL-backed center repository
pub struct PostgresCenterRepository {
    pool: PgPool,
}

impl PostgresCenterRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CenterRepository for PostgresCenterRepository {
    async fn create_center(&self, center: &DiagnosticCenter) -> CenterResult<DiagnosticCenter> {
        debug!(center_id = %center.id, "Inserting diagnostic center");
        let row: CenterRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO diagnostic_centers (
                id, name, description, street, city, state, zip_code, country,
                phone, email, operating_hours, services, admin_id, is_active,
                rating, total_reviews, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {CENTER_COLUMNS}
            "#
        ))
        .bind(center.id)
        .bind(&center.name)
        .bind(&center.description)
        .bind(&center.address.street)
        .bind(&center.address.city)
        .bind(&center.address.state)
        .bind(&center.address.zip_code)
        .bind(&center.address.country)
        .bind(&center.phone)
        .bind(&center.email)
        .bind(&center.operating_hours)
        .bind(&center.services)
        .bind(center.admin_id)
        .bind(center.is_active)
        .bind(center.rating)
        .bind(center.total_reviews)
        .bind(center.created_at)
        .bind(center.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if database_layer::is_unique_violation(&e) {
                CenterError::Conflict("This admin already manages a diagnostic center".into())
            } else {
                e.into()
            }
        })?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> CenterResult<Option<DiagnosticCenter>> {
        let row: Option<CenterRow> = sqlx::query_as(&format!(
            "SELECT {CENTER_COLUMNS} FROM diagnostic_centers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> CenterResult<Option<DiagnosticCenter>> {
        let row: Option<CenterRow> = sqlx::query_as(&format!(
            "SELECT {CENTER_COLUMNS} FROM diagnostic_centers WHERE admin_id = $1"
        ))
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_many(&self, ids: &[Uuid]) -> CenterResult<Vec<DiagnosticCenter>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<CenterRow> = sqlx::query_as(&format!(
            "SELECT {CENTER_COLUMNS} FROM diagnostic_centers WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_active(&self) -> CenterResult<Vec<DiagnosticCenter>> {
        let rows: Vec<CenterRow> = sqlx::query_as(&format!(
            "SELECT {CENTER_COLUMNS} FROM diagnostic_centers WHERE is_active ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_ids(&self) -> CenterResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM diagnostic_centers")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn set_rating(&self, center_id: Uuid, summary: RatingSummary) -> CenterResult<()> {
        let result = sqlx::query(
            "UPDATE diagnostic_centers SET rating = $2, total_reviews = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(center_id)
        .bind(summary.rating)
        .bind(summary.total_reviews)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CenterError::NotFound("Diagnostic center not found".into()));
        }
        Ok(())
    }
}

/// PostgreSQL-backed test repository
pub struct PostgresTestRepository {
    pool: PgPool,
}

impl PostgresTestRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TestRepository for PostgresTestRepository {
    async fn create_test(&self, test: &DiagnosticTest) -> CenterResult<DiagnosticTest> {
        debug!(test_id = %test.id, center_id = %test.center_id, "Inserting diagnostic test");
        let row: TestRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO diagnostic_tests (
                id, center_id, name, category, price, duration_minutes, description,
                preparation_instructions, requirements, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test.id)
        .bind(test.center_id)
        .bind(&test.name)
        .bind(&test.category)
        .bind(test.price)
        .bind(test.duration_minutes)
        .bind(&test.description)
        .bind(&test.preparation_instructions)
        .bind(&test.requirements)
        .bind(test.is_active)
        .bind(test.created_at)
        .bind(test.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> CenterResult<Option<DiagnosticTest>> {
        let row: Option<TestRow> = sqlx::query_as(&format!(
            "SELECT {TEST_COLUMNS} FROM diagnostic_tests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_active_by_name(
        &self,
        center_id: Uuid,
        name: &str,
    ) -> CenterResult<Option<DiagnosticTest>> {
        let row: Option<TestRow> = sqlx::query_as(&format!(
            "SELECT {TEST_COLUMNS} FROM diagnostic_tests WHERE center_id = $1 AND name = $2 AND is_active"
        ))
        .bind(center_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_active(&self, center_id: Uuid) -> CenterResult<Vec<DiagnosticTest>> {
        let rows: Vec<TestRow> = sqlx::query_as(&format!(
            "SELECT {TEST_COLUMNS} FROM diagnostic_tests WHERE center_id = $1 AND is_active ORDER BY name"
        ))
        .bind(center_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_active(&self, center_id: Uuid) -> CenterResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM diagnostic_tests WHERE center_id = $1 AND is_active",
        )
        .bind(center_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_many(&self, ids: &[Uuid]) -> CenterResult<Vec<DiagnosticTest>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<TestRow> = sqlx::query_as(&format!(
            "SELECT {TEST_COLUMNS} FROM diagnostic_tests WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_test(&self, test: &DiagnosticTest) -> CenterResult<DiagnosticTest> {
        let row: Option<TestRow> = sqlx::query_as(&format!(
            r#"
            UPDATE diagnostic_tests SET
                name = $2, category = $3, price = $4, duration_minutes = $5,
                description = $6, preparation_instructions = $7, requirements = $8,
                is_active = $9, updated_at = $10
            WHERE id = $1
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test.id)
        .bind(&test.name)
        .bind(&test.category)
        .bind(test.price)
        .bind(test.duration_minutes)
        .bind(&test.description)
        .bind(&test.preparation_instructions)
        .bind(&test.requirements)
        .bind(test.is_active)
        .bind(test.updated_at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into)
            .ok_or_else(|| CenterError::NotFound("Test not found".into()))
    }
}
