//! PostgreSQL review store
//!
//! Every mutation runs in one transaction that first takes a row lock on
//! the owning center, so concurrent reviews of one center serialize and the
//! recomputed aggregate always matches the committed review set.

use crate::{
    aggregation::summarize,
    error::{ReviewError, ReviewResult},
    models::Review,
    store::ReviewStore,
};
use async_trait::async_trait;
use center_service::RatingSummary;
use chrono::{DateTime, Utc};
use database_layer::TransactionManager;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

const COLUMNS: &str =
    "id, user_id, appointment_id, center_id, rating, comment, created_at, updated_at";

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    appointment_id: Uuid,
    center_id: Uuid,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            appointment_id: row.appointment_id,
            center_id: row.center_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PostgresReviewStore {
    pool: PgPool,
    transactions: TransactionManager,
}

impl PostgresReviewStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let transactions = TransactionManager::new(pool.clone());
        Self { pool, transactions }
    }

    async fn begin_for_center(&self, center_id: Uuid) -> ReviewResult<Transaction<'static, Postgres>> {
        let mut tx = self.transactions.begin().await?;
        if !TransactionManager::lock_row(&mut tx, "diagnostic_centers", center_id).await? {
            return Err(ReviewError::NotFound("Diagnostic center not found".into()));
        }
        Ok(tx)
    }

    async fn recompute(
        tx: &mut Transaction<'static, Postgres>,
        center_id: Uuid,
    ) -> ReviewResult<RatingSummary> {
        let ratings: Vec<(i16,)> = sqlx::query_as("SELECT rating FROM reviews WHERE center_id = $1")
            .bind(center_id)
            .fetch_all(&mut **tx)
            .await?;
        let ratings: Vec<i16> = ratings.into_iter().map(|(r,)| r).collect();
        let summary = summarize(&ratings);

        sqlx::query(
            "UPDATE diagnostic_centers SET rating = $2, total_reviews = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(center_id)
        .bind(summary.rating)
        .bind(summary.total_reviews)
        .execute(&mut **tx)
        .await?;
        debug!(%center_id, rating = summary.rating, total = summary.total_reviews, "Center rating recomputed");
        Ok(summary)
    }
}

#[async_trait]
impl ReviewStore for PostgresReviewStore {
    async fn find_by_id(&self, id: Uuid) -> ReviewResult<Option<Review>> {
        let row: Option<ReviewRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM reviews WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_user_and_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> ReviewResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM reviews WHERE user_id = $1 AND appointment_id = $2"
        ))
        .bind(user_id)
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_by_center(&self, center_id: Uuid) -> ReviewResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM reviews WHERE center_id = $1 ORDER BY created_at DESC"
        ))
        .bind(center_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all(&self) -> ReviewResult<Vec<Review>> {
        let rows: Vec<ReviewRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM reviews ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_and_refresh(&self, review: &Review) -> ReviewResult<(Review, RatingSummary)> {
        let mut tx = self.begin_for_center(review.center_id).await?;
        let row: ReviewRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO reviews (id, user_id, appointment_id, center_id, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(review.id)
        .bind(review.user_id)
        .bind(review.appointment_id)
        .bind(review.center_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        let summary = Self::recompute(&mut tx, review.center_id).await?;
        tx.commit().await?;
        Ok((row.into(), summary))
    }

    async fn update_and_refresh(&self, review: &Review) -> ReviewResult<(Review, RatingSummary)> {
        let mut tx = self.begin_for_center(review.center_id).await?;
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            r#"
            UPDATE reviews SET rating = $2, comment = $3, updated_at = $4
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(review.id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.updated_at)
        .fetch_optional(&mut *tx)
        .await?;
        let row = row.ok_or_else(ReviewError::not_found)?;
        let summary = Self::recompute(&mut tx, review.center_id).await?;
        tx.commit().await?;
        Ok((row.into(), summary))
    }

    async fn delete_and_refresh(&self, review: &Review) -> ReviewResult<RatingSummary> {
        let mut tx = self.begin_for_center(review.center_id).await?;
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review.id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ReviewError::not_found());
        }
        let summary = Self::recompute(&mut tx, review.center_id).await?;
        tx.commit().await?;
        Ok(summary)
    }

    async fn refresh_center(&self, center_id: Uuid) -> ReviewResult<RatingSummary> {
        let mut tx = self.begin_for_center(center_id).await?;
        let summary = Self::recompute(&mut tx, center_id).await?;
        tx.commit().await?;
        Ok(summary)
    }
}
