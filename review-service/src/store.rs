//! Review persistence with atomic aggregate maintenance
//!
//! Each mutating call writes the review and recomputes the center's rating
//! as one unit: the PostgreSQL store locks the center row inside a
//! transaction, the in-memory store holds an async mutex across both steps.

use crate::{aggregation::summarize, error::*, models::Review};
use async_trait::async_trait;
use center_service::{repository::CenterRepository, RatingSummary};
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

mod postgres;

pub use postgres::PostgresReviewStore;

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> ReviewResult<Option<Review>>;
    async fn find_by_user_and_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> ReviewResult<Option<Review>>;
    /// Newest first
    async fn list_by_center(&self, center_id: Uuid) -> ReviewResult<Vec<Review>>;
    /// Newest first
    async fn list_all(&self) -> ReviewResult<Vec<Review>>;
    /// Insert a review and refresh its center. `Conflict` when the author
    /// already reviewed the appointment.
    async fn insert_and_refresh(&self, review: &Review) -> ReviewResult<(Review, RatingSummary)>;
    async fn update_and_refresh(&self, review: &Review) -> ReviewResult<(Review, RatingSummary)>;
    async fn delete_and_refresh(&self, review: &Review) -> ReviewResult<RatingSummary>;
    /// Recompute a center's aggregate from its current reviews
    async fn refresh_center(&self, center_id: Uuid) -> ReviewResult<RatingSummary>;
}

/// In-memory review store for testing and development
pub struct InMemoryReviewStore {
    reviews: Arc<DashMap<Uuid, Review>>,
    centers: Arc<dyn CenterRepository>,
    write_lock: Mutex<()>,
}

impl InMemoryReviewStore {
    pub fn new(centers: Arc<dyn CenterRepository>) -> Self {
        Self {
            reviews: Arc::new(DashMap::new()),
            centers,
            write_lock: Mutex::new(()),
        }
    }

    fn collect(&self, keep: impl Fn(&Review) -> bool) -> Vec<Review> {
        let mut found: Vec<Review> = self
            .reviews
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|r| Reverse(r.created_at));
        found
    }

    // Caller must hold `write_lock`
    async fn recompute(&self, center_id: Uuid) -> ReviewResult<RatingSummary> {
        let ratings: Vec<i16> = self
            .reviews
            .iter()
            .filter(|entry| entry.value().center_id == center_id)
            .map(|entry| entry.value().rating)
            .collect();
        let summary = summarize(&ratings);
        self.centers.set_rating(center_id, summary).await?;
        Ok(summary)
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn find_by_id(&self, id: Uuid) -> ReviewResult<Option<Review>> {
        Ok(self.reviews.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_user_and_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> ReviewResult<Option<Review>> {
        Ok(self
            .reviews
            .iter()
            .find(|entry| {
                entry.value().user_id == user_id && entry.value().appointment_id == appointment_id
            })
            .map(|entry| entry.value().clone()))
    }

    async fn list_by_center(&self, center_id: Uuid) -> ReviewResult<Vec<Review>> {
        Ok(self.collect(|r| r.center_id == center_id))
    }

    async fn list_all(&self) -> ReviewResult<Vec<Review>> {
        Ok(self.collect(|_| true))
    }

    async fn insert_and_refresh(&self, review: &Review) -> ReviewResult<(Review, RatingSummary)> {
        let _guard = self.write_lock.lock().await;
        let duplicate = self.reviews.iter().any(|entry| {
            entry.value().user_id == review.user_id
                && entry.value().appointment_id == review.appointment_id
        });
        if duplicate {
            return Err(ReviewError::duplicate());
        }
        self.reviews.insert(review.id, review.clone());
        match self.recompute(review.center_id).await {
            Ok(summary) => Ok((review.clone(), summary)),
            Err(err) => {
                self.reviews.remove(&review.id);
                Err(err)
            }
        }
    }

    async fn update_and_refresh(&self, review: &Review) -> ReviewResult<(Review, RatingSummary)> {
        let _guard = self.write_lock.lock().await;
        let previous = self
            .reviews
            .get(&review.id)
            .map(|entry| entry.value().clone())
            .ok_or_else(ReviewError::not_found)?;
        self.reviews.insert(review.id, review.clone());
        match self.recompute(review.center_id).await {
            Ok(summary) => Ok((review.clone(), summary)),
            Err(err) => {
                self.reviews.insert(previous.id, previous);
                Err(err)
            }
        }
    }

    async fn delete_and_refresh(&self, review: &Review) -> ReviewResult<RatingSummary> {
        let _guard = self.write_lock.lock().await;
        let (_, removed) = self
            .reviews
            .remove(&review.id)
            .ok_or_else(ReviewError::not_found)?;
        match self.recompute(removed.center_id).await {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.reviews.insert(removed.id, removed);
                Err(err)
            }
        }
    }

    async fn refresh_center(&self, center_id: Uuid) -> ReviewResult<RatingSummary> {
        let _guard = self.write_lock.lock().await;
        self.recompute(center_id).await
    }
}
