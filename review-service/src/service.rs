use crate::{
    error::*,
    models::*,
    store::ReviewStore,
};
use appointment_service::{AppointmentService, AppointmentStatus};
use auth_identity::repository::UserRepository;
use center_service::CenterService;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    appointments: Arc<AppointmentService>,
    centers: Arc<CenterService>,
    users: Arc<dyn UserRepository>,
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        appointments: Arc<AppointmentService>,
        centers: Arc<CenterService>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            store,
            appointments,
            centers,
            users,
        }
    }

    /// Review one of the caller's completed appointments
    ///
    /// # Errors
    ///
    /// `Validation` for a bad rating or an unfinished appointment,
    /// `NotFound` for an unknown appointment, `Forbidden` for someone
    /// else's appointment, `Conflict` for a second review.
    #[instrument(skip(self, request))]
    pub async fn create(&self, user_id: Uuid, request: CreateReviewRequest) -> ReviewResult<Review> {
        let (Some(appointment_id), Some(rating)) = (request.appointment_id, request.rating) else {
            return Err(ReviewError::Validation(
                "Appointment ID and rating are required".into(),
            ));
        };
        let rating = validate_rating(rating)?;

        let appointment = self
            .appointments
            .find(appointment_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound("Appointment not found".into()))?;
        if appointment.patient_id != user_id {
            return Err(ReviewError::Forbidden("Not your appointment".into()));
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(ReviewError::Validation(
                "You can only review completed appointments".into(),
            ));
        }
        if self
            .store
            .find_by_user_and_appointment(user_id, appointment_id)
            .await?
            .is_some()
        {
            return Err(ReviewError::duplicate());
        }

        let now = Utc::now();
        let review = Review {
            id: Uuid::new_v4(),
            user_id,
            appointment_id,
            center_id: appointment.center_id,
            rating,
            comment: normalize_comment(request.comment),
            created_at: now,
            updated_at: now,
        };
        let (review, summary) = self.store.insert_and_refresh(&review).await?;
        info!(
            review_id = %review.id,
            center_id = %review.center_id,
            center_rating = summary.rating,
            total_reviews = summary.total_reviews,
            "Review created"
        );
        Ok(review)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown review, `Forbidden` for someone else's,
    /// `Validation` for a bad rating.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        user_id: Uuid,
        review_id: Uuid,
        request: UpdateReviewRequest,
    ) -> ReviewResult<Review> {
        let mut review = self.authored(user_id, review_id).await?;
        if let Some(rating) = request.rating {
            review.rating = validate_rating(rating)?;
        }
        if request.comment.is_some() {
            review.comment = normalize_comment(request.comment);
        }
        review.updated_at = Utc::now();

        let (review, summary) = self.store.update_and_refresh(&review).await?;
        info!(%review_id, center_rating = summary.rating, "Review updated");
        Ok(review)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown review, `Forbidden` for someone else's.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, review_id: Uuid) -> ReviewResult<()> {
        let review = self.authored(user_id, review_id).await?;
        let summary = self.store.delete_and_refresh(&review).await?;
        info!(
            %review_id,
            center_rating = summary.rating,
            total_reviews = summary.total_reviews,
            "Review deleted"
        );
        Ok(())
    }

    /// Reviews of a center, newest first, with author names
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list_by_center(&self, center_id: Uuid) -> ReviewResult<Vec<CenterReviewView>> {
        let reviews = self.store.list_by_center(center_id).await?;
        let names = self.user_names(&reviews).await?;
        Ok(reviews
            .into_iter()
            .map(|review| CenterReviewView {
                user_name: names.get(&review.user_id).cloned(),
                review,
            })
            .collect())
    }

    /// Every review with author, center and appointment date joined in
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list_all(&self) -> ReviewResult<Vec<AdminReviewView>> {
        let reviews = self.store.list_all().await?;
        let names = self.user_names(&reviews).await?;

        let center_ids: Vec<Uuid> = reviews.iter().map(|r| r.center_id).collect();
        let centers = self.centers.center_summaries(&center_ids).await?;

        let mut appointment_ids: Vec<Uuid> = reviews.iter().map(|r| r.appointment_id).collect();
        appointment_ids.sort_unstable();
        appointment_ids.dedup();
        let dates: HashMap<Uuid, _> = self
            .appointments
            .find_many(&appointment_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a.appointment_date))
            .collect();

        Ok(reviews
            .into_iter()
            .map(|review| AdminReviewView {
                user_name: names.get(&review.user_id).cloned(),
                center_name: centers.get(&review.center_id).map(|c| c.name.clone()),
                appointment_date: dates.get(&review.appointment_id).copied(),
                review,
            })
            .collect())
    }

    /// Recompute stored aggregates from the current reviews, for one center
    /// or for all of them. Running it twice yields the same result.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown center.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, center_id: Option<Uuid>) -> ReviewResult<Vec<CenterRating>> {
        let center_ids = match center_id {
            Some(id) => {
                self.centers
                    .find_center(id)
                    .await?
                    .ok_or_else(|| ReviewError::NotFound("Diagnostic center not found".into()))?;
                vec![id]
            }
            None => self.centers.centers().list_ids().await?,
        };

        let mut ratings = Vec::with_capacity(center_ids.len());
        for center_id in center_ids {
            let summary = self.store.refresh_center(center_id).await?;
            ratings.push(CenterRating {
                center_id,
                rating: summary.rating,
                total_reviews: summary.total_reviews,
            });
        }
        info!(centers = ratings.len(), "Center ratings reconciled");
        Ok(ratings)
    }

    async fn authored(&self, user_id: Uuid, review_id: Uuid) -> ReviewResult<Review> {
        let review = self
            .store
            .find_by_id(review_id)
            .await?
            .ok_or_else(ReviewError::not_found)?;
        if review.user_id != user_id {
            return Err(ReviewError::Forbidden("Not your review".into()));
        }
        Ok(review)
    }

    async fn user_names(&self, reviews: &[Review]) -> ReviewResult<HashMap<Uuid, String>> {
        let mut ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(self
            .users
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user.name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryReviewStore;
    use appointment_service::{
        repository::InMemoryAppointmentRepository, Appointment, CreateAppointmentRequest,
        ReportUploader, StatusUpdateRequest, UploadError,
    };
    use async_trait::async_trait;
    use auth_identity::{repository::InMemoryUserRepository, Caller, Role, User};
    use center_service::repository::{
        CenterRepository, InMemoryCenterRepository, InMemoryTestRepository,
    };
    use center_service::{Address, CreateCenterRequest, CreateTestRequest, RatingSummary};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct NoUploads;

    #[async_trait]
    impl ReportUploader for NoUploads {
        async fn upload(&self, _: &str, _: &str, _: bytes::Bytes) -> Result<String, UploadError> {
            Err(UploadError("uploads disabled".into()))
        }
    }

    struct Fixture {
        reviews: ReviewService,
        appointments: Arc<AppointmentService>,
        center_repo: Arc<InMemoryCenterRepository>,
        users: Arc<InMemoryUserRepository>,
        admin: Caller,
        center_id: Uuid,
        test_id: Uuid,
    }

    async fn seed_user(users: &InMemoryUserRepository, email: &str, role: Role) -> Caller {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: format!("User {email}"),
            email: email.into(),
            phone: None,
            password_hash: String::new(),
            role,
            is_active: true,
            is_verified: true,
            otp: None,
            created_at: now,
            updated_at: now,
        };
        users.create_user(&user).await.unwrap();
        Caller::new(user.id, role)
    }

    async fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let center_repo = Arc::new(InMemoryCenterRepository::new());
        let centers = Arc::new(CenterService::new(
            center_repo.clone(),
            Arc::new(InMemoryTestRepository::new()),
            users.clone(),
        ));
        let appointments = Arc::new(AppointmentService::new(
            Arc::new(InMemoryAppointmentRepository::new()),
            Arc::clone(&centers),
            users.clone(),
            Arc::new(NoUploads),
        ));
        let reviews = ReviewService::new(
            Arc::new(InMemoryReviewStore::new(center_repo.clone())),
            Arc::clone(&appointments),
            Arc::clone(&centers),
            users.clone(),
        );

        let admin = seed_user(&users, "admin@lab.example", Role::DiagnosticCenterAdmin).await;
        let center = centers
            .create_center(CreateCenterRequest {
                name: "Lakeside Lab".into(),
                address: Address {
                    street: "9 Shore Rd".into(),
                    city: "Kochi".into(),
                    ..Default::default()
                },
                phone: "0484-000".into(),
                email: "desk@lab.example".into(),
                admin_id: Some(admin.user_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let test = centers
            .add_test(
                admin.user_id,
                CreateTestRequest {
                    name: "HbA1c".into(),
                    category: "Diabetes".into(),
                    price: Some(Decimal::new(450, 0)),
                    duration_minutes: Some(15),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        Fixture {
            reviews,
            appointments,
            center_repo,
            users,
            admin,
            center_id: center.id,
            test_id: test.id,
        }
    }

    impl Fixture {
        async fn patient(&self, email: &str) -> Uuid {
            seed_user(&self.users, email, Role::Patient).await.user_id
        }

        async fn appointment(&self, patient_id: Uuid, complete: bool) -> Appointment {
            let appointment = self
                .appointments
                .create(
                    patient_id,
                    CreateAppointmentRequest {
                        center_id: Some(self.center_id),
                        test_id: Some(self.test_id),
                        appointment_date: NaiveDate::from_ymd_opt(2025, 1, 20),
                        appointment_time: Some("10:00".into()),
                        notes: None,
                    },
                )
                .await
                .unwrap();
            if !complete {
                return appointment;
            }
            for status in [AppointmentStatus::Confirmed, AppointmentStatus::Completed] {
                self.appointments
                    .update_status(
                        self.admin,
                        appointment.id,
                        StatusUpdateRequest {
                            status: Some(status),
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap();
            }
            self.appointments.find(appointment.id).await.unwrap().unwrap()
        }

        async fn rating(&self) -> RatingSummary {
            let center = self.center_repo.find_by_id(self.center_id).await.unwrap().unwrap();
            RatingSummary {
                rating: center.rating,
                total_reviews: center.total_reviews,
            }
        }

        async fn review(&self, patient_id: Uuid, rating: f64) -> Review {
            let appointment = self.appointment(patient_id, true).await;
            self.reviews
                .create(
                    patient_id,
                    CreateReviewRequest {
                        appointment_id: Some(appointment.id),
                        rating: Some(rating),
                        comment: Some("  Smooth visit ".into()),
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_aggregate_follows_every_mutation() {
        let fx = fixture().await;
        let alice = fx.patient("alice@example.com").await;
        let bob = fx.patient("bob@example.com").await;

        let first = fx.review(alice, 4.0).await;
        assert_eq!(first.comment.as_deref(), Some("Smooth visit"));
        assert_eq!(fx.rating().await, RatingSummary { rating: 4.0, total_reviews: 1 });

        let second = fx.review(bob, 2.0).await;
        assert_eq!(fx.rating().await, RatingSummary { rating: 3.0, total_reviews: 2 });

        fx.reviews
            .update(
                bob,
                second.id,
                UpdateReviewRequest {
                    rating: Some(5.0),
                    comment: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(fx.rating().await, RatingSummary { rating: 4.5, total_reviews: 2 });

        fx.reviews.delete(alice, first.id).await.unwrap();
        assert_eq!(fx.rating().await, RatingSummary { rating: 5.0, total_reviews: 1 });

        fx.reviews.delete(bob, second.id).await.unwrap();
        assert_eq!(fx.rating().await, RatingSummary::EMPTY);
    }

    #[tokio::test]
    async fn test_only_completed_own_appointments() {
        let fx = fixture().await;
        let owner = fx.patient("owner@example.com").await;
        let stranger = fx.patient("stranger@example.com").await;

        let pending = fx.appointment(owner, false).await;
        let err = fx
            .reviews
            .create(
                owner,
                CreateReviewRequest {
                    appointment_id: Some(pending.id),
                    rating: Some(5.0),
                    comment: None,
                },
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, ReviewError::Validation(ref m) if m == "You can only review completed appointments")
        );

        let done = fx.appointment(owner, true).await;
        let err = fx
            .reviews
            .create(
                stranger,
                CreateReviewRequest {
                    appointment_id: Some(done.id),
                    rating: Some(5.0),
                    comment: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Forbidden(ref m) if m == "Not your appointment"));

        assert!(matches!(
            fx.reviews
                .create(
                    owner,
                    CreateReviewRequest {
                        appointment_id: Some(Uuid::new_v4()),
                        rating: Some(5.0),
                        comment: None,
                    },
                )
                .await,
            Err(ReviewError::NotFound(_))
        ));
        assert_eq!(fx.rating().await, RatingSummary::EMPTY);
    }

    #[tokio::test]
    async fn test_one_review_per_appointment() {
        let fx = fixture().await;
        let patient = fx.patient("once@example.com").await;
        let appointment = fx.appointment(patient, true).await;
        let request = CreateReviewRequest {
            appointment_id: Some(appointment.id),
            rating: Some(3.0),
            comment: None,
        };

        fx.reviews.create(patient, request.clone()).await.unwrap();
        assert!(matches!(
            fx.reviews.create(patient, request).await,
            Err(ReviewError::Conflict(_))
        ));
        assert_eq!(fx.rating().await.total_reviews, 1);
    }

    #[tokio::test]
    async fn test_rating_must_be_whole_stars() {
        let fx = fixture().await;
        let patient = fx.patient("stars@example.com").await;
        let appointment = fx.appointment(patient, true).await;

        for bad in [0.0, 6.0, 3.5] {
            assert!(matches!(
                fx.reviews
                    .create(
                        patient,
                        CreateReviewRequest {
                            appointment_id: Some(appointment.id),
                            rating: Some(bad),
                            comment: None,
                        },
                    )
                    .await,
                Err(ReviewError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_only_author_may_change_review() {
        let fx = fixture().await;
        let author = fx.patient("author@example.com").await;
        let other = fx.patient("other@example.com").await;
        let review = fx.review(author, 4.0).await;

        assert!(matches!(
            fx.reviews
                .update(other, review.id, UpdateReviewRequest::default())
                .await,
            Err(ReviewError::Forbidden(_))
        ));
        assert!(matches!(
            fx.reviews.delete(other, review.id).await,
            Err(ReviewError::Forbidden(_))
        ));
        assert!(matches!(
            fx.reviews.delete(author, Uuid::new_v4()).await,
            Err(ReviewError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listings_join_names() {
        let fx = fixture().await;
        let patient = fx.patient("list@example.com").await;
        fx.review(patient, 5.0).await;

        let by_center = fx.reviews.list_by_center(fx.center_id).await.unwrap();
        assert_eq!(by_center.len(), 1);
        assert_eq!(by_center[0].user_name.as_deref(), Some("User list@example.com"));

        let all = fx.reviews.list_all().await.unwrap();
        assert_eq!(all[0].center_name.as_deref(), Some("Lakeside Lab"));
        assert_eq!(all[0].appointment_date, NaiveDate::from_ymd_opt(2025, 1, 20));
    }

    #[tokio::test]
    async fn test_reconcile_repairs_drift() {
        let fx = fixture().await;
        let patient = fx.patient("drift@example.com").await;
        fx.review(patient, 2.0).await;

        // Simulate an out-of-band edit of the stored aggregate
        fx.center_repo
            .set_rating(fx.center_id, RatingSummary { rating: 4.9, total_reviews: 40 })
            .await
            .unwrap();

        let repaired = fx.reviews.reconcile(Some(fx.center_id)).await.unwrap();
        assert_eq!(repaired.len(), 1);
        assert_eq!(fx.rating().await, RatingSummary { rating: 2.0, total_reviews: 1 });

        let again = fx.reviews.reconcile(None).await.unwrap();
        assert_eq!(again, repaired);

        assert!(matches!(
            fx.reviews.reconcile(Some(Uuid::new_v4())).await,
            Err(ReviewError::NotFound(_))
        ));
    }
}
