use crate::{
    error::*,
    models::*,
    repository::{CenterRepository, TestRepository},
};
use auth_identity::{repository::UserRepository, Role};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const TEST_NOT_OWNED: &str = "Test not found or you do not have permission to update it";

/// Center registry and per-center test catalog
pub struct CenterService {
    centers: Arc<dyn CenterRepository>,
    tests: Arc<dyn TestRepository>,
    users: Arc<dyn UserRepository>,
}

impl CenterService {
    pub fn new(
        centers: Arc<dyn CenterRepository>,
        tests: Arc<dyn TestRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            centers,
            tests,
            users,
        }
    }

    #[must_use]
    pub fn centers(&self) -> Arc<dyn CenterRepository> {
        Arc::clone(&self.centers)
    }

    /// Register a center and bind it to its admin
    ///
    /// # Errors
    ///
    /// `Validation` for missing fields or an admin of the wrong role,
    /// `Conflict` when the admin already manages a center.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_center(&self, request: CreateCenterRequest) -> CenterResult<DiagnosticCenter> {
        let name = request.name.trim();
        if name.is_empty() || request.phone.trim().is_empty() || request.email.trim().is_empty() {
            return Err(CenterError::Validation(
                "Please provide name, phone, email and adminId".into(),
            ));
        }
        let address = &request.address;
        if address.street.trim().is_empty() || address.city.trim().is_empty() {
            return Err(CenterError::Validation(
                "Address must include at least street and city".into(),
            ));
        }
        let admin_id = request.admin_id.ok_or_else(|| {
            CenterError::Validation("Please provide name, phone, email and adminId".into())
        })?;

        let admin = self
            .users
            .find_by_id(admin_id)
            .await?
            .ok_or_else(|| CenterError::Validation("Admin user not found".into()))?;
        if admin.role != Role::DiagnosticCenterAdmin {
            return Err(CenterError::Validation(
                "Admin user must have the diagnostic_center_admin role".into(),
            ));
        }
        if self.centers.find_by_admin(admin_id).await?.is_some() {
            return Err(CenterError::Conflict(
                "This admin already manages a diagnostic center".into(),
            ));
        }

        let now = Utc::now();
        let center = DiagnosticCenter {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: request.description,
            address: request.address,
            phone: request.phone.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            operating_hours: request.operating_hours,
            services: request.services,
            admin_id,
            is_active: true,
            rating: RatingSummary::EMPTY.rating,
            total_reviews: RatingSummary::EMPTY.total_reviews,
            created_at: now,
            updated_at: now,
        };
        let center = self.centers.create_center(&center).await?;
        info!(center_id = %center.id, admin_id = %admin_id, "Diagnostic center created");
        Ok(center)
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown or inactive center.
    pub async fn get_center(&self, center_id: Uuid) -> CenterResult<DiagnosticCenter> {
        self.centers
            .find_by_id(center_id)
            .await?
            .filter(|center| center.is_active)
            .ok_or_else(|| CenterError::NotFound("Diagnostic center not found".into()))
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn list_centers(&self) -> CenterResult<Vec<DiagnosticCenter>> {
        self.centers.list_active().await
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn find_center_for_admin(
        &self,
        admin_id: Uuid,
    ) -> CenterResult<Option<DiagnosticCenter>> {
        self.centers.find_by_admin(admin_id).await
    }

    /// The center a center-admin manages
    ///
    /// # Errors
    ///
    /// `Forbidden` when the admin has no center.
    pub async fn require_admin_center(&self, admin_id: Uuid) -> CenterResult<DiagnosticCenter> {
        self.centers.find_by_admin(admin_id).await?.ok_or_else(|| {
            CenterError::Forbidden("No diagnostic center found for this admin".into())
        })
    }

    /// Active tests of an active center
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown or inactive center.
    pub async fn list_tests(&self, center_id: Uuid) -> CenterResult<Vec<DiagnosticTest>> {
        self.get_center(center_id).await?;
        self.tests.list_active(center_id).await
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn count_tests(&self, center_id: Uuid) -> CenterResult<i64> {
        self.tests.count_active(center_id).await
    }

    /// Add a test to the admin's own center
    ///
    /// # Errors
    ///
    /// `Forbidden` without a center, `Validation` for missing or
    /// non-positive fields, `Conflict` for a duplicate active name.
    #[instrument(skip(self, request))]
    pub async fn add_test(
        &self,
        admin_id: Uuid,
        request: CreateTestRequest,
    ) -> CenterResult<DiagnosticTest> {
        let center = self.require_admin_center(admin_id).await?;

        let name = request.name.trim();
        let category = request.category.trim();
        let (Some(price), Some(duration_minutes)) = (request.price, request.duration_minutes)
        else {
            return Err(CenterError::Validation(
                "Please provide name, category, price and duration".into(),
            ));
        };
        if name.is_empty() || category.is_empty() {
            return Err(CenterError::Validation(
                "Please provide name, category, price and duration".into(),
            ));
        }
        validate_price(price)?;
        validate_duration(duration_minutes)?;

        if self
            .tests
            .find_active_by_name(center.id, name)
            .await?
            .is_some()
        {
            return Err(CenterError::Conflict(
                "A test with this name already exists in this center".into(),
            ));
        }

        let now = Utc::now();
        let test = DiagnosticTest {
            id: Uuid::new_v4(),
            center_id: center.id,
            name: name.to_string(),
            category: category.to_string(),
            price,
            duration_minutes,
            description: request.description,
            preparation_instructions: request.preparation_instructions,
            requirements: request.requirements,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let test = self.tests.create_test(&test).await?;
        info!(test_id = %test.id, center_id = %center.id, "Diagnostic test added");
        Ok(test)
    }

    /// Apply a partial update to one of the admin's tests
    ///
    /// # Errors
    ///
    /// `NotFound` when the test is not an active test of the admin's
    /// center, `Validation` for bad values, `Conflict` when renaming onto
    /// another active test.
    #[instrument(skip(self, request))]
    pub async fn update_test(
        &self,
        admin_id: Uuid,
        test_id: Uuid,
        request: UpdateTestRequest,
    ) -> CenterResult<DiagnosticTest> {
        let mut test = self.owned_test(admin_id, test_id).await?;

        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CenterError::Validation("Test name cannot be empty".into()));
            }
            if name != test.name {
                if let Some(existing) = self.tests.find_active_by_name(test.center_id, name).await? {
                    if existing.id != test.id {
                        return Err(CenterError::Conflict(
                            "A test with this name already exists in this center".into(),
                        ));
                    }
                }
                test.name = name.to_string();
            }
        }
        if let Some(category) = request.category {
            let category = category.trim();
            if category.is_empty() {
                return Err(CenterError::Validation("Test category cannot be empty".into()));
            }
            test.category = category.to_string();
        }
        if let Some(price) = request.price {
            validate_price(price)?;
            test.price = price;
        }
        if let Some(duration) = request.duration_minutes {
            validate_duration(duration)?;
            test.duration_minutes = duration;
        }
        if request.description.is_some() {
            test.description = request.description;
        }
        if request.preparation_instructions.is_some() {
            test.preparation_instructions = request.preparation_instructions;
        }
        if let Some(requirements) = request.requirements {
            test.requirements = requirements;
        }
        test.updated_at = Utc::now();

        let test = self.tests.update_test(&test).await?;
        info!(test_id = %test.id, "Diagnostic test updated");
        Ok(test)
    }

    /// Soft-delete one of the admin's tests
    ///
    /// # Errors
    ///
    /// `NotFound` when the test is not an active test of the admin's center.
    #[instrument(skip(self))]
    pub async fn delete_test(&self, admin_id: Uuid, test_id: Uuid) -> CenterResult<()> {
        let mut test = self.owned_test(admin_id, test_id).await?;
        test.is_active = false;
        test.updated_at = Utc::now();
        self.tests.update_test(&test).await?;
        info!(test_id = %test_id, "Diagnostic test deactivated");
        Ok(())
    }

    /// Look up a test, including inactive ones
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn find_test(&self, test_id: Uuid) -> CenterResult<Option<DiagnosticTest>> {
        self.tests.find_by_id(test_id).await
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn find_center(&self, center_id: Uuid) -> CenterResult<Option<DiagnosticCenter>> {
        self.centers.find_by_id(center_id).await
    }

    /// Summaries keyed by id, for joining into appointment listings
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn center_summaries(&self, ids: &[Uuid]) -> CenterResult<HashMap<Uuid, CenterSummary>> {
        Ok(self
            .centers
            .find_many(&dedup(ids))
            .await?
            .iter()
            .map(|center| (center.id, center.summary()))
            .collect())
    }

    /// # Errors
    ///
    /// Storage failures only.
    pub async fn test_summaries(&self, ids: &[Uuid]) -> CenterResult<HashMap<Uuid, TestSummary>> {
        Ok(self
            .tests
            .find_many(&dedup(ids))
            .await?
            .iter()
            .map(|test| (test.id, test.summary()))
            .collect())
    }

    async fn owned_test(&self, admin_id: Uuid, test_id: Uuid) -> CenterResult<DiagnosticTest> {
        let center = self.require_admin_center(admin_id).await?;
        self.tests
            .find_by_id(test_id)
            .await?
            .filter(|test| test.center_id == center.id && test.is_active)
            .ok_or_else(|| CenterError::NotFound(TEST_NOT_OWNED.into()))
    }
}

fn validate_price(price: Decimal) -> CenterResult<()> {
    if price <= Decimal::ZERO {
        return Err(CenterError::Validation("Price must be greater than zero".into()));
    }
    Ok(())
}

fn validate_duration(minutes: i32) -> CenterResult<()> {
    if minutes <= 0 {
        return Err(CenterError::Validation(
            "Duration must be greater than zero".into(),
        ));
    }
    Ok(())
}

fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryCenterRepository, InMemoryTestRepository};
    use auth_identity::{repository::InMemoryUserRepository, User};

    struct Fixture {
        service: CenterService,
        users: Arc<InMemoryUserRepository>,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserRepository::new());
        let service = CenterService::new(
            Arc::new(InMemoryCenterRepository::new()),
            Arc::new(InMemoryTestRepository::new()),
            users.clone(),
        );
        Fixture { service, users }
    }

    async fn seed_user(users: &InMemoryUserRepository, email: &str, role: Role) -> Uuid {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Center Admin".into(),
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
        user.id
    }

    fn center_request(admin_id: Uuid) -> CreateCenterRequest {
        CreateCenterRequest {
            name: "City Diagnostics".into(),
            address: Address {
                street: "12 Lake Road".into(),
                city: "Pune".into(),
                ..Default::default()
            },
            phone: "+91 20 5555 0101".into(),
            email: "front-desk@citydiag.example".into(),
            admin_id: Some(admin_id),
            ..Default::default()
        }
    }

    fn test_request(name: &str, price: i64) -> CreateTestRequest {
        CreateTestRequest {
            name: name.into(),
            category: "Blood".into(),
            price: Some(Decimal::new(price, 0)),
            duration_minutes: Some(30),
            ..Default::default()
        }
    }

    async fn center_with_admin(fx: &Fixture, email: &str) -> (Uuid, DiagnosticCenter) {
        let admin = seed_user(&fx.users, email, Role::DiagnosticCenterAdmin).await;
        let center = fx.service.create_center(center_request(admin)).await.unwrap();
        (admin, center)
    }

    #[tokio::test]
    async fn test_create_center_starts_unrated() {
        let fx = fixture();
        let (admin, center) = center_with_admin(&fx, "admin@citydiag.example").await;
        assert_eq!(center.admin_id, admin);
        assert!(center.rating.abs() < f64::EPSILON);
        assert_eq!(center.total_reviews, 0);

        let listed = fx.service.list_centers().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_center_admin_role_required() {
        let fx = fixture();
        let patient = seed_user(&fx.users, "patient@example.com", Role::Patient).await;
        assert!(matches!(
            fx.service.create_center(center_request(patient)).await,
            Err(CenterError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_owns_one_center() {
        let fx = fixture();
        let (admin, _) = center_with_admin(&fx, "admin@citydiag.example").await;
        assert!(matches!(
            fx.service.create_center(center_request(admin)).await,
            Err(CenterError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_without_center_is_forbidden() {
        let fx = fixture();
        let admin = seed_user(&fx.users, "lonely@example.com", Role::DiagnosticCenterAdmin).await;
        assert!(matches!(
            fx.service.add_test(admin, test_request("CBC", 500)).await,
            Err(CenterError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_active_name_conflicts() {
        let fx = fixture();
        let (admin, center) = center_with_admin(&fx, "admin@citydiag.example").await;
        fx.service.add_test(admin, test_request("Lipid Panel", 900)).await.unwrap();

        assert!(matches!(
            fx.service.add_test(admin, test_request("  Lipid Panel ", 950)).await,
            Err(CenterError::Conflict(_))
        ));
        assert_eq!(fx.service.count_tests(center.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_soft_deleted_name_can_be_reused() {
        let fx = fixture();
        let (admin, center) = center_with_admin(&fx, "admin@citydiag.example").await;
        let test = fx.service.add_test(admin, test_request("Thyroid", 600)).await.unwrap();

        fx.service.delete_test(admin, test.id).await.unwrap();
        assert!(fx.service.list_tests(center.id).await.unwrap().is_empty());

        // The old row survives for appointment history
        let old = fx.service.find_test(test.id).await.unwrap().unwrap();
        assert!(!old.is_active);

        fx.service.add_test(admin, test_request("Thyroid", 650)).await.unwrap();
        assert_eq!(fx.service.list_tests(center.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_required_fields_and_positive_values() {
        let fx = fixture();
        let (admin, _) = center_with_admin(&fx, "admin@citydiag.example").await;

        let mut missing = test_request("Glucose", 100);
        missing.price = None;
        assert!(matches!(
            fx.service.add_test(admin, missing).await,
            Err(CenterError::Validation(_))
        ));
        assert!(matches!(
            fx.service.add_test(admin, test_request("Glucose", 0)).await,
            Err(CenterError::Validation(_))
        ));
        let mut zero_duration = test_request("Glucose", 100);
        zero_duration.duration_minutes = Some(0);
        assert!(matches!(
            fx.service.add_test(admin, zero_duration).await,
            Err(CenterError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_other_centers_test_not_found() {
        let fx = fixture();
        let (owner, _) = center_with_admin(&fx, "owner@citydiag.example").await;
        let (intruder, _) = center_with_admin(&fx, "intruder@otherlab.example").await;
        let test = fx.service.add_test(owner, test_request("MRI", 4000)).await.unwrap();

        let update = UpdateTestRequest {
            price: Some(Decimal::new(1, 0)),
            ..Default::default()
        };
        let err = fx.service.update_test(intruder, test.id, update).await.unwrap_err();
        assert!(matches!(err, CenterError::NotFound(ref msg) if msg == TEST_NOT_OWNED));
        assert!(matches!(
            fx.service.delete_test(intruder, test.id).await,
            Err(CenterError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_changes_price_and_rejects_rename_collision() {
        let fx = fixture();
        let (admin, _) = center_with_admin(&fx, "admin@citydiag.example").await;
        let cbc = fx.service.add_test(admin, test_request("CBC", 500)).await.unwrap();
        fx.service.add_test(admin, test_request("ESR", 200)).await.unwrap();

        let updated = fx
            .service
            .update_test(
                admin,
                cbc.id,
                UpdateTestRequest {
                    price: Some(Decimal::new(700, 0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, Decimal::new(700, 0));

        let rename = UpdateTestRequest {
            name: Some("ESR".into()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.update_test(admin, cbc.id, rename).await,
            Err(CenterError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_summaries_skip_unknown_ids() {
        let fx = fixture();
        let (admin, center) = center_with_admin(&fx, "admin@citydiag.example").await;
        let test = fx.service.add_test(admin, test_request("CBC", 500)).await.unwrap();

        let centers = fx
            .service
            .center_summaries(&[center.id, center.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[&center.id].name, "City Diagnostics");

        let tests = fx.service.test_summaries(&[test.id]).await.unwrap();
        assert_eq!(tests[&test.id].price, Decimal::new(500, 0));
    }
}
