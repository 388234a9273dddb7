use crate::{error::*, models::*};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

mod postgres;

pub use postgres::{PostgresCenterRepository, PostgresTestRepository};

#[async_trait]
pub trait CenterRepository: Send + Sync {
    async fn create_center(&self, center: &DiagnosticCenter) -> CenterResult<DiagnosticCenter>;
    async fn find_by_id(&self, id: Uuid) -> CenterResult<Option<DiagnosticCenter>>;
    /// The center owned by a center-admin user
    async fn find_by_admin(&self, admin_id: Uuid) -> CenterResult<Option<DiagnosticCenter>>;
    async fn find_many(&self, ids: &[Uuid]) -> CenterResult<Vec<DiagnosticCenter>>;
    /// Active centers ordered by name
    async fn list_active(&self) -> CenterResult<Vec<DiagnosticCenter>>;
    async fn list_ids(&self) -> CenterResult<Vec<Uuid>>;
    /// Overwrite the derived rating columns
    async fn set_rating(&self, center_id: Uuid, summary: RatingSummary) -> CenterResult<()>;
}

#[async_trait]
pub trait TestRepository: Send + Sync {
    /// Insert a test. Fails with `Conflict` when an active test of the same
    /// center already has the name.
    async fn create_test(&self, test: &DiagnosticTest) -> CenterResult<DiagnosticTest>;
    async fn find_by_id(&self, id: Uuid) -> CenterResult<Option<DiagnosticTest>>;
    async fn find_active_by_name(
        &self,
        center_id: Uuid,
        name: &str,
    ) -> CenterResult<Option<DiagnosticTest>>;
    /// Active tests of a center ordered by name
    async fn list_active(&self, center_id: Uuid) -> CenterResult<Vec<DiagnosticTest>>;
    async fn count_active(&self, center_id: Uuid) -> CenterResult<i64>;
    async fn find_many(&self, ids: &[Uuid]) -> CenterResult<Vec<DiagnosticTest>>;
    async fn update_test(&self, test: &DiagnosticTest) -> CenterResult<DiagnosticTest>;
}

/// In-memory center repository for testing and development
pub struct InMemoryCenterRepository {
    centers: Arc<DashMap<Uuid, DiagnosticCenter>>,
}

impl InMemoryCenterRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            centers: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryCenterRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CenterRepository for InMemoryCenterRepository {
    async fn create_center(&self, center: &DiagnosticCenter) -> CenterResult<DiagnosticCenter> {
        if self
            .centers
            .iter()
            .any(|entry| entry.value().admin_id == center.admin_id)
        {
            return Err(CenterError::Conflict(
                "This admin already manages a diagnostic center".into(),
            ));
        }
        self.centers.insert(center.id, center.clone());
        Ok(center.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> CenterResult<Option<DiagnosticCenter>> {
        Ok(self.centers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> CenterResult<Option<DiagnosticCenter>> {
        Ok(self
            .centers
            .iter()
            .find(|entry| entry.value().admin_id == admin_id)
            .map(|entry| entry.value().clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> CenterResult<Vec<DiagnosticCenter>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.centers.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn list_active(&self) -> CenterResult<Vec<DiagnosticCenter>> {
        let mut centers: Vec<DiagnosticCenter> = self
            .centers
            .iter()
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.value().clone())
            .collect();
        centers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(centers)
    }

    async fn list_ids(&self) -> CenterResult<Vec<Uuid>> {
        Ok(self.centers.iter().map(|entry| *entry.key()).collect())
    }

    async fn set_rating(&self, center_id: Uuid, summary: RatingSummary) -> CenterResult<()> {
        let mut entry = self
            .centers
            .get_mut(&center_id)
            .ok_or_else(|| CenterError::NotFound("Diagnostic center not found".into()))?;
        entry.rating = summary.rating;
        entry.total_reviews = summary.total_reviews;
        entry.updated_at = chrono::Utc::now();
        Ok(())
    }
}

/// In-memory test repository for testing and development
pub struct InMemoryTestRepository {
    tests: Arc<DashMap<Uuid, DiagnosticTest>>,
    // Serializes the name check with the write
    write_lock: Mutex<()>,
}

impl InMemoryTestRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tests: Arc::new(DashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    fn name_taken(&self, test: &DiagnosticTest) -> bool {
        test.is_active
            && self.tests.iter().any(|entry| {
                let other = entry.value();
                other.id != test.id
                    && other.is_active
                    && other.center_id == test.center_id
                    && other.name == test.name
            })
    }
}

impl Default for InMemoryTestRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn duplicate_test_name() -> CenterError {
    CenterError::Conflict("A test with this name already exists in this center".into())
}

#[async_trait]
impl TestRepository for InMemoryTestRepository {
    async fn create_test(&self, test: &DiagnosticTest) -> CenterResult<DiagnosticTest> {
        let _guard = self.write_lock.lock().await;
        if self.name_taken(test) {
            return Err(duplicate_test_name());
        }
        self.tests.insert(test.id, test.clone());
        Ok(test.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> CenterResult<Option<DiagnosticTest>> {
        Ok(self.tests.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_active_by_name(
        &self,
        center_id: Uuid,
        name: &str,
    ) -> CenterResult<Option<DiagnosticTest>> {
        Ok(self
            .tests
            .iter()
            .find(|entry| {
                let test = entry.value();
                test.is_active && test.center_id == center_id && test.name == name
            })
            .map(|entry| entry.value().clone()))
    }

    async fn list_active(&self, center_id: Uuid) -> CenterResult<Vec<DiagnosticTest>> {
        let mut tests: Vec<DiagnosticTest> = self
            .tests
            .iter()
            .filter(|entry| entry.value().is_active && entry.value().center_id == center_id)
            .map(|entry| entry.value().clone())
            .collect();
        tests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tests)
    }

    async fn count_active(&self, center_id: Uuid) -> CenterResult<i64> {
        let count = self
            .tests
            .iter()
            .filter(|entry| entry.value().is_active && entry.value().center_id == center_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn find_many(&self, ids: &[Uuid]) -> CenterResult<Vec<DiagnosticTest>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tests.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn update_test(&self, test: &DiagnosticTest) -> CenterResult<DiagnosticTest> {
        let _guard = self.write_lock.lock().await;
        if !self.tests.contains_key(&test.id) {
            return Err(CenterError::NotFound("Test not found".into()));
        }
        if self.name_taken(test) {
            return Err(duplicate_test_name());
        }
        self.tests.insert(test.id, test.clone());
        Ok(test.clone())
    }
}
