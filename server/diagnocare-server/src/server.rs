use appointment_service::{
    repository::{InMemoryAppointmentRepository, PostgresAppointmentRepository},
    AppointmentService, ReportUploader,
};
use auth_identity::{
    repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository},
    IdentityConfig, IdentityService,
};
use center_service::{
    repository::{
        CenterRepository, InMemoryCenterRepository, InMemoryTestRepository,
        PostgresCenterRepository, PostgresTestRepository, TestRepository,
    },
    CenterService,
};
use database_layer::DatabasePool;
use email_service::CodeSender;
use review_service::{
    store::{InMemoryReviewStore, PostgresReviewStore, ReviewStore},
    ReviewService,
};
use std::sync::Arc;
use std::time::Instant;

/// Shared state handed to every handler
///
/// Services are built once at startup; cloning the state only bumps
/// reference counts.
#[derive(Clone)]
pub struct DiagnoCareServer {
    pub identity: Arc<IdentityService>,
    pub centers: Arc<CenterService>,
    pub appointments: Arc<AppointmentService>,
    pub reviews: Arc<ReviewService>,
    /// Absent in in-memory mode
    pub database: Option<DatabasePool>,
    pub started_at: Instant,
}

/// Storage the services run on
struct Repositories {
    users: Arc<dyn UserRepository>,
    centers: Arc<dyn CenterRepository>,
    tests: Arc<dyn TestRepository>,
    appointments: Arc<dyn appointment_service::repository::AppointmentRepository>,
    reviews: Arc<dyn ReviewStore>,
}

impl DiagnoCareServer {
    /// Wire the services against PostgreSQL
    #[must_use]
    pub fn with_database(
        database: DatabasePool,
        sender: Arc<dyn CodeSender>,
        uploader: Arc<dyn ReportUploader>,
        identity_config: IdentityConfig,
    ) -> Self {
        let pool = database.pool().clone();
        let repositories = Repositories {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            centers: Arc::new(PostgresCenterRepository::new(pool.clone())),
            tests: Arc::new(PostgresTestRepository::new(pool.clone())),
            appointments: Arc::new(PostgresAppointmentRepository::new(pool.clone())),
            reviews: Arc::new(PostgresReviewStore::new(pool)),
        };
        Self::assemble(repositories, sender, uploader, identity_config, Some(database))
    }

    /// Wire the services against process-local storage
    #[must_use]
    pub fn in_memory(
        sender: Arc<dyn CodeSender>,
        uploader: Arc<dyn ReportUploader>,
        identity_config: IdentityConfig,
    ) -> Self {
        let centers: Arc<dyn CenterRepository> = Arc::new(InMemoryCenterRepository::new());
        let repositories = Repositories {
            users: Arc::new(InMemoryUserRepository::new()),
            centers: Arc::clone(&centers),
            tests: Arc::new(InMemoryTestRepository::new()),
            appointments: Arc::new(InMemoryAppointmentRepository::new()),
            reviews: Arc::new(InMemoryReviewStore::new(centers)),
        };
        Self::assemble(repositories, sender, uploader, identity_config, None)
    }

    fn assemble(
        repositories: Repositories,
        sender: Arc<dyn CodeSender>,
        uploader: Arc<dyn ReportUploader>,
        identity_config: IdentityConfig,
        database: Option<DatabasePool>,
    ) -> Self {
        let Repositories {
            users,
            centers,
            tests,
            appointments,
            reviews,
        } = repositories;

        let identity = Arc::new(IdentityService::new(
            Arc::clone(&users),
            sender,
            identity_config,
        ));
        let center_service = Arc::new(CenterService::new(centers, tests, Arc::clone(&users)));
        let appointment_service = Arc::new(AppointmentService::new(
            appointments,
            Arc::clone(&center_service),
            Arc::clone(&users),
            uploader,
        ));
        let review_service = Arc::new(ReviewService::new(
            reviews,
            Arc::clone(&appointment_service),
            Arc::clone(&center_service),
            users,
        ));

        Self {
            identity,
            centers: center_service,
            appointments: appointment_service,
            reviews: review_service,
            database,
            started_at: Instant::now(),
        }
    }

    /// Whether the backing store answers; always true in memory
    pub async fn is_ready(&self) -> bool {
        match &self.database {
            Some(database) => database.is_healthy().await,
            None => true,
        }
    }
}
