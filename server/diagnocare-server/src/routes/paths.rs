//! Route path constants

pub const API_V1: &str = "/api/v1";

pub mod health {
    pub const HEALTH: &str = "/health";
    pub const READY: &str = "/health/ready";
}

/// Relative to [`super::API_V1`]
pub mod auth {
    pub const REGISTER: &str = "/auth/register";
    pub const VERIFY_REGISTRATION_OTP: &str = "/auth/verify-registration-otp";
    pub const FORGOT_PASSWORD: &str = "/auth/forgot-password";
    pub const RESET_PASSWORD: &str = "/auth/reset-password";
    pub const LOGIN: &str = "/auth/login";
    pub const PROFILE: &str = "/auth/profile";
}

/// Relative to [`super::API_V1`]
pub mod centers {
    pub const CENTERS: &str = "/centers";
    pub const CENTER_BY_ID: &str = "/centers/:id";
    pub const CENTER_TESTS: &str = "/centers/:id/tests";
}

/// Relative to [`super::API_V1`]
pub mod center_admin {
    pub const DASHBOARD: &str = "/center-admin/dashboard";
    pub const TESTS: &str = "/center-admin/tests";
    pub const TEST_BY_ID: &str = "/center-admin/tests/:id";
}

/// Relative to [`super::API_V1`]
pub mod appointments {
    pub const APPOINTMENTS: &str = "/appointments";
    pub const MY_APPOINTMENTS: &str = "/appointments/my-appointments";
    pub const MY_RESULTS: &str = "/appointments/my-results";
    pub const CENTER: &str = "/appointments/center";
    pub const CENTER_BY_ID: &str = "/appointments/center/:center_id";
    pub const BY_ID: &str = "/appointments/:id";
    pub const STATUS: &str = "/appointments/:id/status";
    pub const RESULTS: &str = "/appointments/:id/results";
}

/// Relative to [`super::API_V1`]
pub mod reviews {
    pub const REVIEWS: &str = "/reviews";
    pub const BY_ID: &str = "/reviews/:id";
    pub const CENTER: &str = "/reviews/center/:center_id";
    pub const ADMIN_ALL: &str = "/reviews/admin/all";
    pub const ADMIN_RECONCILE: &str = "/reviews/admin/reconcile";
}
