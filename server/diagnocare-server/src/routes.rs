pub mod paths;

use crate::{
    handlers::{appointments, auth, center_admin, centers, health, reviews},
    server::DiagnoCareServer,
};
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn health_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::READY, get(health::readiness_check))
}

pub fn auth_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .route(paths::auth::REGISTER, post(auth::register))
        .route(
            paths::auth::VERIFY_REGISTRATION_OTP,
            post(auth::verify_registration_otp),
        )
        .route(paths::auth::FORGOT_PASSWORD, post(auth::forgot_password))
        .route(paths::auth::RESET_PASSWORD, post(auth::reset_password))
        .route(paths::auth::LOGIN, post(auth::login))
        .route(paths::auth::PROFILE, get(auth::profile))
}

pub fn center_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .route(
            paths::centers::CENTERS,
            get(centers::list_centers).post(centers::create_center),
        )
        .route(paths::centers::CENTER_BY_ID, get(centers::get_center))
        .route(paths::centers::CENTER_TESTS, get(centers::list_center_tests))
}

pub fn center_admin_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .route(paths::center_admin::DASHBOARD, get(center_admin::dashboard))
        .route(
            paths::center_admin::TESTS,
            get(center_admin::list_tests).post(center_admin::add_test),
        )
        .route(
            paths::center_admin::TEST_BY_ID,
            put(center_admin::update_test).delete(center_admin::delete_test),
        )
}

pub fn appointment_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .route(
            paths::appointments::APPOINTMENTS,
            post(appointments::create_appointment),
        )
        .route(
            paths::appointments::MY_APPOINTMENTS,
            get(appointments::my_appointments),
        )
        .route(paths::appointments::MY_RESULTS, get(appointments::my_results))
        .route(
            paths::appointments::CENTER,
            get(appointments::own_center_appointments),
        )
        .route(
            paths::appointments::CENTER_BY_ID,
            get(appointments::center_appointments_by_id),
        )
        .route(
            paths::appointments::BY_ID,
            put(appointments::patient_update).delete(appointments::patient_delete),
        )
        .route(paths::appointments::STATUS, put(appointments::update_status))
        .route(paths::appointments::RESULTS, post(appointments::upload_results))
}

pub fn review_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .route(paths::reviews::REVIEWS, post(reviews::create_review))
        .route(
            paths::reviews::BY_ID,
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route(paths::reviews::CENTER, get(reviews::center_reviews))
        .route(paths::reviews::ADMIN_ALL, get(reviews::all_reviews))
        .route(paths::reviews::ADMIN_RECONCILE, post(reviews::reconcile))
}

/// Every versioned API route, to be nested under [`paths::API_V1`]
pub fn api_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .merge(auth_routes())
        .merge(center_routes())
        .merge(center_admin_routes())
        .merge(appointment_routes())
        .merge(review_routes())
}

pub fn create_routes() -> Router<DiagnoCareServer> {
    Router::new()
        .merge(health_routes())
        .nest(paths::API_V1, api_routes())
}
