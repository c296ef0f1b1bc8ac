// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, client, dashboard, export, reports, students, test_records},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Headroom on top of the upload limit for the other multipart fields.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Assembles the main application router.
///
/// * Public: `/token`, student validation and the client trio.
/// * Everything else sits behind the JWT middleware.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let upload_limit = state.config.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES;

    let public_routes = Router::new()
        .route("/token", post(auth::login))
        .route("/api/students/validate", post(students::validate_student))
        .route("/api/client/validate-student", post(client::validate_student))
        .route(
            "/api/client/upload-test-data",
            post(client::upload_test_data).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/client/test-status/{student_id}", get(client::test_status));

    let student_routes = Router::new()
        .route(
            "/api/students",
            get(students::list_students).post(students::create_student),
        )
        .route("/api/students/batch-delete", post(students::batch_delete_students))
        .route("/api/students/batch-query", post(students::batch_query_students))
        .route(
            "/api/students/batch-import",
            post(students::batch_import_students).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/students/info/{student_id}", get(students::get_student))
        .route(
            "/api/students/{student_id}",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        );

    let record_routes = Router::new()
        .route("/test-data/upload", post(test_records::upload_test_data))
        .route("/test-data/records", get(test_records::list_records))
        .route(
            "/test-data/records/{id}",
            get(test_records::get_record).delete(test_records::delete_record),
        )
        .route(
            "/api/test-records/batch-delete",
            post(test_records::batch_delete_records),
        )
        .route(
            "/api/test-records/status/{student_id}",
            get(test_records::student_status),
        )
        .route("/api/test-records/batch-status", get(test_records::batch_status))
        .route("/api/test-records/{id}/status", put(test_records::update_status))
        .route(
            "/api/test-records/batch-generate-reports",
            post(test_records::batch_generate_reports),
        );

    let report_routes = Router::new()
        .route("/{student_id}", get(reports::get_report))
        .route("/{student_id}/download", get(reports::download_report));

    let dashboard_routes = Router::new()
        .route("/stats", get(dashboard::get_stats))
        .route("/trend", get(dashboard::get_trend))
        .route("/score-stats", get(dashboard::get_score_stats))
        .route("/class-distribution", get(dashboard::get_class_distribution));

    let export_routes = Router::new()
        .route("/students", get(export::export_students))
        .route("/test-records", get(export::export_test_records))
        .route("/dashboard-stats", get(export::export_dashboard_stats));

    let protected_routes = Router::new()
        .route("/users/me", get(auth::me))
        .nest("/api/reports", report_routes)
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/export", export_routes)
        .merge(student_routes)
        .merge(record_routes)
        // Only matched routes are guarded; unknown paths still 404.
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
