use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::server::AppState;

use super::health::health;
use super::metrics::prometheus_metrics;
use super::notifications::{
    get_notification, list_notifications, mark_notification_read, submit_bulk_notifications,
    submit_notification,
};
use super::templates::{
    create_template, delete_template, get_template, list_templates, update_template,
};
use super::webhooks::test_webhook;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api",
            Router::new()
                // Notifications
                .route("/notifications", post(submit_notification))
                .route("/notifications", get(list_notifications))
                .route("/notifications/bulk", post(submit_bulk_notifications))
                .route("/notifications/{id}", get(get_notification))
                .route("/notifications/{id}/read", put(mark_notification_read))
                // Templates
                .route("/templates", post(create_template))
                .route("/templates", get(list_templates))
                .route("/templates/{id}", get(get_template))
                .route("/templates/{id}", put(update_template))
                .route("/templates/{id}", delete(delete_template))
                // Webhook smoke test
                .route("/webhooks/test", post(test_webhook)),
        )
}
