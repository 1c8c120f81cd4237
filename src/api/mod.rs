pub mod health;
pub mod metrics;
pub mod notifications;
pub mod routes;
pub mod templates;
pub mod webhooks;

pub use routes::api_routes;
