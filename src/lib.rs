// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod metrics;

// Domain layer (business logic)
pub mod channel;
pub mod notification;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod template;

// Application layer
pub mod api;
pub mod server;
pub mod worker;
