//! Notification domain: core types and the submission dispatcher.

pub mod dispatcher;
pub mod types;

pub use dispatcher::{DispatchError, Dispatcher, DEFAULT_TENANT};
pub use types::{
    BulkSubmitRequest, BulkSubmitResponse, Channel, NotificationJob, NotificationRecord,
    NotificationStatus, Priority, SubmitRequest,
};
