//! Tenant-scoped notification templates and placeholder substitution.

mod substitution;
mod types;

pub use substitution::substitute;
pub use types::{CreateTemplateRequest, NotificationTemplate, TemplateError, TemplateUpdate};
