//! Request middleware: correlation ids, caller context and bearer authentication.

mod auth;
mod context;

pub use auth::{AuthLayer, gateway_context};
pub use context::{Ctx, service_context};

pub(crate) use context::{current_request_id, scoped};
