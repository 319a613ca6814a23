//! Bearer-token authentication at the gateway boundary

mod config;
mod context;
mod error;
mod validator;

pub use config::{AuthConfig, VerificationMode};
pub use context::{AuthContext, Identity};
pub use error::AuthError;
pub use validator::{BearerValidator, bearer_token};
