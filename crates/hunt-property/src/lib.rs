//! Hunt Property marketplace backend: listings, accounts, OTP sign-in and the
//! supporting CRUD collections, exposed as axum routers over a document store.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod otp;
pub mod store;
pub mod telemetry;

pub use api::{api_router, AppContext, Stores};
pub use config::{AppConfig, AppEnvironment, ConfigError};
pub use error::{ApiError, AppError};
