pub mod api;
pub mod auth;
pub mod gateway;
pub mod rate_limiter;
pub mod retry;

pub use auth::{CredentialCoordinator, CredentialStore, Credentials};
pub use gateway::{Platform, TwitterGateway};
pub use rate_limiter::RateGovernor;
pub use retry::RetryPolicy;
