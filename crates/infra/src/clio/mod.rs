//! Clio integration
//!
//! Everything that talks to the Clio API lives here: OAuth token
//! management, the paced and retried HTTP client, typed payload
//! envelopes and error classification.

pub mod auth;
pub mod client;
pub mod errors;
pub mod throttle;

mod types;

pub use auth::{NoopTokenListener, TokenManager, TokenSet, TokenUpdateListener};
pub use client::{ClioClient, ClioClientBuilder};
pub use errors::{ClioError, ClioErrorCategory};
pub use throttle::RequestPacer;
