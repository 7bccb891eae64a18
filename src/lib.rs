//! Session-aware REST client.
//!
//! Credentials travel in server-managed cookies. When a request comes back
//! 401 the client runs a single refresh call, parks concurrent callers until
//! it settles, and replays each request once.

mod client;
pub mod clock;
pub mod config;
pub mod errors;
pub mod navigation;
pub mod request;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use config::Config;
pub use errors::{Error, RefreshFailure, TransportFailure, TransportFailureKind};
pub use request::{FormPart, MultipartForm, OutboundRequest, RequestBody};
pub use session::{LogoutOutcome, SessionState};
pub use transport::{Response, Transport};
pub use types::Listing;
