mod coordinator;
mod policy;
mod state;

pub use coordinator::{AuthEndpoints, LogoutOutcome, SessionCoordinator};
pub use policy::RefreshPolicy;
pub use state::SessionState;
