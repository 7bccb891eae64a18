use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionCoordinator;
use crate::transport::Transport;

mod impls;

/// REST client that keeps the cookie session alive across 401s.
///
/// Cheap to clone; clones share one transport, one cookie jar and one
/// [`SessionCoordinator`].
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    coordinator: Arc<SessionCoordinator>,
}
