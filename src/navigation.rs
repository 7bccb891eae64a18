use tracing::info;

/// Receives the redirect issued when the session cannot be recovered.
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: &str);
}

/// Default navigator for headless use: records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn redirect(&self, route: &str) {
        info!(route, "navigation.redirect");
    }
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, route: &str) {
        self(route)
    }
}
