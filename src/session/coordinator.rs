use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use jiff::Timestamp;
use reqwest::StatusCode;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::errors::{Error, RefreshFailure};
use crate::navigation::Navigator;
use crate::request::OutboundRequest;
use crate::telemetry::refresh::{RefreshOutcome, RefreshTelemetry};
use crate::transport::Transport;

use super::{RefreshPolicy, SessionState};

/// Paths of the backend's session endpoints.
#[derive(Clone, Debug)]
pub struct AuthEndpoints {
    pub refresh: String,
    pub verify: String,
    pub logout: String,
}

impl AuthEndpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            refresh: config.refresh_path.clone(),
            verify: config.verify_path.clone(),
            logout: config.logout_path.clone(),
        }
    }

    /// Requests whose 401 must never start a refresh.
    pub fn is_refresh_or_verify(&self, request: &OutboundRequest) -> bool {
        request.targets(&self.refresh) || request.targets(&self.verify)
    }
}

/// Result of [`SessionCoordinator::logout`]. Local state is cleared either way.
#[derive(Debug)]
pub enum LogoutOutcome {
    ServerInvalidated,
    LocalOnly(Error),
}

impl LogoutOutcome {
    pub fn server_invalidated(&self) -> bool {
        matches!(self, LogoutOutcome::ServerInvalidated)
    }
}

type Waiter = oneshot::Sender<Result<(), RefreshFailure>>;

#[derive(Default)]
struct FlightState {
    refreshing: bool,
    pending: VecDeque<Waiter>,
    last_attempt: Option<tokio::time::Instant>,
}

#[derive(Clone, Copy, Debug)]
enum Trigger {
    /// A request came back 401.
    Interceptor,
    /// `refresh_tokens()` called by the application.
    Direct,
}

impl Trigger {
    fn context(self) -> &'static str {
        match self {
            Trigger::Interceptor => "interceptor",
            Trigger::Direct => "direct",
        }
    }
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<Result<(), RefreshFailure>>, usize),
    Throttled(Duration),
}

/// Owns session state and guarantees at most one refresh call in flight.
///
/// Callers that hit a 401 while a refresh is running are parked on a oneshot
/// channel and released, in arrival order, when the refresh settles. The
/// `refreshing` check-and-set runs under a single mutex section with no
/// suspension point, so two callers can never both become leader.
pub struct SessionCoordinator {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    endpoints: AuthEndpoints,
    policy: RefreshPolicy,
    login_route: String,
    queue_wait: Duration,
    verbose: bool,
    flight: Mutex<FlightState>,
    session: RwLock<SessionState>,
}

impl SessionCoordinator {
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        Ok(Self {
            transport,
            clock,
            navigator,
            endpoints: AuthEndpoints::from_config(config),
            policy: RefreshPolicy::from_check_interval(config.token_refresh_interval())?,
            login_route: config.login_route.clone(),
            queue_wait: config.queue_wait_timeout(),
            verbose: config.debug_auth,
            flight: Mutex::new(FlightState::default()),
            session: RwLock::new(SessionState::default()),
        })
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.endpoints
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    pub fn session(&self) -> SessionState {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock_flight().refreshing
    }

    pub fn pending(&self) -> usize {
        self.lock_flight().pending.len()
    }

    pub fn mark_established(&self) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = SessionState::established(Timestamp::now());
    }

    pub fn clear_session(&self) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        *session = SessionState::cleared();
    }

    /// Terminal auth failure: forget the session and send the user to login.
    pub fn expire_session(&self) {
        warn!(route = %self.login_route, "session.expired");
        self.clear_session();
        self.navigator.redirect(&self.login_route);
    }

    /// Recovers from a 401 on an ordinary request.
    ///
    /// Either leads a refresh or waits for the one already in flight. On
    /// failure the session is expired before the error is returned.
    pub async fn recover(&self) -> Result<(), Error> {
        self.run(Trigger::Interceptor).await
    }

    /// Starts a refresh on demand, refusing it inside the throttle window.
    pub async fn refresh(&self) -> Result<(), Error> {
        self.run(Trigger::Direct).await
    }

    /// Asks the backend whether the session cookies are still valid.
    pub async fn verify(&self) -> bool {
        let mut req = OutboundRequest::post(self.endpoints.verify.clone());
        req.intercept();
        match self.transport.send(&req).await {
            Ok(resp) if resp.status() == StatusCode::OK => {
                self.mark_established();
                if self.verbose {
                    info!("session.verified");
                }
                true
            }
            Ok(resp) => {
                info!(status = %resp.status(), "session.verify_rejected");
                false
            }
            Err(failure) => {
                warn!(error = %failure, "session.verify_unreachable");
                false
            }
        }
    }

    pub async fn logout(&self) -> LogoutOutcome {
        let mut req = OutboundRequest::post(self.endpoints.logout.clone());
        req.intercept();
        let outcome = match self.transport.send(&req).await {
            Ok(resp) if resp.status().is_success() => LogoutOutcome::ServerInvalidated,
            Ok(resp) => {
                warn!(status = %resp.status(), "session.logout_rejected");
                LogoutOutcome::LocalOnly(Error::from_response(resp))
            }
            Err(failure) => {
                warn!(error = %failure, "session.logout_unreachable");
                LogoutOutcome::LocalOnly(Error::Transport(failure))
            }
        };
        info!(
            server_invalidated = outcome.server_invalidated(),
            "session.logout"
        );
        self.clear_session();
        self.navigator.redirect(&self.login_route);
        outcome
    }

    async fn run(&self, trigger: Trigger) -> Result<(), Error> {
        let telemetry = RefreshTelemetry::new(trigger.context(), self.verbose);
        match self.claim(trigger) {
            Role::Throttled(retry_after) => {
                telemetry.emit_throttled(retry_after);
                Err(Error::RefreshThrottled { retry_after })
            }
            Role::Follower(rx, position) => {
                telemetry.emit_queued(position);
                self.wait(rx).await
            }
            Role::Leader => self.lead(trigger, &telemetry).await,
        }
    }

    fn claim(&self, trigger: Trigger) -> Role {
        let now = self.clock.now();
        let mut flight = self.lock_flight();
        if let Trigger::Direct = trigger {
            if let Err(retry_after) = self.policy.admit(flight.last_attempt, now) {
                return Role::Throttled(retry_after);
            }
        }
        if flight.refreshing {
            let (tx, rx) = oneshot::channel();
            flight.pending.push_back(tx);
            return Role::Follower(rx, flight.pending.len());
        }
        flight.refreshing = true;
        flight.last_attempt = Some(now);
        Role::Leader
    }

    async fn wait(&self, rx: oneshot::Receiver<Result<(), RefreshFailure>>) -> Result<(), Error> {
        match tokio::time::timeout(self.queue_wait, rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(failure))) => Err(Error::RefreshFailed(failure)),
            Ok(Err(_)) => Err(Error::RefreshFailed(RefreshFailure::abandoned())),
            Err(_) => {
                warn!(
                    waited_ms = self.queue_wait.as_millis() as u64,
                    "refresh.queue_timeout"
                );
                Err(Error::QueueTimeout(self.queue_wait))
            }
        }
    }

    async fn lead(&self, trigger: Trigger, telemetry: &RefreshTelemetry) -> Result<(), Error> {
        let flight = Flight {
            coordinator: self,
            telemetry,
            settled: false,
        };
        telemetry.emit_start();
        let outcome = self.call_refresh().await;
        if outcome.is_ok() {
            self.mark_established();
        }
        let released = flight.settle(outcome.clone());
        match outcome {
            Ok(()) => {
                telemetry.emit_success(released);
                Ok(())
            }
            Err(failure) => {
                telemetry.emit_failure(&failure, RefreshOutcome::Rejected, released);
                if matches!(trigger, Trigger::Interceptor) || released > 0 {
                    self.expire_session();
                }
                Err(Error::RefreshFailed(failure))
            }
        }
    }

    async fn call_refresh(&self) -> Result<(), RefreshFailure> {
        let mut req = OutboundRequest::post(self.endpoints.refresh.clone());
        req.intercept();
        match self.transport.send(&req).await {
            Ok(resp) if resp.status() == StatusCode::OK => Ok(()),
            Ok(resp) => Err(RefreshFailure::rejected(resp.status())),
            Err(failure) => Err(RefreshFailure::unreachable(&failure)),
        }
    }

    /// Leaves `REFRESHING` and settles every parked caller, oldest first.
    fn release(&self, outcome: Result<(), RefreshFailure>) -> usize {
        let waiters: Vec<Waiter> = {
            let mut flight = self.lock_flight();
            flight.refreshing = false;
            flight.pending.drain(..).collect()
        };
        let count = waiters.len();
        for waiter in waiters {
            // receiver gone means the caller was cancelled
            let _ = waiter.send(outcome.clone());
        }
        count
    }

    fn lock_flight(&self) -> MutexGuard<'_, FlightState> {
        self.flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Returns the coordinator to `IDLE` on every exit path of a leading refresh,
/// including cancellation and panic.
struct Flight<'a> {
    coordinator: &'a SessionCoordinator,
    telemetry: &'a RefreshTelemetry,
    settled: bool,
}

impl Flight<'_> {
    fn settle(mut self, outcome: Result<(), RefreshFailure>) -> usize {
        self.settled = true;
        self.coordinator.release(outcome)
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let failure = RefreshFailure::abandoned();
        let rejected = self.coordinator.release(Err(failure.clone()));
        self.telemetry
            .emit_failure(&failure, RefreshOutcome::Abandoned, rejected);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::header::HeaderMap;
    use tokio::sync::Notify;

    use super::*;
    use crate::clock::ManualClock;
    use crate::errors::{TransportFailure, TransportFailureKind};
    use crate::transport::Response;

    /// Refresh endpoint that blocks until released, then answers `status`.
    struct GatedRefresh {
        gate: Notify,
        status: StatusCode,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Transport for GatedRefresh {
        async fn send(&self, request: &OutboundRequest) -> Result<Response, TransportFailure> {
            if request.targets("/auth/refresh/") {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.gate.notified().await;
                return Ok(Response::new(self.status, HeaderMap::new(), Vec::new()));
            }
            Err(TransportFailure::new(
                TransportFailureKind::Other,
                "unexpected request",
            ))
        }
    }

    fn coordinator(
        status: StatusCode,
    ) -> (Arc<SessionCoordinator>, Arc<GatedRefresh>, Arc<Mutex<Vec<String>>>) {
        let transport = Arc::new(GatedRefresh {
            gate: Notify::new(),
            status,
            calls: AtomicUsize::new(0),
        });
        let redirects = Arc::new(Mutex::new(Vec::new()));
        let sink = redirects.clone();
        let navigator = move |route: &str| sink.lock().unwrap().push(route.to_string());
        let coordinator = SessionCoordinator::new(
            &Config::new("http://localhost"),
            transport.clone(),
            Arc::new(ManualClock::new()),
            Arc::new(navigator),
        )
        .unwrap();
        (Arc::new(coordinator), transport, redirects)
    }

    async fn settle_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never held");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn followers_wait_for_single_refresh() {
        let (coord, transport, _) = coordinator(StatusCode::OK);

        let leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.is_refreshing()).await;

        let followers: Vec<_> = (0..3)
            .map(|_| {
                let coord = coord.clone();
                tokio::spawn(async move { coord.recover().await })
            })
            .collect();
        settle_until(|| coord.pending() == 3).await;
        assert!(followers.iter().all(|f| !f.is_finished()));

        transport.gate.notify_one();
        leader.await.unwrap().unwrap();
        for f in followers {
            f.await.unwrap().unwrap();
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(!coord.is_refreshing());
        assert!(coord.session().has_access_token);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn followers_resume_in_arrival_order() {
        let (coord, transport, _) = coordinator(StatusCode::OK);
        let resumed = Arc::new(Mutex::new(Vec::new()));

        let leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.is_refreshing()).await;

        let mut followers = Vec::new();
        for idx in 0..3 {
            let handle = coord.clone();
            let resumed = resumed.clone();
            followers.push(tokio::spawn(async move {
                let outcome = handle.recover().await;
                resumed.lock().unwrap().push(idx);
                outcome
            }));
            settle_until(|| coord.pending() == idx + 1).await;
        }

        transport.gate.notify_one();
        leader.await.unwrap().unwrap();
        for f in followers {
            f.await.unwrap().unwrap();
        }
        assert_eq!(resumed.lock().unwrap().as_slice(), [0, 1, 2]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failed_refresh_rejects_followers_and_redirects() {
        let (coord, transport, redirects) = coordinator(StatusCode::UNAUTHORIZED);
        coord.mark_established();

        let leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.is_refreshing()).await;
        let follower = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.pending() == 1).await;

        transport.gate.notify_one();
        let lead_err = leader.await.unwrap().unwrap_err();
        let follow_err = follower.await.unwrap().unwrap_err();
        assert!(matches!(lead_err, Error::RefreshFailed(ref f) if f.status == Some(StatusCode::UNAUTHORIZED)));
        assert!(matches!(follow_err, Error::RefreshFailed(_)));
        assert_eq!(coord.session(), SessionState::cleared());
        assert_eq!(redirects.lock().unwrap().as_slice(), ["/login"]);
        assert!(!coord.is_refreshing());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelled_leader_returns_to_idle() {
        let (coord, transport, _) = coordinator(StatusCode::OK);

        let leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.is_refreshing()).await;
        let follower = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.pending() == 1).await;

        leader.abort();
        let err = follower.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::RefreshFailed(ref f) if f == &RefreshFailure::abandoned()));
        assert!(!coord.is_refreshing());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dropped_follower_does_not_disturb_queue() {
        let (coord, transport, _) = coordinator(StatusCode::OK);

        let leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.is_refreshing()).await;
        let dropped = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        let kept = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.pending() == 2).await;
        dropped.abort();

        transport.gate.notify_one();
        leader.await.unwrap().unwrap();
        kept.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn follower_gives_up_after_queue_wait() {
        let (coord, transport, _) = coordinator(StatusCode::OK);

        let _leader = tokio::spawn({
            let coord = coord.clone();
            async move { coord.recover().await }
        });
        settle_until(|| coord.is_refreshing()).await;

        let err = coord.recover().await.unwrap_err();
        assert!(matches!(err, Error::QueueTimeout(d) if d == Duration::from_millis(35_000)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
