use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    ApiClient,
    clock::{Clock, SystemClock},
    config::Config,
    errors::Error,
    navigation::{LoggingNavigator, Navigator},
    request::{MultipartForm, OutboundRequest},
    session::{LogoutOutcome, SessionCoordinator, SessionState},
    transport::{ReqwestTransport, Response, Transport},
    types::Listing,
};

impl ApiClient {
    /// Create a client talking to `config.base_url` over a cookie-carrying
    /// reqwest transport. Redirects on session loss are only logged; use
    /// [`ApiClient::with_navigator`] to act on them.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::with_navigator(config, Arc::new(LoggingNavigator))
    }

    pub fn with_navigator(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self, Error> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_parts(config, transport, Arc::new(SystemClock), navigator)
    }

    /// Assemble a client from explicit collaborators.
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let coordinator = SessionCoordinator::new(&config, transport.clone(), clock, navigator)?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> SessionState {
        self.coordinator.session()
    }

    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    /// Send a request, refreshing the session and replaying once on a 401.
    pub async fn request(&self, mut request: OutboundRequest) -> Result<Response, Error> {
        let resp = self.dispatch(&mut request).await?;
        if resp.status() != StatusCode::UNAUTHORIZED
            || request.retried
            || self.coordinator.endpoints().is_refresh_or_verify(&request)
        {
            return self.finish(resp);
        }

        warn!(
            method = %request.method,
            path = %request.path,
            status = 401,
            "request.unauthorized"
        );
        request.retried = true;
        self.coordinator.recover().await?;
        debug!(method = %request.method, path = %request.path, "request.replay");
        let replay = self.dispatch(&mut request).await?;
        self.finish(replay)
    }

    pub async fn get(&self, path: &str) -> Result<Response, Error> {
        self.request(OutboundRequest::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, Error> {
        self.request(OutboundRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, Error> {
        self.request(OutboundRequest::put(path).json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, Error> {
        self.request(OutboundRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, Error> {
        self.request(OutboundRequest::delete(path)).await
    }

    /// POST a multipart form; the transport sets the boundary header.
    pub async fn upload(&self, path: &str, form: MultipartForm) -> Result<Response, Error> {
        self.request(OutboundRequest::post(path).multipart(form)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get(path).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(path, body).await?.json()
    }

    /// Fetch a collection that may come back paginated or as a bare array.
    pub async fn list<T: DeserializeOwned>(&self, request: OutboundRequest) -> Result<Listing<T>, Error> {
        self.request(request).await?.json()
    }

    /// `true` when the backend confirms the session; never errors.
    pub async fn check_auth_status(&self) -> bool {
        self.coordinator.verify().await
    }

    pub async fn refresh_tokens(&self) -> Result<(), Error> {
        self.coordinator.refresh().await
    }

    pub async fn logout(&self) -> LogoutOutcome {
        self.coordinator.logout().await
    }

    async fn dispatch(&self, request: &mut OutboundRequest) -> Result<Response, Error> {
        request.intercept();
        self.transport.send(request).await.map_err(|failure| {
            warn!(
                method = %request.method,
                path = %request.path,
                error = %failure,
                "request.transport_failure"
            );
            Error::Transport(failure)
        })
    }

    fn finish(&self, resp: Response) -> Result<Response, Error> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let err = Error::from_response(resp);
        if let Error::SessionExpired = err {
            self.coordinator.expire_session();
        }
        Err(err)
    }
}
