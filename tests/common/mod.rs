#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use session_client::clock::ManualClock;
use session_client::navigation::Navigator;
use session_client::transport::ReqwestTransport;
use session_client::{ApiClient, Config};

pub struct Harness {
    pub client: ApiClient,
    pub clock: Arc<ManualClock>,
    pub redirects: Arc<Mutex<Vec<String>>>,
}

pub fn config(server_uri: &str) -> Config {
    Config::from_values(server_uri, Some(5_000), Some(120_000), None, false)
}

pub fn harness(server_uri: &str) -> Harness {
    harness_with(config(server_uri))
}

pub fn harness_with(cfg: Config) -> Harness {
    let transport = Arc::new(ReqwestTransport::new(&cfg).expect("transport"));
    let clock = Arc::new(ManualClock::new());
    let redirects = Arc::new(Mutex::new(Vec::new()));
    let sink = redirects.clone();
    let navigator: Arc<dyn Navigator> =
        Arc::new(move |route: &str| sink.lock().unwrap().push(route.to_string()));
    let client = ApiClient::with_parts(cfg, transport, clock.clone(), navigator).expect("client");
    Harness {
        client,
        clock,
        redirects,
    }
}

impl Harness {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}
