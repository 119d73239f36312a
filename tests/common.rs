use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use httptest::{matchers::request, responders::json_encoded, Expectation, Server};
use serde_json::{json, Value};

use flaglite::{models::FlagLiteOptions, Client, FetchError};

pub const FLAGS_PATH: &str = "/api/flags/abc";

pub fn beta_flags() -> Value {
    json!([
        {"key": "beta-ui", "value": {"type": "boolean", "boolean": true}},
        {"key": "rollout", "value": {"type": "percentage", "percentage": 25}},
    ])
}

pub fn expect_fetch_flags(server: &Server, body: Value) {
    server.expect(
        Expectation::matching(request::method_path("GET", FLAGS_PATH))
            .times(..)
            .respond_with(json_encoded(body)),
    );
}

/// Options pointing at `server`, with polling disabled.
pub fn options(server: &Server) -> FlagLiteOptions {
    FlagLiteOptions {
        api_url: Some(format!("http://{}/api/", server.addr())),
        ..FlagLiteOptions::polling_disabled("abc", "api_key")
    }
}

pub fn polling_options(server: &Server, interval: Duration) -> FlagLiteOptions {
    FlagLiteOptions {
        refresh_interval: Some(interval),
        ..options(server)
    }
}

/// Records the status of every error reported through `on_error`.
#[derive(Clone, Default)]
pub struct ErrorLog(Arc<Mutex<Vec<Option<u16>>>>);

impl ErrorLog {
    pub fn attach(&self, options: FlagLiteOptions) -> FlagLiteOptions {
        let log = self.0.clone();
        options.with_on_error(move |e: &FetchError| {
            log.lock().expect("lock").push(e.status());
        })
    }

    pub fn statuses(&self) -> Vec<Option<u16>> {
        self.0.lock().expect("lock").clone()
    }
}

pub async fn create_client(server: &Server) -> Arc<Client> {
    expect_fetch_flags(server, beta_flags());
    let client = Client::new(options(server)).expect("should be able to create flaglite client");
    client.ready().await;
    client
}
