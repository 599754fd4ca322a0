//! Per-request context handed to route handlers.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{header, HeaderMap, Uri};
use serde::de::DeserializeOwned;

use beacon_common::{BeaconError, BeaconResult};

use crate::mux::Params;
use crate::AppState;

/// Everything a handler can see about one request: matched path
/// parameters, query string, headers, the collected body, and (for the
/// registration route) the pending websocket upgrade.
pub struct RequestContext {
    pub state: AppState,
    params: Params,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
    upgrade: Option<WebSocketUpgrade>,
}

impl RequestContext {
    pub fn new(
        state: AppState,
        params: Params,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
        upgrade: Option<WebSocketUpgrade>,
    ) -> Self {
        let query = uri
            .query()
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        RequestContext {
            state,
            params,
            query,
            headers,
            body,
            upgrade,
        }
    }

    /// A parameter captured by the matched route pattern.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A query-string value.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// A request header as UTF-8, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// The collected request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn read_json<T: DeserializeOwned>(&self) -> BeaconResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|error| BeaconError::InvalidRequest(error.to_string()))
    }

    /// Take the pending websocket upgrade, if this request asked for one.
    pub fn take_upgrade(&mut self) -> Option<WebSocketUpgrade> {
        self.upgrade.take()
    }
}
