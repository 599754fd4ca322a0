//! Uniform JSON response envelope.
//!
//! Every rendered response is
//! `{"status", "meta": {"time", "version", …}, "errors": [code, …], "results"}`
//! with status 200 on an empty error list and 400 otherwise. Handlers can
//! instead ask for a redirect (307 + `Location`) or hand back a response
//! they already built (websocket upgrades).

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use beacon_common::BeaconError;

/// A renderable handler outcome.
pub struct Rendered {
    pub errors: Vec<BeaconError>,
    pub results: Value,
    pub meta: Map<String, Value>,
}

impl Rendered {
    /// Success with `null` results.
    pub fn empty() -> Self {
        Rendered {
            errors: Vec::new(),
            results: Value::Null,
            meta: Map::new(),
        }
    }

    /// Success carrying serializable results.
    pub fn results<T: Serialize>(results: T) -> Self {
        match serde_json::to_value(results) {
            Ok(value) => Rendered {
                errors: Vec::new(),
                results: value,
                meta: Map::new(),
            },
            Err(error) => Rendered::error(BeaconError::Server(error.to_string())),
        }
    }

    /// A terminal error; only its code reaches the client.
    pub fn error(error: BeaconError) -> Self {
        Rendered {
            errors: vec![error],
            results: Value::Null,
            meta: Map::new(),
        }
    }

    /// Attach extra metadata merged into the envelope's `meta` object.
    pub fn with_meta<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.meta.insert(key.to_string(), value);
        }

        self
    }
}

/// What a route handler returns.
pub enum HandlerReply {
    Render(Rendered),
    Redirect(String),
    /// The handler already produced a response (e.g. a websocket upgrade);
    /// the renderer steps aside.
    Stream(Response),
}

impl From<Rendered> for HandlerReply {
    fn from(rendered: Rendered) -> Self {
        HandlerReply::Render(rendered)
    }
}

impl From<BeaconError> for HandlerReply {
    fn from(error: BeaconError) -> Self {
        HandlerReply::Render(Rendered::error(error))
    }
}

#[derive(Serialize)]
struct Envelope {
    status: &'static str,
    meta: Map<String, Value>,
    errors: Vec<String>,
    results: Value,
}

/// Turn a handler reply into the HTTP response.
pub fn render(reply: HandlerReply, version: &str) -> Response {
    let rendered = match reply {
        HandlerReply::Render(rendered) => rendered,
        HandlerReply::Redirect(location) => {
            return (
                StatusCode::TEMPORARY_REDIRECT,
                [(header::LOCATION, location)],
            )
                .into_response();
        }
        HandlerReply::Stream(response) => return response,
    };

    let mut meta = Map::new();
    meta.insert(
        "time".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    meta.insert("version".to_string(), Value::String(version.to_string()));
    meta.extend(rendered.meta);

    let status = if rendered.errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    let envelope = Envelope {
        status: if rendered.errors.is_empty() {
            "SUCCESS"
        } else {
            "ERRORED"
        },
        meta,
        errors: rendered
            .errors
            .iter()
            .map(|error| error.code().to_string())
            .collect(),
        results: rendered.results,
    };

    (status, Json(envelope)).into_response()
}
