//! Request multiplexer: `(method, path pattern)` → handler.
//!
//! Patterns are anchored regular expressions compiled once at startup.
//! Named capture groups land in the parameter map under their name;
//! unnamed groups get synthetic names `$0, $1, …` by subgroup position.
//! Patterns are expected to be disjoint: the first match wins, and
//! nothing may depend on table order for semantics.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use axum::http::Method;
use regex::Regex;

use beacon_common::{BeaconError, BeaconResult};

use crate::render::HandlerReply;
use crate::context::RequestContext;

/// Captured path parameters.
pub type Params = HashMap<String, String>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerReply> + Send + 'static>>;

/// Route handlers are plain functions from a request context to a reply.
pub type Handler = fn(RequestContext) -> HandlerFuture;

struct Route {
    method: Method,
    pattern: Regex,
    handler: Handler,
}

/// The compiled route set.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable::default()
    }

    /// Register a handler under a method and an anchored path pattern.
    pub fn route(mut self, method: Method, pattern: &str, handler: Handler) -> BeaconResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|error| BeaconError::Server(format!("invalid route pattern: {error}")))?;

        self.routes.push(Route {
            method,
            pattern,
            handler,
        });

        Ok(self)
    }

    /// Find the first route matching the request, extracting parameters.
    pub fn match_request(&self, method: &Method, path: &str) -> Option<(Handler, Params)> {
        for route in &self.routes {
            if route.method != *method {
                continue;
            }

            let Some(captures) = route.pattern.captures(path) else {
                continue;
            };

            let mut params = Params::new();

            for (index, name) in route.pattern.capture_names().enumerate().skip(1) {
                let Some(value) = captures.get(index) else {
                    continue;
                };

                let key = match name {
                    Some(name) => name.to_string(),
                    None => format!("${}", index - 1),
                };

                params.insert(key, value.as_str().to_string());
            }

            return Some((route.handler, params));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Rendered;

    fn first(ctx: RequestContext) -> HandlerFuture {
        Box::pin(async move {
            let _ = ctx;
            Rendered::empty().into()
        })
    }

    fn second(ctx: RequestContext) -> HandlerFuture {
        Box::pin(async move {
            let _ = ctx;
            Rendered::empty().into()
        })
    }

    fn table() -> RouteTable {
        RouteTable::new()
            .route(Method::GET, r"^/devices$", first)
            .unwrap()
            .route(
                Method::GET,
                r"^/devices/(?P<uuid>[\d\w-]+)/(?P<color>red|blue|green|off|rand|[0-9a-f]{6})$",
                second,
            )
            .unwrap()
            .route(Method::GET, r"^/anon/(\w+)/(?P<tail>\w+)$", second)
            .unwrap()
    }

    #[test]
    fn matches_on_method_and_pattern() {
        let table = table();

        assert!(table.match_request(&Method::GET, "/devices").is_some());
        assert!(table.match_request(&Method::POST, "/devices").is_none());
        assert!(table.match_request(&Method::GET, "/devices/extra").is_none());
        assert!(table.match_request(&Method::GET, "/missing").is_none());
    }

    #[test]
    fn named_groups_become_params() {
        let table = table();

        let (_, params) = table
            .match_request(&Method::GET, "/devices/abc-123/red")
            .unwrap();

        assert_eq!(params.get("uuid").map(String::as_str), Some("abc-123"));
        assert_eq!(params.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn unnamed_groups_get_positional_names() {
        let table = table();

        let (_, params) = table.match_request(&Method::GET, "/anon/left/right").unwrap();

        assert_eq!(params.get("$0").map(String::as_str), Some("left"));
        assert_eq!(params.get("tail").map(String::as_str), Some("right"));
    }

    #[test]
    fn hex_colors_satisfy_the_shorthand_pattern() {
        let table = table();

        let (_, params) = table
            .match_request(&Method::GET, "/devices/d1/0a1b2c")
            .unwrap();
        assert_eq!(params.get("color").map(String::as_str), Some("0a1b2c"));

        assert!(table.match_request(&Method::GET, "/devices/d1/0a1b2").is_none());
        assert!(table
            .match_request(&Method::GET, "/devices/d1/purple")
            .is_none());
    }
}
