//! Route table mapping request paths to handlers.
//!
//! Paths match exactly. The literal [`ECHO_ROUTE`] entry is the single exception:
//! it serves any path under `/echo/` that has no exact entry of its own.
//! Unmatched paths get `404 Not Found` with an empty body.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tidal_http::handler::{BoxError, Handler};
use tidal_http::protocol::{HttpRequest, HttpResponse};
use tracing::debug;

pub const ECHO_ROUTE: &str = "/echo/*";

const ECHO_PREFIX: &str = "/echo/";

/// Immutable after [`RouterBuilder::build`]; connections share it read-only.
pub struct Router {
    routes: HashMap<String, Box<dyn Handler>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn at(&self, path: &str) -> Option<&dyn Handler> {
        let handler = match self.routes.get(path) {
            Some(handler) => Some(handler),
            None if path.starts_with(ECHO_PREFIX) => self.routes.get(ECHO_ROUTE),
            None => None,
        };

        handler.map(|handler| &**handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths = self.routes.keys().collect::<Vec<_>>();
        paths.sort();
        f.debug_struct("Router").field("routes", &paths).finish()
    }
}

#[async_trait]
impl Handler for Router {
    async fn call(&self, req: HttpRequest) -> Result<HttpResponse, BoxError> {
        match self.at(req.path()) {
            Some(handler) => handler.call(req).await,
            None => {
                debug!(path = req.path(), "no route matched");
                Ok(HttpResponse::not_found())
            }
        }
    }
}

pub struct RouterBuilder {
    routes: HashMap<String, Box<dyn Handler>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `handler` for `path`, replacing any earlier registration.
    #[must_use]
    pub fn route(mut self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.routes.insert(path.into(), Box::new(handler));
        self
    }

    pub fn build(self) -> Router {
        Router { routes: self.routes }
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("routes", &self.routes.len()).finish()
    }
}
