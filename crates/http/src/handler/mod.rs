//! Request handlers for connections still speaking HTTP.
//!
//! A [`Handler`] turns one complete [`HttpRequest`] into one [`HttpResponse`].
//! Errors are not sent to the peer as-is: the connection logs them and replies
//! `500 Internal Server Error`, then keeps serving pipelined requests.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;

use crate::protocol::{HttpRequest, HttpResponse};

pub type BoxError = Box<dyn Error + Send + Sync>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: HttpRequest) -> Result<HttpResponse, BoxError>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<Err, F, Fut> Handler for HandlerFn<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Err: Into<BoxError> + 'static,
    Fut: Future<Output = Result<HttpResponse, Err>> + Send + 'static,
{
    async fn call(&self, req: HttpRequest) -> Result<HttpResponse, BoxError> {
        (self.f)(req).await.map_err(Into::into)
    }
}

/// Wraps an async function as a [`Handler`].
///
/// ```
/// use tidal_http::handler::{Handler, make_handler};
/// use tidal_http::protocol::{HttpRequest, HttpResponse};
/// use std::convert::Infallible;
///
/// async fn hello(_req: HttpRequest) -> Result<HttpResponse, Infallible> {
///     Ok(HttpResponse::ok().body("hello"))
/// }
///
/// let handler = make_handler(hello);
/// # let _ = &handler as &dyn Handler;
/// ```
pub fn make_handler<F, Err, Ret>(f: F) -> HandlerFn<F>
where
    Err: Into<BoxError>,
    Ret: Future<Output = Result<HttpResponse, Err>>,
    F: Fn(HttpRequest) -> Ret,
{
    HandlerFn { f }
}
