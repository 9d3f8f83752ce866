use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tidal_http::connection::HttpConnection;
use tidal_http::ws::WsHandlerFactory;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::handlers::EchoSockets;
use crate::router::Router;

#[derive(Debug)]
pub struct ServerBuilder<F> {
    config: ServerConfig,
    router: Option<Router>,
    ws_factory: F,
}

impl ServerBuilder<EchoSockets> {
    fn new() -> Self {
        Self { config: ServerConfig::default(), router: None, ws_factory: EchoSockets }
    }
}

impl<F> ServerBuilder<F>
where
    F: WsHandlerFactory + 'static,
    F::Handler: 'static,
{
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn address(mut self, address: IpAddr) -> Self {
        self.config.address = address;
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.config.backlog = backlog;
        self
    }

    #[must_use]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Replaces the factory creating the handler of each upgraded connection.
    pub fn ws_factory<G>(self, ws_factory: G) -> ServerBuilder<G>
    where
        G: WsHandlerFactory + 'static,
        G::Handler: 'static,
    {
        ServerBuilder { config: self.config, router: self.router, ws_factory }
    }

    pub fn build(self) -> Result<Server<F>, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        Ok(Server { config: self.config, router: Arc::new(router), ws_factory: Arc::new(self.ws_factory) })
    }
}

/// Accepts connections and serves each one on its own task.
#[derive(Debug)]
pub struct Server<F = EchoSockets> {
    config: ServerConfig,
    router: Arc<Router>,
    ws_factory: Arc<F>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind {address} error: {source}")]
    Bind { address: SocketAddr, source: io::Error },
}

impl Server {
    pub fn builder() -> ServerBuilder<EchoSockets> {
        ServerBuilder::new()
    }
}

impl<F> Server<F>
where
    F: WsHandlerFactory + 'static,
    F::Handler: 'static,
{
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Opens the listening socket with `SO_REUSEADDR` and the configured backlog.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.socket_addr();
        let bind_error = |source| ServerError::Bind { address, source };

        let socket = if address.is_ipv4() { TcpSocket::new_v4() } else { TcpSocket::new_v6() }.map_err(bind_error)?;
        socket.set_reuseaddr(self.config.reuse_addr).map_err(bind_error)?;
        socket.bind(address).map_err(bind_error)?;
        socket.listen(self.config.backlog).map_err(bind_error)
    }

    /// Binds, then serves until the process ends. Only a failed bind returns.
    pub async fn start(self) -> Result<(), ServerError> {
        let tcp_listener = match self.bind() {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return Err(e);
            }
        };

        self.serve(tcp_listener).await;
        Ok(())
    }

    pub async fn serve(self, tcp_listener: TcpListener) {
        match tcp_listener.local_addr() {
            Ok(address) => info!(%address, "start listening"),
            Err(e) => warn!(cause = %e, "start listening at unknown address"),
        }

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);
            let ws_factory = Arc::clone(&self.ws_factory);
            let connection_config = self.config.connection_config();

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::with_config(reader, writer, connection_config);
                match connection.process(router, ws_factory).await {
                    Ok(()) => {
                        info!(%remote_addr, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(%remote_addr, "service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }
}
