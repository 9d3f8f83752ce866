use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tidal_http::codec::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, DEFAULT_READ_CAPACITY};
use tidal_http::connection::ConnectionConfig;
use tidal_http::ws::DEFAULT_MAX_PAYLOAD;

pub const DEFAULT_PORT: u16 = 4221;

/// Pending connections the kernel queues before `accept`.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Listener and per-connection settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub backlog: u32,
    pub reuse_addr: bool,
    pub read_capacity: usize,
    pub max_header_bytes: usize,
    pub max_body_bytes: u64,
    pub max_frame_payload: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            read_capacity: self.read_capacity,
            write_capacity: self.read_capacity,
            max_header_bytes: self.max_header_bytes,
            max_body_bytes: self.max_body_bytes,
            max_frame_payload: self.max_frame_payload,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            reuse_addr: true,
            read_capacity: DEFAULT_READ_CAPACITY,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_frame_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}
