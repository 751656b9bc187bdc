pub mod client;
pub mod codec;
pub mod server;

pub use client::{exchange, outgoing_line, read_message};
pub use codec::{Line, LineCodec};
pub use server::{shutdown_signal, Server};

// CONSTANTS //

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const PORT: u16 = 8080;
pub const SERVER_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const CLIENT_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
pub const BACKLOG: u32 = 10;
pub const BUF_SIZE: usize = 4096;
// the last byte of the buffer is never filled
pub const MAX_LINE_LEN: usize = BUF_SIZE - 1;

pub fn server_addr() -> SocketAddr {
    SocketAddr::new(SERVER_IP, PORT)
}

pub fn client_addr() -> SocketAddr {
    SocketAddr::new(CLIENT_IP, PORT)
}

// PROTOCOL //

/// The reply sent for a request of `received` bytes, without its newline.
pub fn ack(received: usize) -> String {
    format!("OK: received {received} bytes")
}

// LOGGING //

use std::io;
use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt};

/// Logs to stderr. `RUST_LOG` overrides `default_level`.
pub fn setup_logging(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().without_time().compact().with_ansi(true).with_writer(io::stderr));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

// MISC //

pub fn connection_refused(tried: SocketAddr) -> String {
    let mut msg = format!("No server listening on {tried}\n");
    msg.push_str("Try running: cargo run --release --bin ack-server");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_format() {
        assert_eq!(ack(5), "OK: received 5 bytes");
        assert_eq!(ack(0), "OK: received 0 bytes");
    }

    #[test]
    fn test_fixed_addrs() {
        assert_eq!(server_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(client_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(MAX_LINE_LEN, 4095);
    }

    #[test]
    fn test_connection_refused_hint() {
        let msg = connection_refused(client_addr());
        assert!(msg.starts_with("No server listening on 127.0.0.1:8080\n"));
        assert!(msg.ends_with("--bin ack-server"));
    }
}
