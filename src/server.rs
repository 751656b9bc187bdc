use std::future::Future;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::codec::Framed;

use crate::{ack, LineCodec, BACKLOG, BUF_SIZE, MAX_LINE_LEN};

/// Sequential acknowledgment server. Owns the listening socket, which is
/// closed when [`Server::run_until`] returns.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        // not fatal, we just lose fast restarts
        if let Err(err) = socket.set_reuseaddr(true) {
            tracing::warn!("setting SO_REUSEADDR: {err}");
        }
        socket.bind(addr)?;
        let listener = socket.listen(BACKLOG)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and answers connections one at a time until `shutdown`
    /// resolves. A connection still being served at that point is dropped
    /// without a reply.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        tracing::info!("Listening on {addr}");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = self.serve_next() => {},
            }
        }
        drop(self);
        tracing::info!("Shutting down");
        Ok(())
    }

    async fn serve_next(&self) {
        let (tcp, peer) = match self.listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) if err.kind() == ErrorKind::Interrupted => return,
            Err(err) => {
                tracing::error!("accepting connection: {err}");
                return;
            }
        };
        handle_connection(tcp, peer).await;
    }
}

enum Handled {
    Replied,
    PeerClosed,
}

async fn handle_connection(tcp: TcpStream, peer: SocketAddr) {
    let conn = conn_id(&tcp, peer);
    tracing::info!("Accepted new connection ({conn}) from {peer}");
    match respond(tcp, &conn).await {
        Ok(Handled::Replied) => {
            tracing::info!("Response sent and connection closed ({conn})")
        }
        Ok(Handled::PeerClosed) => tracing::info!("client closed connection ({conn})"),
        Err(err) => tracing::error!("connection ({conn}) abandoned: {err}"),
    }
}

// connection is closed when `framed` drops, on every path
async fn respond(tcp: TcpStream, conn: &str) -> io::Result<Handled> {
    let mut framed = Framed::with_capacity(tcp, LineCodec::request(), BUF_SIZE);
    let line = match framed.next().await {
        Some(line) => line?,
        None => return Ok(Handled::PeerClosed),
    };
    if line.is_truncated() {
        tracing::warn!("request ({conn}) filled the {MAX_LINE_LEN} byte buffer, truncated");
    }
    tracing::info!("Received ({conn}): {}", line.to_string_lossy());
    framed.send(ack(line.len())).await?;
    Ok(Handled::Replied)
}

#[cfg(unix)]
fn conn_id(tcp: &TcpStream, _peer: SocketAddr) -> String {
    use std::os::unix::io::AsRawFd;
    format!("fd={}", tcp.as_raw_fd())
}

#[cfg(not(unix))]
fn conn_id(_tcp: &TcpStream, peer: SocketAddr) -> String {
    format!("peer={peer}")
}

/// Resolves on Ctrl-C, or SIGTERM on unix, returning the signal's name.
pub async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(err) => {
                tracing::warn!("installing SIGTERM handler: {err}");
                ctrl_c().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await;
        "SIGINT"
    }
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("listening for Ctrl-C: {err}");
        // without a handler the server only stops when killed
        std::future::pending::<()>().await;
    }
}
