use std::net::SocketAddr;

use anyhow::{bail, Context};
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

use crate::{LineCodec, BUF_SIZE, MAX_LINE_LEN};

pub const PROMPT: &str = "Enter message to send (single line), then ENTER:";

/// Cuts `message` to the server's buffer and makes sure it ends in a
/// newline, if there is room left for one.
pub fn outgoing_line(message: &[u8]) -> Vec<u8> {
    let message = &message[..message.len().min(MAX_LINE_LEN)];
    let mut line = Vec::with_capacity(message.len() + 1);
    line.extend_from_slice(message);
    if line.last() != Some(&b'\n') && line.len() + 1 < BUF_SIZE {
        line.push(b'\n');
    }
    line
}

/// Prompts on `out` and reads a single line from `input`.
pub async fn read_message<R, W>(input: &mut R, out: &mut W) -> anyhow::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    out.write_all(PROMPT.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    let mut message = Vec::with_capacity(BUF_SIZE);
    if input.read_until(b'\n', &mut message).await? == 0 {
        bail!("No input");
    }
    Ok(message)
}

/// Sends one line to `addr` and returns the reply with its newline removed.
///
/// The reply is framed on its newline, so it may arrive over several reads.
/// There is no deadline: a server busy with earlier connections answers
/// once it gets to this one.
pub async fn exchange(addr: SocketAddr, message: &[u8]) -> anyhow::Result<String> {
    let request = outgoing_line(message);
    let mut tcp = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    let (reader, mut writer) = tcp.split();
    writer.write_all(&request).await.context("sending request")?;
    let mut stream = FramedRead::with_capacity(reader, LineCodec::new(), BUF_SIZE);
    match stream.next().await {
        Some(reply) => {
            let reply = reply.context("reading reply")?;
            tracing::debug!("got {} byte reply", reply.len());
            Ok(reply.to_string_lossy().into_owned())
        }
        None => bail!("server closed the connection without replying"),
    }
}
