use std::io::ErrorKind;

use anyhow::Context;
use clap::Parser;
use line_ack::{client_addr, connection_refused, exchange, read_message, setup_logging};
use tokio::io::{self, BufReader};

/// Sends one line to the ack server and prints its reply.
#[derive(Parser)]
#[command(version, long_about = None)]
struct Cli {
    /// Message to send, read from stdin when omitted
    message: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging("warn")?;
    let message = match cli.message {
        Some(message) => message.into_bytes(),
        None => read_message(&mut BufReader::new(io::stdin()), &mut io::stdout())
            .await
            .context("reading message")?,
    };
    let addr = client_addr();
    let reply = match exchange(addr, &message).await {
        Ok(reply) => reply,
        Err(err) => {
            let refused = err
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io_err| io_err.kind() == ErrorKind::ConnectionRefused);
            if refused {
                tracing::error!("{}", connection_refused(addr));
                std::process::exit(1)
            }
            // got unexpected err, re-throw
            return Err(err);
        }
    };
    println!("Server replied: {reply}");
    Ok(())
}
