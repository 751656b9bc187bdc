use clap::Parser;
use line_ack::{server_addr, setup_logging, shutdown_signal, Server};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Answers each newline terminated message with the number of bytes received.
#[derive(Parser)]
#[command(version, long_about = None)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    Cli::parse();
    setup_logging("info")?;
    let server = Server::bind(server_addr())?;
    server
        .run_until(async {
            let signal = shutdown_signal().await;
            tracing::info!("Received {signal}");
        })
        .await?;
    Ok(())
}
