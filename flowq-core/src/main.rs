//! flowqd - the Flowq daemon.
//!
//! Binds a local queue-list to a data directory and serves the wire
//! protocol: `flowqd <data-dir> [bind-addr]`.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use flowq_core::backend::Connect;
use flowq_core::LocalConnect;

const DEFAULT_BIND: &str = "127.0.0.1:7136";

#[tokio::main]
async fn main() -> Result<()> {
    flowq_core::init();

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| ".".to_string());
    let bind_addr = args.next().unwrap_or_else(|| DEFAULT_BIND.to_string());

    let connect = LocalConnect::new();
    connect
        .start_connect(&data_dir, 0)
        .await
        .with_context(|| format!("binding data directory {data_dir}"))?;
    let list = connect.open_queue_list().await.context("opening queue list")?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(%data_dir, %bind_addr, "flowqd ready");

    flowq_core::net::server::serve(listener, list)
        .await
        .context("server loop failed")?;
    Ok(())
}
