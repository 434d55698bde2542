// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Demo transport server: a minimal line-delimited-JSON TCP front end
//! for [`lineot::server::ServerHandle`]. Exercises the wire protocol over a
//! real socket; the core crate itself knows nothing about sockets or
//! framing.
//!
//! One JSON value per line. Any framing that preserves field identity and
//! ordering would do just as well.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use lineot::config::{self, AppConfig};
use lineot::document::Document;
use lineot::logging;
use lineot::protocol::{ClientMessage, ServerMessage};
use lineot::server::ServerHandle;
use lineot::types::{Operation, OperationKind, Origin};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(version, about = "Reference line-OT collaboration server", long_about = None)]
struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:4242. Overrides the config
    /// file's `listen_addr` if given.
    #[arg(long)]
    listen: Option<String>,
    /// Directory containing (or to contain) a `.ot-collab/config` file.
    #[arg(long, default_value = ".")]
    directory: PathBuf,
    #[arg(long)]
    debug: bool,
}

/// Synthesizes the operation batch that turns a brand-new empty document
/// into `doc`'s current shape, so a freshly connected client can seed its
/// own replica through the ordinary remote-operation path instead of a
/// bespoke "here is the whole document" message type. This is a demo-only
/// bootstrap convention, not part of the core wire protocol.
fn bootstrap_ops(doc: &Document) -> Vec<Operation> {
    let lines = doc.lines();
    let mut ops = Vec::new();
    if let Some(first) = lines.first() {
        if !first.text.is_empty() {
            ops.push(Operation::new(
                OperationKind::ReplaceLine { index: 0, text: first.text.to_string() },
                Origin::Input,
            ));
        }
    }
    for (index, line) in lines.iter().enumerate().skip(1) {
        ops.push(Operation::new(
            OperationKind::InsertLine { index, text: line.text.to_string() },
            Origin::Input,
        ));
    }
    ops
}

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(0);

async fn handle_connection(stream: TcpStream, server: ServerHandle) {
    let user_id = format!("client-{}", NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed));
    let (read_half, mut write_half) = tokio::io::split(stream);

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    let (document, revision) = server.register(user_id.clone(), outbox_tx.clone()).await;
    info!(user_id, revision, "accepted connection");

    let bootstrap = bootstrap_ops(&document);
    if !bootstrap.is_empty() {
        let message = ServerMessage::Operation {
            revision,
            user_id: "server".to_string(),
            instructions: lineot::codec::encode_many(&bootstrap),
        };
        let _ = outbox_tx.send(message);
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            let Ok(mut line) = serde_json::to_string(&message) else {
                warn!("failed to serialize outgoing server message");
                continue;
            };
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<ClientMessage>(&line) {
                Ok(message) => server.submit(user_id.clone(), message),
                Err(error) => {
                    warn!(user_id, %error, "dropping malformed client message");
                }
            },
            Ok(None) => break,
            Err(error) => {
                warn!(user_id, %error, "connection read error");
                break;
            }
        }
    }

    debug!(user_id, "connection closed");
    server.unregister(user_id);
    writer.abort();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_file = cli.directory.join(config::CONFIG_DIR).join(config::CONFIG_FILE);
    let config = AppConfig::from_config_file(&config_file)
        .map_err(anyhow::Error::msg)
        .context("failed to load configuration")?
        .merge_cli(cli.listen, None, Some(cli.debug));

    logging::initialize(config.debug);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening");

    let server = ServerHandle::spawn();
    loop {
        let (stream, addr) = listener.accept().await.context("accept failed")?;
        debug!(%addr, "peer dialed in");
        tokio::spawn(handle_connection(stream, server.clone()));
    }
}
