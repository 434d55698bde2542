// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Demo transport client: connects to `lineot-server`, applies a
//! tiny line-oriented command language typed on stdin, and prints the
//! replica's document whenever it changes (locally or from a remote peer).
//!
//! Commands (one per stdin line):
//!   insert LINE COL TEXT...    deleteline IDX
//!   delete LINE COL LEN        split LINE COL
//!   insertline IDX TEXT...     merge LINE
//!   replace IDX TEXT...        cursor LINE COL COLOR
//!   print                      quit

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use lineot::client::{Client, ClientOptions, ClientSink, TokioDebounceScheduler};
use lineot::document::Document;
use lineot::logging;
use lineot::protocol::{ClientMessage, ServerMessage};
use lineot::types::{Operation, OperationKind, Origin, Position, RemoteCursor};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "Reference line-OT collaboration client", long_about = None)]
struct Cli {
    /// Server address to connect to.
    #[arg(long, default_value = "127.0.0.1:4242")]
    connect: String,
    /// Debounce delay for local edits, in milliseconds. 0 sends immediately.
    #[arg(long, default_value_t = 0)]
    debounce_ms: u64,
    #[arg(long)]
    debug: bool,
}

struct WireSink {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    document: Rc<RefCell<Document>>,
}

impl ClientSink for WireSink {
    fn send(&mut self, message: ClientMessage) {
        let _ = self.outgoing.send(message);
    }

    fn on_remote_operations(&mut self, ops: &[Operation]) {
        let mut doc = self.document.borrow_mut();
        *doc = doc.apply_many(ops);
        println!("--- document ({} line(s)) ---\n{}\n---", doc.line_count(), doc.text());
    }

    fn on_remote_cursor_update(&mut self, cursor: &RemoteCursor) {
        println!("# {} moved to {:?}", cursor.user_id, cursor.position);
    }
}

enum Command {
    Apply(Operation),
    Cursor { position: Position, color: String },
}

fn parse_command(line: &str, document: &Document) -> Result<Option<Command>> {
    let mut parts = line.trim().splitn(3, ' ');
    let Some(command) = parts.next() else { return Ok(None) };

    if command == "cursor" {
        let rest = parts.next().unwrap_or_default();
        let mut fields = rest.split_whitespace();
        let line_no: usize = fields.next().unwrap_or_default().parse().context("LINE")?;
        let column: usize = fields.next().unwrap_or_default().parse().context("COL")?;
        let color = fields.next().unwrap_or("#ffffff").to_string();
        return Ok(Some(Command::Cursor { position: Position { line: line_no, column }, color }));
    }

    let kind = match command {
        "" => return Ok(None),
        "print" => {
            println!("{}", document.text());
            return Ok(None);
        }
        "quit" => bail!("quit"),
        "insert" => {
            let rest = parts.next().unwrap_or_default();
            let mut fields = rest.splitn(2, ' ');
            let line_no: usize = fields.next().unwrap_or_default().parse().context("LINE")?;
            let rest2 = fields.next().unwrap_or_default();
            let mut fields2 = rest2.splitn(2, ' ');
            let column: usize = fields2.next().unwrap_or_default().parse().context("COL")?;
            let text = fields2.next().unwrap_or_default().to_string();
            OperationKind::InsertText { line: line_no, column, text }
        }
        "delete" => {
            let rest = parts.next().unwrap_or_default();
            let mut fields = rest.split_whitespace();
            let line_no: usize = fields.next().unwrap_or_default().parse().context("LINE")?;
            let column: usize = fields.next().unwrap_or_default().parse().context("COL")?;
            let length: usize = fields.next().unwrap_or_default().parse().context("LEN")?;
            OperationKind::DeleteText { line: line_no, column, length }
        }
        "insertline" => {
            let rest = parts.next().unwrap_or_default();
            let mut fields = rest.splitn(2, ' ');
            let index: usize = fields.next().unwrap_or_default().parse().context("IDX")?;
            let text = fields.next().unwrap_or_default().to_string();
            OperationKind::InsertLine { index, text }
        }
        "deleteline" => {
            let rest = parts.next().unwrap_or_default();
            let index: usize = rest.trim().parse().context("IDX")?;
            OperationKind::DeleteLine { index }
        }
        "split" => {
            let rest = parts.next().unwrap_or_default();
            let mut fields = rest.split_whitespace();
            let line_no: usize = fields.next().unwrap_or_default().parse().context("LINE")?;
            let column: usize = fields.next().unwrap_or_default().parse().context("COL")?;
            OperationKind::SplitLine { line: line_no, column }
        }
        "merge" => {
            let rest = parts.next().unwrap_or_default();
            let line_no: usize = rest.trim().parse().context("LINE")?;
            OperationKind::MergeLine { line: line_no }
        }
        "replace" => {
            let rest = parts.next().unwrap_or_default();
            let mut fields = rest.splitn(2, ' ');
            let index: usize = fields.next().unwrap_or_default().parse().context("IDX")?;
            let text = fields.next().unwrap_or_default().to_string();
            OperationKind::ReplaceLine { index, text }
        }
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(Command::Apply(Operation::new(kind, Origin::Input))))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.debug);

    let stream = TcpStream::connect(&cli.connect).await.with_context(|| format!("failed to connect to {}", cli.connect))?;
    let (read_half, mut write_half) = tokio::io::split(stream);

    let document = Rc::new(RefCell::new(Document::new_empty()));
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let Ok(mut line) = serde_json::to_string(&message) else { continue };
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let sink = WireSink { outgoing: outgoing_tx, document: document.clone() };
    let (scheduler, mut debounce_ticks) = TokioDebounceScheduler::new();
    let client = Rc::new(RefCell::new(Client::with_scheduler(
        sink,
        scheduler,
        ClientOptions { debounce_delay: Duration::from_millis(cli.debounce_ms) },
    )));

    let local = tokio::task::LocalSet::new();

    let client_for_reader = client.clone();
    let reader_task = local.spawn_local(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match serde_json::from_str::<ServerMessage>(&line) {
                    Ok(message) => {
                        if let Err(error) = client_for_reader.borrow_mut().handle_message(message) {
                            warn!(%error, "server sent an undecodable operation; this indicates a protocol mismatch");
                            break;
                        }
                    }
                    Err(error) => warn!(%error, "received malformed server message"),
                },
                Ok(None) => {
                    info!("server closed the connection");
                    break;
                }
                Err(error) => {
                    warn!(%error, "connection read error");
                    break;
                }
            }
        }
    });

    local
        .run_until(async move {
            let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    line = stdin_lines.next_line() => {
                        let Ok(Some(line)) = line else { break };
                        match parse_command(&line, &document.borrow()) {
                            Ok(Some(Command::Apply(op))) => {
                                {
                                    let mut doc = document.borrow_mut();
                                    *doc = doc.apply(&op);
                                }
                                client.borrow_mut().apply_local(vec![op]);
                            }
                            Ok(Some(Command::Cursor { position, color })) => {
                                client.borrow_mut().update_local_cursor(position, color);
                            }
                            Ok(None) => {}
                            Err(error) if error.to_string() == "quit" => break,
                            Err(error) => eprintln!("error: {error:#}"),
                        }
                    }
                    tick = debounce_ticks.recv() => {
                        if tick.is_none() {
                            break;
                        }
                        client.borrow_mut().flush_debounce();
                    }
                }
            }
        })
        .await;

    reader_task.abort();
    Ok(())
}
