// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Standalone convergence fuzzer: spins up an in-process
//! [`lineot::server::ServerHandle`] and N simulated replicas, drives each
//! through a bounded sequence of random operations across all seven
//! variants, and asserts every replica lands on byte-identical text.
//!
//! A pure in-process protocol fuzzer: no real editor, no filesystem, no
//! sockets, just the document model and the wire codec exercised end to
//! end through a real multi-client server.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use lineot::client::{Client, ClientOptions, ClientSink};
use lineot::document::Document;
use lineot::logging;
use lineot::protocol::ClientMessage;
use lineot::server::ServerHandle;
use lineot::types::{Operation, OperationKind, Origin, RemoteCursor};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::info;

#[derive(Parser)]
#[command(version, about = "In-process OT convergence fuzzer", long_about = None)]
struct Cli {
    /// Number of concurrent simulated replicas.
    #[arg(long, default_value_t = 4)]
    clients: usize,
    /// Random edits each replica performs.
    #[arg(long, default_value_t = 25)]
    edits_per_client: usize,
    #[arg(long)]
    debug: bool,
}

/// Bridges a [`Client`]'s outgoing traffic straight into the in-process
/// [`ServerHandle`], and applies surviving remote operations to the
/// replica's own document the moment they arrive — the demo-fuzzer
/// equivalent of the real editor shell's echo/remote-apply glue.
struct ReplicaSink {
    server: ServerHandle,
    user_id: String,
    document: Rc<RefCell<Document>>,
}

impl ClientSink for ReplicaSink {
    fn send(&mut self, message: ClientMessage) {
        self.server.submit(self.user_id.clone(), message);
    }

    fn on_remote_operations(&mut self, ops: &[Operation]) {
        let mut doc = self.document.borrow_mut();
        *doc = doc.apply_many(ops);
    }

    fn on_remote_cursor_update(&mut self, _cursor: &RemoteCursor) {}
}

fn random_word(rng: &mut impl Rng) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    let len = rng.gen_range(1..=6);
    (0..len).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

/// Picks a random, bounds-respecting operation against `doc`'s current
/// shape. Weighted roughly evenly across all seven variants; a variant
/// whose precondition doesn't hold for the current document (e.g.
/// `deleteLine` on a one-line document) degrades to `replaceLine`, which is
/// always legal.
fn random_op(rng: &mut impl Rng, doc: &Document) -> Operation {
    let line_count = doc.line_count();
    let line = rng.gen_range(0..line_count);
    let text_len = doc.line(line).expect("line index in bounds by construction").text.chars().count();

    let kind = match rng.gen_range(0..6u8) {
        0 => OperationKind::InsertText {
            line,
            column: rng.gen_range(0..=text_len),
            text: random_word(rng),
        },
        1 => {
            let column = rng.gen_range(0..=text_len);
            let max_len = (text_len - column).max(1);
            OperationKind::DeleteText { line, column, length: rng.gen_range(1..=max_len) }
        }
        2 => OperationKind::InsertLine { index: rng.gen_range(0..=line_count), text: random_word(rng) },
        3 if line_count > 1 => OperationKind::DeleteLine { index: line },
        4 => OperationKind::SplitLine { line, column: rng.gen_range(0..=text_len) },
        5 if line_count > 1 && line + 1 < line_count => OperationKind::MergeLine { line },
        _ => OperationKind::ReplaceLine { index: line, text: random_word(rng) },
    };
    Operation::new(kind, Origin::Input)
}

async fn run(cli: &Cli) -> bool {
    let server = ServerHandle::spawn();

    let mut documents = Vec::with_capacity(cli.clients);
    let mut edit_tasks = Vec::with_capacity(cli.clients);

    for i in 0..cli.clients {
        let user_id = format!("replica-{i}");
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
        let (initial_doc, _revision) = server.register(user_id.clone(), outbox_tx).await;
        let document = Rc::new(RefCell::new(initial_doc));
        documents.push(document.clone());

        let sink = ReplicaSink { server: server.clone(), user_id, document: document.clone() };
        let client = Rc::new(RefCell::new(Client::new(sink, ClientOptions::default())));

        let recv_client = client.clone();
        tokio::task::spawn_local(async move {
            while let Some(message) = outbox_rx.recv().await {
                recv_client
                    .borrow_mut()
                    .handle_message(message)
                    .expect("the fuzzer only ever encodes well-formed instructions");
            }
        });

        let edits = cli.edits_per_client;
        let document_for_edits = document.clone();
        edit_tasks.push(tokio::task::spawn_local(async move {
            let mut rng = rand::thread_rng();
            for _ in 0..edits {
                let op = random_op(&mut rng, &document_for_edits.borrow());
                {
                    let mut doc = document_for_edits.borrow_mut();
                    *doc = doc.apply(&op);
                }
                client.borrow_mut().apply_local(vec![op]);
                sleep(Duration::from_millis(rng.gen_range(0..5))).await;
            }
        }));
    }

    for task in edit_tasks {
        task.await.expect("replica edit task panicked");
    }

    // Give the server a moment to finish transforming and broadcasting the
    // tail of submissions before comparing.
    sleep(Duration::from_millis(200)).await;

    let texts: Vec<String> = documents.iter().map(|d| d.borrow().text()).collect();
    let reference = &texts[0];
    let mut converged = true;
    for (i, text) in texts.iter().enumerate() {
        if text != reference {
            converged = false;
            eprintln!("replica {i} diverged from replica 0:\n{text:?}\nvs\n{reference:?}");
        }
    }
    converged
}

fn main() {
    let cli = Cli::parse();
    logging::initialize(cli.debug);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build the fuzzer's tokio runtime");
    let local = tokio::task::LocalSet::new();

    let converged = local.block_on(&runtime, run(&cli));

    if converged {
        info!(replicas = cli.clients, edits_per_client = cli.edits_per_client, "all replicas converged");
        println!("OK: {} replicas converged to identical text", cli.clients);
    } else {
        eprintln!("FAIL: replicas diverged, see log above");
        std::process::exit(1);
    }
}
