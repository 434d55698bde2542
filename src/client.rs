//! The client-side OT state machine: three states gate which local
//! operations are already on the wire, which are held as a single
//! outstanding batch, and which are buffered behind it.
//!
//! The state machine itself never blocks and never spawns anything; the
//! host drives it synchronously and supplies two small seams —
//! [`ClientSink`] for outgoing messages and remote-op/cursor delivery, and
//! [`DebounceScheduler`] for the one optional timer. Both are plain traits,
//! not `Rc<RefCell<..>>` callback cells, so the borrow checker enforces
//! single-threaded, non-reentrant use for free. [`TokioDebounceScheduler`]
//! is the one concrete scheduler this crate ships, for hosts already
//! running inside a single-threaded `tokio` `LocalSet`.

use std::time::Duration;

use tracing::{debug, warn};

use crate::codec::{decode_many, encode_many};
use crate::cursor::CursorTracker;
use crate::error::CodecError;
use crate::ot::transform_ops;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::{Operation, Origin, Position, RemoteCursor};

/// The three states a client can be in. Rather than a separate state tag
/// plus optional `outstanding`/`buffer` fields, each state here *carries*
/// exactly the data it needs — an `awaiting_confirm` client cannot help but
/// have an outstanding batch, because there's nowhere else to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Synchronized,
    AwaitingConfirm,
    AwaitingWithBuffer,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Synchronized,
    AwaitingConfirm { outstanding: Vec<Operation> },
    AwaitingWithBuffer { outstanding: Vec<Operation>, buffer: Vec<Operation> },
}

impl Phase {
    const fn as_state(&self) -> ClientState {
        match self {
            Self::Synchronized => ClientState::Synchronized,
            Self::AwaitingConfirm { .. } => ClientState::AwaitingConfirm,
            Self::AwaitingWithBuffer { .. } => ClientState::AwaitingWithBuffer,
        }
    }
}

/// The host-supplied seam for everything a client needs to do to the
/// outside world: send a message, and deliver remote operations/cursors
/// that survived transformation.
pub trait ClientSink {
    fn send(&mut self, message: ClientMessage);
    fn on_remote_operations(&mut self, ops: &[Operation]);
    fn on_remote_cursor_update(&mut self, cursor: &RemoteCursor);
}

/// The host-supplied seam for the client's one suspension point: an
/// optional debounce timer. `schedule` must be idempotent — calling it
/// again before the previous delay elapsed re-arms a single timer rather
/// than stacking a second one. When it eventually fires, the host must
/// call [`Client::flush_debounce`].
pub trait DebounceScheduler {
    fn schedule(&mut self, delay: Duration);
}

/// A scheduler that never fires — used when `debounce_delay` is zero,
/// which is always a valid configuration even without a timer source
/// available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDebounce;

impl DebounceScheduler for NoDebounce {
    fn schedule(&mut self, _delay: Duration) {}
}

/// A [`DebounceScheduler`] backed by a `tokio` timer, for hosts that already
/// run inside a `tokio` runtime (the reference binaries do). Re-arming is
/// idempotent: each `schedule` call bumps a generation counter and spawns a
/// fresh sleep; a previously spawned sleep that wakes up after being
/// superseded notices its generation is stale and sends nothing.
#[derive(Debug, Clone)]
pub struct TokioDebounceScheduler {
    tick_tx: tokio::sync::mpsc::UnboundedSender<()>,
    generation: std::rc::Rc<std::cell::Cell<u64>>,
}

impl TokioDebounceScheduler {
    /// Builds a scheduler paired with the receiver the host must poll (e.g.
    /// in a `tokio::select!` arm) and call [`Client::flush_debounce`] on
    /// every tick.
    #[must_use]
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<()>) {
        let (tick_tx, tick_rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Self { tick_tx, generation: std::rc::Rc::new(std::cell::Cell::new(0)) },
            tick_rx,
        )
    }
}

impl DebounceScheduler for TokioDebounceScheduler {
    fn schedule(&mut self, delay: Duration) {
        let generation = self.generation.clone();
        let this_generation = generation.get() + 1;
        generation.set(this_generation);
        let tick_tx = self.tick_tx.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if generation.get() == this_generation {
                let _ = tick_tx.send(());
            }
        });
    }
}

/// Construction options for [`Client::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientOptions {
    pub debounce_delay: Duration,
}

/// A single replica's OT client. Generic over the sink and (optionally) the
/// debounce scheduler it's wired to.
pub struct Client<S: ClientSink, D: DebounceScheduler = NoDebounce> {
    sink: S,
    scheduler: D,
    debounce_delay: Duration,
    debounce_buffer: Vec<Operation>,
    phase: Phase,
    revision: u64,
    cursors: CursorTracker,
}

impl<S: ClientSink> Client<S, NoDebounce> {
    #[must_use]
    pub fn new(sink: S, options: ClientOptions) -> Self {
        Self::with_scheduler(sink, NoDebounce, options)
    }
}

impl<S: ClientSink, D: DebounceScheduler> Client<S, D> {
    #[must_use]
    pub fn with_scheduler(sink: S, scheduler: D, options: ClientOptions) -> Self {
        Self {
            sink,
            scheduler,
            debounce_delay: options.debounce_delay,
            debounce_buffer: Vec::new(),
            phase: Phase::Synchronized,
            revision: 0,
            cursors: CursorTracker::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.phase.as_state()
    }

    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn remote_cursors(&self) -> Vec<&RemoteCursor> {
        self.cursors.get_all()
    }

    pub fn update_local_cursor(&mut self, position: Position, color: impl Into<String>) {
        self.sink.send(ClientMessage::Cursor { position: position.into(), color: color.into() });
    }

    /// Registers a local edit. `ops` must be non-empty; an empty batch is a
    /// no-op (nothing to send, nothing to buffer).
    pub fn apply_local(&mut self, ops: Vec<Operation>) {
        if ops.is_empty() {
            return;
        }
        self.cursors.map_through(&ops);
        if self.debounce_delay.is_zero() {
            self.dispatch_local(ops);
        } else {
            self.debounce_buffer.extend(ops);
            self.scheduler.schedule(self.debounce_delay);
        }
    }

    /// Ships whatever is sitting in the debounce buffer. The host calls
    /// this when its scheduled timer elapses; calling it with an empty
    /// buffer is a harmless no-op.
    pub fn flush_debounce(&mut self) {
        if self.debounce_buffer.is_empty() {
            return;
        }
        let ops = std::mem::take(&mut self.debounce_buffer);
        self.dispatch_local(ops);
    }

    fn dispatch_local(&mut self, ops: Vec<Operation>) {
        self.phase = match std::mem::replace(&mut self.phase, Phase::Synchronized) {
            Phase::Synchronized => {
                self.send_as_outstanding(ops);
                return;
            }
            Phase::AwaitingConfirm { outstanding } => Phase::AwaitingWithBuffer { outstanding, buffer: ops },
            Phase::AwaitingWithBuffer { outstanding, mut buffer } => {
                buffer.extend(ops);
                Phase::AwaitingWithBuffer { outstanding, buffer }
            }
        };
    }

    fn send_as_outstanding(&mut self, ops: Vec<Operation>) {
        let instructions = encode_many(&ops);
        self.sink.send(ClientMessage::Operation { revision: self.revision, instructions });
        self.phase = Phase::AwaitingConfirm { outstanding: ops };
    }

    /// Handles a message from the server.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if an `operation` message's instructions
    /// fail to decode; this is a fatal protocol mismatch, not a
    /// locally-recoverable condition.
    pub fn handle_message(&mut self, message: ServerMessage) -> Result<(), CodecError> {
        match message {
            ServerMessage::Ack { revision } => {
                self.handle_ack(revision);
                Ok(())
            }
            ServerMessage::Operation { revision, instructions, .. } => {
                self.handle_remote_operation(revision, &instructions)
            }
            ServerMessage::Cursor { user_id, position, color } => {
                self.cursors.update(user_id.clone(), position.into(), color.clone(), None);
                let cursor = self.cursors.get(&user_id).expect("just inserted");
                self.sink.on_remote_cursor_update(cursor);
                Ok(())
            }
        }
    }

    fn handle_ack(&mut self, revision: u64) {
        self.phase = match std::mem::replace(&mut self.phase, Phase::Synchronized) {
            Phase::AwaitingConfirm { .. } => {
                self.revision = revision;
                Phase::Synchronized
            }
            Phase::AwaitingWithBuffer { buffer, .. } => {
                self.revision = revision;
                self.send_as_outstanding(buffer);
                return;
            }
            Phase::Synchronized => {
                warn!(revision, "client: received ack while already synchronized");
                self.revision = revision;
                Phase::Synchronized
            }
        };
    }

    fn handle_remote_operation(
        &mut self,
        revision: u64,
        instructions: &[crate::protocol::Instruction],
    ) -> Result<(), CodecError> {
        self.flush_debounce();
        let remote = decode_many(instructions, Origin::Remote)?;

        self.phase = match std::mem::replace(&mut self.phase, Phase::Synchronized) {
            Phase::Synchronized => {
                self.cursors.map_through(&remote);
                self.sink.on_remote_operations(&remote);
                self.revision = revision;
                Phase::Synchronized
            }
            Phase::AwaitingConfirm { outstanding } => {
                let (remote, outstanding) = transform_ops(&remote, &outstanding);
                self.cursors.map_through(&remote);
                self.sink.on_remote_operations(&remote);
                Phase::AwaitingConfirm { outstanding }
            }
            Phase::AwaitingWithBuffer { outstanding, buffer } => {
                let (remote, outstanding) = transform_ops(&remote, &outstanding);
                let (remote, buffer) = transform_ops(&remote, &buffer);
                self.cursors.map_through(&remote);
                self.sink.on_remote_operations(&remote);
                Phase::AwaitingWithBuffer { outstanding, buffer }
            }
        };
        Ok(())
    }

    /// Tears the client down: cancels debounce (by simply discarding it —
    /// see [`DebounceScheduler`]'s idempotency contract for why no
    /// explicit cancel call is needed here), clears outstanding/buffered
    /// ops and tracked cursors, and returns to `synchronized`.
    pub fn destroy(&mut self) {
        debug!("client: destroy");
        self.debounce_buffer.clear();
        self.cursors.clear();
        self.phase = Phase::Synchronized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct RecordingSink {
        sent: Vec<ClientMessage>,
        remote_ops: Vec<Operation>,
        remote_cursors: Vec<RemoteCursor>,
    }

    impl ClientSink for RecordingSink {
        fn send(&mut self, message: ClientMessage) {
            self.sent.push(message);
        }
        fn on_remote_operations(&mut self, ops: &[Operation]) {
            self.remote_ops.extend_from_slice(ops);
        }
        fn on_remote_cursor_update(&mut self, cursor: &RemoteCursor) {
            self.remote_cursors.push(cursor.clone());
        }
    }

    fn new_client() -> Client<RecordingSink> {
        Client::new(RecordingSink::default(), ClientOptions::default())
    }

    #[test]
    fn starts_synchronized_at_revision_zero() {
        let client = new_client();
        assert_eq!(client.state(), ClientState::Synchronized);
        assert_eq!(client.revision(), 0);
    }

    #[test]
    fn scenario_4_buffer_then_ack_cycle() {
        let mut client = new_client();

        client.apply_local(vec![factories::insert_text(0, 0, "A")]);
        assert_eq!(client.state(), ClientState::AwaitingConfirm);
        assert_eq!(client.sink.sent.len(), 1);

        client.apply_local(vec![factories::insert_text(0, 1, "B")]);
        assert_eq!(client.state(), ClientState::AwaitingWithBuffer);
        assert_eq!(client.sink.sent.len(), 1, "B must not be sent yet");

        client.handle_message(ServerMessage::Ack { revision: 1 }).unwrap();
        assert_eq!(client.state(), ClientState::AwaitingConfirm);
        assert_eq!(client.sink.sent.len(), 2);
        let ClientMessage::Operation { revision, instructions } = &client.sink.sent[1] else {
            panic!("expected an operation message");
        };
        assert_eq!(*revision, 1);
        assert_eq!(instructions.len(), 1, "second send should carry only B's op");

        client.handle_message(ServerMessage::Ack { revision: 2 }).unwrap();
        assert_eq!(client.state(), ClientState::Synchronized);
        assert_eq!(client.revision(), 2);
    }

    #[traced_test]
    #[test]
    fn ack_while_synchronized_just_updates_revision() {
        let mut client = new_client();
        client.handle_message(ServerMessage::Ack { revision: 7 }).unwrap();
        assert_eq!(client.state(), ClientState::Synchronized);
        assert_eq!(client.revision(), 7);
    }

    #[test]
    fn remote_operation_while_synchronized_is_emitted_directly() {
        let mut client = new_client();
        let instructions = encode_many(&[factories::insert_text(0, 0, "hi")]);
        client.handle_message(ServerMessage::Operation { revision: 3, user_id: "peer".into(), instructions }).unwrap();
        assert_eq!(client.sink.remote_ops.len(), 1);
        assert_eq!(client.revision(), 3);
    }

    #[test]
    fn remote_operation_while_awaiting_confirm_is_transformed_against_outstanding() {
        let mut client = new_client();
        client.apply_local(vec![factories::insert_text(0, 0, "A")]);
        let instructions = encode_many(&[factories::insert_text(0, 0, "B")]);
        client.handle_message(ServerMessage::Operation { revision: 1, user_id: "peer".into(), instructions }).unwrap();
        assert_eq!(client.state(), ClientState::AwaitingConfirm);
        // B was transformed against outstanding A: since A is canonical on the
        // server side and wins ties, B's remote echo lands after A's length.
        assert_eq!(client.sink.remote_ops[0].kind, crate::types::OperationKind::InsertText { line: 0, column: 1, text: "B".into() });
    }

    #[test]
    fn decode_failure_on_remote_operation_propagates() {
        let mut client = new_client();
        let bad = crate::protocol::Instruction { o: crate::protocol::OpCode::ArrRemIdx, p: vec![], i: None, l: None, v: None };
        let result = client.handle_message(ServerMessage::Operation { revision: 1, user_id: "peer".into(), instructions: vec![bad] });
        assert!(result.is_err());
    }

    #[test]
    fn destroy_resets_to_synchronized() {
        let mut client = new_client();
        client.apply_local(vec![factories::insert_text(0, 0, "A")]);
        client.destroy();
        assert_eq!(client.state(), ClientState::Synchronized);
        assert!(client.remote_cursors().is_empty());
    }

    #[test]
    fn cursor_update_message_reaches_sink() {
        let mut client = new_client();
        client
            .handle_message(ServerMessage::Cursor {
                user_id: "peer".into(),
                position: Position::new(0, 2).into(),
                color: "#abc".into(),
            })
            .unwrap();
        assert_eq!(client.sink.remote_cursors.len(), 1);
        assert_eq!(client.remote_cursors().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tokio_debounce_scheduler_ticks_once_after_delay() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (scheduler, mut ticks) = TokioDebounceScheduler::new();
                let mut client = Client::with_scheduler(
                    RecordingSink::default(),
                    scheduler,
                    ClientOptions { debounce_delay: Duration::from_millis(10) },
                );

                client.apply_local(vec![factories::insert_text(0, 0, "A")]);
                assert_eq!(client.state(), ClientState::Synchronized, "buffered, not yet dispatched");
                assert!(client.sink.sent.is_empty());

                ticks.recv().await.expect("scheduler must tick");
                client.flush_debounce();
                assert_eq!(client.state(), ClientState::AwaitingConfirm);
                assert_eq!(client.sink.sent.len(), 1);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tokio_debounce_scheduler_rearm_is_idempotent() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (scheduler, mut ticks) = TokioDebounceScheduler::new();
                let mut client = Client::with_scheduler(
                    RecordingSink::default(),
                    scheduler,
                    ClientOptions { debounce_delay: Duration::from_millis(30) },
                );

                client.apply_local(vec![factories::insert_text(0, 0, "A")]);
                tokio::time::sleep(Duration::from_millis(10)).await;
                client.apply_local(vec![factories::insert_text(0, 1, "B")]);

                // Only the second, re-armed timer should ever tick.
                ticks.recv().await.expect("scheduler must tick exactly once");
                client.flush_debounce();
                assert_eq!(client.state(), ClientState::AwaitingConfirm);
                let instructions = match &client.sink.sent[0] {
                    ClientMessage::Operation { instructions, .. } => instructions,
                    other => panic!("expected an operation message, got {other:?}"),
                };
                assert_eq!(instructions.len(), 2, "both A and B ship together once debounced");
            })
            .await;
    }
}
