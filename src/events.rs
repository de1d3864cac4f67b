//! Indexing event side channel
//!
//! Fire-and-forget observability signals. Sinks must not block and carry
//! no correctness obligation: the orchestrators never inspect a sink's
//! outcome, and a sink that drops events changes nothing about what was
//! committed.

use std::sync::mpsc;
use std::sync::Mutex;

/// Entity classes referenced by lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Function,
    Module,
    Edge,
    ContextPack,
}

/// Observability signals emitted during indexing.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    IndexingStarted {
        task_id: String,
        files: usize,
    },
    FileIndexed {
        path: String,
        functions_indexed: usize,
        skipped: bool,
    },
    FunctionIndexed {
        file_path: String,
        name: String,
    },
    EntityCreated {
        kind: EntityKind,
        id: i64,
    },
    EntityUpdated {
        kind: EntityKind,
        id: i64,
    },
    EntityDeleted {
        kind: EntityKind,
        count: usize,
    },
    IndexingComplete {
        task_id: String,
        files_processed: usize,
        outcome: String,
    },
    ExternalEdgesResolved {
        resolved: usize,
        total: usize,
        percent: f64,
    },
}

/// Injected event sink. Implementations must return promptly; anything
/// slow belongs on the far side of a channel.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IndexEvent);
}

/// Sink that discards every event.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: IndexEvent) {}
}

/// Sink that forwards events over an unbounded channel.
///
/// Send failures (receiver dropped) are ignored: the channel is
/// observability-only.
pub struct ChannelEventSink {
    tx: Mutex<mpsc::Sender<IndexEvent>>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::Receiver<IndexEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: IndexEvent) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event);
        }
    }
}
