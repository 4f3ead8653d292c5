//! Event stream emitter for one response cycle.
//!
//! Single consumer, strict emission order, completion signalled exactly
//! once. The emitter also accumulates every token fragment: the
//! concatenation is the text the facade commits, so the two can never
//! drift apart.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

use colloquy_core::{SafetyVerdict, StreamEvent, ToolTrace};

/// Receiver side handed to the transport layer
pub type EventStream = UnboundedReceiver<StreamEvent>;

/// Ordered emitter for one cycle's events.
///
/// `finish` consumes the emitter, so a second `Done` cannot be sent.
pub struct EventEmitter {
    tx: UnboundedSender<StreamEvent>,
    accumulated: Mutex<String>,
}

impl EventEmitter {
    /// Create an emitter/stream pair for one cycle
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                accumulated: Mutex::new(String::new()),
            },
            rx,
        )
    }

    async fn send(&self, event: StreamEvent) {
        // A disconnected consumer is not an error: the cycle still runs to
        // completion and commits, the transcript being the source of truth.
        let _ = self.tx.send(event);
        tokio::task::yield_now().await;
    }

    /// Emit text as per-character token fragments, accumulating each one
    pub async fn emit_text(&self, text: &str) {
        for ch in text.chars() {
            self.accumulated.lock().await.push(ch);
            self.send(StreamEvent::Token {
                text: ch.to_string(),
            })
            .await;
        }
    }

    /// Emit one completed tool invocation
    pub async fn emit_tool(&self, trace: ToolTrace) {
        self.send(StreamEvent::Tool { trace }).await;
    }

    /// Emit the pre-flight safety verdict
    pub async fn emit_safety(&self, verdict: SafetyVerdict) {
        self.send(StreamEvent::Safety { verdict }).await;
    }

    /// Full text emitted so far; equals the committed assistant text at
    /// the end of the cycle
    pub async fn accumulated(&self) -> String {
        self.accumulated.lock().await.clone()
    }

    /// Send the terminal `Done` event and close the stream
    pub async fn finish(self) {
        let _ = self.tx.send(StreamEvent::Done);
    }
}
