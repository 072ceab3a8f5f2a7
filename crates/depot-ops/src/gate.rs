//! # Interactive Gate
//!
//! Operations that need the user (a secret, a rejection reason, a yes/no)
//! send a [`GateRequest`] and suspend until the UI answers on the embedded
//! oneshot.
//!
//! ```text
//! ┌──────────────────┐   GateRequest::Credential   ┌──────────────────────┐
//! │  cancel_dispatch │ ──────────── mpsc ────────► │  UI collaborator     │
//! │    (suspended)   │                             │  shows the dialog    │
//! │                  │ ◄────────── oneshot ─────── │                      │
//! └──────────────────┘   Some(secret) | None       └──────────────────────┘
//! ```
//!
//! `None`, a dropped reply sender, or a closed channel all mean the prompt
//! was dismissed. There are no timeouts.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Default request buffer.
pub const GATE_BUFFER: usize = 8;

/// A prompt waiting for the user.
#[derive(Debug)]
pub enum GateRequest {
    /// Yes/no question.
    Confirm {
        title: String,
        message: String,
        reply: oneshot::Sender<bool>,
    },

    /// Free text, e.g. a rejection reason.
    Text {
        title: String,
        prompt: String,
        reply: oneshot::Sender<Option<String>>,
    },

    /// A masked secret (admin password or PIN).
    Credential {
        title: String,
        prompt: String,
        reply: oneshot::Sender<Option<String>>,
    },
}

impl GateRequest {
    pub fn title(&self) -> &str {
        match self {
            GateRequest::Confirm { title, .. }
            | GateRequest::Text { title, .. }
            | GateRequest::Credential { title, .. } => title,
        }
    }
}

/// Sending half, held by the operations.
#[derive(Debug, Clone)]
pub struct GateHandle {
    tx: mpsc::Sender<GateRequest>,
}

/// Creates a gate. The receiver goes to whatever renders the prompts.
pub fn channel(buffer: usize) -> (GateHandle, mpsc::Receiver<GateRequest>) {
    let (tx, rx) = mpsc::channel(buffer);
    (GateHandle { tx }, rx)
}

impl GateHandle {
    pub async fn confirm(&self, title: &str, message: &str) -> bool {
        let (reply, answer) = oneshot::channel();
        let request = GateRequest::Confirm {
            title: title.to_string(),
            message: message.to_string(),
            reply,
        };
        self.ask(request, answer).await.unwrap_or(false)
    }

    pub async fn text(&self, title: &str, prompt: &str) -> Option<String> {
        let (reply, answer) = oneshot::channel();
        let request = GateRequest::Text {
            title: title.to_string(),
            prompt: prompt.to_string(),
            reply,
        };
        self.ask(request, answer).await.flatten()
    }

    pub async fn credential(&self, title: &str, prompt: &str) -> Option<String> {
        let (reply, answer) = oneshot::channel();
        let request = GateRequest::Credential {
            title: title.to_string(),
            prompt: prompt.to_string(),
            reply,
        };
        self.ask(request, answer).await.flatten()
    }

    async fn ask<T>(&self, request: GateRequest, answer: oneshot::Receiver<T>) -> Option<T> {
        debug!(title = %request.title(), "Gate prompt");
        if self.tx.send(request).await.is_err() {
            debug!("Gate closed, treating prompt as dismissed");
            return None;
        }
        answer.await.ok()
    }
}

// =============================================================================
// Scripted Gate (tests)
// =============================================================================

/// A gate answered from a fixed script, for tests.
#[cfg(test)]
pub(crate) mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// One scripted answer.
    #[derive(Debug, Clone)]
    pub enum Answer {
        Yes,
        No,
        Text(&'static str),
        Dismiss,
    }

    /// Returns a handle whose prompts are answered in order, plus the log
    /// of prompt titles seen. Once the script runs out every prompt is
    /// dismissed.
    pub fn gate(answers: Vec<Answer>) -> (GateHandle, Arc<Mutex<Vec<String>>>) {
        let (handle, mut rx) = channel(GATE_BUFFER);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let mut script: VecDeque<Answer> = answers.into();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                log.lock().unwrap().push(request.title().to_string());
                let answer = script.pop_front().unwrap_or(Answer::Dismiss);
                match request {
                    GateRequest::Confirm { reply, .. } => {
                        let _ = reply.send(matches!(answer, Answer::Yes));
                    }
                    GateRequest::Text { reply, .. } | GateRequest::Credential { reply, .. } => {
                        let text = match answer {
                            Answer::Text(t) => Some(t.to_string()),
                            _ => None,
                        };
                        let _ = reply.send(text);
                    }
                }
            }
        });

        (handle, seen)
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::{gate, Answer};
    use super::*;

    #[tokio::test]
    async fn test_answers_in_order() {
        let (handle, seen) = gate(vec![Answer::Yes, Answer::Text("damaged"), Answer::Text("1234")]);

        assert!(handle.confirm("Delete", "Delete store?").await);
        assert_eq!(handle.text("Reject", "Reason").await.as_deref(), Some("damaged"));
        assert_eq!(handle.credential("Admin", "PIN").await.as_deref(), Some("1234"));
        assert_eq!(handle.credential("Admin", "PIN").await, None);

        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_closed_gate_dismisses() {
        let (handle, rx) = channel(1);
        drop(rx);

        assert!(!handle.confirm("Delete", "Sure?").await);
        assert_eq!(handle.credential("Admin", "PIN").await, None);
    }

    #[tokio::test]
    async fn test_dropped_reply_dismisses() {
        let (handle, mut rx) = channel(1);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                drop(request);
            }
        });

        assert_eq!(handle.text("Reject", "Reason").await, None);
    }
}
