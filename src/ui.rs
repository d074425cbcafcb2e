//! UI signaling surface
//!
//! The capture core never renders anything; it enqueues events for whatever
//! display frontend is attached. [`UiHandle`] methods are fire-and-forget so
//! the real-time loops never block on the screen.

use std::sync::mpsc::{Receiver, Sender, channel};

/// Events consumed by the display frontend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Wake word accepted; the assistant screen should come up
    Listening,
    /// A completed exchange to render
    Conversation { user: String, assistant: String },
    /// A user-visible failure message
    Error(String),
    /// Network connectivity changed
    Connectivity(bool),
    /// Ambient status line (city + current weather)
    Weather { city: String, summary: String },
}

/// Enqueue-only handle to the display frontend
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: Sender<UiEvent>,
}

impl UiHandle {
    /// Create a handle plus the receiving end the frontend drains
    #[must_use]
    pub fn channel() -> (Self, Receiver<UiEvent>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    pub fn show_listening(&self) {
        self.send(UiEvent::Listening);
    }

    pub fn show_conversation(&self, user: impl Into<String>, assistant: impl Into<String>) {
        self.send(UiEvent::Conversation {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    pub fn show_error(&self, message: impl Into<String>) {
        self.send(UiEvent::Error(message.into()));
    }

    pub fn update_connectivity(&self, online: bool) {
        self.send(UiEvent::Connectivity(online));
    }

    pub fn show_weather(&self, city: impl Into<String>, summary: impl Into<String>) {
        self.send(UiEvent::Weather {
            city: city.into(),
            summary: summary.into(),
        });
    }

    fn send(&self, event: UiEvent) {
        // A detached frontend is not an error for the core
        let _ = self.tx.send(event);
    }
}

/// Drain UI events to the log; stands in for a display frontend
pub fn spawn_logger(rx: Receiver<UiEvent>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            match event {
                UiEvent::Listening => tracing::info!("ui: listening"),
                UiEvent::Conversation { user, assistant } => {
                    tracing::info!(%user, %assistant, "ui: conversation");
                }
                UiEvent::Error(message) => tracing::warn!(%message, "ui: error"),
                UiEvent::Connectivity(online) => tracing::info!(online, "ui: connectivity"),
                UiEvent::Weather { city, summary } => {
                    tracing::info!(%city, %summary, "ui: weather");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (ui, rx) = UiHandle::channel();
        ui.show_listening();
        ui.show_conversation("hi", "hello");
        ui.update_connectivity(true);

        assert_eq!(rx.try_recv().unwrap(), UiEvent::Listening);
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Conversation { user: "hi".into(), assistant: "hello".into() }
        );
        assert_eq!(rx.try_recv().unwrap(), UiEvent::Connectivity(true));
    }

    #[test]
    fn detached_frontend_is_harmless() {
        let (ui, rx) = UiHandle::channel();
        drop(rx);
        ui.show_error("nobody listening");
    }
}
