//! One-way "notify the user" channel for non-fatal policy issues.
//!
//! Warnings never fail and never block a request: a malformed `Authorization`
//! header or a missing certificate file is reported here and the request goes
//! ahead with the header or certificate left as is.

use std::sync::Mutex;

/// Receiver for user-facing warnings.
pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Forwards warnings to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWarningSink;

impl WarningSink for LogWarningSink {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Keeps every warning in memory, in order.
#[derive(Debug, Default)]
pub struct CollectingWarningSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingWarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl WarningSink for CollectingWarningSink {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingWarningSink::new();
        sink.warn("first");
        sink.warn("second");
        assert_eq!(sink.messages(), vec!["first", "second"]);
    }
}
