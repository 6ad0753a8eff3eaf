use serde_json::Value;

/// Notification channels published by the core. Transport is the host's
/// concern; the core only names the channel and hands over a JSON payload.
pub mod channels {
    pub const GRAPHS: &str = "graphs";
    pub const GRAPH: &str = "graph";
    pub const SPACES: &str = "spaces";
    pub const SPACE: &str = "space";
    pub const USERS: &str = "users";
    pub const USER: &str = "user";
}

/// The `type` field carried by every signal payload.
pub mod signal_types {
    pub const CREATED: &str = "created";
    pub const UPDATED: &str = "updated";
    pub const DELETED: &str = "deleted";
}

/// Receives signal emissions from the core.
///
/// Implementations must be fire-and-forget: `emit` is called from hot write
/// paths and must neither block nor fail. An implementation that forwards to
/// a transport should enqueue and log delivery failures itself.
pub trait SignalSink: Send + Sync {
    fn emit(&self, channel: &str, payload: &Value);
}

/// Discards every signal. The default when the host wires no transport.
#[derive(Clone, Copy, Default, Debug)]
pub struct NoopSignalSink;

impl SignalSink for NoopSignalSink {
    fn emit(&self, _channel: &str, _payload: &Value) {}
}

/// Logs every signal at debug level. Handy in tests and development setups.
#[derive(Clone, Copy, Default, Debug)]
pub struct TracingSignalSink;

impl SignalSink for TracingSignalSink {
    fn emit(&self, channel: &str, payload: &Value) {
        tracing::debug!(channel, %payload, "signal emitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Test double recording emissions in order.
    #[derive(Default)]
    pub struct RecordingSink {
        pub emitted: Mutex<Vec<(String, Value)>>,
    }

    impl SignalSink for RecordingSink {
        fn emit(&self, channel: &str, payload: &Value) {
            self.emitted
                .lock()
                .unwrap()
                .push((channel.to_owned(), payload.clone()));
        }
    }

    #[test]
    fn sinks_accept_arbitrary_payloads() {
        let sink = RecordingSink::default();
        sink.emit(
            channels::GRAPH,
            &json!({"type": signal_types::CREATED, "graph_uri": "http://ex/g"}),
        );
        let emitted = sink.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "graph");
        assert_eq!(emitted[0].1["type"], "created");
    }
}
