//! Session records
//!
//! Every scored round and every chat line sent while rounds are running
//! produces a [`LogRecord`]. Records are handed to a [`LogSink`]; the
//! default sink emits them as structured `tracing` events under the
//! `refgame::records` target so they can be routed apart from diagnostics.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;
use web_time::SystemTime;

use crate::{registry::Role, trial::context::ContextType};

/// A row of the experiment's data log
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum LogRecord {
    /// The controlling participant submitted for a round
    #[serde(rename_all = "camelCase")]
    Outcome {
        /// Short form of the session identifier
        session_id: String,
        /// When the submission was processed
        #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
        timestamp: SystemTime,
        /// Index of the round, starting at 0
        round_index: usize,
        /// Context the round was played under
        trial_context: ContextType,
        /// Identifier of the round's target
        target: String,
        /// Submitted values joined with commas
        submitted_value: String,
        /// Score delta awarded
        score: f64,
    },
    /// A chat line relayed between the participants
    #[serde(rename_all = "camelCase")]
    Message {
        /// Short form of the session identifier
        session_id: String,
        /// When the line was relayed
        #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
        timestamp: SystemTime,
        /// Index of the round the line was sent in
        round_index: usize,
        /// Role of the sender
        role: Role,
        /// The unescaped text
        text: String,
    },
}

/// Destination for session records
pub trait LogSink {
    /// Persists a record
    fn record(&self, record: &LogRecord);
}

impl<F> LogSink for F
where
    F: Fn(&LogRecord),
{
    fn record(&self, record: &LogRecord) {
        self(record);
    }
}

/// Emits records as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, record: &LogRecord) {
        match serde_json::to_string(record) {
            Ok(line) => info!(target: "refgame::records", record = %line),
            Err(error) => tracing::error!(target: "refgame::records", %error, "unserializable record"),
        }
    }
}

/// Keeps records in memory
///
/// Clones share the same buffer, so one clone can be handed to a session
/// while another is read from.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<LogRecord>>>);

impl MemorySink {
    /// Records collected so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.0
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn record(&self, record: &LogRecord) {
        if let Ok(mut records) = self.0.lock() {
            records.push(record.clone());
        }
    }
}
