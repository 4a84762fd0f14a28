//! Event Stream
//!
//! Time-ordered view over a recorded trace with the two queries the
//! reconstruction pass needs: the recognized start of the pipeline history,
//! and the events strictly time-nested inside a given event on the same
//! execution context.

use tracing::debug;

use crate::event::{Event, EventKind, PipelineStep};

/// Sorted, immutable event sequence for one recorded session.
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    /// Build a stream from raw ingestion output.
    ///
    /// Events are stably sorted by timestamp; ties keep producer order, which
    /// makes repeated reconstructions of the same input deterministic.
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        debug!(count = events.len(), "event stream ready");
        EventStream { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the recognized start marker: the first pipeline-issue event,
    /// falling back to the first event with a positive timestamp. `None`
    /// means the session has no processable history.
    pub fn start_index(&self) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.kind() == Some(EventKind::Pipeline(PipelineStep::IssueBeginFrame)))
            .or_else(|| self.events.iter().position(|e| e.timestamp > 0))
    }

    /// Events strictly nested inside `parent`'s time window on the same
    /// execution context. Empty when the parent has no duration.
    pub fn children<'a>(&'a self, parent: &'a Event) -> impl Iterator<Item = &'a Event> {
        let (from, to) = match parent.duration {
            Some(_) => (parent.timestamp, parent.end()),
            None => (0, 0),
        };
        let start = self.events.partition_point(|e| e.timestamp <= from);
        self.events[start..]
            .iter()
            .take_while(move |e| e.timestamp < to)
            .filter(move |e| e.context == parent.context)
    }
}
