//! Main-frame lifecycle records.
//!
//! A main frame is one content-side update cycle: requested by the
//! compositor scheduler, processed on the content thread, committed back to
//! the compositor tree, activated, and finally drawn by some frame. Aborts
//! (no content updates) are terminal. States are explicit so the ledger
//! never has to infer "waiting for X" from which timestamps happen to be
//! set.

pub mod ledger;

pub use ledger::MainFrameLedger;

use serde::Serialize;

use crate::frame::MainFrameLink;
use crate::types::{MainFrameId, Micros};

/// Pending lifecycle states, in order of normal progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MainFrameState {
    /// Request sent to the content thread, processing not yet begun.
    Requested,
    /// Processing began but the nested commit/abort markers were missing or
    /// contradictory, so the outcome is unknown.
    Begun,
    /// Content finished with updates to commit.
    CommitReady,
    /// Content finished without updates; waiting for the compositor-side
    /// abort acknowledgement.
    AbortPending,
    /// Commit applied to the pending compositor tree.
    Committed,
    /// Pending tree activated; eligible for drawing.
    Activated,
}

/// Terminal outcome, set when the record leaves the pending collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MainFrameOutcome {
    Aborted { at: Micros },
    Drawn { at: Micros },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MainFrameTimes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_sent: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_ready: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_received: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_draw: Option<Micros>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MainFrame {
    pub id: MainFrameId,
    pub state: MainFrameState,
    pub times: MainFrameTimes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MainFrameOutcome>,
    /// Content reported no updates for this cycle.
    pub aborted: bool,
    /// A later main frame may supersede this one before it is drawn.
    pub can_be_skipped: bool,
    /// Fabricated at the trace boundary; earlier stages predate the window.
    pub synthesized: bool,
}

impl MainFrame {
    pub fn requested(id: MainFrameId, ts: Micros) -> Self {
        MainFrame {
            id,
            state: MainFrameState::Requested,
            times: MainFrameTimes {
                request_sent: Some(ts),
                ..MainFrameTimes::default()
            },
            outcome: None,
            aborted: false,
            can_be_skipped: false,
            synthesized: false,
        }
    }

    /// Boundary record: the request predates the trace window.
    pub fn synthesized_at(id: MainFrameId, state: MainFrameState) -> Self {
        MainFrame {
            id,
            state,
            times: MainFrameTimes {
                request_sent: Some(0),
                ..MainFrameTimes::default()
            },
            outcome: None,
            aborted: false,
            can_be_skipped: false,
            synthesized: true,
        }
    }

    /// The fields a frame copies when it displays this main frame.
    pub fn link(&self) -> MainFrameLink {
        MainFrameLink {
            id: self.id,
            request_sent: self.times.request_sent,
            begin: self.times.begin,
            commit_received: self.times.commit_received,
            activated: self.times.activated,
        }
    }
}
