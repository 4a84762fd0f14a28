//! Compositor Frames
//!
//! One `Frame` per instance of the display pipeline, from being issued by the
//! display compositor to being swapped onto screen or abandoned. Lifecycle
//! position is an explicit state enum; every populated stage timestamp is
//! retained alongside it for audit output.

pub mod ledger;

pub use ledger::FrameLedger;

use serde::{Deserialize, Serialize};

use crate::types::{BindId, FrameOwner, MainFrameId, Micros};

/// Canonical pipeline stages, in order. Recording a timestamp earlier than a
/// stage already set before it in this order is an ordering violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Issued,
    Received,
    Discarded,
    Scheduled,
    BeginFrameFired,
    RenderPassGenerated,
    CompositorFrameGenerated,
    CompositorFrameSubmitted,
    CompositorFrameReceived,
    SurfaceAggregated,
    SwapIssued,
    Completed,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Issued,
        Stage::Received,
        Stage::Discarded,
        Stage::Scheduled,
        Stage::BeginFrameFired,
        Stage::RenderPassGenerated,
        Stage::CompositorFrameGenerated,
        Stage::CompositorFrameSubmitted,
        Stage::CompositorFrameReceived,
        Stage::SurfaceAggregated,
        Stage::SwapIssued,
        Stage::Completed,
    ];
}

/// Optional timestamp per pipeline stage.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discarded: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_frame_fired: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_pass_generated: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compositor_frame_generated: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compositor_frame_submitted: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compositor_frame_received: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_aggregated: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_issued: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<Micros>,
}

impl StageTimes {
    pub fn get(&self, stage: Stage) -> Option<Micros> {
        match stage {
            Stage::Issued => self.issued,
            Stage::Received => self.received,
            Stage::Discarded => self.discarded,
            Stage::Scheduled => self.scheduled,
            Stage::BeginFrameFired => self.begin_frame_fired,
            Stage::RenderPassGenerated => self.render_pass_generated,
            Stage::CompositorFrameGenerated => self.compositor_frame_generated,
            Stage::CompositorFrameSubmitted => self.compositor_frame_submitted,
            Stage::CompositorFrameReceived => self.compositor_frame_received,
            Stage::SurfaceAggregated => self.surface_aggregated,
            Stage::SwapIssued => self.swap_issued,
            Stage::Completed => self.completed,
        }
    }

    fn set(&mut self, stage: Stage, ts: Micros) {
        let slot = match stage {
            Stage::Issued => &mut self.issued,
            Stage::Received => &mut self.received,
            Stage::Discarded => &mut self.discarded,
            Stage::Scheduled => &mut self.scheduled,
            Stage::BeginFrameFired => &mut self.begin_frame_fired,
            Stage::RenderPassGenerated => &mut self.render_pass_generated,
            Stage::CompositorFrameGenerated => &mut self.compositor_frame_generated,
            Stage::CompositorFrameSubmitted => &mut self.compositor_frame_submitted,
            Stage::CompositorFrameReceived => &mut self.compositor_frame_received,
            Stage::SurfaceAggregated => &mut self.surface_aggregated,
            Stage::SwapIssued => &mut self.swap_issued,
            Stage::Completed => &mut self.completed,
        };
        *slot = Some(ts);
    }

    /// Record a stage timestamp. Returns the violated floor when `ts` moves
    /// backward relative to a stage already set earlier in canonical order;
    /// the value is recorded regardless (best-effort).
    pub fn record(&mut self, stage: Stage, ts: Micros) -> Option<Micros> {
        let floor = Stage::ALL
            .iter()
            .take_while(|s| **s <= stage)
            .filter_map(|s| self.get(*s))
            .max();
        self.set(stage, ts);
        match floor {
            Some(floor) if ts < floor => Some(floor),
            _ => None,
        }
    }
}

/// Position of a pending frame in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameState {
    /// Issued by the display compositor, awaiting receipt or discard
    Issued,
    /// Received by the owning compositor, awaiting scheduler acceptance
    Received,
    /// Accepted by the scheduler, awaiting the draw deadline
    Scheduled,
    /// Render pass generated, draw in progress
    Drawing,
    /// Compositor frame submitted, awaiting receipt back on the display side
    Submitted,
    /// Compositor frame received, awaiting surface aggregation
    FrameReceived,
    /// Aggregated into the display surface, awaiting the buffer swap
    Aggregated,
}

/// Terminal classification. At most one outcome is ever assigned; the record
/// is immutable once it carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOutcome {
    /// Receipt arrived as a discard: the compositor refused the frame
    Discarded { at: Micros },
    /// The scheduler dropped the frame before acceptance
    Dropped { at: Micros },
    /// Scheduled but never drew anything visible
    Useless { at: Micros },
    /// Swapped onto screen
    Completed { at: Micros },
}

/// Fields copied from the main frame a frame displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainFrameLink {
    pub id: MainFrameId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_sent: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_received: Option<Micros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<Micros>,
}

/// One instance of the compositor display pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub bind_id: BindId,
    pub owner: FrameOwner,
    /// Assigned once the scheduler accepts the frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub state: FrameState,
    pub times: StageTimes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<FrameOutcome>,
    /// Key established at aggregation and matched by the GPU swap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_key: Option<u64>,
    /// Main frame this frame displays, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_frame: Option<MainFrameLink>,
    /// True when this frame performed the main frame's first draw
    pub drew_main_frame: bool,
    /// True when the record was fabricated for a pipeline instance whose
    /// earlier stages predate the trace window
    pub synthesized: bool,
}

impl Frame {
    /// New frame at pipeline issue.
    pub fn issued(bind_id: BindId, owner: FrameOwner, ts: Micros) -> Self {
        let mut times = StageTimes::default();
        times.record(Stage::Issued, ts);
        Frame {
            bind_id,
            owner,
            sequence: None,
            state: FrameState::Issued,
            times,
            outcome: None,
            swap_key: None,
            main_frame: None,
            drew_main_frame: false,
            synthesized: false,
        }
    }

    /// Boundary synthesis: a zero-issue-timestamp frame already advanced to
    /// `state`, for pipeline instances that began before the trace window.
    pub fn synthesized_at(bind_id: BindId, owner: FrameOwner, state: FrameState) -> Self {
        let mut frame = Frame::issued(bind_id, owner, 0);
        frame.state = state;
        frame.synthesized = true;
        frame
    }
}
