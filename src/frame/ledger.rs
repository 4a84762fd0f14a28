//! Frame Ledger
//!
//! Tracks every frame owned by one compositor through its pipeline stages.
//! Three disjoint collections: pending (in flight), abandoned
//! (discarded/dropped/useless), completed (swapped). All mutation goes
//! through stage-transition operations that enforce multiplicity, state, and
//! ordering checks, routing violations to the warning log and continuing
//! with the best available candidate.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::frame::{Frame, FrameOutcome, FrameState, MainFrameLink, Stage};
use crate::types::{BindId, FrameOwner, MainFrameId, Micros, Slot};
use crate::warning::WarningLog;

#[derive(Debug, Clone, Serialize)]
pub struct FrameLedger {
    owner: FrameOwner,
    synthesize_at_boundary: bool,
    next_slot: Slot,
    /// In-flight frames in insertion order
    pending: BTreeMap<Slot, Frame>,
    /// Correlation index over pending; duplicates preserved for multiplicity checks
    #[serde(skip)]
    by_bind: HashMap<BindId, Vec<Slot>>,
    /// Discarded, dropped, and useless frames in retirement order
    abandoned: Vec<Frame>,
    /// Swapped frames in completion order
    completed: Vec<Frame>,
}

impl FrameLedger {
    pub fn new(owner: FrameOwner, synthesize_at_boundary: bool) -> Self {
        FrameLedger {
            owner,
            synthesize_at_boundary,
            next_slot: 0,
            pending: BTreeMap::new(),
            by_bind: HashMap::new(),
            abandoned: Vec::new(),
            completed: Vec::new(),
        }
    }

    pub fn owner(&self) -> FrameOwner {
        self.owner
    }

    pub fn pending(&self) -> impl Iterator<Item = &Frame> {
        self.pending.values()
    }

    pub fn completed(&self) -> &[Frame] {
        &self.completed
    }

    pub fn abandoned(&self) -> &[Frame] {
        &self.abandoned
    }

    pub fn dropped(&self) -> impl Iterator<Item = &Frame> {
        self.abandoned
            .iter()
            .filter(|f| matches!(f.outcome, Some(FrameOutcome::Dropped { .. })))
    }

    pub fn discarded(&self) -> impl Iterator<Item = &Frame> {
        self.abandoned
            .iter()
            .filter(|f| matches!(f.outcome, Some(FrameOutcome::Discarded { .. })))
    }

    pub fn useless(&self) -> impl Iterator<Item = &Frame> {
        self.abandoned
            .iter()
            .filter(|f| matches!(f.outcome, Some(FrameOutcome::Useless { .. })))
    }

    /// Correlation id to match a frame's nested pipeline markers against.
    /// None for boundary-synthesized records, whose bind id is fabricated.
    pub fn marker_bind(&self, slot: Slot) -> Option<BindId> {
        self.pending
            .get(&slot)
            .filter(|f| !f.synthesized)
            .map(|f| f.bind_id.clone())
    }

    /// New pending frame at pipeline issue.
    pub fn create(&mut self, bind_id: Option<&BindId>, ts: Micros, log: &mut WarningLog) {
        let Some(bind_id) = bind_id else {
            log.warn(ts, "IssueBeginFrame without correlation id");
            return;
        };
        self.insert(Frame::issued(bind_id.clone(), self.owner, ts));
    }

    /// Receipt of an issued frame by the owning compositor.
    pub fn receive_begin(&mut self, bind_id: Option<&BindId>, ts: Micros, log: &mut WarningLog) {
        let Some(bind_id) = bind_id else {
            log.warn(ts, "ReceiveBeginFrame without correlation id");
            return;
        };
        let slots = self.slots_for(bind_id);
        if slots.is_empty() {
            if self.boundary(FrameState::Issued) {
                let slot = self.synthesize(bind_id.clone(), FrameState::Received);
                self.record(slot, Stage::Received, ts);
            } else {
                log.one_and_only(ts, 0, "frames with same bind id (ReceiveBeginFrame)");
            }
            return;
        }
        log.one_and_only(ts, slots.len(), "frames with same bind id (ReceiveBeginFrame)");
        let slot = slots[0];
        self.apply_stage(
            slot,
            Stage::Received,
            ts,
            FrameState::Issued,
            FrameState::Received,
            "ReceiveBeginFrame",
            log,
        );
        self.sweep_lost_issue(slot, ts, log);
    }

    /// An older, still-unreceived issue left behind by this receipt never
    /// reached the compositor.
    fn sweep_lost_issue(&mut self, received: Slot, ts: Micros, log: &mut WarningLog) {
        let Some(received_issue) = self.pending.get(&received).and_then(|f| f.times.issued)
        else {
            return;
        };
        let received_bind = match self.pending.get(&received) {
            Some(f) => f.bind_id.clone(),
            None => return,
        };
        let lost = self
            .pending
            .iter()
            .find(|(_, f)| f.state == FrameState::Issued)
            .map(|(slot, _)| *slot);
        if let Some(lost) = lost {
            let is_lost = self
                .pending
                .get(&lost)
                .map(|f| {
                    f.bind_id != received_bind && f.times.issued.unwrap_or(0) < received_issue
                })
                .unwrap_or(false);
            if is_lost {
                log.warn(ts, "One IssueBeginFrame lost");
                self.retire(lost, FrameOutcome::Useless { at: ts });
            }
        }
    }

    /// Receipt arrived as a discard: terminal.
    pub fn receive_discard(&mut self, bind_id: Option<&BindId>, ts: Micros, log: &mut WarningLog) {
        let Some(bind_id) = bind_id else {
            log.warn(ts, "ReceiveBeginFrameDiscard without correlation id");
            return;
        };
        let slots = self.slots_for(bind_id);
        let slot = if slots.is_empty() {
            if self.boundary(FrameState::Issued) {
                self.synthesize(bind_id.clone(), FrameState::Issued)
            } else {
                log.one_and_only(ts, 0, "frames with same bind id (ReceiveBeginFrameDiscard)");
                return;
            }
        } else {
            log.one_and_only(
                ts,
                slots.len(),
                "frames with same bind id (ReceiveBeginFrameDiscard)",
            );
            slots[0]
        };
        self.record(slot, Stage::Discarded, ts);
        self.retire(slot, FrameOutcome::Discarded { at: ts });
    }

    /// Scheduler acceptance: assigns the sequence number.
    ///
    /// When nothing is awaiting scheduling, falls back to re-activating the
    /// most recently dropped frame — the scheduler retries drops on its own.
    pub fn schedule(&mut self, sequence: Option<u64>, ts: Micros, log: &mut WarningLog) {
        let candidates = self.pending_in(FrameState::Received);
        let slot = if candidates.is_empty() {
            if let Some(pos) = self
                .abandoned
                .iter()
                .rposition(|f| matches!(f.outcome, Some(FrameOutcome::Dropped { .. })))
            {
                log.warn(ts, "Scheduler accepted a frame previously dropped");
                let mut frame = self.abandoned.remove(pos);
                frame.outcome = None;
                frame.state = FrameState::Received;
                self.insert(frame)
            } else if self.boundary(FrameState::Received) {
                self.synthesize_unbound(FrameState::Received)
            } else {
                log.one_and_only(ts, 0, "frames awaiting scheduler (BeginImplFrame)");
                return;
            }
        } else {
            log.one_and_only(ts, candidates.len(), "frames awaiting scheduler (BeginImplFrame)");
            candidates[0]
        };
        if let Some(frame) = self.pending.get_mut(&slot) {
            if sequence.is_some() {
                frame.sequence = sequence;
            }
        }
        self.apply_stage(
            slot,
            Stage::Scheduled,
            ts,
            FrameState::Received,
            FrameState::Scheduled,
            "BeginImplFrame",
            log,
        );
    }

    /// Begin-frame marker nested under the scheduler acceptance.
    pub fn begin_frame_fired(&mut self, sequence: Option<u64>, ts: Micros, log: &mut WarningLog) {
        let candidates: Vec<Slot> = self
            .pending
            .iter()
            .filter(|(_, f)| {
                f.state == FrameState::Scheduled
                    && f.times.begin_frame_fired.is_none()
                    && match (sequence, f.sequence) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    }
            })
            .map(|(slot, _)| *slot)
            .collect();
        if candidates.is_empty() {
            if self.boundary(FrameState::Scheduled) {
                let slot = self.synthesize_unbound(FrameState::Scheduled);
                if let Some(frame) = self.pending.get_mut(&slot) {
                    frame.sequence = sequence;
                }
                self.record(slot, Stage::BeginFrameFired, ts);
            } else {
                log.one_and_only(ts, 0, "scheduled frames with same sequence (BeginFrame)");
            }
            return;
        }
        log.one_and_only(
            ts,
            candidates.len(),
            "scheduled frames with same sequence (BeginFrame)",
        );
        self.apply_stage(
            candidates[0],
            Stage::BeginFrameFired,
            ts,
            FrameState::Scheduled,
            FrameState::Scheduled,
            "BeginFrame",
            log,
        );
    }

    /// Scheduler dropped the oldest frame still awaiting acceptance.
    pub fn drop_unscheduled(&mut self, ts: Micros) {
        let candidates = self.pending_in(FrameState::Received);
        if let Some(&slot) = candidates.first() {
            self.retire(slot, FrameOutcome::Dropped { at: ts });
        }
    }

    /// Deadline passed without a draw: the scheduled frame rendered nothing.
    /// No-op when no frame is awaiting drawing.
    pub fn mark_undrawn_useless(&mut self, ts: Micros, log: &mut WarningLog) {
        let candidates = self.pending_in(FrameState::Scheduled);
        if candidates.is_empty() {
            return;
        }
        log.one_and_only(ts, candidates.len(), "frames awaiting draw (OnBeginImplFrameDeadline)");
        self.retire(candidates[0], FrameOutcome::Useless { at: ts });
    }

    /// The unique frame a draw cycle applies to, synthesizing one at the
    /// trace boundary.
    pub fn drawing_candidate(&mut self, ts: Micros, log: &mut WarningLog) -> Option<Slot> {
        let candidates = self.pending_in(FrameState::Scheduled);
        if candidates.is_empty() {
            if self.boundary(FrameState::Scheduled) {
                return Some(self.synthesize_unbound(FrameState::Scheduled));
            }
            log.one_and_only(ts, 0, "frames awaiting draw (ScheduledActionDraw)");
            return None;
        }
        log.one_and_only(ts, candidates.len(), "frames awaiting draw (ScheduledActionDraw)");
        Some(candidates[0])
    }

    pub fn generate_render_pass(&mut self, slot: Slot, ts: Micros, log: &mut WarningLog) {
        self.apply_stage(
            slot,
            Stage::RenderPassGenerated,
            ts,
            FrameState::Scheduled,
            FrameState::Drawing,
            "GenerateRenderPass",
            log,
        );
    }

    pub fn generate_compositor_frame(&mut self, slot: Slot, ts: Micros, log: &mut WarningLog) {
        self.apply_stage(
            slot,
            Stage::CompositorFrameGenerated,
            ts,
            FrameState::Drawing,
            FrameState::Drawing,
            "GenerateCompositorFrame",
            log,
        );
    }

    pub fn submit_compositor_frame(&mut self, slot: Slot, ts: Micros, log: &mut WarningLog) {
        self.apply_stage(
            slot,
            Stage::CompositorFrameSubmitted,
            ts,
            FrameState::Drawing,
            FrameState::Submitted,
            "SubmitCompositorFrame",
            log,
        );
    }

    /// The display compositor received the submitted frame back.
    pub fn receive_compositor_frame(
        &mut self,
        bind_id: Option<&BindId>,
        ts: Micros,
        log: &mut WarningLog,
    ) {
        let Some(bind_id) = bind_id else {
            log.warn(ts, "ReceiveCompositorFrame without correlation id");
            return;
        };
        let slots = self.slots_for(bind_id);
        if slots.is_empty() {
            if self.boundary(FrameState::Submitted) {
                let slot = self.synthesize(bind_id.clone(), FrameState::FrameReceived);
                self.record(slot, Stage::CompositorFrameReceived, ts);
            } else {
                log.one_and_only(ts, 0, "frames with same bind id (ReceiveCompositorFrame)");
            }
            return;
        }
        log.one_and_only(ts, slots.len(), "frames with same bind id (ReceiveCompositorFrame)");
        let slot = slots[0];
        let ungenerated = self
            .pending
            .get(&slot)
            .map(|f| {
                f.state == FrameState::Submitted && f.times.compositor_frame_generated.is_none()
            })
            .unwrap_or(false);
        if ungenerated {
            log.warn(ts, "Received compositor frame that was not generated");
        }
        self.apply_stage(
            slot,
            Stage::CompositorFrameReceived,
            ts,
            FrameState::Submitted,
            FrameState::FrameReceived,
            "ReceiveCompositorFrame",
            log,
        );
    }

    /// Aggregation into the display surface. Establishes the swap key the
    /// GPU swap will match on.
    pub fn aggregate_surface(
        &mut self,
        bind_id: Option<&BindId>,
        ts: Micros,
        swap_key: Option<u64>,
        log: &mut WarningLog,
    ) {
        let Some(bind_id) = bind_id else {
            log.warn(ts, "SurfaceAggregation without correlation id");
            return;
        };
        let slots = self.slots_for(bind_id);
        if !slots.is_empty() {
            log.one_and_only(ts, slots.len(), "frames with same bind id (SurfaceAggregation)");
            let slot = slots[0];
            self.apply_stage(
                slot,
                Stage::SurfaceAggregated,
                ts,
                FrameState::FrameReceived,
                FrameState::Aggregated,
                "SurfaceAggregation",
                log,
            );
            if let Some(frame) = self.pending.get_mut(&slot) {
                frame.swap_key = swap_key;
            }
            return;
        }
        // An already-completed frame resurfacing is legitimate only for the
        // most recent completion.
        if let Some(pos) = self.completed.iter().rposition(|f| f.bind_id == *bind_id) {
            if pos + 1 != self.completed.len() {
                log.warn(ts, "Aggregated frame is not the most recently completed one");
            }
            return;
        }
        if self.boundary(FrameState::FrameReceived) {
            let slot = self.synthesize(bind_id.clone(), FrameState::Aggregated);
            self.record(slot, Stage::SurfaceAggregated, ts);
            if let Some(frame) = self.pending.get_mut(&slot) {
                frame.swap_key = swap_key;
            }
        } else {
            log.one_and_only(ts, 0, "frames with same bind id (SurfaceAggregation)");
        }
    }

    /// GPU buffer swap: completes the frame. Matches by the key established
    /// at aggregation, falling back to the unique frame awaiting swap.
    pub fn swap(
        &mut self,
        swap_key: Option<u64>,
        ts: Micros,
        duration: Option<Micros>,
        log: &mut WarningLog,
    ) {
        let by_key: Vec<Slot> = match swap_key {
            Some(key) => self
                .pending
                .iter()
                .filter(|(_, f)| f.swap_key == Some(key))
                .map(|(slot, _)| *slot)
                .collect(),
            None => Vec::new(),
        };
        let candidates = if by_key.is_empty() {
            self.pending_in(FrameState::Aggregated)
        } else {
            by_key
        };
        let slot = if candidates.is_empty() {
            if self.boundary(FrameState::Aggregated) {
                self.synthesize_unbound(FrameState::Aggregated)
            } else {
                log.one_and_only(ts, 0, "frames awaiting swap (RealSwapBuffers)");
                return;
            }
        } else {
            log.one_and_only(ts, candidates.len(), "frames awaiting swap (RealSwapBuffers)");
            candidates[0]
        };
        self.apply_stage(
            slot,
            Stage::SwapIssued,
            ts,
            FrameState::Aggregated,
            FrameState::Aggregated,
            "RealSwapBuffers",
            log,
        );
        let end = ts + duration.unwrap_or(0);
        self.record(slot, Stage::Completed, end);
        self.retire(slot, FrameOutcome::Completed { at: end });
    }

    /// Remember which main frame a draw targeted, ahead of the full merge.
    pub fn set_main_frame_target(&mut self, slot: Slot, id: MainFrameId) {
        if let Some(frame) = self.pending.get_mut(&slot) {
            if frame.main_frame.is_none() {
                frame.main_frame = Some(MainFrameLink {
                    id,
                    request_sent: None,
                    begin: None,
                    commit_received: None,
                    activated: None,
                });
            }
        }
    }

    /// Merge the displayed main frame's timestamps into the frame.
    pub fn attach_main_frame(&mut self, slot: Slot, link: MainFrameLink, first_draw: bool) {
        if let Some(frame) = self.pending.get_mut(&slot) {
            frame.main_frame = Some(link);
            frame.drew_main_frame = first_draw;
        }
    }

    /// Retire a frame that drew nothing visible.
    pub fn mark_useless(&mut self, slot: Slot, ts: Micros) {
        self.retire(slot, FrameOutcome::Useless { at: ts });
    }

    fn insert(&mut self, frame: Frame) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.by_bind
            .entry(frame.bind_id.clone())
            .or_default()
            .push(slot);
        self.pending.insert(slot, frame);
        slot
    }

    fn synthesize(&mut self, bind_id: BindId, state: FrameState) -> Slot {
        debug!(owner = %self.owner, bind = %bind_id, ?state, "synthesizing frame at trace boundary");
        self.insert(Frame::synthesized_at(bind_id, self.owner, state))
    }

    /// Boundary synthesis for stages whose events carry no correlation id.
    fn synthesize_unbound(&mut self, state: FrameState) -> Slot {
        let bind_id = BindId::new(format!("synthetic-{}", self.next_slot));
        self.synthesize(bind_id, state)
    }

    fn retire(&mut self, slot: Slot, outcome: FrameOutcome) {
        let Some(mut frame) = self.pending.remove(&slot) else {
            return;
        };
        if let Some(slots) = self.by_bind.get_mut(&frame.bind_id) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.by_bind.remove(&frame.bind_id);
            }
        }
        frame.outcome = Some(outcome);
        match outcome {
            FrameOutcome::Completed { .. } => self.completed.push(frame),
            _ => self.abandoned.push(frame),
        }
    }

    fn slots_for(&self, bind_id: &BindId) -> Vec<Slot> {
        self.by_bind.get(bind_id).cloned().unwrap_or_default()
    }

    fn pending_in(&self, state: FrameState) -> Vec<Slot> {
        self.pending
            .iter()
            .filter(|(_, f)| f.state == state)
            .map(|(slot, _)| *slot)
            .collect()
    }

    /// Uniform boundary rule: no completed history and nothing pending in
    /// the wait-state the incoming transition targets means the pipeline
    /// instance began before the trace window.
    fn boundary(&self, awaiting: FrameState) -> bool {
        self.synthesize_at_boundary
            && self.completed.is_empty()
            && !self.pending.values().any(|f| f.state == awaiting)
    }

    fn record(&mut self, slot: Slot, stage: Stage, ts: Micros) {
        if let Some(frame) = self.pending.get_mut(&slot) {
            frame.times.record(stage, ts);
        }
    }

    fn apply_stage(
        &mut self,
        slot: Slot,
        stage: Stage,
        ts: Micros,
        expected: FrameState,
        next: FrameState,
        what: &str,
        log: &mut WarningLog,
    ) {
        let Some(frame) = self.pending.get_mut(&slot) else {
            return;
        };
        if frame.state != expected {
            log.warn(
                ts,
                format!("{} for frame in unexpected state {:?}", what, frame.state),
            );
        }
        if let Some(floor) = frame.times.record(stage, ts) {
            log.warn(
                ts,
                format!("{} at {} moves frame backward (prior stage at {})", what, ts, floor),
            );
        }
        frame.state = next;
    }
}
