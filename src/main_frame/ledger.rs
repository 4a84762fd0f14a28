//! Main-Frame Ledger
//!
//! Tracks content-update cycles from request to first draw, mirroring the
//! frame ledger's structure. The `first_draw` operation is the cross-ledger
//! linkage point: the engine calls it with the main-frame id a draw targeted
//! and merges the returned link into the drawing frame.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::frame::MainFrameLink;
use crate::main_frame::{MainFrame, MainFrameOutcome, MainFrameState};
use crate::types::{MainFrameId, Micros, Slot};
use crate::warning::WarningLog;

/// Result of resolving a draw's target main frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawLink {
    /// The draw is the main frame's first: the record moved to the drawn
    /// collection and the frame carries the main-frame marker.
    First(MainFrameLink),
    /// The draw repeats an already-drawn main frame.
    Redraw(MainFrameLink),
}

impl DrawLink {
    pub fn link(&self) -> MainFrameLink {
        match self {
            DrawLink::First(link) | DrawLink::Redraw(link) => *link,
        }
    }

    pub fn is_first(&self) -> bool {
        matches!(self, DrawLink::First(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MainFrameLedger {
    synthesize_at_boundary: bool,
    next_slot: Slot,
    /// In-flight cycles in request order
    pending: BTreeMap<Slot, MainFrame>,
    #[serde(skip)]
    by_id: HashMap<MainFrameId, Vec<Slot>>,
    /// Aborted cycles in retirement order
    aborted: Vec<MainFrame>,
    /// Drawn cycles in first-draw order
    drawn: Vec<MainFrame>,
}

impl MainFrameLedger {
    pub fn new(synthesize_at_boundary: bool) -> Self {
        MainFrameLedger {
            synthesize_at_boundary,
            next_slot: 0,
            pending: BTreeMap::new(),
            by_id: HashMap::new(),
            aborted: Vec::new(),
            drawn: Vec::new(),
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &MainFrame> {
        self.pending.values()
    }

    pub fn aborted(&self) -> &[MainFrame] {
        &self.aborted
    }

    pub fn drawn(&self) -> &[MainFrame] {
        &self.drawn
    }

    /// New cycle on a send-request. Duplicate ids are warned and recorded
    /// anyway; the correlation index keeps both for multiplicity checks.
    pub fn create(&mut self, id: MainFrameId, ts: Micros, log: &mut WarningLog) {
        if self.drawn.iter().any(|f| f.id == id) {
            log.warn(ts, "Main frame already drawn (SendBeginMainFrame)");
        }
        if self.pending.values().any(|f| f.id == id) {
            log.warn(ts, "Main frame already requested (SendBeginMainFrame)");
        }
        self.insert(MainFrame::requested(id, ts));
    }

    /// Content-side processing began. The nested child markers decide the
    /// outcome: a commit marker means updates are ready, an early-out marker
    /// means the cycle aborts. Both or neither present is a violation and
    /// the cycle stays in the undecided `Begun` state.
    pub fn begin(
        &mut self,
        id: Option<MainFrameId>,
        ts: Micros,
        commit_marks: &[Micros],
        abort_marks: usize,
        log: &mut WarningLog,
    ) {
        let candidates = self.pending_in(MainFrameState::Requested);
        let slot = if candidates.is_empty() {
            match (self.boundary(MainFrameState::Requested), id) {
                (true, Some(id)) => self.synthesize(id, MainFrameState::Requested),
                _ => {
                    log.one_and_only(ts, 0, "main frames requested (BeginMainFrame)");
                    return;
                }
            }
        } else {
            log.one_and_only(ts, candidates.len(), "main frames requested (BeginMainFrame)");
            candidates[0]
        };
        let Some(frame) = self.pending.get_mut(&slot) else {
            return;
        };
        if let Some(id) = id {
            if frame.id != id {
                log.warn(ts, "BeginMainFrame and SendBeginMainFrame don't match");
                return;
            }
        }
        frame.times.begin = Some(ts);
        match (commit_marks.len(), abort_marks) {
            (0, 0) => {
                log.warn(ts, "Main frame neither committed nor aborted");
                frame.state = MainFrameState::Begun;
            }
            (c, a) if c > 0 && a > 0 => {
                log.warn(ts, "Main frame both committed and aborted");
                frame.state = MainFrameState::Begun;
            }
            (c, _) if c > 0 => {
                if log.one_and_only(ts, c, "commit markers (BeginMainFrame)") {
                    frame.times.commit_ready = Some(commit_marks[0]);
                }
                frame.state = MainFrameState::CommitReady;
            }
            _ => {
                frame.aborted = true;
                frame.state = MainFrameState::AbortPending;
            }
        }
    }

    /// Compositor-side acknowledgement of an aborted cycle: terminal.
    ///
    /// Boundary exception: with no main-frame history at all this is a
    /// no-op rather than a synthesis — fabricating a record only to abort
    /// it would record nothing useful.
    pub fn abort(&mut self, ts: Micros, log: &mut WarningLog) {
        let candidates = self.pending_in(MainFrameState::AbortPending);
        if candidates.is_empty() {
            if !self.no_history() {
                log.one_and_only(ts, 0, "main frames awaiting abort (BeginMainFrameAborted)");
            }
            return;
        }
        log.one_and_only(ts, candidates.len(), "main frames awaiting abort (BeginMainFrameAborted)");
        let slot = candidates[0];
        if let Some(frame) = self.pending.get_mut(&slot) {
            frame.times.aborted = Some(ts);
        }
        self.retire(slot, MainFrameOutcome::Aborted { at: ts });
    }

    /// Commit applied to the pending compositor tree. `begin_commits` are
    /// the nested begin-commit marker timestamps; `draw_props_ids` the
    /// main-frame ids named by nested draw-properties markers, cross-checked
    /// against the cycle mid-commit.
    pub fn commit(
        &mut self,
        ts: Micros,
        begin_commits: &[Micros],
        draw_props_ids: &[MainFrameId],
        log: &mut WarningLog,
    ) {
        let candidates = self.pending_in(MainFrameState::CommitReady);
        let slot = if candidates.is_empty() {
            match (self.boundary(MainFrameState::CommitReady), draw_props_ids.first()) {
                (true, Some(id)) => self.synthesize(*id, MainFrameState::CommitReady),
                _ => {
                    log.one_and_only(ts, 0, "main frames awaiting commit (ScheduledActionCommit)");
                    return;
                }
            }
        } else {
            log.one_and_only(
                ts,
                candidates.len(),
                "main frames awaiting commit (ScheduledActionCommit)",
            );
            candidates[0]
        };
        let Some(frame) = self.pending.get_mut(&slot) else {
            return;
        };
        if log.one_and_only(ts, begin_commits.len(), "begin-commit markers (ScheduledActionCommit)") {
            frame.times.commit_received = Some(begin_commits[0]);
            frame.state = MainFrameState::Committed;
        }
        if log.one_and_only(
            ts,
            draw_props_ids.len(),
            "draw-properties markers (ScheduledActionCommit)",
        ) && draw_props_ids[0] != frame.id
        {
            log.warn(ts, "Commit not for the pending main frame");
        }
    }

    /// Pending tree activated: the cycle becomes eligible for drawing.
    pub fn activate(&mut self, id: Option<MainFrameId>, ts: Micros, log: &mut WarningLog) {
        let committed = self.pending_in(MainFrameState::Committed);
        let candidates: Vec<Slot> = match id {
            Some(id) => committed
                .iter()
                .copied()
                .filter(|slot| self.pending.get(slot).map(|f| f.id == id).unwrap_or(false))
                .collect(),
            None => committed.clone(),
        };
        let slot = if candidates.is_empty() {
            match (self.boundary(MainFrameState::Committed), id) {
                (true, Some(id)) => self.synthesize(id, MainFrameState::Committed),
                _ => {
                    log.one_and_only(ts, 0, "main frames with same id awaiting activation (ActivateLayerTree)");
                    return;
                }
            }
        } else {
            log.one_and_only(
                ts,
                candidates.len(),
                "main frames with same id awaiting activation (ActivateLayerTree)",
            );
            // more than one committed cycle awaiting activation is itself a violation
            log.one_and_only(ts, committed.len(), "main frames awaiting activation (ActivateLayerTree)");
            candidates[0]
        };
        if let Some(frame) = self.pending.get_mut(&slot) {
            frame.times.activated = Some(ts);
            frame.state = MainFrameState::Activated;
        }
    }

    /// Resolve the main frame a draw targets; the linkage point between
    /// ledgers.
    ///
    /// An activated-but-undrawn cycle with the id is marked drawn and moves
    /// to the drawn collection. An already-drawn cycle yields a redraw link,
    /// warning when it is not the most recently drawn one. With several
    /// activated cycles waiting, a newer id supersedes the oldest only if
    /// that one was marked skippable; otherwise the pile-up is a warning.
    pub fn first_draw(
        &mut self,
        id: MainFrameId,
        ts: Micros,
        log: &mut WarningLog,
    ) -> Option<DrawLink> {
        let pending_match: Vec<Slot> = self
            .slots_for(id)
            .into_iter()
            .filter(|slot| {
                self.pending
                    .get(slot)
                    .map(|f| f.state == MainFrameState::Activated)
                    .unwrap_or(false)
            })
            .collect();
        let drawn_match = self.drawn.iter().rposition(|f| f.id == id);
        let total = pending_match.len() + usize::from(drawn_match.is_some());
        if total == 0 {
            if self.boundary(MainFrameState::Activated) {
                let mut frame = MainFrame::synthesized_at(id, MainFrameState::Activated);
                frame.times.first_draw = Some(ts);
                let link = frame.link();
                frame.outcome = Some(MainFrameOutcome::Drawn { at: ts });
                debug!(id = %id, "synthesizing main frame at trace boundary");
                self.drawn.push(frame);
                return Some(DrawLink::First(link));
            }
            log.warn(ts, "Unknown source frame number (PrepareToDraw)");
            return None;
        }
        if total > 1 {
            log.one_and_only(ts, total, "main frames with same id (PrepareToDraw)");
            return None;
        }
        if let Some(pos) = drawn_match {
            if pos + 1 != self.drawn.len() {
                log.warn(ts, "Not the last main frame redrawn");
            }
            return Some(DrawLink::Redraw(self.drawn[pos].link()));
        }
        let slot = pending_match[0];
        self.resolve_supersession(id, ts, log);
        let Some(frame) = self.pending.get_mut(&slot) else {
            return None;
        };
        frame.times.first_draw = Some(ts);
        let link = frame.link();
        self.retire(slot, MainFrameOutcome::Drawn { at: ts });
        Some(DrawLink::First(link))
    }

    /// A draw cycle produced no visible output for this cycle: a later one
    /// may supersede it without a warning.
    pub fn mark_skippable(&mut self, id: MainFrameId, ts: Micros, log: &mut WarningLog) {
        let candidates: Vec<Slot> = self
            .slots_for(id)
            .into_iter()
            .filter(|slot| {
                self.pending
                    .get(slot)
                    .map(|f| f.state == MainFrameState::Activated)
                    .unwrap_or(false)
            })
            .collect();
        match candidates.len() {
            0 => {}
            1 => {
                if let Some(frame) = self.pending.get_mut(&candidates[0]) {
                    frame.can_be_skipped = true;
                }
            }
            n => {
                log.one_and_only(ts, n, "main frames with same id (PrepareToDraw)");
            }
        }
    }

    /// Draw observed with no frame to attach it to: credit the oldest
    /// pending cycle when the id matches, without warnings.
    pub fn draw_without_frame(&mut self, id: MainFrameId, ts: Micros) {
        let oldest = self
            .pending
            .iter()
            .next()
            .filter(|(_, f)| f.id == id)
            .map(|(slot, _)| *slot);
        if let Some(slot) = oldest {
            if let Some(frame) = self.pending.get_mut(&slot) {
                frame.times.first_draw = Some(ts);
            }
            self.retire(slot, MainFrameOutcome::Drawn { at: ts });
        }
    }

    /// With several activated cycles waiting, drawing a newer id aborts the
    /// oldest if it was marked skippable; otherwise warn.
    fn resolve_supersession(&mut self, drawing: MainFrameId, ts: Micros, log: &mut WarningLog) {
        let waiting = self.pending_in(MainFrameState::Activated);
        if waiting.len() <= 1 {
            return;
        }
        let oldest = waiting[0];
        let (oldest_id, skippable) = match self.pending.get(&oldest) {
            Some(f) => (f.id, f.can_be_skipped),
            None => return,
        };
        if drawing > oldest_id && skippable {
            if let Some(frame) = self.pending.get_mut(&oldest) {
                frame.times.aborted = Some(ts);
            }
            self.retire(oldest, MainFrameOutcome::Aborted { at: ts });
        } else {
            log.one_and_only(ts, waiting.len(), "activated main frames awaiting first draw");
        }
    }

    fn insert(&mut self, frame: MainFrame) -> Slot {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.by_id.entry(frame.id).or_default().push(slot);
        self.pending.insert(slot, frame);
        slot
    }

    fn synthesize(&mut self, id: MainFrameId, state: MainFrameState) -> Slot {
        debug!(id = %id, ?state, "synthesizing main frame at trace boundary");
        self.insert(MainFrame::synthesized_at(id, state))
    }

    fn retire(&mut self, slot: Slot, outcome: MainFrameOutcome) {
        let Some(mut frame) = self.pending.remove(&slot) else {
            return;
        };
        if let Some(slots) = self.by_id.get_mut(&frame.id) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.by_id.remove(&frame.id);
            }
        }
        frame.outcome = Some(outcome);
        match outcome {
            MainFrameOutcome::Aborted { .. } => self.aborted.push(frame),
            MainFrameOutcome::Drawn { .. } => self.drawn.push(frame),
        }
    }

    fn slots_for(&self, id: MainFrameId) -> Vec<Slot> {
        self.by_id.get(&id).cloned().unwrap_or_default()
    }

    fn pending_in(&self, state: MainFrameState) -> Vec<Slot> {
        self.pending
            .iter()
            .filter(|(_, f)| f.state == state)
            .map(|(slot, _)| *slot)
            .collect()
    }

    fn no_history(&self) -> bool {
        self.pending.is_empty() && self.aborted.is_empty() && self.drawn.is_empty()
    }

    fn boundary(&self, awaiting: MainFrameState) -> bool {
        self.synthesize_at_boundary
            && self.drawn.is_empty()
            && self.aborted.is_empty()
            && !self.pending.values().any(|f| f.state == awaiting)
    }
}
