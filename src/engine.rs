//! Reconstruction Engine
//!
//! Single pass over a time-ordered event stream. Each recognized event is
//! routed by (role, name, nested step) to a ledger operation; compound
//! events pull in their synchronously nested children through the stream's
//! child query. The engine holds no durable state of its own — ledgers are
//! created fresh per run and returned in the result, so repeated runs over
//! the same input are independent and deterministic.

use serde::Serialize;
use tracing::{instrument, trace};

use crate::config::ReconstructionConfig;
use crate::event::{Event, EventKind, EventStream, PipelineStep};
use crate::frame::FrameLedger;
use crate::main_frame::MainFrameLedger;
use crate::types::{ContextRole, FrameOwner, MainFrameId, Micros};
use crate::warning::{Warning, WarningLog};

/// Final ledger states plus the ordered warning log for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Reconstruction {
    pub compositor_frames: FrameLedger,
    pub browser_frames: FrameLedger,
    pub main_frames: MainFrameLedger,
    pub warnings: Vec<Warning>,
}

pub struct ReconstructionEngine {
    config: ReconstructionConfig,
}

impl Default for ReconstructionEngine {
    fn default() -> Self {
        ReconstructionEngine::new(ReconstructionConfig::default())
    }
}

impl ReconstructionEngine {
    pub fn new(config: ReconstructionConfig) -> Self {
        ReconstructionEngine { config }
    }

    /// Replay the stream from its recognized start marker.
    ///
    /// A session with no processable history yields empty ledgers and no
    /// warnings.
    #[instrument(skip_all, fields(events = stream.len()))]
    pub fn reconstruct(&self, stream: &EventStream) -> Reconstruction {
        let mut pass = Pass::new(&self.config);
        if let Some(start) = stream.start_index() {
            for event in &stream.events()[start..] {
                pass.dispatch(stream, event);
            }
        }
        pass.finish()
    }
}

/// Per-run mutable state: the ledgers and the warning log.
struct Pass<'c> {
    config: &'c ReconstructionConfig,
    compositor: FrameLedger,
    browser: FrameLedger,
    main: MainFrameLedger,
    log: WarningLog,
}

impl<'c> Pass<'c> {
    fn new(config: &'c ReconstructionConfig) -> Self {
        Pass {
            config,
            compositor: FrameLedger::new(FrameOwner::Compositor, config.synthesize_at_boundary),
            browser: FrameLedger::new(FrameOwner::Browser, config.synthesize_at_boundary),
            main: MainFrameLedger::new(config.synthesize_at_boundary),
            log: WarningLog::new(),
        }
    }

    fn finish(self) -> Reconstruction {
        Reconstruction {
            compositor_frames: self.compositor,
            browser_frames: self.browser,
            main_frames: self.main,
            warnings: self.log.into_vec(),
        }
    }

    /// Which frame ledger an event belongs to. Explicit ownership from the
    /// ingestion layer wins; otherwise browser-UI events go to the browser
    /// ledger and everything else to the renderer compositor's.
    fn owner_of(&self, event: &Event) -> FrameOwner {
        match event.owner {
            Some(owner) => owner,
            None if event.role == ContextRole::BrowserUi => FrameOwner::Browser,
            None => FrameOwner::Compositor,
        }
    }

    /// Split-borrow a frame ledger together with the warning log.
    fn parts(&mut self, owner: FrameOwner) -> (&mut FrameLedger, &mut WarningLog) {
        match owner {
            FrameOwner::Compositor => (&mut self.compositor, &mut self.log),
            FrameOwner::Browser => (&mut self.browser, &mut self.log),
        }
    }

    fn audit_role(&mut self, event: &Event, kind: EventKind) {
        if !self.config.check_roles {
            return;
        }
        let expected = kind.expected_roles();
        if !expected.contains(&event.role) {
            let expected = expected
                .iter()
                .map(|role| role.to_string())
                .collect::<Vec<_>>()
                .join(" or ");
            self.log.warn(
                event.timestamp,
                format!(
                    "{} on unexpected context {} (expected {})",
                    event.display_name(),
                    event.role,
                    expected
                ),
            );
        }
    }

    fn dispatch(&mut self, stream: &EventStream, event: &Event) {
        let Some(kind) = event.kind() else {
            return;
        };
        trace!(ts = event.timestamp, name = event.display_name(), "dispatch");
        self.audit_role(event, kind);
        let ts = event.timestamp;
        let owner = self.owner_of(event);
        match kind {
            EventKind::Pipeline(PipelineStep::IssueBeginFrame) => {
                let (ledger, log) = self.parts(owner);
                ledger.create(event.bind_id.as_ref(), ts, log);
            }
            EventKind::Pipeline(PipelineStep::ReceiveBeginFrame) => {
                let (ledger, log) = self.parts(owner);
                ledger.receive_begin(event.bind_id.as_ref(), ts, log);
            }
            EventKind::Pipeline(PipelineStep::ReceiveBeginFrameDiscard) => {
                let (ledger, log) = self.parts(owner);
                ledger.receive_discard(event.bind_id.as_ref(), ts, log);
            }
            EventKind::Pipeline(PipelineStep::ReceiveCompositorFrame) => {
                let (ledger, log) = self.parts(owner);
                ledger.receive_compositor_frame(event.bind_id.as_ref(), ts, log);
            }
            EventKind::Pipeline(PipelineStep::SurfaceAggregation) => {
                self.aggregate(stream, event, owner);
            }
            // Render-pass and compositor-frame steps correlate through their
            // enclosing draw event; bare occurrences carry no usable context.
            EventKind::Pipeline(_) => {}
            EventKind::BeginImplFrame => {
                let (ledger, log) = self.parts(owner);
                ledger.schedule(event.sequence, ts, log);
            }
            EventKind::BeginFrameFired => {
                let (ledger, log) = self.parts(owner);
                ledger.begin_frame_fired(event.sequence, ts, log);
            }
            EventKind::BeginFrameDropped => {
                self.parts(owner).0.drop_unscheduled(ts);
            }
            EventKind::ImplFrameDeadline => {
                let drew = stream
                    .children(event)
                    .any(|c| c.kind() == Some(EventKind::ScheduledActionDraw));
                if !drew {
                    let (ledger, log) = self.parts(owner);
                    ledger.mark_undrawn_useless(ts, log);
                }
            }
            EventKind::ScheduledActionDraw => {
                self.draw(stream, event, owner);
            }
            EventKind::SwapBuffers => {
                let (ledger, log) = self.parts(owner);
                ledger.swap(event.put_offset, ts, event.duration, log);
            }
            EventKind::SendBeginMainFrame => {
                let requests = stream
                    .children(event)
                    .filter(|c| c.kind() == Some(EventKind::RequestMainThreadFrame))
                    .count();
                self.log.one_and_only(
                    ts,
                    requests,
                    "main-thread request markers (SendBeginMainFrame)",
                );
                match main_frame_id(event) {
                    Some(id) => self.main.create(id, ts, &mut self.log),
                    None => self.log.warn(ts, "SendBeginMainFrame without frame id"),
                }
            }
            EventKind::BeginMainFrame => {
                let commits: Vec<Micros> = stream
                    .children(event)
                    .filter(|c| c.kind() == Some(EventKind::BeginMainFrameCommit))
                    .map(|c| c.timestamp)
                    .collect();
                let aborts = stream
                    .children(event)
                    .filter(|c| c.kind() == Some(EventKind::MainFrameEarlyOut))
                    .count();
                let id = main_frame_id(event);
                self.main.begin(id, ts, &commits, aborts, &mut self.log);
            }
            EventKind::BeginMainFrameAborted => {
                self.main.abort(ts, &mut self.log);
            }
            EventKind::ScheduledActionCommit => {
                let begin_commits: Vec<Micros> = stream
                    .children(event)
                    .filter(|c| c.kind() == Some(EventKind::BeginCommit))
                    .map(|c| c.timestamp)
                    .collect();
                let draw_props: Vec<MainFrameId> = stream
                    .children(event)
                    .filter(|c| c.kind() == Some(EventKind::CalculateDrawProperties))
                    .filter_map(|c| c.source_frame_number())
                    .collect();
                self.main.commit(ts, &begin_commits, &draw_props, &mut self.log);
            }
            EventKind::ActivateLayerTree => {
                let id = event
                    .frame_id
                    .or_else(|| event.arg_u64("frameId").map(MainFrameId::new));
                self.main.activate(id, ts, &mut self.log);
            }
            // Markers consumed through their parents' child queries.
            EventKind::RequestMainThreadFrame
            | EventKind::PrepareToDraw
            | EventKind::DrawFrame
            | EventKind::BeginMainFrameCommit
            | EventKind::MainFrameEarlyOut
            | EventKind::BeginCommit
            | EventKind::CalculateDrawProperties => {}
        }
    }

    /// Aggregation arrives either as a bare pipeline event or as a wrapper
    /// whose nested pipeline child carries the authoritative correlation id
    /// and timestamp.
    fn aggregate(&mut self, stream: &EventStream, event: &Event, owner: FrameOwner) {
        let nested = stream.children(event).find(|c| {
            c.kind() == Some(EventKind::Pipeline(PipelineStep::SurfaceAggregation))
        });
        let (bind, ts, key) = match nested {
            Some(child) => (
                child.bind_id.clone(),
                child.timestamp,
                child.put_offset.or(event.put_offset),
            ),
            None => (event.bind_id.clone(), event.timestamp, event.put_offset),
        };
        let (ledger, log) = self.parts(owner);
        ledger.aggregate_surface(bind.as_ref(), ts, key, log);
    }

    /// The draw cycle: resolve the frame being drawn, record the nested
    /// render-pass/compositor-frame markers, and link the main frame named
    /// by the nested prepare-to-draw marker. A cycle without a draw-frame
    /// marker produced nothing visible: the frame retires as useless and
    /// the targeted main frame becomes skippable.
    fn draw(&mut self, stream: &EventStream, event: &Event, owner: FrameOwner) {
        let ts = event.timestamp;
        let children: Vec<&Event> = stream.children(event).collect();
        let prepare: Vec<&Event> = children
            .iter()
            .copied()
            .filter(|c| c.kind() == Some(EventKind::PrepareToDraw))
            .collect();

        let slot = {
            let (ledger, log) = self.parts(owner);
            ledger.drawing_candidate(ts, log)
        };
        let Some(slot) = slot else {
            // No frame to attach the draw to; still credit the main frame
            // when the prepare-to-draw marker names the oldest pending one.
            if let Some(id) = prepare.first().and_then(|p| p.source_frame_number()) {
                self.main.draw_without_frame(id, ts);
            }
            return;
        };
        // Markers for another frame can share the draw window; only those
        // with the drawn frame's correlation id belong to this cycle.
        let bind = self.parts(owner).0.marker_bind(slot);
        let marker_matches = |c: &&Event| match (&bind, &c.bind_id) {
            (Some(bind), Some(marker)) => marker == bind,
            _ => true,
        };

        let render_pass: Vec<&Event> = children
            .iter()
            .copied()
            .filter(|c| {
                c.kind() == Some(EventKind::Pipeline(PipelineStep::GenerateRenderPass))
            })
            .filter(marker_matches)
            .collect();
        if self.log.one_and_only(
            ts,
            render_pass.len(),
            "render-pass markers (ScheduledActionDraw)",
        ) {
            let rp_ts = render_pass[0].timestamp;
            let (ledger, log) = self.parts(owner);
            ledger.generate_render_pass(slot, rp_ts, log);
        }

        if !self
            .log
            .one_and_only(ts, prepare.len(), "prepare-to-draw markers (ScheduledActionDraw)")
        {
            return;
        }
        let target = prepare[0].source_frame_number();
        if let Some(id) = target {
            self.parts(owner).0.set_main_frame_target(slot, id);
        }

        let draw_frames = children
            .iter()
            .filter(|c| c.kind() == Some(EventKind::DrawFrame))
            .count();
        if draw_frames == 0 {
            if let Some(id) = target {
                self.main.mark_skippable(id, ts, &mut self.log);
            }
            self.parts(owner).0.mark_useless(slot, ts);
            return;
        }
        self.log
            .one_and_only(ts, draw_frames, "draw-frame markers (ScheduledActionDraw)");

        let generate: Vec<&Event> = children
            .iter()
            .copied()
            .filter(|c| {
                c.kind() == Some(EventKind::Pipeline(PipelineStep::GenerateCompositorFrame))
            })
            .filter(marker_matches)
            .collect();
        if self.log.one_and_only(
            ts,
            generate.len(),
            "compositor-frame markers (ScheduledActionDraw)",
        ) {
            let gen_ts = generate[0].timestamp;
            let (ledger, log) = self.parts(owner);
            ledger.generate_compositor_frame(slot, gen_ts, log);
        }

        let submit: Vec<&Event> = children
            .iter()
            .copied()
            .filter(|c| {
                c.kind() == Some(EventKind::Pipeline(PipelineStep::SubmitCompositorFrame))
            })
            .filter(marker_matches)
            .collect();
        if self.log.one_and_only(ts, submit.len(), "submit markers (ScheduledActionDraw)") {
            let submit_ts = submit[0].timestamp;
            let (ledger, log) = self.parts(owner);
            ledger.submit_compositor_frame(slot, submit_ts, log);
        }

        if let Some(id) = target {
            if let Some(link) = self.main.first_draw(id, ts, &mut self.log) {
                self.parts(owner)
                    .0
                    .attach_main_frame(slot, link.link(), link.is_first());
            }
        }
    }
}

fn main_frame_id(event: &Event) -> Option<MainFrameId> {
    event
        .frame_id
        .or_else(|| event.arg_u64("begin_frame_id").map(MainFrameId::new))
}
