//! Trace Events
//!
//! Typed representation of instrumentation events as produced by the
//! trace-ingestion layer: timestamp, execution-context role, name (plus a
//! step selector for the pipeline event family), optional duration, and the
//! correlation keys the reconstruction engine dispatches on.

pub mod stream;

pub use stream::EventStream;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{BindId, ContextRole, FrameOwner, MainFrameId, Micros};

/// Sub-case selector for the `Graphics.Pipeline` event family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStep {
    IssueBeginFrame,
    ReceiveBeginFrame,
    ReceiveBeginFrameDiscard,
    GenerateRenderPass,
    GenerateCompositorFrame,
    SubmitCompositorFrame,
    ReceiveCompositorFrame,
    SurfaceAggregation,
}

impl PipelineStep {
    pub fn from_name(step: &str) -> Option<Self> {
        match step {
            "IssueBeginFrame" => Some(PipelineStep::IssueBeginFrame),
            "ReceiveBeginFrame" => Some(PipelineStep::ReceiveBeginFrame),
            "ReceiveBeginFrameDiscard" => Some(PipelineStep::ReceiveBeginFrameDiscard),
            "GenerateRenderPass" => Some(PipelineStep::GenerateRenderPass),
            "GenerateCompositorFrame" => Some(PipelineStep::GenerateCompositorFrame),
            "SubmitCompositorFrame" => Some(PipelineStep::SubmitCompositorFrame),
            "ReceiveCompositorFrame" => Some(PipelineStep::ReceiveCompositorFrame),
            "SurfaceAggregation" => Some(PipelineStep::SurfaceAggregation),
            _ => None,
        }
    }
}

/// Event names the reconstruction engine recognizes.
///
/// Anything else in the stream is ignored by the single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Pipeline(PipelineStep),
    BeginImplFrame,
    BeginFrameFired,
    BeginFrameDropped,
    ImplFrameDeadline,
    ScheduledActionDraw,
    PrepareToDraw,
    DrawFrame,
    SwapBuffers,
    SendBeginMainFrame,
    RequestMainThreadFrame,
    BeginMainFrame,
    BeginMainFrameCommit,
    MainFrameEarlyOut,
    BeginMainFrameAborted,
    ScheduledActionCommit,
    BeginCommit,
    CalculateDrawProperties,
    ActivateLayerTree,
}

impl EventKind {
    /// Roles this event legitimately occurs on; anything else is a routing
    /// violation. Compositor-scheduling events also occur on the browser-UI
    /// compositor, which runs the same scheduler for browser-owned frames.
    pub fn expected_roles(&self) -> &'static [ContextRole] {
        use ContextRole::*;
        match self {
            EventKind::Pipeline(PipelineStep::IssueBeginFrame)
            | EventKind::Pipeline(PipelineStep::ReceiveCompositorFrame)
            | EventKind::Pipeline(PipelineStep::SurfaceAggregation) => &[DisplayCompositor],
            EventKind::SwapBuffers => &[Gpu],
            EventKind::BeginMainFrame
            | EventKind::BeginMainFrameCommit
            | EventKind::MainFrameEarlyOut => &[Content],
            _ => &[CompositorScheduling, BrowserUi],
        }
    }
}

/// One instrumentation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic time relative to the recognized trace start
    pub timestamp: Micros,
    /// Optional duration; child events nest inside `[timestamp, timestamp + duration)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Micros>,
    /// Raw execution-context identifier (for child-event nesting)
    pub context: u64,
    /// Resolved role of that context
    pub role: ContextRole,
    /// Event identifier string
    pub name: String,
    /// Sub-case for the pipeline event family
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Correlation key for pipeline-step events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_id: Option<BindId>,
    /// Scheduler acceptance key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Main-frame binding key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<MainFrameId>,
    /// GPU-swap binding key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_offset: Option<u64>,
    /// Frame ownership, where the ingestion layer could resolve it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<FrameOwner>,
    /// Free-form argument bag
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl Event {
    pub fn new(timestamp: Micros, role: ContextRole, name: impl Into<String>) -> Self {
        Event {
            timestamp,
            duration: None,
            context: role_default_context(role),
            role,
            name: name.into(),
            step: None,
            bind_id: None,
            sequence: None,
            frame_id: None,
            put_offset: None,
            owner: None,
            args: Map::new(),
        }
    }

    pub fn with_duration(mut self, duration: Micros) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_context(mut self, context: u64) -> Self {
        self.context = context;
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn with_bind_id(mut self, bind_id: impl Into<String>) -> Self {
        self.bind_id = Some(BindId::new(bind_id));
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_frame_id(mut self, frame_id: u64) -> Self {
        self.frame_id = Some(MainFrameId(frame_id));
        self
    }

    pub fn with_put_offset(mut self, put_offset: u64) -> Self {
        self.put_offset = Some(put_offset);
        self
    }

    pub fn with_owner(mut self, owner: FrameOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    /// Recognized event kind, if any.
    pub fn kind(&self) -> Option<EventKind> {
        match self.name.as_str() {
            "Graphics.Pipeline" => self
                .step
                .as_deref()
                .and_then(PipelineStep::from_name)
                .map(EventKind::Pipeline),
            "Scheduler::BeginImplFrame" => Some(EventKind::BeginImplFrame),
            "BeginFrame" => Some(EventKind::BeginFrameFired),
            "Scheduler::BeginFrameDropped" => Some(EventKind::BeginFrameDropped),
            "Scheduler::OnBeginImplFrameDeadline" => Some(EventKind::ImplFrameDeadline),
            "ProxyImpl::ScheduledActionDraw" => Some(EventKind::ScheduledActionDraw),
            "LayerTreeHostImpl::PrepareToDraw" => Some(EventKind::PrepareToDraw),
            "DrawFrame" => Some(EventKind::DrawFrame),
            "NativeViewGLSurfaceEGL:RealSwapBuffers" => Some(EventKind::SwapBuffers),
            "ThreadProxy::ScheduledActionSendBeginMainFrame" => {
                Some(EventKind::SendBeginMainFrame)
            }
            "RequestMainThreadFrame" => Some(EventKind::RequestMainThreadFrame),
            "ThreadProxy::BeginMainFrame" => Some(EventKind::BeginMainFrame),
            "ProxyMain::BeginMainFrame::commit" => Some(EventKind::BeginMainFrameCommit),
            "EarlyOut_NoUpdates" => Some(EventKind::MainFrameEarlyOut),
            "ProxyImpl::BeginMainFrameAbortedOnImplThread" => {
                Some(EventKind::BeginMainFrameAborted)
            }
            "ProxyImpl::ScheduledActionCommit" => Some(EventKind::ScheduledActionCommit),
            "LayerTreeHostImpl::BeginCommit" => Some(EventKind::BeginCommit),
            "LayerTreeImpl::UpdateDrawProperties::CalculateDrawProperties" => {
                Some(EventKind::CalculateDrawProperties)
            }
            "ActivateLayerTree" => Some(EventKind::ActivateLayerTree),
            _ => None,
        }
    }

    /// End of this event's time window.
    pub fn end(&self) -> Micros {
        self.timestamp + self.duration.unwrap_or(0)
    }

    /// Display name for diagnostics: the step for pipeline events, the raw
    /// name otherwise.
    pub fn display_name(&self) -> &str {
        match self.name.as_str() {
            "Graphics.Pipeline" => self.step.as_deref().unwrap_or(&self.name),
            _ => &self.name,
        }
    }

    /// Numeric argument lookup (accepts integer-valued JSON numbers).
    pub fn arg_u64(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(Value::as_u64)
    }

    /// Source frame number argument carried by draw-properties events.
    pub fn source_frame_number(&self) -> Option<MainFrameId> {
        self.arg_u64("SourceFrameNumber").map(MainFrameId)
    }
}

/// Stable default context id per role, so tests and single-context-per-role
/// producers get correct child nesting without tracking raw thread ids.
fn role_default_context(role: ContextRole) -> u64 {
    match role {
        ContextRole::DisplayCompositor => 1,
        ContextRole::CompositorScheduling => 2,
        ContextRole::Content => 3,
        ContextRole::BrowserUi => 4,
        ContextRole::Gpu => 5,
    }
}
