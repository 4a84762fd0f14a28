//! Shared event builders for integration tests
//!
//! Traces are assembled from the same event vocabulary the ingestion layer
//! produces; helpers here build the recurring shapes (a complete pipeline,
//! a content-update cycle) so scenario tests stay readable.

use framelens::event::Event;
use framelens::types::{ContextRole, Micros};
use serde_json::json;

pub fn pipeline(ts: Micros, role: ContextRole, step: &str, bind: &str) -> Event {
    Event::new(ts, role, "Graphics.Pipeline")
        .with_step(step)
        .with_bind_id(bind)
}

/// A frame that is issued and immediately discarded. Useful as a trace
/// preamble: it provides the recognized start marker and leaves no pending
/// state behind.
pub fn discarded_preamble(base: Micros) -> Vec<Event> {
    vec![
        pipeline(base, ContextRole::DisplayCompositor, "IssueBeginFrame", "warmup"),
        pipeline(
            base + 1,
            ContextRole::CompositorScheduling,
            "ReceiveBeginFrameDiscard",
            "warmup",
        ),
    ]
}

/// Every event of one complete pipeline, issue through swap. The draw
/// targets main frame `source`; when no such cycle exists the engine
/// synthesizes one at the boundary.
pub fn complete_frame(
    base: Micros,
    bind: &str,
    seq: u64,
    swap_key: u64,
    source: u64,
) -> Vec<Event> {
    vec![
        pipeline(base, ContextRole::DisplayCompositor, "IssueBeginFrame", bind),
        pipeline(base + 10, ContextRole::CompositorScheduling, "ReceiveBeginFrame", bind),
        Event::new(base + 20, ContextRole::CompositorScheduling, "Scheduler::BeginImplFrame")
            .with_sequence(seq)
            .with_duration(5),
        Event::new(base + 22, ContextRole::CompositorScheduling, "BeginFrame")
            .with_sequence(seq),
        Event::new(base + 40, ContextRole::CompositorScheduling, "ProxyImpl::ScheduledActionDraw")
            .with_duration(20),
        pipeline(base + 41, ContextRole::CompositorScheduling, "GenerateRenderPass", bind),
        Event::new(base + 42, ContextRole::CompositorScheduling, "LayerTreeHostImpl::PrepareToDraw")
            .with_arg("SourceFrameNumber", json!(source)),
        Event::new(base + 43, ContextRole::CompositorScheduling, "DrawFrame"),
        pipeline(base + 44, ContextRole::CompositorScheduling, "GenerateCompositorFrame", bind),
        pipeline(base + 45, ContextRole::CompositorScheduling, "SubmitCompositorFrame", bind),
        pipeline(base + 60, ContextRole::DisplayCompositor, "ReceiveCompositorFrame", bind),
        pipeline(base + 70, ContextRole::DisplayCompositor, "SurfaceAggregation", bind)
            .with_put_offset(swap_key),
        Event::new(base + 80, ContextRole::Gpu, "NativeViewGLSurfaceEGL:RealSwapBuffers")
            .with_put_offset(swap_key)
            .with_duration(5),
    ]
}

/// One content-update cycle from request through activation, committing
/// with updates. Drawing is driven separately by a frame's draw event.
pub fn main_frame_cycle(base: Micros, id: u64) -> Vec<Event> {
    vec![
        Event::new(
            base,
            ContextRole::CompositorScheduling,
            "ThreadProxy::ScheduledActionSendBeginMainFrame",
        )
        .with_frame_id(id)
        .with_duration(5),
        Event::new(base + 2, ContextRole::CompositorScheduling, "RequestMainThreadFrame"),
        Event::new(base + 10, ContextRole::Content, "ThreadProxy::BeginMainFrame")
            .with_frame_id(id)
            .with_duration(10),
        Event::new(base + 15, ContextRole::Content, "ProxyMain::BeginMainFrame::commit"),
        Event::new(
            base + 30,
            ContextRole::CompositorScheduling,
            "ProxyImpl::ScheduledActionCommit",
        )
        .with_duration(10),
        Event::new(base + 32, ContextRole::CompositorScheduling, "LayerTreeHostImpl::BeginCommit"),
        Event::new(
            base + 34,
            ContextRole::CompositorScheduling,
            "LayerTreeImpl::UpdateDrawProperties::CalculateDrawProperties",
        )
        .with_arg("SourceFrameNumber", json!(id)),
        Event::new(base + 50, ContextRole::CompositorScheduling, "ActivateLayerTree")
            .with_arg("frameId", json!(id)),
    ]
}
