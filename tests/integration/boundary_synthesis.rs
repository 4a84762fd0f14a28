//! Trace-boundary behavior: records synthesized for frames whose early
//! history fell outside the capture window

use framelens::config::ReconstructionConfig;
use framelens::engine::ReconstructionEngine;
use framelens::event::{Event, EventStream};
use framelens::frame::{FrameOutcome, FrameState};
use framelens::types::{BindId, ContextRole};

use super::test_utils::{complete_frame, pipeline};

/// A trace that opens mid-pipeline still yields a completed frame: the
/// aggregation synthesizes the record with zeroed early stages and the swap
/// completes it, all without warnings.
#[test]
fn test_trace_opening_at_aggregation_completes_frame() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(vec![
        pipeline(10, ContextRole::DisplayCompositor, "SurfaceAggregation", "tail")
            .with_put_offset(5),
        Event::new(20, ContextRole::Gpu, "NativeViewGLSurfaceEGL:RealSwapBuffers")
            .with_put_offset(5)
            .with_duration(5),
    ]);
    let result = engine.reconstruct(&stream);

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    let completed = result.compositor_frames.completed();
    assert_eq!(completed.len(), 1);
    let frame = &completed[0];
    assert!(frame.synthesized);
    assert_eq!(frame.bind_id, BindId::new("tail"));
    assert_eq!(frame.times.issued, Some(0));
    assert_eq!(frame.times.surface_aggregated, Some(10));
    assert_eq!(frame.times.completed, Some(25));
    assert!(matches!(frame.outcome, Some(FrameOutcome::Completed { at: 25 })));
}

#[test]
fn test_receive_before_any_issue_synthesizes_pending_frame() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(vec![pipeline(
        10,
        ContextRole::CompositorScheduling,
        "ReceiveBeginFrame",
        "x",
    )]);
    let result = engine.reconstruct(&stream);

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    let pending: Vec<_> = result.compositor_frames.pending().collect();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].synthesized);
    assert_eq!(pending[0].state, FrameState::Received);
    assert_eq!(pending[0].times.received, Some(10));
}

/// Scheduler acceptance at the boundary has no correlation id to carry
/// over: the synthesized record gets a placeholder bind id.
#[test]
fn test_scheduler_acceptance_at_boundary_synthesizes_unbound() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(vec![Event::new(
        10,
        ContextRole::CompositorScheduling,
        "Scheduler::BeginImplFrame",
    )
    .with_sequence(9)]);
    let result = engine.reconstruct(&stream);

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    let pending: Vec<_> = result.compositor_frames.pending().collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].bind_id, BindId::new("synthetic-0"));
    assert_eq!(pending[0].sequence, Some(9));
    assert_eq!(pending[0].state, FrameState::Scheduled);
}

/// With synthesis disabled, the same mid-pipeline opening warns instead.
#[test]
fn test_synthesis_disabled_warns_instead() {
    let engine = ReconstructionEngine::new(ReconstructionConfig {
        synthesize_at_boundary: false,
        ..ReconstructionConfig::default()
    });
    let stream = EventStream::new(vec![
        pipeline(10, ContextRole::DisplayCompositor, "SurfaceAggregation", "tail")
            .with_put_offset(5),
        Event::new(20, ContextRole::Gpu, "NativeViewGLSurfaceEGL:RealSwapBuffers")
            .with_put_offset(5)
            .with_duration(5),
    ]);
    let result = engine.reconstruct(&stream);

    assert_eq!(result.compositor_frames.completed().len(), 0);
    let messages: Vec<&str> = result.warnings.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "No frames with same bind id (SurfaceAggregation)",
            "No frames awaiting swap (RealSwapBuffers)",
        ]
    );
}

/// Once a frame has completed, an unknown correlation id is a routing
/// violation, not a boundary case.
#[test]
fn test_synthesis_stops_after_first_completion() {
    let engine = ReconstructionEngine::default();
    let mut events = complete_frame(0, "f1", 1, 9, 7);
    events.push(
        pipeline(200, ContextRole::DisplayCompositor, "SurfaceAggregation", "stranger")
            .with_put_offset(11),
    );
    let result = engine.reconstruct(&EventStream::new(events));

    assert_eq!(result.warnings.len(), 1, "warnings: {:?}", result.warnings);
    assert_eq!(
        result.warnings[0].message,
        "No frames with same bind id (SurfaceAggregation)"
    );
    assert_eq!(result.compositor_frames.completed().len(), 1);
    assert_eq!(result.compositor_frames.pending().count(), 0);
}
