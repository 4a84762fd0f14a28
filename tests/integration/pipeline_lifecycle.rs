//! End-to-end pipeline reconstruction scenarios

use framelens::engine::ReconstructionEngine;
use framelens::event::EventStream;
use framelens::frame::{FrameOutcome, Stage};
use framelens::types::ContextRole;

use super::test_utils::{complete_frame, discarded_preamble, pipeline};

#[test]
fn test_single_pipeline_completes_without_warnings() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(complete_frame(10, "f1", 1, 9, 7));
    let result = engine.reconstruct(&stream);

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.compositor_frames.completed().len(), 1);
    assert_eq!(result.compositor_frames.pending().count(), 0);
    assert_eq!(result.compositor_frames.abandoned().len(), 0);

    let frame = &result.compositor_frames.completed()[0];
    assert!(matches!(frame.outcome, Some(FrameOutcome::Completed { at: 95 })));
    assert_eq!(frame.sequence, Some(1));
    assert!(frame.drew_main_frame);

    // every populated stage timestamp is non-decreasing in canonical order
    let mut last = 0;
    for stage in Stage::ALL {
        if let Some(ts) = frame.times.get(stage) {
            assert!(ts >= last, "{:?} at {} before {}", stage, ts, last);
            last = ts;
        }
    }
}

#[test]
fn test_discarded_frame_is_terminal() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(vec![
        pipeline(10, ContextRole::DisplayCompositor, "IssueBeginFrame", "f1"),
        pipeline(20, ContextRole::CompositorScheduling, "ReceiveBeginFrameDiscard", "f1"),
    ]);
    let result = engine.reconstruct(&stream);

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.compositor_frames.completed().len(), 0);
    assert_eq!(result.compositor_frames.discarded().count(), 1);
    let frame = result.compositor_frames.discarded().next().unwrap();
    assert!(matches!(frame.outcome, Some(FrameOutcome::Discarded { at: 20 })));
    assert_eq!(frame.times.discarded, Some(20));
}

#[test]
fn test_dropped_before_scheduling() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(vec![
        pipeline(10, ContextRole::DisplayCompositor, "IssueBeginFrame", "f1"),
        pipeline(20, ContextRole::CompositorScheduling, "ReceiveBeginFrame", "f1"),
        framelens::event::Event::new(
            30,
            ContextRole::CompositorScheduling,
            "Scheduler::BeginFrameDropped",
        ),
    ]);
    let result = engine.reconstruct(&stream);

    assert_eq!(result.compositor_frames.completed().len(), 0);
    assert_eq!(result.compositor_frames.dropped().count(), 1);
    let frame = result.compositor_frames.dropped().next().unwrap();
    assert!(matches!(frame.outcome, Some(FrameOutcome::Dropped { at: 30 })));
}

#[test]
fn test_draw_markers_matched_by_correlation_id() {
    let engine = ReconstructionEngine::default();
    let stream = EventStream::new(vec![
        pipeline(10, ContextRole::DisplayCompositor, "IssueBeginFrame", "f1"),
        pipeline(20, ContextRole::CompositorScheduling, "ReceiveBeginFrame", "f1"),
        framelens::event::Event::new(
            30,
            ContextRole::CompositorScheduling,
            "Scheduler::BeginImplFrame",
        )
        .with_sequence(1),
        // a second frame in flight leaks a marker into the draw window
        pipeline(35, ContextRole::DisplayCompositor, "IssueBeginFrame", "f2"),
        framelens::event::Event::new(
            40,
            ContextRole::CompositorScheduling,
            "ProxyImpl::ScheduledActionDraw",
        )
        .with_duration(20),
        pipeline(41, ContextRole::CompositorScheduling, "GenerateRenderPass", "f2"),
        pipeline(42, ContextRole::CompositorScheduling, "GenerateRenderPass", "f1"),
        framelens::event::Event::new(
            43,
            ContextRole::CompositorScheduling,
            "LayerTreeHostImpl::PrepareToDraw",
        )
        .with_arg("SourceFrameNumber", serde_json::json!(7)),
        framelens::event::Event::new(44, ContextRole::CompositorScheduling, "DrawFrame"),
        pipeline(45, ContextRole::CompositorScheduling, "GenerateCompositorFrame", "f1"),
        pipeline(46, ContextRole::CompositorScheduling, "SubmitCompositorFrame", "f1"),
    ]);
    let result = engine.reconstruct(&stream);

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    let drawn = result
        .compositor_frames
        .pending()
        .find(|f| f.bind_id.to_string() == "f1")
        .unwrap();
    // the stray marker for the other frame is not attributed to this one
    assert_eq!(drawn.times.render_pass_generated, Some(42));
    assert_eq!(drawn.times.compositor_frame_generated, Some(45));
    assert_eq!(drawn.times.compositor_frame_submitted, Some(46));
}

#[test]
fn test_consecutive_pipelines_all_complete() {
    let engine = ReconstructionEngine::default();
    // all three draws redraw the same main frame; only the first marks it
    let mut events = complete_frame(10, "f1", 1, 9, 7);
    events.extend(complete_frame(200, "f2", 2, 10, 7));
    events.extend(complete_frame(400, "f3", 3, 11, 7));
    let result = engine.reconstruct(&EventStream::new(events));

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.compositor_frames.completed().len(), 3);
    let binds: Vec<String> = result
        .compositor_frames
        .completed()
        .iter()
        .map(|f| f.bind_id.to_string())
        .collect();
    assert_eq!(binds, vec!["f1", "f2", "f3"]);
}

#[test]
fn test_redraw_links_main_frame_without_first_draw_marker() {
    let engine = ReconstructionEngine::default();
    let mut events = discarded_preamble(0);
    events.extend(super::test_utils::main_frame_cycle(100, 7));
    // first frame performs the main frame's first draw
    events.extend(complete_frame(200, "f1", 1, 9, 7));
    // second frame redraws the same, already-drawn main frame
    events.extend(complete_frame(400, "f2", 2, 10, 7));
    let result = engine.reconstruct(&EventStream::new(events));

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.compositor_frames.completed().len(), 2);
    let first = &result.compositor_frames.completed()[0];
    let second = &result.compositor_frames.completed()[1];
    assert!(first.drew_main_frame);
    assert!(!second.drew_main_frame);
    assert_eq!(first.main_frame.map(|l| l.id.0), Some(7));
    assert_eq!(second.main_frame.map(|l| l.id.0), Some(7));
    assert_eq!(result.main_frames.drawn().len(), 1);
}
