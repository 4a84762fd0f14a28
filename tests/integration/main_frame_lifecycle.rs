//! Content-update cycle scenarios: request, begin, commit, abort, draw

use framelens::engine::ReconstructionEngine;
use framelens::event::{Event, EventStream};
use framelens::main_frame::MainFrameState;
use framelens::types::ContextRole;

use super::test_utils::{complete_frame, discarded_preamble, main_frame_cycle, pipeline};

#[test]
fn test_full_cycle_commits_activates_and_draws() {
    let engine = ReconstructionEngine::default();
    let mut events = discarded_preamble(0);
    events.extend(main_frame_cycle(100, 7));
    events.extend(complete_frame(200, "f1", 1, 9, 7));
    let result = engine.reconstruct(&EventStream::new(events));

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.main_frames.drawn().len(), 1);
    let mf = &result.main_frames.drawn()[0];
    assert_eq!(mf.id.0, 7);
    assert_eq!(mf.times.request_sent, Some(100));
    assert_eq!(mf.times.begin, Some(110));
    assert_eq!(mf.times.commit_ready, Some(115));
    assert_eq!(mf.times.commit_received, Some(132));
    assert_eq!(mf.times.activated, Some(150));
    assert_eq!(mf.times.first_draw, Some(240));

    // the drawing frame carries the copied lifecycle timestamps
    let frame = &result.compositor_frames.completed()[0];
    assert!(frame.drew_main_frame);
    let link = frame.main_frame.unwrap();
    assert_eq!(link.id.0, 7);
    assert_eq!(link.commit_received, Some(132));
    assert_eq!(link.activated, Some(150));
}

#[test]
fn test_early_out_cycle_is_aborted() {
    let engine = ReconstructionEngine::default();
    let mut events = discarded_preamble(0);
    events.extend(vec![
        Event::new(
            100,
            ContextRole::CompositorScheduling,
            "ThreadProxy::ScheduledActionSendBeginMainFrame",
        )
        .with_frame_id(3)
        .with_duration(5),
        Event::new(102, ContextRole::CompositorScheduling, "RequestMainThreadFrame"),
        Event::new(110, ContextRole::Content, "ThreadProxy::BeginMainFrame")
            .with_frame_id(3)
            .with_duration(10),
        Event::new(115, ContextRole::Content, "EarlyOut_NoUpdates"),
        Event::new(
            130,
            ContextRole::CompositorScheduling,
            "ProxyImpl::BeginMainFrameAbortedOnImplThread",
        ),
    ]);
    let result = engine.reconstruct(&EventStream::new(events));

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.main_frames.aborted().len(), 1);
    let mf = &result.main_frames.aborted()[0];
    assert!(mf.aborted);
    assert_eq!(mf.times.aborted, Some(130));
    assert_eq!(result.main_frames.drawn().len(), 0);
}

#[test]
fn test_commit_and_abort_markers_together_warn_and_stay_pending() {
    let engine = ReconstructionEngine::default();
    let mut events = discarded_preamble(0);
    events.extend(vec![
        Event::new(
            100,
            ContextRole::CompositorScheduling,
            "ThreadProxy::ScheduledActionSendBeginMainFrame",
        )
        .with_frame_id(3)
        .with_duration(5),
        Event::new(102, ContextRole::CompositorScheduling, "RequestMainThreadFrame"),
        Event::new(110, ContextRole::Content, "ThreadProxy::BeginMainFrame")
            .with_frame_id(3)
            .with_duration(10),
        Event::new(114, ContextRole::Content, "ProxyMain::BeginMainFrame::commit"),
        Event::new(116, ContextRole::Content, "EarlyOut_NoUpdates"),
    ]);
    let result = engine.reconstruct(&EventStream::new(events));

    assert_eq!(result.warnings.len(), 1, "warnings: {:?}", result.warnings);
    assert_eq!(result.warnings[0].message, "Main frame both committed and aborted");
    let pending: Vec<_> = result.main_frames.pending().collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].state, MainFrameState::Begun);
    assert!(pending[0].times.commit_ready.is_none());
    assert!(!pending[0].aborted);
}

#[test]
fn test_mismatched_begin_id_warns() {
    let engine = ReconstructionEngine::default();
    let mut events = discarded_preamble(0);
    events.extend(vec![
        Event::new(
            100,
            ContextRole::CompositorScheduling,
            "ThreadProxy::ScheduledActionSendBeginMainFrame",
        )
        .with_frame_id(3)
        .with_duration(5),
        Event::new(102, ContextRole::CompositorScheduling, "RequestMainThreadFrame"),
        Event::new(110, ContextRole::Content, "ThreadProxy::BeginMainFrame")
            .with_frame_id(4)
            .with_duration(10),
        Event::new(114, ContextRole::Content, "ProxyMain::BeginMainFrame::commit"),
    ]);
    let result = engine.reconstruct(&EventStream::new(events));

    assert_eq!(result.warnings.len(), 1);
    assert_eq!(
        result.warnings[0].message,
        "BeginMainFrame and SendBeginMainFrame don't match"
    );
    // the requested cycle is untouched
    let pending: Vec<_> = result.main_frames.pending().collect();
    assert_eq!(pending[0].state, MainFrameState::Requested);
    assert!(pending[0].times.begin.is_none());
}

#[test]
fn test_skippable_cycle_superseded_by_newer_draw() {
    let engine = ReconstructionEngine::default();
    let mut events = discarded_preamble(0);
    events.extend(main_frame_cycle(100, 1));
    // cycle 1 is targeted by a draw that produces nothing visible: the
    // frame retires useless and the cycle becomes skippable
    events.extend(vec![
        pipeline(160, ContextRole::DisplayCompositor, "IssueBeginFrame", "f0"),
        pipeline(170, ContextRole::CompositorScheduling, "ReceiveBeginFrame", "f0"),
        Event::new(180, ContextRole::CompositorScheduling, "Scheduler::BeginImplFrame")
            .with_sequence(2)
            .with_duration(5),
        Event::new(190, ContextRole::CompositorScheduling, "ProxyImpl::ScheduledActionDraw")
            .with_duration(10),
        pipeline(191, ContextRole::CompositorScheduling, "GenerateRenderPass", "f0"),
        Event::new(192, ContextRole::CompositorScheduling, "LayerTreeHostImpl::PrepareToDraw")
            .with_arg("SourceFrameNumber", serde_json::json!(1)),
    ]);
    events.extend(main_frame_cycle(200, 2));
    // cycle 2 draws while cycle 1 is still activated-undrawn
    events.extend(complete_frame(300, "f1", 3, 9, 2));
    let result = engine.reconstruct(&EventStream::new(events));

    assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    assert_eq!(result.main_frames.drawn().len(), 1);
    assert_eq!(result.main_frames.drawn()[0].id.0, 2);
    assert_eq!(result.main_frames.aborted().len(), 1);
    assert_eq!(result.main_frames.aborted()[0].id.0, 1);
    assert!(result.main_frames.aborted()[0].can_be_skipped);
}
