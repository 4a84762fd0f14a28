//! Shared types for trace reconstruction

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;

/// Microseconds relative to the recognized trace start.
pub type Micros = u64;

/// Insertion-ordered key for a record inside a ledger's pending store.
pub type Slot = u64;

/// Opaque correlation key linking all pipeline-step events of one frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindId(pub String);

impl BindId {
    pub fn new(id: impl Into<String>) -> Self {
        BindId(id.into())
    }
}

impl fmt::Display for BindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric frame id assigned by the content side when it requests a main frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MainFrameId(pub u64);

impl MainFrameId {
    pub fn new(id: u64) -> Self {
        MainFrameId(id)
    }
}

impl fmt::Display for MainFrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which compositor owns a frame.
///
/// The renderer compositor and the browser-UI compositor run independent
/// pipelines over the same event vocabulary; the trace-ingestion layer
/// disambiguates them (by correlation-id shape) before events reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameOwner {
    Compositor,
    Browser,
}

impl fmt::Display for FrameOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameOwner::Compositor => write!(f, "compositor"),
            FrameOwner::Browser => write!(f, "browser"),
        }
    }
}

/// Logical execution context an event occurred on.
///
/// Resolved externally from raw thread/process names (e.g. the display
/// compositor is `VizCompositorThread`, content is `CrRendererMain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextRole {
    /// Display compositor (frame issue, compositor-frame receipt, aggregation)
    DisplayCompositor,
    /// Renderer-side compositor scheduling (receive, schedule, draw, commit)
    CompositorScheduling,
    /// Content main thread (style/layout/paint recording)
    Content,
    /// Browser-UI compositor
    BrowserUi,
    /// GPU main thread (buffer swaps)
    Gpu,
}

impl fmt::Display for ContextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextRole::DisplayCompositor => "display-compositor",
            ContextRole::CompositorScheduling => "compositor",
            ContextRole::Content => "content",
            ContextRole::BrowserUi => "browser-ui",
            ContextRole::Gpu => "gpu",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ContextRole {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display-compositor" => Ok(ContextRole::DisplayCompositor),
            "compositor" => Ok(ContextRole::CompositorScheduling),
            "content" => Ok(ContextRole::Content),
            "browser-ui" => Ok(ContextRole::BrowserUi),
            "gpu" => Ok(ContextRole::Gpu),
            other => Err(TraceError::UnknownRole(other.to_string())),
        }
    }
}
