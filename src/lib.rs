//! Framelens: Deterministic Frame Lifecycle Reconstruction
//!
//! Reconstructs, from a typed browser performance trace, the end-to-end
//! lifecycle of every rendered frame and every content-update cycle that
//! produced it: how many frames completed, dropped, discarded, or rendered
//! uselessly, how main-frame commits relate to the frames displaying them,
//! and where the pipeline violated its own ordering and multiplicity
//! invariants.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod frame;
pub mod logging;
pub mod main_frame;
pub mod types;
pub mod warning;

pub use config::{FramelensConfig, ReconstructionConfig};
pub use engine::{Reconstruction, ReconstructionEngine};
pub use error::TraceError;
pub use event::{Event, EventStream};
pub use frame::{Frame, FrameLedger, FrameOutcome, FrameState};
pub use main_frame::{MainFrame, MainFrameLedger, MainFrameState};
pub use types::{BindId, ContextRole, FrameOwner, MainFrameId, Micros};
pub use warning::{Warning, WarningLog};
