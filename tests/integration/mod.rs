//! Integration tests for the frame lifecycle reconstruction engine

mod boundary_synthesis;
mod main_frame_lifecycle;
mod pipeline_lifecycle;
mod test_utils;
