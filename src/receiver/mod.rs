//! Receive-side dispatch and control-channel state

pub mod binding;
pub mod dispatch;

pub use binding::ProgramBinding;
pub use dispatch::{Dispatcher, DispatchStats, MediaSink, OverlayRenderer};
