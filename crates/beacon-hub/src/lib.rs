//! # beacon-hub
//!
//! The connection hub: live device sessions and the background machinery
//! that feeds them.
//!
//! - [`session`] — one [`session::DeviceSession`] per connected device,
//!   wrapping the two halves of its binary message stream
//! - [`bus`] — named bounded queues decoupling request handlers from the
//!   processors
//! - [`control`] — the control processor: registration adoption, command
//!   dispatch, pool upkeep
//! - [`feedback`] — the feedback processor: drains device telemetry into
//!   the registry

pub mod bus;
pub mod control;
pub mod feedback;
pub mod session;

pub use bus::{ChannelBus, Publisher, CONTROL_CHANNEL, FEEDBACK_CHANNEL};
pub use control::ControlProcessor;
pub use feedback::FeedbackProcessor;
pub use session::{DeviceSession, SessionPool};
