//! Callback sender adapters.
//!
//! - `HttpCallbackSender` - POSTs the skill envelope to the platform
//! - `RecordingCallbackSender` - Records deliveries (testing)

mod http_sender;
mod recording_sender;

pub use http_sender::HttpCallbackSender;
pub use recording_sender::{Delivery, RecordingCallbackSender};
