//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ChannelPhase`: where a channel is in its crawl (selected, messages walked, files walked, done)
//! - `ChannelProgress`: per-channel tracker that advances through those phases

mod channel_state;

// Re-export main types
pub use channel_state::{ChannelPhase, ChannelProgress};
