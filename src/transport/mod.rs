//! Transport module - socket handling and message framing.
//!
//! Provides:
//! - [`Channel`]: the byte stream abstraction (Unix Domain Socket in production)
//! - [`Transport`]: frame-level send/receive over a channel

mod framed;
#[cfg(test)]
mod scripted;
mod socket;

pub use framed::Transport;
pub use socket::{connect_unix, poll_readable, Channel};

#[cfg(test)]
pub(crate) use scripted::ScriptedChannel;
