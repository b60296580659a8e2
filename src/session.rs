//! Connection abstraction
//!
//! This module defines the trait the engine uses to reach a connected
//! participant. The engine never owns sockets; whatever transport hosts it
//! implements [`Tunnel`] and hands tunnels back through a finder closure.

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
///
/// Implementations might wrap a WebSocket, a Server-Sent Events stream or
/// an in-process channel. Sending is fire and forget: a failed delivery is
/// the transport's concern and surfaces later as a disconnect.
pub trait Tunnel {
    /// Sends an event addressed to this participant
    ///
    /// # Arguments
    ///
    /// * `message` - The update message to send
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a full state snapshot to this participant
    ///
    /// # Arguments
    ///
    /// * `state` - The synchronization message to send
    fn send_state(&self, state: &SyncMessage);

    /// Closes the tunnel once the session has ended for this participant
    fn close(self);
}
