//! Best-effort push of a payload to a recipient's live connection.
//!
//! Delivery is advisory: every payload routed here has already been
//! persisted, so a miss (recipient offline, connection closing) is resolved
//! by the recipient's next history or notification fetch. No retry, no
//! acknowledgment, no queueing.

use crate::chat::presence::PresenceRegistry;
use crate::ws::protocol::ServerEvent;

/// Push `event` to `recipient` if it currently has a bound connection.
/// Returns true when the frame was handed to the connection's writer.
pub fn deliver(registry: &PresenceRegistry, recipient: &str, event: &ServerEvent) -> bool {
    let Some(handle) = registry.lookup(recipient) else {
        tracing::debug!(recipient = %recipient, "Recipient offline, delivery skipped");
        return false;
    };

    let Some(msg) = event.to_message() else {
        return false;
    };

    let sent = handle.send(msg);
    if !sent {
        tracing::debug!(
            recipient = %recipient,
            connection_id = handle.id(),
            "Connection closed before delivery"
        );
    }
    sent
}
