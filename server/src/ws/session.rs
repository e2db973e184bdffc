//! Per-connection event handling.
//!
//! A connection starts unbound. `addUser` binds it to an identity in the
//! presence registry (acknowledged with `userAdded`); chat and broadcast
//! events are only accepted from a bound connection and only on behalf of
//! the bound identity. The registry is the source of truth for the binding,
//! so a connection displaced by a newer login is treated as unbound.

use crate::chat::messages::send_chat_message;
use crate::config::RebindPolicy;
use crate::db::{self, models::Role};
use crate::notify::broadcast::{announcement_text, broadcast_to_role};
use crate::state::AppState;
use crate::ws::protocol::{
    ClientEvent, ServerEvent, ERROR_ALREADY_BOUND, ERROR_FORBIDDEN, ERROR_MALFORMED,
    ERROR_NOT_BOUND, ERROR_STORE, ERROR_TOO_LARGE,
};
use crate::ws::ConnectionHandle;

/// Close code sent to a connection whose identity logged in elsewhere.
pub const CLOSE_SESSION_REPLACED: u16 = 4005;

pub struct Session {
    handle: ConnectionHandle,
    /// Identity proven by a JWT on the upgrade request, if one was given.
    authenticated: Option<String>,
}

impl Session {
    pub fn new(handle: ConnectionHandle, authenticated: Option<String>) -> Self {
        Self {
            handle,
            authenticated,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Identity this connection is currently bound to.
    pub fn bound_identity(&self, state: &AppState) -> Option<String> {
        state.presence.identity_of(self.handle.id())
    }

    /// Decode and dispatch one text frame. Malformed frames change nothing.
    pub async fn handle_text(&self, state: &AppState, text: &str) {
        match ClientEvent::decode(text) {
            Ok(event) => self.dispatch(state, event).await,
            Err(reason) => {
                tracing::warn!(
                    connection_id = self.handle.id(),
                    reason = %reason,
                    "Dropping malformed event"
                );
                self.reply(ServerEvent::error(ERROR_MALFORMED, reason));
            }
        }
    }

    async fn dispatch(&self, state: &AppState, event: ClientEvent) {
        match event {
            ClientEvent::AddUser { user_id } => self.add_user(state, &user_id),
            ClientEvent::SendMessage {
                sender_id,
                receiver_id,
                content,
            } => self.send_message(state, &sender_id, &receiver_id, &content).await,
            ClientEvent::BroadcastMessage {
                sender_name,
                content,
            } => self.broadcast_message(state, &sender_name, &content).await,
        }
    }

    /// Remove this connection from the presence registry.
    pub fn close(&self, state: &AppState) {
        if let Some(identity) = state.presence.unregister(self.handle.id()) {
            tracing::info!(
                user_id = %identity,
                connection_id = self.handle.id(),
                "User went offline"
            );
        }
    }

    fn add_user(&self, state: &AppState, identity: &str) {
        if let Some(subject) = &self.authenticated {
            if subject != identity {
                self.reply(ServerEvent::error(
                    ERROR_FORBIDDEN,
                    "userId does not match the authenticated user",
                ));
                return;
            }
        }

        match state.realtime.rebind_policy {
            RebindPolicy::Replace => {
                if let Some(previous) = state.presence.register(identity, self.handle.clone()) {
                    tracing::info!(
                        user_id = %identity,
                        previous_connection = previous.id(),
                        connection_id = self.handle.id(),
                        "Identity re-bound, closing previous connection"
                    );
                    previous.close(CLOSE_SESSION_REPLACED, "Signed in from another connection");
                }
            }
            RebindPolicy::Reject => {
                if let Err(holder) = state
                    .presence
                    .register_exclusive(identity, self.handle.clone())
                {
                    tracing::info!(
                        user_id = %identity,
                        holder_connection = holder.id(),
                        connection_id = self.handle.id(),
                        "Bind refused, identity already connected"
                    );
                    self.reply(ServerEvent::error(
                        ERROR_ALREADY_BOUND,
                        "User is already connected elsewhere",
                    ));
                    return;
                }
            }
        }

        tracing::info!(
            user_id = %identity,
            connection_id = self.handle.id(),
            "User online"
        );
        self.reply(ServerEvent::UserAdded {
            user_id: identity.to_string(),
        });
    }

    async fn send_message(&self, state: &AppState, sender_id: &str, receiver_id: &str, content: &str) {
        let Some(bound) = self.require_bound(state) else {
            return;
        };
        if bound != sender_id {
            tracing::warn!(
                user_id = %bound,
                claimed_sender = %sender_id,
                "Rejected message with mismatched sender"
            );
            self.reply(ServerEvent::error(
                ERROR_FORBIDDEN,
                "senderId does not match this connection",
            ));
            return;
        }
        if content.chars().count() > state.realtime.max_message_length {
            self.reply(ServerEvent::error(ERROR_TOO_LARGE, "Message too long"));
            return;
        }

        if let Err(e) = send_chat_message(state, sender_id, receiver_id, content).await {
            tracing::error!(
                sender = %sender_id,
                receiver = %receiver_id,
                error = %e,
                "Failed to persist chat message, nothing delivered"
            );
            self.reply(ServerEvent::error(ERROR_STORE, "Failed to save message"));
        }
    }

    async fn broadcast_message(&self, state: &AppState, sender_name: &str, content: &str) {
        let Some(bound) = self.require_bound(state) else {
            return;
        };

        let lookup_id = bound.clone();
        let role = match db::run(&state.db, move |conn| db::users::find_user(conn, &lookup_id)).await {
            Ok(user) => user.map(|u| u.role),
            Err(e) => {
                tracing::error!(user_id = %bound, error = %e, "Roster lookup failed");
                self.reply(ServerEvent::error(ERROR_STORE, "Broadcast failed"));
                return;
            }
        };
        if role != Some(Role::Proctor) {
            self.reply(ServerEvent::error(ERROR_FORBIDDEN, "Only proctors can broadcast"));
            return;
        }

        let text = announcement_text(sender_name, content);
        if let Err(e) = broadcast_to_role(
            state,
            state.realtime.broadcast_role,
            &text,
            Some(state.realtime.broadcast_link.as_str()),
        )
        .await
        {
            tracing::error!(user_id = %bound, error = %e, "Broadcast aborted");
            self.reply(ServerEvent::error(ERROR_STORE, "Broadcast failed"));
        }
    }

    fn require_bound(&self, state: &AppState) -> Option<String> {
        let bound = self.bound_identity(state);
        if bound.is_none() {
            self.reply(ServerEvent::error(ERROR_NOT_BOUND, "Send addUser first"));
        }
        bound
    }

    fn reply(&self, event: ServerEvent) {
        if let Some(msg) = event.to_message() {
            self.handle.send(msg);
        }
    }
}
