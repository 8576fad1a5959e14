use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use bidtech_types::events::GatewayEvent;

type SessionSender = mpsc::UnboundedSender<GatewayEvent>;

/// Routes events to the live WebSocket sessions of a user.
///
/// Each user id is a room holding zero or more sessions (one per open tab or
/// device). Delivery is at-most-once: an event sent while the user has no
/// session, or to a session that is closing, is dropped. The persisted
/// notification row is the durable copy.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> [(conn_id, sender)]
    sessions: RwLock<HashMap<Uuid, Vec<(Uuid, SessionSender)>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the user's room. Returns (conn_id, receiver).
    pub async fn register_session(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .sessions
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    /// Leave the room; the room itself goes away with its last session.
    pub async fn unregister_session(&self, user_id: Uuid, conn_id: Uuid) {
        let mut sessions = self.inner.sessions.write().await;
        if let Some(room) = sessions.get_mut(&user_id) {
            room.retain(|(id, _)| *id != conn_id);
            if room.is_empty() {
                sessions.remove(&user_id);
            }
        }
    }

    /// Fire-and-forget push to every session of `user_id`. Returns how many
    /// sessions accepted the event.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> usize {
        let sessions = self.inner.sessions.read().await;
        let Some(room) = sessions.get(&user_id) else {
            return 0;
        };
        room.iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count()
    }

    pub async fn session_count(&self, user_id: Uuid) -> usize {
        self.inner
            .sessions
            .read()
            .await
            .get(&user_id)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidtech_types::models::Role;

    fn ready(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::Ready { user_id, role: Role::Customer }
    }

    #[tokio::test]
    async fn every_session_of_a_user_receives_the_event() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, mut tab_a) = dispatcher.register_session(user).await;
        let (_, mut tab_b) = dispatcher.register_session(user).await;
        let (_, mut stranger) = dispatcher.register_session(Uuid::new_v4()).await;

        assert_eq!(dispatcher.send_to_user(user, ready(user)).await, 2);
        assert!(matches!(tab_a.recv().await, Some(GatewayEvent::Ready { .. })));
        assert!(matches!(tab_b.recv().await, Some(GatewayEvent::Ready { .. })));
        assert!(stranger.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_user_gets_nothing() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.send_to_user(Uuid::new_v4(), ready(Uuid::nil())).await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_only_that_session() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = dispatcher.register_session(user).await;
        let (second, _rx2) = dispatcher.register_session(user).await;

        dispatcher.unregister_session(user, first).await;
        assert_eq!(dispatcher.session_count(user).await, 1);

        dispatcher.unregister_session(user, second).await;
        assert_eq!(dispatcher.session_count(user).await, 0);
    }

    #[tokio::test]
    async fn dropped_receiver_is_not_counted() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, rx) = dispatcher.register_session(user).await;
        drop(rx);
        assert_eq!(dispatcher.send_to_user(user, ready(user)).await, 0);
    }
}
