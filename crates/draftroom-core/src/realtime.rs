// In-process realtime change feed for draft sessions.
//
// Writes that go through a `NotifyingStore` are broadcast to every
// subscriber of the same session. Subscribers ignore events that originated
// from their own client; everything else is a signal to refetch.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::draft::sequencer::DraftFormat;
use crate::store::{
    DraftSession, DraftStore, NewPick, PickRecord, SessionId, SessionStatus, StoreError,
};

/// What changed in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    PickInserted { pick_number: u32 },
    PickDeleted { pick_number: u32 },
    StatusChanged(SessionStatus),
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickEvent {
    pub session_id: SessionId,
    /// Client that made the change.
    pub origin: String,
    pub kind: ChangeKind,
}

/// What a subscriber sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    /// Another client changed the session.
    Event(PickEvent),
    /// The subscriber fell behind and missed `n` events; refetch everything.
    Lagged(u64),
}

/// Broadcast hub shared by every client in the process.
#[derive(Debug, Clone)]
pub struct PickFeed {
    tx: broadcast::Sender<PickEvent>,
}

impl PickFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        PickFeed { tx }
    }

    /// Publish an event. Returns the number of subscribers that will see it;
    /// zero subscribers is not an error.
    pub fn publish(&self, event: PickEvent) -> usize {
        debug!(
            "Publishing {:?} for session {} from {}",
            event.kind, event.session_id, event.origin
        );
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to remote changes of one session on behalf of `client_id`.
    pub fn subscribe(&self, session_id: SessionId, client_id: impl Into<String>) -> PickSubscription {
        PickSubscription {
            rx: self.tx.subscribe(),
            session_id,
            client_id: client_id.into(),
        }
    }
}

impl Default for PickFeed {
    fn default() -> Self {
        PickFeed::new(64)
    }
}

/// A session-scoped subscription that filters out the client's own writes.
pub struct PickSubscription {
    rx: broadcast::Receiver<PickEvent>,
    session_id: SessionId,
    client_id: String,
}

impl PickSubscription {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Wait for the next change made by a different client. Returns `None`
    /// once the feed has been dropped.
    pub async fn next_remote(&mut self) -> Option<RemoteChange> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if event.session_id != self.session_id || event.origin == self.client_id {
                        continue;
                    }
                    return Some(RemoteChange::Event(event));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        "Realtime subscriber for session {} lagged by {} events",
                        self.session_id, n
                    );
                    return Some(RemoteChange::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// A `DraftStore` decorator that publishes every successful write to a
/// `PickFeed`, tagged with the writing client's ID.
pub struct NotifyingStore {
    inner: Arc<dyn DraftStore>,
    feed: PickFeed,
    client_id: String,
}

impl NotifyingStore {
    pub fn new(inner: Arc<dyn DraftStore>, feed: PickFeed, client_id: impl Into<String>) -> Self {
        NotifyingStore {
            inner,
            feed,
            client_id: client_id.into(),
        }
    }

    fn notify(&self, session_id: SessionId, kind: ChangeKind) {
        self.feed.publish(PickEvent {
            session_id,
            origin: self.client_id.clone(),
            kind,
        });
    }
}

#[async_trait]
impl DraftStore for NotifyingStore {
    async fn get_or_create_session(
        &self,
        event_id: &str,
        format: DraftFormat,
    ) -> Result<DraftSession, StoreError> {
        self.inner.get_or_create_session(event_id, format).await
    }

    async fn update_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StoreError> {
        self.inner.update_status(session_id, status).await?;
        self.notify(session_id, ChangeKind::StatusChanged(status));
        Ok(())
    }

    async fn record_pick(
        &self,
        session_id: SessionId,
        pick: &NewPick,
    ) -> Result<PickRecord, StoreError> {
        let record = self.inner.record_pick(session_id, pick).await?;
        self.notify(
            session_id,
            ChangeKind::PickInserted {
                pick_number: record.pick_number,
            },
        );
        Ok(record)
    }

    async fn delete_last_pick(
        &self,
        session_id: SessionId,
        pick: &NewPick,
    ) -> Result<(), StoreError> {
        self.inner.delete_last_pick(session_id, pick).await?;
        self.notify(
            session_id,
            ChangeKind::PickDeleted {
                pick_number: pick.pick_number,
            },
        );
        Ok(())
    }

    async fn list_picks(&self, session_id: SessionId) -> Result<Vec<PickRecord>, StoreError> {
        self.inner.list_picks(session_id).await
    }

    async fn finalize(
        &self,
        session_id: SessionId,
        event_id: &str,
        expected_picks: u32,
    ) -> Result<(), StoreError> {
        self.inner
            .finalize(session_id, event_id, expected_picks)
            .await?;
        self.notify(session_id, ChangeKind::Finalized);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn event(session_id: SessionId, origin: &str, pick_number: u32) -> PickEvent {
        PickEvent {
            session_id,
            origin: origin.to_string(),
            kind: ChangeKind::PickInserted { pick_number },
        }
    }

    #[tokio::test]
    async fn subscriber_receives_remote_events() {
        let feed = PickFeed::new(16);
        let mut sub = feed.subscribe(1, "client_b");

        assert_eq!(feed.publish(event(1, "client_a", 1)), 1);

        let change = sub.next_remote().await.unwrap();
        assert_eq!(change, RemoteChange::Event(event(1, "client_a", 1)));
    }

    #[tokio::test]
    async fn own_and_foreign_session_events_are_filtered() {
        let feed = PickFeed::new(16);
        let mut sub = feed.subscribe(1, "client_b");

        feed.publish(event(1, "client_b", 1)); // own write
        feed.publish(event(2, "client_a", 1)); // other session
        feed.publish(event(1, "client_a", 2));

        let change = sub.next_remote().await.unwrap();
        assert_eq!(change, RemoteChange::Event(event(1, "client_a", 2)));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let feed = PickFeed::new(4);
        assert_eq!(feed.publish(event(1, "a", 1)), 0);
    }

    #[tokio::test]
    async fn lagged_subscriber_is_told_to_resync() {
        let feed = PickFeed::new(2);
        let mut sub = feed.subscribe(1, "client_b");
        for n in 1..=5 {
            feed.publish(event(1, "client_a", n));
        }
        assert!(matches!(
            sub.next_remote().await,
            Some(RemoteChange::Lagged(_))
        ));
    }

    #[tokio::test]
    async fn closed_feed_ends_subscription() {
        let feed = PickFeed::new(4);
        let mut sub = feed.subscribe(1, "client_b");
        drop(feed);
        assert!(sub.next_remote().await.is_none());
    }

    #[tokio::test]
    async fn notifying_store_publishes_successful_writes_only() {
        let feed = PickFeed::new(16);
        let db: Arc<dyn DraftStore> = Arc::new(Database::open(":memory:").unwrap());
        let store = NotifyingStore::new(db, feed.clone(), "client_a");

        let session = store
            .get_or_create_session("evt", DraftFormat::Snake)
            .await
            .unwrap();
        let mut sub = feed.subscribe(session.id, "client_b");

        let pick = NewPick {
            team_id: "blue".into(),
            player_id: "P1".into(),
            pick_number: 1,
        };
        store.record_pick(session.id, &pick).await.unwrap();

        // A conflicting write fails and must not be broadcast.
        let clash = NewPick {
            team_id: "red".into(),
            player_id: "P2".into(),
            pick_number: 1,
        };
        assert!(store.record_pick(session.id, &clash).await.is_err());
        // So must a stale undo of a pick that was never stored.
        assert!(store.delete_last_pick(session.id, &clash).await.is_err());
        store.delete_last_pick(session.id, &pick).await.unwrap();

        assert_eq!(
            sub.next_remote().await,
            Some(RemoteChange::Event(event(session.id, "client_a", 1)))
        );
        assert_eq!(
            sub.next_remote().await,
            Some(RemoteChange::Event(PickEvent {
                session_id: session.id,
                origin: "client_a".into(),
                kind: ChangeKind::PickDeleted { pick_number: 1 },
            }))
        );
    }
}
