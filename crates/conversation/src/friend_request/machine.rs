//! Friend request transitions on a thread
//!
//! Every transition goes through [`Thread::save_friend_request_status`], which
//! validates against the latest persisted status, writes it, and prunes the
//! thread's friend request messages in the same transaction.

use std::collections::HashSet;
use std::ops::ControlFlow;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::FriendRequestStatus;
use crate::config::ConversationSettings;
use crate::error::ThreadError;
use crate::models::{FriendRequestMessageState, Interaction, InteractionId, Thread};
use crate::storage::{EnumerationOrder, ReadTransaction, WriteTransaction};

/// Which side of the handshake a friend request message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestDirection {
    Outgoing,
    Incoming,
}

impl RequestDirection {
    fn matches(&self, interaction: &Interaction) -> bool {
        interaction.is_friend_request()
            && match self {
                RequestDirection::Outgoing => interaction.is_outgoing(),
                RequestDirection::Incoming => interaction.is_incoming(),
            }
    }

    /// State the surviving request message should carry once the thread is in
    /// `status`. `None` leaves the message as it is.
    fn settled_state(&self, status: FriendRequestStatus) -> Option<FriendRequestMessageState> {
        use FriendRequestStatus as S;

        match (self, status) {
            (_, S::Friends) => Some(FriendRequestMessageState::Accepted),
            (_, S::RequestExpired) => Some(FriendRequestMessageState::Expired),
            (RequestDirection::Outgoing, S::None) => Some(FriendRequestMessageState::Failed),
            // Our request was superseded by the peer's
            (RequestDirection::Outgoing, S::RequestReceived) => {
                Some(FriendRequestMessageState::Expired)
            }
            (RequestDirection::Outgoing, S::RequestSending | S::RequestSent) => None,
            (RequestDirection::Incoming, S::RequestReceived) => None,
            (
                RequestDirection::Incoming,
                S::None | S::RequestSending | S::RequestSent,
            ) => Some(FriendRequestMessageState::Expired),
        }
    }

    /// Direction of the request a pending status is waiting on
    fn for_pending(status: FriendRequestStatus) -> Option<Self> {
        match status {
            FriendRequestStatus::RequestSending | FriendRequestStatus::RequestSent => {
                Some(RequestDirection::Outgoing)
            }
            FriendRequestStatus::RequestReceived => Some(RequestDirection::Incoming),
            _ => None,
        }
    }
}

impl Thread {
    /// Persist a new friend request status.
    ///
    /// This is the only way the status changes. The move is checked against
    /// the latest persisted status; a move outside the table fails with
    /// [`ThreadError::InvalidTransition`] and writes nothing. On success both
    /// message cleanups run in `tx`.
    pub fn save_friend_request_status(
        &mut self,
        status: FriendRequestStatus,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        let mut latest = self.latest_copy(tx.as_read())?;
        let from = latest.friend_request_status();

        if latest.is_group_thread() || !from.can_transition_to(status) {
            warn!(
                "Rejected friend request transition {:?} -> {:?} for thread {}",
                from,
                status,
                self.id.as_str()
            );
            return Err(ThreadError::InvalidTransition { from, to: status }.into());
        }

        latest.replace_friend_request_status(status, Utc::now());
        tx.save_thread(&latest)?;
        *self = latest;

        info!(
            "Friend request status for thread {}: {:?} -> {:?}",
            self.id.as_str(),
            from,
            status
        );

        self.remove_old_outgoing_friend_request_messages_if_needed(tx)?;
        self.remove_old_incoming_friend_request_messages_if_needed(tx)?;
        Ok(())
    }

    /// The local user starts sending a request (from None, or a retry after expiry)
    pub fn begin_sending_friend_request(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        self.save_friend_request_status(FriendRequestStatus::RequestSending, tx)
    }

    /// The outbound request was confirmed sent
    pub fn did_send_friend_request(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        // A mutual request may have made us friends while ours was in flight
        if self.persisted_status(tx.as_read())? == FriendRequestStatus::Friends {
            return Ok(());
        }
        self.save_friend_request_status(FriendRequestStatus::RequestSent, tx)
    }

    /// The outbound request could not be sent
    pub fn friend_request_send_failed(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        self.save_friend_request_status(FriendRequestStatus::None, tx)
    }

    /// The peer's friend request arrived.
    ///
    /// If we are already requesting (sending or sent), both sides want the
    /// connection and the thread becomes Friends in one step.
    pub fn receive_friend_request(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        let next = match self.persisted_status(tx.as_read())? {
            FriendRequestStatus::Friends => return Ok(()),
            FriendRequestStatus::RequestSending | FriendRequestStatus::RequestSent => {
                FriendRequestStatus::Friends
            }
            _ => FriendRequestStatus::RequestReceived,
        };
        self.save_friend_request_status(next, tx)
    }

    /// The local user accepted the peer's request
    pub fn accept_friend_request(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        let current = self.persisted_status(tx.as_read())?;
        if current != FriendRequestStatus::RequestReceived {
            warn!(
                "Cannot accept friend request for thread {} in state {:?}",
                self.id.as_str(),
                current
            );
            return Err(ThreadError::InvalidTransition {
                from: current,
                to: FriendRequestStatus::Friends,
            }
            .into());
        }
        self.save_friend_request_status(FriendRequestStatus::Friends, tx)
    }

    /// The peer accepted our request
    pub fn friend_request_accepted_by_peer(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        match self.persisted_status(tx.as_read())? {
            FriendRequestStatus::Friends => Ok(()),
            FriendRequestStatus::RequestSent => {
                self.save_friend_request_status(FriendRequestStatus::Friends, tx)
            }
            current => {
                warn!(
                    "Ignoring acceptance for thread {} in state {:?}",
                    self.id.as_str(),
                    current
                );
                Err(ThreadError::InvalidTransition {
                    from: current,
                    to: FriendRequestStatus::Friends,
                }
                .into())
            }
        }
    }

    /// Status as of `now`, reporting an elapsed pending request as expired.
    /// Reads only; see [`Thread::expire_friend_request_if_needed`] to persist it.
    pub fn friend_request_status_at(
        &self,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
        tx: &dyn ReadTransaction,
    ) -> Result<FriendRequestStatus> {
        let latest = tx.thread(&self.id)?.unwrap_or_else(|| self.clone());
        if latest.is_group_thread() {
            return Ok(FriendRequestStatus::None);
        }

        let status = latest.friend_request_status();
        if latest.is_request_past_expiry(settings, now, tx)? {
            return Ok(FriendRequestStatus::RequestExpired);
        }
        Ok(status)
    }

    /// [`Thread::has_pending_friend_request`] with lazy expiry applied
    pub fn has_pending_friend_request_at(
        &self,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
        tx: &dyn ReadTransaction,
    ) -> Result<bool> {
        Ok(self.friend_request_status_at(settings, now, tx)?.is_pending())
    }

    /// [`Thread::has_current_user_sent_friend_request`] with lazy expiry applied
    pub fn has_current_user_sent_friend_request_at(
        &self,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
        tx: &dyn ReadTransaction,
    ) -> Result<bool> {
        Ok(self
            .friend_request_status_at(settings, now, tx)?
            .is_sent_by_current_user())
    }

    /// [`Thread::has_current_user_received_friend_request`] with lazy expiry applied
    pub fn has_current_user_received_friend_request_at(
        &self,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
        tx: &dyn ReadTransaction,
    ) -> Result<bool> {
        Ok(self.friend_request_status_at(settings, now, tx)?
            == FriendRequestStatus::RequestReceived)
    }

    /// Persist expiry of a stale pending request. Returns true if it expired.
    pub fn expire_friend_request_if_needed(
        &mut self,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
        tx: &mut dyn WriteTransaction,
    ) -> Result<bool> {
        let latest = self.latest_copy(tx.as_read())?;
        if latest.is_group_thread() || !latest.is_request_past_expiry(settings, now, tx.as_read())? {
            return Ok(false);
        }
        self.save_friend_request_status(FriendRequestStatus::RequestExpired, tx)?;
        Ok(true)
    }

    /// Keep only the newest outgoing friend request message and settle it
    /// against the current status
    pub fn remove_old_outgoing_friend_request_messages_if_needed(
        &mut self,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        self.prune_friend_request_messages(RequestDirection::Outgoing, tx)
    }

    /// Keep only the newest incoming friend request message and settle it
    /// once a decision has been recorded
    pub fn remove_old_incoming_friend_request_messages_if_needed(
        &mut self,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        self.prune_friend_request_messages(RequestDirection::Incoming, tx)
    }

    fn prune_friend_request_messages(
        &mut self,
        direction: RequestDirection,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        let Some(mut latest) = tx.thread(&self.id)? else {
            debug!("Thread {} is gone; nothing to clean up", self.id.as_str());
            return Ok(());
        };

        let requests: Vec<Interaction> = tx
            .interactions(&self.id)?
            .into_iter()
            .filter(|i| direction.matches(i))
            .collect();
        let Some((newest, older)) = requests.split_last() else {
            return Ok(());
        };

        let mut changed = false;
        if !older.is_empty() {
            let doomed: HashSet<&InteractionId> = older.iter().map(|i| &i.id).collect();
            let removed = tx.remove_interactions_where(&self.id, &|i: &Interaction| {
                doomed.contains(&i.id)
            })?;
            debug!(
                "Removed {} superseded {:?} friend request messages from thread {}",
                removed,
                direction,
                self.id.as_str()
            );
            changed = true;
        }

        if let Some(state) = direction.settled_state(latest.friend_request_status()) {
            if newest.friend_request != Some(state) {
                let mut survivor = newest.clone();
                survivor.friend_request = Some(state);
                tx.save_interaction(&mut survivor)?;
                changed = true;
            }
        }

        if changed {
            latest.last_interaction = tx.latest_interaction(&self.id)?;
            tx.save_thread(&latest)?;
            *self = latest;
        }
        Ok(())
    }

    fn is_request_past_expiry(
        &self,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
        tx: &dyn ReadTransaction,
    ) -> Result<bool> {
        let status = self.friend_request_status();
        // Sending has not left the device yet; it cannot expire
        if !matches!(
            status,
            FriendRequestStatus::RequestSent | FriendRequestStatus::RequestReceived
        ) {
            return Ok(false);
        }

        let Some(since) = self.pending_request_timestamp(status, tx)? else {
            return Ok(false);
        };
        Ok(now - since >= settings.friend_request_expiry())
    }

    /// Timestamp of the newest still-pending request message in the pending
    /// direction, falling back to when the status last changed. Settled
    /// messages belong to an earlier attempt and never start the window.
    fn pending_request_timestamp(
        &self,
        status: FriendRequestStatus,
        tx: &dyn ReadTransaction,
    ) -> Result<Option<DateTime<Utc>>> {
        let Some(direction) = RequestDirection::for_pending(status) else {
            return Ok(None);
        };

        let mut found = None;
        tx.enumerate_interactions(
            &self.id,
            EnumerationOrder::NewestFirst,
            &mut |i: &Interaction| {
                if direction.matches(i) && i.is_pending_friend_request() {
                    found = Some(i.timestamp);
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )?;
        Ok(found.or(self.friend_request_updated_at()))
    }

    fn persisted_status(&self, tx: &dyn ReadTransaction) -> Result<FriendRequestStatus> {
        Ok(self.latest_copy(tx)?.friend_request_status())
    }

    /// The persisted copy of this thread; an error if it has been removed
    pub(crate) fn latest_copy(&self, tx: &dyn ReadTransaction) -> Result<Thread> {
        tx.thread(&self.id)?
            .ok_or_else(|| ThreadError::thread_not_found(&self.id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThreadId;
    use crate::storage::{ConversationStoreExt, InMemoryConversationStore};
    use chrono::Duration;

    fn saved_contact(store: &InMemoryConversationStore) -> Thread {
        let thread = Thread::contact("+15550001111");
        store.read_write(|tx| tx.save_thread(&thread)).unwrap();
        thread
    }

    fn add_request(
        store: &InMemoryConversationStore,
        thread_id: &ThreadId,
        id: &str,
        outgoing: bool,
        at: DateTime<Utc>,
    ) {
        let builder = Interaction::builder(InteractionId::new(id), thread_id.clone());
        let builder = if outgoing {
            builder.outgoing()
        } else {
            builder.incoming("+15550001111")
        };
        let mut message = builder.body("hi").timestamp(at).friend_request().build();
        store
            .read_write(|tx| tx.save_interaction(&mut message))
            .unwrap();
    }

    fn requests(store: &InMemoryConversationStore, thread_id: &ThreadId) -> Vec<Interaction> {
        store
            .read(|tx| tx.interactions(thread_id))
            .unwrap()
            .into_iter()
            .filter(|i| i.is_friend_request())
            .collect()
    }

    #[test]
    fn test_rejected_transition_writes_nothing() {
        let store = InMemoryConversationStore::new();
        let mut thread = saved_contact(&store);

        let err = store
            .read_write(|tx| thread.save_friend_request_status(FriendRequestStatus::Friends, tx))
            .unwrap_err();

        assert_eq!(
            ThreadError::from_anyhow(&err),
            Some(&ThreadError::InvalidTransition {
                from: FriendRequestStatus::None,
                to: FriendRequestStatus::Friends,
            })
        );
        let stored = store.read(|tx| thread.latest_copy(tx)).unwrap();
        assert_eq!(stored.friend_request_status(), FriendRequestStatus::None);
        assert_eq!(stored.friend_request_updated_at(), None);
    }

    #[test]
    fn test_group_thread_rejects_every_transition() {
        let store = InMemoryConversationStore::new();
        let mut group = Thread::group(vec![7], None, vec![]);
        store.read_write(|tx| tx.save_thread(&group)).unwrap();

        let result = store.read_write(|tx| group.begin_sending_friend_request(tx));
        assert!(result.is_err());
    }

    #[test]
    fn test_unsaved_thread_is_not_found() {
        let store = InMemoryConversationStore::new();
        let mut thread = Thread::contact("nobody");

        let err = store
            .read_write(|tx| thread.begin_sending_friend_request(tx))
            .unwrap_err();
        assert!(matches!(
            ThreadError::from_anyhow(&err),
            Some(ThreadError::NotFound(_))
        ));
    }

    #[test]
    fn test_stale_copy_is_validated_against_store() {
        let store = InMemoryConversationStore::new();
        let mut thread = saved_contact(&store);
        let mut stale = thread.clone();

        store
            .read_write(|tx| thread.begin_sending_friend_request(tx))
            .unwrap();

        // The stale copy still says None, but the store says RequestSending
        store
            .read_write(|tx| stale.did_send_friend_request(tx))
            .unwrap();
        assert_eq!(stale.friend_request_status(), FriendRequestStatus::RequestSent);
    }

    #[test]
    fn test_send_failure_marks_request_failed() {
        let store = InMemoryConversationStore::new();
        let mut thread = saved_contact(&store);
        add_request(&store, &thread.id, "out1", true, Utc::now());

        store
            .read_write(|tx| {
                thread.begin_sending_friend_request(tx)?;
                thread.friend_request_send_failed(tx)
            })
            .unwrap();

        assert_eq!(thread.friend_request_status(), FriendRequestStatus::None);
        let remaining = requests(&store, &thread.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].friend_request, Some(FriendRequestMessageState::Failed));
    }

    #[test]
    fn test_duplicate_incoming_requests_keep_newest() {
        let store = InMemoryConversationStore::new();
        let mut thread = saved_contact(&store);
        let now = Utc::now();
        add_request(&store, &thread.id, "in1", false, now - Duration::minutes(2));
        add_request(&store, &thread.id, "in2", false, now);

        store
            .read_write(|tx| {
                thread.receive_friend_request(tx)?;
                thread.receive_friend_request(tx)
            })
            .unwrap();

        let remaining = requests(&store, &thread.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "in2");
        assert!(remaining[0].is_pending_friend_request());
        assert!(thread.has_current_user_received_friend_request());
    }

    #[test]
    fn test_accept_requires_received() {
        let store = InMemoryConversationStore::new();
        let mut thread = saved_contact(&store);

        assert!(store.read_write(|tx| thread.accept_friend_request(tx)).is_err());

        add_request(&store, &thread.id, "in1", false, Utc::now());
        store
            .read_write(|tx| {
                thread.receive_friend_request(tx)?;
                thread.accept_friend_request(tx)
            })
            .unwrap();

        assert!(thread.is_contact_friend());
        let remaining = requests(&store, &thread.id);
        assert_eq!(remaining[0].friend_request, Some(FriendRequestMessageState::Accepted));
        assert_eq!(thread.last_interaction.as_ref(), remaining.last());
    }

    #[test]
    fn test_friends_tolerates_late_confirmations() {
        let store = InMemoryConversationStore::new();
        let mut thread = saved_contact(&store);

        store
            .read_write(|tx| {
                thread.begin_sending_friend_request(tx)?;
                thread.receive_friend_request(tx)?;
                thread.did_send_friend_request(tx)?;
                thread.friend_request_accepted_by_peer(tx)?;
                thread.receive_friend_request(tx)
            })
            .unwrap();

        assert_eq!(thread.friend_request_status(), FriendRequestStatus::Friends);
    }

    #[test]
    fn test_lazy_expiry_reads_without_writing() {
        let store = InMemoryConversationStore::new();
        let settings = ConversationSettings::default();
        let mut thread = saved_contact(&store);
        let sent_at = Utc::now() - Duration::hours(100);
        add_request(&store, &thread.id, "out1", true, sent_at);

        store
            .read_write(|tx| {
                thread.begin_sending_friend_request(tx)?;
                thread.did_send_friend_request(tx)
            })
            .unwrap();

        let now = Utc::now();
        let seen = store
            .read(|tx| thread.friend_request_status_at(&settings, now, tx))
            .unwrap();
        assert_eq!(seen, FriendRequestStatus::RequestExpired);
        assert_eq!(
            store.read(|tx| thread.latest_copy(tx)).unwrap().friend_request_status(),
            FriendRequestStatus::RequestSent
        );
        assert!(thread.has_pending_friend_request());
        assert!(
            !store
                .read(|tx| thread.has_pending_friend_request_at(&settings, now, tx))
                .unwrap()
        );
        assert!(
            !store
                .read(|tx| thread.has_current_user_sent_friend_request_at(&settings, now, tx))
                .unwrap()
        );

        // Not yet elapsed relative to an earlier "now"
        let early = sent_at + Duration::hours(1);
        let seen = store
            .read(|tx| thread.friend_request_status_at(&settings, early, tx))
            .unwrap();
        assert_eq!(seen, FriendRequestStatus::RequestSent);
    }

    #[test]
    fn test_expire_persists_and_settles_messages() {
        let store = InMemoryConversationStore::new();
        let settings = ConversationSettings::default();
        let mut thread = saved_contact(&store);
        add_request(&store, &thread.id, "in1", false, Utc::now() - Duration::hours(80));

        store
            .read_write(|tx| thread.receive_friend_request(tx))
            .unwrap();
        let expired = store
            .read_write(|tx| thread.expire_friend_request_if_needed(&settings, Utc::now(), tx))
            .unwrap();

        assert!(expired);
        assert_eq!(thread.friend_request_status(), FriendRequestStatus::RequestExpired);
        assert!(!thread.has_pending_friend_request());
        let remaining = requests(&store, &thread.id);
        assert_eq!(remaining[0].friend_request, Some(FriendRequestMessageState::Expired));

        // Retry after expiry
        store
            .read_write(|tx| thread.begin_sending_friend_request(tx))
            .unwrap();
        assert!(thread.has_current_user_sent_friend_request());
    }

    #[test]
    fn test_retry_after_expiry_starts_a_fresh_window() {
        let store = InMemoryConversationStore::new();
        let settings = ConversationSettings::default();
        let mut thread = saved_contact(&store);
        add_request(&store, &thread.id, "out1", true, Utc::now() - Duration::hours(100));

        store
            .read_write(|tx| {
                thread.begin_sending_friend_request(tx)?;
                thread.did_send_friend_request(tx)?;
                thread.expire_friend_request_if_needed(&settings, Utc::now(), tx)
            })
            .unwrap();
        assert_eq!(thread.friend_request_status(), FriendRequestStatus::RequestExpired);

        // Re-sent without a new request message; the expired one stays settled
        store
            .read_write(|tx| {
                thread.begin_sending_friend_request(tx)?;
                thread.did_send_friend_request(tx)
            })
            .unwrap();
        assert_eq!(
            requests(&store, &thread.id)[0].friend_request,
            Some(FriendRequestMessageState::Expired)
        );

        let now = Utc::now();
        let seen = store
            .read(|tx| thread.friend_request_status_at(&settings, now, tx))
            .unwrap();
        assert_eq!(seen, FriendRequestStatus::RequestSent);
        let expired = store
            .read_write(|tx| thread.expire_friend_request_if_needed(&settings, now, tx))
            .unwrap();
        assert!(!expired);

        // The window runs from the retry
        let later = now + Duration::hours(73);
        let seen = store
            .read(|tx| thread.friend_request_status_at(&settings, later, tx))
            .unwrap();
        assert_eq!(seen, FriendRequestStatus::RequestExpired);
    }

    #[test]
    fn test_expire_is_noop_when_fresh() {
        let store = InMemoryConversationStore::new();
        let settings = ConversationSettings::default();
        let mut thread = saved_contact(&store);
        add_request(&store, &thread.id, "in1", false, Utc::now());

        store
            .read_write(|tx| thread.receive_friend_request(tx))
            .unwrap();
        let expired = store
            .read_write(|tx| thread.expire_friend_request_if_needed(&settings, Utc::now(), tx))
            .unwrap();

        assert!(!expired);
        assert_eq!(thread.friend_request_status(), FriendRequestStatus::RequestReceived);
    }

    #[test]
    fn test_cleanup_of_removed_thread_is_noop() {
        let store = InMemoryConversationStore::new();
        let mut thread = Thread::contact("gone");

        store
            .read_write(|tx| {
                thread.remove_old_outgoing_friend_request_messages_if_needed(tx)?;
                thread.remove_old_incoming_friend_request_messages_if_needed(tx)
            })
            .unwrap();
    }
}
