//! Notification dispatch.
//!
//! Delivery is at-most-once and best-effort: a counterparty whose business id does not
//! resolve is skipped with a warning and never aborts the surrounding transaction flow.
//! Storage failures still propagate.
use tracing::{debug, warn};

use crate::error::MarketError;
use crate::models::{Notification, NotificationKind, TimeStamp};
use crate::repository::Repository;
use crate::state::{ExchangeStatus, SaleStatus};
use crate::store::MarketStore;
use crate::utils::NOTIFICATION_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub message: String,
    pub related_id: Option<String>,
    pub kind: NotificationKind,
}

impl NotificationPayload {
    pub fn sale(message: String, sale_id: &str) -> Self {
        Self {
            message,
            related_id: Some(sale_id.to_string()),
            kind: NotificationKind::Sale,
        }
    }
    pub fn exchange(message: String, exchange_id: &str) -> Self {
        Self {
            message,
            related_id: Some(exchange_id.to_string()),
            kind: NotificationKind::Exchange,
        }
    }
}

pub struct NotificationDispatcher<'a> {
    store: &'a MarketStore,
}

impl<'a> NotificationDispatcher<'a> {
    pub fn new(store: &'a MarketStore) -> Self {
        Self { store }
    }

    /// Resolves `user_id` to its auth uid and stores one notification for it.
    /// Returns the new notification id, or `None` when the user does not exist.
    pub fn dispatch<R: Repository + ?Sized>(
        &self,
        repo: &R,
        user_id: &str,
        payload: NotificationPayload,
    ) -> Result<Option<String>, MarketError> {
        let Some(user) = repo.resolve_user(user_id)? else {
            warn!(
                user_id,
                related_id = payload.related_id.as_deref().unwrap_or_default(),
                "notification recipient not found, skipping"
            );
            return Ok(None);
        };
        let notification = self.deliver(&user.uid, payload)?;
        Ok(Some(notification.notification_id))
    }

    /// Stores a notification addressed directly to an auth uid.
    pub fn deliver(&self, uid: &str, payload: NotificationPayload) -> Result<Notification, MarketError> {
        let notification = Notification {
            notification_id: self.store.mint_id(NOTIFICATION_PREFIX)?,
            uid: uid.to_string(),
            message: payload.message,
            is_read: false,
            created_at: TimeStamp::new(),
            related_id: payload.related_id,
            kind: payload.kind,
        };
        self.store.insert_notification(&notification)?;
        debug!(
            notification_id = %notification.notification_id,
            uid,
            kind = notification.kind.as_str(),
            "notification stored"
        );
        Ok(notification)
    }
}

/// Message text for each party of a transaction event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    /// Buyer, or the exchange requester.
    pub initiator: String,
    /// Seller, or the exchange counterparty.
    pub counterparty: String,
}

pub fn sale_placed(product: &str, buyer: &str) -> Messages {
    Messages {
        initiator: format!("You placed an order for {product}."),
        counterparty: format!("{buyer} placed an order for {product}."),
    }
}

/// `None` for `pending`, which is never reached by a transition.
pub fn sale_status_changed(status: SaleStatus, product: &str, buyer: &str) -> Option<Messages> {
    let outcome = match status {
        SaleStatus::Completed => "is complete",
        SaleStatus::Cancelled => "was cancelled",
        SaleStatus::Pending => return None,
    };
    Some(Messages {
        initiator: format!("Your purchase of {product} {outcome}."),
        counterparty: format!("Your sale of {product} to {buyer} {outcome}."),
    })
}

pub fn exchange_proposed(offered: &str, requested: &str, requester: &str) -> Messages {
    Messages {
        initiator: format!("Your exchange request for {offered} is awaiting a response."),
        counterparty: format!(
            "{requester} wants to exchange {offered} for your {requested}. Please respond."
        ),
    }
}

pub fn exchange_status_changed(
    status: ExchangeStatus,
    offered: &str,
    requested: &str,
    requester: &str,
) -> Option<Messages> {
    let (outcome, verb) = match status {
        ExchangeStatus::Accepted => ("was accepted", "accepted"),
        ExchangeStatus::Rejected => ("was rejected", "rejected"),
        ExchangeStatus::Pending => return None,
    };
    Some(Messages {
        initiator: format!("Your exchange request for {offered} {outcome}."),
        counterparty: format!("You {verb} the exchange of your {requested} with {requester}."),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketConfig;
    use crate::models::User;

    #[test]
    fn missing_recipient_is_skipped() {
        let store = MarketStore::open(&MarketConfig::temporary()).unwrap();
        let dispatcher = NotificationDispatcher::new(&store);

        let sent = dispatcher
            .dispatch(
                &store,
                "nobody",
                NotificationPayload::sale("hi".into(), "sale_1"),
            )
            .unwrap();
        assert_eq!(sent, None);
    }

    #[test]
    fn dispatch_addresses_the_auth_uid() {
        let store = MarketStore::open(&MarketConfig::temporary()).unwrap();
        store.put_user(&User::new("uid-77", "hoa", "Hoa")).unwrap();
        let dispatcher = NotificationDispatcher::new(&store);

        let id = dispatcher
            .dispatch(
                &store,
                "hoa",
                NotificationPayload::exchange("swap?".into(), "exch_1"),
            )
            .unwrap()
            .unwrap();

        let stored = store.notification(&id).unwrap().unwrap();
        assert_eq!(stored.uid, "uid-77");
        assert_eq!(stored.kind, NotificationKind::Exchange);
        assert_eq!(stored.related_id.as_deref(), Some("exch_1"));
        assert!(!stored.is_read);
    }

    #[test]
    fn status_messages_follow_the_outcome() {
        let done = sale_status_changed(SaleStatus::Completed, "Lamp", "Binh").unwrap();
        assert_eq!(done.initiator, "Your purchase of Lamp is complete.");
        assert_eq!(done.counterparty, "Your sale of Lamp to Binh is complete.");
        assert!(sale_status_changed(SaleStatus::Pending, "Lamp", "Binh").is_none());

        let no = exchange_status_changed(ExchangeStatus::Rejected, "Book", "Fan", "An").unwrap();
        assert_eq!(no.initiator, "Your exchange request for Book was rejected.");
        assert_eq!(no.counterparty, "You rejected the exchange of your Fan with An.");
    }
}
