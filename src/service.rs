//! Service layer API for sale and exchange workflows
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::MarketConfig;
use crate::error::{MarketError, ValidationError};
use crate::models::{Notification, TimeStamp, User};
use crate::notify::{self, Messages, NotificationDispatcher, NotificationPayload};
use crate::repository::{MemoizedRepository, Repository};
use crate::state::{ExchangeAction, ExchangeStatus, Lifecycle, SaleAction, SaleStatus};
use crate::store::MarketStore;
use crate::transaction::{
    CreateExchangeRequest, CreateSaleRequest, ExchangeForm, ExchangeTransaction, SaleForm,
    SaleTransaction,
};
use crate::utils::{EXCHANGE_PREFIX, SALE_PREFIX};
use crate::validator;

/// One row of a user's transaction history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    Sale(SaleTransaction),
    Exchange(ExchangeTransaction),
}

impl HistoryEntry {
    pub fn id(&self) -> &str {
        match self {
            HistoryEntry::Sale(sale) => &sale.sale_id,
            HistoryEntry::Exchange(exchange) => &exchange.exchange_id,
        }
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        match self {
            HistoryEntry::Sale(sale) => &sale.created_at,
            HistoryEntry::Exchange(exchange) => &exchange.created_at,
        }
    }
}

// Logs the failure at the level its kind deserves and hands it to the caller.
fn surface<T>(operation: &'static str, result: Result<T, MarketError>) -> anyhow::Result<T> {
    result.map_err(|err| {
        if err.is_user_facing() {
            warn!(operation, error = %err, "request rejected");
        } else {
            error!(operation, error = %err, "store failure");
        }
        anyhow::Error::new(err)
    })
}

pub struct MarketService {
    store: MarketStore,
}

impl MarketService {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        Ok(Self {
            store: MarketStore::new(instance)?,
        })
    }

    pub fn open(config: &MarketConfig) -> anyhow::Result<Self> {
        Ok(Self {
            store: MarketStore::open(config)?,
        })
    }

    /// Direct access to the underlying documents (users, products, posts).
    pub fn store(&self) -> &MarketStore {
        &self.store
    }

    fn notify_parties<R: Repository + ?Sized>(
        &self,
        repo: &R,
        initiator_id: &str,
        counterparty_id: &str,
        messages: Messages,
        payload: impl Fn(String) -> NotificationPayload,
    ) -> Result<(), MarketError> {
        let dispatcher = NotificationDispatcher::new(&self.store);
        dispatcher.dispatch(repo, initiator_id, payload(messages.initiator))?;
        dispatcher.dispatch(repo, counterparty_id, payload(messages.counterparty))?;
        Ok(())
    }

    /// Validate a buy request, store it as a pending sale and notify buyer and seller
    pub fn create_sale(&self, request: CreateSaleRequest) -> anyhow::Result<SaleTransaction> {
        surface("create_sale", self.try_create_sale(request))
    }

    /// Same as [`MarketService::create_sale`] for unparsed form input
    pub fn create_sale_from_form(&self, form: SaleForm) -> anyhow::Result<SaleTransaction> {
        let request = surface(
            "create_sale",
            CreateSaleRequest::try_from(form).map_err(MarketError::from),
        )?;
        self.create_sale(request)
    }

    fn try_create_sale(&self, request: CreateSaleRequest) -> Result<SaleTransaction, MarketError> {
        let repo = MemoizedRepository::new(&self.store);
        let validated = validator::validate_sale(&repo, request)?;

        let sale = SaleTransaction::pending(self.store.mint_id(SALE_PREFIX)?, validated.request);
        self.store.insert_sale(&sale)?;
        info!(
            sale_id = %sale.sale_id,
            product_id = %sale.product_id,
            quantity = sale.quantity,
            "sale transaction created"
        );

        let product = repo.product_name(&sale.product_id)?;
        let buyer = repo.display_name(&sale.buyer_id)?;
        self.notify_parties(
            &repo,
            &sale.buyer_id,
            &sale.seller_id,
            notify::sale_placed(&product, &buyer),
            |message| NotificationPayload::sale(message, &sale.sale_id),
        )?;

        Ok(sale)
    }

    /// Validate a swap proposal, store it as a pending exchange and notify both parties
    pub fn create_exchange(
        &self,
        request: CreateExchangeRequest,
    ) -> anyhow::Result<ExchangeTransaction> {
        surface("create_exchange", self.try_create_exchange(request))
    }

    pub fn create_exchange_from_form(
        &self,
        form: ExchangeForm,
    ) -> anyhow::Result<ExchangeTransaction> {
        let request = surface(
            "create_exchange",
            CreateExchangeRequest::try_from(form).map_err(MarketError::from),
        )?;
        self.create_exchange(request)
    }

    fn try_create_exchange(
        &self,
        request: CreateExchangeRequest,
    ) -> Result<ExchangeTransaction, MarketError> {
        let repo = MemoizedRepository::new(&self.store);
        let validated = validator::validate_exchange(&repo, request)?;

        let exchange_id = match validated.request.exchange_id.clone() {
            Some(id) => id,
            None => self.store.mint_id(EXCHANGE_PREFIX)?,
        };
        let exchange = ExchangeTransaction::pending(exchange_id, validated.request);
        self.store.insert_exchange(&exchange)?;
        info!(
            exchange_id = %exchange.exchange_id,
            product_id1 = %exchange.product_id1,
            product_id2 = %exchange.product_id2,
            "exchange transaction created"
        );

        let offered = repo.product_name(&exchange.product_id1)?;
        let requested = repo.product_name(&exchange.product_id2)?;
        let requester = repo.display_name(&exchange.user1_id)?;
        self.notify_parties(
            &repo,
            &exchange.user1_id,
            &exchange.user2_id,
            notify::exchange_proposed(&offered, &requested, &requester),
            |message| NotificationPayload::exchange(message, &exchange.exchange_id),
        )?;

        Ok(exchange)
    }

    /// Move a pending sale to completed or cancelled
    pub fn transition_sale(
        &self,
        sale_id: &str,
        action: SaleAction,
    ) -> anyhow::Result<SaleTransaction> {
        let sale = self
            .store
            .commit_sale_transition(sale_id, action)
            .and_then(|sale| self.announce_sale(sale, action));
        surface("transition_sale", sale)
    }

    /// Buyer confirmation of a pending sale; refused until a non-zero price is set
    pub fn complete_sale(&self, sale_id: &str) -> anyhow::Result<SaleTransaction> {
        let sale = self
            .store
            .confirm_sale(sale_id)
            .and_then(|sale| self.announce_sale(sale, SaleAction::Complete));
        surface("complete_sale", sale)
    }

    pub fn cancel_sale(&self, sale_id: &str) -> anyhow::Result<SaleTransaction> {
        self.transition_sale(sale_id, SaleAction::Cancel)
    }

    /// Transition addressed by the target status name ("completed", "cancelled")
    pub fn update_sale_status(&self, sale_id: &str, status: &str) -> anyhow::Result<SaleTransaction> {
        let action = surface(
            "transition_sale",
            status.parse::<SaleAction>().map_err(MarketError::from),
        )?;
        self.transition_sale(sale_id, action)
    }

    // Logs a committed sale transition and tells both parties about it.
    fn announce_sale(
        &self,
        sale: SaleTransaction,
        action: SaleAction,
    ) -> Result<SaleTransaction, MarketError> {
        info!(sale_id = %sale.sale_id, status = %sale.status, "sale transaction updated");
        if SaleStatus::consumes_stock(action) {
            debug!(product_id = %sale.product_id, quantity = sale.quantity, "stock taken");
        }

        let repo = MemoizedRepository::new(&self.store);
        let product = repo.product_name(&sale.product_id)?;
        let buyer = repo.display_name(&sale.buyer_id)?;
        if let Some(messages) = notify::sale_status_changed(sale.status, &product, &buyer) {
            self.notify_parties(&repo, &sale.buyer_id, &sale.seller_id, messages, |message| {
                NotificationPayload::sale(message, &sale.sale_id)
            })?;
        }

        Ok(sale)
    }

    /// Move a pending exchange to accepted or rejected
    pub fn transition_exchange(
        &self,
        exchange_id: &str,
        action: ExchangeAction,
    ) -> anyhow::Result<ExchangeTransaction> {
        surface(
            "transition_exchange",
            self.try_transition_exchange(exchange_id, action),
        )
    }

    pub fn accept_exchange(&self, exchange_id: &str) -> anyhow::Result<ExchangeTransaction> {
        self.transition_exchange(exchange_id, ExchangeAction::Accept)
    }

    pub fn reject_exchange(&self, exchange_id: &str) -> anyhow::Result<ExchangeTransaction> {
        self.transition_exchange(exchange_id, ExchangeAction::Reject)
    }

    /// Transition addressed by the target status name ("accepted", "rejected")
    pub fn update_exchange_status(
        &self,
        exchange_id: &str,
        status: &str,
    ) -> anyhow::Result<ExchangeTransaction> {
        let action = surface(
            "transition_exchange",
            status.parse::<ExchangeAction>().map_err(MarketError::from),
        )?;
        self.transition_exchange(exchange_id, action)
    }

    fn try_transition_exchange(
        &self,
        exchange_id: &str,
        action: ExchangeAction,
    ) -> Result<ExchangeTransaction, MarketError> {
        let exchange = self.store.commit_exchange_transition(exchange_id, action)?;
        info!(exchange_id, status = %exchange.status, "exchange transaction updated");
        if ExchangeStatus::consumes_stock(action) {
            debug!(
                product_id1 = %exchange.product_id1,
                product_id2 = %exchange.product_id2,
                "stock taken on both sides"
            );
        }

        let repo = MemoizedRepository::new(&self.store);
        let offered = repo.product_name(&exchange.product_id1)?;
        let requested = repo.product_name(&exchange.product_id2)?;
        let requester = repo.display_name(&exchange.user1_id)?;
        if let Some(messages) =
            notify::exchange_status_changed(exchange.status, &offered, &requested, &requester)
        {
            self.notify_parties(
                &repo,
                &exchange.user1_id,
                &exchange.user2_id,
                messages,
                |message| NotificationPayload::exchange(message, exchange_id),
            )?;
        }

        Ok(exchange)
    }

    /// Record the agreed price on a pending sale; completion requires one
    pub fn set_sale_price(&self, sale_id: &str, price: u64) -> anyhow::Result<SaleTransaction> {
        let sale = surface("set_sale_price", self.store.set_sale_price(sale_id, price))?;
        info!(sale_id, price, "sale price set");
        Ok(sale)
    }

    pub fn get_sale(&self, sale_id: &str) -> anyhow::Result<SaleTransaction> {
        let found = self.store.sale(sale_id).and_then(|sale| {
            sale.ok_or_else(|| MarketError::TransactionNotFound(sale_id.to_string()))
        });
        surface("get_sale", found)
    }

    pub fn get_exchange(&self, exchange_id: &str) -> anyhow::Result<ExchangeTransaction> {
        let found = self.store.exchange(exchange_id).and_then(|exchange| {
            exchange.ok_or_else(|| MarketError::TransactionNotFound(exchange_id.to_string()))
        });
        surface("get_exchange", found)
    }

    pub fn list_sales(&self) -> anyhow::Result<Vec<SaleTransaction>> {
        surface("list_sales", self.store.sales_where(|_| true))
    }

    pub fn list_exchanges(&self) -> anyhow::Result<Vec<ExchangeTransaction>> {
        surface("list_exchanges", self.store.exchanges_where(|_| true))
    }

    /// Every sale and exchange `user_id` took part in, newest first
    pub fn transaction_history(&self, user_id: &str) -> anyhow::Result<Vec<HistoryEntry>> {
        let sales = surface(
            "transaction_history",
            self.store.sales_where(|sale| sale.involves(user_id)),
        )?;
        let exchanges = surface(
            "transaction_history",
            self.store.exchanges_where(|exchange| exchange.involves(user_id)),
        )?;

        let mut history: Vec<HistoryEntry> = sales
            .into_iter()
            .map(HistoryEntry::Sale)
            .chain(exchanges.into_iter().map(HistoryEntry::Exchange))
            .collect();
        history.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        Ok(history)
    }

    /// Notifications addressed to an auth uid, newest first
    pub fn notifications_for(&self, uid: &str) -> anyhow::Result<Vec<Notification>> {
        surface("notifications_for", self.store.notifications_for(uid))
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> anyhow::Result<Notification> {
        surface(
            "mark_notification_read",
            self.store.mark_notification_read(notification_id),
        )
    }

    /// Give `user_id` a 1 to 5 star rating
    pub fn rate_user(&self, user_id: &str, score: u8) -> anyhow::Result<User> {
        surface("rate_user", self.try_rate_user(user_id, score))
    }

    fn try_rate_user(&self, user_id: &str, score: u8) -> Result<User, MarketError> {
        if !(1..=5).contains(&score) {
            return Err(ValidationError::InvalidRating(score).into());
        }
        let target = self
            .store
            .user_by_business_id(user_id)?
            .ok_or_else(|| MarketError::UserNotFound(user_id.to_string()))?;
        let user = self
            .store
            .update_user(&target.uid, |user| user.record_rating(score))?;
        info!(user_id, score, rating_count = user.rating_count, "user rated");
        Ok(user)
    }
}
