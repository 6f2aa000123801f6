//! Document store backed by sled.
//!
//! Every collection is its own `Tree`, keyed by document id, holding CBOR-encoded
//! documents. Users are additionally indexed by their business `user_id` so the
//! business-id lookup is a point read rather than a scan.
//!
//! Status transitions run inside a multi-tree sled transaction: the record is re-read,
//! the transition is checked against its current status and the stock decrements are
//! written together with the new status, or not at all.
use std::sync::Arc;

use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree, abort,
};
use sled::{Db, Transactional, Tree};

use crate::config::MarketConfig;
use crate::error::{MarketError, TransitionError, ValidationError};
use crate::models::{Notification, Post, Product, User};
use crate::state::{ExchangeAction, ExchangeStatus, Lifecycle, SaleAction, SaleStatus};
use crate::transaction::{ExchangeTransaction, SaleTransaction};
use crate::utils;

const USERS: &str = "users";
const USERS_BY_USER_ID: &str = "users_by_user_id";
const PRODUCTS: &str = "products";
const POSTS: &str = "posts";
const SALES: &str = "sale_transactions";
const EXCHANGES: &str = "exchange_transactions";
const NOTIFICATIONS: &str = "notifications";

pub(crate) fn encode_doc<T: minicbor::Encode<()>>(doc: &T) -> Result<Vec<u8>, MarketError> {
    minicbor::to_vec(doc).map_err(|e| MarketError::Encode(e.to_string()))
}

pub(crate) fn decode_doc<T>(bytes: &[u8]) -> Result<T, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn get_doc<T>(tree: &Tree, id: &str) -> Result<Option<T>, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    tree.get(id.as_bytes())?
        .map(|raw| decode_doc(&raw))
        .transpose()
}

fn put_doc<T: minicbor::Encode<()>>(tree: &Tree, id: &str, doc: &T) -> Result<(), MarketError> {
    tree.insert(id.as_bytes(), encode_doc(doc)?)?;
    Ok(())
}

// create-with-id: never overwrites an existing document
fn create_doc<T: minicbor::Encode<()>>(tree: &Tree, id: &str, doc: &T) -> Result<(), MarketError> {
    let bytes = encode_doc(doc)?;
    tree.compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(bytes))?
        .map_err(|_| MarketError::AlreadyExists(id.to_string()))
}

fn scan_where<T, F>(tree: &Tree, mut keep: F) -> Result<Vec<T>, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
    F: FnMut(&T) -> bool,
{
    let mut found = Vec::new();
    for entry in tree.iter() {
        let (_, raw) = entry?;
        let doc: T = decode_doc(&raw)?;
        if keep(&doc) {
            found.push(doc);
        }
    }
    Ok(found)
}

fn tx_get<T>(tree: &TransactionalTree, id: &str) -> ConflictableTransactionResult<Option<T>, MarketError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(id.as_bytes())? {
        Some(raw) => decode_doc(&raw)
            .map(Some)
            .map_err(ConflictableTransactionError::Abort),
        None => Ok(None),
    }
}

fn tx_put<T: minicbor::Encode<()>>(
    tree: &TransactionalTree,
    id: &str,
    doc: &T,
) -> ConflictableTransactionResult<(), MarketError> {
    let bytes = encode_doc(doc).map_err(ConflictableTransactionError::Abort)?;
    tree.insert(id.as_bytes(), bytes)?;
    Ok(())
}

fn tx_take_stock(
    products: &TransactionalTree,
    product_id: &str,
    quantity: u32,
) -> ConflictableTransactionResult<(), MarketError> {
    let Some(mut product) = tx_get::<Product>(products, product_id)? else {
        return abort(ValidationError::ProductNotFound(product_id.to_string()).into());
    };
    product.take_stock(quantity);
    tx_put(products, product_id, &product)
}

#[derive(Clone)]
pub struct MarketStore {
    instance: Arc<Db>,
    users: Tree,
    user_index: Tree,
    products: Tree,
    posts: Tree,
    sales: Tree,
    exchanges: Tree,
    notifications: Tree,
    flush_on_write: bool,
}

impl MarketStore {
    pub fn new(instance: Arc<Db>) -> Result<Self, MarketError> {
        Ok(Self {
            users: instance.open_tree(USERS)?,
            user_index: instance.open_tree(USERS_BY_USER_ID)?,
            products: instance.open_tree(PRODUCTS)?,
            posts: instance.open_tree(POSTS)?,
            sales: instance.open_tree(SALES)?,
            exchanges: instance.open_tree(EXCHANGES)?,
            notifications: instance.open_tree(NOTIFICATIONS)?,
            instance,
            flush_on_write: false,
        })
    }

    pub fn open(config: &MarketConfig) -> Result<Self, MarketError> {
        let db = config.sled_config().open()?;
        let mut store = Self::new(Arc::new(db))?;
        store.flush_on_write = config.flush_on_write;
        Ok(store)
    }

    /// Mints a globally unique id for a new document without writing anything.
    pub fn mint_id(&self, prefix: &str) -> Result<String, MarketError> {
        utils::new_uuid_to_bech32(prefix)
    }

    fn written(&self) -> Result<(), MarketError> {
        if self.flush_on_write {
            self.instance.flush()?;
        }
        Ok(())
    }

    // users

    /// Inserts or replaces a user. A business `user_id` held by another uid is refused.
    pub fn put_user(&self, user: &User) -> Result<(), MarketError> {
        let bytes = encode_doc(user)?;
        (&self.users, &self.user_index).transaction(
            |(users, index)| -> ConflictableTransactionResult<(), MarketError> {
                if let Some(owner) = index.get(user.user_id.as_bytes())? {
                    if &owner[..] != user.uid.as_bytes() {
                        return abort(MarketError::AlreadyExists(user.user_id.clone()));
                    }
                }
                if let Some(previous) = users.insert(user.uid.as_bytes(), bytes.clone())? {
                    let previous: User =
                        decode_doc(&previous).map_err(ConflictableTransactionError::Abort)?;
                    if previous.user_id != user.user_id {
                        index.remove(previous.user_id.as_bytes())?;
                    }
                }
                index.insert(user.user_id.as_bytes(), user.uid.as_bytes())?;
                Ok(())
            },
        )?;
        self.written()
    }

    pub fn user(&self, uid: &str) -> Result<Option<User>, MarketError> {
        get_doc(&self.users, uid)
    }

    /// Equality query on the business `user_id`.
    pub fn user_by_business_id(&self, user_id: &str) -> Result<Option<User>, MarketError> {
        match self.user_index.get(user_id.as_bytes())? {
            Some(uid) => self.user(&String::from_utf8_lossy(&uid)),
            None => Ok(None),
        }
    }

    /// Applies `change` to the stored user atomically and returns the result.
    pub fn update_user<F>(&self, uid: &str, change: F) -> Result<User, MarketError>
    where
        F: Fn(&mut User),
    {
        let user = self.users.transaction(|users| {
            let Some(mut user) = tx_get::<User>(users, uid)? else {
                return abort(MarketError::UserNotFound(uid.to_string()));
            };
            change(&mut user);
            tx_put(users, uid, &user)?;
            Ok(user)
        })?;
        self.written()?;
        Ok(user)
    }

    // products and posts

    pub fn put_product(&self, product: &Product) -> Result<(), MarketError> {
        put_doc(&self.products, &product.product_id, product)?;
        self.written()
    }

    pub fn product(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
        get_doc(&self.products, product_id)
    }

    pub fn put_post(&self, post: &Post) -> Result<(), MarketError> {
        put_doc(&self.posts, &post.post_id, post)?;
        self.written()
    }

    pub fn post(&self, post_id: &str) -> Result<Option<Post>, MarketError> {
        get_doc(&self.posts, post_id)
    }

    // sale transactions

    pub fn insert_sale(&self, sale: &SaleTransaction) -> Result<(), MarketError> {
        create_doc(&self.sales, &sale.sale_id, sale)?;
        self.written()
    }

    pub fn sale(&self, sale_id: &str) -> Result<Option<SaleTransaction>, MarketError> {
        get_doc(&self.sales, sale_id)
    }

    pub fn sales_where<F>(&self, keep: F) -> Result<Vec<SaleTransaction>, MarketError>
    where
        F: FnMut(&SaleTransaction) -> bool,
    {
        scan_where(&self.sales, keep)
    }

    /// Checks the transition against the stored status, then writes the new status and,
    /// on completion, the decremented stock in one atomic step.
    pub fn commit_sale_transition(
        &self,
        sale_id: &str,
        action: SaleAction,
    ) -> Result<SaleTransaction, MarketError> {
        self.commit_sale(sale_id, action, |sale| sale.transition(action))
    }

    /// Completion that also requires an agreed price, checked inside the same transaction.
    pub fn confirm_sale(&self, sale_id: &str) -> Result<SaleTransaction, MarketError> {
        self.commit_sale(sale_id, SaleAction::Complete, SaleTransaction::confirm)
    }

    fn commit_sale<F>(
        &self,
        sale_id: &str,
        action: SaleAction,
        step: F,
    ) -> Result<SaleTransaction, MarketError>
    where
        F: Fn(&mut SaleTransaction) -> Result<(), MarketError>,
    {
        let sale = (&self.sales, &self.products).transaction(|(sales, products)| {
            let Some(mut sale) = tx_get::<SaleTransaction>(sales, sale_id)? else {
                return abort(MarketError::TransactionNotFound(sale_id.to_string()));
            };
            step(&mut sale).map_err(ConflictableTransactionError::Abort)?;
            if SaleStatus::consumes_stock(action) {
                tx_take_stock(products, &sale.product_id, sale.quantity)?;
            }
            tx_put(sales, sale_id, &sale)?;
            Ok(sale)
        })?;
        self.written()?;
        Ok(sale)
    }

    /// Sets the agreed price on a sale that is still pending.
    pub fn set_sale_price(&self, sale_id: &str, price: u64) -> Result<SaleTransaction, MarketError> {
        let sale = self.sales.transaction(|sales| {
            let Some(mut sale) = tx_get::<SaleTransaction>(sales, sale_id)? else {
                return abort(MarketError::TransactionNotFound(sale_id.to_string()));
            };
            if sale.status.is_terminal() {
                return abort(
                    TransitionError::AlreadyFinal {
                        kind: SaleStatus::KIND,
                        status: sale.status.to_string(),
                    }
                    .into(),
                );
            }
            sale.price = Some(price);
            tx_put(sales, sale_id, &sale)?;
            Ok(sale)
        })?;
        self.written()?;
        Ok(sale)
    }

    // exchange transactions

    pub fn insert_exchange(&self, exchange: &ExchangeTransaction) -> Result<(), MarketError> {
        create_doc(&self.exchanges, &exchange.exchange_id, exchange)?;
        self.written()
    }

    pub fn exchange(&self, exchange_id: &str) -> Result<Option<ExchangeTransaction>, MarketError> {
        get_doc(&self.exchanges, exchange_id)
    }

    pub fn exchanges_where<F>(&self, keep: F) -> Result<Vec<ExchangeTransaction>, MarketError>
    where
        F: FnMut(&ExchangeTransaction) -> bool,
    {
        scan_where(&self.exchanges, keep)
    }

    /// Exchange counterpart of [`MarketStore::commit_sale_transition`]; acceptance takes
    /// stock from both products.
    pub fn commit_exchange_transition(
        &self,
        exchange_id: &str,
        action: ExchangeAction,
    ) -> Result<ExchangeTransaction, MarketError> {
        let exchange = (&self.exchanges, &self.products).transaction(|(exchanges, products)| {
            let Some(mut exchange) = tx_get::<ExchangeTransaction>(exchanges, exchange_id)? else {
                return abort(MarketError::TransactionNotFound(exchange_id.to_string()));
            };
            exchange
                .transition(action)
                .map_err(ConflictableTransactionError::Abort)?;
            if ExchangeStatus::consumes_stock(action) {
                tx_take_stock(products, &exchange.product_id1, exchange.quantity1)?;
                tx_take_stock(products, &exchange.product_id2, exchange.quantity2)?;
            }
            tx_put(exchanges, exchange_id, &exchange)?;
            Ok(exchange)
        })?;
        self.written()?;
        Ok(exchange)
    }

    // notifications

    pub fn insert_notification(&self, notification: &Notification) -> Result<(), MarketError> {
        create_doc(&self.notifications, &notification.notification_id, notification)?;
        self.written()
    }

    pub fn notification(&self, notification_id: &str) -> Result<Option<Notification>, MarketError> {
        get_doc(&self.notifications, notification_id)
    }

    /// All notifications addressed to `uid`, newest first.
    pub fn notifications_for(&self, uid: &str) -> Result<Vec<Notification>, MarketError> {
        let mut found = scan_where(&self.notifications, |n: &Notification| n.uid == uid)?;
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    pub fn mark_notification_read(&self, notification_id: &str) -> Result<Notification, MarketError> {
        let notification = self.notifications.transaction(|notifications| {
            let Some(mut notification) = tx_get::<Notification>(notifications, notification_id)?
            else {
                return abort(MarketError::NotificationNotFound(notification_id.to_string()));
            };
            if !notification.is_read {
                notification.is_read = true;
                tx_put(notifications, notification_id, &notification)?;
            }
            Ok(notification)
        })?;
        self.written()?;
        Ok(notification)
    }
}
