//! Error taxonomy for the marketplace core
use sled::transaction::TransactionError;

/// Business rule violations raised before anything is written.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("buyer and seller cannot be the same person")]
    SelfDealing,
    #[error("the two parties of an exchange cannot be the same person")]
    SameUser,
    #[error("an exchange needs two different products")]
    SameProduct,
    #[error("product does not exist: {0}")]
    ProductNotFound(String),
    #[error("insufficient stock, only {available} available")]
    InsufficientStock { product_id: String, available: u32 },
    #[error("product not linked to any post: {0}")]
    ProductNotLinked(String),
    #[error("post not found: {0}")]
    PostNotFound(String),
    #[error("you may only sell your own posted product")]
    NotOwnPost,
    #[error("product {product_id} is not owned by {expected}")]
    NotOwner { product_id: String, expected: String },
    #[error("quantity must be a positive integer, got {0:?}")]
    InvalidQuantity(String),
    #[error("price must be a non-negative integer, got {0:?}")]
    InvalidPrice(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),
    #[error("a price must be set before the sale can be completed")]
    PriceNotSet,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot move {kind} transaction from {from} to {to}")]
    InvalidTransition {
        kind: &'static str,
        from: String,
        to: String,
    },
    #[error("{kind} transaction is already {status}")]
    AlreadyFinal { kind: &'static str, status: String },
    #[error("unknown status: {0:?}")]
    UnknownStatus(String),
}

#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("notification not found: {0}")]
    NotificationNotFound(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("document {0} already exists")]
    AlreadyExists(String),
    #[error("failed to mint identifier: {0}")]
    Id(String),
    #[error("failed to encode document: {0}")]
    Encode(String),
    #[error("failed to decode document: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
}

impl From<TransactionError<MarketError>> for MarketError {
    fn from(value: TransactionError<MarketError>) -> Self {
        match value {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => MarketError::Storage(err),
        }
    }
}

impl MarketError {
    /// True for failures the caller caused (bad input, missing records, illegal transitions)
    /// rather than the store.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            MarketError::Storage(_)
                | MarketError::Encode(_)
                | MarketError::Decode(_)
                | MarketError::Id(_)
        )
    }
}
