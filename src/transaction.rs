//! Sale and exchange transaction records, plus the typed requests that create them.
//!
//! Raw form input (`SaleForm`, `ExchangeForm`) carries everything as strings. It is
//! converted exactly once into `CreateSaleRequest` / `CreateExchangeRequest`, so numeric
//! parsing never leaks into validation or persistence.
use chrono::Utc;

use crate::error::{MarketError, ValidationError};
use crate::models::TimeStamp;
use crate::state::{ExchangeAction, ExchangeStatus, Lifecycle, SaleAction, SaleStatus};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct SaleTransaction {
    #[n(0)]
    pub sale_id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub buyer_id: String,
    #[n(3)]
    pub seller_id: String,
    #[n(4)]
    pub quantity: u32,
    #[n(5)]
    pub price: Option<u64>, // filled in later by the buyer
    #[n(6)]
    pub status: SaleStatus,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ExchangeTransaction {
    #[n(0)]
    pub exchange_id: String,
    #[n(1)]
    pub product_id1: String,
    #[n(2)]
    pub product_id2: String,
    #[n(3)]
    pub quantity1: u32,
    #[n(4)]
    pub quantity2: u32,
    #[n(5)]
    pub user1_id: String, // requester
    #[n(6)]
    pub user2_id: String,
    #[n(7)]
    pub status: ExchangeStatus,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

impl SaleTransaction {
    pub fn pending(sale_id: String, request: CreateSaleRequest) -> Self {
        Self {
            sale_id,
            product_id: request.product_id,
            buyer_id: request.buyer_id,
            seller_id: request.seller_id,
            quantity: request.quantity,
            price: request.price,
            status: SaleStatus::Pending,
            created_at: TimeStamp::new(),
        }
    }

    /// Moves the record to the action's status.
    pub fn transition(&mut self, action: SaleAction) -> Result<(), MarketError> {
        self.status = self.status.apply(action)?;
        Ok(())
    }

    /// A zero price counts as not agreed yet.
    pub fn has_price(&self) -> bool {
        self.price.is_some_and(|price| price > 0)
    }

    /// Buyer-side confirmation: completes the sale once a price has been agreed.
    pub fn confirm(&mut self) -> Result<(), MarketError> {
        let next = self.status.apply(SaleAction::Complete)?;
        if !self.has_price() {
            return Err(ValidationError::PriceNotSet.into());
        }
        self.status = next;
        Ok(())
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

impl ExchangeTransaction {
    pub fn pending(exchange_id: String, request: CreateExchangeRequest) -> Self {
        Self {
            exchange_id,
            product_id1: request.product_id1,
            product_id2: request.product_id2,
            quantity1: request.quantity1,
            quantity2: request.quantity2,
            user1_id: request.user1_id,
            user2_id: request.user2_id,
            status: ExchangeStatus::Pending,
            created_at: TimeStamp::new(),
        }
    }

    pub fn transition(&mut self, action: ExchangeAction) -> Result<(), MarketError> {
        self.status = self.status.apply(action)?;
        Ok(())
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSaleRequest {
    pub product_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub quantity: u32,
    pub price: Option<u64>,
}

impl CreateSaleRequest {
    pub fn new(
        product_id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            quantity,
            price: None,
        }
    }
    pub fn set_price(mut self, price: u64) -> Self {
        self.price = Some(price);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateExchangeRequest {
    pub exchange_id: Option<String>,
    pub product_id1: String,
    pub product_id2: String,
    pub quantity1: u32,
    pub quantity2: u32,
    pub user1_id: String,
    pub user2_id: String,
}

impl CreateExchangeRequest {
    /// `user1` offers `quantity1` of `product1` for `quantity2` of `user2`'s `product2`.
    pub fn new(
        user1_id: impl Into<String>,
        product_id1: impl Into<String>,
        quantity1: u32,
        user2_id: impl Into<String>,
        product_id2: impl Into<String>,
        quantity2: u32,
    ) -> Self {
        Self {
            exchange_id: None,
            product_id1: product_id1.into(),
            product_id2: product_id2.into(),
            quantity1,
            quantity2,
            user1_id: user1_id.into(),
            user2_id: user2_id.into(),
        }
    }
    pub fn set_exchange_id(mut self, exchange_id: impl Into<String>) -> Self {
        self.exchange_id = Some(exchange_id.into());
        self
    }
}

/// Buy request as submitted by a form.
#[derive(Debug, Clone, Default)]
pub struct SaleForm {
    pub product_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub quantity: String,
    pub price: String,
}

/// Swap proposal as submitted by a form.
#[derive(Debug, Clone, Default)]
pub struct ExchangeForm {
    pub exchange_id: String,
    pub product_id1: String,
    pub product_id2: String,
    pub quantity1: String,
    pub quantity2: String,
    pub user1_id: String,
    pub user2_id: String,
}

fn required(value: String, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value.to_string())
}

pub(crate) fn parse_quantity(raw: &str) -> Result<u32, ValidationError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ValidationError::InvalidQuantity(raw.to_string())),
    }
}

fn parse_price(raw: &str) -> Result<Option<u64>, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidPrice(raw.to_string()))
}

impl TryFrom<SaleForm> for CreateSaleRequest {
    type Error = ValidationError;

    fn try_from(form: SaleForm) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: required(form.product_id, "product_id")?,
            buyer_id: required(form.buyer_id, "buyer_id")?,
            seller_id: required(form.seller_id, "seller_id")?,
            quantity: parse_quantity(&form.quantity)?,
            price: parse_price(&form.price)?,
        })
    }
}

impl TryFrom<ExchangeForm> for CreateExchangeRequest {
    type Error = ValidationError;

    fn try_from(form: ExchangeForm) -> Result<Self, Self::Error> {
        let exchange_id = Some(form.exchange_id.trim().to_string()).filter(|id| !id.is_empty());
        Ok(Self {
            exchange_id,
            product_id1: required(form.product_id1, "product_id1")?,
            product_id2: required(form.product_id2, "product_id2")?,
            quantity1: parse_quantity(&form.quantity1)?,
            quantity2: parse_quantity(&form.quantity2)?,
            user1_id: required(form.user1_id, "user1_id")?,
            user2_id: required(form.user2_id, "user2_id")?,
        })
    }
}
