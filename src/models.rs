//! Stored documents the transaction core reads (users, products, posts) and writes
//! (notifications). Transactions themselves live in [`crate::transaction`].
use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone + PartialEq> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl<T: TimeZone + Eq> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// A registered member. Keyed in storage by the auth provider's `uid`, looked up by
/// the human-chosen business `user_id`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct User {
    #[n(0)]
    pub uid: String,
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub email: String,
    #[n(4)]
    pub rating_count: u32,
    #[n(5)]
    pub avg_rating: f64,
}

impl User {
    pub fn new(uid: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            user_id: user_id.into(),
            name: name.into(),
            email: String::new(),
            rating_count: 0,
            avg_rating: 0.0,
        }
    }
    pub fn set_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
    /// Folds one more score into the running average.
    pub fn record_rating(&mut self, score: u8) {
        let count = f64::from(self.rating_count);
        self.avg_rating = (self.avg_rating * count + f64::from(score)) / (count + 1.0);
        self.rating_count += 1;
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    #[n(0)]
    pub product_id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub category_id: String,
    #[n(3)]
    pub post_id: Option<String>,
    #[n(4)]
    pub price: u64, // minor currency units
    #[n(5)]
    pub stock: u32,
    #[n(6)]
    pub condition: String,
}

impl Product {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, stock: u32) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            category_id: String::new(),
            post_id: None,
            price: 0,
            stock,
            condition: String::new(),
        }
    }
    pub fn set_post(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = Some(post_id.into());
        self
    }
    pub fn set_price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }
    pub fn set_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = category_id.into();
        self
    }
    pub fn set_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = condition.into();
        self
    }
    /// Removes `quantity` units, never going below zero. Returns the new stock.
    pub fn take_stock(&mut self, quantity: u32) -> u32 {
        self.stock = self.stock.saturating_sub(quantity);
        self.stock
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    #[n(0)]
    UnderReview,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

/// A moderated listing. `poster_id` is the authority for product ownership.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Post {
    #[n(0)]
    pub post_id: String,
    #[n(1)]
    pub poster_id: String,
    #[n(2)]
    pub content: String,
    #[n(3)]
    pub status: PostStatus,
    #[n(4)]
    pub reviewer_id: Option<String>,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

impl Post {
    pub fn new(post_id: impl Into<String>, poster_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            poster_id: poster_id.into(),
            content: String::new(),
            status: PostStatus::UnderReview,
            reviewer_id: None,
            created_at: TimeStamp::new(),
        }
    }
    pub fn set_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
    pub fn approve(mut self, reviewer_id: impl Into<String>) -> Self {
        self.status = PostStatus::Approved;
        self.reviewer_id = Some(reviewer_id.into());
        self
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    #[n(0)]
    General,
    #[n(1)]
    Sale,
    #[n(2)]
    Exchange,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::General => "",
            NotificationKind::Sale => "sale",
            NotificationKind::Exchange => "exchange",
        }
    }
}

/// Addressed to an auth `uid`. Only `is_read` ever changes after creation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    #[n(0)]
    pub notification_id: String,
    #[n(1)]
    pub uid: String,
    #[n(2)]
    pub message: String,
    #[n(3)]
    pub is_read: bool,
    #[n(4)]
    pub created_at: TimeStamp<Utc>,
    #[n(5)]
    pub related_id: Option<String>,
    #[n(6)]
    pub kind: NotificationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn stock_is_floored_at_zero() {
        let mut product = Product::new("p1", "Calculator", 2);
        assert_eq!(product.take_stock(5), 0);
        assert_eq!(product.stock, 0);
    }

    #[test]
    fn rating_average_accumulates() {
        let mut user = User::new("uid-1", "an", "An");
        user.record_rating(5);
        user.record_rating(2);
        assert_eq!(user.rating_count, 2);
        assert!((user.avg_rating - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn notification_kind_names() {
        assert_eq!(NotificationKind::Sale.as_str(), "sale");
        assert_eq!(NotificationKind::General.as_str(), "");
    }
}
