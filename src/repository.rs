//! Read-side lookups the validator and transition handler need.
//!
//! Every business id (user, product, post) goes through one `Repository`. A
//! `MemoizedRepository` wraps any repository for the span of a single request so the
//! same user or product is fetched at most once per request.
use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::error::MarketError;
use crate::models::{Post, Product, User};
use crate::store::MarketStore;

pub trait Repository {
    fn resolve_user(&self, user_id: &str) -> Result<Option<User>, MarketError>;
    fn product(&self, product_id: &str) -> Result<Option<Product>, MarketError>;
    fn post(&self, post_id: &str) -> Result<Option<Post>, MarketError>;
}

impl Repository for MarketStore {
    fn resolve_user(&self, user_id: &str) -> Result<Option<User>, MarketError> {
        self.user_by_business_id(user_id)
    }
    fn product(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
        MarketStore::product(self, product_id)
    }
    fn post(&self, post_id: &str) -> Result<Option<Post>, MarketError> {
        MarketStore::post(self, post_id)
    }
}

type Memo<T> = RefCell<HashMap<String, Option<T>>>;

fn memoized<T, F>(memo: &Memo<T>, key: &str, load: F) -> Result<Option<T>, MarketError>
where
    T: Clone,
    F: FnOnce() -> Result<Option<T>, MarketError>,
{
    if let Some(hit) = memo.borrow().get(key) {
        debug!(key, "lookup cache hit");
        return Ok(hit.clone());
    }
    let loaded = load()?;
    memo.borrow_mut().insert(key.to_string(), loaded.clone());
    Ok(loaded)
}

/// Request-scoped cache over a repository. Misses (`None`) are cached too.
pub struct MemoizedRepository<'a, R: Repository + ?Sized> {
    inner: &'a R,
    users: Memo<User>,
    products: Memo<Product>,
    posts: Memo<Post>,
}

impl<'a, R: Repository + ?Sized> MemoizedRepository<'a, R> {
    pub fn new(inner: &'a R) -> Self {
        Self {
            inner,
            users: RefCell::default(),
            products: RefCell::default(),
            posts: RefCell::default(),
        }
    }

    /// Display name for a business user id, falling back to the id itself.
    pub fn display_name(&self, user_id: &str) -> Result<String, MarketError> {
        Ok(self
            .resolve_user(user_id)?
            .map(|user| user.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_string()))
    }

    /// Product name, falling back to the product id.
    pub fn product_name(&self, product_id: &str) -> Result<String, MarketError> {
        Ok(self
            .product(product_id)?
            .map(|product| product.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| product_id.to_string()))
    }
}

impl<R: Repository + ?Sized> Repository for MemoizedRepository<'_, R> {
    fn resolve_user(&self, user_id: &str) -> Result<Option<User>, MarketError> {
        memoized(&self.users, user_id, || self.inner.resolve_user(user_id))
    }
    fn product(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
        memoized(&self.products, product_id, || self.inner.product(product_id))
    }
    fn post(&self, post_id: &str) -> Result<Option<Post>, MarketError> {
        memoized(&self.posts, post_id, || self.inner.post(post_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingRepository {
        users: HashMap<String, User>,
        products: HashMap<String, Product>,
        lookups: Cell<usize>,
    }

    impl Repository for CountingRepository {
        fn resolve_user(&self, user_id: &str) -> Result<Option<User>, MarketError> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self.users.get(user_id).cloned())
        }
        fn product(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self.products.get(product_id).cloned())
        }
        fn post(&self, _: &str) -> Result<Option<Post>, MarketError> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(None)
        }
    }

    #[test]
    fn repeated_lookups_hit_the_store_once() {
        let mut inner = CountingRepository::default();
        inner
            .users
            .insert("minh".into(), User::new("uid-minh", "minh", "Minh"));
        let repo = MemoizedRepository::new(&inner);

        for _ in 0..3 {
            assert_eq!(repo.display_name("minh").unwrap(), "Minh");
        }
        assert_eq!(inner.lookups.get(), 1);
    }

    #[test]
    fn misses_are_cached_and_fall_back_to_ids() {
        let inner = CountingRepository::default();
        let repo = MemoizedRepository::new(&inner);

        assert_eq!(repo.display_name("ghost").unwrap(), "ghost");
        assert_eq!(repo.product_name("p-404").unwrap(), "p-404");
        assert!(repo.resolve_user("ghost").unwrap().is_none());
        assert!(repo.post("post-1").unwrap().is_none());
        assert!(repo.post("post-1").unwrap().is_none());
        assert_eq!(inner.lookups.get(), 3);
    }
}
