//! Preconditions checked before a transaction record is written.
//!
//! Checks run in a fixed order and stop at the first failure. Nothing here writes.
use crate::error::{MarketError, ValidationError};
use crate::models::Product;
use crate::repository::Repository;
use crate::transaction::{CreateExchangeRequest, CreateSaleRequest};

/// A sale request that passed every check, with the product it was checked against.
#[derive(Debug, Clone)]
pub struct ValidatedSale {
    pub request: CreateSaleRequest,
    pub product: Product,
}

#[derive(Debug, Clone)]
pub struct ValidatedExchange {
    pub request: CreateExchangeRequest,
    pub product1: Product,
    pub product2: Product,
}

fn ensure_quantity(quantity: u32) -> Result<(), ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::InvalidQuantity(quantity.to_string()));
    }
    Ok(())
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<(), ValidationError> {
    if quantity > product.stock {
        return Err(ValidationError::InsufficientStock {
            product_id: product.product_id.clone(),
            available: product.stock,
        });
    }
    Ok(())
}

pub fn validate_sale<R: Repository + ?Sized>(
    repo: &R,
    request: CreateSaleRequest,
) -> Result<ValidatedSale, MarketError> {
    ensure_quantity(request.quantity)?;

    if request.buyer_id == request.seller_id {
        return Err(ValidationError::SelfDealing.into());
    }

    let product = repo
        .product(&request.product_id)?
        .ok_or_else(|| ValidationError::ProductNotFound(request.product_id.clone()))?;

    ensure_stock(&product, request.quantity)?;

    let post_id = product
        .post_id
        .as_deref()
        .ok_or_else(|| ValidationError::ProductNotLinked(product.product_id.clone()))?;

    let post = repo
        .post(post_id)?
        .ok_or_else(|| ValidationError::PostNotFound(post_id.to_string()))?;

    // an unknown seller cannot own the post either
    let seller = repo.resolve_user(&request.seller_id)?;
    if seller.is_none_or(|seller| seller.user_id != post.poster_id) {
        return Err(ValidationError::NotOwnPost.into());
    }

    Ok(ValidatedSale { request, product })
}

/// Checks one side of an exchange: `user_id` must own `product_id` through its post and
/// have at least `quantity` in stock.
fn validate_side<R: Repository + ?Sized>(
    repo: &R,
    product_id: &str,
    user_id: &str,
    quantity: u32,
) -> Result<Product, MarketError> {
    ensure_quantity(quantity)?;

    let product = repo
        .product(product_id)?
        .ok_or_else(|| ValidationError::ProductNotFound(product_id.to_string()))?;

    let post_id = product
        .post_id
        .as_deref()
        .ok_or_else(|| ValidationError::ProductNotLinked(product_id.to_string()))?;

    let post = repo
        .post(post_id)?
        .ok_or_else(|| ValidationError::PostNotFound(post_id.to_string()))?;

    let owner = repo.resolve_user(&post.poster_id)?;
    if owner.is_none_or(|owner| owner.user_id != user_id) {
        return Err(ValidationError::NotOwner {
            product_id: product_id.to_string(),
            expected: user_id.to_string(),
        }
        .into());
    }

    ensure_stock(&product, quantity)?;
    Ok(product)
}

pub fn validate_exchange<R: Repository + ?Sized>(
    repo: &R,
    request: CreateExchangeRequest,
) -> Result<ValidatedExchange, MarketError> {
    if request.user1_id == request.user2_id {
        return Err(ValidationError::SameUser.into());
    }
    if request.product_id1 == request.product_id2 {
        return Err(ValidationError::SameProduct.into());
    }

    let product1 = validate_side(
        repo,
        &request.product_id1,
        &request.user1_id,
        request.quantity1,
    )?;
    let product2 = validate_side(
        repo,
        &request.product_id2,
        &request.user2_id,
        request.quantity2,
    )?;

    Ok(ValidatedExchange {
        request,
        product1,
        product2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Post, User};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Fixture {
        users: HashMap<String, User>,
        products: HashMap<String, Product>,
        posts: HashMap<String, Post>,
    }

    impl Repository for Fixture {
        fn resolve_user(&self, user_id: &str) -> Result<Option<User>, MarketError> {
            Ok(self.users.get(user_id).cloned())
        }
        fn product(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
            Ok(self.products.get(product_id).cloned())
        }
        fn post(&self, post_id: &str) -> Result<Option<Post>, MarketError> {
            Ok(self.posts.get(post_id).cloned())
        }
    }

    impl Fixture {
        fn with_user(mut self, user_id: &str) -> Self {
            let user = User::new(format!("uid-{user_id}"), user_id, user_id);
            self.users.insert(user_id.into(), user);
            self
        }
        fn with_listing(mut self, product: Product, poster_id: &str) -> Self {
            if let Some(post_id) = &product.post_id {
                self.posts
                    .insert(post_id.clone(), Post::new(post_id.clone(), poster_id));
            }
            self.products.insert(product.product_id.clone(), product);
            self
        }
    }

    fn market() -> Fixture {
        Fixture::default()
            .with_user("an")
            .with_user("binh")
            .with_listing(Product::new("book", "Algebra book", 5).set_post("post-book"), "an")
            .with_listing(Product::new("fan", "Desk fan", 1).set_post("post-fan"), "binh")
    }

    fn validation_error(err: MarketError) -> ValidationError {
        match err {
            MarketError::Validation(err) => err,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_sale_passes() {
        let validated =
            validate_sale(&market(), CreateSaleRequest::new("book", "binh", "an", 5)).unwrap();
        assert_eq!(validated.product.stock, 5);
    }

    #[test]
    fn sale_checks_run_in_order() {
        let repo = market();
        let cases = [
            (CreateSaleRequest::new("nope", "an", "an", 1), ValidationError::SelfDealing),
            (
                CreateSaleRequest::new("nope", "binh", "an", 1),
                ValidationError::ProductNotFound("nope".into()),
            ),
            (
                CreateSaleRequest::new("book", "binh", "an", 6),
                ValidationError::InsufficientStock {
                    product_id: "book".into(),
                    available: 5,
                },
            ),
            (
                CreateSaleRequest::new("book", "an", "binh", 1),
                ValidationError::NotOwnPost,
            ),
        ];
        for (request, expected) in cases {
            let err = validate_sale(&repo, request).unwrap_err();
            assert_eq!(validation_error(err), expected);
        }
    }

    #[test]
    fn sale_requires_a_live_post() {
        let repo = market().with_listing(Product::new("lamp", "Lamp", 2), "an");
        let err = validate_sale(&repo, CreateSaleRequest::new("lamp", "binh", "an", 1)).unwrap_err();
        assert_eq!(
            validation_error(err),
            ValidationError::ProductNotLinked("lamp".into())
        );

        let mut repo = market();
        repo.posts.remove("post-book");
        let err = validate_sale(&repo, CreateSaleRequest::new("book", "binh", "an", 1)).unwrap_err();
        assert_eq!(
            validation_error(err),
            ValidationError::PostNotFound("post-book".into())
        );
    }

    #[test]
    fn unknown_seller_cannot_sell() {
        let mut repo = market();
        repo.users.remove("an");
        let err = validate_sale(&repo, CreateSaleRequest::new("book", "binh", "an", 1)).unwrap_err();
        assert_eq!(validation_error(err), ValidationError::NotOwnPost);
    }

    #[test]
    fn valid_exchange_passes() {
        let request = CreateExchangeRequest::new("an", "book", 2, "binh", "fan", 1);
        let validated = validate_exchange(&market(), request).unwrap();
        assert_eq!(validated.product1.product_id, "book");
        assert_eq!(validated.product2.product_id, "fan");
    }

    #[test]
    fn exchange_rejects_same_party_and_same_product() {
        let repo = market();
        let err = validate_exchange(
            &repo,
            CreateExchangeRequest::new("an", "book", 1, "an", "fan", 1),
        )
        .unwrap_err();
        assert_eq!(validation_error(err), ValidationError::SameUser);

        let err = validate_exchange(
            &repo,
            CreateExchangeRequest::new("an", "book", 1, "binh", "book", 1),
        )
        .unwrap_err();
        assert_eq!(validation_error(err), ValidationError::SameProduct);
    }

    #[test]
    fn exchange_checks_ownership_on_both_sides() {
        let err = validate_exchange(
            &market(),
            CreateExchangeRequest::new("an", "fan", 1, "binh", "book", 1),
        )
        .unwrap_err();
        assert_eq!(
            validation_error(err),
            ValidationError::NotOwner {
                product_id: "fan".into(),
                expected: "an".into(),
            }
        );
    }

    #[test]
    fn exchange_checks_stock_on_the_counterparty_side() {
        let err = validate_exchange(
            &market(),
            CreateExchangeRequest::new("an", "book", 1, "binh", "fan", 2),
        )
        .unwrap_err();
        assert_eq!(
            validation_error(err),
            ValidationError::InsufficientStock {
                product_id: "fan".into(),
                available: 1,
            }
        );
    }
}
