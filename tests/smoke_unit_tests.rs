//! Smoke screen tests for the public API
//!
//! Happy-path and boundary checks that span modules without walking a full workflow.
//! Workflows live in `scenarios.rs`.

use student_market::{
    config::MarketConfig,
    error::{MarketError, ValidationError},
    models::{NotificationKind, Post, PostStatus, Product, User},
    service::MarketService,
    state::{ExchangeStatus, SaleAction, SaleStatus},
    transaction::{CreateSaleRequest, SaleForm},
    utils::{EXCHANGE_PREFIX, SALE_PREFIX, new_uuid_to_bech32},
};

fn service() -> MarketService {
    MarketService::open(&MarketConfig::temporary()).unwrap()
}

// UTILS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Ids of different collections never collide and announce their collection
    #[test]
    fn prefixes_distinguish_collections() {
        let sale = new_uuid_to_bech32(SALE_PREFIX).unwrap();
        let exchange = new_uuid_to_bech32(EXCHANGE_PREFIX).unwrap();

        assert!(sale.starts_with("sale_1"));
        assert!(exchange.starts_with("exch_1"));
        assert_ne!(sale, exchange);
    }
}

// MODELS
#[cfg(test)]
mod model_tests {
    use super::*;

    /// Builders fill the optional parts of a listing
    #[test]
    fn product_builder_sets_fields() {
        let product = Product::new("p1", "Lab coat", 3)
            .set_post("post-1")
            .set_price(80_000)
            .set_category("clothing")
            .set_condition("used");

        assert_eq!(product.post_id.as_deref(), Some("post-1"));
        assert_eq!(product.price, 80_000);
        assert_eq!(product.category_id, "clothing");
    }

    /// Posts start under review and record their reviewer on approval
    #[test]
    fn post_approval() {
        let post = Post::new("post-1", "an").set_content("Selling my lab coat");
        assert_eq!(post.status, PostStatus::UnderReview);

        let post = post.approve("mod-7");
        assert_eq!(post.status, PostStatus::Approved);
        assert_eq!(post.reviewer_id.as_deref(), Some("mod-7"));
    }

    /// Stored documents come back unchanged
    #[test]
    fn store_returns_what_was_put() {
        let service = service();
        let user = User::new("uid-1", "chi", "Chi").set_email("chi@uni.edu");
        service.store().put_user(&user).unwrap();

        assert_eq!(service.store().user("uid-1").unwrap(), Some(user.clone()));
        assert_eq!(service.store().user_by_business_id("chi").unwrap(), Some(user));
        assert!(service.store().product("missing").unwrap().is_none());
    }
}

// STATE
#[cfg(test)]
mod state_tests {
    use super::*;

    #[test]
    fn statuses_print_their_wire_names() {
        assert_eq!(SaleStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(ExchangeStatus::Accepted.to_string(), "accepted");
        assert_eq!("rejected".parse::<ExchangeStatus>(), Ok(ExchangeStatus::Rejected));
    }

    #[test]
    fn american_spelling_is_accepted() {
        assert_eq!("canceled".parse::<SaleAction>(), Ok(SaleAction::Cancel));
    }
}

// SERVICE BOUNDARY
#[cfg(test)]
mod service_tests {
    use super::*;

    /// A malformed form is refused before the store is touched
    #[test]
    fn bad_form_is_rejected_at_the_boundary() {
        let service = service();
        let err = service
            .create_sale_from_form(SaleForm {
                product_id: "p1".into(),
                buyer_id: "b".into(),
                seller_id: "s".into(),
                quantity: "three".into(),
                price: String::new(),
            })
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MarketError>(),
            Some(MarketError::Validation(ValidationError::InvalidQuantity(q))) if q == "three"
        ));
        assert!(service.list_sales().unwrap().is_empty());
    }

    /// Validation failures are user facing, the service keeps the typed error
    #[test]
    fn missing_product_is_reported() {
        let service = service();
        let err = service
            .create_sale(CreateSaleRequest::new("ghost", "b", "s", 1))
            .unwrap_err();
        let market = err.downcast_ref::<MarketError>().unwrap();

        assert!(market.is_user_facing());
        assert_eq!(market.to_string(), "product does not exist: ghost");
    }

    #[test]
    fn empty_inbox() {
        assert!(service().notifications_for("uid-x").unwrap().is_empty());
        assert_eq!(NotificationKind::Exchange.as_str(), "exchange");
    }
}
