//! Walks one sale and one exchange through their whole lifecycle.
//!
//! ```sh
//! MARKET_DB_TEMPORARY=1 MARKET_LOG=debug cargo run --example marketplace
//! ```
use student_market::config::MarketConfig;
use student_market::models::{Post, Product, User};
use student_market::service::MarketService;
use student_market::transaction::{CreateExchangeRequest, SaleForm};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn seed(service: &MarketService) -> anyhow::Result<()> {
    let store = service.store();

    store.put_user(&User::new("auth-001", "an.tran", "An Tran").set_email("an@uni.edu"))?;
    store.put_user(&User::new("auth-002", "binh.le", "Binh Le").set_email("binh@uni.edu"))?;

    store.put_post(&Post::new("post-calc", "an.tran").approve("mod-1"))?;
    store.put_post(&Post::new("post-desk", "binh.le").approve("mod-1"))?;

    store.put_product(
        &Product::new("calc-fx570", "Casio fx-570 calculator", 5)
            .set_post("post-calc")
            .set_price(250_000)
            .set_condition("used"),
    )?;
    store.put_product(
        &Product::new("desk-lamp", "Desk lamp", 2)
            .set_post("post-desk")
            .set_price(120_000)
            .set_condition("like new"),
    )?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = MarketConfig::from_env();

    tracing_subscriber::registry()
        .with(EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let service = MarketService::open(&config)?;
    seed(&service)?;

    // Binh buys three calculators from An
    let sale = service.create_sale_from_form(SaleForm {
        product_id: "calc-fx570".into(),
        buyer_id: "binh.le".into(),
        seller_id: "an.tran".into(),
        quantity: "3".into(),
        price: "".into(),
    })?;
    service.set_sale_price(&sale.sale_id, 700_000)?;
    let sale = service.complete_sale(&sale.sale_id)?;
    let calculators = service.store().product("calc-fx570")?;
    info!(
        sale_id = %sale.sale_id,
        status = %sale.status,
        stock_left = calculators.map(|p| p.stock).unwrap_or_default(),
        "sale finished"
    );

    // An offers a calculator for Binh's lamp
    let exchange = service.create_exchange(CreateExchangeRequest::new(
        "an.tran",
        "calc-fx570",
        1,
        "binh.le",
        "desk-lamp",
        1,
    ))?;
    let exchange = service.accept_exchange(&exchange.exchange_id)?;
    info!(exchange_id = %exchange.exchange_id, status = %exchange.status, "exchange finished");

    service.rate_user("an.tran", 5)?;

    for entry in service.transaction_history("binh.le")? {
        println!("{} {:?}", entry.id(), entry.created_at().to_datetime_utc());
    }
    for notification in service.notifications_for("auth-002")? {
        println!("[{}] {}", notification.kind.as_str(), notification.message);
    }

    Ok(())
}
