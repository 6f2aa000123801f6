//! Transaction core of a student secondhand marketplace.
//!
//! Members list products through moderated posts, then either sell them
//! ([`transaction::SaleTransaction`]) or swap them with another member
//! ([`transaction::ExchangeTransaction`]). [`service::MarketService`] validates each request,
//! writes the pending record, notifies both parties, and later moves the record to a
//! terminal status, taking product stock where the outcome requires it.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod repository;
pub mod service;
pub mod state;
pub mod store;
pub mod transaction;
pub mod utils;
pub mod validator;
