//! Transaction lifecycles.
//!
//! Sale and exchange transactions share one shape: they start `pending` and a single
//! action moves them into a terminal status. Terminal records never move again.
//!
//! ```text
//! sale:      pending --complete--> completed      pending --cancel--> cancelled
//! exchange:  pending --accept----> accepted       pending --reject--> rejected
//! ```
use std::fmt;
use std::str::FromStr;

use crate::error::TransitionError;

/// A status enum with a checked transition table.
pub trait Lifecycle: Copy + Eq + fmt::Display {
    type Action: Copy + Eq + fmt::Debug;

    /// Used in error messages ("sale", "exchange").
    const KIND: &'static str;

    fn target(action: Self::Action) -> Self;

    fn is_terminal(&self) -> bool;

    /// Whether reaching the action's target consumes product stock.
    fn consumes_stock(action: Self::Action) -> bool;

    fn apply(self, action: Self::Action) -> Result<Self, TransitionError> {
        let to = Self::target(action);
        if self.is_terminal() {
            return Err(TransitionError::InvalidTransition {
                kind: Self::KIND,
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(to)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaleStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Completed,
    #[n(2)]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleAction {
    Complete,
    Cancel,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeAction {
    Accept,
    Reject,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::Accepted => "accepted",
            ExchangeStatus::Rejected => "rejected",
        }
    }
}

impl Lifecycle for SaleStatus {
    type Action = SaleAction;
    const KIND: &'static str = "sale";

    fn target(action: SaleAction) -> Self {
        match action {
            SaleAction::Complete => SaleStatus::Completed,
            SaleAction::Cancel => SaleStatus::Cancelled,
        }
    }
    fn is_terminal(&self) -> bool {
        *self != SaleStatus::Pending
    }
    fn consumes_stock(action: SaleAction) -> bool {
        action == SaleAction::Complete
    }
}

impl Lifecycle for ExchangeStatus {
    type Action = ExchangeAction;
    const KIND: &'static str = "exchange";

    fn target(action: ExchangeAction) -> Self {
        match action {
            ExchangeAction::Accept => ExchangeStatus::Accepted,
            ExchangeAction::Reject => ExchangeStatus::Rejected,
        }
    }
    fn is_terminal(&self) -> bool {
        *self != ExchangeStatus::Pending
    }
    fn consumes_stock(action: ExchangeAction) -> bool {
        action == ExchangeAction::Accept
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SaleStatus::Pending),
            "completed" => Ok(SaleStatus::Completed),
            "cancelled" | "canceled" => Ok(SaleStatus::Cancelled),
            _ => Err(TransitionError::UnknownStatus(s.to_string())),
        }
    }
}

impl FromStr for ExchangeStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ExchangeStatus::Pending),
            "accepted" => Ok(ExchangeStatus::Accepted),
            "rejected" => Ok(ExchangeStatus::Rejected),
            _ => Err(TransitionError::UnknownStatus(s.to_string())),
        }
    }
}

// Actions are requested by naming the status they lead to ("completed", "accepted", ...).
impl FromStr for SaleAction {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<SaleStatus>()? {
            SaleStatus::Completed => Ok(SaleAction::Complete),
            SaleStatus::Cancelled => Ok(SaleAction::Cancel),
            SaleStatus::Pending => Err(TransitionError::UnknownStatus(s.to_string())),
        }
    }
}

impl FromStr for ExchangeAction {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<ExchangeStatus>()? {
            ExchangeStatus::Accepted => Ok(ExchangeAction::Accept),
            ExchangeStatus::Rejected => Ok(ExchangeAction::Reject),
            ExchangeStatus::Pending => Err(TransitionError::UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_sale_reaches_either_terminal() {
        assert_eq!(
            SaleStatus::Pending.apply(SaleAction::Complete),
            Ok(SaleStatus::Completed)
        );
        assert_eq!(
            SaleStatus::Pending.apply(SaleAction::Cancel),
            Ok(SaleStatus::Cancelled)
        );
    }

    #[test]
    fn terminal_exchange_rejects_any_action() {
        let err = ExchangeStatus::Accepted
            .apply(ExchangeAction::Accept)
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                kind: "exchange",
                from: "accepted".into(),
                to: "accepted".into(),
            }
        );
        assert!(ExchangeStatus::Rejected.apply(ExchangeAction::Accept).is_err());
    }

    #[test]
    fn only_completion_and_acceptance_consume_stock() {
        assert!(SaleStatus::consumes_stock(SaleAction::Complete));
        assert!(!SaleStatus::consumes_stock(SaleAction::Cancel));
        assert!(ExchangeStatus::consumes_stock(ExchangeAction::Accept));
        assert!(!ExchangeStatus::consumes_stock(ExchangeAction::Reject));
    }

    #[test]
    fn actions_parse_from_target_status_names() {
        assert_eq!("completed".parse::<SaleAction>(), Ok(SaleAction::Complete));
        assert_eq!(" Cancelled ".parse::<SaleAction>(), Ok(SaleAction::Cancel));
        assert_eq!("accepted".parse::<ExchangeAction>(), Ok(ExchangeAction::Accept));
        assert!("pending".parse::<SaleAction>().is_err());
        assert!("shipped".parse::<ExchangeAction>().is_err());
    }
}
