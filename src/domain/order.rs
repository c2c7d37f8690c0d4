use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type OrderId = i64;
pub type ServiceId = i64;

/// An order holding a reservation against its account's balance.
///
/// Orders start pending (both flags false). Paying or cancelling is
/// terminal: the two flags are mutually exclusive and neither transition
/// can ever be undone. The reserved amount leaves the balance when the
/// order is created and comes back only on cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub service_id: ServiceId,
    pub amount: Cents,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        !self.is_paid && !self.is_cancelled
    }

    pub fn status(&self) -> OrderStatus {
        if self.is_paid {
            OrderStatus::Paid
        } else if self.is_cancelled {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Pending
        }
    }
}

/// The caller-supplied identity of an order operation. Create, pay and
/// cancel all take the full set: pay and cancel only match an order whose
/// stored fields agree with every one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderParams {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub service_id: ServiceId,
    pub amount: Cents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(is_paid: bool, is_cancelled: bool) -> Order {
        Order {
            order_id: 1,
            account_id: 1,
            service_id: 1,
            amount: 100,
            is_paid,
            is_cancelled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_order_is_pending() {
        let order = order(false, false);
        assert!(order.is_pending());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(!order.status().is_terminal());
    }

    #[test]
    fn test_flags_map_to_terminal_status() {
        assert_eq!(order(true, false).status(), OrderStatus::Paid);
        assert_eq!(order(false, true).status(), OrderStatus::Cancelled);
        assert!(order(true, false).status().is_terminal());
        assert!(order(false, true).status().is_terminal());
        assert!(!order(true, false).is_pending());
    }
}
