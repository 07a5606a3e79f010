use std::fmt::Display;

use chrono::{DateTime, Utc};
use cpg_common::Amount;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, OrderStatusType};

/// What happened when the transfers for an order were reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// The order was pending and is now paid. The customer has been notified.
    Paid(Order),
    /// The order had been paid before. Nothing changed.
    AlreadyPaid(Order),
    /// Not enough has been received yet.
    Underpaid { order: Order, received: Amount },
    /// The order expired or was released before the payment was reconciled. Nothing changed.
    Closed(Order),
}

impl ReconcileOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ReconcileOutcome::Paid(o) |
            ReconcileOutcome::AlreadyPaid(o) |
            ReconcileOutcome::Closed(o) |
            ReconcileOutcome::Underpaid { order: o, .. } => o,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, ReconcileOutcome::Paid(_) | ReconcileOutcome::AlreadyPaid(_))
    }
}

/// Filters for order searches. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_chat_id: Option<i64>,
    pub product_id: Option<i64>,
    pub currency: Option<String>,
    /// Lower bound on `closed_at` (inclusive)
    pub closed_since: Option<DateTime<Utc>>,
    /// Upper bound on `closed_at` (exclusive)
    pub closed_until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
    pub newest_first: bool,
    pub limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_chat_id(mut self, chat_id: i64) -> Self {
        self.customer_chat_id = Some(chat_id);
        self
    }

    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn closed_since(mut self, since: DateTime<Utc>) -> Self {
        self.closed_since = Some(since);
        self
    }

    pub fn closed_until(mut self, until: DateTime<Utc>) -> Self {
        self.closed_until = Some(until);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.customer_chat_id.is_none() &&
            self.product_id.is_none() &&
            self.currency.is_none() &&
            self.closed_since.is_none() &&
            self.closed_until.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters. ")?;
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(chat_id) = &self.customer_chat_id {
            write!(f, "chat_id: {chat_id}. ")?;
        }
        if let Some(product_id) = &self.product_id {
            write!(f, "product_id: {product_id}. ")?;
        }
        if let Some(currency) = &self.currency {
            write!(f, "currency: {currency}. ")?;
        }
        if let Some(since) = &self.closed_since {
            write!(f, "closed since {since}. ")?;
        }
        if let Some(until) = &self.closed_until {
            write!(f, "closed until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(limit) = self.limit {
            write!(f, "limit {limit}. ")?;
        }
        Ok(())
    }
}
