use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cpg_common::Amount;
use serde::{Deserialize, Serialize};

use crate::{
    cpe_api::CurrencySettings,
    db_types::{Order, OrderId, PaymentOption, Product, WalletPolicy},
};

/// Everything the storage layer needs to allocate one order. The price has already been converted into the settlement
/// currency and truncated to the currency unit.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub product: Product,
    pub payment_option: PaymentOption,
    pub price: Amount,
    pub settings: CurrencySettings,
    pub policy: WalletPolicy,
    pub customer_chat_id: i64,
    pub customer_handle: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The result of an allocation: the new order, and the customer's pending orders it replaced.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub order: Order,
    pub released: ReclaimedOrders,
}

/// The orders that were closed by a release or expiry run, as they were after the update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReclaimedOrders {
    pub orders: Vec<Order>,
}

impl ReclaimedOrders {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn count(&self) -> usize {
        self.orders.len()
    }

    pub fn order_ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(|o| o.id).collect()
    }

    /// The distinct products whose stock changed
    pub fn product_ids(&self) -> Vec<i64> {
        self.orders.iter().map(|o| o.product_id).collect::<BTreeSet<_>>().into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaidTransition {
    /// The order was pending and is now paid
    Transitioned(Order),
    /// The order had already been paid. Nothing changed.
    AlreadyPaid(Order),
}

impl PaidTransition {
    pub fn order(&self) -> &Order {
        match self {
            PaidTransition::Transitioned(o) | PaidTransition::AlreadyPaid(o) => o,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, PaidTransition::Transitioned(_))
    }
}

//--------------------------------------        Paging         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page number
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page: per_page.max(1) }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 10)
    }
}

/// One page of results, along with enough information to page through the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self { items, page: request.page, per_page: request.per_page, total }
    }

    pub fn total_pages(&self) -> i64 {
        let per_page = i64::from(self.per_page.max(1));
        (self.total + per_page - 1) / per_page
    }

    pub fn has_next(&self) -> bool {
        i64::from(self.page) + 1 < self.total_pages()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}
