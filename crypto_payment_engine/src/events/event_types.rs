use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, ProductItem};

/// A new pending order has been committed. Front ends use this to show the payment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// An order has been paid in full. `item` is the product item that was sold, if it could be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub item: Option<ProductItem>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, item: Option<ProductItem>) -> Self {
        Self { order, item }
    }
}

/// An order left the pending state without being paid, i.e. it expired or was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}
