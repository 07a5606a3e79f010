use std::fmt::Debug;

use chrono::{DateTime, Utc};
use cpg_common::Amount;
use log::*;

use crate::{
    cpe_api::{EngineConfig, OrderQueryFilter, ReconcileOutcome},
    db_types::{NewTransfer, Order, OrderId, OrderStatusType, PaymentOption},
    events::{EventProducers, OrderAnnulledEvent, OrderCreatedEvent, OrderPaidEvent},
    traits::{
        Allocation,
        AllocationRequest,
        Notifier,
        OrderEngineDatabase,
        OrderFlowError,
        PaidTransition,
        PriceConverter,
        ReclaimedOrders,
    },
};

/// The number of orders returned by [`OrderFlowApi::paid_orders_for_customer`]
pub const PAID_ORDER_HISTORY: i64 = 10;

/// `OrderFlowApi` is the primary API of the engine. It binds purchase intents to a wallet and an exact price, and
/// carries orders through their lifecycle:
///
/// * [`Self::create_order`] allocates a new pending order.
/// * [`Self::release_orders`] and [`Self::expire_orders`] close pending orders and return their wallets and items to
///   the pool.
/// * [`Self::process_transfer`] and [`Self::on_transfers_observed`] move orders to paid once enough has been received.
pub struct OrderFlowApi<B, C, N> {
    db: B,
    converter: C,
    notifier: N,
    config: EngineConfig,
    producers: EventProducers,
}

impl<B, C, N> Debug for OrderFlowApi<B, C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({})", self.config)
    }
}

impl<B, C, N> OrderFlowApi<B, C, N> {
    pub fn new(db: B, converter: C, notifier: N, config: EngineConfig, producers: EventProducers) -> Self {
        Self { db, converter, notifier, config, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<B, C, N> OrderFlowApi<B, C, N>
where
    B: OrderEngineDatabase,
    C: PriceConverter,
    N: Notifier,
{
    /// Creates a new pending order for `product_id`, payable with `option`.
    ///
    /// The product price is converted into the settlement currency and truncated to the currency unit. The wallet,
    /// final price and product item are then reserved in one transaction under the configured wallet policy.
    /// A customer has at most one pending order, so the same transaction releases any order the customer still has
    /// pending. The payment requests of the released orders are retracted after the commit.
    pub async fn create_order(
        &self,
        option: &PaymentOption,
        product_id: i64,
        chat_id: i64,
        customer_handle: &str,
    ) -> Result<Order, OrderFlowError> {
        if !self.config.is_enabled(option) {
            return Err(OrderFlowError::PaymentOptionDisabled(option.to_string()));
        }
        let product = self.db.fetch_product(product_id).await?.ok_or(OrderFlowError::ProductNotFound(product_id))?;
        if !product.enabled {
            return Err(OrderFlowError::ProductUnavailable(product_id));
        }
        let settings = self.config.currencies.settings_for(&option.currency);
        let converted = self.converter.convert(product.price, &product.currency, &option.currency).await?;
        let price = converted.truncate_to(settings.unit);
        if !price.is_positive() {
            return Err(OrderFlowError::InvalidAmount(format!(
                "{} {} converts to {price} {}",
                product.price, product.currency, option.currency
            )));
        }
        trace!("🧾️ {} {} is {price} {} (truncated from {converted})", product.price, product.currency, option.currency);

        let created_at = Utc::now();
        let request = AllocationRequest {
            product,
            payment_option: option.clone(),
            price,
            settings,
            policy: self.config.wallet_policy,
            customer_chat_id: chat_id,
            customer_handle: customer_handle.to_string(),
            created_at,
            expires_at: created_at + self.config.order_lifetime,
        };
        let Allocation { order, released } = self.db.allocate_order(request).await?;
        if !released.is_empty() {
            let replaced = released.order_ids();
            info!("♻️ Order {} replaces the pending order(s) {replaced:?} of customer {chat_id}", order.id);
            self.after_reclaim(&released).await;
        }
        info!(
            "🧾️ Order {} created for customer {chat_id}: {} {} to {} on {}, expires at {}",
            order.id, order.price, order.currency, order.wallet_address, order.network, order.expires_at
        );
        self.refresh_stock(&[order.product_id]).await;
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(order)
    }

    /// Releases the given orders, if they are still pending, and returns their wallets and items to the pool.
    ///
    /// Orders that have already been paid, expired or released are skipped, so releasing the same orders twice is
    /// harmless. After the commit, stock counts are refreshed and any payment request message is retracted.
    pub async fn release_orders(&self, order_ids: &[OrderId]) -> Result<ReclaimedOrders, OrderFlowError> {
        let released = self.db.release_orders(order_ids, Utc::now()).await?;
        if released.count() < order_ids.len() {
            let done = released.order_ids();
            order_ids.iter().filter(|id| !done.contains(id)).for_each(|id| {
                warn!("♻️ Order {id} was not released, since it is no longer pending");
            });
        }
        if !released.is_empty() {
            info!("♻️ Released {} order(s): {:?}", released.count(), released.order_ids());
            self.after_reclaim(&released).await;
        }
        Ok(released)
    }

    /// Expires every pending order whose expiry time is at or before `now`, and reclaims its wallet and item.
    /// This is the job the sweeper runs on every tick.
    pub async fn expire_orders(&self, now: DateTime<Utc>) -> Result<ReclaimedOrders, OrderFlowError> {
        let expired = self.db.expire_orders(now).await?;
        if expired.is_empty() {
            trace!("🕰️ No orders have expired");
        } else {
            info!("🕰️ {} order(s) expired: {:?}", expired.count(), expired.order_ids());
            self.after_reclaim(&expired).await;
        }
        Ok(expired)
    }

    async fn after_reclaim(&self, closed: &ReclaimedOrders) {
        self.refresh_stock(&closed.product_ids()).await;
        for order in &closed.orders {
            self.retract_payment_request(order).await;
            self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        }
    }

    async fn refresh_stock(&self, product_ids: &[i64]) {
        if let Err(e) = self.db.refresh_stock_counts(product_ids).await {
            warn!("🗃️ Could not refresh stock counts for products {product_ids:?}. {e}");
        }
    }

    async fn retract_payment_request(&self, order: &Order) {
        let Some(message_id) = order.message_id else {
            return;
        };
        if let Err(e) = self.notifier.delete(order.customer_chat_id, message_id).await {
            warn!("♻️ Could not retract the payment request for order {}. {e}", order.id);
        }
    }

    /// Stores a confirmed transfer reported by the chain watcher, and reconciles its order.
    ///
    /// Transfers are idempotent on their transaction id. A replayed transfer is not stored again, but the order is
    /// still reconciled.
    pub async fn process_transfer(&self, transfer: NewTransfer) -> Result<ReconcileOutcome, OrderFlowError> {
        if !transfer.price.is_positive() {
            return Err(OrderFlowError::InvalidAmount(format!("Transfer {} is for {}", transfer.txid, transfer.price)));
        }
        let order_id = transfer.order_id;
        if self.db.fetch_order(&order_id).await?.is_none() {
            return Err(OrderFlowError::OrderNotFound(order_id));
        }
        match self.db.insert_transfer(transfer).await {
            Ok(t) => debug!("💰️ Transfer {} of {} {} recorded for order {order_id}", t.txid, t.price, t.currency),
            Err(OrderFlowError::TransferAlreadyExists(txid)) => {
                debug!("💰️ Transfer {txid} was seen before. Reconciling order {order_id} anyway");
            },
            Err(e) => return Err(e),
        }
        self.on_transfers_observed(&order_id).await
    }

    /// Sums every transfer recorded for the order. If the total covers the order price, the order moves to paid, the
    /// purchased item is delivered to the customer and the payment request message is retracted.
    ///
    /// Safe to call any number of times: an order that is already paid is not paid or delivered again.
    pub async fn on_transfers_observed(&self, order_id: &OrderId) -> Result<ReconcileOutcome, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(*order_id))?;
        let transfers = self.db.transfers_for_order(order_id).await?;
        let (matching, other): (Vec<_>, Vec<_>) =
            transfers.into_iter().partition(|t| t.currency.eq_ignore_ascii_case(&order.currency));
        for t in &other {
            warn!(
                "💰️ Transfer {} for order {order_id} is in {}, not {}. Ignoring it",
                t.txid, t.currency, order.currency
            );
        }
        let received = matching.iter().map(|t| t.price).sum::<Amount>();
        if received < order.price {
            info!("💰️ Order {order_id} has received {received} of {} {}", order.price, order.currency);
            return Ok(ReconcileOutcome::Underpaid { order, received });
        }
        match self.db.mark_order_paid(order_id, Utc::now()).await {
            Ok(PaidTransition::Transitioned(paid)) => {
                info!("💰️ Order {order_id} is paid. Received {received} {}", paid.currency);
                self.deliver(&paid).await;
                Ok(ReconcileOutcome::Paid(paid))
            },
            Ok(PaidTransition::AlreadyPaid(paid)) => {
                debug!("💰️ Order {order_id} was already paid");
                Ok(ReconcileOutcome::AlreadyPaid(paid))
            },
            Err(OrderFlowError::StaleOrderRace(id, status)) => {
                warn!("💰️ Received {received} {} for order {id}, but it is already {status}", order.currency);
                let current = self.db.fetch_order(order_id).await?.unwrap_or(order);
                Ok(ReconcileOutcome::Closed(current))
            },
            Err(e) => Err(e),
        }
    }

    async fn deliver(&self, order: &Order) {
        let item = match self.db.fetch_item_for_order(&order.id).await {
            Ok(item) => item,
            Err(e) => {
                error!("💰️ Could not load the item for paid order {}. {e}", order.id);
                None
            },
        };
        match &item {
            Some(item) => {
                let text = format!("Payment received for order {}. Your item:\n{}", order.id, item.content);
                if let Err(e) = self.notifier.send(order.customer_chat_id, &text, &[]).await {
                    error!("💰️ Could not deliver order {} to chat {}. {e}", order.id, order.customer_chat_id);
                }
            },
            None => error!("💰️ Order {} is paid but has no product item bound to it", order.id),
        }
        self.retract_payment_request(order).await;
        self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), item)).await;
    }

    /// Records the id of the payment request message sent for an order, so that it can be retracted later.
    pub async fn set_order_message_id(&self, order_id: &OrderId, message_id: i64) -> Result<Order, OrderFlowError> {
        self.db.set_order_message_id(order_id, message_id).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        self.db.fetch_order(order_id).await
    }

    /// The customer's most recent paid orders, newest first.
    pub async fn paid_orders_for_customer(&self, chat_id: i64) -> Result<Vec<Order>, OrderFlowError> {
        let query = OrderQueryFilter::default()
            .with_customer_chat_id(chat_id)
            .with_status(OrderStatusType::Paid)
            .newest_first()
            .limit(PAID_ORDER_HISTORY);
        self.db.search_orders(query).await
    }

    /// The total value of orders paid in `[since, until)`, converted into `report_currency`.
    pub async fn income_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        report_currency: &str,
    ) -> Result<Amount, OrderFlowError> {
        let query = OrderQueryFilter::default()
            .with_status(OrderStatusType::Paid)
            .closed_since(since)
            .closed_until(until);
        let orders = self.db.search_orders(query).await?;
        let mut total = Amount::ZERO;
        for order in &orders {
            total += self.converter.convert(order.price, &order.currency, report_currency).await?;
        }
        debug!("💰️ {} paid order(s) between {since} and {until}, worth {total} {report_currency}", orders.len());
        Ok(total)
    }
}
