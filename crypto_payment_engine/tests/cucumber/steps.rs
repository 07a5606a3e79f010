use std::str::FromStr;

use chrono::{Duration, Utc};
use cpg_common::Amount;
use cucumber::{given, then, when};
use crypto_payment_engine::{
    db_types::{NewProduct, NewTransfer, NewWallet, OrderStatusType, PaymentOption, ProductItemStatus, WalletPolicy},
    CurrencySettings,
    OrderFlowError,
};

use crate::cucumber::EngineWorld;

fn amount(value: &str) -> Amount {
    Amount::from_str(value).expect("Not a valid amount")
}

fn error_name(err: &OrderFlowError) -> &'static str {
    match err {
        OrderFlowError::RateUnavailable(_) => "RateUnavailable",
        OrderFlowError::NoFreeWallet(_) => "NoFreeWallet",
        OrderFlowError::PriceSlotExhausted { .. } => "PriceSlotExhausted",
        OrderFlowError::OutOfStock(_) => "OutOfStock",
        OrderFlowError::StaleOrderRace(_, _) => "StaleOrderRace",
        OrderFlowError::CommitFailure(_) => "CommitFailure",
        OrderFlowError::DatabaseError(_) => "DatabaseError",
        OrderFlowError::ProductNotFound(_) => "ProductNotFound",
        OrderFlowError::ProductUnavailable(_) => "ProductUnavailable",
        OrderFlowError::OrderNotFound(_) => "OrderNotFound",
        OrderFlowError::PaymentOptionDisabled(_) => "PaymentOptionDisabled",
        OrderFlowError::TransferAlreadyExists(_) => "TransferAlreadyExists",
        OrderFlowError::InvalidAmount(_) => "InvalidAmount",
        OrderFlowError::UnsupportedCurrency(_) => "UnsupportedCurrency",
    }
}

#[given(expr = "the {word} wallet policy")]
async fn wallet_policy(world: &mut EngineWorld, policy: String) {
    world.config.wallet_policy = WalletPolicy::from_str(&policy).expect("Not a wallet policy");
}

#[given(expr = "{word} prices have a unit of {word} and {int} slots")]
async fn currency_settings(world: &mut EngineWorld, currency: String, unit: String, slots: u32) {
    let settings = CurrencySettings { unit: amount(&unit), max_slots: slots };
    world.config.currencies = world.config.currencies.clone().with_currency(&currency, settings);
}

#[given(expr = "orders expire after {int} minutes")]
async fn order_lifetime(world: &mut EngineWorld, minutes: i64) {
    world.config.order_lifetime = Duration::minutes(minutes);
}

#[given(expr = "a product '{word}' priced at {word} {word} with {int} item(s) in stock")]
async fn add_product(world: &mut EngineWorld, name: String, price: String, currency: String, items: usize) {
    let sys = world.system().await;
    let product = sys
        .catalog
        .add_product(NewProduct::new(name.clone(), currency, amount(&price)))
        .await
        .expect("Error adding product");
    let contents = (0..items).map(|i| format!("{name}-{i}")).collect::<Vec<_>>();
    let product = sys.catalog.add_product_items(product.id, &contents).await.expect("Error adding items");
    world.products.insert(name, product);
}

#[given(expr = "{int} wallet(s) on the {word} network")]
async fn add_wallets(world: &mut EngineWorld, count: usize, network: String) {
    let wallets = (0..count).map(|i| NewWallet::new(format!("T{network}Wallet{i}"), network.clone())).collect();
    world.system().await.catalog.register_wallets(wallets).await.expect("Error registering wallets");
}

#[when(expr = "customer {int} orders '{word}' paying with {word}")]
async fn place_order(world: &mut EngineWorld, chat_id: i64, product: String, option: String) {
    let option = PaymentOption::from_str(&option).expect("Not a payment option");
    let product_id = world.product(&product).id;
    let handle = format!("@customer{chat_id}");
    let result = world.system().await.api.create_order(&option, product_id, chat_id, &handle).await;
    match result {
        Ok(order) => {
            world.errors.remove(&chat_id);
            world.orders.insert(chat_id, order);
        },
        Err(e) => {
            world.errors.insert(chat_id, e);
        },
    }
}

#[when(expr = "customer {int} cancels their order")]
async fn cancel_order(world: &mut EngineWorld, chat_id: i64) {
    let order_id = world.order_for(chat_id).id;
    world.system().await.api.release_orders(&[order_id]).await.expect("Error releasing order");
}

#[when(expr = "the sweeper runs {int} minutes from now")]
async fn run_sweeper(world: &mut EngineWorld, minutes: i64) {
    let now = Utc::now() + Duration::minutes(minutes);
    world.system().await.api.expire_orders(now).await.expect("Error expiring orders");
}

#[when(expr = "customer {int} pays {word} {word} in transaction [{word}]")]
async fn pay(world: &mut EngineWorld, chat_id: i64, price: String, currency: String, txid: String) {
    let order_id = world.order_for(chat_id).id;
    let transfer = NewTransfer::new(txid, order_id, amount(&price), currency);
    world.system().await.api.process_transfer(transfer).await.expect("Error processing transfer");
}

#[then(expr = "customer {int} is asked to pay {word} {word} on {word}")]
async fn check_price(world: &mut EngineWorld, chat_id: i64, price: String, currency: String, network: String) {
    if let Some(e) = world.errors.get(&chat_id) {
        panic!("Customer {chat_id} could not place an order: {e}");
    }
    let order = world.order_for(chat_id);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.price, amount(&price));
    assert_eq!(order.currency, currency);
    assert_eq!(order.network, network);
}

#[then(expr = "customers {int} and {int} share a wallet")]
async fn shared_wallet(world: &mut EngineWorld, a: i64, b: i64) {
    assert_eq!(world.order_for(a).wallet_id, world.order_for(b).wallet_id);
}

#[then(expr = "customers {int} and {int} have different wallets")]
async fn different_wallets(world: &mut EngineWorld, a: i64, b: i64) {
    assert_ne!(world.order_for(a).wallet_id, world.order_for(b).wallet_id);
}

#[then(expr = "customer {int} is refused with {word}")]
async fn refused(world: &mut EngineWorld, chat_id: i64, expected: String) {
    let err = world.errors.get(&chat_id).unwrap_or_else(|| panic!("Customer {chat_id} was not refused"));
    assert_eq!(error_name(err), expected, "Unexpected error: {err}");
}

#[then(expr = "the order for customer {int} is {word}")]
async fn order_status(world: &mut EngineWorld, chat_id: i64, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    let order_id = world.order_for(chat_id).id;
    let order = world.system().await.api.fetch_order(&order_id).await.expect("Error fetching order");
    let order = order.unwrap_or_else(|| panic!("Order {order_id} does not exist"));
    assert_eq!(order.status, expected);
    if expected.is_terminal() {
        assert!(order.price_lock_key.is_none(), "Closed order {order_id} still holds a price slot");
    }
}

#[then(expr = "customer {int} receives a message containing {string}")]
async fn message_received(world: &mut EngineWorld, chat_id: i64, text: String) {
    let sent = world.system().await.sent_to(chat_id);
    assert!(sent.iter().any(|m| m.text.contains(&text)), "No message containing '{text}' in {sent:?}");
}

#[then(expr = "customer {int} has received {int} message(s)")]
async fn message_count(world: &mut EngineWorld, chat_id: i64, count: usize) {
    let sent = world.system().await.sent_to(chat_id);
    assert_eq!(sent.len(), count, "Unexpected messages: {sent:?}");
}

#[then(expr = "product '{word}' has {int} item(s) in stock")]
async fn stock_level(world: &mut EngineWorld, name: String, expected: i64) {
    let product_id = world.product(&name).id;
    let sys = world.system().await;
    let product = sys.catalog.product(product_id).await.expect("Error fetching product");
    let available = sys
        .catalog
        .product_items(product_id)
        .await
        .expect("Error fetching items")
        .into_iter()
        .filter(|i| i.status == ProductItemStatus::Available)
        .count();
    assert_eq!(product.in_stock, expected);
    assert_eq!(available as i64, expected);
}
