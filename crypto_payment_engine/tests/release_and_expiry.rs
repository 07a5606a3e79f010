mod support;

use chrono::Duration;
use cpg_common::Amount;
use crypto_payment_engine::{
    db_types::{NewTransfer, OrderStatusType, ProductItemStatus, WalletPolicy, WalletStatus},
    CatalogManagement,
    EngineConfig,
    OrderEngineDatabase,
};
use mockall::predicate::eq;
use rust_decimal_macros::dec;
use support::{usdt, MockNotifier, TestSystem};

fn expect_one_retraction(chat_id: i64, message_id: i64) -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_send().never();
    notifier.expect_delete().with(eq(chat_id), eq(message_id)).times(1).returning(|_, _| Ok(()));
    notifier
}

#[tokio::test]
async fn release_reclaims_wallet_and_item() {
    let sys = TestSystem::exclusive().await;
    let product = sys.product(dec!(8), 1).await;
    sys.wallets("TRC20", 1).await;
    let order = sys.api.create_order(&usdt(), product.id, 7, "@bob").await.unwrap();
    let item = sys.db.fetch_item_for_order(&order.id).await.unwrap().unwrap();

    let released = sys.api.release_orders(&[order.id]).await.unwrap();
    assert_eq!(released.count(), 1);
    assert_eq!(released.orders[0].status, OrderStatusType::Released);
    assert_eq!(OrderStatusType::Released.code(), -2);

    let wallet = sys.db.fetch_wallet(order.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.status, WalletStatus::Free);
    let items = sys.db.fetch_product_items(product.id).await.unwrap();
    let item = items.iter().find(|i| i.id == item.id).unwrap();
    assert_eq!(item.status, ProductItemStatus::Available);
    assert!(item.order_id.is_none());
    assert!(sys.db.fetch_item_for_order(&order.id).await.unwrap().is_none());
    sys.assert_stock_is_consistent(product.id).await;
    sys.teardown().await;
}

#[tokio::test]
async fn release_is_idempotent() {
    // The message is only retracted once
    let notifier = expect_one_retraction(7, 99);
    let sys = TestSystem::with_notifier(EngineConfig::new(WalletPolicy::Exclusive), notifier).await;
    let product = sys.product(dec!(8), 2).await;
    sys.wallets("TRC20", 2).await;
    let order = sys.api.create_order(&usdt(), product.id, 7, "@bob").await.unwrap();
    sys.api.set_order_message_id(&order.id, 99).await.unwrap();

    let first = sys.api.release_orders(&[order.id]).await.unwrap();
    let after_first = sys.db.fetch_order(&order.id).await.unwrap().unwrap();
    let second = sys.api.release_orders(&[order.id]).await.unwrap();
    let after_second = sys.db.fetch_order(&order.id).await.unwrap().unwrap();

    assert_eq!(first.count(), 1);
    assert!(second.is_empty());
    assert_eq!(after_first, after_second, "A second release must not change anything");
    let product = sys.catalog.product(product.id).await.unwrap();
    assert_eq!(product.in_stock, 2);
    sys.teardown().await;
}

#[tokio::test]
async fn release_never_touches_paid_orders() {
    let sys = TestSystem::exclusive().await;
    let product = sys.product(dec!(2.5), 2).await;
    sys.wallets("TRC20", 2).await;
    let paid = sys.api.create_order(&usdt(), product.id, 1, "@payer").await.unwrap();
    let pending = sys.api.create_order(&usdt(), product.id, 2, "@waiter").await.unwrap();
    sys.api
        .process_transfer(NewTransfer::new("tx-paid", paid.id, Amount::from(dec!(2.5)), "USDT"))
        .await
        .unwrap();

    let released = sys.api.release_orders(&[paid.id, pending.id]).await.unwrap();
    assert_eq!(released.order_ids(), vec![pending.id]);

    let paid = sys.db.fetch_order(&paid.id).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    let item = sys.db.fetch_item_for_order(&paid.id).await.unwrap().expect("Sold items stay bound");
    assert_eq!(item.status, ProductItemStatus::Reserved);
    sys.assert_stock_is_consistent(product.id).await;
    sys.teardown().await;
}

#[tokio::test]
async fn orders_never_expire_early() {
    let sys = TestSystem::exclusive().await;
    let product = sys.product(dec!(1), 1).await;
    sys.wallets("TRC20", 1).await;
    let order = sys.api.create_order(&usdt(), product.id, 3, "@clock").await.unwrap();
    let deadline = order.expires_at;

    let expired = sys.api.expire_orders(deadline - Duration::milliseconds(1)).await.unwrap();
    assert!(expired.is_empty(), "Swept {} order(s) before the deadline", expired.count());
    let still_pending = sys.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(still_pending.status, OrderStatusType::Pending);

    let expired = sys.api.expire_orders(deadline).await.unwrap();
    assert_eq!(expired.order_ids(), vec![order.id]);
    let order = sys.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Expired);
    assert_eq!(order.closed_at, Some(deadline));
    sys.teardown().await;
}

#[tokio::test]
async fn expiry_reclaims_in_the_same_sweep() {
    let notifier = expect_one_retraction(2, 1234);
    let sys = TestSystem::with_notifier(EngineConfig::new(WalletPolicy::Exclusive), notifier).await;
    let product = sys.product(dec!(1), 3).await;
    sys.wallets("TRC20", 3).await;
    let a = sys.api.create_order(&usdt(), product.id, 1, "@a").await.unwrap();
    let b = sys.api.create_order(&usdt(), product.id, 2, "@b").await.unwrap();
    sys.api.set_order_message_id(&b.id, 1234).await.unwrap();
    assert_eq!(sys.catalog.product(product.id).await.unwrap().in_stock, 1);

    let expired = sys.api.expire_orders(b.expires_at + Duration::seconds(1)).await.unwrap();
    assert_eq!(expired.count(), 2);
    for order in [&a, &b] {
        let wallet = sys.db.fetch_wallet(order.wallet_id).await.unwrap().unwrap();
        assert_eq!(wallet.status, WalletStatus::Free);
    }
    assert_eq!(sys.catalog.product(product.id).await.unwrap().in_stock, 3);
    sys.assert_stock_is_consistent(product.id).await;

    // A second sweep finds nothing to do
    assert!(sys.api.expire_orders(b.expires_at + Duration::seconds(2)).await.unwrap().is_empty());
    sys.teardown().await;
}

#[tokio::test]
async fn reused_wallets_are_not_freed_by_stale_releases() {
    let sys = TestSystem::exclusive().await;
    let product = sys.product(dec!(1), 2).await;
    sys.wallets("TRC20", 1).await;
    let old = sys.api.create_order(&usdt(), product.id, 1, "@old").await.unwrap();
    sys.api.expire_orders(old.expires_at).await.unwrap();

    let new = sys.api.create_order(&usdt(), product.id, 2, "@new").await.unwrap();
    assert_eq!(new.wallet_id, old.wallet_id);

    let released = sys.api.release_orders(&[old.id]).await.unwrap();
    assert!(released.is_empty());
    let wallet = sys.db.fetch_wallet(new.wallet_id).await.unwrap().unwrap();
    assert_eq!(wallet.status, WalletStatus::Locked, "The wallet now belongs to the new order");
    assert_eq!(sys.db.fetch_order(&new.id).await.unwrap().unwrap().status, OrderStatusType::Pending);
    sys.teardown().await;
}

#[tokio::test]
async fn shared_wallet_stays_usable_while_other_orders_are_pending() {
    let sys = TestSystem::shared().await;
    let product = sys.product(dec!(6), 3).await;
    sys.wallets("TRC20", 1).await;
    let a = sys.api.create_order(&usdt(), product.id, 1, "@a").await.unwrap();
    let b = sys.api.create_order(&usdt(), product.id, 2, "@b").await.unwrap();

    sys.api.release_orders(&[a.id]).await.unwrap();
    let b = sys.db.fetch_order(&b.id).await.unwrap().unwrap();
    assert_eq!(b.status, OrderStatusType::Pending);
    assert!(b.price_lock_key.is_some(), "Other pending orders keep their slots");
    sys.assert_stock_is_consistent(product.id).await;
    sys.teardown().await;
}
