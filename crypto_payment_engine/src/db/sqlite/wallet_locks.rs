//! Wallet acquisition under the two allocation policies.
//!
//! * **Exclusive**: claim one free wallet and lock it. The converted price is used as is.
//! * **Shared price slot**: any wallet on the network may serve many orders. The order's identity is carried by the
//!   price instead, so the wallet is paired with a free price slot (see [`crate::helpers::PriceSlots`]).
//!
//! Both acquisitions begin with a write to the chosen wallet row, which takes the database write lock for the rest of
//! the allocation transaction.
use cpg_common::Amount;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::{decimal_slots::allocate_price_slot, wallets},
    db_types::{Wallet, WalletPolicy},
    helpers::{PriceSlot, PriceSlots},
    traits::{AllocationRequest, OrderFlowError},
};

/// A wallet and the exact price the customer must pay into it.
#[derive(Debug, Clone)]
pub struct WalletLease {
    pub wallet: Wallet,
    pub price: Amount,
    /// The price slot taken on a shared wallet. Always `None` for exclusive wallets.
    pub slot: Option<PriceSlot>,
}

impl WalletLease {
    pub fn lock_key(&self) -> Option<String> {
        self.slot.as_ref().map(|s| s.lock_key.clone())
    }
}

pub async fn acquire_wallet(
    request: &AllocationRequest,
    conn: &mut SqliteConnection,
) -> Result<WalletLease, OrderFlowError> {
    match request.policy {
        WalletPolicy::Exclusive => acquire_exclusive(request, conn).await,
        WalletPolicy::SharedPriceSlot => acquire_shared(request, conn).await,
    }
}

async fn acquire_exclusive(
    request: &AllocationRequest,
    conn: &mut SqliteConnection,
) -> Result<WalletLease, OrderFlowError> {
    let network = request.payment_option.network.as_str();
    let wallet = wallets::claim_free_wallet(network, request.expires_at, conn)
        .await?
        .ok_or_else(|| OrderFlowError::NoFreeWallet(network.to_string()))?;
    debug!("🧾️ Wallet {} on {network} locked until {}", wallet.address, request.expires_at);
    Ok(WalletLease { wallet, price: request.price, slot: None })
}

async fn acquire_shared(
    request: &AllocationRequest,
    conn: &mut SqliteConnection,
) -> Result<WalletLease, OrderFlowError> {
    let network = request.payment_option.network.as_str();
    let first = wallets::touch_least_loaded_wallet(network, request.expires_at, conn)
        .await?
        .ok_or_else(|| OrderFlowError::NoFreeWallet(network.to_string()))?;
    let first_id = first.id;
    let mut exhausted = match lease_slot(first, request, 0, conn).await {
        Ok(lease) => return Ok(lease),
        Err(e @ OrderFlowError::PriceSlotExhausted { .. }) => e,
        Err(e) => return Err(e),
    };
    // The least loaded wallet is full at this price. Try the others before giving up.
    for wallet in wallets::shared_wallet_candidates(network, conn).await?.into_iter().filter(|w| w.id != first_id) {
        let wallet_id = wallet.id;
        match lease_slot(wallet, request, 0, conn).await {
            Ok(lease) => {
                wallets::touch_wallet(wallet_id, request.expires_at, conn).await?;
                return Ok(lease);
            },
            Err(e @ OrderFlowError::PriceSlotExhausted { .. }) => exhausted = e,
            Err(e) => return Err(e),
        }
    }
    Err(exhausted)
}

/// Pairs `wallet` with the first free price slot at or after `start_at`.
pub async fn lease_slot(
    wallet: Wallet,
    request: &AllocationRequest,
    start_at: u32,
    conn: &mut SqliteConnection,
) -> Result<WalletLease, OrderFlowError> {
    let slots = PriceSlots::new(&wallet.address, &request.payment_option, request.price, &request.settings)
        .starting_at(start_at);
    let slot = allocate_price_slot(&wallet.address, slots, conn).await?;
    trace!("🧾️ Price slot {} ({}) on {} is free", slot.index, slot.price, wallet.address);
    Ok(WalletLease { wallet, price: slot.price, slot: Some(slot) })
}
