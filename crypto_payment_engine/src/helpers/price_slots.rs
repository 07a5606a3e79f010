//! Decimal price slots.
//!
//! Under the shared wallet policy many pending orders pay into the same address, so the amount itself has to identify
//! the order. Each order gets the base price plus `k` currency units, for the smallest `k` in `[0, max_slots)` whose
//! lock key is not held by another pending order.
use cpg_common::Amount;

use crate::{cpe_api::CurrencySettings, db_types::PaymentOption};

/// The key that identifies one price slot on one wallet: `address-network-currency-price`.
///
/// The price is rendered in canonical form, so `10.10` and `10.1` give the same key.
pub fn price_lock_key(address: &str, network: &str, currency: &str, price: Amount) -> String {
    format!("{address}-{network}-{currency}-{price}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSlot {
    pub index: u32,
    pub price: Amount,
    pub lock_key: String,
}

/// The candidate slots for a wallet and base price, in search order.
#[derive(Debug, Clone)]
pub struct PriceSlots {
    address: String,
    option: PaymentOption,
    base_price: Amount,
    unit: Amount,
    next: u32,
    max_slots: u32,
}

impl PriceSlots {
    pub fn new(address: &str, option: &PaymentOption, base_price: Amount, settings: &CurrencySettings) -> Self {
        Self {
            address: address.to_string(),
            option: option.clone(),
            base_price,
            unit: settings.unit,
            next: 0,
            max_slots: settings.max_slots,
        }
    }

    /// Skip ahead so that the next candidate is slot `index`.
    pub fn starting_at(mut self, index: u32) -> Self {
        self.next = index;
        self
    }

    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    pub fn base_price(&self) -> Amount {
        self.base_price
    }

    pub fn payment_option(&self) -> &PaymentOption {
        &self.option
    }

    pub fn slot(&self, index: u32) -> PriceSlot {
        let price = self.base_price.offset_by(self.unit, index);
        let lock_key = price_lock_key(&self.address, &self.option.network, &self.option.currency, price);
        PriceSlot { index, price, lock_key }
    }
}

impl Iterator for PriceSlots {
    type Item = PriceSlot;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.max_slots {
            return None;
        }
        let slot = self.slot(self.next);
        self.next += 1;
        Some(slot)
    }
}
