mod price_slots;

pub use price_slots::{price_lock_key, PriceSlot, PriceSlots};
