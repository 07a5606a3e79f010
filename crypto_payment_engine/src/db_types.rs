use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cpg_common::Amount;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for OrderId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order holds a wallet, a price and a product item, and is waiting for payment.
    Pending,
    /// Payment has been received in full.
    Paid,
    /// The order was not paid before its expiry time.
    Expired,
    /// The order was closed before expiry, usually because the customer started a new order.
    Released,
}

impl OrderStatusType {
    /// The numeric status code used by the bot and admin front ends.
    pub fn code(&self) -> i8 {
        match self {
            OrderStatusType::Pending => 0,
            OrderStatusType::Paid => 1,
            OrderStatusType::Expired => -1,
            OrderStatusType::Released => -2,
        }
    }

    pub fn from_code(code: i8) -> Result<Self, ConversionError> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Paid),
            -1 => Ok(Self::Expired),
            -2 => Ok(Self::Released),
            c => Err(ConversionError(format!("Invalid order status code: {c}"))),
        }
    }

    /// Paid, expired and released orders never change status again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Expired => write!(f, "Expired"),
            OrderStatusType::Released => write!(f, "Released"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Expired" => Ok(Self::Expired),
            "Released" => Ok(Self::Released),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Expired");
            OrderStatusType::Expired
        })
    }
}

//--------------------------------------     WalletPolicy      ---------------------------------------------------------
/// How receiving addresses are shared between pending orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum WalletPolicy {
    /// One wallet serves exactly one pending order. The wallet row is locked for the lifetime of the order.
    Exclusive,
    /// One wallet serves many pending orders. Each order gets a unique price tail on that wallet instead.
    SharedPriceSlot,
}

impl Display for WalletPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletPolicy::Exclusive => write!(f, "Exclusive"),
            WalletPolicy::SharedPriceSlot => write!(f, "SharedPriceSlot"),
        }
    }
}

impl FromStr for WalletPolicy {
    type Err = ConversionError;

    /// Accepts the policy names as well as the legacy wallet type numbers (1 = exclusive, 2 = shared).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "exclusive" => Ok(Self::Exclusive),
            "2" | "shared" | "sharedpriceslot" | "shared_price_slot" => Ok(Self::SharedPriceSlot),
            s => Err(ConversionError(format!("Invalid wallet policy: {s}"))),
        }
    }
}

//--------------------------------------     WalletStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletStatus {
    Free,
    Locked,
}

impl Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletStatus::Free => write!(f, "Free"),
            WalletStatus::Locked => write!(f, "Locked"),
        }
    }
}

//--------------------------------------   ProductItemStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ProductItemStatus {
    Available,
    Reserved,
}

impl Display for ProductItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductItemStatus::Available => write!(f, "Available"),
            ProductItemStatus::Reserved => write!(f, "Reserved"),
        }
    }
}

//--------------------------------------    PaymentOption      ---------------------------------------------------------
/// A settlement currency on a specific network, e.g. USDT on TRC20.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentOption {
    pub currency: String,
    pub network: String,
}

impl PaymentOption {
    pub fn new<S1: Into<String>, S2: Into<String>>(currency: S1, network: S2) -> Self {
        Self { currency: currency.into(), network: network.into() }
    }
}

impl Display for PaymentOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.currency, self.network)
    }
}

impl FromStr for PaymentOption {
    type Err = ConversionError;

    /// Parses `CURRENCY_NETWORK`, e.g. `USDT_TRC20`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('_') {
            Some((currency, network)) if !currency.is_empty() && !network.is_empty() => {
                Ok(Self::new(currency.to_ascii_uppercase(), network.to_ascii_uppercase()))
            },
            _ => Err(ConversionError(format!("Invalid payment option: {s}. Expected CURRENCY_NETWORK"))),
        }
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// The currency the list price is quoted in
    pub currency: String,
    pub price: Amount,
    /// Cached count of available product items. Refreshed after every item status change.
    pub in_stock: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub currency: String,
    pub price: Amount,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, currency: S, price: Amount) -> Self {
        Self { name: name.into(), description: None, currency: currency.into(), price }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

//--------------------------------------      ProductItem      ---------------------------------------------------------
/// One sellable unit of a product. `content` is what gets delivered to the customer once the order is paid.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ProductItem {
    pub id: i64,
    pub product_id: i64,
    pub content: String,
    pub status: ProductItemStatus,
    pub order_id: Option<OrderId>,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Wallet         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: i64,
    pub address: String,
    pub network: String,
    pub status: WalletStatus,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWallet {
    pub address: String,
    pub network: String,
}

impl NewWallet {
    pub fn new<S: Into<String>>(address: S, network: S) -> Self {
        Self { address: address.into(), network: network.into() }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatusType,
    /// The settlement currency the customer pays in
    pub currency: String,
    pub network: String,
    /// The exact amount the customer must transfer
    pub price: Amount,
    /// Present only while a shared-policy order is pending
    pub price_lock_key: Option<String>,
    pub base_currency: String,
    pub base_price: Amount,
    pub wallet_id: i64,
    pub wallet_address: String,
    pub wallet_policy: WalletPolicy,
    pub product_id: i64,
    pub customer_chat_id: i64,
    pub customer_handle: String,
    /// The payment-request message sent to the customer, if any
    pub message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// When the order left the pending state
    pub closed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn payment_option(&self) -> PaymentOption {
        PaymentOption::new(self.currency.as_str(), self.network.as_str())
    }
}

/// A fully resolved order, ready to be inserted. Only the allocator builds these.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub currency: String,
    pub network: String,
    pub price: Amount,
    pub price_lock_key: Option<String>,
    pub base_currency: String,
    pub base_price: Amount,
    pub wallet_id: i64,
    pub wallet_address: String,
    pub wallet_policy: WalletPolicy,
    pub product_id: i64,
    pub customer_chat_id: i64,
    pub customer_handle: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------       Transfer        ---------------------------------------------------------
/// A confirmed incoming payment that the chain watcher has attributed to an order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub txid: String,
    pub order_id: OrderId,
    pub price: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    /// The on-chain transaction hash. Transfers are idempotent on this value.
    pub txid: String,
    pub order_id: OrderId,
    pub price: Amount,
    pub currency: String,
}

impl NewTransfer {
    pub fn new<S: Into<String>>(txid: S, order_id: OrderId, price: Amount, currency: S) -> Self {
        Self { txid: txid.into(), order_id, price, currency: currency.into() }
    }
}
