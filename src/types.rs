//! Domain model for Chain POS.
//!
//! Orders carry denormalized snapshots of the customer, delivery address and
//! fulfilling store taken at creation time; later edits to those source
//! records do not flow back into existing orders. All monetary fields are
//! currency-agnostic decimals stored as `f64`, matching the hosted schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PosError;

/// VAT applied on the post-discount subtotal at display time.
pub const VAT_RATE: f64 = 0.14;

/// Delivery fee used when the operator does not override it.
pub const DEFAULT_DELIVERY_FEE: f64 = 10.0;

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// The six fulfillment stages, in display order.
///
/// The display order suggests a pipeline, but no transition guard exists
/// anywhere: staff may move an order from any status to any other status,
/// including backward, to correct mistakes without a dedicated undo flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Order Received")]
    OrderReceived,
    #[serde(rename = "Store Received")]
    StoreReceived,
    #[serde(rename = "Order Started")]
    OrderStarted,
    #[serde(rename = "Delivery Boy Selected")]
    DeliveryBoySelected,
    #[serde(rename = "Invoice Printed")]
    InvoicePrinted,
    #[serde(rename = "Order Delivered")]
    OrderDelivered,
}

impl OrderStatus {
    /// Every status in display order. Kanban columns follow this order.
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::OrderReceived,
        OrderStatus::StoreReceived,
        OrderStatus::OrderStarted,
        OrderStatus::DeliveryBoySelected,
        OrderStatus::InvoicePrinted,
        OrderStatus::OrderDelivered,
    ];

    /// The exact string stored in the `orders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::OrderReceived => "Order Received",
            OrderStatus::StoreReceived => "Store Received",
            OrderStatus::OrderStarted => "Order Started",
            OrderStatus::DeliveryBoySelected => "Delivery Boy Selected",
            OrderStatus::InvoicePrinted => "Invoice Printed",
            OrderStatus::OrderDelivered => "Order Delivered",
        }
    }

    /// Open = anything that still needs work, i.e. not yet delivered.
    pub fn is_open(&self) -> bool {
        !matches!(self, OrderStatus::OrderDelivered)
    }

    /// Items and payment method may only change while the store has not
    /// started working on the order.
    pub fn allows_content_edits(&self) -> bool {
        matches!(
            self,
            OrderStatus::OrderReceived | OrderStatus::StoreReceived
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = PosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| PosError::validation(format!("Unknown order status: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Payment method
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Visa,
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Visa => "visa",
            PaymentMethod::Credit => "credit",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which payment methods a customer has agreed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPreferences {
    pub cash: bool,
    pub visa: bool,
    pub credit: bool,
}

impl Default for PaymentPreferences {
    fn default() -> Self {
        // Cash is always a safe assumption for walk-in/phone customers.
        Self {
            cash: true,
            visa: false,
            credit: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Order + items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    /// Unit price, non-negative.
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Percentage 0-100 applied to the whole line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

impl OrderItem {
    /// Line total after the percentage discount.
    pub fn line_total(&self) -> f64 {
        let gross = self.price * f64::from(self.quantity);
        let discount = self.discount.map(|pct| gross * (pct / 100.0)).unwrap_or(0.0);
        gross - discount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub address_id: String,
    pub delivery_address: String,
    pub store_id: String,
    pub store_name: String,
    /// Insertion order is meaningful for display; no dedup.
    pub items: Vec<OrderItem>,
    /// Always the post-discount, pre-VAT, pre-delivery subtotal.
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<f64>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a fresh draft from the POS checkout flow. Snapshots the
    /// customer/address/store, starts in `Order Received`, and computes the
    /// totals from the cart lines.
    pub fn draft(
        customer: &Customer,
        address: &Address,
        store: &Store,
        items: Vec<OrderItem>,
        payment_method: PaymentMethod,
        delivery_fee: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            customer_phone: customer.phone_number.clone(),
            address_id: address.id.clone(),
            delivery_address: address.display_line(),
            store_id: store.id.clone(),
            store_name: store.name.clone(),
            items,
            total_amount: 0.0,
            vat_amount: None,
            delivery_fee: Some(delivery_fee),
            status: OrderStatus::OrderReceived,
            payment_method,
            created_at: now,
            updated_at: now,
        };
        order.recompute_totals();
        order
    }

    /// Post-discount sum of the item lines.
    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Refresh `total_amount`/`vat_amount` from the current item lines.
    /// Called on both the creation and the edit path so the stored subtotal
    /// has a single definition.
    pub fn recompute_totals(&mut self) {
        let subtotal = self.subtotal();
        self.total_amount = subtotal;
        self.vat_amount = Some(subtotal * VAT_RATE);
    }

    /// Subtotal + VAT + delivery fee. Display-time only, never stored.
    pub fn grand_total(&self) -> f64 {
        self.total_amount + self.vat_amount.unwrap_or(0.0) + self.delivery_fee.unwrap_or(0.0)
    }

    /// The short id shown on cards and in notifications ("#3f2a").
    pub fn short_id(&self) -> &str {
        short_order_id(&self.id)
    }
}

/// Last four characters of the order id, as printed on cards and receipts.
pub fn short_order_id(id: &str) -> &str {
    let chars = id.char_indices().rev().take(4).last();
    match chars {
        Some((idx, _)) => &id[idx..],
        None => id,
    }
}

// ---------------------------------------------------------------------------
// Customer / address / store snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub street: String,
    pub city: String,
    pub zip_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gis_location: Option<GeoPoint>,
    pub store_id: String,
}

impl Address {
    /// One-line form used for the order's delivery snapshot.
    pub fn display_line(&self) -> String {
        format!("{}, {}, {}", self.street, self.city, self.zip_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub phone_number: String,
    pub name: String,
    pub addresses: Vec<Address>,
    pub payment_methods: PaymentPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub address: String,
}
