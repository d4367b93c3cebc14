//! Persistent-store collaborator for orders.
//!
//! The order core talks to an abstract [`OrderBackend`] rather than to the
//! HTTP client directly, so the update protocol can be exercised against an
//! in-memory double in tests. The production implementation maps onto the
//! hosted `orders` / `order_items` tables over PostgREST.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::SupabaseClient;
use crate::error::{PosError, Result};
use crate::types::{Order, OrderItem, OrderStatus, PaymentMethod};

/// Remote operations the order core is written against.
///
/// `order_status_update` reports the number of rows the remote actually
/// touched so callers can warn when an update matched nothing.
#[allow(async_fn_in_trait)]
pub trait OrderBackend {
    /// Full order list, most-recent-first by creation time, items attached.
    async fn orders_read(&self) -> Result<Vec<Order>>;
    /// Item lines for one order, in row order.
    async fn order_items_read(&self, order_id: &str) -> Result<Vec<OrderItem>>;
    async fn order_insert(&self, order: &Order) -> Result<()>;
    /// Full-row replace keyed on the order id.
    async fn order_replace(&self, order: &Order) -> Result<()>;
    async fn order_items_delete_all(&self, order_id: &str) -> Result<()>;
    async fn order_items_insert(&self, order_id: &str, items: &[OrderItem]) -> Result<()>;
    async fn order_status_update(
        &self,
        order_id: &str,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Wire rows
// ---------------------------------------------------------------------------

/// Numeric columns arrive as JSON numbers normally, but as strings when the
/// project serializes `numeric` verbatim. Accept both.
fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }
    match Raw::deserialize(de)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(
    de: D,
) -> std::result::Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        None,
        Num(f64),
        Text(String),
    }
    match Raw::deserialize(de)? {
        Raw::None => Ok(None),
        Raw::Num(n) => Ok(Some(n)),
        Raw::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<f64>()
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderRow {
    id: String,
    customer_id: String,
    customer_name: String,
    customer_phone: String,
    address_id: String,
    delivery_address: String,
    store_id: String,
    store_name: String,
    #[serde(deserialize_with = "lenient_f64")]
    total_amount: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    vat_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    delivery_fee: Option<f64>,
    status: OrderStatus,
    payment_method: PaymentMethod,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            customer_id: order.customer_id.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            address_id: order.address_id.clone(),
            delivery_address: order.delivery_address.clone(),
            store_id: order.store_id.clone(),
            store_name: order.store_name.clone(),
            total_amount: order.total_amount,
            vat_amount: order.vat_amount,
            delivery_fee: order.delivery_fee,
            status: order.status,
            payment_method: order.payment_method,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }

    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            address_id: self.address_id,
            delivery_address: self.delivery_address,
            store_id: self.store_id,
            store_name: self.store_name,
            items,
            total_amount: self.total_amount,
            vat_amount: self.vat_amount,
            delivery_fee: self.delivery_fee,
            status: self.status,
            payment_method: self.payment_method,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
    product_name: String,
    quantity: u32,
    #[serde(deserialize_with = "lenient_f64")]
    price: f64,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    discount: Option<f64>,
}

impl OrderItemRow {
    fn from_item(order_id: &str, item: &OrderItem) -> Self {
        Self {
            id: item.id.clone(),
            order_id: order_id.to_string(),
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            price: item.price,
            notes: item.notes.clone(),
            discount: item.discount,
        }
    }

    fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: self.quantity,
            price: self.price,
            notes: self.notes,
            discount: self.discount,
        }
    }
}

// ---------------------------------------------------------------------------
// Supabase implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SupabaseOrders {
    api: SupabaseClient,
}

impl SupabaseOrders {
    pub fn new(api: SupabaseClient) -> Self {
        Self { api }
    }

    fn parse_rows<T: serde::de::DeserializeOwned>(rows: Value, what: &str) -> Result<Vec<T>> {
        serde_json::from_value(rows)
            .map_err(|e| PosError::remote(format!("Malformed {what} rows from hosted store: {e}")))
    }
}

impl OrderBackend for SupabaseOrders {
    async fn orders_read(&self) -> Result<Vec<Order>> {
        let rows = self
            .api
            .select(
                "orders",
                &[
                    ("select", "*".to_string()),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await?;
        let order_rows: Vec<OrderRow> = Self::parse_rows(rows, "order")?;

        let mut orders = Vec::with_capacity(order_rows.len());
        for row in order_rows {
            let items = self.order_items_read(&row.id).await?;
            orders.push(row.into_order(items));
        }
        debug!(count = orders.len(), "fetched orders from hosted store");
        Ok(orders)
    }

    async fn order_items_read(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        let rows = self
            .api
            .select(
                "order_items",
                &[
                    ("select", "*".to_string()),
                    ("order_id", format!("eq.{order_id}")),
                ],
            )
            .await?;
        let item_rows: Vec<OrderItemRow> = Self::parse_rows(rows, "order item")?;
        Ok(item_rows.into_iter().map(OrderItemRow::into_item).collect())
    }

    async fn order_insert(&self, order: &Order) -> Result<()> {
        let row = OrderRow::from_order(order);
        let body = serde_json::to_value(vec![row])
            .map_err(|e| PosError::validation(format!("serialize order: {e}")))?;
        self.api.insert("orders", &body).await?;
        Ok(())
    }

    async fn order_replace(&self, order: &Order) -> Result<()> {
        // Full-row semantics: everything but the immutable id/created_at.
        let body = serde_json::json!({
            "customer_id": order.customer_id,
            "customer_name": order.customer_name,
            "customer_phone": order.customer_phone,
            "address_id": order.address_id,
            "delivery_address": order.delivery_address,
            "store_id": order.store_id,
            "store_name": order.store_name,
            "total_amount": order.total_amount,
            "vat_amount": order.vat_amount,
            "delivery_fee": order.delivery_fee,
            "status": order.status,
            "payment_method": order.payment_method,
            "updated_at": order.updated_at,
        });
        self.api
            .update("orders", &[("id", format!("eq.{}", order.id))], &body)
            .await?;
        Ok(())
    }

    async fn order_items_delete_all(&self, order_id: &str) -> Result<()> {
        self.api
            .delete("order_items", &[("order_id", format!("eq.{order_id}"))])
            .await
    }

    async fn order_items_insert(&self, order_id: &str, items: &[OrderItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let rows: Vec<OrderItemRow> = items
            .iter()
            .map(|item| OrderItemRow::from_item(order_id, item))
            .collect();
        let body = serde_json::to_value(rows)
            .map_err(|e| PosError::validation(format!("serialize order items: {e}")))?;
        self.api.insert("order_items", &body).await?;
        Ok(())
    }

    async fn order_status_update(
        &self,
        order_id: &str,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<usize> {
        let body = serde_json::json!({
            "status": status,
            "updated_at": updated_at,
        });
        let rows = self
            .api
            .update("orders", &[("id", format!("eq.{order_id}"))], &body)
            .await?;
        Ok(rows.as_array().map(|arr| arr.len()).unwrap_or(0))
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_row_deserializes_string_numerics() {
        let row: OrderRow = serde_json::from_value(serde_json::json!({
            "id": "order-1",
            "customer_id": "cust-1",
            "customer_name": "Ava",
            "customer_phone": "0101234567",
            "address_id": "addr-1",
            "delivery_address": "12 Nile St, Cairo, 11511",
            "store_id": "store-1",
            "store_name": "Downtown",
            "total_amount": "20.50",
            "vat_amount": 2.87,
            "delivery_fee": null,
            "status": "Order Received",
            "payment_method": "cash",
            "created_at": "2026-08-01T10:00:00+00:00",
            "updated_at": "2026-08-01T10:00:00+00:00"
        }))
        .expect("row should deserialize");
        assert_eq!(row.total_amount, 20.5);
        assert_eq!(row.vat_amount, Some(2.87));
        assert_eq!(row.delivery_fee, None);
        assert_eq!(row.status, OrderStatus::OrderReceived);
    }

    #[test]
    fn item_row_round_trips_discount() {
        let item = OrderItem {
            id: "item-1".into(),
            product_id: "prod-1".into(),
            product_name: "Margherita".into(),
            quantity: 2,
            price: 10.0,
            notes: Some("extra basil".into()),
            discount: Some(15.0),
        };
        let row = OrderItemRow::from_item("order-1", &item);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["order_id"], "order-1");
        let back: OrderItemRow = serde_json::from_value(json).unwrap();
        assert_eq!(back.into_item(), item);
    }
}
