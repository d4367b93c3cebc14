//! Order entity store and update protocol.
//!
//! A single [`OrderService`] owns the canonical in-memory order list for the
//! session; every other component reads orders from here and nowhere else.
//! All mutations write to the hosted store first and only touch the local
//! list on success, so a remote failure always leaves the prior local state
//! intact. There is no versioning or compare-and-swap: two overlapping
//! updates to the same order resolve last-writer-wins, which matches the
//! staff workflow this system serves.

use chrono::Utc;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::{PosError, Result};
use crate::notify::Notifier;
use crate::remote::OrderBackend;
use crate::types::{Order, OrderStatus};

pub struct OrderService<B> {
    backend: B,
    notifier: Notifier,
    // Held only for the in-memory splice, never across a network await.
    orders: Mutex<Vec<Order>>,
}

impl<B: OrderBackend> OrderService<B> {
    pub fn new(backend: B, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            orders: Mutex::new(Vec::new()),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    // The list is a cache of remote state; a writer that panicked mid-splice
    // cannot leave a Vec half-replaced, so poisoning is recoverable.
    fn orders_guard(&self) -> std::sync::MutexGuard<'_, Vec<Order>> {
        self.orders.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Populate the canonical list from the hosted store. Called once at
    /// startup and again whenever the change feed reports remote activity.
    pub async fn load(&self) -> Result<usize> {
        let fetched = match self.backend.orders_read().await {
            Ok(orders) => orders,
            Err(e) => {
                self.notifier.error("Failed to load data");
                return Err(e);
            }
        };
        let count = fetched.len();
        *self.orders_guard() = fetched;
        info!(count, "order list loaded from hosted store");
        Ok(count)
    }

    /// Full refetch, same contract as [`load`](Self::load).
    pub async fn refresh(&self) -> Result<usize> {
        self.load().await
    }

    /// Snapshot of the canonical list, most-recent-first.
    pub fn list(&self) -> Vec<Order> {
        self.orders_guard().clone()
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders_guard()
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    /// Upsert an order: remote write first, local list second.
    ///
    /// Existing orders take the replace path (full-row update plus a
    /// delete-then-reinsert of every item row - not a diff), and are gated on
    /// the stored status: once the store has started working on an order its
    /// items and payment method are frozen. New orders are inserted remotely
    /// and prepended locally so the list stays most-recent-first.
    ///
    /// The row write and the item rewrite are separate REST calls; a failure
    /// between them leaves the two remote tables inconsistent until the next
    /// successful save.
    pub async fn save_order(&self, mut order: Order) -> Result<Order> {
        order.recompute_totals();
        order.updated_at = Utc::now();

        let existing = self.get(&order.id);
        if let Some(existing) = &existing {
            if !existing.status.allows_content_edits() {
                let message = format!("Cannot edit order with status: {}", existing.status);
                self.notifier.error(message.clone());
                return Err(PosError::validation(message));
            }
        }

        let remote = async {
            if existing.is_some() {
                self.backend.order_replace(&order).await?;
                self.backend.order_items_delete_all(&order.id).await?;
            } else {
                self.backend.order_insert(&order).await?;
            }
            self.backend.order_items_insert(&order.id, &order.items).await
        };
        if let Err(e) = remote.await {
            warn!(order_id = %order.id, error = %e, "order save failed");
            self.notifier.error("Failed to save order");
            return Err(e);
        }

        {
            let mut orders = self.orders_guard();
            match orders.iter_mut().find(|o| o.id == order.id) {
                Some(slot) => *slot = order.clone(),
                None => orders.insert(0, order.clone()),
            }
        }

        if existing.is_some() {
            self.notifier
                .success(format!("Order #{} updated successfully", order.short_id()));
        } else {
            self.notifier
                .success(format!("Order #{} created successfully", order.short_id()));
        }
        Ok(order)
    }

    /// Set an order's status, any-to-any. Remote update first; the matching
    /// local entry is patched in place (list position unperturbed) on
    /// success. An id that is unknown locally is ignored, but a remote update
    /// that matched zero rows is logged since it points at a drifted cache.
    pub async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<()> {
        let now = Utc::now();
        match self.backend.order_status_update(order_id, status, now).await {
            Ok(0) => {
                warn!(order_id, status = %status, "status update matched no remote rows");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(order_id, error = %e, "order status update failed");
                self.notifier.error("Failed to update order status");
                return Err(e);
            }
        }

        {
            let mut orders = self.orders_guard();
            if let Some(order) = orders.iter_mut().find(|o| o.id == order_id) {
                order.status = status;
                order.updated_at = now;
            }
        }

        self.notifier
            .success(format!("Order status updated to {status}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Severity;
    use crate::remote::testing::{sample_item, sample_order, MemoryBackend};

    fn service_with(orders: Vec<Order>) -> OrderService<MemoryBackend> {
        OrderService::new(MemoryBackend::with_orders(orders), Notifier::new())
    }

    #[tokio::test]
    async fn load_populates_the_canonical_list() {
        let service = service_with(vec![
            sample_order("order-1", OrderStatus::OrderReceived),
            sample_order("order-2", OrderStatus::OrderDelivered),
        ]);
        let count = service.load().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(service.list().len(), 2);
        assert!(service.get("order-2").is_some());
    }

    #[tokio::test]
    async fn save_order_prepends_new_orders_and_acknowledges_created() {
        let service = service_with(vec![sample_order("order-old", OrderStatus::OrderStarted)]);
        service.load().await.unwrap();
        let mut rx = service.notifier().subscribe();

        let saved = service
            .save_order(sample_order("order-new", OrderStatus::OrderReceived))
            .await
            .unwrap();
        assert_eq!(saved.total_amount, 20.0);

        let list = service.list();
        assert_eq!(list[0].id, "order-new");
        assert_eq!(list[1].id, "order-old");

        let note = rx.try_recv().unwrap();
        assert_eq!(note.severity, Severity::Success);
        assert!(note.message.contains("created"));
    }

    #[tokio::test]
    async fn save_order_replaces_in_place_and_acknowledges_updated() {
        let service = service_with(vec![
            sample_order("order-1", OrderStatus::OrderReceived),
            sample_order("order-2", OrderStatus::StoreReceived),
        ]);
        service.load().await.unwrap();
        let mut rx = service.notifier().subscribe();

        let mut edited = service.get("order-2").unwrap();
        edited.items.push(sample_item("Pepsi", 3.0, 2));
        let saved = service.save_order(edited).await.unwrap();
        assert_eq!(saved.total_amount, 26.0);

        // Position preserved: the edited order is still second.
        let list = service.list();
        assert_eq!(list[0].id, "order-1");
        assert_eq!(list[1].id, "order-2");
        assert_eq!(list[1].items.len(), 2);

        let note = rx.try_recv().unwrap();
        assert!(note.message.contains("updated"));
    }

    #[tokio::test]
    async fn save_order_rewrites_items_with_delete_then_reinsert() {
        let service = service_with(vec![sample_order("order-1", OrderStatus::OrderReceived)]);
        service.load().await.unwrap();

        let edited = service.get("order-1").unwrap();
        service.save_order(edited).await.unwrap();

        assert_eq!(
            service.backend().call_log(),
            vec![
                "orders_read",
                "order_replace",
                "order_items_delete_all",
                "order_items_insert"
            ]
        );
    }

    #[tokio::test]
    async fn edit_gate_rejects_started_orders_before_any_remote_call() {
        let service = service_with(vec![sample_order("order-1", OrderStatus::OrderStarted)]);
        service.load().await.unwrap();
        let before = service.get("order-1").unwrap();
        let mut rx = service.notifier().subscribe();

        let mut edited = before.clone();
        edited.items.push(sample_item("Fries", 4.0, 1));
        let err = service.save_order(edited).await.unwrap_err();
        assert!(matches!(err, PosError::Validation(_)));
        assert!(err.to_string().contains("Order Started"));

        // Items byte-for-byte unchanged, and nothing hit the backend.
        assert_eq!(service.get("order-1").unwrap().items, before.items);
        assert_eq!(service.backend().call_log(), vec!["orders_read"]);
        assert_eq!(rx.try_recv().unwrap().severity, Severity::Error);
    }

    #[tokio::test]
    async fn remote_failure_leaves_local_state_untouched_and_propagates() {
        let service = service_with(vec![sample_order("order-1", OrderStatus::OrderReceived)]);
        service.load().await.unwrap();
        let before = service.list();
        let mut rx = service.notifier().subscribe();

        service.backend().arm_failure("connection reset");
        let err = service
            .save_order(sample_order("order-2", OrderStatus::OrderReceived))
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Remote(_)));
        assert_eq!(service.list(), before);
        assert_eq!(rx.try_recv().unwrap().severity, Severity::Error);
    }

    #[tokio::test]
    async fn set_status_updates_status_and_timestamp_in_place() {
        let service = service_with(vec![
            sample_order("order-1", OrderStatus::OrderReceived),
            sample_order("order-2", OrderStatus::OrderReceived),
        ]);
        service.load().await.unwrap();
        let before = service.get("order-1").unwrap();

        service
            .set_status("order-1", OrderStatus::StoreReceived)
            .await
            .unwrap();

        let after = service.get("order-1").unwrap();
        assert_eq!(after.status, OrderStatus::StoreReceived);
        assert!(after.updated_at >= before.updated_at);
        // List order unperturbed.
        assert_eq!(service.list()[0].id, "order-1");
    }

    #[tokio::test]
    async fn set_status_twice_is_idempotent_aside_from_updated_at() {
        let service = service_with(vec![sample_order("order-1", OrderStatus::OrderReceived)]);
        service.load().await.unwrap();

        service
            .set_status("order-1", OrderStatus::InvoicePrinted)
            .await
            .unwrap();
        let first = service.get("order-1").unwrap();
        service
            .set_status("order-1", OrderStatus::InvoicePrinted)
            .await
            .unwrap();
        let second = service.get("order-1").unwrap();

        let mut first_neutral = first.clone();
        first_neutral.updated_at = second.updated_at;
        assert_eq!(first_neutral, second);
    }

    #[tokio::test]
    async fn set_status_on_unknown_id_is_silently_ignored() {
        let service = service_with(vec![sample_order("order-1", OrderStatus::OrderReceived)]);
        service.load().await.unwrap();
        let before = service.list();

        service
            .set_status("order-ghost", OrderStatus::OrderDelivered)
            .await
            .unwrap();
        assert_eq!(service.list(), before);
    }

    #[tokio::test]
    async fn set_status_remote_failure_keeps_prior_status() {
        let service = service_with(vec![sample_order("order-1", OrderStatus::OrderReceived)]);
        service.load().await.unwrap();

        service.backend().arm_failure("gateway timeout");
        let err = service
            .set_status("order-1", OrderStatus::OrderDelivered)
            .await
            .unwrap_err();
        assert!(matches!(err, PosError::Remote(_)));
        assert_eq!(
            service.get("order-1").unwrap().status,
            OrderStatus::OrderReceived
        );
    }

    #[tokio::test]
    async fn save_then_read_returns_the_new_fields() {
        let service = service_with(vec![]);
        service.load().await.unwrap();

        let mut order = sample_order("order-1", OrderStatus::OrderReceived);
        order.items = vec![sample_item("Margherita", 10.0, 2)];
        service.save_order(order).await.unwrap();

        let read_back = service.get("order-1").unwrap();
        assert_eq!(read_back.total_amount, 20.0);
        assert_eq!(read_back.items.len(), 1);
    }
}
