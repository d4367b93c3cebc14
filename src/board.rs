//! Order board projection and drag reconciliation.
//!
//! The board is a pure derivation of the entity store: list mode filters on a
//! single status, kanban mode partitions the full list into the six fixed
//! status columns. Partitions are recomputed from scratch after every store
//! change instead of being invalidated incrementally, which removes the stale
//! view bug class outright at a recomputation cost that is negligible for a
//! single location's order volume.
//!
//! Drags apply optimistically: the partition is updated synchronously so the
//! card lands where the operator dropped it, then the status change goes
//! through the update protocol. A remote failure does not move the card back;
//! the status write is idempotent and the next refetch reconciles the board.

use tracing::debug;

use crate::error::Result;
use crate::orders::OrderService;
use crate::remote::OrderBackend;
use crate::types::{Order, OrderStatus};

// ---------------------------------------------------------------------------
// List mode
// ---------------------------------------------------------------------------

/// Tab selector for the flat list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSelector {
    All,
    Only(OrderStatus),
}

/// Flat view: everything, or an exact status match. No other grouping.
pub fn filter_orders(orders: &[Order], selector: StatusSelector) -> Vec<Order> {
    orders
        .iter()
        .filter(|order| match selector {
            StatusSelector::All => true,
            StatusSelector::Only(status) => order.status == status,
        })
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Kanban partition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn {
    pub status: OrderStatus,
    pub orders: Vec<Order>,
}

/// The six status columns in display order. A view, never a source of truth.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardPartition {
    columns: Vec<BoardColumn>,
}

/// A card location: column plus position within the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSlot {
    pub status: OrderStatus,
    pub index: usize,
}

/// The end of a drag gesture. `destination` is `None` when the card was
/// dropped outside every column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropEvent {
    pub source: CardSlot,
    pub destination: Option<CardSlot>,
}

impl BoardPartition {
    /// Partition the order list into the six fixed buckets by exact status
    /// match, preserving each order's position as encountered in the source
    /// list (stable, no re-sort).
    pub fn project(orders: &[Order]) -> Self {
        let columns = OrderStatus::ALL
            .into_iter()
            .map(|status| BoardColumn {
                status,
                orders: orders
                    .iter()
                    .filter(|order| order.status == status)
                    .cloned()
                    .collect(),
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[BoardColumn] {
        &self.columns
    }

    pub fn column(&self, status: OrderStatus) -> &BoardColumn {
        // OrderStatus::ALL drives construction, so every status has a column.
        self.columns
            .iter()
            .find(|c| c.status == status)
            .expect("partition always has all six columns")
    }

    fn column_mut(&mut self, status: OrderStatus) -> &mut BoardColumn {
        self.columns
            .iter_mut()
            .find(|c| c.status == status)
            .expect("partition always has all six columns")
    }

    /// Total cards across all columns.
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.orders.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a drag move: remove the card at `source`, stamp it with the
    /// destination column's status, and insert it at the destination index
    /// (clamped to the column length after removal). Returns the moved order,
    /// or `None` for the no-op cases: same column and same position, or a
    /// source index that no longer exists.
    pub fn move_card(&mut self, source: CardSlot, destination: CardSlot) -> Option<Order> {
        if source.status == destination.status && source.index == destination.index {
            return None;
        }
        let source_column = self.column_mut(source.status);
        if source.index >= source_column.orders.len() {
            return None;
        }

        let mut moved = source_column.orders.remove(source.index);
        moved.status = destination.status;

        let destination_column = self.column_mut(destination.status);
        let insert_at = destination.index.min(destination_column.orders.len());
        destination_column.orders.insert(insert_at, moved.clone());
        Some(moved)
    }
}

// ---------------------------------------------------------------------------
// Drag reconciliation
// ---------------------------------------------------------------------------

/// Reconcile a drop gesture against the entity store.
///
/// Policy: optimistic apply, reconcile on next refetch, no compensating
/// action on failure. The partition reflects the move before the remote
/// round-trip, and is deliberately left as-is when the status write fails;
/// the caller still sees the error (and the failure notification fires) so
/// the operator knows the move did not stick remotely.
pub async fn handle_drop<B: OrderBackend>(
    service: &OrderService<B>,
    partition: &mut BoardPartition,
    event: DropEvent,
) -> Result<()> {
    let Some(destination) = event.destination else {
        return Ok(());
    };
    let Some(moved) = partition.move_card(event.source, destination) else {
        return Ok(());
    };

    debug!(
        order_id = %moved.id,
        from = %event.source.status,
        to = %destination.status,
        "board card moved"
    );
    service.notifier().success(format!(
        "Order #{} moved to {}",
        moved.short_id(),
        destination.status
    ));

    service.set_status(&moved.id, destination.status).await
}
