//! Management dashboard aggregation.
//!
//! Pure read-side projections over the order list: headline counters with a
//! trailing-period comparison, a per-day series for the trend chart, and a
//! status breakdown. Nothing here caches or mutates; callers recompute from
//! the entity store whenever it changes.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::types::{Order, OrderStatus};

/// Store selector for the dashboard filters. `All` is the "all stores"
/// sentinel in the UI dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFilter {
    All,
    Store(String),
}

impl StoreFilter {
    fn matches(&self, order: &Order) -> bool {
        match self {
            StoreFilter::All => true,
            StoreFilter::Store(id) => order.store_id == *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderMetrics {
    pub total_orders: usize,
    /// Orders in any of the five not-yet-delivered statuses.
    pub open_orders: usize,
    pub delivered_orders: usize,
    pub total_revenue: f64,
    /// 0.0 when the filtered set is empty.
    pub avg_order_value: f64,
    /// Percentage vs the preceding window; 0.0 when that window had no
    /// revenue (never NaN or infinite).
    pub revenue_change: f64,
    pub orders_change: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    /// Chart label, e.g. "Aug 07".
    pub label: String,
    pub orders: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub metrics: OrderMetrics,
    /// Count per status actually present in range; zero-count statuses are
    /// omitted, not zero-filled.
    pub status_distribution: Vec<(OrderStatus, usize)>,
    /// One bucket per calendar day, oldest first, zero-filled.
    pub daily_orders: Vec<DailyPoint>,
}

fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// Aggregate the dashboard view for the window `[now - range_days, now]`,
/// compared against the window of equal length immediately before it.
pub fn aggregate(
    orders: &[Order],
    store_filter: &StoreFilter,
    range_days: i64,
    now: DateTime<Utc>,
) -> DashboardSnapshot {
    let cutoff = now - Duration::days(range_days);
    let previous_cutoff = now - Duration::days(range_days * 2);

    let current: Vec<&Order> = orders
        .iter()
        .filter(|o| store_filter.matches(o) && o.created_at >= cutoff)
        .collect();
    let previous: Vec<&Order> = orders
        .iter()
        .filter(|o| {
            store_filter.matches(o) && o.created_at >= previous_cutoff && o.created_at < cutoff
        })
        .collect();

    let mut open_orders = 0;
    let mut delivered_orders = 0;
    let mut total_revenue = 0.0;
    let mut status_counts: Vec<(OrderStatus, usize)> = Vec::new();
    for order in &current {
        total_revenue += order.total_amount;
        if order.status.is_open() {
            open_orders += 1;
        } else {
            delivered_orders += 1;
        }
        match status_counts.iter_mut().find(|(s, _)| *s == order.status) {
            Some((_, count)) => *count += 1,
            None => status_counts.push((order.status, 1)),
        }
    }
    // Stable presentation order for the pie chart.
    status_counts.sort_by_key(|(status, _)| {
        OrderStatus::ALL.iter().position(|s| s == status).unwrap_or(0)
    });

    let total_orders = current.len();
    let avg_order_value = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };
    let previous_revenue: f64 = previous.iter().map(|o| o.total_amount).sum();

    let metrics = OrderMetrics {
        total_orders,
        open_orders,
        delivered_orders,
        total_revenue,
        avg_order_value,
        revenue_change: percentage_change(total_revenue, previous_revenue),
        orders_change: percentage_change(total_orders as f64, previous.len() as f64),
    };

    let today = now.date_naive();
    let mut daily_orders: Vec<DailyPoint> = (0..range_days)
        .rev()
        .map(|i| {
            let date = today - Duration::days(i);
            DailyPoint {
                date,
                label: date.format("%b %d").to_string(),
                orders: 0,
                revenue: 0.0,
            }
        })
        .collect();
    for order in &current {
        let day = order.created_at.date_naive();
        if let Some(point) = daily_orders.iter_mut().find(|p| p.date == day) {
            point.orders += 1;
            point.revenue += order.total_amount;
        }
    }

    DashboardSnapshot {
        metrics,
        status_distribution: status_counts,
        daily_orders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::sample_order;

    fn order_at(
        id: &str,
        status: OrderStatus,
        store_id: &str,
        created_at: DateTime<Utc>,
        amount: f64,
    ) -> Order {
        let mut order = sample_order(id, status);
        order.store_id = store_id.to_string();
        order.created_at = created_at;
        order.total_amount = amount;
        order
    }

    #[test]
    fn empty_set_has_zero_average_and_zero_changes() {
        let snapshot = aggregate(&[], &StoreFilter::All, 7, Utc::now());
        assert_eq!(snapshot.metrics.avg_order_value, 0.0);
        assert_eq!(snapshot.metrics.revenue_change, 0.0);
        assert_eq!(snapshot.metrics.orders_change, 0.0);
        assert!(snapshot.status_distribution.is_empty());
        assert_eq!(snapshot.daily_orders.len(), 7);
        assert!(snapshot.daily_orders.iter().all(|p| p.orders == 0));
    }

    #[test]
    fn seven_day_window_buckets_revenue_by_calendar_day() {
        let now = Utc::now();
        let orders = vec![
            order_at(
                "o1",
                OrderStatus::OrderReceived,
                "store-1",
                now - Duration::days(1),
                10.0,
            ),
            order_at(
                "o2",
                OrderStatus::OrderDelivered,
                "store-1",
                now - Duration::days(3),
                15.0,
            ),
        ];

        let snapshot = aggregate(&orders, &StoreFilter::All, 7, now);
        assert_eq!(snapshot.metrics.total_orders, 2);
        assert_eq!(snapshot.metrics.total_revenue, 25.0);
        assert_eq!(snapshot.metrics.avg_order_value, 12.5);
        assert_eq!(snapshot.metrics.open_orders, 1);
        assert_eq!(snapshot.metrics.delivered_orders, 1);

        let busy: Vec<&DailyPoint> = snapshot
            .daily_orders
            .iter()
            .filter(|p| p.orders > 0)
            .collect();
        assert_eq!(busy.len(), 2);
        assert_eq!(busy[0].date, (now - Duration::days(3)).date_naive());
        assert_eq!(busy[0].revenue, 15.0);
        assert_eq!(busy[1].date, (now - Duration::days(1)).date_naive());
        assert_eq!(busy[1].revenue, 10.0);
    }

    #[test]
    fn store_filter_restricts_every_output() {
        let now = Utc::now();
        let orders = vec![
            order_at("o1", OrderStatus::OrderReceived, "store-1", now, 10.0),
            order_at("o2", OrderStatus::OrderReceived, "store-2", now, 99.0),
        ];
        let snapshot = aggregate(
            &orders,
            &StoreFilter::Store("store-1".into()),
            7,
            now,
        );
        assert_eq!(snapshot.metrics.total_orders, 1);
        assert_eq!(snapshot.metrics.total_revenue, 10.0);
    }

    #[test]
    fn trailing_comparison_uses_the_immediately_preceding_window() {
        let now = Utc::now();
        let orders = vec![
            // Current 7-day window: 2 orders, 30 revenue.
            order_at("c1", OrderStatus::OrderReceived, "s", now - Duration::days(1), 10.0),
            order_at("c2", OrderStatus::OrderReceived, "s", now - Duration::days(2), 20.0),
            // Preceding window: 1 order, 15 revenue.
            order_at("p1", OrderStatus::OrderDelivered, "s", now - Duration::days(9), 15.0),
            // Older than both windows: ignored.
            order_at("x1", OrderStatus::OrderDelivered, "s", now - Duration::days(30), 500.0),
        ];
        let snapshot = aggregate(&orders, &StoreFilter::All, 7, now);
        assert_eq!(snapshot.metrics.orders_change, 100.0);
        assert_eq!(snapshot.metrics.revenue_change, 100.0);
    }

    #[test]
    fn zero_previous_window_reports_zero_change_not_nan() {
        let now = Utc::now();
        let orders = vec![order_at(
            "c1",
            OrderStatus::OrderReceived,
            "s",
            now - Duration::days(1),
            40.0,
        )];
        let snapshot = aggregate(&orders, &StoreFilter::All, 7, now);
        assert_eq!(snapshot.metrics.revenue_change, 0.0);
        assert_eq!(snapshot.metrics.orders_change, 0.0);
        assert!(snapshot.metrics.revenue_change.is_finite());
    }

    #[test]
    fn status_distribution_omits_absent_statuses() {
        let now = Utc::now();
        let orders = vec![
            order_at("o1", OrderStatus::OrderReceived, "s", now, 1.0),
            order_at("o2", OrderStatus::OrderReceived, "s", now, 1.0),
            order_at("o3", OrderStatus::InvoicePrinted, "s", now, 1.0),
        ];
        let snapshot = aggregate(&orders, &StoreFilter::All, 7, now);
        assert_eq!(
            snapshot.status_distribution,
            vec![
                (OrderStatus::OrderReceived, 2),
                (OrderStatus::InvoicePrinted, 1),
            ]
        );
    }
}
