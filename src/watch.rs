//! Remote change feed for the order tables.
//!
//! The browser app subscribed to the hosted store's realtime channel; here
//! the feed is a background poll of the `orders` table (latest `updated_at`
//! plus row count). Whatever the transport, the contract is the same: any
//! remote change triggers a full entity-store refetch, which the management
//! dashboard uses for live updates.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::SupabaseClient;
use crate::error::Result;
use crate::orders::OrderService;
use crate::remote::SupabaseOrders;
use crate::value_str;

/// Snapshot of the remote table used to detect activity between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrdersProbe {
    pub latest_update: Option<String>,
    pub row_count: i64,
}

pub(crate) fn probe_changed(previous: Option<&OrdersProbe>, next: &OrdersProbe) -> bool {
    match previous {
        // The first probe only establishes the baseline; the store was
        // already loaded at startup.
        None => false,
        Some(prev) => prev != next,
    }
}

async fn probe_orders(api: &SupabaseClient) -> Result<OrdersProbe> {
    let rows = api
        .select(
            "orders",
            &[
                ("select", "updated_at".to_string()),
                ("order", "updated_at.desc".to_string()),
                ("limit", "1".to_string()),
            ],
        )
        .await?;
    let latest_update = rows
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|row| value_str(row, &["updated_at"]));
    let row_count = api.count("orders", &[]).await?;
    Ok(OrdersProbe {
        latest_update,
        row_count,
    })
}

/// Start the background order watcher. Polls every `interval_secs` and
/// refetches the full order list whenever the probe changes. Returns the
/// cancellation token and the task handle for shutdown.
pub fn start_order_watcher(
    service: Arc<OrderService<SupabaseOrders>>,
    api: SupabaseClient,
    interval_secs: u64,
) -> (CancellationToken, JoinHandle<()>) {
    let token = CancellationToken::new();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        info!("order watcher started (interval: {interval_secs}s)");
        let mut last_probe: Option<OrdersProbe> = None;

        loop {
            tokio::select! {
                _ = task_token.cancelled() => {
                    info!("order watcher stopped");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
            }

            let next = match probe_orders(&api).await {
                Ok(probe) => probe,
                Err(e) => {
                    warn!(error = %e, "order change probe failed");
                    continue;
                }
            };

            if probe_changed(last_probe.as_ref(), &next) {
                info!(
                    row_count = next.row_count,
                    "remote order activity detected, refetching"
                );
                if let Err(e) = service.refresh().await {
                    warn!(error = %e, "order refetch after remote change failed");
                    // Keep the stale baseline so the next tick retries.
                    continue;
                }
            } else {
                debug!("order probe unchanged");
            }
            last_probe = Some(next);
        }
    });

    (token, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(latest: Option<&str>, count: i64) -> OrdersProbe {
        OrdersProbe {
            latest_update: latest.map(|s| s.to_string()),
            row_count: count,
        }
    }

    #[test]
    fn first_probe_only_sets_the_baseline() {
        assert!(!probe_changed(None, &probe(Some("2026-08-01T10:00:00"), 3)));
    }

    #[test]
    fn newer_update_or_row_count_counts_as_change() {
        let baseline = probe(Some("2026-08-01T10:00:00"), 3);
        assert!(!probe_changed(Some(&baseline), &baseline.clone()));
        assert!(probe_changed(
            Some(&baseline),
            &probe(Some("2026-08-01T10:05:00"), 3)
        ));
        assert!(probe_changed(
            Some(&baseline),
            &probe(Some("2026-08-01T10:00:00"), 4)
        ));
    }

    #[test]
    fn empty_table_baseline_detects_the_first_order() {
        let baseline = probe(None, 0);
        assert!(probe_changed(
            Some(&baseline),
            &probe(Some("2026-08-01T10:00:00"), 1)
        ));
    }
}
