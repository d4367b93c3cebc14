//! Application bootstrap.
//!
//! A single explicit context object wires the services together; nothing in
//! the crate reaches for ambient global state. Construction order mirrors a
//! terminal session: logging, credentials, HTTP client, service objects,
//! initial data load, then the background watcher.

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::SupabaseClient;
use crate::customers::CustomerDirectory;
use crate::notify::Notifier;
use crate::orders::OrderService;
use crate::remote::SupabaseOrders;
use crate::stores::StoreDirectory;
use crate::translations::TranslationService;
use crate::watch;

/// Default poll interval for the remote change feed.
const WATCH_INTERVAL_SECS: u64 = 15;

/// Initialize structured logging (console, plus a daily-rolling file when a
/// log directory is given).
pub fn init_logging(log_dir: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chain_pos=debug"));
    let console_layer = fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).ok();
            let file_appender = tracing_appender::rolling::daily(dir, "pos");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            registry.with(file_layer).init();
            // Dropping the guard flushes logs; the app runs until process
            // exit, so leak it.
            std::mem::forget(guard);
        }
        None => registry.init(),
    }
}

pub struct AppContext {
    pub api: SupabaseClient,
    pub orders: Arc<OrderService<SupabaseOrders>>,
    pub customers: CustomerDirectory,
    pub stores: StoreDirectory,
    pub translations: TranslationService,
    pub notifier: Notifier,
    watcher: Option<(CancellationToken, JoinHandle<()>)>,
}

impl AppContext {
    /// Build the service graph from the stored credentials and perform the
    /// initial order load.
    pub async fn init() -> anyhow::Result<Self> {
        let api = SupabaseClient::from_storage()?;
        let notifier = Notifier::new();
        let orders = Arc::new(OrderService::new(
            SupabaseOrders::new(api.clone()),
            notifier.clone(),
        ));

        let count = orders.load().await?;
        info!(orders = count, "application context ready");

        Ok(Self {
            api: api.clone(),
            orders,
            customers: CustomerDirectory::new(api.clone()),
            stores: StoreDirectory::new(api.clone()),
            translations: TranslationService::new(api),
            notifier,
            watcher: None,
        })
    }

    /// Start the remote change feed with the default interval. Restarting
    /// replaces the previous watcher.
    pub fn start_watcher(&mut self) {
        self.start_watcher_with_interval(WATCH_INTERVAL_SECS);
    }

    pub fn start_watcher_with_interval(&mut self, interval_secs: u64) {
        if let Some((token, _)) = &self.watcher {
            token.cancel();
        }
        let (token, handle) =
            watch::start_order_watcher(self.orders.clone(), self.api.clone(), interval_secs);
        self.watcher = Some((token, handle));
    }

    /// Stop the watcher and wait for it to wind down.
    pub async fn shutdown(mut self) {
        if let Some((token, handle)) = self.watcher.take() {
            token.cancel();
            let _ = handle.await;
        }
        info!("application context shut down");
    }
}
