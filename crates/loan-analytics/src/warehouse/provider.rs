use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};

use super::WarehouseClient;
use crate::config::WarehouseConfig;
use crate::{Error, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Age after which the shared handle is closed and recreated
pub const DEFAULT_CONNECTION_MAX_AGE: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct Session<H> {
    handle: Arc<H>,
    created_at: Instant,
}

/// Owner of the single, lazily created warehouse handle
///
/// Reads of an established handle are lock-free; creation, recycling and
/// teardown are serialized by one async lock and re-checked after acquiring
/// it. Every handle taken out of service is passed to
/// [`WarehouseClient::close`].
#[derive(Debug)]
pub struct ConnectionProvider<W: WarehouseClient> {
    client: Arc<W>,
    config: WarehouseConfig,
    session: ArcSwapOption<Session<W::Handle>>,
    init_lock: Mutex<()>,
    connect_timeout: Duration,
    ping_timeout: Duration,
    max_age: Duration,
}

impl<W: WarehouseClient> ConnectionProvider<W> {
    pub fn new(client: W, config: WarehouseConfig) -> Self {
        Self::with_shared_client(Arc::new(client), config)
    }

    pub fn with_shared_client(client: Arc<W>, config: WarehouseConfig) -> Self {
        Self {
            client,
            config,
            session: ArcSwapOption::empty(),
            init_lock: Mutex::new(()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            max_age: DEFAULT_CONNECTION_MAX_AGE,
        }
    }

    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, ping: Duration) -> Self {
        self.connect_timeout = connect;
        self.ping_timeout = ping;
        self
    }

    /// Recreate the handle once it is older than `max_age`
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn client(&self) -> &W {
        &self.client
    }

    pub const fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Whether a handle is currently established
    pub fn is_connected(&self) -> bool {
        self.session.load().is_some()
    }

    fn is_fresh(&self, session: &Session<W::Handle>) -> bool {
        session.created_at.elapsed() <= self.max_age
    }

    /// Return the shared handle, connecting on first use or once it has aged out
    pub async fn acquire(&self) -> Result<Arc<W::Handle>> {
        if let Some(session) = self.session.load_full()
            && self.is_fresh(&session)
        {
            return Ok(Arc::clone(&session.handle));
        }

        let target = self.config.target()?;

        let _guard = self.init_lock.lock().await;
        if let Some(session) = self.session.load_full() {
            if self.is_fresh(&session) {
                return Ok(Arc::clone(&session.handle));
            }
            self.session.store(None);
            tracing::info!(
                age_secs = session.created_at.elapsed().as_secs(),
                "Recycling SQL warehouse connection"
            );
            self.close_quietly(&session.handle).await;
        }

        tracing::info!(
            host = %target.host,
            warehouse_id = %target.warehouse_id,
            "Connecting to SQL warehouse"
        );
        let handle = timeout(self.connect_timeout, self.client.connect(&target))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs()
                ))
            })??;

        let handle = Arc::new(handle);
        self.session.store(Some(Arc::new(Session {
            handle: Arc::clone(&handle),
            created_at: Instant::now(),
        })));
        Ok(handle)
    }

    /// Ping a handle; any failure or timeout counts as unhealthy
    pub async fn is_healthy(&self, handle: &W::Handle) -> bool {
        match timeout(self.ping_timeout, self.client.ping(handle)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Warehouse health check failed");
                false
            }
            Err(_) => {
                tracing::warn!("Warehouse health check timed out");
                false
            }
        }
    }

    /// Close `stale` and drop it so the next `acquire` reconnects
    ///
    /// No-op if the provider already holds a different handle.
    pub async fn discard(&self, stale: &Arc<W::Handle>) {
        let _guard = self.init_lock.lock().await;
        let current = self.session.load_full();
        if let Some(session) = current
            && Arc::ptr_eq(&session.handle, stale)
        {
            self.session.store(None);
            tracing::debug!("Discarded warehouse handle after connection failure");
            self.close_quietly(&session.handle).await;
        }
    }

    /// Tear the handle down; calling it again is a no-op
    pub async fn release(&self) -> Result<()> {
        let _guard = self.init_lock.lock().await;
        if let Some(session) = self.session.swap(None) {
            tracing::info!("Closing SQL warehouse connection");
            self.client.close(&session.handle).await?;
        }
        Ok(())
    }

    /// Close a handle taken out of service; failures are only logged
    async fn close_quietly(&self, handle: &W::Handle) {
        if let Err(e) = self.client.close(handle).await {
            tracing::warn!(error = %e, "Failed to close retired warehouse handle");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{ScriptedWarehouse, test_warehouse_config};

    #[tokio::test]
    async fn test_acquire_reuses_handle() {
        let provider = ConnectionProvider::new(ScriptedWarehouse::default(), test_warehouse_config());
        let first = provider.acquire().await.unwrap();
        let second = provider.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.client().connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_acquire_connects_once() {
        let provider = Arc::new(ConnectionProvider::new(
            ScriptedWarehouse::default().with_connect_delay(Duration::from_millis(20)),
            test_warehouse_config(),
        ));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.acquire().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(provider.client().connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incomplete_config_is_configuration_error() {
        let provider =
            ConnectionProvider::new(ScriptedWarehouse::default(), WarehouseConfig::default());
        let err = provider.acquire().await.unwrap_err();
        assert!(err.is_config());
        assert_eq!(provider.client().connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_not_cached() {
        let warehouse = ScriptedWarehouse::default();
        warehouse.fail_connects(1);
        let provider = ConnectionProvider::new(warehouse, test_warehouse_config());

        assert!(provider.acquire().await.unwrap_err().is_transient());
        assert!(!provider.is_connected());
        assert!(provider.acquire().await.is_ok());
        assert_eq!(provider.client().connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let provider = ConnectionProvider::new(ScriptedWarehouse::default(), test_warehouse_config());
        provider.acquire().await.unwrap();

        provider.release().await.unwrap();
        provider.release().await.unwrap();

        assert!(!provider.is_connected());
        assert_eq!(provider.client().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discard_forces_reconnect() {
        let provider = ConnectionProvider::new(ScriptedWarehouse::default(), test_warehouse_config());
        let first = provider.acquire().await.unwrap();
        provider.discard(&first).await;
        let second = provider.acquire().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        // a stale discard leaves the new handle alone
        provider.discard(&first).await;
        assert!(provider.is_connected());
        assert_eq!(provider.client().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aged_handle_is_recycled() {
        let provider = ConnectionProvider::new(ScriptedWarehouse::default(), test_warehouse_config());
        let first = provider.acquire().await.unwrap();

        tokio::time::advance(DEFAULT_CONNECTION_MAX_AGE).await;
        let same = provider.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &same), "fresh at exactly max age");

        tokio::time::advance(Duration::from_secs(1)).await;
        let second = provider.acquire().await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(provider.client().connects.load(Ordering::SeqCst), 2);
        assert_eq!(provider.client().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_max_age() {
        let provider = ConnectionProvider::new(ScriptedWarehouse::default(), test_warehouse_config())
            .with_max_age(Duration::from_secs(30));
        provider.acquire().await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        provider.acquire().await.unwrap();

        assert_eq!(provider.client().connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_is_healthy() {
        let provider = ConnectionProvider::new(ScriptedWarehouse::default(), test_warehouse_config());
        let handle = provider.acquire().await.unwrap();
        assert!(provider.is_healthy(&handle).await);

        provider.client().set_unhealthy(true);
        assert!(!provider.is_healthy(&handle).await);
    }
}
