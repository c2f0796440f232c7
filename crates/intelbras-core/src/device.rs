// ── Device context ──
//
// Per-connection owner of the HTTP client, the event coordinator and the
// cached door state. Hosts hold one `Device` per configured controller;
// there is no process-wide registry.

use std::sync::Arc;

use intelbras_api::{DeviceClient, DeviceInfo};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::coordinator::{EventCoordinator, PollOutcome};
use crate::error::CoreError;
use crate::model::{AccessEvent, DoorState, EventRecord};

/// Handle to one access controller.
///
/// Cheaply cloneable via `Arc<DeviceInner>`. Door commands may run while
/// a poll cycle is in flight; they share only the immutable credentials.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    config: DeviceConfig,
    client: Arc<DeviceClient>,
    coordinator: Arc<EventCoordinator>,
    door_state: watch::Sender<Option<DoorState>>,
    cancel: CancellationToken,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Device {
    /// Validate `config` and build the client. Does not contact the
    /// device; call [`start()`](Self::start) to begin polling.
    pub fn new(config: DeviceConfig) -> Result<Self, CoreError> {
        config.validate()?;

        let client = DeviceClient::new(
            config.url.clone(),
            config.credentials(),
            &config.transport(),
        )?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Build a device around an existing client.
    pub fn with_client(config: DeviceConfig, client: Arc<DeviceClient>) -> Self {
        let coordinator = Arc::new(EventCoordinator::new(Arc::clone(&client), &config));
        let (door_state, _) = watch::channel(None);

        Self {
            inner: Arc::new(DeviceInner {
                config,
                client,
                coordinator,
                door_state,
                cancel: CancellationToken::new(),
                poll_task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &Arc<DeviceClient> {
        &self.inner.client
    }

    pub fn coordinator(&self) -> &Arc<EventCoordinator> {
        &self.inner.coordinator
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the background poll task. Calling it twice is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }

        let mut task = self.inner.poll_task.lock().await;
        if task.is_some() {
            debug!("event polling already running");
            return Ok(());
        }

        let coordinator = Arc::clone(&self.inner.coordinator);
        let cancel = self.inner.cancel.clone();
        *task = Some(tokio::spawn(coordinator.run(cancel)));

        info!(
            device = %self.inner.coordinator.device_id(),
            interval_secs = self.inner.config.poll_interval_secs,
            "event polling started"
        );
        Ok(())
    }

    /// Stop polling and wait for the background task to exit.
    ///
    /// A stopped device cannot be restarted.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.poll_task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "event poll task ended abnormally");
            }
        }
        debug!("device stopped");
    }

    // ── Events ───────────────────────────────────────────────────

    /// Subscribe to newly observed access events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<AccessEvent>> {
        self.inner.coordinator.subscribe()
    }

    /// Run a poll cycle now, outside the timer.
    pub async fn refresh_events(&self) -> Result<PollOutcome, CoreError> {
        self.ensure_running()?;
        self.inner.coordinator.poll_once().await
    }

    /// Records from the last successful poll cycle.
    pub fn last_events(&self) -> Arc<Vec<EventRecord>> {
        self.inner.coordinator.last_events()
    }

    // ── Door ─────────────────────────────────────────────────────

    /// Trigger the door relay on the configured channel.
    pub async fn open_door(&self) -> Result<String, CoreError> {
        self.ensure_running()?;
        let channel = self.inner.config.channel;
        let response = self.inner.client.open_door(channel).await?;
        info!(channel, "door open requested");
        Ok(response)
    }

    /// Query the door sensor and update the cached state.
    ///
    /// On failure the cache keeps its previous value.
    pub async fn door_state(&self) -> Result<DoorState, CoreError> {
        self.ensure_running()?;
        let status = self
            .inner
            .client
            .door_status(self.inner.config.channel)
            .await?;
        let state = DoorState::from_status(&status);
        self.inner.door_state.send_if_modified(|current| {
            if current.as_ref() == Some(&state) {
                return false;
            }
            *current = Some(state.clone());
            true
        });
        Ok(state)
    }

    /// Last successfully read door state, if any.
    pub fn last_door_state(&self) -> Option<DoorState> {
        self.inner.door_state.borrow().clone()
    }

    /// Watch door state changes observed by [`door_state()`](Self::door_state).
    pub fn door_state_changes(&self) -> watch::Receiver<Option<DoorState>> {
        self.inner.door_state.subscribe()
    }

    // ── Diagnostics ──────────────────────────────────────────────

    pub async fn device_info(&self) -> Result<DeviceInfo, CoreError> {
        self.ensure_running()?;
        Ok(self.inner.client.device_info().await?)
    }

    pub async fn test_connection(&self) -> bool {
        self.inner.client.test_connection().await
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }
        Ok(())
    }
}
