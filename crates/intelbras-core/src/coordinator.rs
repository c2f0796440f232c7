// ── Event polling coordinator ──
//
// Periodically pulls the access record log for the window since the last
// successful fetch, drops records already seen in the previous cycle,
// and publishes the rest on a broadcast channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use intelbras_api::DeviceClient;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::model::{AccessEvent, EventRecord, EventSignature};
use crate::parser::EventLogParser;

/// Discriminator stamped on every published [`AccessEvent`].
pub const ACCESS_EVENT_TYPE: &str = "intelbras_access_event";

const EVENT_CHANNEL_SIZE: usize = 256;

/// Result of one call to [`EventCoordinator::poll_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cycle ran: `fetched` records parsed, `dispatched` of them new.
    Completed { fetched: usize, dispatched: usize },
    /// Another cycle was already in flight; nothing was done.
    Skipped,
}

struct PollState {
    /// Epoch seconds; start of the next fetch window.
    last_fetch: i64,
    last_events: Arc<Vec<EventRecord>>,
}

/// Owns the polling watermark and the previous cycle's records.
///
/// At most one cycle runs at a time: a tick that arrives while a fetch is
/// in flight is skipped, never queued.
///
/// Duplicate suppression only compares against the immediately preceding
/// cycle. A record returned again two or more cycles later (say, after a
/// device clock change pulls it back into the window) is published again.
pub struct EventCoordinator {
    client: Arc<DeviceClient>,
    device_id: String,
    parser: EventLogParser,
    interval: Duration,
    fetch_timeout: Duration,
    state: Mutex<PollState>,
    event_tx: broadcast::Sender<Arc<AccessEvent>>,
    last_events: watch::Sender<Arc<Vec<EventRecord>>>,
}

impl EventCoordinator {
    /// The first fetch window starts now; earlier records are not replayed.
    pub fn new(client: Arc<DeviceClient>, config: &DeviceConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (last_events, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            client,
            device_id: config.device_id(),
            parser: EventLogParser::lenient(),
            interval: config.poll_interval(),
            fetch_timeout: config.fetch_timeout,
            state: Mutex::new(PollState {
                last_fetch: Utc::now().timestamp(),
                last_events: Arc::new(Vec::new()),
            }),
            event_tx,
            last_events,
        }
    }

    /// Start the first fetch window at `epoch_secs` instead of now.
    #[must_use]
    pub fn starting_at(mut self, epoch_secs: i64) -> Self {
        self.state.get_mut().last_fetch = epoch_secs;
        self
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Subscribe to newly observed access events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AccessEvent>> {
        self.event_tx.subscribe()
    }

    /// Start of the next fetch window, epoch seconds.
    ///
    /// Waits for an in-flight cycle to finish.
    pub async fn watermark(&self) -> i64 {
        self.state.lock().await.last_fetch
    }

    /// Records returned by the most recent successful cycle.
    pub fn last_events(&self) -> Arc<Vec<EventRecord>> {
        Arc::clone(&self.last_events.borrow())
    }

    /// Watch the record set replaced at the end of every successful cycle.
    pub fn last_events_changes(&self) -> watch::Receiver<Arc<Vec<EventRecord>>> {
        self.last_events.subscribe()
    }

    /// Run one fetch/parse/dispatch cycle.
    ///
    /// A fetch failure or timeout returns [`CoreError::UpdateFailed`] and
    /// leaves the watermark and stored records untouched. Unparseable data
    /// counts as zero records and still advances the watermark.
    pub async fn poll_once(&self) -> Result<PollOutcome, CoreError> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!(device = %self.device_id, "poll already in flight, skipping");
            return Ok(PollOutcome::Skipped);
        };

        let now = Utc::now().timestamp();
        let start = state.last_fetch;
        debug!(device = %self.device_id, start, end = now, "fetching access records");

        let raw = match tokio::time::timeout(self.fetch_timeout, self.client.events_raw(start, now))
            .await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                let err = CoreError::from(e);
                warn!(device = %self.device_id, error = %err, "event fetch failed");
                return Err(CoreError::UpdateFailed {
                    message: format!("error fetching events: {err}"),
                });
            }
            Err(_) => {
                warn!(
                    device = %self.device_id,
                    timeout_ms = self.fetch_timeout.as_millis(),
                    "event fetch timed out"
                );
                return Err(CoreError::UpdateFailed {
                    message: format!(
                        "timed out fetching events after {:?}",
                        self.fetch_timeout
                    ),
                });
            }
        };

        let records = match self.parser.parse_bytes(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(device = %self.device_id, error = %e, "discarding unparseable event data");
                Vec::new()
            }
        };

        let seen: HashSet<EventSignature> =
            state.last_events.iter().map(EventRecord::signature).collect();
        let fresh: Vec<EventRecord> = records
            .iter()
            .filter(|r| !seen.contains(&r.signature()))
            .cloned()
            .collect();

        let fetched = records.len();
        let dispatched = fresh.len();
        let records = Arc::new(records);
        state.last_events = Arc::clone(&records);
        state.last_fetch = now;
        drop(state);
        self.last_events.send_replace(records);

        for record in fresh {
            self.dispatch(record);
        }

        if dispatched > 0 {
            info!(device = %self.device_id, fetched, dispatched, "new access events");
        } else {
            debug!(device = %self.device_id, fetched, "no new access events");
        }
        Ok(PollOutcome::Completed {
            fetched,
            dispatched,
        })
    }

    /// Poll on a fixed interval until `cancel` fires.
    ///
    /// The first cycle runs immediately. Failed cycles are logged and the
    /// next tick retries.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(device = %self.device_id, error = %e, "poll cycle failed");
                    }
                }
            }
        }
        debug!(device = %self.device_id, "event polling stopped");
    }

    fn dispatch(&self, record: EventRecord) {
        let event = Arc::new(AccessEvent::new(self.device_id.clone(), record));
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.event_tx.send(event);
    }
}
