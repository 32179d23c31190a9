//! Async group driver
//!
//! Runs one coordinator on a tokio task: source change notifications arrive
//! over a channel, the poll interval is a tokio timer, and the loop ends when
//! the group is stopped. Recomputes stay synchronous; the task only suspends
//! while waiting for the next event.

use crate::adapters::{Publisher, StateStore};
use crate::coordinator::{GroupCoordinator, SubscriptionHandle, Trigger};
use crate::error::ComfortError;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Queued source notifications per group
const EVENT_BUFFER: usize = 64;

/// Handle to a running group task
pub struct GroupDriver {
    entry_id: String,
    events: mpsc::Sender<String>,
    subscription: SubscriptionHandle,
    shutdown: Arc<Notify>,
    task: JoinHandle<GroupCoordinator>,
}

impl GroupDriver {
    /// Run the initial computation, then spawn a task driving `coordinator`.
    ///
    /// The initial state is published before this returns, so a group
    /// stopped right after spawning has still published once.
    pub fn spawn<S, P>(
        mut coordinator: GroupCoordinator,
        store: Arc<S>,
        publisher: Arc<Mutex<P>>,
    ) -> Self
    where
        S: StateStore + Send + Sync + 'static,
        P: Publisher + Send + 'static,
    {
        coordinator.start(&*store, &mut *lock(&publisher), Utc::now());

        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let shutdown = Arc::new(Notify::new());
        let entry_id = coordinator.group().entry_id.clone();
        let subscription = coordinator.handle();
        let task = tokio::spawn(run_group(coordinator, store, publisher, receiver, shutdown.clone()));

        Self {
            entry_id,
            events,
            subscription,
            shutdown,
            task,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Tell the group that a source changed state
    pub async fn notify(&self, entity_id: &str) -> Result<(), ComfortError> {
        self.events
            .send(entity_id.to_string())
            .await
            .map_err(|_| ComfortError::GroupNotFound(self.entry_id.clone()))
    }

    /// Cancel the group, wait for its task and return the coordinator.
    ///
    /// Nothing is published once this is called.
    pub async fn stop(self) -> Result<GroupCoordinator, ComfortError> {
        self.subscription.cancel();
        self.shutdown.notify_one();
        self.task
            .await
            .map_err(|err| ComfortError::TaskFailed(err.to_string()))
    }
}

async fn run_group<S, P>(
    mut coordinator: GroupCoordinator,
    store: Arc<S>,
    publisher: Arc<Mutex<P>>,
    mut events: mpsc::Receiver<String>,
    shutdown: Arc<Notify>,
) -> GroupCoordinator
where
    S: StateStore + Send + Sync + 'static,
    P: Publisher + Send + 'static,
{
    let mut ticker = coordinator.poll_schedule().map(|schedule| {
        let period = schedule.interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    info!(group = %coordinator.group().name, "group task started");

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            event = events.recv() => match event {
                Some(entity_id) => {
                    coordinator.on_source_event(&entity_id, &*store, &mut *lock(&publisher), Utc::now());
                }
                None => break,
            },
            _ = next_tick(&mut ticker) => {
                coordinator.recompute(Trigger::PollTick, &*store, &mut *lock(&publisher), Utc::now());
            }
        }
    }

    coordinator.teardown(&mut *lock(&publisher));
    debug!(group = %coordinator.group().name, "group task stopped");
    coordinator
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn lock<P>(publisher: &Mutex<P>) -> MutexGuard<'_, P> {
    publisher
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryStateStore, RecordingPublisher};
    use crate::config::{ComfortConfig, GroupConfig};
    use crate::coordinator::{CoordinatorState, IndexIdentity};
    use crate::identity::IdentityManager;
    use crate::types::Kind;
    use std::collections::BTreeMap;
    use std::sync::RwLock;
    use std::time::Duration;

    fn coordinator(config: GroupConfig) -> GroupCoordinator {
        let group = config.resolve(&ComfortConfig::default()).unwrap();
        let identities: BTreeMap<Kind, IndexIdentity> = group
            .enabled_kinds
            .iter()
            .map(|kind| {
                (
                    *kind,
                    IndexIdentity {
                        identifier: IdentityManager::index_id("root", *kind),
                        entity_id: format!("sensor.driven_{kind}"),
                    },
                )
            })
            .collect();
        GroupCoordinator::new(group, "root".to_string(), identities, Utc::now())
    }

    fn shared_store() -> Arc<RwLock<MemoryStateStore>> {
        let mut store = MemoryStateStore::new();
        store.set("sensor.t", "25.0");
        store.set("sensor.h", "50.0");
        Arc::new(RwLock::new(store))
    }

    fn history_len(publisher: &Mutex<RecordingPublisher>) -> usize {
        publisher.lock().unwrap().history().len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_handles_events_polls_and_stop() {
        let config = GroupConfig::new("driven", "sensor.t", "sensor.h")
            .with_sensor_types(&[Kind::DewPoint])
            .with_poll(30);
        let store = shared_store();
        let publisher = Arc::new(Mutex::new(RecordingPublisher::new()));

        let driver = GroupDriver::spawn(coordinator(config), store.clone(), publisher.clone());
        assert_eq!(history_len(&publisher), 1);

        store.write().unwrap().set("sensor.t", "20.0");
        driver.notify("sensor.t").await.unwrap();
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(history_len(&publisher), 2);
        assert_eq!(
            publisher.lock().unwrap().state_of("sensor.driven_dew_point").as_deref(),
            Some("9.27984544440477")
        );

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(history_len(&publisher), 3);

        let coordinator = driver.stop().await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::TornDown);
        assert!(publisher.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_only_driver_never_polls() {
        let config = GroupConfig::new("driven", "sensor.t", "sensor.h")
            .with_sensor_types(&[Kind::Humidex]);
        let publisher = Arc::new(Mutex::new(RecordingPublisher::new()));

        let driver = GroupDriver::spawn(coordinator(config), shared_store(), publisher.clone());
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(history_len(&publisher), 1);

        driver.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_right_after_spawn_keeps_initial_publish() {
        let config = GroupConfig::new("driven", "sensor.t", "sensor.h")
            .with_sensor_types(&[Kind::DewPoint, Kind::Humidex]);
        let publisher = Arc::new(Mutex::new(RecordingPublisher::new()));

        let driver = GroupDriver::spawn(coordinator(config), shared_store(), publisher.clone());
        let coordinator = driver.stop().await.unwrap();

        assert_eq!(history_len(&publisher), 2);
        assert_eq!(coordinator.state(), CoordinatorState::TornDown);
        assert!(publisher.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_after_stop_fails() {
        let config = GroupConfig::new("driven", "sensor.t", "sensor.h")
            .with_entry_id("e1")
            .with_sensor_types(&[Kind::Humidex]);
        let publisher = Arc::new(Mutex::new(RecordingPublisher::new()));
        let driver = GroupDriver::spawn(coordinator(config), shared_store(), publisher.clone());
        let events = driver.events.clone();
        assert_eq!(driver.entry_id(), "e1");

        driver.stop().await.unwrap();
        assert!(events.send("sensor.t".to_string()).await.is_err());
        assert_eq!(history_len(&publisher), 1);
    }
}
