//! Update coordinator
//!
//! One coordinator per group. It reads the configured sources on every
//! trigger, updates the measurement cache and publishes every enabled index:
//!
//! - all required inputs valid: compute, classify, publish value and attributes
//! - any required input invalid: publish "unknown" with no attributes
//! - any required input missing: republish the last valid result unchanged
//!
//! Teardown goes through the group's [`Subscription`]. Once
//! [`SubscriptionHandle::cancel`] returns, the coordinator publishes nothing
//! more, even from a recompute that was already running.

use crate::adapters::{Publisher, StateStore};
use crate::cache::MeasurementCache;
use crate::config::ThermalGroup;
use crate::index;
use crate::perception::PerceptionClassifier;
use crate::sanitizer::ValueSanitizer;
use crate::types::{Inputs, Kind, PublishedIndex, PublishedState, Validity};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Lifecycle state of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Recomputing,
    Published,
    TornDown,
}

/// What caused a recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Setup,
    SourceChanged,
    PollTick,
}

/// Identifier and entity id under which one index is published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexIdentity {
    pub identifier: String,
    pub entity_id: String,
}

/// Cancellation handle shared between a group and whoever drives it
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    inner: Arc<HandleState>,
}

#[derive(Debug, Default)]
struct HandleState {
    cancelled: AtomicBool,
    /// Held for the duration of every publish
    gate: Mutex<()>,
    /// Thread currently inside a publish
    publishing_on: Mutex<Option<ThreadId>>,
}

impl SubscriptionHandle {
    /// Cancel the subscription.
    ///
    /// Blocks until a publish in progress on another thread has finished.
    /// Cancelling from inside a publish returns at once; the publish in
    /// progress completes and nothing after it is published.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        if *lock(&self.inner.publishing_on) == Some(thread::current().id()) {
            return;
        }
        drop(lock(&self.inner.gate));
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Run `publish` unless cancelled. Returns false when cancelled.
    fn publish_with(&self, publish: impl FnOnce()) -> bool {
        let _gate = lock(&self.inner.gate);
        if self.is_cancelled() {
            return false;
        }
        *lock(&self.inner.publishing_on) = Some(thread::current().id());
        publish();
        *lock(&self.inner.publishing_on) = None;
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Source listeners of one group
#[derive(Debug, Clone)]
pub struct Subscription {
    sources: Vec<String>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            handle: SubscriptionHandle::default(),
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn listens_to(&self, entity_id: &str) -> bool {
        !self.handle.is_cancelled() && self.sources.iter().any(|s| s == entity_id)
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }
}

/// Timer state of a polling group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    next_due: DateTime<Utc>,
}

impl PollSchedule {
    /// First tick one interval after `now`; `None` if the interval overflows
    pub fn new(interval: Duration, now: DateTime<Utc>) -> Option<Self> {
        let step = chrono::Duration::from_std(interval).ok()?;
        Some(Self {
            interval,
            next_due: now.checked_add_signed(step)?,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_due
    }

    /// Schedule the next tick one interval after `now`; missed ticks are not replayed
    fn advance(&mut self, now: DateTime<Utc>) {
        if let Some(next) = chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|step| now.checked_add_signed(step))
        {
            self.next_due = next;
        }
    }
}

/// Per-group update coordinator
pub struct GroupCoordinator {
    group: ThermalGroup,
    root_id: String,
    identities: BTreeMap<Kind, IndexIdentity>,
    cache: MeasurementCache,
    last_results: BTreeMap<Kind, PublishedIndex>,
    state: CoordinatorState,
    poll: Option<PollSchedule>,
    subscription: Subscription,
}

impl GroupCoordinator {
    /// Create a coordinator in the Idle state. Call [`Self::start`] for the
    /// initial computation.
    pub fn new(
        group: ThermalGroup,
        root_id: String,
        identities: BTreeMap<Kind, IndexIdentity>,
        now: DateTime<Utc>,
    ) -> Self {
        let sources = group
            .sources()
            .into_iter()
            .map(|(_, source)| source.to_string())
            .collect();
        let poll = group
            .update_mode
            .poll_interval()
            .and_then(|interval| PollSchedule::new(interval, now));

        Self {
            group,
            root_id,
            identities,
            cache: MeasurementCache::new(),
            last_results: BTreeMap::new(),
            state: CoordinatorState::Idle,
            poll,
            subscription: Subscription::new(sources),
        }
    }

    pub fn group(&self) -> &ThermalGroup {
        &self.group
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn identities(&self) -> &BTreeMap<Kind, IndexIdentity> {
        &self.identities
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn cache(&self) -> &MeasurementCache {
        &self.cache
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.subscription.handle()
    }

    pub fn poll_schedule(&self) -> Option<&PollSchedule> {
        self.poll.as_ref()
    }

    /// Last result published for a kind
    pub fn last_published(&self, kind: Kind) -> Option<&PublishedIndex> {
        self.last_results.get(&kind)
    }

    /// Initial computation from whatever the sources currently report
    pub fn start(
        &mut self,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Vec<PublishedIndex> {
        self.recompute(Trigger::Setup, store, publisher, now)
    }

    /// Handle a state change of `entity_id`; ignored if the group does not listen to it
    pub fn on_source_event(
        &mut self,
        entity_id: &str,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Vec<PublishedIndex> {
        if !self.subscription.listens_to(entity_id) {
            return Vec::new();
        }
        self.recompute(Trigger::SourceChanged, store, publisher, now)
    }

    /// Recompute if the poll timer is due
    pub fn on_poll_tick(
        &mut self,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Vec<PublishedIndex> {
        match self.poll.as_mut() {
            Some(schedule) if schedule.is_due(now) => schedule.advance(now),
            _ => return Vec::new(),
        }
        self.recompute(Trigger::PollTick, store, publisher, now)
    }

    /// Read all sources and publish every enabled index
    pub fn recompute(
        &mut self,
        trigger: Trigger,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Vec<PublishedIndex> {
        if self.subscription.handle.is_cancelled() {
            self.transition(CoordinatorState::TornDown);
            return Vec::new();
        }

        debug!(group = %self.group.name, ?trigger, "recomputing");
        self.transition(CoordinatorState::Recomputing);

        for (role, source) in self.group.sources() {
            let raw = store.state(source);
            let measurement = ValueSanitizer::sanitize(role, raw.as_deref(), now);
            if measurement.validity == Validity::Invalid {
                warn!(
                    group = %self.group.name,
                    source,
                    state = raw.as_deref().unwrap_or_default(),
                    "invalid reading"
                );
            }
            self.cache.record(role, measurement);
        }

        let kinds: Vec<Kind> = self.group.enabled_kinds.iter().copied().collect();
        let mut published = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let Some(index) = self.evaluate(kind) else {
                continue;
            };
            if !self.publish(publisher, &index) {
                self.transition(CoordinatorState::TornDown);
                return published;
            }
            published.push(index);
        }

        self.transition(CoordinatorState::Published);
        self.transition(CoordinatorState::Idle);
        published
    }

    /// Cancel the subscription and retract every published entity
    pub fn teardown(&mut self, publisher: &mut dyn Publisher) {
        self.teardown_retaining(publisher, &BTreeSet::new());
    }

    /// Cancel the subscription and retract published entities, except those
    /// in `shared` that another live group still publishes
    pub fn teardown_retaining(&mut self, publisher: &mut dyn Publisher, shared: &BTreeSet<String>) {
        self.subscription.handle.cancel();
        self.poll = None;
        for identity in self.identities.values() {
            if !shared.contains(&identity.entity_id) {
                publisher.retract(&identity.entity_id);
            }
        }
        self.transition(CoordinatorState::TornDown);
    }

    /// Replace the measurement cache, e.g. after a restart.
    ///
    /// Results are rebuilt from the last valid readings so a source that is
    /// still missing keeps serving them.
    pub fn restore_cache(&mut self, cache: MeasurementCache) {
        self.cache = cache;
        self.last_results.clear();
        let kinds: Vec<Kind> = self.group.enabled_kinds.iter().copied().collect();
        for kind in kinds {
            let roles = index::definition(kind).inputs(self.group.has_pressure());
            if let Some(inputs) = self.cache.last_valid_inputs(&roles) {
                if let Some(result) = self.build(kind, &inputs) {
                    self.last_results.insert(kind, result);
                }
            }
        }
    }

    pub fn save_cache(&self) -> Result<String, serde_json::Error> {
        self.cache.to_json()
    }

    pub fn load_cache(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let cache = MeasurementCache::from_json(json)?;
        self.restore_cache(cache);
        Ok(())
    }

    /// Decide what to publish for one kind
    fn evaluate(&mut self, kind: Kind) -> Option<PublishedIndex> {
        let identity = self.identities.get(&kind)?;
        let roles = index::definition(kind).inputs(self.group.has_pressure());
        let validities: Vec<Validity> = roles.iter().map(|r| self.cache.validity(*r)).collect();

        if validities.contains(&Validity::Invalid) {
            self.last_results.remove(&kind);
            return Some(PublishedIndex::unknown(
                &identity.identifier,
                &identity.entity_id,
                kind,
            ));
        }

        if validities.contains(&Validity::Missing) {
            return Some(match self.last_results.get(&kind) {
                Some(previous) => previous.clone(),
                None => PublishedIndex::unknown(&identity.identifier, &identity.entity_id, kind),
            });
        }

        let inputs = self.cache.current_inputs(&roles)?;
        let index = self.build(kind, &inputs)?;
        self.last_results.insert(kind, index.clone());
        Some(index)
    }

    /// Compute and classify one kind from valid inputs
    fn build(&self, kind: Kind, inputs: &Inputs) -> Option<PublishedIndex> {
        let identity = self.identities.get(&kind)?;
        let definition = index::definition(kind);
        let result = (definition.compute)(inputs);

        let mut attributes = BTreeMap::new();
        for role in definition.inputs(self.group.has_pressure()) {
            if let Some(value) = inputs.get(role) {
                attributes.insert(role.attribute().to_string(), value);
            }
        }

        let state = match PerceptionClassifier::classify(kind, &result, inputs) {
            Some(category) => {
                if let (Some(attribute), Some(value)) = (definition.attribute, result.numeric_value)
                {
                    attributes.insert(attribute.to_string(), value);
                }
                PublishedState::Category(category)
            }
            None => match result.numeric_value {
                Some(value) => PublishedState::Numeric(value),
                None => PublishedState::Unknown,
            },
        };

        Some(PublishedIndex {
            identifier: identity.identifier.clone(),
            entity_id: identity.entity_id.clone(),
            kind,
            state,
            attributes,
        })
    }

    /// Publish unless cancelled; a concurrent cancel waits for the publish
    fn publish(&self, publisher: &mut dyn Publisher, index: &PublishedIndex) -> bool {
        self.subscription
            .handle
            .publish_with(|| publisher.publish(index))
    }

    fn transition(&mut self, next: CoordinatorState) {
        if self.state != next {
            trace!(group = %self.group.name, from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryStateStore, RecordingPublisher};
    use crate::config::{ComfortConfig, GroupConfig};
    use crate::identity::IdentityManager;
    use crate::perception::Category;
    use pretty_assertions::assert_eq;

    fn coordinator(config: GroupConfig, now: DateTime<Utc>) -> GroupCoordinator {
        let group = config.resolve(&ComfortConfig::default()).unwrap();
        let root = group.explicit_root_id.clone().unwrap_or_else(|| "root".to_string());
        let identities = group
            .enabled_kinds
            .iter()
            .map(|kind| {
                (
                    *kind,
                    IndexIdentity {
                        identifier: IdentityManager::index_id(&root, *kind),
                        entity_id: format!("sensor.test_{kind}"),
                    },
                )
            })
            .collect();
        GroupCoordinator::new(group, root, identities, now)
    }

    fn store(temperature: &str, humidity: &str) -> MemoryStateStore {
        let mut store = MemoryStateStore::new();
        store.set("sensor.t", temperature);
        store.set("sensor.h", humidity);
        store
    }

    fn all_kinds() -> GroupConfig {
        GroupConfig::new("test", "sensor.t", "sensor.h").with_unique_id("root")
    }

    #[test]
    fn test_initial_compute_publishes_every_kind() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();

        let published = group.start(&store("25.0", "50.0"), &mut publisher, now);

        assert_eq!(published.len(), Kind::ALL.len());
        assert_eq!(group.state(), CoordinatorState::Idle);
        assert_eq!(
            publisher.state_of("sensor.test_dew_point").as_deref(),
            Some("13.8753224672013")
        );
        let dew = publisher.get("sensor.test_dew_point").unwrap();
        assert_eq!(dew.identifier, "rootdew_point");
        assert_eq!(dew.attributes.get("temperature"), Some(&25.0));
        assert_eq!(dew.attributes.get("humidity"), Some(&50.0));
    }

    #[test]
    fn test_never_reported_inputs_start_unknown() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();

        group.start(&MemoryStateStore::new(), &mut publisher, now);

        assert_eq!(publisher.len(), Kind::ALL.len());
        assert!(publisher.current().all(|index| index.state.is_unknown()));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let store = store("25.0", "50.0");

        let first = group.start(&store, &mut publisher, now);
        let second = group.recompute(Trigger::SourceChanged, &store, &mut publisher, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_input_resets_to_unknown() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let mut store = store("25.0", "50.0");
        group.start(&store, &mut publisher, now);

        store.set("sensor.t", "not a number");
        group.on_source_event("sensor.t", &store, &mut publisher, now);

        for index in publisher.current() {
            assert!(index.state.is_unknown(), "{} not reset", index.kind);
            assert!(index.attributes.is_empty());
        }
    }

    #[test]
    fn test_missing_input_keeps_last_value() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let mut store = store("25.0", "50.0");
        let before = group.start(&store, &mut publisher, now);

        store.remove("sensor.t");
        let after = group.on_source_event("sensor.t", &store, &mut publisher, now);

        assert_eq!(after, before);
        assert_eq!(
            publisher.state_of("sensor.test_dew_point").as_deref(),
            Some("13.8753224672013")
        );
    }

    #[test]
    fn test_missing_after_invalid_stays_unknown() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let mut store = store("25.0", "50.0");
        group.start(&store, &mut publisher, now);

        store.set("sensor.t", "unavailable");
        group.on_source_event("sensor.t", &store, &mut publisher, now);
        store.remove("sensor.t");
        group.on_source_event("sensor.t", &store, &mut publisher, now);

        assert_eq!(publisher.state_of("sensor.test_humidex").as_deref(), Some("unknown"));
    }

    #[test]
    fn test_humidity_boundaries() {
        let now = Utc::now();
        let mut publisher = RecordingPublisher::new();

        let mut dry = coordinator(all_kinds(), now);
        let published = dry.start(&store("20.0", "0.0"), &mut publisher, now);
        assert!(published.iter().all(|index| index.state.is_unknown()));

        let mut saturated = coordinator(all_kinds(), now);
        saturated.start(&store("20.0", "100.0"), &mut publisher, now);
        let dew_point = publisher.get("sensor.test_dew_point").unwrap();
        assert!(!dew_point.state.is_unknown());
    }

    #[test]
    fn test_out_of_domain_keeps_numeric_attribute() {
        let now = Utc::now();
        let config = all_kinds().with_sensor_types(&[Kind::RelativeStrainPerception]);
        let mut group = coordinator(config, now);
        let mut publisher = RecordingPublisher::new();

        group.start(&store("25.0", "50.0"), &mut publisher, now);

        let index = publisher.get("sensor.test_relative_strain_perception").unwrap();
        assert_eq!(index.state, PublishedState::Category(Category::OutsideCalculableRange));
        assert_eq!(index.state.as_state_string(), "outside_calculable_range");
        assert_eq!(index.attributes.get("relative_strain_index"), Some(&0.09));
    }

    #[test]
    fn test_rapid_double_update_recomputes_each_time() {
        let now = Utc::now();
        let config = all_kinds().with_sensor_types(&[Kind::DewPoint]);
        let mut group = coordinator(config, now);
        let mut publisher = RecordingPublisher::new();
        let mut store = store("25.0", "50.0");
        group.start(&store, &mut publisher, now);
        publisher.take_history();

        store.set("sensor.t", "15.0");
        group.on_source_event("sensor.t", &store, &mut publisher, now);
        store.set("sensor.t", "20.0");
        group.on_source_event("sensor.t", &store, &mut publisher, now);

        assert_eq!(publisher.history().len(), 2);
        assert_eq!(
            publisher.state_of("sensor.test_dew_point").as_deref(),
            Some("9.27984544440477")
        );
    }

    #[test]
    fn test_unrelated_source_ignored() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let published = group.on_source_event("sensor.other", &store("25.0", "50.0"), &mut publisher, now);
        assert!(published.is_empty());
        assert!(publisher.is_empty());
    }

    #[test]
    fn test_poll_tick_only_when_due() {
        let now = Utc::now();
        let config = all_kinds().with_sensor_types(&[Kind::Humidex]).with_poll(30);
        let mut group = coordinator(config, now);
        let mut publisher = RecordingPublisher::new();
        let store = store("25.0", "50.0");
        let initial = group.start(&store, &mut publisher, now);

        let early = now + chrono::Duration::seconds(10);
        assert!(group.on_poll_tick(&store, &mut publisher, early).is_empty());

        let due = now + chrono::Duration::seconds(30);
        let ticked = group.on_poll_tick(&store, &mut publisher, due);
        assert_eq!(ticked.len(), 1);
        assert_eq!(ticked, initial);
        assert_eq!(
            publisher.state_of("sensor.test_humidex").as_deref(),
            Some("28.2925656121491")
        );
        assert_eq!(
            group.poll_schedule().unwrap().next_due(),
            due + chrono::Duration::seconds(30)
        );
    }

    #[test]
    fn test_push_only_group_never_polls() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let later = now + chrono::Duration::hours(1);
        assert!(group.poll_schedule().is_none());
        assert!(group
            .on_poll_tick(&store("25.0", "50.0"), &mut publisher, later)
            .is_empty());
    }

    #[test]
    fn test_no_publish_after_cancel() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let store = store("25.0", "50.0");

        group.handle().cancel();
        let published = group.recompute(Trigger::SourceChanged, &store, &mut publisher, now);

        assert!(published.is_empty());
        assert!(publisher.history().is_empty());
        assert_eq!(group.state(), CoordinatorState::TornDown);
    }

    /// Cancels its group from inside the first publish
    struct CancellingPublisher {
        handle: SubscriptionHandle,
        inner: RecordingPublisher,
    }

    impl Publisher for CancellingPublisher {
        fn publish(&mut self, index: &PublishedIndex) {
            self.inner.publish(index);
            self.handle.cancel();
        }

        fn retract(&mut self, entity_id: &str) {
            self.inner.retract(entity_id);
        }
    }

    #[test]
    fn test_cancel_during_recompute_stops_remaining_publishes() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = CancellingPublisher {
            handle: group.handle(),
            inner: RecordingPublisher::new(),
        };
        let store = store("25.0", "50.0");

        let published = group.recompute(Trigger::SourceChanged, &store, &mut publisher, now);

        assert_eq!(published.len(), 1);
        assert_eq!(publisher.inner.history().len(), 1);
        assert!(group.handle().is_cancelled());
        assert_eq!(group.state(), CoordinatorState::TornDown);

        let again = group.recompute(Trigger::PollTick, &store, &mut publisher, now);
        assert!(again.is_empty());
        assert_eq!(publisher.inner.history().len(), 1);
    }

    /// Slow publisher counting into shared state
    struct SlowPublisher {
        started: std::sync::mpsc::Sender<()>,
        published: Arc<Mutex<usize>>,
    }

    impl Publisher for SlowPublisher {
        fn publish(&mut self, _index: &PublishedIndex) {
            self.started.send(()).ok();
            thread::sleep(Duration::from_millis(50));
            *self.published.lock().unwrap() += 1;
        }

        fn retract(&mut self, _entity_id: &str) {}
    }

    #[test]
    fn test_cancel_from_other_thread_waits_for_publish_in_progress() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let handle = group.handle();
        let published = Arc::new(Mutex::new(0));
        let (started, first_publish) = std::sync::mpsc::channel();
        let mut publisher = SlowPublisher {
            started,
            published: published.clone(),
        };
        let store = store("25.0", "50.0");

        let seen = published.clone();
        let canceller = thread::spawn(move || {
            first_publish.recv().unwrap();
            handle.cancel();
            *seen.lock().unwrap()
        });

        group.recompute(Trigger::SourceChanged, &store, &mut publisher, now);

        assert_eq!(canceller.join().unwrap(), 1);
        assert_eq!(*published.lock().unwrap(), 1);
        assert_eq!(group.state(), CoordinatorState::TornDown);
    }

    #[test]
    fn test_teardown_retracts_entities() {
        let now = Utc::now();
        let mut group = coordinator(all_kinds(), now);
        let mut publisher = RecordingPublisher::new();
        let store = store("25.0", "50.0");
        group.start(&store, &mut publisher, now);

        group.teardown(&mut publisher);

        assert!(publisher.is_empty());
        assert!(!group.subscription().listens_to("sensor.t"));
        assert!(group.on_source_event("sensor.t", &store, &mut publisher, now).is_empty());
    }

    #[test]
    fn test_pressure_feeds_enthalpy() {
        let now = Utc::now();
        let config = all_kinds()
            .with_sensor_types(&[Kind::MoistAirEnthalpy, Kind::DewPoint])
            .with_pressure_sensor("sensor.p");
        let mut group = coordinator(config, now);
        let mut publisher = RecordingPublisher::new();
        let mut store = store("25.0", "50.0");
        store.set("sensor.p", "1000.0");

        group.start(&store, &mut publisher, now);

        let enthalpy = publisher.get("sensor.test_moist_air_enthalpy").unwrap();
        assert_eq!(enthalpy.state.as_state_string(), "50.6608574725528");
        assert_eq!(enthalpy.attributes.get("pressure"), Some(&1000.0));
        let dew_point = publisher.get("sensor.test_dew_point").unwrap();
        assert_eq!(dew_point.attributes.get("pressure"), None);

        store.set("sensor.p", "-3");
        group.on_source_event("sensor.p", &store, &mut publisher, now);
        assert_eq!(
            publisher.state_of("sensor.test_moist_air_enthalpy").as_deref(),
            Some("unknown")
        );
        assert_eq!(
            publisher.state_of("sensor.test_dew_point").as_deref(),
            Some("13.8753224672013")
        );
    }

    #[test]
    fn test_restored_cache_serves_missing_sources() {
        let now = Utc::now();
        let mut first = coordinator(all_kinds().with_sensor_types(&[Kind::Humidex]), now);
        let mut publisher = RecordingPublisher::new();
        let before = first.start(&store("25.0", "50.0"), &mut publisher, now);
        let saved = first.save_cache().unwrap();

        let mut restarted = coordinator(all_kinds().with_sensor_types(&[Kind::Humidex]), now);
        restarted.load_cache(&saved).unwrap();
        let after = restarted.start(&MemoryStateStore::new(), &mut publisher, now);

        assert_eq!(after, before);
    }
}
