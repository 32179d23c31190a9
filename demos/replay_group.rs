//! Replay a short sequence of readings through one group and print the records

use chrono::{Duration, Utc};
use thermal_comfort::adapters::{MemoryRegistry, MemoryStateStore, RecordingPublisher};
use thermal_comfort::{ComfortConfig, ComfortHub, GroupConfig, Kind, RecordEncoder};

fn main() {
    let group = GroupConfig::new("Living room", "sensor.living_room_t", "sensor.living_room_h")
        .with_unique_id("living_room")
        .with_sensor_types(&[Kind::DewPoint, Kind::DewPointPerception, Kind::Humidex, Kind::FrostRisk]);
    let group = match group.resolve(&ComfortConfig::default()) {
        Ok(group) => group,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let mut hub = ComfortHub::new();
    let mut registry = MemoryRegistry::new();
    let mut store = MemoryStateStore::new();
    let mut publisher = RecordingPublisher::new();
    let encoder = RecordEncoder::new();
    let start = Utc::now();

    store.set("sensor.living_room_t", "25.0");
    store.set("sensor.living_room_h", "50.0");
    if let Err(e) = hub.setup_group(group, &mut registry, &store, &mut publisher, start) {
        eprintln!("Error: {e}");
        return;
    }

    let readings = [
        ("sensor.living_room_h", Some("65.0")),
        ("sensor.living_room_t", Some("unavailable")),
        ("sensor.living_room_t", Some("1.0")),
        ("sensor.living_room_h", Some("90.0")),
        ("sensor.living_room_t", None),
    ];
    for (minute, (entity_id, state)) in readings.into_iter().enumerate() {
        match state {
            Some(state) => store.set(entity_id, state),
            None => {
                store.remove(entity_id);
            }
        }
        let at = start + Duration::minutes(minute as i64 + 1);
        hub.handle_state_change(entity_id, &store, &mut publisher, at);
    }

    let history = publisher.take_history();
    match encoder.encode_to_json(&history, Utc::now()) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}
