use serde_json::Value;

use crate::types::{DeviceSnapshot, Event};

/// Collect `(path, old, new)` for every leaf that differs between two JSON
/// documents. Keys only present in `previous` are ignored.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => changes.push((path, Value::Null, curr_val.clone())),
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Events describing how `next` differs from `prev`.
pub(crate) fn snapshot_events(prev: &DeviceSnapshot, next: &DeviceSnapshot) -> Vec<Event> {
    let mut events = Vec::new();

    if prev.available != next.available {
        events.push(Event::AvailabilityChanged {
            available: next.available,
        });
    }
    if prev.current_temperature != next.current_temperature {
        events.push(Event::CurrentTemperatureChanged {
            temp: next.current_temperature,
        });
    }
    if prev.target_temperature != next.target_temperature {
        events.push(Event::TargetTemperatureChanged {
            temp: next.target_temperature,
        });
    }
    if prev.mode != next.mode {
        events.push(Event::ModeChanged { mode: next.mode });
    }
    if prev.is_heating != next.is_heating {
        events.push(Event::HeatingChanged {
            heating: next.is_heating,
        });
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceMode, Temperature};
    use serde_json::json;

    #[test]
    fn diff_reports_changed_and_added_leaves() {
        let prev = json!({"CH1currentRoomTemp": "20.0", "CH1heatOnOff": "0"});
        let curr = json!({"CH1currentRoomTemp": "20.5", "CH1heatOnOff": "0", "frost": "7"});
        let mut changes = Vec::new();
        diff_json(&prev, &curr, "", &mut changes);

        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&(
            "CH1currentRoomTemp".to_string(),
            json!("20.0"),
            json!("20.5")
        )));
        assert!(changes.contains(&("frost".to_string(), Value::Null, json!("7"))));
    }

    #[test]
    fn diff_nested_paths() {
        let prev = json!({"a": {"b": 1}});
        let curr = json!({"a": {"b": 2}});
        let mut changes = Vec::new();
        diff_json(&prev, &curr, "", &mut changes);
        assert_eq!(changes, vec![("a.b".to_string(), json!(1), json!(2))]);
    }

    #[test]
    fn identical_snapshots_yield_no_events() {
        let snap = DeviceSnapshot {
            current_temperature: Some(Temperature::from_celsius(20.0)),
            available: true,
            ..Default::default()
        };
        assert!(snapshot_events(&snap, &snap.clone()).is_empty());
    }

    #[test]
    fn going_unavailable_reports_availability_and_heating() {
        let prev = DeviceSnapshot {
            current_temperature: Some(Temperature::from_celsius(20.0)),
            is_heating: Some(true),
            available: true,
            ..Default::default()
        };
        let next = DeviceSnapshot {
            is_heating: None,
            available: false,
            ..prev.clone()
        };
        let events = snapshot_events(&prev, &next);
        assert_eq!(
            events,
            vec![
                Event::AvailabilityChanged { available: false },
                Event::HeatingChanged { heating: None },
            ]
        );
    }

    #[test]
    fn mode_and_setpoint_changes() {
        let prev = DeviceSnapshot {
            target_temperature: Some(Temperature::from_celsius(20.0)),
            available: true,
            ..Default::default()
        };
        let next = DeviceSnapshot {
            target_temperature: Some(Temperature::from_celsius(21.5)),
            mode: DeviceMode::Off,
            ..prev.clone()
        };
        let events = snapshot_events(&prev, &next);
        assert!(events.contains(&Event::ModeChanged { mode: DeviceMode::Off }));
        assert!(events.contains(&Event::TargetTemperatureChanged {
            temp: Some(Temperature::from_celsius(21.5))
        }));
    }
}
