use crate::config::Thresholds;
use crate::events::{
    ConditionChange, Metric, Snapshot, WeatherEvent, TOPIC_CONDITION_CHANGED,
    TOPIC_WEATHER_UPDATE,
};
use std::collections::HashMap;

/// Derives the bus events for one successful snapshot
///
/// Keeps the last observed condition per location so that condition changes can
/// be detected across cycles. Alert topics are emitted on every cycle in which a
/// metric exceeds its raise threshold; suppressing repeats is left to the
/// trackers.
#[derive(Debug, Clone)]
pub struct EventDeriver {
    thresholds: Thresholds,
    previous_conditions: HashMap<String, String>,
}

impl EventDeriver {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            previous_conditions: HashMap::new(),
        }
    }

    /// Last recorded condition for a location, if any
    pub fn previous_condition(&self, location: &str) -> Option<&str> {
        self.previous_conditions.get(location).map(String::as_str)
    }

    /// Build the ordered list of `(topic, event)` pairs for a snapshot
    ///
    /// Order is: the update, then one alert per exceeded metric, then a condition
    /// change if the condition differs from the one recorded for `location`.
    /// The snapshot's condition is recorded as the new previous condition.
    pub fn derive(
        &mut self,
        location: &str,
        snapshot: &Snapshot,
    ) -> Vec<(&'static str, WeatherEvent)> {
        let mut events = vec![(TOPIC_WEATHER_UPDATE, WeatherEvent::Snapshot(snapshot.clone()))];

        for metric in Metric::ALL {
            if self
                .thresholds
                .for_metric(metric)
                .is_exceeded(snapshot.value_of(metric))
            {
                events.push((metric.alert_topic(), WeatherEvent::Snapshot(snapshot.clone())));
            }
        }

        let previous = self
            .previous_conditions
            .insert(location.to_string(), snapshot.condition.clone());
        if let Some(previous) = previous {
            if previous != snapshot.condition {
                events.push((
                    TOPIC_CONDITION_CHANGED,
                    WeatherEvent::ConditionChanged(ConditionChange {
                        previous,
                        current: snapshot.condition.clone(),
                        description: snapshot.description.clone(),
                        location: snapshot.location.clone(),
                        timestamp: snapshot.timestamp,
                    }),
                ));
            }
        }

        events
    }
}
