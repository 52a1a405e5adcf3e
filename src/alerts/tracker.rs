use crate::alerts::format::{format_message, Notification};
use crate::alerts::sink::{NotificationKind, NotificationSink};
use crate::bus::EventBus;
use crate::config::Thresholds;
use crate::events::{
    ConditionChange, Metric, Snapshot, Units, WeatherEvent, TOPIC_CONDITION_CHANGED,
    TOPIC_WEATHER_UPDATE,
};
use anyhow::{anyhow, bail};
use log::{debug, error, info};
use std::sync::{Arc, Mutex};

/// Alert state of a single metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// No alert outstanding; the next raise event notifies
    Normal,
    /// An alert was raised; further raise events are suppressed until recovery
    Alerted,
}

/// Edge-triggered alert flags, one per metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFlags {
    pub temperature: bool,
    pub wind_speed: bool,
    pub humidity: bool,
}

impl AlertFlags {
    pub fn is_active(&self, metric: Metric) -> bool {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::WindSpeed => self.wind_speed,
            Metric::Humidity => self.humidity,
        }
    }

    fn set(&mut self, metric: Metric, active: bool) {
        match metric {
            Metric::Temperature => self.temperature = active,
            Metric::WindSpeed => self.wind_speed = active,
            Metric::Humidity => self.humidity = active,
        }
    }
}

/// Converts bus events into edge-triggered notifications for one sink
///
/// Each sink gets its own tracker so suppression state is never shared. A raise
/// event notifies only on the Normal to Alerted transition; repeated raise events
/// are suppressed until an update shows the metric at or below its recovery
/// threshold. Condition changes always notify.
///
/// Flags change before delivery is attempted, so a failed send never causes the
/// same alert to be re-sent on the next cycle.
pub struct AlertTracker {
    /// Sink name used in log lines
    name: String,
    sink: Box<dyn NotificationSink>,
    thresholds: Thresholds,
    units: Units,
    /// Whether routine updates are forwarded to the sink
    forward_updates: bool,
    flags: AlertFlags,
}

impl AlertTracker {
    /// Create a tracker with all metrics in the Normal state
    ///
    /// Only the recovery side of `thresholds` is consulted here; raise thresholds
    /// are applied by the sampler when it decides to publish an alert topic.
    pub fn new(
        name: impl Into<String>,
        sink: Box<dyn NotificationSink>,
        thresholds: Thresholds,
        units: Units,
    ) -> Self {
        Self {
            name: name.into(),
            sink,
            thresholds,
            units,
            forward_updates: false,
            flags: AlertFlags::default(),
        }
    }

    /// Forward every weather update to the sink, not only alerts
    pub fn with_forward_updates(mut self, forward_updates: bool) -> Self {
        self.forward_updates = forward_updates;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> AlertFlags {
        self.flags
    }

    pub fn state(&self, metric: Metric) -> AlertState {
        if self.flags.is_active(metric) {
            AlertState::Alerted
        } else {
            AlertState::Normal
        }
    }

    /// Subscribe a shared tracker to every topic it understands
    pub fn subscribe(tracker: Arc<Mutex<AlertTracker>>, bus: &EventBus<WeatherEvent>) {
        let mut topics = vec![TOPIC_WEATHER_UPDATE];
        topics.extend(Metric::ALL.iter().map(Metric::alert_topic));
        topics.push(TOPIC_CONDITION_CHANGED);

        for topic in topics {
            let tracker = Arc::clone(&tracker);
            bus.subscribe(topic, move |event: &WeatherEvent| {
                let mut tracker = tracker
                    .lock()
                    .map_err(|_| anyhow!("alert tracker state poisoned"))?;
                tracker.handle_event(topic, event)?;
                Ok(())
            });
        }
    }

    /// Route a bus event to the matching handler
    ///
    /// Returns the kinds of notifications that were attempted.
    ///
    /// # Errors
    ///
    /// Fails if the topic is unknown or the payload does not match the topic.
    pub fn handle_event(
        &mut self,
        topic: &str,
        event: &WeatherEvent,
    ) -> anyhow::Result<Vec<NotificationKind>> {
        match (topic, event) {
            (TOPIC_WEATHER_UPDATE, WeatherEvent::Snapshot(snapshot)) => {
                Ok(self.on_update(snapshot))
            }
            (TOPIC_CONDITION_CHANGED, WeatherEvent::ConditionChanged(change)) => {
                Ok(vec![self.on_condition_change(change)])
            }
            (topic, WeatherEvent::Snapshot(snapshot)) => match Metric::from_alert_topic(topic) {
                Some(metric) => Ok(self.on_alert(metric, snapshot).into_iter().collect()),
                None => bail!("tracker {} cannot handle topic {}", self.name, topic),
            },
            (topic, WeatherEvent::ConditionChanged(_)) => {
                bail!("unexpected condition-change payload on topic {}", topic)
            }
        }
    }

    /// Handle a routine update: forward it if configured, then clear recovered alerts
    pub fn on_update(&mut self, snapshot: &Snapshot) -> Vec<NotificationKind> {
        let mut emitted = Vec::new();

        if self.forward_updates {
            emitted.push(self.deliver(Notification::Update(snapshot)));
        }

        for metric in Metric::ALL {
            if !self.flags.is_active(metric) {
                continue;
            }
            let value = snapshot.value_of(metric);
            if self.thresholds.for_metric(metric).is_recovered(value) {
                self.flags.set(metric, false);
                info!(
                    "[{}] {} in {} recovered at {:.1}",
                    self.name, metric, snapshot.location, value
                );
                emitted.push(self.deliver(Notification::Recovered { metric, snapshot }));
            }
        }

        emitted
    }

    /// Handle a raise event; returns `None` when the alert is suppressed
    pub fn on_alert(&mut self, metric: Metric, snapshot: &Snapshot) -> Option<NotificationKind> {
        if self.flags.is_active(metric) {
            debug!(
                "[{}] Suppressing duplicate {} alert for {}",
                self.name, metric, snapshot.location
            );
            return None;
        }

        self.flags.set(metric, true);
        info!(
            "[{}] {} alert raised for {} at {:.1}",
            self.name,
            metric,
            snapshot.location,
            snapshot.value_of(metric)
        );
        Some(self.deliver(Notification::Raised { metric, snapshot }))
    }

    /// Handle a condition transition; always notifies
    pub fn on_condition_change(&mut self, change: &ConditionChange) -> NotificationKind {
        info!(
            "[{}] Weather in {} changed from {} to {}",
            self.name, change.location, change.previous, change.current
        );
        self.deliver(Notification::ConditionChanged(change))
    }

    /// Format and send one notification, logging (not propagating) failures
    fn deliver(&self, notification: Notification<'_>) -> NotificationKind {
        let kind = notification.kind();
        let message = format_message(&notification, self.units, self.sink.markup());

        if let Err(e) = self.sink.notify(kind, &message) {
            error!(
                "[{}] Failed to deliver {} notification: {}",
                self.name, kind, e
            );
        }

        kind
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::alerts::sink::NotificationSink;
    use crate::config::MetricThresholds;
    use crate::error::AlertError;
    use chrono::Utc;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    struct CountingSink {
        raised: Arc<Mutex<usize>>,
    }

    impl NotificationSink for CountingSink {
        fn notify(&self, kind: NotificationKind, _message: &str) -> Result<(), AlertError> {
            if kind == NotificationKind::Raised {
                *self.raised.lock().unwrap() += 1;
            }
            Ok(())
        }
    }

    /// One event delivered to a tracker
    #[derive(Debug, Clone)]
    enum Step {
        Raise(Metric),
        Update { temperature: f64, wind_speed: f64, humidity: f64 },
    }

    impl Arbitrary for Step {
        fn arbitrary(g: &mut Gen) -> Self {
            if bool::arbitrary(g) {
                let metric = *g.choose(&Metric::ALL).unwrap();
                Step::Raise(metric)
            } else {
                Step::Update {
                    temperature: f64::from(u8::arbitrary(g) % 50),
                    wind_speed: f64::from(u8::arbitrary(g) % 30),
                    humidity: f64::from(u8::arbitrary(g) % 101),
                }
            }
        }
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            temperature: MetricThresholds::new(35.0, 30.0),
            wind_speed: MetricThresholds::new(15.0, 10.0),
            humidity: MetricThresholds::new(80.0, 75.0),
        }
    }

    // A metric's flag is set iff its latest raise has not been followed by a
    // recovering update, and every Normal to Alerted transition notifies once
    #[quickcheck]
    fn prop_flags_follow_raise_and_recovery(steps: Vec<Step>) -> bool {
        let raised = Arc::new(Mutex::new(0));
        let sink = CountingSink {
            raised: Arc::clone(&raised),
        };
        let mut tracker = AlertTracker::new("prop", Box::new(sink), thresholds(), Units::Metric);

        let mut expected = AlertFlags::default();
        let mut expected_raised = 0;

        for step in &steps {
            match step {
                Step::Raise(metric) => {
                    let snapshot = snapshot(0.0, 0.0, 0.0);
                    if !expected.is_active(*metric) {
                        expected_raised += 1;
                    }
                    expected.set(*metric, true);
                    tracker.on_alert(*metric, &snapshot);
                }
                Step::Update {
                    temperature,
                    wind_speed,
                    humidity,
                } => {
                    let snapshot = snapshot(*temperature, *wind_speed, *humidity);
                    for metric in Metric::ALL {
                        if thresholds()
                            .for_metric(metric)
                            .is_recovered(snapshot.value_of(metric))
                        {
                            expected.set(metric, false);
                        }
                    }
                    tracker.on_update(&snapshot);
                }
            }

            if tracker.flags() != expected {
                return false;
            }
        }

        let raised_count = *raised.lock().unwrap();
        raised_count == expected_raised
    }

    fn snapshot(temperature: f64, wind_speed: f64, humidity: f64) -> Snapshot {
        Snapshot {
            temperature,
            feels_like: temperature,
            humidity,
            wind_speed,
            condition: "Clear".to_string(),
            description: "clear sky".to_string(),
            location: "Anywhere".to_string(),
            timestamp: Utc::now(),
        }
    }
}
