//! Message formatting for notifications
//!
//! Turns tracker decisions into the text handed to a sink, using the sink's
//! markup and the configured measurement units.

use crate::alerts::sink::{Markup, NotificationKind};
use crate::events::{ConditionChange, Metric, Snapshot, Units};

/// Telegram rejects messages longer than this many bytes
pub const MAX_MESSAGE_BYTES: usize = 4096;

/// Cap for one provider-supplied field after escaping
///
/// A message carries at most four such fields, so the capped fields plus the
/// fixed template always stay under `MAX_MESSAGE_BYTES`.
const MAX_FIELD_BYTES: usize = 900;

const ELLIPSIS: &str = "...";

/// A decision made by a tracker, ready to be formatted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification<'a> {
    Update(&'a Snapshot),
    Raised {
        metric: Metric,
        snapshot: &'a Snapshot,
    },
    Recovered {
        metric: Metric,
        snapshot: &'a Snapshot,
    },
    ConditionChanged(&'a ConditionChange),
}

impl Notification<'_> {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Update(_) => NotificationKind::Update,
            Notification::Raised { .. } => NotificationKind::Raised,
            Notification::Recovered { .. } => NotificationKind::Recovered,
            Notification::ConditionChanged(_) => NotificationKind::ConditionChanged,
        }
    }
}

/// Format a notification for a sink
///
/// Provider-supplied text is escaped and capped field by field, so HTML tags and
/// entities are never split and the result fits in `MAX_MESSAGE_BYTES`.
pub fn format_message(notification: &Notification<'_>, units: Units, markup: Markup) -> String {
    match notification {
        Notification::Update(snapshot) => format_update(snapshot, units, markup),
        Notification::Raised { metric, snapshot } => {
            format_raised(*metric, snapshot, units, markup)
        }
        Notification::Recovered { metric, snapshot } => {
            format_recovered(*metric, snapshot, units, markup)
        }
        Notification::ConditionChanged(change) => format_condition_change(change, markup),
    }
}

fn format_update(snapshot: &Snapshot, units: Units, markup: Markup) -> String {
    format!(
        "Weather update for {}: {:.1}{} (feels like {:.1}{}), humidity {:.0}%, wind {:.1} {}, {}",
        escape(&snapshot.location, markup),
        snapshot.temperature,
        units.temperature_label(),
        snapshot.feels_like,
        units.temperature_label(),
        snapshot.humidity,
        snapshot.wind_speed,
        units.wind_label(),
        escape(&snapshot.description, markup),
    )
}

fn format_raised(metric: Metric, snapshot: &Snapshot, units: Units, markup: Markup) -> String {
    let headline = match metric {
        Metric::Temperature => "HIGH TEMPERATURE ALERT",
        Metric::WindSpeed => "HIGH WIND ALERT",
        Metric::Humidity => "HIGH HUMIDITY ALERT",
    };
    let temperature_label = units.temperature_label();

    let mut details = Vec::new();
    if metric != Metric::Temperature {
        details.push(format!(
            "• Temperature: {:.1}{}",
            snapshot.temperature, temperature_label
        ));
    }
    if metric != Metric::WindSpeed {
        details.push(format!(
            "• Feels like: {:.1}{}",
            snapshot.feels_like, temperature_label
        ));
    }
    details.push(format!(
        "• Current conditions: {}",
        escape(&snapshot.description, markup)
    ));

    format!(
        "⚠️ {} ⚠️\n\n{} in {} is now {}!\n\n{}\n\n{}",
        bold(headline, markup),
        metric.display_name(),
        escape(&snapshot.location, markup),
        metric_value(metric, snapshot, units),
        details.join("\n"),
        advisory(metric),
    )
}

fn format_recovered(metric: Metric, snapshot: &Snapshot, units: Units, markup: Markup) -> String {
    format!(
        "✅ {} in {} has returned to normal levels: {}",
        metric.display_name(),
        escape(&snapshot.location, markup),
        metric_value(metric, snapshot, units),
    )
}

fn format_condition_change(change: &ConditionChange, markup: Markup) -> String {
    format!(
        "🔄 {} 🔄\n\nWeather in {} has changed from {} to {}.\n\nCurrent conditions: {}",
        bold("WEATHER CHANGE", markup),
        escape(&change.location, markup),
        bold(&change.previous, markup),
        bold(&change.current, markup),
        escape(&change.description, markup),
    )
}

fn metric_value(metric: Metric, snapshot: &Snapshot, units: Units) -> String {
    let value = snapshot.value_of(metric);
    match metric {
        Metric::Humidity => format!("{:.0}%", value),
        Metric::Temperature => format!("{:.1}{}", value, metric.unit_label(units)),
        Metric::WindSpeed => format!("{:.1} {}", value, metric.unit_label(units)),
    }
}

fn advisory(metric: Metric) -> &'static str {
    match metric {
        Metric::Temperature => "Recommend staying hydrated and avoiding outdoor activities.",
        Metric::WindSpeed => "Recommend securing loose outdoor items.",
        Metric::Humidity => "Heat index may be higher than actual temperature.",
    }
}

fn bold(text: &str, markup: Markup) -> String {
    match markup {
        Markup::Plain => escape(text, markup),
        Markup::Html => format!("<b>{}</b>", escape(text, markup)),
    }
}

/// Escape provider-supplied text for the sink's markup, capped at `MAX_FIELD_BYTES`
fn escape(text: &str, markup: Markup) -> String {
    match markup {
        Markup::Plain => truncate_text(text, MAX_FIELD_BYTES),
        Markup::Html => escape_html(text, MAX_FIELD_BYTES),
    }
}

fn html_entity(ch: char) -> Option<&'static str> {
    match ch {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        _ => None,
    }
}

/// HTML-escape text, stopping before `max_length` bytes at a whole character or entity
fn escape_html(text: &str, max_length: usize) -> String {
    let escaped_len: usize = text
        .chars()
        .map(|ch| html_entity(ch).map_or(ch.len_utf8(), str::len))
        .sum();
    let budget = if escaped_len <= max_length {
        max_length
    } else {
        max_length.saturating_sub(ELLIPSIS.len())
    };

    let mut escaped = String::with_capacity(escaped_len.min(max_length));
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        let piece: &str = match html_entity(ch) {
            Some(entity) => entity,
            None => &*ch.encode_utf8(&mut buf),
        };
        if escaped.len() + piece.len() > budget {
            break;
        }
        escaped.push_str(piece);
    }

    if escaped_len > max_length {
        escaped.push_str(ELLIPSIS);
    }
    escaped
}

/// Truncate text to a maximum byte length on a UTF-8 character boundary
fn truncate_text(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }

    let mut truncate_at = max_length.saturating_sub(ELLIPSIS.len());
    while truncate_at > 0 && !text.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    format!("{}{}", &text[..truncate_at], ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_snapshot() -> Snapshot {
        Snapshot {
            temperature: 36.04,
            feels_like: 38.2,
            humidity: 85.4,
            wind_speed: 16.25,
            condition: "Clear".to_string(),
            description: "clear sky".to_string(),
            location: "Phoenix".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn create_test_change() -> ConditionChange {
        ConditionChange {
            previous: "Clear".to_string(),
            current: "Rain".to_string(),
            description: "light rain".to_string(),
            location: "London".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_notification_kinds() {
        let snapshot = create_test_snapshot();
        let change = create_test_change();

        assert_eq!(
            Notification::Update(&snapshot).kind(),
            NotificationKind::Update
        );
        assert_eq!(
            Notification::Raised {
                metric: Metric::Humidity,
                snapshot: &snapshot
            }
            .kind(),
            NotificationKind::Raised
        );
        assert_eq!(
            Notification::Recovered {
                metric: Metric::Humidity,
                snapshot: &snapshot
            }
            .kind(),
            NotificationKind::Recovered
        );
        assert_eq!(
            Notification::ConditionChanged(&change).kind(),
            NotificationKind::ConditionChanged
        );
    }

    #[test]
    fn test_raised_temperature_html() {
        let snapshot = create_test_snapshot();
        let message = format_message(
            &Notification::Raised {
                metric: Metric::Temperature,
                snapshot: &snapshot,
            },
            Units::Metric,
            Markup::Html,
        );

        assert!(message.contains("<b>HIGH TEMPERATURE ALERT</b>"));
        assert!(message.contains("Temperature in Phoenix is now 36.0°C!"));
        assert!(message.contains("• Feels like: 38.2°C"));
        assert!(message.contains("• Current conditions: clear sky"));
        assert!(message.contains("staying hydrated"));
        assert!(!message.contains("• Temperature:"));
    }

    #[test]
    fn test_raised_wind_plain_imperial() {
        let snapshot = create_test_snapshot();
        let message = format_message(
            &Notification::Raised {
                metric: Metric::WindSpeed,
                snapshot: &snapshot,
            },
            Units::Imperial,
            Markup::Plain,
        );

        assert!(message.contains("HIGH WIND ALERT"));
        assert!(!message.contains("<b>"));
        assert!(message.contains("Wind speed in Phoenix is now 16.2 mph!")
            || message.contains("Wind speed in Phoenix is now 16.3 mph!"));
        assert!(message.contains("• Temperature: 36.0°F"));
        assert!(message.contains("securing loose outdoor items"));
    }

    #[test]
    fn test_raised_humidity() {
        let snapshot = create_test_snapshot();
        let message = format_message(
            &Notification::Raised {
                metric: Metric::Humidity,
                snapshot: &snapshot,
            },
            Units::Metric,
            Markup::Plain,
        );

        assert!(message.contains("HIGH HUMIDITY ALERT"));
        assert!(message.contains("Humidity in Phoenix is now 85%!"));
        assert!(message.contains("• Temperature: 36.0°C"));
        assert!(message.contains("• Feels like: 38.2°C"));
        assert!(message.contains("Heat index"));
    }

    #[test]
    fn test_recovered_message() {
        let mut snapshot = create_test_snapshot();
        snapshot.temperature = 29.0;

        let message = format_message(
            &Notification::Recovered {
                metric: Metric::Temperature,
                snapshot: &snapshot,
            },
            Units::Metric,
            Markup::Html,
        );

        assert_eq!(
            message,
            "✅ Temperature in Phoenix has returned to normal levels: 29.0°C"
        );
    }

    #[test]
    fn test_condition_change_html() {
        let change = create_test_change();
        let message = format_message(
            &Notification::ConditionChanged(&change),
            Units::Metric,
            Markup::Html,
        );

        assert!(message.contains("<b>WEATHER CHANGE</b>"));
        assert!(message.contains("changed from <b>Clear</b> to <b>Rain</b>."));
        assert!(message.contains("Current conditions: light rain"));
    }

    #[test]
    fn test_condition_change_plain() {
        let change = create_test_change();
        let message = format_message(
            &Notification::ConditionChanged(&change),
            Units::Metric,
            Markup::Plain,
        );

        assert!(message.contains("Weather in London has changed from Clear to Rain."));
    }

    #[test]
    fn test_update_message() {
        let snapshot = create_test_snapshot();
        let message = format_message(&Notification::Update(&snapshot), Units::Metric, Markup::Plain);

        assert!(message.starts_with("Weather update for Phoenix: 36.0°C"));
        assert!(message.contains("humidity 85%"));
        assert!(message.contains("clear sky"));
    }

    #[test]
    fn test_html_escaping() {
        let mut change = create_test_change();
        change.location = "Fish & <Chips>".to_string();
        change.current = "<Rain>".to_string();

        let message = format_message(
            &Notification::ConditionChanged(&change),
            Units::Metric,
            Markup::Html,
        );

        assert!(message.contains("Fish &amp; &lt;Chips&gt;"));
        assert!(message.contains("<b>&lt;Rain&gt;</b>"));

        let plain = format_message(
            &Notification::ConditionChanged(&change),
            Units::Metric,
            Markup::Plain,
        );
        assert!(plain.contains("Fish & <Chips>"));
    }

    #[test]
    fn test_text_truncation() {
        let long_text = "a".repeat(5000);
        let truncated = truncate_text(&long_text, MAX_MESSAGE_BYTES);
        assert!(truncated.len() <= MAX_MESSAGE_BYTES);
        assert!(truncated.ends_with("..."));

        let short_text = "short";
        assert_eq!(truncate_text(short_text, 256), short_text);
    }

    #[test]
    fn test_utf8_truncation_safety() {
        let test_cases = ["🚀🎉🌟", "世界你好", "Здравствуй мир", "café résumé naïve"];

        for test_str in test_cases {
            for max_len in [5, 10, 15, 20] {
                let result = truncate_text(test_str, max_len);
                assert!(result.len() <= max_len);
                if test_str.len() > max_len {
                    assert!(result.ends_with("..."));
                }
            }
        }
    }

    #[test]
    fn test_long_description_is_truncated() {
        let mut snapshot = create_test_snapshot();
        snapshot.description = "storm ".repeat(1000);

        let message = format_message(&Notification::Update(&snapshot), Units::Metric, Markup::Plain);
        assert!(message.len() <= MAX_MESSAGE_BYTES);
        assert!(message.contains("storm storm"));
    }

    #[test]
    fn test_oversized_html_fields_keep_markup_intact() {
        let mut change = create_test_change();
        change.location = "&".repeat(3000);
        change.previous = "<".repeat(3000);
        change.current = "é>".repeat(2000);
        change.description = "a&b".repeat(2000);

        let message = format_message(
            &Notification::ConditionChanged(&change),
            Units::Metric,
            Markup::Html,
        );

        assert!(message.len() <= MAX_MESSAGE_BYTES);
        assert_eq!(message.matches("<b>").count(), 3);
        assert_eq!(message.matches("</b>").count(), 3);
        assert!(message.ends_with("..."));
        for (index, _) in message.match_indices('&') {
            let rest = &message[index..];
            assert!(
                rest.starts_with("&amp;") || rest.starts_with("&lt;") || rest.starts_with("&gt;"),
                "split entity at byte {}",
                index
            );
        }
    }

    #[test]
    fn test_escape_html_fits_exactly() {
        assert_eq!(escape_html("a&b", 7), "a&amp;b");
        assert_eq!(escape_html("a&b", 6), "a...");
        assert_eq!(escape_html("<<<", 8), "&lt;...");
    }
}
