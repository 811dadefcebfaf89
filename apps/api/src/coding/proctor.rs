//! Behavioral heuristics for the coding session.
//!
//! Pure functions over counters the session already keeps; the controller
//! decides when to call them and what to do with the alert.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::models::proctor::{NewProctorEvent, Severity};

/// Characters of pasted text kept for review.
pub const PASTE_PREVIEW_CHARS: usize = 200;
/// Pastes longer than this many characters raise an alert.
pub const LARGE_PASTE_CHARS: usize = 100;
/// Tab switches beyond this count raise an alert, on every further switch.
pub const TAB_SWITCH_LIMIT: u32 = 5;

pub const LARGE_PASTE: &str = "large_paste";
pub const EXCESSIVE_TAB_SWITCHING: &str = "excessive_tab_switching";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProctorAlert {
    pub event: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl ProctorAlert {
    pub fn to_event(&self, details: serde_json::Value) -> NewProctorEvent {
        NewProctorEvent {
            event_type: self.event.to_string(),
            details,
            severity: self.severity,
        }
    }
}

/// A paste as recorded against the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PasteEvent {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Length of the original paste in characters.
    pub length: usize,
}

impl PasteEvent {
    pub fn capture(content: &str, now: DateTime<Utc>) -> Self {
        Self {
            content: content.chars().take(PASTE_PREVIEW_CHARS).collect(),
            timestamp: now,
            length: content.chars().count(),
        }
    }

    pub fn details(&self) -> serde_json::Value {
        json!({
            "length": self.length,
            "preview": self.content,
            "timestamp": self.timestamp,
        })
    }
}

pub fn paste_alert(original_length: usize) -> Option<ProctorAlert> {
    (original_length > LARGE_PASTE_CHARS).then(|| ProctorAlert {
        event: LARGE_PASTE,
        message: "Large code paste detected".to_string(),
        severity: Severity::Medium,
    })
}

pub fn tab_switch_alert(switch_count: u32) -> Option<ProctorAlert> {
    (switch_count > TAB_SWITCH_LIMIT).then(|| ProctorAlert {
        event: EXCESSIVE_TAB_SWITCHING,
        message: format!("Multiple tab switches detected ({switch_count})"),
        severity: Severity::High,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_boundary_is_strictly_above_100() {
        assert!(paste_alert(100).is_none());
        let alert = paste_alert(101).unwrap();
        assert_eq!(alert.event, "large_paste");
        assert_eq!(alert.severity, Severity::Medium);
    }

    #[test]
    fn test_tab_switch_alerts_from_sixth_onwards() {
        for count in 0..=5 {
            assert!(tab_switch_alert(count).is_none());
        }
        for count in 6..10 {
            let alert = tab_switch_alert(count).unwrap();
            assert_eq!(alert.severity, Severity::High);
            assert!(alert.message.contains(&format!("({count})")));
        }
    }

    #[test]
    fn test_paste_capture_truncates_but_keeps_length() {
        let content = "é".repeat(250);
        let paste = PasteEvent::capture(&content, Utc::now());
        assert_eq!(paste.content.chars().count(), 200);
        assert_eq!(paste.length, 250);
    }

    #[test]
    fn test_alert_serializes_lowercase_severity() {
        let value = serde_json::to_value(tab_switch_alert(7).unwrap()).unwrap();
        assert_eq!(value["event"], "excessive_tab_switching");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["message"], "Multiple tab switches detected (7)");
    }
}
