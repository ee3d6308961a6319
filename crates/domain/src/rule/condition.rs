//! Rule conditions — hysteresis thresholds and daily time windows.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::SourceId;

/// The predicate side of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Hysteresis band on one sensor source.
    ///
    /// The ordering of the two levels picks the direction: `on_at > off_at`
    /// engages when the value rises to `on_at` and disengages when it falls
    /// back to `off_at` (cooling fan); `on_at < off_at` is the low-acting
    /// mirror (irrigation on low moisture).
    Threshold {
        source_id: SourceId,
        on_at: f64,
        off_at: f64,
    },
    /// Daily window, `HH:MM` bounds in 24-hour format. Level-triggered:
    /// engaged whenever the current time falls inside the window, wrapping
    /// past midnight when `after > before`.
    TimeWindow { after: String, before: String },
}

impl RuleCondition {
    /// Compute the latch value that follows `engaged` given a fresh valid
    /// reading. Only meaningful for threshold conditions.
    #[must_use]
    pub fn next_engaged(&self, engaged: bool, value: f64) -> bool {
        match self {
            Self::Threshold { on_at, off_at, .. } => {
                if on_at > off_at {
                    // High-acting: engage on rise, release on fall.
                    if engaged { value > *off_at } else { value >= *on_at }
                } else {
                    // Low-acting: engage on fall, release on rise.
                    if engaged { value < *off_at } else { value <= *on_at }
                }
            }
            Self::TimeWindow { .. } => engaged,
        }
    }

    /// Whether an `HH:MM` clock value falls inside the window.
    ///
    /// Same-day windows are inclusive on both ends; `after > before` is an
    /// overnight window (`now >= after` or `now <= before`).
    #[must_use]
    pub fn window_contains(&self, now_hhmm: &str) -> bool {
        match self {
            Self::TimeWindow { after, before } => {
                if after <= before {
                    now_hhmm >= after.as_str() && now_hhmm <= before.as_str()
                } else {
                    now_hhmm >= after.as_str() || now_hhmm <= before.as_str()
                }
            }
            Self::Threshold { .. } => false,
        }
    }

    /// The sensor this condition depends on, if any.
    #[must_use]
    pub fn source(&self) -> Option<&SourceId> {
        match self {
            Self::Threshold { source_id, .. } => Some(source_id),
            Self::TimeWindow { .. } => None,
        }
    }

    /// Check condition invariants for the named rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EqualThresholds`] for a degenerate band,
    /// or [`ValidationError::MalformedTimeWindow`] for a bound that is not
    /// a zero-padded `HH:MM` time.
    pub fn validate(&self, rule_name: &str) -> Result<(), ValidationError> {
        match self {
            Self::Threshold { on_at, off_at, .. } => {
                // Equality leaves no hysteresis band and makes the
                // direction ambiguous.
                if (on_at - off_at).abs() < f64::EPSILON {
                    return Err(ValidationError::EqualThresholds {
                        rule: rule_name.to_string(),
                    });
                }
                Ok(())
            }
            Self::TimeWindow { after, before } => {
                for bound in [after, before] {
                    if !is_hhmm(bound) {
                        return Err(ValidationError::MalformedTimeWindow {
                            rule: rule_name.to_string(),
                            value: bound.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for RuleCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Threshold {
                source_id,
                on_at,
                off_at,
            } => write!(f, "threshold({source_id}, on {on_at}, off {off_at})"),
            Self::TimeWindow { after, before } => write!(f, "time_window({after}..{before})"),
        }
    }
}

/// Strict zero-padded 24-hour `HH:MM` check, so lexical comparison is safe.
fn is_hhmm(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let (Ok(hours), Ok(minutes)) = (value[0..2].parse::<u8>(), value[3..5].parse::<u8>()) else {
        return false;
    };
    bytes.iter().all(|b| *b == b':' || b.is_ascii_digit()) && hours < 24 && minutes < 60
}
