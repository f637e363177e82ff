//! # Conditions
//!
//! Typed status conditions shared by every kind, keyed by `type`.
//!
//! Conditions are upserted by type, never by array position. The two
//! `compute_*` functions are pure: they take the currently stored condition of
//! the same type and return the condition to persist, keeping
//! `lastTransitionTime` stable when nothing changed and carrying
//! `lastSuccessfulTime` forward until the next successful transition.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition reasons written by the reconcilers
pub mod reasons {
    pub const AVAILABLE: &str = "Available";
    pub const UNAVAILABLE: &str = "Unavailable";
    pub const RECONCILE_SUCCESS: &str = "ReconcileSuccess";
    pub const RECONCILE_ERROR: &str = "ReconcileError";
    pub const OFFLINE: &str = "Offline";
    pub const NEW_REPLICA_SET_AVAILABLE: &str = "NewReplicaSetAvailable";
    pub const IMAGE_STORE_PROVISIONING: &str = "ImageStoreProvisioning";
}

/// Kind of fact a condition records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    Ready,
    Done,
    Available,
    Progressing,
    ReplicaFailure,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "Ready",
            Self::Done => "Done",
            Self::Available => "Available",
            Self::Progressing => "Progressing",
            Self::ReplicaFailure => "ReplicaFailure",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

/// A typed, timestamped status fact
///
/// The `Default` value is the sentinel returned when no condition of the
/// requested type exists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: ConditionType,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// Last time the condition transitioned (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    /// Last time the condition reported success (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_time: Option<String>,
}

impl Condition {
    pub fn new(
        r#type: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Some(timestamp(Utc::now())),
            last_successful_time: None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Format a timestamp the way Kubernetes serializes `metav1.Time`
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Upsert `new` into `conditions`, replacing any condition of the same type.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => *existing = new,
        None => conditions.push(new),
    }
}

pub fn find_condition(conditions: &[Condition], r#type: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// Condition of the given type, or the zero-value sentinel when absent.
pub fn get_condition(conditions: &[Condition], r#type: ConditionType) -> Condition {
    find_condition(conditions, r#type).cloned().unwrap_or_default()
}

/// `Ready=False` condition for `message`.
///
/// Returns `current` unchanged if it already records the same failure.
pub fn compute_error_condition(current: &Condition, message: &str, now: DateTime<Utc>) -> Condition {
    if current.r#type == ConditionType::Ready
        && current.status == ConditionStatus::False
        && current.message == message
    {
        return current.clone();
    }

    Condition {
        r#type: ConditionType::Ready,
        status: ConditionStatus::False,
        reason: reasons::AVAILABLE.to_string(),
        message: message.to_string(),
        last_transition_time: Some(timestamp(now)),
        last_successful_time: current.last_successful_time.clone(),
    }
}

/// `Ready=True` condition for `message`.
///
/// Returns `current` unchanged if it already records the same success.
pub fn compute_ready_condition(current: &Condition, message: &str, now: DateTime<Utc>) -> Condition {
    if current.r#type == ConditionType::Ready
        && current.status == ConditionStatus::True
        && current.reason == reasons::AVAILABLE
        && current.message == message
    {
        return current.clone();
    }

    let at = timestamp(now);
    Condition {
        r#type: ConditionType::Ready,
        status: ConditionStatus::True,
        reason: reasons::AVAILABLE.to_string(),
        message: message.to_string(),
        last_transition_time: Some(at.clone()),
        last_successful_time: Some(at),
    }
}

/// Implemented by every status type that carries conditions.
pub trait Conditioned {
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn get_condition(&self, r#type: ConditionType) -> Condition {
        get_condition(self.conditions(), r#type)
    }

    fn set_condition(&mut self, new: Condition) {
        set_condition(self.conditions_mut(), new);
    }

    fn has_condition(&self, r#type: ConditionType) -> bool {
        find_condition(self.conditions(), r#type).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn set_then_get_returns_what_was_set() {
        let mut conditions = Vec::new();
        let cond = Condition::new(
            ConditionType::Done,
            ConditionStatus::True,
            reasons::RECONCILE_SUCCESS,
            "Finished",
        );
        set_condition(&mut conditions, cond);

        let got = get_condition(&conditions, ConditionType::Done);
        assert_eq!(got.status, ConditionStatus::True);
        assert_eq!(got.reason, "ReconcileSuccess");
        assert_eq!(got.message, "Finished");
    }

    #[test]
    fn set_condition_replaces_by_type() {
        let mut conditions = vec![
            Condition::new(ConditionType::Progressing, ConditionStatus::True, "a", "a"),
            Condition::new(ConditionType::Ready, ConditionStatus::False, "b", "b"),
        ];
        set_condition(
            &mut conditions,
            Condition::new(ConditionType::Ready, ConditionStatus::True, "c", "c"),
        );

        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].r#type, ConditionType::Progressing);
        assert_eq!(conditions[1].message, "c");
    }

    #[test]
    fn missing_condition_is_the_sentinel() {
        let got = get_condition(&[], ConditionType::Available);
        assert_eq!(got, Condition::default());
        assert_eq!(got.r#type, ConditionType::Unknown);
        assert_eq!(got.status, ConditionStatus::Unknown);
    }

    #[test]
    fn ready_twice_with_same_message_keeps_transition_time() {
        let first = compute_ready_condition(&Condition::default(), "ok", at(0));
        let second = compute_ready_condition(&first, "ok", at(600));
        assert_eq!(first, second);
        assert_eq!(second.last_transition_time, Some(timestamp(at(0))));
    }

    #[test]
    fn ready_with_new_message_advances_both_timestamps() {
        let first = compute_ready_condition(&Condition::default(), "ok", at(0));
        let second = compute_ready_condition(&first, "still ok", at(60));
        assert_eq!(second.last_transition_time, Some(timestamp(at(60))));
        assert_eq!(second.last_successful_time, Some(timestamp(at(60))));
    }

    #[test]
    fn error_carries_last_successful_time_forward() {
        let ready = compute_ready_condition(&Condition::default(), "ok", at(0));
        let failed = compute_error_condition(&ready, "boom", at(30));

        assert_eq!(failed.status, ConditionStatus::False);
        assert_eq!(failed.reason, "Available");
        assert_eq!(failed.message, "boom");
        assert_eq!(failed.last_transition_time, Some(timestamp(at(30))));
        assert_eq!(failed.last_successful_time, Some(timestamp(at(0))));
    }

    #[test]
    fn repeated_error_is_deduplicated() {
        let failed = compute_error_condition(&Condition::default(), "boom", at(0));
        let again = compute_error_condition(&failed, "boom", at(0) + Duration::minutes(5));
        assert_eq!(failed, again);
    }

    #[test]
    fn condition_serializes_with_kubernetes_field_names() {
        let cond = compute_ready_condition(&Condition::default(), "ok", at(0));
        let value = serde_json::to_value(&cond).unwrap();
        assert_eq!(value["type"], "Ready");
        assert_eq!(value["status"], "True");
        assert!(value.get("lastTransitionTime").is_some());
        assert!(value.get("lastSuccessfulTime").is_some());
    }
}
