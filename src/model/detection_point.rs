use super::ResponseTemplate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unidades de tiempo aceptadas en la configuración
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    fn millis(&self) -> i64 {
        match self {
            IntervalUnit::Milliseconds => 1,
            IntervalUnit::Seconds => 1_000,
            IntervalUnit::Minutes => 60_000,
            IntervalUnit::Hours => 3_600_000,
            IntervalUnit::Days => 86_400_000,
        }
    }
}

/// Duración expresada como cantidad + unidad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub duration: u64,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn new(duration: u64, unit: IntervalUnit) -> Self {
        Self { duration, unit }
    }

    pub fn milliseconds(duration: u64) -> Self {
        Self::new(duration, IntervalUnit::Milliseconds)
    }

    pub fn seconds(duration: u64) -> Self {
        Self::new(duration, IntervalUnit::Seconds)
    }

    pub fn minutes(duration: u64) -> Self {
        Self::new(duration, IntervalUnit::Minutes)
    }

    pub fn hours(duration: u64) -> Self {
        Self::new(duration, IntervalUnit::Hours)
    }

    /// Length in milliseconds, `None` when it does not fit in an `i64`.
    pub fn checked_millis(&self) -> Option<i64> {
        i64::try_from(self.duration).ok()?.checked_mul(self.unit.millis())
    }

    /// Length in milliseconds, saturating at `i64::MAX`.
    pub fn to_millis(&self) -> i64 {
        self.checked_millis().unwrap_or(i64::MAX)
    }

    pub fn to_duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.to_millis())
    }

    /// `end - self`, clamped to the earliest representable time.
    pub fn before(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        end.checked_sub_signed(self.to_duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `start + self`, clamped to the latest representable time.
    pub fn after(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_signed(self.to_duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.duration, self.unit)
    }
}

/// Número de eventos que deben ocurrir dentro del intervalo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Threshold {
    pub count: u32,
    pub interval: Interval,
}

impl Threshold {
    pub fn new(count: u32, interval: Interval) -> Self {
        Self { count, interval }
    }
}

/// Sensor reportado por las aplicaciones cliente.
///
/// Dos puntos son iguales cuando coinciden categoría, etiqueta y umbral;
/// las respuestas configuradas y el guid no participan en la igualdad.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionPoint {
    pub category: String,
    #[serde(default, alias = "id")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<ResponseTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl DetectionPoint {
    pub fn new(category: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_responses(mut self, responses: Vec<ResponseTemplate>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn type_matches(&self, other: &DetectionPoint) -> bool {
        self.category == other.category && self.label == other.label
    }

    pub fn type_and_threshold_matches(&self, other: &DetectionPoint) -> bool {
        self.type_matches(other) && self.threshold == other.threshold
    }
}

impl PartialEq for DetectionPoint {
    fn eq(&self, other: &Self) -> bool {
        self.type_and_threshold_matches(other)
    }
}

impl Eq for DetectionPoint {}

impl fmt::Display for DetectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.threshold {
            Some(t) => write!(f, "{}/{} ({} in {})", self.category, self.label, t.count, t.interval),
            None => write!(f, "{}/{}", self.category, self.label),
        }
    }
}
