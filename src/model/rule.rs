//! Reglas de correlación: una regla es una secuencia ordenada de expresiones
//! (THEN), cada expresión es un OR de cláusulas y cada cláusula un AND de
//! puntos de monitoreo.

use super::{DetectionPoint, Interval, ResponseTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A detection point referenced from inside a rule. It carries the rule-scoped
/// `guid`; matching against notifications still uses detection point equality.
pub type MonitorPoint = DetectionPoint;

/// Conjunto de puntos que deben estar presentes simultáneamente en la ventana
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clause {
    pub monitor_points: Vec<MonitorPoint>,
}

impl Clause {
    pub fn new(monitor_points: Vec<MonitorPoint>) -> Self {
        Self { monitor_points }
    }
}

/// Etapa de una regla
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Interval>,
    pub clauses: Vec<Clause>,
}

impl Expression {
    pub fn new(window: Option<Interval>, clauses: Vec<Clause>) -> Self {
        Self { window, clauses }
    }

    pub fn detection_points(&self) -> impl Iterator<Item = &MonitorPoint> {
        self.clauses.iter().flat_map(|c| c.monitor_points.iter())
    }
}

/// Regla de correlación configurada en el servidor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    pub guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Interval>,
    pub expressions: Vec<Expression>,
    #[serde(default)]
    pub responses: Vec<ResponseTemplate>,
}

impl Rule {
    pub fn new(guid: impl Into<String>, window: Option<Interval>, expressions: Vec<Expression>) -> Self {
        Self {
            guid: guid.into(),
            name: None,
            window,
            expressions,
            responses: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_responses(mut self, responses: Vec<ResponseTemplate>) -> Self {
        self.responses = responses;
        self
    }

    /// Nombre para reportes: el nombre configurado o, en su defecto, el guid
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.guid)
    }

    /// Distinct detection points referenced anywhere in the rule, in first-seen order.
    pub fn all_detection_points(&self) -> Vec<&MonitorPoint> {
        let mut points: Vec<&MonitorPoint> = Vec::new();
        for point in self.expressions.iter().flat_map(|e| e.detection_points()) {
            if !points.iter().any(|p| p.type_and_threshold_matches(point)) {
                points.push(point);
            }
        }
        points
    }

    /// True when some monitor point of the rule has the same type as `point`.
    pub fn type_matches_detection_point(&self, point: &DetectionPoint) -> bool {
        self.expressions
            .iter()
            .flat_map(|e| e.detection_points())
            .any(|p| p.type_matches(point))
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.guid == other.guid
    }
}

impl Eq for Rule {}

/// Ráfaga de eventos de un mismo punto de detección que superó su umbral.
/// Solo existe durante la evaluación de una regla.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub start_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub detection_point: DetectionPoint,
}

impl Notification {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, detection_point: DetectionPoint) -> Self {
        Self {
            start_time,
            duration_ms: (end_time - start_time).num_milliseconds(),
            detection_point,
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time
            .checked_add_signed(chrono::Duration::milliseconds(self.duration_ms))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
