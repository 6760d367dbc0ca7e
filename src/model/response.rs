use super::{DetectionPoint, DetectionSystem, Interval, Rule, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Respuesta candidata configurada en un punto de detección o regla
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTemplate {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
}

impl ResponseTemplate {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }
}

/// Origen de una respuesta, usado para búsquedas y reportes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    DetectionPoint(DetectionPoint),
    Rule(Rule),
}

/// Acción seleccionada tras un ataque
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    pub user: User,
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    pub detection_system: DetectionSystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ResponseSource>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Response {
    pub fn new(user: User, action: impl Into<String>, timestamp: DateTime<Utc>, detection_system: DetectionSystem) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            action: action.into(),
            timestamp,
            interval: None,
            detection_system,
            source: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, interval: Option<Interval>) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn detection_point(&self) -> Option<&DetectionPoint> {
        match &self.source {
            Some(ResponseSource::DetectionPoint(point)) => Some(point),
            _ => None,
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        match &self.source {
            Some(ResponseSource::Rule(rule)) => Some(rule),
            _ => None,
        }
    }

    /// A response without interval fires once and is never active.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match &self.interval {
            Some(interval) => now >= self.timestamp && now < interval.after(self.timestamp),
            None => false,
        }
    }
}
