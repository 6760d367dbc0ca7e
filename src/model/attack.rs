use super::{DetectionPoint, DetectionSystem, Event, Resource, Rule, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// What produced an attack: a statistical threshold or a correlation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackTrigger {
    DetectionPoint(DetectionPoint),
    Rule(Rule),
}

/// Veredicto generado por los motores de análisis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attack {
    pub id: Uuid,
    pub user: User,
    pub trigger: AttackTrigger,
    pub timestamp: DateTime<Utc>,
    pub detection_system: DetectionSystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Attack {
    pub fn new(user: User, trigger: AttackTrigger, timestamp: DateTime<Utc>, detection_system: DetectionSystem) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            trigger,
            timestamp,
            detection_system,
            resource: None,
            metadata: HashMap::new(),
        }
    }

    /// Builds an attack from the event that completed the pattern.
    pub fn from_event(event: &Event, trigger: AttackTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: event.user.clone(),
            trigger,
            timestamp: event.timestamp,
            detection_system: event.detection_system.clone(),
            resource: event.resource.clone(),
            metadata: HashMap::new(),
        }
    }

    pub fn detection_point(&self) -> Option<&DetectionPoint> {
        match &self.trigger {
            AttackTrigger::DetectionPoint(point) => Some(point),
            AttackTrigger::Rule(_) => None,
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        match &self.trigger {
            AttackTrigger::Rule(rule) => Some(rule),
            AttackTrigger::DetectionPoint(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match &self.trigger {
            AttackTrigger::DetectionPoint(point) => &point.label,
            AttackTrigger::Rule(rule) => rule.display_name(),
        }
    }
}
