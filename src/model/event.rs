use super::DetectionPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Usuario asociado a un evento, ataque o respuesta
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ip_address: None,
        }
    }
}

// Users are compared by username only.
impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for User {}

/// Sistema (aplicación cliente) que reporta el evento
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionSystem {
    pub detection_system_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl DetectionSystem {
    pub fn new(detection_system_id: impl Into<String>) -> Self {
        Self {
            detection_system_id: detection_system_id.into(),
            ip_address: None,
        }
    }
}

impl PartialEq for DetectionSystem {
    fn eq(&self, other: &Self) -> bool {
        self.detection_system_id == other.detection_system_id
    }
}

impl Eq for DetectionSystem {}

/// Recurso accedido cuando se disparó el punto de detección
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub location: String,
    #[serde(default)]
    pub method: String,
}

/// Evento sospechoso reportado por una aplicación cliente
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user: User,
    pub detection_point: DetectionPoint,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub detection_system: DetectionSystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Event {
    pub fn new(
        user: User,
        detection_point: DetectionPoint,
        timestamp: DateTime<Utc>,
        detection_system: DetectionSystem,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            detection_point,
            timestamp,
            detection_system,
            resource: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_json_assigns_id() {
        let event: Event = serde_json::from_str(
            r#"{
                "user": {"username": "bob"},
                "detection_point": {"category": "Input Validation", "label": "IE1"},
                "timestamp": "2024-01-01T10:00:00Z",
                "detection_system": {"detection_system_id": "myclientapp"}
            }"#,
        )
        .unwrap();

        assert_eq!(event.user, User::new("bob"));
        assert_eq!(event.detection_system.detection_system_id, "myclientapp");
        assert!(event.resource.is_none());
        assert!(!event.id.is_nil());
    }

    #[test]
    fn test_user_equality_by_username() {
        let mut a = User::new("alice");
        a.ip_address = Some("10.0.0.1".to_string());
        assert_eq!(a, User::new("alice"));
        assert_ne!(a, User::new("bob"));
    }
}
