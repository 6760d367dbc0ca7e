//! Contratos de almacenamiento consumidos por los motores.
//!
//! Cada store persiste el registro y luego notifica a sus listeners en orden
//! de registro, esperando a que cada uno termine antes de invocar al
//! siguiente. `add_*` retorna cuando toda la cadena ha terminado.

pub mod manager;
pub mod memory;

use crate::criteria::SearchCriteria;
use crate::detector::{AttackAnalysisEngine, EventAnalysisEngine, ResponseAnalysisEngine};
use crate::error::Result;
use crate::model::{Attack, Event, Response};
use async_trait::async_trait;
use std::sync::Arc;

pub use manager::{StorageConfig, StorageManager};
pub use memory::{MemoryAttackStore, MemoryEventStore, MemoryResponseStore, MemoryStorageConfig};

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn add_event(&self, event: Event) -> Result<()>;

    async fn find_events(&self, criteria: &SearchCriteria) -> Result<Vec<Event>>;

    async fn count_events(&self, criteria: &SearchCriteria) -> Result<usize> {
        Ok(self.find_events(criteria).await?.len())
    }

    fn register_listener(&self, listener: Arc<dyn EventAnalysisEngine>);
}

#[async_trait]
pub trait AttackStore: Send + Sync {
    async fn add_attack(&self, attack: Attack) -> Result<()>;

    async fn find_attacks(&self, criteria: &SearchCriteria) -> Result<Vec<Attack>>;

    async fn count_attacks(&self, criteria: &SearchCriteria) -> Result<usize> {
        Ok(self.find_attacks(criteria).await?.len())
    }

    fn register_listener(&self, listener: Arc<dyn AttackAnalysisEngine>);
}

#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn add_response(&self, response: Response) -> Result<()>;

    async fn find_responses(&self, criteria: &SearchCriteria) -> Result<Vec<Response>>;

    async fn count_responses(&self, criteria: &SearchCriteria) -> Result<usize> {
        Ok(self.find_responses(criteria).await?.len())
    }

    fn register_listener(&self, listener: Arc<dyn ResponseAnalysisEngine>);
}

/// Criteria matching shared by every store implementation.
pub trait Searchable {
    fn matches(&self, criteria: &SearchCriteria) -> bool;
}

impl Searchable for Event {
    fn matches(&self, criteria: &SearchCriteria) -> bool {
        criteria.matches_user(&self.user)
            && criteria.matches_detection_point(Some(&self.detection_point))
            && criteria.matches_detection_system(&self.detection_system.detection_system_id)
            && criteria.matches_timestamp(self.timestamp)
    }
}

impl Searchable for Attack {
    fn matches(&self, criteria: &SearchCriteria) -> bool {
        criteria.matches_user(&self.user)
            && criteria.matches_detection_point(self.detection_point())
            && criteria.matches_rule(self.rule())
            && criteria.matches_detection_system(&self.detection_system.detection_system_id)
            && criteria.matches_timestamp(self.timestamp)
    }
}

impl Searchable for Response {
    fn matches(&self, criteria: &SearchCriteria) -> bool {
        criteria.matches_user(&self.user)
            && criteria.matches_detection_point(self.detection_point())
            && criteria.matches_rule(self.rule())
            && criteria.matches_detection_system(&self.detection_system.detection_system_id)
            && criteria.matches_timestamp(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttackTrigger, DetectionPoint, DetectionSystem, Rule, User};
    use chrono::{Duration, Utc};

    #[test]
    fn test_attack_matching_by_trigger() {
        let now = Utc::now();
        let rule = Rule::new("rule-1", None, vec![]);
        let point = DetectionPoint::new("Input Validation", "IE1");

        let rule_attack = Attack::new(User::new("bob"), AttackTrigger::Rule(rule.clone()), now, DetectionSystem::new("app"));
        let point_attack = Attack::new(User::new("bob"), AttackTrigger::DetectionPoint(point.clone()), now, DetectionSystem::new("app"));

        let by_rule = SearchCriteria::new().user(&User::new("bob")).rule(&rule);
        assert!(rule_attack.matches(&by_rule));
        assert!(!point_attack.matches(&by_rule));

        let by_point = SearchCriteria::new().detection_point(&point);
        assert!(point_attack.matches(&by_point));
        assert!(!rule_attack.matches(&by_point));

        let later = SearchCriteria::new().earliest(now + Duration::milliseconds(1));
        assert!(!point_attack.matches(&later));
    }
}
