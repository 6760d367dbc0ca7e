//! Raíz de composición: construye stores y motores y los conecta.

use crate::access::{AccessContext, AccessController, Action, ReferenceAccessController};
use crate::alerting::{NoopResponseObserver, ResponseSelector};
use crate::config::ServerConfiguration;
use crate::criteria::SearchCriteria;
use crate::detector::{RuleCorrelationEngine, StatisticalThresholdEngine};
use crate::error::{IdsError, Result};
use crate::model::{Attack, DetectionSystem, Event, Response};
use crate::storage::{AttackStore, EventStore, ResponseStore, StorageConfig, StorageManager};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Servidor de detección en proceso
pub struct IdsServer {
    config: Arc<ServerConfiguration>,
    storage: StorageManager,
    access: Arc<dyn AccessController>,
}

impl IdsServer {
    pub fn new(config: Arc<ServerConfiguration>, storage: StorageConfig) -> Result<Self> {
        let access = Arc::new(ReferenceAccessController::new(config.clone()));
        Self::with_access_controller(config, StorageManager::with_config(storage)?, access)
    }

    pub fn with_access_controller(
        config: Arc<ServerConfiguration>,
        storage: StorageManager,
        access: Arc<dyn AccessController>,
    ) -> Result<Self> {
        config.validate()?;

        let event_store = storage.event_store();
        let attack_store = storage.attack_store();
        let response_store = storage.response_store();

        event_store.register_listener(Arc::new(StatisticalThresholdEngine::new(
            config.clone(),
            event_store.clone(),
            attack_store.clone(),
        )));
        event_store.register_listener(Arc::new(RuleCorrelationEngine::new(
            config.clone(),
            event_store.clone(),
            attack_store.clone(),
        )));
        attack_store.register_listener(Arc::new(ResponseSelector::new(config.clone(), response_store.clone())));
        response_store.register_listener(Arc::new(NoopResponseObserver::new()));

        tracing::info!(
            "IDS server ready: {} detection point(s), {} rule(s)",
            config.detection_points().len(),
            config.rules().len()
        );

        Ok(Self {
            config,
            storage,
            access,
        })
    }

    fn authorize(&self, client_application: &str, action: Action) -> Result<()> {
        if self.access.is_authorized(client_application, action, &AccessContext::new()) {
            Ok(())
        } else {
            Err(IdsError::NotAuthorized {
                client: client_application.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Stores an event reported by `client_application` and runs the whole
    /// analysis chain before returning.
    pub async fn add_event(&self, client_application: &str, mut event: Event) -> Result<()> {
        self.authorize(client_application, Action::AddEvent)?;
        tag_detection_system(&mut event.detection_system, client_application);
        self.storage.event_store().add_event(event).await
    }

    pub async fn add_attack(&self, client_application: &str, mut attack: Attack) -> Result<()> {
        self.authorize(client_application, Action::AddAttack)?;
        tag_detection_system(&mut attack.detection_system, client_application);
        self.storage.attack_store().add_attack(attack).await
    }

    /// Responses for the client's detection system at or after `earliest`.
    pub async fn get_responses(&self, client_application: &str, earliest: DateTime<Utc>) -> Result<Vec<Response>> {
        self.authorize(client_application, Action::GetResponses)?;
        let criteria = SearchCriteria::new()
            .detection_system_ids([client_application.to_string()].into_iter().collect())
            .earliest(earliest);
        self.storage.response_store().find_responses(&criteria).await
    }

    pub fn config(&self) -> &Arc<ServerConfiguration> {
        &self.config
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn event_store(&self) -> Arc<dyn EventStore> {
        self.storage.event_store()
    }

    pub fn attack_store(&self) -> Arc<dyn AttackStore> {
        self.storage.attack_store()
    }

    pub fn response_store(&self) -> Arc<dyn ResponseStore> {
        self.storage.response_store()
    }
}

// The reporting client is the detection system of record.
fn tag_detection_system(system: &mut DetectionSystem, client_application: &str) {
    if system.detection_system_id.is_empty() {
        system.detection_system_id = client_application.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::model::{Clause, DetectionPoint, Expression, Interval, ResponseTemplate, Rule, Threshold, User};
    use chrono::Duration;

    fn ie1() -> DetectionPoint {
        DetectionPoint::new("Input Validation", "IE1")
    }

    fn config() -> ServerConfiguration {
        ServerConfiguration::new(
            vec![ie1()
                .with_threshold(Threshold::new(3, Interval::minutes(5)))
                .with_responses(vec![
                    ResponseTemplate::new("log"),
                    ResponseTemplate::new("logout"),
                ])],
            vec![],
        )
        .with_client_application("app1", vec![Role::AddEvent, Role::AddAttack, Role::GetResponses])
        .with_client_application("reporter", vec![Role::AddEvent])
    }

    fn event(user: &str, point: DetectionPoint, at: DateTime<Utc>) -> Event {
        Event::new(User::new(user), point, at, DetectionSystem::new("app1"))
    }

    #[tokio::test]
    async fn test_bob_ie1_end_to_end() {
        let server = IdsServer::new(Arc::new(config()), StorageConfig::default()).unwrap();
        let start = Utc::now() - Duration::minutes(3);

        for i in 0..3 {
            server
                .add_event("app1", event("bob", ie1(), start + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let attacks = server.attack_store().find_attacks(&SearchCriteria::new()).await.unwrap();
        assert_eq!(attacks.len(), 1);
        assert_eq!(attacks[0].name(), "IE1");

        let responses = server.get_responses("app1", start).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].action, "log");
        assert_eq!(responses[0].user.username, "bob");

        for i in 3..6 {
            server
                .add_event("app1", event("bob", ie1(), start + Duration::seconds(i)))
                .await
                .unwrap();
        }
        let actions: Vec<String> = server
            .get_responses("app1", start)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(actions, vec!["log", "logout"]);
    }

    #[tokio::test]
    async fn test_rule_attack_end_to_end() {
        let dp1 = DetectionPoint::new("Input Validation", "DP1")
            .with_threshold(Threshold::new(3, Interval::minutes(5)))
            .with_guid("mp-1");
        let dp2 = DetectionPoint::new("Input Validation", "DP2")
            .with_threshold(Threshold::new(12, Interval::minutes(5)))
            .with_guid("mp-2");
        let rule = Rule::new(
            "rule-1",
            Some(Interval::minutes(30)),
            vec![Expression::new(Some(Interval::minutes(16)), vec![Clause::new(vec![dp1, dp2])])],
        )
        .with_responses(vec![ResponseTemplate::new("disableUser").with_interval(Interval::minutes(10))]);
        let config = ServerConfiguration::new(vec![], vec![rule])
            .with_client_application("app1", vec![Role::AddEvent, Role::GetResponses]);
        let server = IdsServer::new(Arc::new(config), StorageConfig::default()).unwrap();

        let base = Utc::now() - Duration::minutes(5);
        for i in 0..3 {
            let dp = DetectionPoint::new("Input Validation", "DP1");
            server.add_event("app1", event("bob", dp, base + Duration::seconds(i))).await.unwrap();
        }
        for i in 0..12 {
            let dp = DetectionPoint::new("Input Validation", "DP2");
            server.add_event("app1", event("bob", dp, base + Duration::seconds(10 + i))).await.unwrap();
        }

        let responses = server.get_responses("app1", base).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].action, "disableUser");
        assert_eq!(responses[0].rule().unwrap().guid, "rule-1");
    }

    #[tokio::test]
    async fn test_unauthorized_client_is_rejected() {
        let server = IdsServer::new(Arc::new(config()), StorageConfig::default()).unwrap();

        let err = server.add_event("stranger", event("bob", ie1(), Utc::now())).await.unwrap_err();
        assert!(matches!(err, IdsError::NotAuthorized { .. }));

        let err = server.get_responses("reporter", Utc::now()).await.unwrap_err();
        assert!(matches!(err, IdsError::NotAuthorized { .. }));

        let stored = server.event_store().count_events(&SearchCriteria::new()).await.unwrap();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_configuration_error_propagates_to_caller() {
        let config = ServerConfiguration::new(
            vec![ie1().with_threshold(Threshold::new(1, Interval::minutes(5)))],
            vec![],
        )
        .with_client_application("app1", vec![Role::AddEvent]);
        let server = IdsServer::new(Arc::new(config), StorageConfig::default()).unwrap();

        let err = server.add_event("app1", event("bob", ie1(), Utc::now())).await.unwrap_err();
        assert!(err.is_configuration());
        // event and attack were stored before the selector failed
        assert_eq!(server.attack_store().count_attacks(&SearchCriteria::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_configuration_error_does_not_skip_rule_engine() {
        let monitored = ie1()
            .with_threshold(Threshold::new(1, Interval::minutes(5)))
            .with_guid("mp-ie1");
        let rule = Rule::new(
            "rule-1",
            None,
            vec![Expression::new(None, vec![Clause::new(vec![monitored])])],
        )
        .with_responses(vec![ResponseTemplate::new("log")]);
        let config = ServerConfiguration::new(
            vec![ie1().with_threshold(Threshold::new(1, Interval::minutes(5)))],
            vec![rule],
        )
        .with_client_application("app1", vec![Role::AddEvent, Role::GetResponses]);
        let server = IdsServer::new(Arc::new(config), StorageConfig::default()).unwrap();
        let start = Utc::now() - Duration::seconds(1);

        let err = server.add_event("app1", event("bob", ie1(), Utc::now())).await.unwrap_err();
        assert!(err.is_configuration());

        let attacks = server.attack_store().find_attacks(&SearchCriteria::new()).await.unwrap();
        assert_eq!(attacks.len(), 2);
        assert_eq!(attacks.iter().filter(|a| a.rule().is_some()).count(), 1);

        let responses = server.get_responses("app1", start).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].action, "log");
    }

    #[tokio::test]
    async fn test_very_long_rule_window_does_not_overflow() {
        use crate::model::IntervalUnit;
        let monitored = ie1()
            .with_threshold(Threshold::new(1, Interval::minutes(5)))
            .with_guid("mp-ie1");
        let rule = Rule::new(
            "rule-1",
            Some(Interval::new(100_000_000, IntervalUnit::Days)),
            vec![Expression::new(
                Some(Interval::new(100_000_000, IntervalUnit::Days)),
                vec![Clause::new(vec![monitored])],
            )],
        )
        .with_responses(vec![ResponseTemplate::new("log").with_interval(Interval::new(100_000_000, IntervalUnit::Days))]);
        let config = ServerConfiguration::new(vec![], vec![rule])
            .with_client_application("app1", vec![Role::AddEvent, Role::GetResponses]);
        let server = IdsServer::new(Arc::new(config), StorageConfig::default()).unwrap();

        server.add_event("app1", event("bob", ie1(), Utc::now())).await.unwrap();

        let responses = server.get_responses("app1", Utc::now() - Duration::minutes(1)).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].is_active());
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let config = ServerConfiguration::new(vec![], vec![Rule::new("empty", None, vec![])]);
        assert!(IdsServer::new(Arc::new(config), StorageConfig::default()).is_err());
    }
}
