use crate::config::ServerConfiguration;
use crate::criteria::SearchCriteria;
use crate::detector::AttackAnalysisEngine;
use crate::error::{IdsError, Result};
use crate::model::{Attack, AttackTrigger, Response, ResponseSource, ResponseTemplate};
use crate::storage::ResponseStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Selecciona la respuesta para cada ataque: recorre las respuestas
/// configuradas en orden y repite la última cuando ya se usaron todas.
pub struct ResponseSelector {
    config: Arc<ServerConfiguration>,
    response_store: Arc<dyn ResponseStore>,
}

impl ResponseSelector {
    pub fn new(config: Arc<ServerConfiguration>, response_store: Arc<dyn ResponseStore>) -> Self {
        Self {
            config,
            response_store,
        }
    }

    pub async fn find_appropriate_response(&self, attack: &Attack) -> Result<Response> {
        let systems = self.config.related_detection_systems(&attack.detection_system);
        let criteria = SearchCriteria::new()
            .user(&attack.user)
            .detection_system_ids(systems);

        let (criteria, candidates, source, name) = match &attack.trigger {
            AttackTrigger::DetectionPoint(point) => {
                let candidates = self
                    .config
                    .find_configured_detection_point(point, &attack.detection_system.detection_system_id)
                    .map(|configured| configured.responses.clone())
                    .unwrap_or_else(|| point.responses.clone());
                (
                    criteria.detection_point(point),
                    candidates,
                    ResponseSource::DetectionPoint(point.clone()),
                    point.label.clone(),
                )
            }
            AttackTrigger::Rule(rule) => {
                let candidates = self
                    .config
                    .find_rule(&rule.guid)
                    .map(|configured| configured.responses.clone())
                    .unwrap_or_else(|| rule.responses.clone());
                (
                    criteria.rule(rule),
                    candidates,
                    ResponseSource::Rule(rule.clone()),
                    rule.display_name().to_string(),
                )
            }
        };

        let previous = self.response_store.find_responses(&criteria).await?;
        let used: HashSet<&str> = previous.iter().map(|r| r.action.as_str()).collect();

        let template = select_template(&candidates, &used)
            .ok_or_else(|| IdsError::configuration(format!("No responses configured for {}", name)))?;

        Ok(Response::new(
            attack.user.clone(),
            template.action.clone(),
            attack.timestamp,
            attack.detection_system.clone(),
        )
        .with_interval(template.interval)
        .with_source(source))
    }
}

/// First candidate whose action has not been used yet, or the last candidate
/// once every action has been used. `None` only for an empty candidate list.
pub fn select_template<'a>(candidates: &'a [ResponseTemplate], used: &HashSet<&str>) -> Option<&'a ResponseTemplate> {
    candidates
        .iter()
        .find(|c| !used.contains(c.action.as_str()))
        .or_else(|| candidates.last())
}

#[async_trait]
impl AttackAnalysisEngine for ResponseSelector {
    async fn analyze(&self, attack: &Attack) -> Result<()> {
        let response = self.find_appropriate_response(attack).await?;
        tracing::info!(
            "Response '{}' selected for attack '{}' on user <{}>",
            response.action,
            attack.name(),
            attack.user.username
        );
        self.response_store.add_response(response).await
    }
}
