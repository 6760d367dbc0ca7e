use super::notification::{build_notifications, evaluate_expressions};
use super::EventAnalysisEngine;
use crate::config::ServerConfiguration;
use crate::criteria::SearchCriteria;
use crate::error::Result;
use crate::model::{Attack, AttackTrigger, Event, Rule};
use crate::storage::{AttackStore, EventStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

/// Motor de correlación: evalúa las reglas configuradas que involucran el
/// punto de detección del evento recibido.
pub struct RuleCorrelationEngine {
    config: Arc<ServerConfiguration>,
    event_store: Arc<dyn EventStore>,
    attack_store: Arc<dyn AttackStore>,
}

impl RuleCorrelationEngine {
    pub fn new(
        config: Arc<ServerConfiguration>,
        event_store: Arc<dyn EventStore>,
        attack_store: Arc<dyn AttackStore>,
    ) -> Self {
        Self {
            config,
            event_store,
            attack_store,
        }
    }

    /// True when the user's recent events satisfy every expression of `rule`
    /// in order.
    pub async fn check_rule(&self, event: &Event, rule: &Rule) -> Result<bool> {
        let systems = self.config.related_detection_systems(&event.detection_system);

        let earliest = self.earliest_bound(event, rule, Utc::now()).await?;

        let mut criteria = SearchCriteria::new()
            .user(&event.user)
            .detection_system_ids(systems);
        if let Some(earliest) = earliest {
            criteria = criteria.earliest(earliest);
        }

        let mut events = self.event_store.find_events(&criteria).await?;
        events.sort_by_key(|e| e.timestamp);

        let points = rule.all_detection_points();
        let notifications: VecDeque<_> = build_notifications(&events, &points).into();

        tracing::debug!(
            "Rule {} for user {}: {} event(s), {} notification(s)",
            rule.display_name(),
            event.user.username,
            events.len(),
            notifications.len()
        );

        Ok(evaluate_expressions(&rule.expressions, notifications))
    }

    /// Later of `now - rule.window` and one millisecond after the last attack
    /// this rule raised for the user. `None` when neither applies.
    async fn earliest_bound(&self, event: &Event, rule: &Rule, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let criteria = SearchCriteria::new()
            .user(&event.user)
            .rule(rule)
            .detection_system_ids(self.config.related_detection_systems(&event.detection_system));

        let last_attack = self
            .attack_store
            .find_attacks(&criteria)
            .await?
            .iter()
            .map(|a| a.timestamp)
            .max()
            .map(|t| t.checked_add_signed(Duration::milliseconds(1)).unwrap_or(t));

        let window_start = rule.window.map(|w| w.before(now));

        Ok(match (window_start, last_attack) {
            (Some(w), Some(a)) => Some(w.max(a)),
            (w, a) => w.or(a),
        })
    }
}

#[async_trait]
impl EventAnalysisEngine for RuleCorrelationEngine {
    async fn analyze(&self, event: &Event) -> Result<()> {
        let mut first_error = None;
        for rule in self.config.find_rules(event) {
            if self.check_rule(event, rule).await? {
                tracing::info!(
                    "Rule {} triggered for user <{}>, creating attack",
                    rule.display_name(),
                    event.user.username
                );
                let attack = Attack::from_event(event, AttackTrigger::Rule(rule.clone()));
                if let Err(e) = self.attack_store.add_attack(attack).await {
                    tracing::error!("Attack on rule {} could not be handled: {}", rule.display_name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
