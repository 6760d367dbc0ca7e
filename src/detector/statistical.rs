use super::EventAnalysisEngine;
use crate::config::ServerConfiguration;
use crate::criteria::SearchCriteria;
use crate::error::Result;
use crate::model::{Attack, AttackTrigger, DetectionPoint, Event};
use crate::storage::{AttackStore, EventStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Motor de umbrales: dispara un ataque cada vez que el número de eventos de
/// un punto de detección alcanza un múltiplo de su umbral.
pub struct StatisticalThresholdEngine {
    config: Arc<ServerConfiguration>,
    event_store: Arc<dyn EventStore>,
    attack_store: Arc<dyn AttackStore>,
}

impl StatisticalThresholdEngine {
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

    /// Timestamp of the most recent attack for this user and configured point,
    /// or the minimum representable time when there is none.
    async fn last_attack_time(
        &self,
        event: &Event,
        configured: &DetectionPoint,
        systems: &HashSet<String>,
    ) -> Result<DateTime<Utc>> {
        let criteria = SearchCriteria::new()
            .user(&event.user)
            .detection_point(configured)
            .detection_system_ids(systems.clone());

        let attacks = self.attack_store.find_attacks(&criteria).await?;
        Ok(attacks
            .iter()
            .filter(|a| a.detection_point().is_some_and(|p| p.type_and_threshold_matches(configured)))
            .map(|a| a.timestamp)
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC))
    }
}

/// Counts events after the last attack and, when the interval is non-zero,
/// inside `[now - interval, now]`. A zero count is reported as one.
pub fn count_in_window(
    events: &[Event],
    last_attack: DateTime<Utc>,
    interval_ms: i64,
    now: DateTime<Utc>,
) -> u32 {
    let window_start = now
        .checked_sub_signed(chrono::Duration::milliseconds(interval_ms))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let count = events
        .iter()
        .filter(|e| e.timestamp > last_attack)
        .filter(|e| interval_ms <= 0 || (e.timestamp >= window_start && e.timestamp <= now))
        .count() as u32;

    count.max(1)
}

#[async_trait]
impl EventAnalysisEngine for StatisticalThresholdEngine {
    async fn analyze(&self, event: &Event) -> Result<()> {
        let systems = self.config.related_detection_systems(&event.detection_system);

        let criteria = SearchCriteria::new()
            .user(&event.user)
            .detection_point(&event.detection_point)
            .detection_system_ids(systems.clone());
        let events = self.event_store.find_events(&criteria).await?;

        let configured = self
            .config
            .find_detection_points(&event.detection_point, &event.detection_system.detection_system_id);

        if configured.is_empty() {
            tracing::info!(
                "Could not find detection point configured for this type: {}",
                event.detection_point.label
            );
            return Ok(());
        }

        let mut first_error = None;
        for point in configured {
            let threshold = match point.threshold {
                Some(t) if t.count > 0 => t,
                _ => {
                    tracing::warn!("Detection point {} has no usable threshold, skipping", point);
                    continue;
                }
            };

            let last_attack = self.last_attack_time(event, point, &systems).await?;
            let count = count_in_window(&events, last_attack, threshold.interval.to_millis(), Utc::now());

            tracing::debug!(
                "User {} has {} event(s) for {} (threshold {})",
                event.user.username,
                count,
                point.label,
                threshold.count
            );

            if count % threshold.count == 0 {
                tracing::info!(
                    "Violation observed for user <{}> on detection point {}, creating attack",
                    event.user.username,
                    point.label
                );
                let attack = Attack::from_event(event, AttackTrigger::DetectionPoint(point.clone()));
                if let Err(e) = self.attack_store.add_attack(attack).await {
                    tracing::error!("Attack on detection point {} could not be handled: {}", point.label, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionSystem, Interval, Threshold, User};
    use crate::storage::{MemoryAttackStore, MemoryEventStore};
    use chrono::Duration;

    fn ie1() -> DetectionPoint {
        DetectionPoint::new("Input Validation", "IE1")
    }

    fn setup() -> (Arc<MemoryEventStore>, Arc<MemoryAttackStore>) {
        let config = Arc::new(ServerConfiguration::new(
            vec![ie1().with_threshold(Threshold::new(3, Interval::minutes(5)))],
            vec![],
        ));
        let events = Arc::new(MemoryEventStore::new());
        let attacks = Arc::new(MemoryAttackStore::new());
        let engine = StatisticalThresholdEngine::new(config, events.clone(), attacks.clone());
        events.register_listener(Arc::new(engine));
        (events, attacks)
    }

    async fn send(events: &MemoryEventStore, user: &str, at: DateTime<Utc>) {
        let event = Event::new(User::new(user), ie1(), at, DetectionSystem::new("app1"));
        events.add_event(event).await.unwrap();
    }

    #[tokio::test]
    async fn test_attack_every_multiple_of_threshold() {
        let (events, attacks) = setup();
        let bob = SearchCriteria::new().user(&User::new("bob")).detection_point(&ie1());
        let base = Utc::now() - Duration::minutes(2);
        let mut offset = 0;
        let mut next = || {
            offset += 1;
            base + Duration::seconds(offset)
        };

        for _ in 0..2 {
            send(&events, "bob", next()).await;
        }
        assert_eq!(attacks.count_attacks(&bob).await.unwrap(), 0);

        send(&events, "bob", next()).await;
        let found = attacks.find_attacks(&bob).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user.username, "bob");
        assert_eq!(found[0].detection_point().unwrap().label, "IE1");

        for _ in 0..2 {
            send(&events, "bob", next()).await;
        }
        assert_eq!(attacks.count_attacks(&bob).await.unwrap(), 1);

        send(&events, "bob", next()).await;
        assert_eq!(attacks.count_attacks(&bob).await.unwrap(), 2);

        for _ in 0..2 {
            send(&events, "bob", next()).await;
        }
        assert_eq!(attacks.count_attacks(&bob).await.unwrap(), 2);

        send(&events, "bob", next()).await;
        assert_eq!(attacks.count_attacks(&bob).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_other_user_is_counted_separately() {
        let (events, attacks) = setup();
        let base = Utc::now() - Duration::minutes(1);

        send(&events, "bob", base).await;
        send(&events, "alice", base + Duration::seconds(1)).await;
        send(&events, "bob", base + Duration::seconds(2)).await;

        assert_eq!(attacks.count_attacks(&SearchCriteria::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_events_outside_interval_are_ignored() {
        let (events, attacks) = setup();
        let old = Utc::now() - Duration::minutes(30);

        send(&events, "bob", old).await;
        send(&events, "bob", old + Duration::seconds(1)).await;
        send(&events, "bob", Utc::now() - Duration::seconds(5)).await;

        assert_eq!(attacks.count_attacks(&SearchCriteria::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_point_is_not_an_error() {
        let (events, attacks) = setup();
        let event = Event::new(
            User::new("bob"),
            DetectionPoint::new("Input Validation", "IE9"),
            Utc::now(),
            DetectionSystem::new("app1"),
        );
        events.add_event(event).await.unwrap();
        assert_eq!(attacks.count_attacks(&SearchCriteria::new()).await.unwrap(), 0);
    }

    #[test]
    fn test_count_clamps_to_one() {
        let now = Utc::now();
        assert_eq!(count_in_window(&[], DateTime::<Utc>::MIN_UTC, 60_000, now), 1);

        let stale = Event::new(User::new("bob"), ie1(), now - Duration::hours(1), DetectionSystem::new("app1"));
        assert_eq!(count_in_window(&[stale.clone()], DateTime::<Utc>::MIN_UTC, 60_000, now), 1);
        assert_eq!(count_in_window(&[stale.clone(), stale], DateTime::<Utc>::MIN_UTC, 0, now), 2);
    }

    #[test]
    fn test_count_excludes_events_at_last_attack() {
        let now = Utc::now();
        let at = now - Duration::seconds(10);
        let events: Vec<Event> = (0..3)
            .map(|i| Event::new(User::new("bob"), ie1(), at + Duration::seconds(i), DetectionSystem::new("app1")))
            .collect();

        assert_eq!(count_in_window(&events, at, 300_000, now), 2);
    }
}
