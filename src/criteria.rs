use crate::model::{DetectionPoint, Rule, User};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;

/// Descriptor de búsqueda consumido por los stores.
///
/// Se construye encadenando métodos y no se modifica después.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    user: Option<User>,
    rule: Option<Rule>,
    detection_point: Option<DetectionPoint>,
    detection_system_ids: HashSet<String>,
    earliest: Option<DateTime<Utc>>,
    earliest_inclusive: bool,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: &User) -> Self {
        self.user = Some(user.clone());
        self
    }

    /// Assigning a rule re-applies `earliest` in inclusive mode, even when it was
    /// previously set exclusive.
    pub fn rule(mut self, rule: &Rule) -> Self {
        self.rule = Some(rule.clone());
        if let Some(earliest) = self.earliest {
            self = self.earliest(earliest);
        }
        self
    }

    pub fn detection_point(mut self, detection_point: &DetectionPoint) -> Self {
        self.detection_point = Some(detection_point.clone());
        self
    }

    pub fn detection_system_ids(mut self, ids: HashSet<String>) -> Self {
        self.detection_system_ids = ids;
        self
    }

    /// Entities at or after `earliest` match.
    pub fn earliest(mut self, earliest: DateTime<Utc>) -> Self {
        self.earliest = Some(earliest);
        self.earliest_inclusive = true;
        self
    }

    /// Only entities strictly after `earliest` match.
    pub fn earliest_exclusive(mut self, earliest: DateTime<Utc>) -> Self {
        self.earliest = Some(earliest);
        self.earliest_inclusive = false;
        self
    }

    pub fn get_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn get_rule(&self) -> Option<&Rule> {
        self.rule.as_ref()
    }

    pub fn get_detection_point(&self) -> Option<&DetectionPoint> {
        self.detection_point.as_ref()
    }

    pub fn get_detection_system_ids(&self) -> &HashSet<String> {
        &self.detection_system_ids
    }

    pub fn get_earliest(&self) -> Option<DateTime<Utc>> {
        self.earliest
    }

    pub fn is_earliest_inclusive(&self) -> bool {
        self.earliest_inclusive
    }

    pub fn earliest_rfc3339(&self) -> Option<String> {
        self.earliest
            .map(|e| e.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn matches_user(&self, user: &User) -> bool {
        self.user.as_ref().map_or(true, |u| u == user)
    }

    pub fn matches_detection_system(&self, detection_system_id: &str) -> bool {
        self.detection_system_ids.is_empty() || self.detection_system_ids.contains(detection_system_id)
    }

    pub fn matches_timestamp(&self, timestamp: DateTime<Utc>) -> bool {
        match self.earliest {
            Some(earliest) if self.earliest_inclusive => timestamp >= earliest,
            Some(earliest) => timestamp > earliest,
            None => true,
        }
    }

    /// `None` means the entity carries no detection point.
    pub fn matches_detection_point(&self, detection_point: Option<&DetectionPoint>) -> bool {
        match (&self.detection_point, detection_point) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted.type_matches(actual),
            (Some(_), None) => false,
        }
    }

    pub fn matches_rule(&self, rule: Option<&Rule>) -> bool {
        match (&self.rule, rule) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted.guid == actual.guid,
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_rule_resets_earliest_to_inclusive() {
        let t = Utc::now();
        let rule = Rule::new("rule-1", None, vec![]);

        let criteria = SearchCriteria::new().earliest_exclusive(t);
        assert!(!criteria.is_earliest_inclusive());
        assert!(!criteria.matches_timestamp(t));

        let criteria = criteria.rule(&rule);
        assert!(criteria.is_earliest_inclusive());
        assert!(criteria.matches_timestamp(t));
        assert_eq!(criteria.get_earliest(), Some(t));
    }

    #[test]
    fn test_rule_without_earliest_leaves_it_unset() {
        let rule = Rule::new("rule-1", None, vec![]);
        let criteria = SearchCriteria::new().rule(&rule);
        assert!(criteria.get_earliest().is_none());
        assert!(criteria.earliest_rfc3339().is_none());
        assert!(criteria.matches_timestamp(Utc::now() - Duration::days(365)));
    }

    #[test]
    fn test_exclusive_earliest_set_after_rule_is_kept() {
        let t = Utc::now();
        let rule = Rule::new("rule-1", None, vec![]);
        let criteria = SearchCriteria::new().rule(&rule).earliest_exclusive(t);
        assert!(!criteria.is_earliest_inclusive());
    }

    #[test]
    fn test_unset_fields_match_anything() {
        let criteria = SearchCriteria::new();
        assert!(criteria.matches_user(&User::new("anyone")));
        assert!(criteria.matches_detection_system("any-system"));
        assert!(criteria.matches_detection_point(None));
        assert!(criteria.matches_rule(None));
    }

    #[test]
    fn test_detection_point_and_systems() {
        let ids: HashSet<String> = ["app1".to_string(), "app2".to_string()].into_iter().collect();
        let criteria = SearchCriteria::new()
            .detection_point(&DetectionPoint::new("Input Validation", "IE1"))
            .detection_system_ids(ids);

        assert!(criteria.matches_detection_system("app2"));
        assert!(!criteria.matches_detection_system("app3"));
        assert!(criteria.matches_detection_point(Some(&DetectionPoint::new("Input Validation", "IE1"))));
        assert!(!criteria.matches_detection_point(Some(&DetectionPoint::new("Input Validation", "IE2"))));
        assert!(!criteria.matches_detection_point(None));
    }

    #[test]
    fn test_earliest_rfc3339() {
        let t = DateTime::parse_from_rfc3339("2024-03-01T12:00:00.250Z").unwrap().with_timezone(&Utc);
        let criteria = SearchCriteria::new().earliest(t);
        assert_eq!(criteria.earliest_rfc3339().as_deref(), Some("2024-03-01T12:00:00.250Z"));
    }
}
