//! Configuración del servidor: puntos de detección, reglas, conjuntos de
//! correlación y aplicaciones cliente.
//!
//! Se carga desde TOML o JSON según la extensión del archivo y es de solo
//! lectura para los motores de análisis.

use crate::access::Role;
use crate::error::{IdsError, Result};
use crate::model::{DetectionPoint, DetectionSystem, Event, Interval, ResponseTemplate, Rule};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Grupo de aplicaciones cliente tratadas como una sola fuente
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationSet {
    pub client_applications: Vec<String>,
}

/// Aplicación cliente autorizada a hablar con el servidor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientApplication {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Configuración completa consumida por los motores
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfiguration {
    #[serde(default, deserialize_with = "detection_point_collection")]
    detection_points: Vec<DetectionPoint>,
    #[serde(default, deserialize_with = "custom_detection_point_collections")]
    custom_detection_points: HashMap<String, Vec<DetectionPoint>>,
    #[serde(default)]
    rules: Vec<Rule>,
    #[serde(default)]
    correlation_sets: Vec<CorrelationSet>,
    #[serde(default)]
    client_applications: Vec<ClientApplication>,
}

/// Detection points may be listed, or keyed by label. A keyed entry with an
/// empty label takes the key as its label.
#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionPointCollection {
    List(Vec<DetectionPoint>),
    Keyed(BTreeMap<String, DetectionPoint>),
}

impl DetectionPointCollection {
    fn into_points(self) -> Vec<DetectionPoint> {
        match self {
            DetectionPointCollection::List(points) => points,
            DetectionPointCollection::Keyed(points) => points
                .into_iter()
                .map(|(key, mut point)| {
                    if point.label.is_empty() {
                        point.label = key;
                    }
                    point
                })
                .collect(),
        }
    }
}

fn detection_point_collection<'de, D>(deserializer: D) -> std::result::Result<Vec<DetectionPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(DetectionPointCollection::deserialize(deserializer)?.into_points())
}

fn custom_detection_point_collections<'de, D>(
    deserializer: D,
) -> std::result::Result<HashMap<String, Vec<DetectionPoint>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, DetectionPointCollection>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(client, points)| (client, points.into_points())).collect())
}

impl ServerConfiguration {
    pub fn new(detection_points: Vec<DetectionPoint>, rules: Vec<Rule>) -> Self {
        Self {
            detection_points,
            rules,
            ..Default::default()
        }
    }

    pub fn with_custom_detection_points(mut self, client: impl Into<String>, points: Vec<DetectionPoint>) -> Self {
        self.custom_detection_points.insert(client.into(), points);
        self
    }

    pub fn with_correlation_set(mut self, client_applications: Vec<String>) -> Self {
        self.correlation_sets.push(CorrelationSet { client_applications });
        self
    }

    pub fn with_client_application(mut self, name: impl Into<String>, roles: Vec<Role>) -> Self {
        self.client_applications.push(ClientApplication { name: name.into(), roles });
        self
    }

    /// Carga y valida la configuración desde un archivo `.toml` o `.json`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| IdsError::ConfigLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let parsed = if is_toml {
            Self::from_toml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        };

        let config = parsed.map_err(|e| IdsError::ConfigLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;

        tracing::info!(
            "Loaded configuration from {}: {} detection points, {} rules, {} client applications",
            path.display(),
            config.detection_points.len(),
            config.rules.len(),
            config.client_applications.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Reports every structural problem found, not only the first one.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let custom = self.custom_detection_points.values().flatten();
        for point in self.detection_points.iter().chain(custom) {
            if point.category.trim().is_empty() {
                problems.push(format!("detection point '{}' has an empty category", point.label));
            }
            let owner = format!("detection point '{}'", point.label);
            if let Some(t) = &point.threshold {
                check_interval(&mut problems, &owner, &t.interval);
            }
            check_response_intervals(&mut problems, &owner, &point.responses);
        }

        let mut guids = HashSet::new();
        for rule in &self.rules {
            let name = rule.display_name();
            if !guids.insert(rule.guid.as_str()) {
                problems.push(format!("duplicate rule guid '{}'", rule.guid));
            }
            if rule.expressions.is_empty() {
                problems.push(format!("rule '{}' has no expressions", name));
            }
            let owner = format!("rule '{}'", name);
            if let Some(window) = &rule.window {
                check_interval(&mut problems, &owner, window);
            }
            check_response_intervals(&mut problems, &owner, &rule.responses);
            for (i, expression) in rule.expressions.iter().enumerate() {
                if expression.clauses.is_empty() {
                    problems.push(format!("rule '{}' expression {} has no clauses", name, i));
                }
                if let Some(window) = &expression.window {
                    check_interval(&mut problems, &format!("rule '{}' expression {}", name, i), window);
                }
                for clause in &expression.clauses {
                    if clause.monitor_points.is_empty() {
                        problems.push(format!("rule '{}' expression {} has an empty clause", name, i));
                    }
                    for point in &clause.monitor_points {
                        match &point.threshold {
                            Some(t) if t.count > 0 => check_interval(
                                &mut problems,
                                &format!("rule '{}' monitor point '{}'", name, point.label),
                                &t.interval,
                            ),
                            _ => problems.push(format!(
                                "rule '{}' monitor point '{}' needs a threshold with a positive count",
                                name, point.label
                            )),
                        }
                        if point.guid.as_deref().map_or(true, str::is_empty) {
                            problems.push(format!("rule '{}' monitor point '{}' has no guid", name, point.label));
                        }
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(IdsError::configuration(problems.join("; ")))
        }
    }

    pub fn detection_points(&self) -> &[DetectionPoint] {
        &self.detection_points
    }

    /// Configured points of the same type as `point`, scoped to the reporting
    /// system: client-specific points win over the global set when present.
    pub fn find_detection_points(&self, point: &DetectionPoint, detection_system_id: &str) -> Vec<&DetectionPoint> {
        if let Some(custom) = self.custom_detection_points.get(detection_system_id) {
            let matches: Vec<&DetectionPoint> = custom.iter().filter(|p| p.type_matches(point)).collect();
            if !matches.is_empty() {
                return matches;
            }
        }

        self.detection_points
            .iter()
            .filter(|p| p.type_matches(point))
            .collect()
    }

    /// Configured point with the same type and threshold, used to look up responses.
    pub fn find_configured_detection_point(
        &self,
        point: &DetectionPoint,
        detection_system_id: &str,
    ) -> Option<&DetectionPoint> {
        self.custom_detection_points
            .get(detection_system_id)
            .into_iter()
            .flatten()
            .chain(self.detection_points.iter())
            .find(|p| p.type_and_threshold_matches(point))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn find_rules(&self, trigger: &Event) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.type_matches_detection_point(&trigger.detection_point))
            .collect()
    }

    pub fn find_rule(&self, guid: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.guid == guid)
    }

    /// Ids treated as the same source as `system`, always including its own id.
    pub fn related_detection_systems(&self, system: &DetectionSystem) -> HashSet<String> {
        let id = &system.detection_system_id;
        let mut related: HashSet<String> = HashSet::new();
        related.insert(id.clone());

        for set in &self.correlation_sets {
            if set.client_applications.iter().any(|c| c == id) {
                related.extend(set.client_applications.iter().cloned());
            }
        }

        related
    }

    pub fn client_application(&self, name: &str) -> Option<&ClientApplication> {
        self.client_applications.iter().find(|c| c.name == name)
    }
}

fn check_interval(problems: &mut Vec<String>, owner: &str, interval: &Interval) {
    if interval.checked_millis().is_none() {
        problems.push(format!("{} has an interval too large to represent ({})", owner, interval));
    }
}

fn check_response_intervals(problems: &mut Vec<String>, owner: &str, responses: &[ResponseTemplate]) {
    for response in responses {
        if let Some(interval) = &response.interval {
            check_interval(problems, &format!("{} response '{}'", owner, response.action), interval);
        }
    }
}
