use crate::detector::ResponseAnalysisEngine;
use crate::error::Result;
use crate::model::Response;
use async_trait::async_trait;

/// Observador de respuestas que solo registra en el log
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResponseObserver;

impl NoopResponseObserver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResponseAnalysisEngine for NoopResponseObserver {
    async fn analyze(&self, response: &Response) -> Result<()> {
        tracing::info!(
            "NO-OP response '{}' for user <{}> from {} - not executed",
            response.action,
            response.user.username,
            response.detection_system.detection_system_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionSystem, User};
    use chrono::Utc;

    #[tokio::test]
    async fn test_observer_accepts_any_response() {
        let response = Response::new(User::new("bob"), "logout", Utc::now(), DetectionSystem::new("app1"));
        assert!(NoopResponseObserver::new().analyze(&response).await.is_ok());
    }
}
