//! Motores de análisis que reciben los registros recién almacenados.

pub mod correlation;
pub mod notification;
pub mod statistical;

use crate::error::Result;
use crate::model::{Attack, Event, Response};
use async_trait::async_trait;

pub use correlation::RuleCorrelationEngine;
pub use notification::{build_notifications, evaluate_expressions};
pub use statistical::StatisticalThresholdEngine;

/// Listener del store de eventos
#[async_trait]
pub trait EventAnalysisEngine: Send + Sync {
    async fn analyze(&self, event: &Event) -> Result<()>;
}

/// Listener del store de ataques
#[async_trait]
pub trait AttackAnalysisEngine: Send + Sync {
    async fn analyze(&self, attack: &Attack) -> Result<()>;
}

/// Listener del store de respuestas
#[async_trait]
pub trait ResponseAnalysisEngine: Send + Sync {
    async fn analyze(&self, response: &Response) -> Result<()>;
}
