//! Motor de detección de intrusiones a nivel de aplicación.
//!
//! Las aplicaciones cliente reportan eventos asociados a puntos de detección.
//! El motor decide, por umbrales estadísticos o por reglas de correlación, si
//! una secuencia de eventos constituye un ataque y selecciona la respuesta.

pub mod access;
pub mod alerting;
pub mod config;
pub mod criteria;
pub mod detector;
pub mod error;
pub mod model;
pub mod server;
pub mod storage;

pub use access::{AccessContext, AccessController, Action, ReferenceAccessController, Role};
pub use alerting::{NoopResponseObserver, ResponseSelector};
pub use config::ServerConfiguration;
pub use criteria::SearchCriteria;
pub use detector::{
    AttackAnalysisEngine, EventAnalysisEngine, ResponseAnalysisEngine, RuleCorrelationEngine,
    StatisticalThresholdEngine,
};
pub use error::{IdsError, Result};
pub use server::IdsServer;
