use super::memory::{MemoryAttackStore, MemoryEventStore, MemoryResponseStore, MemoryStorageConfig};
use super::{AttackStore, EventStore, ResponseStore};
use crate::criteria::SearchCriteria;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuración del Storage Manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub max_events: Option<usize>,
    pub max_attacks: Option<usize>,
    pub max_responses: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let defaults = MemoryStorageConfig::default();
        Self {
            max_events: Some(defaults.max_events),
            max_attacks: Some(defaults.max_attacks),
            max_responses: Some(defaults.max_responses),
        }
    }
}

impl StorageConfig {
    fn memory_config(&self) -> MemoryStorageConfig {
        let mut memory_config = MemoryStorageConfig::default();
        if let Some(max_events) = self.max_events {
            memory_config.max_events = max_events;
        }
        if let Some(max_attacks) = self.max_attacks {
            memory_config.max_attacks = max_attacks;
        }
        if let Some(max_responses) = self.max_responses {
            memory_config.max_responses = max_responses;
        }
        memory_config
    }
}

/// Estadísticas de almacenamiento
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_events: usize,
    pub total_attacks: usize,
    pub total_responses: usize,
}

/// Agrupa los tres stores que comparten los motores
#[derive(Clone)]
pub struct StorageManager {
    event_store: Arc<dyn EventStore>,
    attack_store: Arc<dyn AttackStore>,
    response_store: Arc<dyn ResponseStore>,
    config: StorageConfig,
}

impl StorageManager {
    /// Crea un StorageManager en memoria con configuración por defecto
    pub fn new() -> Result<Self> {
        Self::with_config(StorageConfig::default())
    }

    /// Crea un StorageManager con configuración específica
    pub fn with_config(config: StorageConfig) -> Result<Self> {
        let memory_config = config.memory_config();

        let manager = Self {
            event_store: Arc::new(MemoryEventStore::with_capacity(memory_config.max_events)?),
            attack_store: Arc::new(MemoryAttackStore::with_capacity(memory_config.max_attacks)?),
            response_store: Arc::new(MemoryResponseStore::with_capacity(memory_config.max_responses)?),
            config,
        };

        tracing::info!(
            "Storage manager initialized (events: {}, attacks: {}, responses: {})",
            memory_config.max_events,
            memory_config.max_attacks,
            memory_config.max_responses
        );
        Ok(manager)
    }

    /// Usa stores provistos externamente
    pub fn from_stores(
        event_store: Arc<dyn EventStore>,
        attack_store: Arc<dyn AttackStore>,
        response_store: Arc<dyn ResponseStore>,
    ) -> Self {
        Self {
            event_store,
            attack_store,
            response_store,
            config: StorageConfig::default(),
        }
    }

    pub fn event_store(&self) -> Arc<dyn EventStore> {
        self.event_store.clone()
    }

    pub fn attack_store(&self) -> Arc<dyn AttackStore> {
        self.attack_store.clone()
    }

    pub fn response_store(&self) -> Arc<dyn ResponseStore> {
        self.response_store.clone()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Obtiene estadísticas de almacenamiento
    pub async fn get_stats(&self) -> Result<StorageStats> {
        let all = SearchCriteria::new();
        Ok(StorageStats {
            total_events: self.event_store.count_events(&all).await?,
            total_attacks: self.attack_store.count_attacks(&all).await?,
            total_responses: self.response_store.count_responses(&all).await?,
        })
    }
}

/// Utilidades para configuración
pub mod config {
    use super::*;

    /// Crea configuración en memoria reducida para desarrollo
    pub fn development_config() -> StorageConfig {
        StorageConfig {
            max_events: Some(10_000),
            max_attacks: Some(1_000),
            max_responses: Some(1_000),
        }
    }

    /// Crea configuración desde variables de entorno
    pub fn from_env() -> StorageConfig {
        from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`] but reading values through `lookup`. Unset or
    /// unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageConfig {
        let read = |name: &str| lookup(name).and_then(|s| s.parse().ok());
        let defaults = StorageConfig::default();

        StorageConfig {
            max_events: read("IDS_MAX_EVENTS").or(defaults.max_events),
            max_attacks: read("IDS_MAX_ATTACKS").or(defaults.max_attacks),
            max_responses: read("IDS_MAX_RESPONSES").or(defaults.max_responses),
        }
    }
}
