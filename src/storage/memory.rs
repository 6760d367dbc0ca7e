use super::{AttackStore, EventStore, ResponseStore, Searchable};
use crate::criteria::SearchCriteria;
use crate::detector::{AttackAnalysisEngine, EventAnalysisEngine, ResponseAnalysisEngine};
use crate::error::{IdsError, Result};
use crate::model::{Attack, Event, Response};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;

/// Configuración para el storage en memoria
#[derive(Clone, Debug)]
pub struct MemoryStorageConfig {
    /// Máximo número de eventos en memoria
    pub max_events: usize,
    /// Máximo número de ataques en memoria
    pub max_attacks: usize,
    /// Máximo número de respuestas en memoria
    pub max_responses: usize,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            max_attacks: 10_000,
            max_responses: 10_000,
        }
    }
}

/// Registro acotado; al llenarse descarta el elemento más antiguo
struct BoundedLog<T> {
    kind: &'static str,
    records: RwLock<VecDeque<T>>,
    capacity: usize,
}

impl<T: Searchable + Clone> BoundedLog<T> {
    fn new(kind: &'static str, capacity: usize) -> Self {
        Self {
            kind,
            records: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    fn checked(kind: &'static str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(IdsError::Store(format!("{} store capacity must be positive", kind)));
        }
        Ok(Self::new(kind, capacity))
    }

    async fn append(&self, record: T) -> usize {
        let mut records = self.records.write().await;

        if records.len() >= self.capacity {
            records.pop_front();
            tracing::debug!("{} store at capacity ({}), evicted oldest record", self.kind, self.capacity);
        }

        records.push_back(record);
        records.len()
    }

    async fn find(&self, criteria: &SearchCriteria) -> Vec<T> {
        let records = self.records.read().await;
        records.iter().filter(|r| r.matches(criteria)).cloned().collect()
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

/// Lista de listeners, solo se agrega durante el arranque
struct Listeners<L: ?Sized> {
    inner: StdRwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> Listeners<L> {
    fn new() -> Self {
        Self {
            inner: StdRwLock::new(Vec::new()),
        }
    }

    fn register(&self, listener: Arc<L>) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).push(listener);
    }

    // Snapshot so no lock is held while listeners run.
    fn snapshot(&self) -> Vec<Arc<L>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Store de eventos en memoria
pub struct MemoryEventStore {
    log: BoundedLog<Event>,
    listeners: Listeners<dyn EventAnalysisEngine>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            log: BoundedLog::new("event", MemoryStorageConfig::default().max_events),
            listeners: Listeners::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            log: BoundedLog::checked("event", capacity)?,
            listeners: Listeners::new(),
        })
    }

    pub async fn len(&self) -> usize {
        self.log.len().await
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn add_event(&self, event: Event) -> Result<()> {
        let total = self.log.append(event.clone()).await;
        tracing::debug!("Stored event {} for user {} (total: {})", event.id, event.user.username, total);

        // Every listener runs; the first failure is reported afterwards.
        let mut first_error = None;
        for listener in self.listeners.snapshot() {
            if let Err(e) = listener.analyze(&event).await {
                tracing::error!("Event listener failed for event {}: {}", event.id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn find_events(&self, criteria: &SearchCriteria) -> Result<Vec<Event>> {
        Ok(self.log.find(criteria).await)
    }

    fn register_listener(&self, listener: Arc<dyn EventAnalysisEngine>) {
        self.listeners.register(listener);
    }
}

/// Store de ataques en memoria
pub struct MemoryAttackStore {
    log: BoundedLog<Attack>,
    listeners: Listeners<dyn AttackAnalysisEngine>,
}

impl MemoryAttackStore {
    pub fn new() -> Self {
        Self {
            log: BoundedLog::new("attack", MemoryStorageConfig::default().max_attacks),
            listeners: Listeners::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            log: BoundedLog::checked("attack", capacity)?,
            listeners: Listeners::new(),
        })
    }

    pub async fn len(&self) -> usize {
        self.log.len().await
    }
}

impl Default for MemoryAttackStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttackStore for MemoryAttackStore {
    async fn add_attack(&self, attack: Attack) -> Result<()> {
        let total = self.log.append(attack.clone()).await;
        tracing::info!("Attack '{}' stored for user {} (total: {})", attack.name(), attack.user.username, total);

        // Every listener runs; the first failure is reported afterwards.
        let mut first_error = None;
        for listener in self.listeners.snapshot() {
            if let Err(e) = listener.analyze(&attack).await {
                tracing::error!("Attack listener failed for attack {}: {}", attack.id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn find_attacks(&self, criteria: &SearchCriteria) -> Result<Vec<Attack>> {
        Ok(self.log.find(criteria).await)
    }

    fn register_listener(&self, listener: Arc<dyn AttackAnalysisEngine>) {
        self.listeners.register(listener);
    }
}

/// Store de respuestas en memoria
pub struct MemoryResponseStore {
    log: BoundedLog<Response>,
    listeners: Listeners<dyn ResponseAnalysisEngine>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self {
            log: BoundedLog::new("response", MemoryStorageConfig::default().max_responses),
            listeners: Listeners::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            log: BoundedLog::checked("response", capacity)?,
            listeners: Listeners::new(),
        })
    }

    pub async fn len(&self) -> usize {
        self.log.len().await
    }
}

impl Default for MemoryResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn add_response(&self, response: Response) -> Result<()> {
        let total = self.log.append(response.clone()).await;
        tracing::debug!("Stored response '{}' for user {} (total: {})", response.action, response.user.username, total);

        // Every listener runs; the first failure is reported afterwards.
        let mut first_error = None;
        for listener in self.listeners.snapshot() {
            if let Err(e) = listener.analyze(&response).await {
                tracing::error!("Response listener failed for response {}: {}", response.id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn find_responses(&self, criteria: &SearchCriteria) -> Result<Vec<Response>> {
        Ok(self.log.find(criteria).await)
    }

    fn register_listener(&self, listener: Arc<dyn ResponseAnalysisEngine>) {
        self.listeners.register(listener);
    }
}
