//! Control de acceso para la capa de peticiones.
//!
//! Los motores de análisis nunca lo consultan; solo `IdsServer` lo usa antes
//! de aceptar eventos o ataques de una aplicación cliente.

use crate::config::ServerConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Roles asignables a una aplicación cliente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AddEvent,
    AddAttack,
    GetResponses,
    GetEvents,
    GetAttacks,
    ExecuteReport,
}

/// Operaciones que una aplicación cliente puede solicitar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AddEvent,
    AddAttack,
    GetResponses,
    GetEvents,
    GetAttacks,
    ExecuteReport,
}

impl Action {
    pub fn required_role(&self) -> Role {
        match self {
            Action::AddEvent => Role::AddEvent,
            Action::AddAttack => Role::AddAttack,
            Action::GetResponses => Role::GetResponses,
            Action::GetEvents => Role::GetEvents,
            Action::GetAttacks => Role::GetAttacks,
            Action::ExecuteReport => Role::ExecuteReport,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::AddEvent => "add_event",
            Action::AddAttack => "add_attack",
            Action::GetResponses => "get_responses",
            Action::GetEvents => "get_events",
            Action::GetAttacks => "get_attacks",
            Action::ExecuteReport => "execute_report",
        };
        f.write_str(name)
    }
}

/// Datos adicionales de la petición (no usados por el controlador de referencia)
pub type AccessContext = HashMap<String, String>;

pub trait AccessController: Send + Sync {
    fn is_authorized(&self, client_application: &str, action: Action, context: &AccessContext) -> bool;
}

/// Autoriza según los roles configurados para cada aplicación cliente
pub struct ReferenceAccessController {
    config: Arc<ServerConfiguration>,
}

impl ReferenceAccessController {
    pub fn new(config: Arc<ServerConfiguration>) -> Self {
        Self { config }
    }
}

impl AccessController for ReferenceAccessController {
    fn is_authorized(&self, client_application: &str, action: Action, _context: &AccessContext) -> bool {
        let authorized = self
            .config
            .client_application(client_application)
            .map(|client| client.roles.contains(&action.required_role()))
            .unwrap_or(false);

        if !authorized {
            tracing::warn!("Client application '{}' denied action {}", client_application, action);
        }
        authorized
    }
}
