use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::Adapter;

/// Identity of a registered adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub id: String,
    pub name: String,
}

/// Ordered set of adapters, built once at startup and then only read.
///
/// Registration order is dispatch order. Registering an id that is already
/// present replaces the earlier adapter in its original position.
#[derive(Default, Clone)]
pub struct Registry {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { adapters: Vec::new() }
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        match self.adapters.iter().position(|a| a.id() == adapter.id()) {
            Some(index) => {
                warn!(
                    adapter = %adapter.id(),
                    previous = %self.adapters[index].name(),
                    "Adapter id already registered, replacing"
                );
                self.adapters[index] = adapter;
            }
            None => {
                info!(adapter = %adapter.id(), name = %adapter.name(), "Registered adapter");
                self.adapters.push(adapter);
            }
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn Adapter>] {
        &self.adapters
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.iter().find(|a| a.id() == id)
    }

    pub fn summaries(&self) -> Vec<AdapterInfo> {
        self.adapters
            .iter()
            .map(|a| AdapterInfo {
                id: a.id().to_string(),
                name: a.name().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
