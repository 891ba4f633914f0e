//! Agent registry: role identifiers mapped to factories.
//!
//! The registry stores constructors, not instances. The runtime resolves
//! each registered role once, when it starts, and the resulting instance
//! lives inside that role's worker for the runtime's whole lifetime — one
//! instance per role per runtime, not per message, which is what lets
//! conversation history accumulate across turns. Re-registering a role
//! replaces the factory for runtimes started later; it never mutates an
//! already-constructed instance.

use crate::agents::Agent;
use std::collections::HashMap;

type AgentFactory = Box<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

/// Maps agent-type identifiers to zero-argument constructors
#[derive(Default)]
pub struct AgentRegistry {
    factories: HashMap<String, AgentFactory>,
    /// Registration order, for deterministic worker spawn order.
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a factory for a named role, replacing any previous one.
    pub fn register<F>(&mut self, type_id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    {
        let type_id = type_id.into();
        if self.factories.insert(type_id.clone(), Box::new(factory)).is_none() {
            self.order.push(type_id);
        }
    }

    /// Invoke the factory for a role, constructing a fresh instance on every
    /// call. The registry itself holds no instances: the runtime calls this
    /// once per role when it starts, and the worker it spawns keeps that
    /// instance for the runtime's lifetime. `None` when the role was never
    /// registered.
    pub fn resolve(&self, type_id: &str) -> Option<Box<dyn Agent>> {
        self.factories.get(type_id).map(|factory| factory())
    }

    /// Registered role identifiers, in registration order.
    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn is_registered(&self, type_id: &str) -> bool {
        self.factories.contains_key(type_id)
    }
}
