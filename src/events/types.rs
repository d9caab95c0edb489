//! Explicit event type registry.
//!
//! Each event type declares its direct supertypes at registration. The is-a
//! check walks this table instead of relying on runtime reflection, which
//! gives selectors and the read path a type hierarchy to match against.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

/// Type registry failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeRegistryError {
    #[error("Event type already registered: {0}")]
    Duplicate(String),

    #[error("Event type {event_type} declares unknown supertype {supertype}")]
    UnknownSupertype {
        event_type: String,
        supertype: String,
    },
}

/// Registered event types and their direct supertypes.
///
/// Supertypes must be registered before their subtypes, so the graph is
/// acyclic by construction.
#[derive(Debug, Clone, Default)]
pub struct EventTypes {
    supertypes: HashMap<String, Vec<String>>,
}

impl EventTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `event_type` with its direct supertypes.
    pub fn register(
        &mut self,
        event_type: &str,
        supertypes: &[&str],
    ) -> Result<(), TypeRegistryError> {
        if self.supertypes.contains_key(event_type) {
            return Err(TypeRegistryError::Duplicate(event_type.to_string()));
        }
        if let Some(unknown) = supertypes
            .iter()
            .find(|supertype| !self.supertypes.contains_key(**supertype))
        {
            return Err(TypeRegistryError::UnknownSupertype {
                event_type: event_type.to_string(),
                supertype: unknown.to_string(),
            });
        }

        debug!(event_type = %event_type, supertypes = ?supertypes, "Registering event type");
        self.supertypes.insert(
            event_type.to_string(),
            supertypes.iter().map(|s| s.to_string()).collect(),
        );
        Ok(())
    }

    /// Whether `event_type` resolves to a registered type.
    pub fn is_known(&self, event_type: &str) -> bool {
        self.supertypes.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.supertypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }

    /// Whether `candidate` equals or derives from `supertype`.
    ///
    /// Unregistered names only match by string equality.
    pub fn is_a(&self, candidate: &str, supertype: &str) -> bool {
        if candidate == supertype {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([candidate]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(parents) = self.supertypes.get(current) else {
                continue;
            };
            for parent in parents {
                if parent == supertype {
                    return true;
                }
                queue.push_back(parent.as_str());
            }
        }
        false
    }

    /// `event_type` followed by every registered type deriving from it.
    ///
    /// Used to widen an event literal into the set of stored type names it
    /// admits. Result is sorted after the leading literal.
    pub fn with_descendants(&self, event_type: &str) -> Vec<String> {
        let mut descendants: Vec<String> = self
            .supertypes
            .keys()
            .filter(|name| name.as_str() != event_type && self.is_a(name, event_type))
            .cloned()
            .collect();
        descendants.sort();

        let mut names = Vec::with_capacity(descendants.len() + 1);
        names.push(event_type.to_string());
        names.extend(descendants);
        names
    }
}
