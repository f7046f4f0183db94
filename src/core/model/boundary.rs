// src/core/model/boundary.rs
use std::collections::HashSet;

use crate::error::{Result, ThreatflowError};
use super::registry::{EntityId, Registry};

impl Registry {
    /// Enclosing boundaries of `id`, innermost first.
    ///
    /// Fails with [`ThreatflowError::CyclicBoundary`] naming the boundary that
    /// turned out to be its own ancestor.
    pub fn ancestors(&self, id: EntityId) -> Result<Vec<EntityId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get(id).boundary;

        while let Some(boundary) = current {
            if boundary == id || !seen.insert(boundary) {
                return Err(ThreatflowError::CyclicBoundary {
                    boundary: self.name(boundary).to_string(),
                });
            }
            chain.push(boundary);
            current = self.get(boundary).boundary;
        }

        Ok(chain)
    }

    /// Innermost boundary enclosing `id`, if any
    pub fn innermost_boundary(&self, id: EntityId) -> Option<EntityId> {
        self.get(id).boundary
    }
}
