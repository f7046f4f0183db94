// src/core/validator.rs
use std::collections::{BTreeSet, HashSet};

use crate::core::model::{EntityId, EntityKind, ThreatModel};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Structural checks over a built model
#[derive(Debug, Default)]
pub struct ModelValidator;

impl ModelValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check the model; with `strict`, warnings count as errors
    pub fn validate(&self, model: &ThreatModel, strict: bool) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.check_boundaries(model, &mut result);
        self.check_wrappers(model, &mut result);
        self.check_scenes(model, &mut result);
        self.check_participants(model, &mut result);

        if strict {
            result.errors.append(&mut result.warnings);
        }
        result
    }

    fn check_boundaries(&self, model: &ThreatModel, result: &mut ValidationResult) {
        let registry = model.registry();
        let mut cycles = BTreeSet::new();

        for boundary in registry.of_kind(EntityKind::Boundary) {
            if let Err(e) = registry.ancestors(boundary.id) {
                cycles.insert(e.to_string());
            }
            if registry.members(boundary.id).is_empty() {
                result
                    .warnings
                    .push(format!("Boundary '{}' contains nothing", boundary.name));
            }
        }

        result.errors.extend(cycles);
    }

    fn check_wrappers(&self, model: &ThreatModel, result: &mut ValidationResult) {
        for wrapper in model.wrappers().iter() {
            if let Err(e) = model.terminal_payload(wrapper.id) {
                result.errors.push(format!("{}: {}", wrapper, e));
            }
        }
    }

    fn check_scenes(&self, model: &ThreatModel, result: &mut ValidationResult) {
        for scene in model.scenes() {
            if scene.is_empty() {
                result
                    .warnings
                    .push(format!("Scene '{}' has no flows", scene.title));
            }
        }

        if model.scenes().is_empty() {
            result.warnings.push("Model defines no scenes".to_string());
        }
    }

    fn check_participants(&self, model: &ThreatModel, result: &mut ValidationResult) {
        let used: HashSet<EntityId> = model
            .scenes()
            .iter()
            .flat_map(|s| s.flows.iter())
            .flat_map(|f| [f.pitcher, f.catcher])
            .collect();

        for entity in model.registry().iter() {
            if entity.kind.can_participate() && !used.contains(&entity.id) {
                result.warnings.push(format!(
                    "{} '{}' takes part in no flow",
                    entity.kind, entity.name
                ));
            }
        }
    }
}
