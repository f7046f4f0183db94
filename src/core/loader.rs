// src/core/loader.rs
//! TOML model documents
//!
//! Lets a threat model be described declaratively in a file instead of in
//! code. Entities referenced by name are created on first mention, exactly
//! as through the library API; wrappers are referenced by their `id` and may
//! be declared in any order.

use std::collections::HashMap;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::model::{
    Classification, DataFlow, EntityId, EntityKind, FlowData, Lifetime, Protocol, ThreatModel,
    WrapTarget, WrapperId,
};
use crate::error::{Result, ThreatflowError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDocument {
    pub boundaries: Vec<EntityDecl>,
    pub actors: Vec<EntityDecl>,
    pub processes: Vec<EntityDecl>,
    pub containers: Vec<EntityDecl>,
    pub credentials: Vec<CredentialDecl>,
    pub data: Vec<DataDecl>,
    pub wrappers: Vec<WrapperDecl>,
    pub scenes: Vec<SceneDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDecl {
    pub name: String,
    pub boundary: Option<String>,
    pub credentials: Vec<String>,
    pub processes_data: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialDecl {
    pub name: String,
    pub primary_factor: bool,
    pub second_factor: bool,
    pub symmetric: bool,
    pub asymmetric: bool,
    pub revokable: bool,
    pub shared: bool,
    pub lifetime: Option<Lifetime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataDecl {
    pub name: String,
    pub classification: Option<Classification>,
    pub encrypted_at_rest: bool,
}

/// A protocol layer; exactly one of `wraps` (another wrapper id) or `payload`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperDecl {
    pub id: String,
    pub protocol: String,
    pub version: Option<String>,
    pub wraps: Option<String>,
    pub payload: Option<String>,
    pub protocol_data: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDecl {
    pub title: String,
    pub flows: Vec<FlowDecl>,
}

/// A flow; exactly one of `wrapper` or `payload`, optionally a response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowDecl {
    pub from: String,
    pub to: String,
    pub wrapper: Option<String>,
    pub payload: Option<String>,
    pub label: Option<String>,
    pub response: Option<String>,
    pub response_payload: Option<String>,
}

impl ModelDocument {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ThreatflowError::ModelFile(e.to_string()))
    }

    /// Build a fresh model from this document
    pub fn into_model(self) -> Result<ThreatModel> {
        let mut model = ThreatModel::new();
        ModelBuilder::new(&self)?.build(&mut model)?;

        info!(
            "Loaded model: {} entities, {} wrappers, {} scenes",
            model.registry().len(),
            model.wrappers().len(),
            model.scenes().len()
        );
        Ok(model)
    }
}

/// Read and build a model file in one step
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ThreatModel> {
    ModelDocument::from_path(path)?.into_model()
}

struct ModelBuilder<'d> {
    doc: &'d ModelDocument,
    wrapper_decls: HashMap<&'d str, &'d WrapperDecl>,
    built: HashMap<String, WrapperId>,
}

impl<'d> ModelBuilder<'d> {
    fn new(doc: &'d ModelDocument) -> Result<Self> {
        let mut wrapper_decls = HashMap::with_capacity(doc.wrappers.len());
        for decl in &doc.wrappers {
            if wrapper_decls.insert(decl.id.as_str(), decl).is_some() {
                return Err(ThreatflowError::ModelFile(format!(
                    "duplicate wrapper id '{}'",
                    decl.id
                )));
            }
        }

        Ok(Self {
            doc,
            wrapper_decls,
            built: HashMap::new(),
        })
    }

    fn build(&mut self, model: &mut ThreatModel) -> Result<()> {
        let doc = self.doc;

        for data in &doc.data {
            let id = model.data(&data.name).id();
            if let Some(classification) = data.classification {
                model.registry_mut().classify(id, classification)?;
            }
            if data.encrypted_at_rest {
                model.registry_mut().mark_encrypted_at_rest(id)?;
            }
        }

        for cred in &doc.credentials {
            let id = model.credential(&cred.name).id();
            let cred = cred.clone();
            model.registry_mut().update_credential(id, move |profile| {
                profile.primary_factor |= cred.primary_factor;
                profile.second_factor |= cred.second_factor;
                profile.symmetric |= cred.symmetric;
                profile.asymmetric |= cred.asymmetric;
                profile.revokable |= cred.revokable;
                profile.shared |= cred.shared;
                if cred.lifetime.is_some() {
                    profile.lifetime = cred.lifetime;
                }
            })?;
        }

        let groups = [
            (EntityKind::Boundary, &doc.boundaries),
            (EntityKind::Container, &doc.containers),
            (EntityKind::Actor, &doc.actors),
            (EntityKind::Process, &doc.processes),
        ];
        for (kind, decls) in groups {
            for decl in decls.iter() {
                self.declare_entity(model, kind, decl)?;
            }
        }

        for decl in &doc.wrappers {
            let mut visiting = Vec::new();
            self.resolve_wrapper(model, &decl.id, &mut visiting)?;
        }

        for scene in &doc.scenes {
            let mut flows = Vec::with_capacity(scene.flows.len());
            for flow in &scene.flows {
                flows.push(self.build_flow(model, &scene.title, flow)?);
            }
            model.add_scene(scene.title.clone(), flows)?;
        }

        Ok(())
    }

    fn declare_entity(&self, model: &mut ThreatModel, kind: EntityKind, decl: &EntityDecl) -> Result<()> {
        let mut entity = model.entity(kind, &decl.name);
        if let Some(boundary) = &decl.boundary {
            entity = entity.in_boundary(boundary.as_str())?;
        }
        let id = entity.id();

        for cred in &decl.credentials {
            let cred_id = model.credential(cred).id();
            model.registry_mut().add_credential(id, cred_id)?;
        }
        for data in &decl.processes_data {
            model.registry_mut().processes_data(id, data.as_str().into())?;
        }
        Ok(())
    }

    fn resolve_wrapper(&mut self, model: &mut ThreatModel, id: &str, visiting: &mut Vec<String>) -> Result<WrapperId> {
        if let Some(built) = self.built.get(id) {
            return Ok(*built);
        }
        if visiting.iter().any(|v| v == id) {
            visiting.push(id.to_string());
            return Err(ThreatflowError::CyclicWrapper {
                wrapper: format!("wrapper '{}' (via {})", id, visiting.join(" -> ")),
            });
        }

        let decl = *self
            .wrapper_decls
            .get(id)
            .ok_or_else(|| ThreatflowError::ModelFile(format!("unknown wrapper '{}'", id)))?;
        let protocol = Protocol::from_name(&decl.protocol).ok_or_else(|| {
            ThreatflowError::ModelFile(format!(
                "wrapper '{}' uses unknown protocol '{}'",
                id, decl.protocol
            ))
        })?;

        let target = match (&decl.wraps, &decl.payload) {
            (Some(inner), None) => {
                visiting.push(id.to_string());
                let inner_id = self.resolve_wrapper(model, inner, visiting)?;
                visiting.pop();
                WrapTarget::Wrapper(inner_id)
            }
            (None, Some(payload)) => WrapTarget::Name(payload.clone()),
            _ => {
                return Err(ThreatflowError::MalformedData(format!(
                    "wrapper '{}' must set exactly one of 'wraps' or 'payload'",
                    id
                )))
            }
        };

        let mut wrapper = model.wrap(protocol, target)?;
        if let Some(version) = &decl.version {
            wrapper = wrapper.version(version.as_str());
        }
        for data in &decl.protocol_data {
            wrapper = wrapper.add_protocol_data(data.as_str())?;
        }
        let wrapper_id = wrapper.id();

        self.built.insert(id.to_string(), wrapper_id);
        Ok(wrapper_id)
    }

    fn build_flow(&self, model: &mut ThreatModel, scene: &str, decl: &FlowDecl) -> Result<DataFlow> {
        let pitcher = resolve_participant(model, &decl.from)?;
        let catcher = resolve_participant(model, &decl.to)?;

        let data = match (&decl.wrapper, &decl.payload) {
            (Some(wrapper), None) => FlowData::Wrapper(self.built_wrapper(wrapper)?),
            (None, Some(payload)) => FlowData::Name(payload.clone()),
            _ => {
                return Err(ThreatflowError::MalformedData(format!(
                    "flow {} -> {} in scene '{}' must set exactly one of 'wrapper' or 'payload'",
                    decl.from, decl.to, scene
                )))
            }
        };

        let mut flow = model.flow(pitcher, catcher, data)?;
        if let Some(label) = &decl.label {
            flow = flow.labeled(label.clone());
        }

        let response = match (&decl.response, &decl.response_payload) {
            (Some(wrapper), None) => Some(self.built_wrapper(wrapper)?),
            (None, Some(payload)) => Some(model.resolve_flow_data(payload.as_str())?),
            (None, None) => None,
            (Some(_), Some(_)) => {
                return Err(ThreatflowError::MalformedData(format!(
                    "flow {} -> {} in scene '{}' sets both 'response' and 'response_payload'",
                    decl.from, decl.to, scene
                )))
            }
        };
        if let Some(response) = response {
            flow = flow.responding(response);
        }

        Ok(flow)
    }

    fn built_wrapper(&self, id: &str) -> Result<WrapperId> {
        self.built
            .get(id)
            .copied()
            .ok_or_else(|| ThreatflowError::ModelFile(format!("unknown wrapper '{}'", id)))
    }
}

/// Flow endpoints name a Process, or failing that an Actor
fn resolve_participant(model: &ThreatModel, name: &str) -> Result<EntityId> {
    if let Ok(id) = model.get(EntityKind::Process, name) {
        return Ok(id);
    }
    if let Ok(id) = model.get(EntityKind::Actor, name) {
        return Ok(id);
    }

    let other = [
        EntityKind::Boundary,
        EntityKind::Container,
        EntityKind::Credential,
        EntityKind::Data,
    ]
    .into_iter()
    .find(|kind| model.registry().contains(*kind, name));

    match other {
        Some(kind) => Err(ThreatflowError::TypeConstraint(format!(
            "flow endpoint '{}' is a {}, only Actors and Processes can send or receive",
            name, kind
        ))),
        None => Err(ThreatflowError::NotFound {
            kind: EntityKind::Process,
            name: name.to_string(),
        }),
    }
}
