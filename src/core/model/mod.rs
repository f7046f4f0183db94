// src/core/model/mod.rs
//! Threat model building blocks
//!
//! A [`ThreatModel`] owns the entity registry, the protocol wrapper arena and
//! the scenes built from them. Everything is addressed through small `Copy`
//! handles ([`EntityId`], [`WrapperId`]) so the same logical entity can be
//! referred to from many places by name alone.

mod boundary;
mod flow;
mod protocol;
mod registry;

pub use flow::{DataFlow, FlowData, Scene};
pub use protocol::{Protocol, ProtocolProfile, WrapTarget, Wrapped, Wrapper, WrapperArena, WrapperId};
pub use registry::{
    BoundaryRef, Classification, CredentialProfile, DataProfile, DataRef, Entity, EntityDetails,
    EntityId, EntityKind, Lifetime, Registry,
};

use tracing::{debug, warn};

use crate::error::{Result, ThreatflowError};

/// Generation context holding every entity, wrapper and scene of one model
#[derive(Debug, Clone, Default)]
pub struct ThreatModel {
    registry: Registry,
    wrappers: WrapperArena,
    scenes: Vec<Scene>,
}

impl ThreatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn wrappers(&self) -> &WrapperArena {
        &self.wrappers
    }

    /// Forget every entity, wrapper and scene
    pub fn reset(&mut self) {
        self.registry.reset();
        self.wrappers.clear();
        self.scenes.clear();
    }

    // Entity construction

    /// Get-or-create an entity and return a fluent handle to it
    pub fn entity(&mut self, kind: EntityKind, name: &str) -> EntityMut<'_> {
        let id = self.registry.register(kind, name);
        EntityMut { registry: &mut self.registry, id }
    }

    pub fn actor(&mut self, name: &str) -> EntityMut<'_> {
        self.entity(EntityKind::Actor, name)
    }

    pub fn process(&mut self, name: &str) -> EntityMut<'_> {
        self.entity(EntityKind::Process, name)
    }

    pub fn boundary(&mut self, name: &str) -> EntityMut<'_> {
        self.entity(EntityKind::Boundary, name)
    }

    pub fn credential(&mut self, name: &str) -> EntityMut<'_> {
        self.entity(EntityKind::Credential, name)
    }

    pub fn container(&mut self, name: &str) -> EntityMut<'_> {
        self.entity(EntityKind::Container, name)
    }

    pub fn data(&mut self, name: &str) -> EntityMut<'_> {
        self.entity(EntityKind::Data, name)
    }

    /// Fluent handle to an entity that must already exist
    pub fn edit(&mut self, id: EntityId) -> EntityMut<'_> {
        EntityMut { registry: &mut self.registry, id }
    }

    /// Look up an entity without creating it
    pub fn get(&self, kind: EntityKind, name: &str) -> Result<EntityId> {
        self.registry.lookup(kind, name)
    }

    pub fn name(&self, id: EntityId) -> &str {
        self.registry.name(id)
    }

    pub fn ancestors(&self, id: EntityId) -> Result<Vec<EntityId>> {
        self.registry.ancestors(id)
    }

    // Protocol wrappers

    /// Wrap a payload (or payload name, or another wrapper) in a protocol layer
    pub fn wrap(&mut self, protocol: Protocol, target: impl Into<WrapTarget>) -> Result<WrapperMut<'_>> {
        let wraps = self.resolve_target(target.into())?;
        let id = self.wrappers.push(protocol, wraps);
        Ok(WrapperMut { model: self, id })
    }

    /// Fluent handle to an existing wrapper
    pub fn edit_wrapper(&mut self, id: WrapperId) -> WrapperMut<'_> {
        WrapperMut { model: self, id }
    }

    pub fn wrapper(&self, id: WrapperId) -> &Wrapper {
        self.wrappers.get(id)
    }

    pub fn terminal_payload(&self, id: WrapperId) -> Result<EntityId> {
        self.wrappers.terminal_payload(id)
    }

    pub fn chain_sequence(&self, id: WrapperId) -> Result<Vec<WrapperId>> {
        self.wrappers.chain_sequence(id)
    }

    pub fn describe(&self, id: WrapperId) -> Result<String> {
        self.wrappers.describe(id, &self.registry)
    }

    pub fn record_label(&self, id: WrapperId) -> Result<String> {
        self.wrappers.record_label(id, &self.registry)
    }

    /// Replace the inner layer of an existing wrapper
    pub fn rewrap(&mut self, id: WrapperId, target: impl Into<WrapTarget>) -> Result<()> {
        let wraps = self.resolve_target(target.into())?;
        self.wrappers.rewrap(id, wraps)
    }

    fn resolve_target(&mut self, target: WrapTarget) -> Result<Wrapped> {
        match target {
            WrapTarget::Wrapper(id) => Ok(Wrapped::Wrapper(id)),
            WrapTarget::Payload(id) => {
                let entity = self.registry.get(id);
                if entity.kind != EntityKind::Data {
                    return Err(ThreatflowError::MalformedData(format!(
                        "cannot wrap {}, only Data payloads or wrappers can be wrapped",
                        entity
                    )));
                }
                Ok(Wrapped::Payload(id))
            }
            WrapTarget::Name(name) => {
                debug!("Promoting '{}' to a Data payload", name);
                Ok(Wrapped::Payload(self.registry.register(EntityKind::Data, &name)))
            }
        }
    }

    // Data flows

    /// Turn flow data into a wrapper chain, wrapping bare payloads in Plaintext
    pub fn resolve_flow_data(&mut self, data: impl Into<FlowData>) -> Result<WrapperId> {
        match data.into() {
            FlowData::Wrapper(id) => {
                self.expect_own_wrapper(id)?;
                Ok(id)
            }
            FlowData::Name(name) => {
                warn!(
                    "Flow data '{}' given as a plain name, assuming Plaintext transport",
                    name
                );
                Ok(self.wrap(Protocol::Plaintext, WrapTarget::Name(name))?.id())
            }
            FlowData::Payload(id) => {
                warn!(
                    "Flow data {} given without a protocol, assuming Plaintext transport",
                    self.registry.get(id)
                );
                Ok(self.wrap(Protocol::Plaintext, WrapTarget::Payload(id))?.id())
            }
        }
    }

    /// Build a flow between two participants.
    ///
    /// Only Actors and Processes may pitch or catch. The label defaults to the
    /// name of the payload at the end of the wrapper chain.
    pub fn flow(&mut self, pitcher: EntityId, catcher: EntityId, data: impl Into<FlowData>) -> Result<DataFlow> {
        self.expect_participant(pitcher, "pitcher")?;
        self.expect_participant(catcher, "catcher")?;

        let payload = self.resolve_flow_data(data)?;
        let terminal = self.wrappers.terminal_payload(payload)?;

        Ok(DataFlow {
            pitcher,
            catcher,
            payload,
            label: self.registry.name(terminal).to_string(),
            response: None,
        })
    }

    fn expect_own_wrapper(&self, id: WrapperId) -> Result<()> {
        if id.index() >= self.wrappers.len() {
            return Err(ThreatflowError::MalformedData(format!(
                "wrapper #{} does not belong to this model",
                id.index()
            )));
        }
        Ok(())
    }

    fn expect_participant(&self, id: EntityId, role: &str) -> Result<()> {
        let entity = self.registry.get(id);
        if !entity.kind.can_participate() {
            return Err(ThreatflowError::TypeConstraint(format!(
                "{} must be an Actor or Process, got {}",
                role, entity
            )));
        }
        Ok(())
    }

    // Scenes

    pub fn add_scene(&mut self, title: impl Into<String>, flows: Vec<DataFlow>) -> Result<()> {
        let title = title.into();
        if self.scenes.iter().any(|s| s.title == title) {
            return Err(ThreatflowError::DuplicateScene(title));
        }
        debug!("Added scene '{}' with {} flows", title, flows.len());
        self.scenes.push(Scene::new(title, flows));
        Ok(())
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, title: &str) -> Result<&Scene> {
        self.scenes
            .iter()
            .find(|s| s.title == title)
            .ok_or_else(|| ThreatflowError::UnknownScene(title.to_string()))
    }

    /// Splice each flow's response in right after it, as a reverse flow.
    ///
    /// Runs once per scene; later calls leave the scene untouched and
    /// return `false`.
    pub fn expand_responses(&mut self, title: &str) -> Result<bool> {
        let index = self
            .scenes
            .iter()
            .position(|s| s.title == title)
            .ok_or_else(|| ThreatflowError::UnknownScene(title.to_string()))?;

        if self.scenes[index].responses_expanded() {
            debug!("Responses already expanded for scene '{}'", title);
            return Ok(false);
        }

        let mut expanded = Vec::with_capacity(self.scenes[index].flows.len());
        for flow in &self.scenes[index].flows {
            expanded.push(flow.clone());
            if let Some(response) = flow.response {
                self.expect_own_wrapper(response)?;
                let terminal = self.wrappers.terminal_payload(response)?;
                expanded.push(DataFlow {
                    pitcher: flow.catcher,
                    catcher: flow.pitcher,
                    payload: response,
                    label: self.registry.name(terminal).to_string(),
                    response: None,
                });
            }
        }

        let scene = &mut self.scenes[index];
        scene.flows = expanded;
        scene.mark_expanded();
        Ok(true)
    }

    pub fn expand_all_responses(&mut self) -> Result<()> {
        let titles: Vec<String> = self.scenes.iter().map(|s| s.title.clone()).collect();
        for title in titles {
            self.expand_responses(&title)?;
        }
        Ok(())
    }
}

/// Fluent handle for configuring a registered entity
pub struct EntityMut<'a> {
    registry: &'a mut Registry,
    id: EntityId,
}

impl<'a> EntityMut<'a> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn in_boundary(self, boundary: impl Into<BoundaryRef>) -> Result<Self> {
        self.registry.set_boundary(self.id, boundary.into())?;
        Ok(self)
    }

    pub fn add_credential(self, credential: EntityId) -> Result<Self> {
        self.registry.add_credential(self.id, credential)?;
        Ok(self)
    }

    pub fn processes_data(self, data: impl Into<DataRef>) -> Result<Self> {
        self.registry.processes_data(self.id, data.into())?;
        Ok(self)
    }

    pub fn classified(self, classification: Classification) -> Result<Self> {
        self.registry.classify(self.id, classification)?;
        Ok(self)
    }

    pub fn encrypted_at_rest(self) -> Result<Self> {
        self.registry.mark_encrypted_at_rest(self.id)?;
        Ok(self)
    }

    pub fn primary_factor(self) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.primary_factor = true)?;
        Ok(self)
    }

    pub fn second_factor(self) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.second_factor = true)?;
        Ok(self)
    }

    pub fn symmetric(self) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.symmetric = true)?;
        Ok(self)
    }

    pub fn asymmetric(self) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.asymmetric = true)?;
        Ok(self)
    }

    pub fn revokable(self) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.revokable = true)?;
        Ok(self)
    }

    pub fn shared(self) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.shared = true)?;
        Ok(self)
    }

    pub fn has_lifetime(self, lifetime: Lifetime) -> Result<Self> {
        self.registry.update_credential(self.id, |c| c.lifetime = Some(lifetime))?;
        Ok(self)
    }
}

/// Fluent handle for configuring a wrapper
pub struct WrapperMut<'a> {
    model: &'a mut ThreatModel,
    id: WrapperId,
}

impl<'a> WrapperMut<'a> {
    pub fn id(&self) -> WrapperId {
        self.id
    }

    /// Override the preset's protocol version
    pub fn version(self, version: impl Into<String>) -> Self {
        self.model.wrappers.get_mut(self.id).profile.version = Some(version.into());
        self
    }

    pub fn add_protocol_data(self, data: impl Into<DataRef>) -> Result<Self> {
        let data_id = self.model.registry.resolve_data(data.into(), "add_protocol_data")?;
        self.model.wrappers.get_mut(self.id).protocol_data.push(data_id);
        Ok(self)
    }
}
