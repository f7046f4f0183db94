// src/core/model/registry.rs
use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ThreatflowError};

/// The kinds of named entity a threat model can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Actor,
    Process,
    Boundary,
    Credential,
    Container,
    Data,
}

impl EntityKind {
    /// Shape used when the entity is drawn
    pub fn shape(&self) -> &'static str {
        match self {
            EntityKind::Actor => "Man",
            EntityKind::Process => "Square",
            EntityKind::Boundary => "Dotted Box",
            EntityKind::Credential => "Key",
            EntityKind::Container => "Circle",
            EntityKind::Data => "Data",
        }
    }

    /// Whether entities of this kind may pitch or catch a data flow
    pub fn can_participate(&self) -> bool {
        matches!(self, EntityKind::Actor | EntityKind::Process)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Actor => "Actor",
            EntityKind::Process => "Process",
            EntityKind::Boundary => "Boundary",
            EntityKind::Credential => "Credential",
            EntityKind::Container => "Container",
            EntityKind::Data => "Data",
        };
        f.write_str(name)
    }
}

/// Handle to an entity stored in a [`Registry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Sensitivity of a data payload, most sensitive first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Exposure compromises at least one customer completely, or several significantly
    TopSecret,
    /// Exposure significantly impacts at least one customer
    Secret,
    /// Embarrassing to lose control of, otherwise unimportant
    Sensitive,
    /// Fine to publish
    Public,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::TopSecret => "TOPSECRET",
            Classification::Secret => "SECRET",
            Classification::Sensitive => "SENSITIVE",
            Classification::Public => "PUBLIC",
        };
        f.write_str(name)
    }
}

/// How long a credential stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Less than an hour
    Ephemeral,
    /// Less than a week
    Short,
    Annual,
    Biannual,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProfile {
    pub classification: Option<Classification>,
    pub encrypted_at_rest: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProfile {
    pub primary_factor: bool,
    pub second_factor: bool,
    pub symmetric: bool,
    pub asymmetric: bool,
    pub revokable: bool,
    pub shared: bool,
    pub lifetime: Option<Lifetime>,
}

/// Kind-specific attributes of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityDetails {
    Plain,
    Data(DataProfile),
    Credential(CredentialProfile),
}

impl EntityDetails {
    fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Data => EntityDetails::Data(DataProfile::default()),
            EntityKind::Credential => EntityDetails::Credential(CredentialProfile::default()),
            _ => EntityDetails::Plain,
        }
    }
}

/// A named entity resident in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// Immediately enclosing boundary
    pub boundary: Option<EntityId>,
    pub credentials: Vec<EntityId>,
    pub processed_data: Vec<EntityId>,
    pub details: EntityDetails,
}

impl Entity {
    pub fn data_profile(&self) -> Option<&DataProfile> {
        match &self.details {
            EntityDetails::Data(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn credential_profile(&self) -> Option<&CredentialProfile> {
        match &self.details {
            EntityDetails::Credential(profile) => Some(profile),
            _ => None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Reference to a boundary, either resolved or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryRef {
    Entity(EntityId),
    Name(String),
}

impl From<EntityId> for BoundaryRef {
    fn from(id: EntityId) -> Self {
        BoundaryRef::Entity(id)
    }
}

impl From<&str> for BoundaryRef {
    fn from(name: &str) -> Self {
        BoundaryRef::Name(name.to_string())
    }
}

impl From<String> for BoundaryRef {
    fn from(name: String) -> Self {
        BoundaryRef::Name(name)
    }
}

/// Reference to a data payload, either resolved or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataRef {
    Entity(EntityId),
    Name(String),
}

impl From<EntityId> for DataRef {
    fn from(id: EntityId) -> Self {
        DataRef::Entity(id)
    }
}

impl From<&str> for DataRef {
    fn from(name: &str) -> Self {
        DataRef::Name(name.to_string())
    }
}

impl From<String> for DataRef {
    fn from(name: String) -> Self {
        DataRef::Name(name)
    }
}

/// Name-scoped entity namespace.
///
/// Registering the same `(kind, name)` pair twice hands back the same
/// [`EntityId`]; every mutation lands on the single arena-resident entity,
/// so all holders of the id observe it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: Vec<Entity>,
    index: HashMap<(EntityKind, String), EntityId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entity registered under `(kind, name)`, creating it if needed
    pub fn register(&mut self, kind: EntityKind, name: &str) -> EntityId {
        if let Some(id) = self.index.get(&(kind, name.to_string())) {
            return *id;
        }

        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            id,
            kind,
            name: name.to_string(),
            boundary: None,
            credentials: Vec::new(),
            processed_data: Vec::new(),
            details: EntityDetails::for_kind(kind),
        });
        self.index.insert((kind, name.to_string()), id);
        debug!("Registered {}:{}", kind, name);
        id
    }

    /// Find an existing entity; never creates one
    pub fn lookup(&self, kind: EntityKind, name: &str) -> Result<EntityId> {
        self.index
            .get(&(kind, name.to_string()))
            .copied()
            .ok_or_else(|| ThreatflowError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, kind: EntityKind, name: &str) -> bool {
        self.index.contains_key(&(kind, name.to_string()))
    }

    /// Access an entity by id.
    ///
    /// Ids are only minted by this registry, so an id from a different
    /// registry (or one issued before [`Registry::reset`]) is a caller bug.
    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn name(&self, id: EntityId) -> &str {
        &self.entities[id.0].name
    }

    pub fn kind(&self, id: EntityId) -> EntityKind {
        self.entities[id.0].kind
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop every registered entity
    pub fn reset(&mut self) {
        self.entities.clear();
        self.index.clear();
    }

    /// Place `id` inside a boundary, creating the boundary when given by name
    pub fn set_boundary(&mut self, id: EntityId, boundary: BoundaryRef) -> Result<EntityId> {
        let boundary_id = match boundary {
            BoundaryRef::Name(name) => self.register(EntityKind::Boundary, &name),
            BoundaryRef::Entity(candidate) => {
                self.expect_kind(candidate, EntityKind::Boundary, "in_boundary")?;
                candidate
            }
        };

        self.entities[id.0].boundary = Some(boundary_id);
        Ok(boundary_id)
    }

    pub fn add_credential(&mut self, id: EntityId, credential: EntityId) -> Result<()> {
        self.expect_kind(credential, EntityKind::Credential, "add_credential")?;
        self.entities[id.0].credentials.push(credential);
        Ok(())
    }

    /// Record that `id` handles a piece of data, creating the data when given by name
    pub fn processes_data(&mut self, id: EntityId, data: DataRef) -> Result<EntityId> {
        let data_id = self.resolve_data(data, "processes_data")?;
        self.entities[id.0].processed_data.push(data_id);
        Ok(data_id)
    }

    pub fn classify(&mut self, id: EntityId, classification: Classification) -> Result<()> {
        self.data_profile_mut(id)?.classification = Some(classification);
        Ok(())
    }

    pub fn mark_encrypted_at_rest(&mut self, id: EntityId) -> Result<()> {
        self.data_profile_mut(id)?.encrypted_at_rest = true;
        Ok(())
    }

    /// Apply `update` to a credential's profile
    pub fn update_credential<F>(&mut self, id: EntityId, update: F) -> Result<()>
    where
        F: FnOnce(&mut CredentialProfile),
    {
        let entity = &mut self.entities[id.0];
        match &mut entity.details {
            EntityDetails::Credential(profile) => {
                update(profile);
                Ok(())
            }
            _ => Err(ThreatflowError::TypeConstraint(format!(
                "{} is not a Credential",
                entity
            ))),
        }
    }

    /// Entities (nested boundaries included) whose immediate boundary is `boundary`
    pub fn members(&self, boundary: EntityId) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.boundary == Some(boundary))
            .map(|e| e.id)
            .collect()
    }

    pub(crate) fn resolve_data(&mut self, data: DataRef, operation: &str) -> Result<EntityId> {
        match data {
            DataRef::Name(name) => Ok(self.register(EntityKind::Data, &name)),
            DataRef::Entity(id) => {
                self.expect_kind(id, EntityKind::Data, operation)?;
                Ok(id)
            }
        }
    }

    pub(crate) fn expect_kind(&self, id: EntityId, kind: EntityKind, operation: &str) -> Result<()> {
        let entity = self.get(id);
        if entity.kind != kind {
            return Err(ThreatflowError::TypeConstraint(format!(
                "{} expects a {}, got {}",
                operation, kind, entity
            )));
        }
        Ok(())
    }

    fn data_profile_mut(&mut self, id: EntityId) -> Result<&mut DataProfile> {
        if self.entities[id.0].kind != EntityKind::Data {
            return Err(ThreatflowError::TypeConstraint(format!(
                "{} is not a Data payload",
                self.entities[id.0]
            )));
        }
        match &mut self.entities[id.0].details {
            EntityDetails::Data(profile) => Ok(profile),
            _ => Err(ThreatflowError::TypeConstraint(format!(
                "Data entity #{} has no data profile",
                id.0
            ))),
        }
    }
}
