// src/core/model/flow.rs
use serde::{Deserialize, Serialize};

use super::protocol::WrapperId;
use super::registry::EntityId;

/// Data handed to a flow: a payload name, a payload entity, or a wrapper chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowData {
    Name(String),
    Payload(EntityId),
    Wrapper(WrapperId),
}

impl From<&str> for FlowData {
    fn from(name: &str) -> Self {
        FlowData::Name(name.to_string())
    }
}

impl From<String> for FlowData {
    fn from(name: String) -> Self {
        FlowData::Name(name)
    }
}

impl From<EntityId> for FlowData {
    fn from(id: EntityId) -> Self {
        FlowData::Payload(id)
    }
}

impl From<WrapperId> for FlowData {
    fn from(id: WrapperId) -> Self {
        FlowData::Wrapper(id)
    }
}

/// A directed edge between two participants carrying a wrapped payload.
///
/// Flows have no name-based identity: two flows with the same label stay
/// two distinct flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFlow {
    pub pitcher: EntityId,
    pub catcher: EntityId,
    pub payload: WrapperId,
    pub label: String,
    /// Reply sent back from catcher to pitcher, expanded at report time
    pub response: Option<WrapperId>,
}

impl DataFlow {
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn responding(mut self, response: WrapperId) -> Self {
        self.response = Some(response);
        self
    }
}

/// A named, ordered walkthrough of data flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub title: String,
    pub flows: Vec<DataFlow>,
    responses_expanded: bool,
}

impl Scene {
    pub fn new(title: impl Into<String>, flows: Vec<DataFlow>) -> Self {
        Self {
            title: title.into(),
            flows,
            responses_expanded: false,
        }
    }

    pub fn responses_expanded(&self) -> bool {
        self.responses_expanded
    }

    pub(crate) fn mark_expanded(&mut self) {
        self.responses_expanded = true;
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
