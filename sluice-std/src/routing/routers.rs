//! Destination resolvers.

use super::WildcardPattern;
use crate::processor::MethodInvoker;
use serde_json::Value;
use sluice_core::{
    Message, MessagingError, Payload, Router, RoutingError, TypeDescriptor, TypeHierarchy,
};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

/// Keeps the first occurrence of every name.
fn dedup(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|name| seen.insert(name.clone())).collect()
}

// ============================================================================
// Type Hierarchy Router
// ============================================================================

/// Routes on the payload type, honouring interfaces and ancestors.
///
/// Candidate types are visited in this order: the exact type, its
/// interfaces and those of its ancestors (each followed by the interfaces it
/// extends), the ancestor classes nearest first, and finally
/// [`TypeDescriptor::OBJECT`]. The channels mapped to each candidate are
/// unioned in that order.
pub struct TypeHierarchyRouter {
    mapping: BTreeMap<TypeDescriptor, Vec<String>>,
    hierarchy: Arc<dyn TypeHierarchy>,
}

impl TypeHierarchyRouter {
    /// Route with `mapping` from type name to channels.
    pub fn new(mapping: BTreeMap<TypeDescriptor, Vec<String>>, hierarchy: Arc<dyn TypeHierarchy>) -> Self {
        Self { mapping, hierarchy }
    }

    /// All types `ty` can be treated as, most specific first.
    pub fn candidate_types(&self, ty: &TypeDescriptor) -> Vec<TypeDescriptor> {
        let mut ancestors = Vec::new();
        let mut current = ty.clone();
        while let Some(parent) = self.hierarchy.parent_of(&current) {
            if parent == *ty || ancestors.contains(&parent) {
                break;
            }
            ancestors.push(parent.clone());
            current = parent;
        }

        let mut candidates = vec![ty.clone()];
        for class in std::iter::once(ty).chain(&ancestors) {
            self.push_interfaces(class, &mut candidates);
        }
        for ancestor in ancestors {
            if !candidates.contains(&ancestor) {
                candidates.push(ancestor);
            }
        }
        if !candidates.contains(&TypeDescriptor::OBJECT) {
            candidates.push(TypeDescriptor::OBJECT);
        }
        candidates
    }

    fn push_interfaces(&self, ty: &TypeDescriptor, candidates: &mut Vec<TypeDescriptor>) {
        for interface in self.hierarchy.interfaces_of(ty) {
            if !candidates.contains(&interface) {
                candidates.push(interface.clone());
                self.push_interfaces(&interface, candidates);
            }
        }
    }
}

impl Router for TypeHierarchyRouter {
    async fn resolve_destinations(&self, message: &Message) -> Result<Vec<String>, MessagingError> {
        let payload_type = message.payload().type_descriptor();
        if payload_type == &TypeDescriptor::NULL {
            return Ok(Vec::new());
        }
        let candidates = self.candidate_types(payload_type);
        let channels = candidates
            .iter()
            .filter_map(|candidate| self.mapping.get(candidate))
            .flatten()
            .cloned();
        Ok(dedup(channels))
    }
}

/// Routes to the channel named after the payload type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadTypeNameRouter;

impl Router for PayloadTypeNameRouter {
    async fn resolve_destinations(&self, message: &Message) -> Result<Vec<String>, MessagingError> {
        let payload_type = message.payload().type_descriptor();
        if payload_type == &TypeDescriptor::NULL {
            return Ok(Vec::new());
        }
        Ok(vec![payload_type.name().to_string()])
    }
}

// ============================================================================
// Name based routers
// ============================================================================

/// Routes on a name read from a header, matching it against wildcard keys.
#[derive(Debug, Clone)]
pub struct WildcardNameRouter {
    header: String,
    routes: Vec<(WildcardPattern, Vec<String>)>,
}

impl WildcardNameRouter {
    /// Match the value of `header` against each pattern.
    pub fn new(header: impl Into<String>, routes: Vec<(WildcardPattern, Vec<String>)>) -> Self {
        Self {
            header: header.into(),
            routes,
        }
    }

    /// Channels for `name`, in route order.
    pub fn channels_for(&self, name: &str) -> Vec<String> {
        dedup(
            self.routes
                .iter()
                .filter(|(pattern, _)| pattern.is_match(name))
                .flat_map(|(_, channels)| channels.iter().cloned()),
        )
    }
}

impl Router for WildcardNameRouter {
    async fn resolve_destinations(&self, message: &Message) -> Result<Vec<String>, MessagingError> {
        Ok(message
            .headers()
            .get_str(&self.header)
            .map(|name| self.channels_for(name))
            .unwrap_or_default())
    }
}

/// Routes every message to a fixed list of channels.
#[derive(Debug, Clone)]
pub struct RecipientListRouter {
    recipients: Vec<String>,
}

impl RecipientListRouter {
    /// Send to all of `recipients`.
    pub fn new(recipients: Vec<String>) -> Self {
        Self {
            recipients: dedup(recipients),
        }
    }
}

impl Router for RecipientListRouter {
    async fn resolve_destinations(&self, _message: &Message) -> Result<Vec<String>, MessagingError> {
        Ok(self.recipients.clone())
    }
}

/// Routes on the value of a header.
///
/// A value with a mapping goes to the mapped channel; any other value is
/// itself taken as the channel name.
#[derive(Debug, Clone)]
pub struct HeaderValueRouter {
    header: String,
    mapping: BTreeMap<String, String>,
}

impl HeaderValueRouter {
    /// Route on `header` through `mapping`.
    pub fn new(header: impl Into<String>, mapping: BTreeMap<String, String>) -> Self {
        Self {
            header: header.into(),
            mapping,
        }
    }
}

impl Router for HeaderValueRouter {
    async fn resolve_destinations(&self, message: &Message) -> Result<Vec<String>, MessagingError> {
        let value = match message.headers().get(&self.header) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };
        Ok(vec![self.mapping.get(&value).cloned().unwrap_or(value)])
    }
}

// ============================================================================
// Custom router
// ============================================================================

/// Asks a target operation for the destinations.
///
/// The target may return a channel name, a list of names, or nothing.
pub struct MethodTargetRouter {
    endpoint_id: String,
    invoker: MethodInvoker,
}

impl MethodTargetRouter {
    /// Route with `invoker`, reporting errors as `endpoint_id`.
    pub fn new(endpoint_id: impl Into<String>, invoker: MethodInvoker) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            invoker,
        }
    }

    fn channel_names(&self, result: &Payload) -> Result<Vec<String>, MessagingError> {
        if result.is_null() {
            return Ok(Vec::new());
        }
        if let Some(name) = result.downcast_ref::<String>() {
            return Ok(vec![name.clone()]);
        }
        if let Some(name) = result.downcast_ref::<&'static str>() {
            return Ok(vec![(*name).to_string()]);
        }
        if let Some(names) = result.downcast_ref::<Vec<String>>() {
            return Ok(dedup(names.iter().cloned()));
        }
        if let Some(names) = result.downcast_ref::<Vec<&'static str>>() {
            return Ok(dedup(names.iter().map(|name| (*name).to_string())));
        }
        Err(RoutingError::InvalidDestination {
            endpoint_id: self.endpoint_id.clone(),
            type_name: result.type_descriptor().to_string(),
        }
        .into())
    }
}

impl Router for MethodTargetRouter {
    async fn resolve_destinations(&self, message: &Message) -> Result<Vec<String>, MessagingError> {
        match self.invoker.invoke(message.clone()).await? {
            Some(result) => self.channel_names(&result),
            None => Ok(Vec::new()),
        }
    }
}
