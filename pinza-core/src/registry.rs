//! # Schema Registry
//!
//! The [`Registry`] is the process-wide index of every message type and service descriptor
//! registered from one or more [`Bundle`]s. It maps a fully qualified name to a tagged
//! [`Descriptor`] variant.
//!
//! A registry is created explicitly with [`Registry::new`] and handed to whoever needs it;
//! cloning it is cheap and every clone observes the same definitions.
//!
//! ## Example
//!
//! ```rust
//! use pinza_core::{registry::Registry, schema::{Bundle, MessageType}};
//!
//! let registry = Registry::new();
//! let bundle = Bundle::new().with_message(MessageType::new("acme.v1.Empty", vec![]));
//!
//! registry.register(&bundle).unwrap();
//! // Registering identical definitions again is a no-op.
//! registry.register(&bundle).unwrap();
//!
//! assert!(registry.scope("acme.v1").lookup("Empty").is_ok());
//! ```
mod scope;

pub use scope::Scope;

use crate::schema::{Bundle, MessageType, ServiceDescriptor};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

#[derive(Debug, thiserror::Error)]
#[error("Name '{0}' not found")]
pub struct NameNotFound(pub String);

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("Definition conflict: '{name}' is already registered with a different shape")]
    DefinitionConflict { name: String },
}

/// A registered definition: either a message type or a service.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Message(Arc<MessageType>),
    Service(Arc<ServiceDescriptor>),
}

impl Descriptor {
    /// Returns the short name (e.g. `Account`) of the inner descriptor.
    pub fn name(&self) -> &str {
        match self {
            Descriptor::Message(v) => v.short_name(),
            Descriptor::Service(v) => v.short_name(),
        }
    }

    /// Returns the fully qualified name (e.g. `my.package.v1.Account`) of the inner descriptor.
    pub fn full_name(&self) -> &str {
        match self {
            Descriptor::Message(v) => v.name(),
            Descriptor::Service(v) => v.name(),
        }
    }

    /// Returns the package name (e.g. `my.package.v1`) of the inner descriptor.
    pub fn package_name(&self) -> &str {
        match self {
            Descriptor::Message(v) => v.package_name(),
            Descriptor::Service(v) => v.package_name(),
        }
    }

    /// Returns the inner [`MessageType`] if this variant is `Message`.
    pub fn message_type(&self) -> Option<&Arc<MessageType>> {
        match self {
            Descriptor::Message(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the inner [`ServiceDescriptor`] if this variant is `Service`.
    pub fn service_descriptor(&self) -> Option<&Arc<ServiceDescriptor>> {
        match self {
            Descriptor::Service(d) => Some(d),
            _ => None,
        }
    }

    fn same_shape(&self, other: &Descriptor) -> bool {
        match (self, other) {
            (Descriptor::Message(a), Descriptor::Message(b)) => a == b,
            (Descriptor::Service(a), Descriptor::Service(b)) => a == b,
            _ => false,
        }
    }

    /// Whether `self` carries a protobuf descriptor the equally shaped `other` lacks.
    fn adds_protobuf(&self, other: &Descriptor) -> bool {
        match (self, other) {
            (Descriptor::Message(new), Descriptor::Message(old)) => {
                new.protobuf_descriptor().is_some() && old.protobuf_descriptor().is_none()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    index: Arc<RwLock<HashMap<String, Descriptor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every definition of `bundle` into the index.
    ///
    /// Redefining an existing name with a different shape fails with
    /// [`RegisterError::DefinitionConflict`] and leaves the registry untouched: a bundle is
    /// either registered as a whole or not at all. Definitions identical to registered ones
    /// are skipped, except that a message type imported from a descriptor set replaces an
    /// equally shaped one registered without a protobuf descriptor.
    pub fn register(&self, bundle: &Bundle) -> Result<(), RegisterError> {
        let mut staged: Vec<(String, Descriptor)> = Vec::new();

        let incoming = bundle
            .messages
            .iter()
            .map(|m| Descriptor::Message(Arc::new(m.clone())))
            .chain(
                bundle
                    .services
                    .iter()
                    .map(|s| Descriptor::Service(Arc::new(s.clone()))),
            );

        for descriptor in incoming {
            match staged.iter().find(|(name, _)| name == descriptor.full_name()) {
                Some((_, existing)) if existing.same_shape(&descriptor) => continue,
                Some((name, _)) => {
                    return Err(RegisterError::DefinitionConflict { name: name.clone() });
                }
                None => staged.push((descriptor.full_name().to_string(), descriptor)),
            }
        }

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);

        for (name, descriptor) in &staged {
            if let Some(existing) = index.get(name)
                && !existing.same_shape(descriptor)
            {
                return Err(RegisterError::DefinitionConflict { name: name.clone() });
            }
        }

        let mut added = 0;
        for (name, descriptor) in staged {
            let keep_existing = index
                .get(&name)
                .is_some_and(|existing| !descriptor.adds_protobuf(existing));
            if keep_existing {
                continue;
            }
            if index.insert(name, descriptor).is_none() {
                added += 1;
            }
        }

        tracing::debug!(added, total = index.len(), "registered schema bundle");

        Ok(())
    }

    /// Returns a [`Scope`] bound to `prefix`. Never fails, even if nothing is registered
    /// under that namespace yet.
    pub fn scope(&self, prefix: impl Into<String>) -> Scope<'_> {
        Scope::new(self, prefix.into())
    }

    /// Looks up a fully qualified name. A leading `.` is ignored.
    pub fn lookup(&self, name: &str) -> Result<Descriptor, NameNotFound> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| NameNotFound(name.to_string()))
    }

    /// Looks up a message type. Fails if the name is unknown or registered as a service.
    pub fn lookup_message(&self, name: &str) -> Result<Arc<MessageType>, NameNotFound> {
        match self.lookup(name)? {
            Descriptor::Message(message) => Ok(message),
            Descriptor::Service(_) => Err(NameNotFound(name.to_string())),
        }
    }

    /// Looks up a service. Fails if the name is unknown or registered as a message.
    pub fn lookup_service(&self, name: &str) -> Result<Arc<ServiceDescriptor>, NameNotFound> {
        match self.lookup(name)? {
            Descriptor::Service(service) => Ok(service),
            Descriptor::Message(_) => Err(NameNotFound(name.to_string())),
        }
    }

    /// Lists every registered service, sorted by name.
    pub fn services(&self) -> Vec<Arc<ServiceDescriptor>> {
        let mut services: Vec<_> = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|d| d.service_descriptor().cloned())
            .collect();
        services.sort_by(|a, b| a.name().cmp(b.name()));
        services
    }

    /// Lists every registered message type, sorted by name.
    pub fn messages(&self) -> Vec<Arc<MessageType>> {
        let mut messages: Vec<_> = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|d| d.message_type().cloned())
            .collect();
        messages.sort_by(|a, b| a.name().cmp(b.name()));
        messages
    }

    pub fn len(&self) -> usize {
        self.index.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
