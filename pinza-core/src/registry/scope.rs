use super::{Descriptor, NameNotFound, Registry};
use crate::schema::{MessageType, ServiceDescriptor};
use std::sync::Arc;

/// A namespaced, read-only view over a [`Registry`].
///
/// Relative names are resolved inside the prefix first and then as global names, so
/// application code can use short names inside a known namespace while still reaching
/// global types. Names starting with `.` are absolute and skip the prefix.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    registry: &'a Registry,
    prefix: String,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(registry: &'a Registry, prefix: String) -> Self {
        let prefix = prefix.trim_matches('.').to_string();
        Self { registry, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The registry this scope projects.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Returns a nested scope, e.g. `scope("acme").scope("v1")` is bound to `acme.v1`.
    pub fn scope(&self, child: &str) -> Scope<'a> {
        Scope::new(self.registry, self.qualify(child.trim_matches('.')))
    }

    /// Resolves `name` relative to the prefix, falling back to a global lookup.
    pub fn lookup(&self, name: &str) -> Result<Descriptor, NameNotFound> {
        self.resolve(name, Registry::lookup)
    }

    /// Like [`Scope::lookup`], but only resolves services.
    pub fn lookup_service(&self, name: &str) -> Result<Arc<ServiceDescriptor>, NameNotFound> {
        self.resolve(name, Registry::lookup_service)
    }

    /// Like [`Scope::lookup`], but only resolves message types.
    pub fn lookup_message(&self, name: &str) -> Result<Arc<MessageType>, NameNotFound> {
        self.resolve(name, Registry::lookup_message)
    }

    /// Lists every service whose fully qualified name lies inside this scope.
    pub fn services(&self) -> Vec<Arc<ServiceDescriptor>> {
        self.registry
            .services()
            .into_iter()
            .filter(|service| self.contains(service.name()))
            .collect()
    }

    fn resolve<T>(
        &self,
        name: &str,
        find: impl Fn(&Registry, &str) -> Result<T, NameNotFound>,
    ) -> Result<T, NameNotFound> {
        if let Some(absolute) = name.strip_prefix('.') {
            return find(self.registry, absolute);
        }

        if !self.prefix.is_empty()
            && let Ok(found) = find(self.registry, &self.qualify(name))
        {
            return Ok(found);
        }

        find(self.registry, name).map_err(|_| NameNotFound(name.to_string()))
    }

    fn qualify(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    fn contains(&self, full_name: &str) -> bool {
        self.prefix.is_empty()
            || full_name
                .strip_prefix(self.prefix.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }
}
