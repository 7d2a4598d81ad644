use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Registry of detector backends, keyed by name.
///
/// The monitor owns a single backend at a time; the registry only resolves
/// which one to hand over.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DetectorBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// List registered backends, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return a backend by name.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn DetectorBackend>> {
        self.backends.remove(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            )
        })
    }

    /// Remove and return the default backend.
    pub fn take_default(&mut self) -> Result<Box<dyn DetectorBackend>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.take(&name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{CpuBackend, StubBackend};

    #[test]
    fn first_registered_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(CpuBackend::new());
        registry.register(StubBackend::new());

        assert_eq!(registry.list(), vec!["cpu", "stub"]);
        let backend = registry.take_default().unwrap();
        assert_eq!(backend.name(), "cpu");
        assert!(!registry.contains("cpu"));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        assert!(registry.set_default("yolo").is_err());
        let err = registry.take("yolo").err().unwrap();
        assert!(err.to_string().contains("stub"));
    }

    #[test]
    fn empty_registry_has_no_default() {
        let mut registry = BackendRegistry::default();
        assert!(registry.take_default().is_err());
    }
}
