use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::SourceError;
use crate::source::Source;

/// Name-keyed set of sources assembled by the hosting program.
#[derive(Clone)]
pub struct SourceRegistry {
    sources: Arc<HashMap<String, Arc<dyn Source>>>,
}

impl SourceRegistry {
    /// Starts a builder for registering sources.
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    /// Looks up a source by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Source>, SourceError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::SourceNotFound {
                name: name.to_string(),
            })
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Builder used to register sources before creating a [`SourceRegistry`].
#[derive(Default)]
pub struct SourceRegistryBuilder {
    sources: Vec<Arc<dyn Source>>,
}

impl SourceRegistryBuilder {
    /// Registers a source under its own [`Source::name`].
    pub fn register(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    /// Builds the registry, rejecting empty and duplicate names.
    pub fn build(self) -> Result<SourceRegistry, SourceError> {
        let mut map: HashMap<String, Arc<dyn Source>> = HashMap::new();
        for source in self.sources {
            let name = source.name().trim().to_string();
            if name.is_empty() {
                return Err(SourceError::Registry("source name must not be empty".into()));
            }
            if map.contains_key(&name) {
                return Err(SourceError::Registry(format!(
                    "duplicate source registration: {name}"
                )));
            }
            map.insert(name, source);
        }
        Ok(SourceRegistry {
            sources: Arc::new(map),
        })
    }
}
