//! Dimensions.

use std::sync::Arc;

use crate::error::{CubeError, CubeResult};

use super::level::{Hierarchy, LevelRef};
use super::metadata::Metadata;

/// A named axis of analysis with one or more hierarchies. The first
/// hierarchy is the default one.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub hierarchies: Vec<Arc<Hierarchy>>,
    pub metadata: Metadata,
}

impl Dimension {
    /// Bind `hierarchies` to a new dimension.
    pub fn new(name: impl Into<String>, hierarchies: Vec<Hierarchy>) -> CubeResult<Self> {
        let name = name.into();
        if hierarchies.is_empty() {
            return Err(CubeError::InvalidDefinition(format!(
                "dimension {name} has no hierarchy"
            )));
        }
        let hierarchies = hierarchies
            .into_iter()
            .map(|h| h.bind(&name).map(Arc::new))
            .collect::<CubeResult<Vec<_>>>()?;
        Ok(Self {
            name,
            hierarchies,
            metadata: Metadata::new(),
        })
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn default_hierarchy(&self) -> &Arc<Hierarchy> {
        &self.hierarchies[0]
    }

    pub fn hierarchy(&self, name: &str) -> Option<&Arc<Hierarchy>> {
        self.hierarchies.iter().find(|h| h.name == name)
    }

    /// Levels of the default hierarchy, `All` first.
    pub fn levels(&self) -> Vec<LevelRef> {
        let h = self.default_hierarchy();
        (0..h.levels.len())
            .map(|i| LevelRef::new(h.clone(), i))
            .collect()
    }

    /// A level of the default hierarchy.
    pub fn level(&self, name: &str) -> CubeResult<LevelRef> {
        let h = self.default_hierarchy();
        h.position(name)
            .map(|i| LevelRef::new(h.clone(), i))
            .ok_or_else(|| CubeError::UnknownLevel {
                dimension: self.name.clone(),
                level: name.into(),
            })
    }

    /// The `All` level.
    pub fn all(&self) -> LevelRef {
        LevelRef::new(self.default_hierarchy().clone(), 0)
    }
}
