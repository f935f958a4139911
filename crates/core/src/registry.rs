//! The fixed set of tools exposed to one assistant persona.

use crate::tool::ToolFunction;
use std::sync::Arc;

/// Rejected registry configurations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),
}

/// An ordered, immutable set of tools bound to a persona at construction.
///
/// Duplicate declared names are a configuration error and are rejected here,
/// not at call time. There is no registration or removal after construction.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolFunction>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn ToolFunction>>) -> Result<Self, RegistryError> {
        for (i, tool) in tools.iter().enumerate() {
            if tools[..i].iter().any(|t| t.name() == tool.name()) {
                return Err(RegistryError::DuplicateName(tool.name().to_string()));
            }
        }
        Ok(Self { tools })
    }

    /// An empty registry, for personas that expose no tools.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolFunction>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Tools in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ToolFunction>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
