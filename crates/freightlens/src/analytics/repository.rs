use serde::{Deserialize, Serialize};

use super::definitions::{MetricDefinition, Segment, TransactionOverride};

/// Everything a persistence backend holds for the catalog: the user-created
/// definitions and the manual overrides. Baselines are seeded in code and
/// never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomDefinitions {
    pub metrics: Vec<MetricDefinition>,
    pub segments: Vec<Segment>,
    pub overrides: Vec<TransactionOverride>,
}

/// Storage abstraction injected into the catalog service so the core stays
/// free of persistence calls. Implementations round-trip through the same
/// JSON wire shapes the definitions serialize to.
pub trait DefinitionRepository: Send + Sync {
    fn load(&self) -> Result<CustomDefinitions, RepositoryError>;
    fn save(&self, definitions: &CustomDefinitions) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("stored definitions are not readable: {0}")]
    Corrupt(String),
}
