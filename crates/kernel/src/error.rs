use blockworld_common::{EntityId, InstanceId};
use blockworld_rules::RuleError;

/// Errors from world operations.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown instance {0:?}")]
    UnknownInstance(InstanceId),
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),
    #[error("entity {0} is not a creature")]
    NotACreature(EntityId),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
