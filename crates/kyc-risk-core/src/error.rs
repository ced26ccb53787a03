use thiserror::Error;

#[derive(Debug, Error)]
pub enum KycRiskError {
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Configuration error for version '{version}': {reason}")]
    Configuration { version: String, reason: String },

    #[error("Collaborator unavailable: {collaborator}: {reason}")]
    TransientCollaborator {
        collaborator: String,
        reason: String,
    },

    #[error("Authorization denied for '{principal}': {reason}")]
    Authorization { principal: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KycRiskError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        KycRiskError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(version: impl Into<String>, reason: impl Into<String>) -> Self {
        KycRiskError::Configuration {
            version: version.into(),
            reason: reason.into(),
        }
    }

    pub fn transient(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        KycRiskError::TransientCollaborator {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        KycRiskError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl ToString) -> Self {
        KycRiskError::Conflict {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Transient failures are worth retrying on the next scheduled run;
    /// everything else is a caller or data problem.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KycRiskError::TransientCollaborator { .. } | KycRiskError::Conflict { .. }
        )
    }
}

impl From<serde_json::Error> for KycRiskError {
    fn from(e: serde_json::Error) -> Self {
        KycRiskError::Serialization(e.to_string())
    }
}
