use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Incomplete content: {missing} item(s) are missing generated audio")]
    IncompleteContent { missing: usize },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(errs: validator::ValidationErrors) -> Self {
        CoreError::MalformedInput(errs.to_string())
    }
}
