//! Request DTOs for the version store.

use admix_core::types::VersionId;
use admix_core::version::{CreatedBy, PayloadPatch, VersionPayload};
use serde::Deserialize;

/// DTO for creating a new draft version.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVersion {
    pub payload: VersionPayload,
    #[serde(default)]
    pub created_by: CreatedBy,
    #[serde(default)]
    pub parent_version_id: Option<VersionId>,
}

/// DTO for patching a draft. Only fields present in the patch are applied.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVersion {
    pub payload: PayloadPatch,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloneVersion {
    #[serde(default)]
    pub created_by: CreatedBy,
}

