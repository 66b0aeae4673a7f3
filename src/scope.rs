//! Multi-tenant scope enforcement.
//!
//! A single value type and a single comparison function — every ingestion
//! and query handler routes through [`Scope::authorize`] rather than
//! re-deriving its own org/store string comparisons. Grounded on the
//! teacher's `auth/models.rs` typed `UserRole` and on the single
//! `auth::middleware::extract_claims` chokepoint every authenticated handler
//! passes through.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub org_id: String,
    pub store_id: String,
    pub camera_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    OrgStoreMismatch {
        credential_org: String,
        credential_store: String,
        requested_org: String,
        requested_store: String,
    },
    CameraMismatch {
        credential_camera: String,
        requested_camera: Option<String>,
    },
}

impl std::fmt::Display for ScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeError::OrgStoreMismatch { credential_org, credential_store, requested_org, requested_store } => write!(
                f,
                "org/store scope mismatch: credential scoped to {credential_org}/{credential_store}, request was for {requested_org}/{requested_store}"
            ),
            ScopeError::CameraMismatch { credential_camera, requested_camera } => write!(
                f,
                "camera scope mismatch: credential scoped to camera {credential_camera}, request was for {requested_camera:?}"
            ),
        }
    }
}

impl Scope {
    pub fn new(org_id: impl Into<String>, store_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            store_id: store_id.into(),
            camera_id: None,
        }
    }

    pub fn with_camera(mut self, camera_id: impl Into<String>) -> Self {
        self.camera_id = Some(camera_id.into());
        self
    }

    /// `self` is the credential's scope; `requested` is what the caller
    /// claims for the event/query at hand. Returns `Ok(())` only if the
    /// request is fully contained within the credential's authority.
    pub fn authorize(&self, requested: &Scope) -> Result<(), ScopeError> {
        if self.org_id != requested.org_id || self.store_id != requested.store_id {
            return Err(ScopeError::OrgStoreMismatch {
                credential_org: self.org_id.clone(),
                credential_store: self.store_id.clone(),
                requested_org: requested.org_id.clone(),
                requested_store: requested.store_id.clone(),
            });
        }
        if let Some(cred_camera) = &self.camera_id {
            if requested.camera_id.as_deref() != Some(cred_camera.as_str()) {
                return Err(ScopeError::CameraMismatch {
                    credential_camera: cred_camera.clone(),
                    requested_camera: requested.camera_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_scoped_credential_accepts_any_camera() {
        let cred = Scope::new("org-1", "store-1");
        assert!(cred.authorize(&Scope::new("org-1", "store-1").with_camera("cam-9")).is_ok());
    }

    #[test]
    fn org_mismatch_is_rejected() {
        let cred = Scope::new("org-1", "store-1");
        assert!(cred.authorize(&Scope::new("org-2", "store-1")).is_err());
    }

    #[test]
    fn camera_scoped_credential_rejects_other_cameras() {
        let cred = Scope::new("org-1", "store-1").with_camera("cam-1");
        assert!(cred.authorize(&Scope::new("org-1", "store-1").with_camera("cam-1")).is_ok());
        assert!(cred.authorize(&Scope::new("org-1", "store-1").with_camera("cam-2")).is_err());
        assert!(cred.authorize(&Scope::new("org-1", "store-1")).is_err());
    }
}
