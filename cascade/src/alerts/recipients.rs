//! Recipient resolution.

use super::config::RecipientSpec;
use crate::errors::CascadeError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// Trait for the role-based owner lookup.
#[async_trait]
pub trait OrgDirectory: Send + Sync + Debug {
    /// Returns the owner email addresses of a tenant's organization.
    async fn owner_emails(&self, tenant_id: &str) -> Result<Vec<String>, CascadeError>;
}

/// Directory backed by a fixed map.
#[derive(Debug, Default, Clone)]
pub struct StaticOrgDirectory {
    owners: HashMap<String, Vec<String>>,
}

impl StaticOrgDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tenant's owners.
    #[must_use]
    pub fn with_owners(
        mut self,
        tenant_id: impl Into<String>,
        emails: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.owners
            .insert(tenant_id.into(), emails.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl OrgDirectory for StaticOrgDirectory {
    async fn owner_emails(&self, tenant_id: &str) -> Result<Vec<String>, CascadeError> {
        Ok(self.owners.get(tenant_id).cloned().unwrap_or_default())
    }
}

/// Resolves a recipient spec to concrete email addresses.
pub async fn resolve_recipients(
    spec: &RecipientSpec,
    tenant_id: &str,
    directory: &dyn OrgDirectory,
) -> Result<Vec<String>, CascadeError> {
    match spec {
        RecipientSpec::OrgOwners => directory.owner_emails(tenant_id).await,
        RecipientSpec::Custom { emails } => Ok(emails.clone()),
    }
}
