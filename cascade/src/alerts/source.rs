//! The analytical-store seam.

use crate::errors::CascadeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// One tenant's row from an alert query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRow {
    /// The tenant the row belongs to.
    pub tenant_id: String,
    /// Metric fields read by conditions.
    pub fields: HashMap<String, serde_json::Value>,
}

impl TenantRow {
    /// Creates a row for a tenant.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            fields: HashMap::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Trait for executing alert queries against the external analytical store.
#[async_trait]
pub trait MetricSource: Send + Sync + Debug {
    /// Runs a parameterized query template, returning one row per tenant.
    async fn query(
        &self,
        template: &str,
        params: &HashMap<String, serde_json::Value>,
    ) -> Result<Vec<TenantRow>, CascadeError>;
}

/// A metric source backed by fixed rows.
#[derive(Debug, Default, Clone)]
pub struct StaticMetricSource {
    rows: Vec<TenantRow>,
}

impl StaticMetricSource {
    /// Creates a source returning the given rows for every query.
    #[must_use]
    pub fn new(rows: Vec<TenantRow>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl MetricSource for StaticMetricSource {
    async fn query(
        &self,
        _template: &str,
        _params: &HashMap<String, serde_json::Value>,
    ) -> Result<Vec<TenantRow>, CascadeError> {
        Ok(self.rows.clone())
    }
}
