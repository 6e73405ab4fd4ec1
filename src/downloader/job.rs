//! Fetch job model and job-matrix expansion
//!
//! Two job families exist:
//! - static jobs, one per global endpoint, with no resource association
//! - per-resource jobs, one per discovered resource and [`ResourceQuery`]

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Resource;

/// Query parameter carrying the per-resource filter expression
pub const FILTER_PARAM: &str = "filter";

/// A global endpoint fetched once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEndpoint {
    /// Artifact and manifest key
    pub key: String,
    /// API path
    pub path: String,
}

impl StaticEndpoint {
    /// Create an endpoint entry
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
        }
    }
}

/// The seven global governance endpoints captured by default
pub fn default_static_endpoints() -> Vec<StaticEndpoint> {
    [
        ("campaigns", "/governance/api/v1/campaigns"),
        ("reviews", "/governance/api/v1/reviews"),
        ("requests", "/governance/api/v1/requests"),
        ("request-types", "/governance/api/v1/request-types"),
        ("collections", "/governance/api/v1/collections"),
        ("delegates", "/governance/api/v1/delegates"),
        ("labels", "/governance/api/v1/labels"),
    ]
    .into_iter()
    .map(|(key, path)| StaticEndpoint::new(key, path))
    .collect()
}

/// Resource-scoped query run for every discovered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceQuery {
    /// Entitlements defined on the resource
    Entitlements,
    /// Values of those entitlements
    EntitlementValues,
    /// Grants of entitlements on the resource
    Grants,
    /// Owners assigned to the resource
    ResourceOwners,
}

impl ResourceQuery {
    /// Every per-resource query, in expansion order
    pub const ALL: [ResourceQuery; 4] = [
        ResourceQuery::Entitlements,
        ResourceQuery::EntitlementValues,
        ResourceQuery::Grants,
        ResourceQuery::ResourceOwners,
    ];

    /// Artifact and manifest key
    pub fn key(&self) -> &'static str {
        match self {
            ResourceQuery::Entitlements => "entitlements",
            ResourceQuery::EntitlementValues => "entitlement-values",
            ResourceQuery::Grants => "grants",
            ResourceQuery::ResourceOwners => "resource-owners",
        }
    }

    /// API path queried with the resource filter
    pub fn path(&self) -> &'static str {
        match self {
            ResourceQuery::Entitlements => "/governance/api/v1/entitlements",
            ResourceQuery::EntitlementValues => "/governance/api/v1/entitlement-values",
            ResourceQuery::Grants => "/governance/api/v1/grants",
            ResourceQuery::ResourceOwners => "/governance/api/v1/resource-owners",
        }
    }
}

impl fmt::Display for ResourceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What a job's results belong to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTarget {
    /// A global endpoint
    Static {
        /// Endpoint key
        key: String,
    },
    /// One query for one resource
    Resource {
        /// Discovered parent resource
        resource: Resource,
        /// Query type
        query: ResourceQuery,
    },
}

/// One fetch job, executed exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// API path
    pub path: String,
    /// Parameters sent with every page
    pub params: Vec<(String, String)>,
    /// Owner of the results
    pub target: JobTarget,
}

impl Job {
    /// Job for a global endpoint
    pub fn for_static(endpoint: &StaticEndpoint) -> Self {
        Self {
            path: endpoint.path.clone(),
            params: Vec::new(),
            target: JobTarget::Static {
                key: endpoint.key.clone(),
            },
        }
    }

    /// Job for one query on one resource
    pub fn for_resource(resource: &Resource, query: ResourceQuery) -> Self {
        Self {
            path: query.path().to_string(),
            params: vec![(FILTER_PARAM.to_string(), resource.filter_expression())],
            target: JobTarget::Resource {
                resource: resource.clone(),
                query,
            },
        }
    }

    /// Human-readable identifier used in logs and error lists
    pub fn label(&self) -> String {
        match &self.target {
            JobTarget::Static { key } => key.clone(),
            JobTarget::Resource { resource, query } => format!("{resource}/{query}"),
        }
    }
}

/// Static jobs for `endpoints`, in catalog order
pub fn static_jobs(endpoints: &[StaticEndpoint]) -> Vec<Job> {
    endpoints.iter().map(Job::for_static).collect()
}

/// Resource × query job matrix, resource-major
pub fn resource_jobs(resources: &[Resource]) -> Vec<Job> {
    resources
        .iter()
        .flat_map(|resource| {
            ResourceQuery::ALL
                .iter()
                .map(move |query| Job::for_resource(resource, *query))
        })
        .collect()
}
