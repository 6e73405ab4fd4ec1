//! Resource discovery
//!
//! Lists applications and groups from the (non-governance) management API to
//! seed the per-resource job matrix. Each listing is caught independently: a
//! failure leaves that type with no resources and the run continues.

use tracing::{info, warn};

use crate::fetcher::{IgaHttpClient, PaginationHelper};
use crate::{Record, Resource, ResourceType};

/// Listing endpoints queried during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEndpoints {
    /// Application listing path
    pub applications: String,
    /// Group listing path
    pub groups: String,
}

impl DiscoveryEndpoints {
    /// Listing path for `kind`
    pub fn path(&self, kind: ResourceType) -> &str {
        match kind {
            ResourceType::Application => &self.applications,
            ResourceType::Group => &self.groups,
        }
    }
}

impl Default for DiscoveryEndpoints {
    fn default() -> Self {
        Self {
            applications: "/api/v1/apps".to_string(),
            groups: "/api/v1/groups".to_string(),
        }
    }
}

/// Result of discovering one resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// Resource type queried
    pub kind: ResourceType,
    /// Resources kept after truncation, in delivery order
    pub resources: Vec<Resource>,
    /// Records returned by the listing before truncation
    pub fetched: usize,
    /// Why the listing failed, if it did
    pub error: Option<String>,
}

impl DiscoveryOutcome {
    /// Whether the listing degraded to an empty resource list
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Discovery results for every requested type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// One outcome per requested type, in request order
    pub outcomes: Vec<DiscoveryOutcome>,
}

impl DiscoveryReport {
    /// All kept resources, type by type
    pub fn resources(&self) -> Vec<Resource> {
        self.outcomes
            .iter()
            .flat_map(|outcome| outcome.resources.iter().cloned())
            .collect()
    }

    /// Kept resources of one type
    pub fn resources_of(&self, kind: ResourceType) -> Vec<Resource> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.kind == kind)
            .flat_map(|outcome| outcome.resources.iter().cloned())
            .collect()
    }
}

/// Discover resources of each type in `kinds`
///
/// # Arguments
/// * `http_client` - Shared transport
/// * `endpoints` - Listing paths
/// * `kinds` - Types to discover; other types are never queried
/// * `limit` - Keep at most this many resources per type
/// * `page_size` - Forwarded to the paginator
pub async fn discover(
    http_client: &IgaHttpClient,
    endpoints: &DiscoveryEndpoints,
    kinds: &[ResourceType],
    limit: Option<usize>,
    page_size: Option<u32>,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    for kind in ResourceType::ALL.into_iter().filter(|kind| kinds.contains(kind)) {
        let path = endpoints.path(kind);
        let outcome = match PaginationHelper::fetch_all(http_client, path, &[], page_size).await {
            Ok(records) => {
                let fetched = records.len();
                let resources = resources_from_records(kind, &records, limit);
                info!(
                    "Discovered {} {} ({} kept)",
                    fetched,
                    kind.plural(),
                    resources.len()
                );
                DiscoveryOutcome {
                    kind,
                    resources,
                    fetched,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Discovery of {} failed, continuing without them",
                    kind.plural()
                );
                DiscoveryOutcome {
                    kind,
                    resources: Vec::new(),
                    fetched: 0,
                    error: Some(e.to_string()),
                }
            }
        };
        report.outcomes.push(outcome);
    }

    report
}

/// Turn listing records into resources, keeping the first `limit` with an `id`
pub fn resources_from_records(
    kind: ResourceType,
    records: &[Record],
    limit: Option<usize>,
) -> Vec<Resource> {
    let ids = records.iter().enumerate().filter_map(|(index, record)| {
        match record.get("id").and_then(|id| id.as_str()) {
            Some(id) if !id.is_empty() => Some(id),
            _ => {
                warn!("Skipping {} record {} without an id", kind.plural(), index);
                None
            }
        }
    });

    match limit {
        Some(max) => ids.take(max).map(|id| Resource::new(kind, id)).collect(),
        None => ids.map(|id| Resource::new(kind, id)).collect(),
    }
}
