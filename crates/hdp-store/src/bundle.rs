//! Searchset Bundle assembly.

use serde::Serialize;

use hdp_core::resources::AnyResource;

/// `Bundle.entry.search.mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Match,
    Include,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleSearch {
    pub mode: SearchMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl")]
    pub full_url: String,
    pub resource: AnyResource,
    pub search: BundleSearch,
}

/// A searchset Bundle. `total` counts matches only, not includes.
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    #[serde(rename = "type")]
    pub bundle_type: &'static str,
    pub total: usize,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// Assembles a searchset from matches and included resources.
    #[must_use]
    pub fn searchset(
        base_url: &str,
        matches: Vec<AnyResource>,
        included: Vec<AnyResource>,
    ) -> Self {
        let total = matches.len();
        let base = base_url.trim_end_matches('/');
        let entry = matches
            .into_iter()
            .map(|resource| (resource, SearchMode::Match))
            .chain(included.into_iter().map(|r| (r, SearchMode::Include)))
            .map(|(resource, mode)| BundleEntry {
                full_url: format!("{base}/{}", resource.key()),
                resource,
                search: BundleSearch { mode },
            })
            .collect();
        Self {
            resource_type: "Bundle",
            bundle_type: "searchset",
            total,
            entry,
        }
    }
}
