//! `_include` expansion over the reference DAG.
//!
//! Supported values: `Consent:actor`, `Organization:endpoint`,
//! `Organization:partof`. The latter two also accept `:iterate`, which
//! follows references from already-included Organizations. Expansion is a
//! bounded BFS; the Organization graph is a DAG so depth 2 covers the
//! parent-org chains seen in practice.

use std::collections::HashSet;

use hdp_core::Reference;
use hdp_core::resources::AnyResource;

use crate::search::SearchParams;
use crate::store::ResourceStore;

const MAX_ITERATE_DEPTH: usize = 2;

/// A parsed `_include` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeParam {
    pub source_type: String,
    pub search_param: String,
    pub iterate: bool,
}

impl IncludeParam {
    fn parse(value: &str, iterate: bool) -> Option<Self> {
        let (source_type, search_param) = value.split_once(':')?;
        let supported = matches!(
            (source_type, search_param),
            ("Consent", "actor") | ("Organization", "endpoint") | ("Organization", "partof")
        );
        supported.then(|| Self {
            source_type: source_type.to_string(),
            search_param: search_param.to_string(),
            iterate,
        })
    }
}

/// Extracts supported `_include` / `_include:iterate` directives; anything
/// else is ignored like any other unknown parameter.
#[must_use]
pub fn parse_includes(params: &SearchParams) -> Vec<IncludeParam> {
    let mut includes = Vec::new();
    for value in params.all("_include") {
        if let Some(include) = IncludeParam::parse(value, false) {
            includes.push(include);
        }
    }
    for value in params.all("_include:iterate") {
        if let Some(include) = IncludeParam::parse(value, true) {
            includes.push(include);
        }
    }
    includes
}

/// Expands includes for a set of matched resources.
///
/// Matched resources are never duplicated into the include set, and each
/// included resource appears once. `allow` filters candidate references
/// before resolution; the Consent search uses it to keep the expansion
/// inside the caller's visible graph.
pub fn expand_includes(
    store: &ResourceStore,
    includes: &[IncludeParam],
    matches: &[AnyResource],
    allow: impl Fn(&Reference) -> bool,
) -> Vec<AnyResource> {
    let mut seen: HashSet<String> = matches.iter().map(AnyResource::key).collect();
    let mut included = Vec::new();

    // Seed pass over the matches themselves.
    let mut frontier: Vec<AnyResource> = Vec::new();
    for resource in matches {
        collect_references(resource, includes, false, &allow, |reference| {
            if let Some(found) = store.resolve(reference)
                && seen.insert(found.key())
            {
                frontier.push(found.clone());
                included.push(found);
            }
        });
    }

    // Iterate passes walk from included resources only.
    for _ in 0..MAX_ITERATE_DEPTH {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for resource in &frontier {
            collect_references(resource, includes, true, &allow, |reference| {
                if let Some(found) = store.resolve(reference)
                    && seen.insert(found.key())
                {
                    next.push(found.clone());
                    included.push(found);
                }
            });
        }
        frontier = next;
    }

    included
}

fn collect_references(
    resource: &AnyResource,
    includes: &[IncludeParam],
    iterating: bool,
    allow: &impl Fn(&Reference) -> bool,
    mut emit: impl FnMut(&Reference),
) {
    for include in includes {
        if iterating && !include.iterate {
            continue;
        }
        match (resource, include.source_type.as_str(), include.search_param.as_str()) {
            (AnyResource::Consent(consent), "Consent", "actor") => {
                for actor in &consent.provision.actor {
                    if allow(&actor.reference) {
                        emit(&actor.reference);
                    }
                }
            }
            (AnyResource::Organization(org), "Organization", "endpoint") => {
                for endpoint in &org.endpoint {
                    if allow(endpoint) {
                        emit(endpoint);
                    }
                }
            }
            (AnyResource::Organization(org), "Organization", "partof") => {
                if let Some(parent) = &org.part_of
                    && allow(parent)
                {
                    emit(parent);
                }
            }
            _ => {}
        }
    }
}
