//! # Configuration Store Interface
//!
//! The read path talks to the configuration store only through
//! [`ConfigStore`]: datastore and option selection, session refresh and
//! path-based item iteration.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: shared in-memory maps (fast, volatile)
//! - [`RedbStore`]: one redb table per datastore (ACID, persistent)
//!
//! Both report "no data" (`UnknownModel`, `NotFound`) distinctly from real
//! failures and return items in path order, so they answer every query the
//! same way.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::path::{PathFilter, Predicate, Segment, parse_segments, render_segments};
use crate::types::{Datastore, StoreFault};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// ITEMS
// =============================================================================

/// One `(path, value, is-default)` triple reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
    /// Normalized instance path.
    pub path: String,
    /// Value for leaves and leaf-list entries; absent for interior nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether the value is the schema default rather than explicitly set.
    #[serde(default)]
    pub default: bool,
}

impl StoreItem {
    #[must_use]
    pub fn new(path: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            path: path.into(),
            value: value.map(str::to_string),
            default: false,
        }
    }

    /// Builder: flag the item as a schema default.
    #[must_use]
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }
}

/// What a store keeps per instance path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: Option<String>,
    pub default: bool,
    /// State (`config false`) data; hidden from config-only handles.
    pub state: bool,
}

/// Item iteration over a store query.
pub type ItemIter<'a> = Box<dyn Iterator<Item = Result<StoreItem, StoreFault>> + 'a>;

// =============================================================================
// STORE TRAIT
// =============================================================================

/// A handle onto a configuration store.
///
/// Each handle carries its own datastore selection, config-only selection
/// and candidate. Running and startup data are shared between handles of the
/// same store.
pub trait ConfigStore: Send + fmt::Debug {
    /// Datastore the handle currently reads from.
    fn datastore(&self) -> Datastore;

    /// Switch the handle to another datastore.
    fn switch_datastore(&mut self, datastore: Datastore) -> Result<(), StoreFault>;

    /// Whether state data is hidden from this handle.
    fn config_only(&self) -> bool;

    /// Show or hide state data.
    fn set_config_only(&mut self, config_only: bool) -> Result<(), StoreFault>;

    /// Bring the handle's view up to date.
    ///
    /// On the candidate datastore this replaces the handle's candidate with a
    /// copy of running. Candidates of other handles are untouched.
    fn refresh(&mut self) -> Result<(), StoreFault>;

    /// Items at or beneath the nodes selected by `filter`, in path order.
    ///
    /// Returns `UnknownModel` when the filter's module is not installed and
    /// `NotFound` when nothing matches.
    fn get_items(&self, filter: &PathFilter) -> Result<ItemIter<'_>, StoreFault>;

    /// Write one item into a datastore.
    fn set_item(
        &mut self,
        datastore: Datastore,
        path: &str,
        value: StoredValue,
    ) -> Result<(), StoreFault>;

    /// Make a module's data known to the store.
    fn install_module(&mut self, module: &str) -> Result<(), StoreFault>;

    /// Installed module names, sorted.
    fn installed_modules(&self) -> Result<Vec<String>, StoreFault>;
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Parse and re-render an instance path.
pub(crate) fn normalize(path: &str) -> Result<(String, String), StoreFault> {
    let segments = parse_segments(path).map_err(|e| StoreFault::InvalidPath(e.to_string()))?;
    if segments.iter().any(Segment::is_wildcard) {
        return Err(StoreFault::InvalidPath(format!("wildcard in instance path {}", path)));
    }
    let module = segments
        .first()
        .map(|s| s.module.clone())
        .unwrap_or_default();
    Ok((render_segments(&segments), module))
}

/// Key prefix shared by every stored path of a module.
pub(crate) fn module_prefix(module: &str) -> String {
    format!("/{}:", module)
}

/// The stored paths of one module, copied out of a datastore map.
pub(crate) fn module_items(
    items: &BTreeMap<String, StoredValue>,
    module: &str,
) -> BTreeMap<String, StoredValue> {
    let prefix = module_prefix(module);
    items
        .range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .map(|(path, value)| (path.clone(), value.clone()))
        .collect()
}

/// Order of two parsed instance paths, parents before their descendants.
///
/// Segments compare by module, name and predicates; keyless list positions
/// compare as numbers so `[10]` follows `[9]`.
pub(crate) fn path_order(a: &[Segment], b: &[Segment]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            x.module
                .cmp(&y.module)
                .then_with(|| x.name.cmp(&y.name))
                .then_with(|| predicate_order(&x.predicates, &y.predicates))
        })
        .find(|step| step.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn predicate_order(a: &[Predicate], b: &[Predicate]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Predicate::Position(p), Predicate::Position(q)) => p.cmp(q),
            _ => x.to_string().cmp(&y.to_string()),
        })
        .find(|step| step.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// Select the items a filter covers from one module's stored paths.
///
/// `data` must hold the module's paths (and may hold others). Predicates on
/// non-key leaves are resolved against the stored values. Items come back in
/// [`path_order`], not in key order.
pub(crate) fn select_items(
    filter: &PathFilter,
    data: &BTreeMap<String, StoredValue>,
    config_only: bool,
) -> Result<Vec<StoreItem>, StoreFault> {
    let mut items = Vec::new();
    for (path, stored) in data {
        if config_only && stored.state {
            continue;
        }
        let segments =
            parse_segments(path).map_err(|e| StoreFault::Serialization(e.to_string()))?;
        let covered = filter.covers(&segments, |depth, name| {
            let mut node = render_segments(&segments[..=depth]);
            if name != "." {
                node.push('/');
                node.push_str(name);
            }
            data.get(&node).and_then(|v| v.value.clone())
        });
        if covered {
            let item = StoreItem {
                path: path.clone(),
                value: stored.value.clone(),
                default: stored.default,
            };
            items.push((segments, item));
        }
    }
    items.sort_by(|(a, _), (b, _)| path_order(a, b));
    Ok(items.into_iter().map(|(_, item)| item).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(value: &str) -> StoredValue {
        StoredValue {
            value: Some(value.into()),
            default: false,
            state: false,
        }
    }

    #[test]
    fn normalize_drops_redundant_prefixes() {
        let (path, module) = normalize("/m:a/m:b[m:k='1']/c").expect("normalize");
        assert_eq!(path, "/m:a/b[k='1']/c");
        assert_eq!(module, "m");
        assert!(normalize("/m:a/*").is_err());
    }

    #[test]
    fn predicates_resolve_against_stored_leaves() {
        let mut data = BTreeMap::new();
        data.insert("/m:a/e[k='1']/k".to_string(), stored("1"));
        data.insert("/m:a/e[k='1']/v".to_string(), stored("x"));
        data.insert("/m:a/e[k='2']/k".to_string(), stored("2"));
        data.insert("/m:a/e[k='2']/v".to_string(), stored("y"));

        let filter = PathFilter::parse("/m:a/e[v='y']").expect("parse");
        let items = select_items(&filter, &data, false).expect("select");
        let paths: Vec<_> = items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["/m:a/e[k='2']/k", "/m:a/e[k='2']/v"]);
    }

    #[test]
    fn config_only_hides_state() {
        let mut data = BTreeMap::new();
        data.insert("/m:a/x".to_string(), stored("1"));
        data.insert(
            "/m:a/counter".to_string(),
            StoredValue {
                state: true,
                ..stored("5")
            },
        );
        let filter = PathFilter::parse("/m:*").expect("parse");
        assert_eq!(select_items(&filter, &data, true).expect("select").len(), 1);
        assert_eq!(select_items(&filter, &data, false).expect("select").len(), 2);
    }

    #[test]
    fn keyless_positions_sort_numerically() {
        let mut data = BTreeMap::new();
        for pos in 1..=12 {
            data.insert(format!("/m:top/log[{}]/msg", pos), stored(&format!("line {}", pos)));
        }
        data.insert("/m:top/log[2]/level".to_string(), stored("warn"));

        let filter = PathFilter::parse("/m:top").expect("parse");
        let paths: Vec<String> = select_items(&filter, &data, false)
            .expect("select")
            .into_iter()
            .map(|i| i.path)
            .collect();
        assert_eq!(paths[0], "/m:top/log[1]/msg");
        assert_eq!(paths[1], "/m:top/log[2]/level");
        assert_eq!(paths[2], "/m:top/log[2]/msg");
        assert_eq!(paths[10], "/m:top/log[10]/msg");
        assert_eq!(paths[12], "/m:top/log[12]/msg");
    }

    #[test]
    fn parents_sort_before_descendants() {
        let a = parse_segments("/m:a/b").expect("parse");
        let b = parse_segments("/m:a/b/c").expect("parse");
        let c = parse_segments("/m:a/b-c").expect("parse");
        assert_eq!(path_order(&a, &b), Ordering::Less);
        assert_eq!(path_order(&b, &c), Ordering::Less);
        assert_eq!(path_order(&a, &a), Ordering::Equal);
    }
}
