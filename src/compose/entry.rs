//! Entry normalization, filtering and shim injection

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::EntryValue;
use crate::paths::ToolPaths;

/// Entry name -> ordered module list
pub type EntryMap = BTreeMap<String, Vec<String>>;

/// Modules injected ahead of every development entry, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryShimSet(Vec<String>);

impl EntryShimSet {
    /// Hot-reload patch, dev transport client bound to `port`, hot-module runtime
    pub fn hot_reload(paths: &ToolPaths, port: u16) -> Self {
        Self(vec![
            paths.shared_module("react-hot-loader/patch"),
            format!(
                "{}?http://127.0.0.1:{}/",
                paths.shared_module("webpack-dev-server/client"),
                port
            ),
            paths.shared_module("webpack/hot/dev-server"),
        ])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Convert declared entries to list form
pub fn normalize(entries: &BTreeMap<String, EntryValue>) -> EntryMap {
    entries
        .iter()
        .map(|(name, value)| (name.clone(), value.to_list()))
        .collect()
}

/// Keep only the entries named in `only`; an empty list keeps everything.
///
/// Names without a matching entry are skipped.
pub fn filter_entries(mut entries: EntryMap, only: &[String]) -> EntryMap {
    if only.is_empty() {
        return entries;
    }

    let mut selected = EntryMap::new();
    for name in only {
        match entries.remove(name) {
            Some(modules) => {
                selected.insert(name.clone(), modules);
            }
            None => warn!("dev_build_only names unknown entry '{}'", name),
        }
    }
    selected
}

/// Prepend `shims` to every entry's module list
pub fn prepend_shims(entries: EntryMap, shims: &EntryShimSet) -> EntryMap {
    if shims.is_empty() {
        return entries;
    }

    entries
        .into_iter()
        .map(|(name, modules)| {
            let mut expanded = Vec::with_capacity(shims.0.len() + modules.len());
            expanded.extend(shims.0.iter().cloned());
            expanded.extend(modules);
            (name, expanded)
        })
        .collect()
}
