//! Fast-mapping table.
//!
//! # Responsibilities
//! - Walk the handler tree once at startup
//! - Derive every convention route key for every leaf
//! - Answer `"<method>:<path>"` lookups in O(1)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Group prefixes in concatenated and underscored styles; leaf paths also
//!   in nested style
//! - On key collision the first leaf (tree order) wins and a warning is logged

use std::collections::HashMap;
use std::sync::Arc;

use crate::registry::{Handler, HandlerTree};
use crate::routing::naming::{self, JoinStyle};

/// Flat `"<method>:<path>"` → handler table.
#[derive(Debug, Default)]
pub struct FastMappingTable {
    routes: HashMap<String, Arc<Handler>>,
}

impl FastMappingTable {
    pub fn build(tree: &HandlerTree) -> Self {
        let mut table = Self::default();
        for (groups, handler) in tree.leaves() {
            for key in route_keys(&groups, handler.name()) {
                table.insert(key, handler);
            }
        }
        tracing::debug!(routes = table.routes.len(), "Fast-mapping table built");
        table
    }

    fn insert(&mut self, key: String, handler: &Arc<Handler>) {
        match self.routes.get(&key) {
            Some(existing) if Arc::ptr_eq(existing, handler) => {}
            Some(existing) => {
                tracing::warn!(
                    key = %key,
                    kept = existing.name(),
                    ignored = handler.name(),
                    "Route key collision"
                );
            }
            None => {
                self.routes.insert(key, handler.clone());
            }
        }
    }

    /// Look up a normalized method and path.
    pub fn get(&self, method: &str, path: &str) -> Option<&Arc<Handler>> {
        self.routes.get(&format!("{method}:{path}"))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

/// All `"<method>:<path>"` keys for leaf `name` under `groups`.
pub fn route_keys(groups: &[&str], name: &str) -> Vec<String> {
    let Some((method, words)) = naming::method_and_words(name) else {
        return Vec::new();
    };

    let mut prefixes = vec![String::new()];
    for group in groups {
        let group_words = naming::split_words(group);
        let mut next = Vec::with_capacity(prefixes.len() * JoinStyle::GROUP.len());
        for prefix in &prefixes {
            for style in JoinStyle::GROUP {
                let candidate = format!("{prefix}/{}", naming::join(&group_words, style));
                if !next.contains(&candidate) {
                    next.push(candidate);
                }
            }
        }
        prefixes = next;
    }

    let mut keys = Vec::new();
    for prefix in &prefixes {
        for style in JoinStyle::LEAF {
            let tail = naming::join(&words, style);
            let path = match (prefix.is_empty(), tail.is_empty()) {
                (true, true) => "/".to_string(),
                (false, true) => prefix.clone(),
                _ => format!("{prefix}/{tail}"),
            };
            let key = format!("{method}:{path}");
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}
