//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Resolve `(path, method)` to exactly one handler or a miss
//! - Fast mapping (flat table) when static mapping is enabled
//! - Nested lookup (tree walk) otherwise
//! - Unmatched `OPTIONS` falls back to the CORS handler
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Fast mapping never falls back to the tree walk on a miss
//! - The tree walk descends as deep as groups allow, then backs off one
//!   group at a time until a leaf matches
//! - Explicit miss (`None`) rather than a silent default

use std::sync::Arc;

use crate::registry::{signature, Group, Handler, HandlerTree};
use crate::routing::mapping::FastMappingTable;
use crate::routing::naming;

/// Synthetic method used to resolve WebSocket upgrades.
pub const WS_METHOD: &str = "ws";

const OPTIONS_METHOD: &str = "options";

#[derive(Debug)]
pub struct PathResolver {
    tree: Arc<HandlerTree>,
    mapping: Option<FastMappingTable>,
}

impl PathResolver {
    pub fn new(tree: HandlerTree, static_mapping: bool) -> Self {
        let mapping = static_mapping.then(|| FastMappingTable::build(&tree));
        Self {
            tree: Arc::new(tree),
            mapping,
        }
    }

    pub fn tree(&self) -> &HandlerTree {
        &self.tree
    }

    pub fn mapping(&self) -> Option<&FastMappingTable> {
        self.mapping.as_ref()
    }

    /// Resolve a request to its handler. The handler's argument signature is
    /// bound before it is returned.
    pub fn resolve(&self, path: &str, method: &str) -> Option<Arc<Handler>> {
        let path = naming::normalize_path(path);
        let method = method.to_ascii_lowercase();

        let found = match &self.mapping {
            Some(table) => {
                let hit = table.get(&method, &path).cloned();
                if hit.is_some() {
                    tracing::debug!(path = %path, method = %method, "[FAST-MAPPING]");
                }
                hit
            }
            None => {
                let hit = walk(self.tree.root(), &method, &path).cloned();
                if let Some(handler) = &hit {
                    tracing::debug!(path = %path, method = %method, handler = handler.name(), "[MAPPING]");
                }
                hit
            }
        };

        let entry = match found {
            Some(handler) => Some(handler),
            None if method == OPTIONS_METHOD => {
                tracing::debug!(path = %path, "[CAPTURED CORS]");
                self.tree.cors().cloned()
            }
            None => {
                tracing::warn!(path = %path, method = %method, "[MISMATCHED]");
                None
            }
        };

        if let Some(handler) = &entry {
            signature::bind(handler);
        }
        entry
    }
}

/// Tree walk: descend through groups named by the leading segments, then
/// match `method + remaining segments` against the leaves of that group.
fn walk<'a>(root: &'a Group, method: &str, path: &str) -> Option<&'a Arc<Handler>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut chain = vec![root];
    for segment in &segments {
        match chain.last().and_then(|g| g.group(segment)) {
            Some(next) => chain.push(next),
            None => break,
        }
    }

    for (depth, group) in chain.iter().enumerate().rev() {
        let remainder: String = segments[depth..].iter().map(|s| naming::compact(s)).collect();
        if let Some(handler) = group.leaf(&format!("{method}{remainder}")) {
            return Some(handler);
        }
    }
    None
}
