//! The handler tree.
//!
//! # Design Decisions
//! - Nodes are a tagged enum, so resolution is a total match
//! - Keys are stored in compact form (see [`naming::compact`]); the registered
//!   names are kept for the fast-mapping table
//! - Built once, then shared read-only behind an `Arc`
//! - The CORS fallback lives in a reserved slot outside the user namespace

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::registry::handler::Handler;
use crate::routing::naming;

/// Reserved key for the CORS fallback handler.
pub const CORS_KEY: &str = "__cors";

/// A node of the handler tree.
#[derive(Debug, Clone)]
pub enum RouteNode {
    Leaf(Arc<Handler>),
    Group(Group),
}

/// A named group of routes.
#[derive(Debug, Clone, Default)]
pub struct Group {
    name: String,
    children: BTreeMap<String, RouteNode>,
}

impl Group {
    /// Name as registered (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a child by any spelling of its name.
    pub fn child(&self, name: &str) -> Option<&RouteNode> {
        self.children.get(&naming::compact(name))
    }

    /// Look up a nested group.
    pub fn group(&self, name: &str) -> Option<&Group> {
        match self.child(name)? {
            RouteNode::Group(g) => Some(g),
            RouteNode::Leaf(_) => None,
        }
    }

    /// Look up a leaf by its compact key.
    pub fn leaf(&self, key: &str) -> Option<&Arc<Handler>> {
        match self.children.get(key)? {
            RouteNode::Leaf(h) => Some(h),
            RouteNode::Group(_) => None,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &RouteNode)> {
        self.children.iter()
    }
}

/// Immutable, normalized handler tree.
#[derive(Debug, Clone, Default)]
pub struct HandlerTree {
    root: Group,
    cors: Option<Arc<Handler>>,
}

impl HandlerTree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::default()
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// The CORS fallback, if one is installed.
    pub fn cors(&self) -> Option<&Arc<Handler>> {
        self.cors.as_ref()
    }

    pub(crate) fn install_cors(&mut self, handler: Option<Handler>) {
        self.cors = handler.map(Arc::new);
    }

    /// Every leaf with the group names leading to it.
    pub fn leaves(&self) -> Vec<(Vec<&str>, &Arc<Handler>)> {
        let mut out = Vec::new();
        collect_leaves(&self.root, &mut Vec::new(), &mut out);
        out
    }
}

fn collect_leaves<'a>(
    group: &'a Group,
    path: &mut Vec<&'a str>,
    out: &mut Vec<(Vec<&'a str>, &'a Arc<Handler>)>,
) {
    for node in group.children.values() {
        match node {
            RouteNode::Leaf(h) => out.push((path.clone(), h)),
            RouteNode::Group(g) => {
                path.push(g.name.as_str());
                collect_leaves(g, path, out);
                path.pop();
            }
        }
    }
}

enum Entry {
    Leaf(Handler),
    Group(String, TreeBuilder),
}

/// Collects handlers and groups, then validates them into a [`HandlerTree`].
#[derive(Default)]
pub struct TreeBuilder {
    entries: Vec<Entry>,
}

impl TreeBuilder {
    /// Add a handler; its name is its key.
    pub fn route(mut self, handler: Handler) -> Self {
        self.entries.push(Entry::Leaf(handler));
        self
    }

    /// Add a nested group.
    pub fn group(mut self, name: impl Into<String>, group: TreeBuilder) -> Self {
        self.entries.push(Entry::Group(name.into(), group));
        self
    }

    pub fn build(self) -> Result<HandlerTree, RegistryError> {
        Ok(HandlerTree {
            root: self.into_group(String::new())?,
            cors: None,
        })
    }

    fn into_group(self, name: String) -> Result<Group, RegistryError> {
        let mut children = BTreeMap::new();
        for entry in self.entries {
            let (raw, node) = match entry {
                Entry::Leaf(handler) => (handler.name().to_string(), RouteNode::Leaf(Arc::new(handler))),
                Entry::Group(child_name, builder) => {
                    let group = builder.into_group(child_name.clone())?;
                    (child_name, RouteNode::Group(group))
                }
            };
            if raw.eq_ignore_ascii_case(CORS_KEY) {
                return Err(RegistryError::ReservedName(raw));
            }
            let key = naming::compact(&raw);
            if key.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if children.contains_key(&key) {
                return Err(RegistryError::Duplicate {
                    group: name.clone(),
                    key,
                });
            }
            children.insert(key, node);
        }
        Ok(Group { name, children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::handler::Outcome;

    fn noop(name: &str) -> Handler {
        Handler::http(name, &[], |_ctx, _args| async { Outcome::empty() })
    }

    #[test]
    fn test_keys_are_compact() {
        let tree = HandlerTree::builder()
            .route(noop("getHealth"))
            .group("UserAccount", HandlerTree::builder().route(noop("getProfile")))
            .build()
            .unwrap();

        let root = tree.root();
        assert!(root.leaf("gethealth").is_some());
        let group = root.group("user_account").unwrap();
        assert_eq!(group.name(), "UserAccount");
        assert!(group.leaf("getprofile").is_some());
        assert!(root.group("gethealth").is_none());
    }

    #[test]
    fn test_duplicate_spellings_rejected() {
        let err = HandlerTree::builder()
            .route(noop("getProfile"))
            .route(noop("get_profile"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                group: String::new(),
                key: "getprofile".into()
            }
        );
    }

    #[test]
    fn test_reserved_and_empty_names() {
        let err = HandlerTree::builder().route(noop("__cors")).build().unwrap_err();
        assert_eq!(err, RegistryError::ReservedName("__cors".into()));

        let err = HandlerTree::builder()
            .group("__", HandlerTree::builder())
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyName);
    }

    #[test]
    fn test_leaves_carry_group_path() {
        let tree = HandlerTree::builder()
            .route(noop("getHealth"))
            .group(
                "admin",
                HandlerTree::builder().group("users", HandlerTree::builder().route(noop("getList"))),
            )
            .build()
            .unwrap();

        let leaves: Vec<_> = tree
            .leaves()
            .into_iter()
            .map(|(path, h)| (path.join("."), h.name().to_string()))
            .collect();
        assert_eq!(
            leaves,
            vec![
                ("admin.users".to_string(), "getList".to_string()),
                (String::new(), "getHealth".to_string()),
            ]
        );
    }
}
