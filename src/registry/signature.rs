//! Argument signatures.
//!
//! A handler's signature is the ordered list of parameter names used to bind
//! request data positionally. It is derived from the declared descriptors
//! once and memoized on the handler; every later call returns the same `Arc`.
//!
//! Descriptor grammar, per comma-separated entry:
//! `name`, `name?` (optional marker), `name = default`, `name: Type`, with
//! `/* inline comments */` anywhere. Everything but the name is stripped and
//! empty entries are dropped.

use std::sync::Arc;

use crate::registry::handler::Handler;

/// Ordered parameter names for `handler`, computed on first use.
pub fn bind(handler: &Handler) -> Arc<[String]> {
    handler
        .signature
        .get_or_init(|| derive(handler.declared_params()))
        .clone()
}

/// Normalize declared descriptors into parameter names.
pub fn derive<S: AsRef<str>>(declared: &[S]) -> Arc<[String]> {
    declared
        .iter()
        .flat_map(|entry| {
            strip_comments(entry.as_ref())
                .split(',')
                .filter_map(normalize)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .into()
}

fn normalize(raw: &str) -> Option<String> {
    let name = raw
        .split(['=', ':'])
        .next()
        .unwrap_or_default()
        .replace('?', "");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
