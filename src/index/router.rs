//! Radix route tree over path segments.
//!
//! Three segment kinds, matched in priority order: static, `:name` params,
//! and a trailing `**` catch-all. Insert and lookup both trim the trailing
//! empty segment, so `/a` and `/a/` name the same route in either direction.
//! The tree is built fresh on every index rebuild and never mutated after.

use std::collections::HashMap;

use crate::{Error, Result};

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, Node>,
    param: Option<(String, Box<Node>)>,
    catch_all: Option<Leaf>,
    leaf: Option<Leaf>,
}

#[derive(Debug, Clone)]
struct Leaf {
    page_id: String,
    url: String,
}

#[derive(Debug, Default)]
pub struct RouteTree {
    root: Node,
}

/// Result of a route lookup: the page plus any captured params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub page_id: String,
    pub params: Vec<(String, String)>,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `url` for `page_id`. A second page on the same URL is a
    /// conflict and fails the whole index build.
    pub fn insert(&mut self, url: &str, page_id: &str) -> Result<()> {
        let leaf = Leaf {
            page_id: page_id.to_string(),
            url: url.to_string(),
        };

        let mut node = &mut self.root;
        for segment in segments(url) {
            if segment == "**" {
                if node.catch_all.is_some() {
                    return Err(Error::Conflict(url.to_string()));
                }
                node.catch_all = Some(leaf);
                return Ok(());
            } else if let Some(rest) = segment.strip_prefix(':') {
                let (name, child) = node
                    .param
                    .get_or_insert_with(|| (rest.to_string(), Box::new(Node::default())));
                if name.as_str() != rest {
                    // Two spellings of the same param slot shadow each
                    // other; conflict rather than silently picking one.
                    return Err(Error::Conflict(url.to_string()));
                }
                node = child.as_mut();
            } else {
                node = node.children.entry(segment.to_string()).or_default();
            }
        }

        if node.leaf.is_some() {
            return Err(Error::Conflict(url.to_string()));
        }
        node.leaf = Some(leaf);
        Ok(())
    }

    pub fn lookup(&self, pathname: &str) -> Option<RouteMatch> {
        let segs: Vec<&str> = segments(pathname).collect();
        let mut params = Vec::new();
        lookup_at(&self.root, &segs, &mut params).map(|leaf| RouteMatch {
            page_id: leaf.page_id.clone(),
            params,
        })
    }

    /// Registered (url, page_id) pairs, unordered.
    pub fn routes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        collect_routes(&self.root, &mut out);
        out
    }
}

fn lookup_at<'t>(
    node: &'t Node,
    segs: &[&str],
    params: &mut Vec<(String, String)>,
) -> Option<&'t Leaf> {
    let Some((head, tail)) = segs.split_first() else {
        return node.leaf.as_ref();
    };

    if let Some(child) = node.children.get(*head) {
        if let Some(leaf) = lookup_at(child, tail, params) {
            return Some(leaf);
        }
    }

    if let Some((name, child)) = &node.param {
        params.push((name.clone(), head.to_string()));
        if let Some(leaf) = lookup_at(child, tail, params) {
            return Some(leaf);
        }
        params.pop();
    }

    // A catch-all at this level swallows every remaining segment.
    node.catch_all.as_ref()
}

fn collect_routes(node: &Node, out: &mut Vec<(String, String)>) {
    for leaf in node.leaf.iter().chain(node.catch_all.iter()) {
        out.push((leaf.url.clone(), leaf.page_id.clone()));
    }
    for child in node.children.values() {
        collect_routes(child, out);
    }
    if let Some((_, child)) = &node.param {
        collect_routes(child, out);
    }
}

/// Split a URL into match segments, ignoring a leading slash and one
/// trailing empty segment.
fn segments(url: &str) -> impl Iterator<Item = &str> {
    url.trim_start_matches('/')
        .trim_end_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::RouteTree;

    #[test]
    fn trailing_slash_is_tolerated_both_ways() {
        let mut tree = RouteTree::new();
        tree.insert("/a", "p1").expect("insert");
        tree.insert("/b/", "p2").expect("insert");

        assert_eq!(tree.lookup("/a").expect("match").page_id, "p1");
        assert_eq!(tree.lookup("/a/").expect("match").page_id, "p1");
        assert_eq!(tree.lookup("/b").expect("match").page_id, "p2");
    }

    #[test]
    fn params_are_captured() {
        let mut tree = RouteTree::new();
        tree.insert("/post/:slug", "p1").expect("insert");

        let found = tree.lookup("/post/hello").expect("match");
        assert_eq!(found.page_id, "p1");
        assert_eq!(found.params, vec![("slug".to_string(), "hello".to_string())]);
    }

    #[test]
    fn static_wins_over_param() {
        let mut tree = RouteTree::new();
        tree.insert("/post/:slug", "dynamic").expect("insert");
        tree.insert("/post/about", "fixed").expect("insert");

        assert_eq!(tree.lookup("/post/about").expect("match").page_id, "fixed");
        assert_eq!(tree.lookup("/post/other").expect("match").page_id, "dynamic");
    }

    #[test]
    fn catch_all_swallows_remainder() {
        let mut tree = RouteTree::new();
        tree.insert("/docs/**", "docs").expect("insert");

        assert_eq!(tree.lookup("/docs/a/b/c").expect("match").page_id, "docs");
        assert!(tree.lookup("/other").is_none());
    }

    #[test]
    fn duplicate_url_conflicts() {
        let mut tree = RouteTree::new();
        tree.insert("/a", "p1").expect("insert");
        assert!(tree.insert("/a/", "p2").is_err());
    }
}
