//! Tree walks.

use super::Ftree;
use super::element::{Element, NodeId};

/// Depth-first walk in display order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    tree: &'a Ftree,
    stack: Vec<NodeId>,
    open_only: bool,
}

impl<'a> Iter<'a> {
    pub(super) fn new(tree: &'a Ftree, level: &[NodeId], open_only: bool) -> Self {
        Self {
            tree,
            stack: level.iter().rev().copied().collect(),
            open_only,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.stack.pop() {
            let Some(element) = tree.elt(id) else {
                continue;
            };
            if !self.open_only || element.open {
                self.stack.extend(element.children.iter().rev());
            }
            return Some(element);
        }
        None
    }
}

/// Sibling lists from a node's parent level up to the top level.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    tree: &'a Ftree,
    current: Option<NodeId>,
}

impl<'a> Ancestors<'a> {
    pub(super) const fn new(tree: &'a Ftree, parent: Option<NodeId>) -> Self {
        Self {
            tree,
            current: parent,
        }
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = Vec<&'a Element>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let element = tree.elt(self.current?)?;
        self.current = element.parent;
        Some(
            tree.level(element.parent)
                .iter()
                .filter_map(|&id| tree.elt(id))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::super::tests::tree_of;

    fn names<'a>(it: impl Iterator<Item = &'a super::Element>) -> Vec<&'a str> {
        it.map(super::Element::name).collect()
    }

    #[test]
    fn whole_tree_in_display_order() {
        let tree = tree_of(&["b", "INBOX", "a/y", "a/x", "a/x/deep"]);
        assert_eq!(names(tree.iter()), vec!["INBOX", "a", "a/x", "a/x/deep", "a/y", "b"]);
    }

    #[test]
    fn descendants_are_depth_first() {
        let tree = tree_of(&["a/x/deep", "a/y", "a/x/also", "b"]);
        assert_eq!(
            names(tree.descendants("a").unwrap()),
            vec!["a/x", "a/x/also", "a/x/deep", "a/y"]
        );
        assert_eq!(tree.descendants("b").unwrap().count(), 0);
    }

    #[test]
    fn ancestors_yield_sibling_levels() {
        let tree = tree_of(&["INBOX", "a/b/c", "a/b2", "z"]);
        let levels: Vec<Vec<&str>> = tree
            .ancestors("a/b/c")
            .unwrap()
            .map(|level| level.into_iter().map(super::Element::name).collect())
            .collect();
        assert_eq!(levels, vec![vec!["a/b", "a/b2"], vec!["INBOX", "a", "z"]]);
        assert_eq!(tree.ancestors("z").unwrap().count(), 0);
    }

    #[test]
    fn visible_skips_closed_subtrees() {
        let mut tree = tree_of(&["a/x/deep", "b/y"]);
        assert_eq!(names(tree.visible()), vec!["a", "b"]);
        tree.expand("a").unwrap();
        assert_eq!(names(tree.visible()), vec!["a", "a/x", "b"]);
        tree.expand_all();
        assert_eq!(names(tree.visible()), vec!["a", "a/x", "a/x/deep", "b", "b/y"]);
    }
}
