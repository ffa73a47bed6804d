//! Folder tree.
//!
//! [`Ftree`] mirrors the server's mailbox hierarchy: what exists, what is
//! subscribed, and the client-side state (expanded, polled) of each node.
//! Changes go through a [`MailboxBackend`] and touch the tree only after the
//! server accepted them; a rejected command leaves the tree as it was.
//!
//! Hierarchy comes from the delimiter LIST reports. Levels the server never
//! listed are added as containers and removed again once they have no
//! children left. Namespace roots are kept.
//!
//! INBOX and the mailboxes marked `\Drafts`, `\Sent`, `\Trash` or `\Junk`
//! are pinned, as is anything passed to [`Ftree::pin`]. Pinned mailboxes
//! cannot be deleted, renamed, or moved along with a renamed ancestor.

mod backend;
mod element;
mod iter;
mod sort;

use std::collections::{HashMap, HashSet};

pub use backend::MailboxBackend;
pub use element::{Element, SpecialUse};
pub use iter::{Ancestors, Iter};

use element::{NodeId, parent_of};

use crate::types::{ListResponse, MailboxAttribute, Namespace, NamespaceKind, Namespaces};
use crate::{Error, Result};

/// The mailbox hierarchy of one account.
#[derive(Debug, Clone, Default)]
pub struct Ftree {
    nodes: Vec<Option<Element>>,
    free: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    roots: Vec<NodeId>,
    namespaces: Namespaces,
    populated: HashSet<String>,
    pins: HashSet<String>,
}

impl Ftree {
    /// Creates an empty tree with no namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements, containers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true before anything was listed or created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns true if the tree has the mailbox. INBOX matches in any case.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(normalize(name))
    }

    /// Looks up an element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the tree has no such mailbox.
    pub fn node(&self, name: &str) -> Result<&Element> {
        let id = self.id_of(name)?;
        self.elt(id).ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Parent element; `None` at the top level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn parent(&self, name: &str) -> Result<Option<&Element>> {
        Ok(self.node(name)?.parent.and_then(|id| self.elt(id)))
    }

    /// Direct children in display order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn children(&self, name: &str) -> Result<Vec<&Element>> {
        let node = self.node(name)?;
        Ok(node.children.iter().filter_map(|&id| self.elt(id)).collect())
    }

    /// Top-level elements in display order.
    #[must_use]
    pub fn roots(&self) -> Vec<&Element> {
        self.roots.iter().filter_map(|&id| self.elt(id)).collect()
    }

    /// For each level from the node's parent up to the top, the siblings at
    /// that level. Subtrees are not entered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn ancestors(&self, name: &str) -> Result<Ancestors<'_>> {
        Ok(Ancestors::new(self, self.node(name)?.parent))
    }

    /// Everything below the node, depth first, each level sorted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn descendants(&self, name: &str) -> Result<Iter<'_>> {
        Ok(Iter::new(self, &self.node(name)?.children, false))
    }

    /// The whole tree in display order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self, &self.roots, false)
    }

    /// The elements a user would see: children of collapsed elements are
    /// skipped.
    #[must_use]
    pub fn visible(&self) -> Iter<'_> {
        Iter::new(self, &self.roots, true)
    }

    /// Namespaces the tree was populated with.
    #[must_use]
    pub const fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Uses namespaces obtained elsewhere. Elements already in the tree keep
    /// their namespace kind.
    pub fn set_namespaces(&mut self, namespaces: Namespaces) {
        self.namespaces = namespaces;
    }

    /// Fetches the server's namespaces. Without NAMESPACE support a single
    /// personal namespace with an empty prefix is assumed, using the
    /// delimiter from `LIST "" ""`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn load_namespaces<B: MailboxBackend>(&mut self, backend: &mut B) -> Result<&Namespaces> {
        let namespaces = match backend.namespace().await {
            Ok(namespaces) => namespaces,
            Err(Error::Unsupported(_)) => {
                let delimiter = backend.list("", "").await?.first().and_then(|e| e.delimiter);
                tracing::debug!(?delimiter, "no NAMESPACE support, assuming one personal namespace");
                Namespaces {
                    personal: vec![Namespace {
                        prefix: String::new(),
                        delimiter,
                    }],
                    ..Namespaces::default()
                }
            }
            Err(err) => return Err(err),
        };
        self.namespaces = namespaces;
        Ok(&self.namespaces)
    }

    /// Lists one namespace and its subscriptions into the tree.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the tree keeps what it had.
    pub async fn populate<B: MailboxBackend>(&mut self, backend: &mut B, namespace: &Namespace) -> Result<()> {
        let pattern = format!("{}*", namespace.prefix);
        let listed = backend.list("", &pattern).await?;
        let subscriptions = backend.lsub("", &pattern).await?;

        for entry in &listed {
            self.insert(entry);
        }
        if self.is_personal(namespace) {
            let id = self.add("INBOX", namespace.delimiter);
            if let Some(inbox) = self.elt_mut(id) {
                inbox.container = false;
            }
        }

        let mut subscribed = 0;
        for entry in subscriptions.iter().filter(|e| !e.is_noselect()) {
            match self.index.get(entry.mailbox.as_str()).copied() {
                Some(id) => {
                    if let Some(element) = self.elt_mut(id) {
                        element.subscribed = true;
                        subscribed += 1;
                    }
                }
                None => tracing::debug!(mailbox = %entry.mailbox, "subscribed mailbox does not exist"),
            }
        }

        self.populated.insert(namespace.prefix.clone());
        tracing::debug!(
            prefix = %namespace.prefix,
            listed = listed.len(),
            subscribed,
            "namespace populated"
        );
        Ok(())
    }

    /// Populates a namespace unless that already happened.
    ///
    /// # Errors
    ///
    /// Same as [`Self::populate`].
    pub async fn ensure_populated<B: MailboxBackend>(
        &mut self,
        backend: &mut B,
        namespace: &Namespace,
    ) -> Result<()> {
        if self.populated.contains(&namespace.prefix) {
            return Ok(());
        }
        self.populate(backend, namespace).await
    }

    /// Loads the namespaces if needed and populates each of them.
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    pub async fn populate_all<B: MailboxBackend>(&mut self, backend: &mut B) -> Result<()> {
        if self.namespaces == Namespaces::default() {
            self.load_namespaces(backend).await?;
        }
        let all: Vec<Namespace> = self
            .namespaces
            .personal
            .iter()
            .chain(&self.namespaces.other_users)
            .chain(&self.namespaces.shared)
            .cloned()
            .collect();
        for namespace in &all {
            self.ensure_populated(backend, namespace).await?;
        }
        Ok(())
    }

    /// Adds or updates an element from a LIST entry.
    ///
    /// An existing element is never turned into a container by a
    /// `\Noselect` entry.
    pub fn insert(&mut self, entry: &ListResponse) {
        let name = entry.mailbox.as_str();
        if name.is_empty() {
            return;
        }
        let container = entry.is_noselect();
        if container && self.index.contains_key(name) {
            return;
        }

        let id = self.add(name, entry.delimiter);
        if let Some(element) = self.elt_mut(id) {
            element.container = container;
            element.no_inferiors = entry.has(&MailboxAttribute::NoInferiors);
            if let Some(role) = entry.special_use().and_then(SpecialUse::from_attribute) {
                element.set_special_use(role);
            }
        }
    }

    /// Creates a mailbox.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the tree is unchanged then.
    pub async fn create<B: MailboxBackend>(&mut self, backend: &mut B, name: &str) -> Result<()> {
        let name = normalize(name);
        backend.create(name).await?;
        let id = self.add(name, self.delimiter_for(name));
        if let Some(element) = self.elt_mut(id) {
            element.container = false;
        }
        tracing::debug!(mailbox = name, "created");
        Ok(())
    }

    /// Deletes a mailbox. One that still has children stays in the tree as
    /// a container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpecialMailbox`] for a pinned mailbox without
    /// contacting the server, [`Error::NotFound`], or the backend's error.
    pub async fn delete<B: MailboxBackend>(&mut self, backend: &mut B, name: &str) -> Result<()> {
        let id = self.id_of(name)?;
        let name = self.guard(id, "deleted")?;
        backend.delete(&name).await?;

        let Some(element) = self.elt_mut(id) else {
            return Ok(());
        };
        if element.has_children() {
            element.container = true;
            element.polled = false;
            tracing::debug!(mailbox = %name, "deleted, kept as container");
        } else {
            let parent = self.detach(id);
            self.prune(parent);
            tracing::debug!(mailbox = %name, "deleted");
        }
        Ok(())
    }

    /// Renames a mailbox and everything below it. Subscription, polled and
    /// expanded state move with each element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpecialMailbox`] if the mailbox or any descendant
    /// is pinned, [`Error::NotFound`], or the backend's error.
    pub async fn rename<B: MailboxBackend>(&mut self, backend: &mut B, from: &str, to: &str) -> Result<()> {
        let id = self.id_of(from)?;
        let subtree = self.subtree(id);
        let old = self.guard(id, "renamed")?;
        for &node in &subtree[1..] {
            self.guard(node, "moved")?;
        }
        let new = normalize(to).to_string();

        backend.rename(&old, &new).await?;

        let moved: Vec<(String, Element)> = subtree
            .iter()
            .filter_map(|&node| self.elt(node))
            .map(|e| {
                let suffix = e.name.strip_prefix(old.as_str()).unwrap_or_default();
                (format!("{new}{suffix}"), e.clone())
            })
            .collect();

        let parent = self.elt(id).and_then(|e| e.parent);
        let expanded: Vec<String> = self
            .ancestor_ids(parent)
            .filter_map(|node| self.elt(node))
            .filter(|e| e.open)
            .map(|e| e.name.clone())
            .collect();
        for &node in subtree.iter().rev() {
            self.detach(node);
        }
        self.prune(parent);

        for (name, before) in moved {
            let id = self.add(&name, before.delimiter);
            if let Some(element) = self.elt_mut(id) {
                element.subscribed = before.subscribed;
                element.polled = before.polled;
                element.open = before.open;
                element.container = before.container;
                element.no_inferiors = before.no_inferiors;
                if let Some(role) = before.special_use {
                    element.set_special_use(role);
                }
            }
        }
        for name in &expanded {
            if let Some(id) = self.index.get(name).copied()
                && let Some(element) = self.elt_mut(id)
            {
                element.open = element.has_children();
            }
        }
        tracing::debug!(from = %old, to = %new, moved = subtree.len(), "renamed");
        Ok(())
    }

    /// Subscribes to a mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or the backend's error.
    pub async fn subscribe<B: MailboxBackend>(&mut self, backend: &mut B, name: &str) -> Result<()> {
        let id = self.id_of(name)?;
        let name = self.name_of(id);
        backend.subscribe(&name).await?;
        if let Some(element) = self.elt_mut(id) {
            element.subscribed = true;
        }
        Ok(())
    }

    /// Unsubscribes from a mailbox. The element stays in the tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpecialMailbox`] for INBOX, [`Error::NotFound`], or
    /// the backend's error.
    pub async fn unsubscribe<B: MailboxBackend>(&mut self, backend: &mut B, name: &str) -> Result<()> {
        let id = self.id_of(name)?;
        if self.elt(id).is_some_and(Element::is_inbox) {
            return Err(Error::SpecialMailbox("INBOX cannot be unsubscribed".into()));
        }
        let name = self.name_of(id);
        backend.unsubscribe(&name).await?;
        if let Some(element) = self.elt_mut(id) {
            element.subscribed = false;
        }
        Ok(())
    }

    /// Expands an element that has children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn expand(&mut self, name: &str) -> Result<()> {
        let id = self.id_of(name)?;
        if let Some(element) = self.elt_mut(id)
            && element.has_children()
        {
            element.open = true;
        }
        Ok(())
    }

    /// Collapses an element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn collapse(&mut self, name: &str) -> Result<()> {
        let id = self.id_of(name)?;
        if let Some(element) = self.elt_mut(id) {
            element.open = false;
        }
        Ok(())
    }

    /// Expands every element that has children.
    pub fn expand_all(&mut self) {
        for element in self.nodes.iter_mut().flatten() {
            element.open = element.has_children();
        }
    }

    /// Collapses every element.
    pub fn collapse_all(&mut self) {
        for element in self.nodes.iter_mut().flatten() {
            element.open = false;
        }
    }

    /// Marks a mailbox for new-mail polling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], or [`Error::InvalidState`] when polling
    /// a container.
    pub fn set_polled(&mut self, name: &str, polled: bool) -> Result<()> {
        let id = self.id_of(name)?;
        let Some(element) = self.elt_mut(id) else {
            return Err(Error::NotFound(name.to_string()));
        };
        if polled && element.container {
            return Err(Error::InvalidState(format!("{} cannot be polled", element.name)));
        }
        element.polled = polled;
        Ok(())
    }

    /// Polled mailboxes in display order.
    #[must_use]
    pub fn polled(&self) -> Vec<&Element> {
        self.iter().filter(|e| e.polled).collect()
    }

    /// Pins a mailbox, now or whenever it appears.
    pub fn pin(&mut self, name: &str) {
        let name = normalize(name);
        if let Some(id) = self.index.get(name).copied()
            && let Some(element) = self.elt_mut(id)
        {
            element.pinned = true;
        }
        self.pins.insert(name.to_string());
    }

    /// Forgets all mailboxes and namespaces, as on logout. Pins stay.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.roots.clear();
        self.namespaces = Namespaces::default();
        self.populated.clear();
    }

    fn elt(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    fn elt_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(id).and_then(Option::as_mut)
    }

    fn id_of(&self, name: &str) -> Result<NodeId> {
        self.index
            .get(normalize(name))
            .copied()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn name_of(&self, id: NodeId) -> String {
        self.elt(id).map(|e| e.name.clone()).unwrap_or_default()
    }

    /// Rejects changes to pinned elements; returns the element's name.
    fn guard(&self, id: NodeId, action: &str) -> Result<String> {
        match self.elt(id) {
            Some(element) if element.pinned => {
                Err(Error::SpecialMailbox(format!("{} cannot be {action}", element.name)))
            }
            Some(element) => Ok(element.name.clone()),
            None => Err(Error::NotFound(format!("node {id}"))),
        }
    }

    fn level(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            None => &self.roots,
            Some(id) => self.elt(id).map_or(&[], |e| e.children.as_slice()),
        }
    }

    fn level_mut(&mut self, parent: Option<NodeId>) -> Option<&mut Vec<NodeId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(id) => self.elt_mut(id).map(|e| &mut e.children),
        }
    }

    /// Returns the element for `name`, creating it and any missing
    /// ancestors (as containers, except INBOX).
    fn add(&mut self, name: &str, delimiter: Option<char>) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }

        let parent = match parent_of(name, delimiter).map(normalize) {
            Some(parent) => Some(match self.index.get(parent).copied() {
                Some(id) => id,
                None => {
                    let id = self.add(parent, delimiter);
                    if let Some(element) = self.elt_mut(id)
                        && !element.is_inbox()
                    {
                        element.container = true;
                    }
                    id
                }
            }),
            None => None,
        };

        let mut element = Element::new(name, delimiter, self.namespaces.kind_of(name));
        element.parent = parent;
        element.pinned |= self.pins.contains(name);

        let id = if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(element);
            id
        } else {
            self.nodes.push(Some(element));
            self.nodes.len() - 1
        };
        self.index.insert(name.to_string(), id);
        if let Some(level) = self.level_mut(parent) {
            level.push(id);
        }
        self.sort_level(parent);
        id
    }

    fn sort_level(&mut self, parent: Option<NodeId>) {
        let mut level = self.level(parent).to_vec();
        level.sort_by(|&a, &b| match (self.elt(a), self.elt(b)) {
            (Some(a), Some(b)) => sort::level_order(a, b),
            _ => std::cmp::Ordering::Equal,
        });
        if let Some(slot) = self.level_mut(parent) {
            *slot = level;
        }
    }

    /// Removes one element; its children must be gone already. Returns the
    /// parent.
    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let element = self.nodes.get_mut(id).and_then(Option::take)?;
        self.index.remove(&element.name);
        self.free.push(id);
        if let Some(level) = self.level_mut(element.parent) {
            level.retain(|&child| child != id);
        }
        element.parent
    }

    /// Walks up from `parent`, removing containers left without children.
    fn prune(&mut self, mut parent: Option<NodeId>) {
        while let Some(id) = parent {
            let Some(element) = self.elt(id) else {
                return;
            };
            if element.has_children() {
                return;
            }
            if element.container && !element.pinned && !self.is_namespace_root(&element.name) {
                parent = self.detach(id);
            } else {
                if let Some(element) = self.elt_mut(id) {
                    element.open = false;
                }
                return;
            }
        }
    }

    /// `id` and the ids above it, nearest first.
    fn ancestor_ids(&self, id: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(id, |&node| self.elt(node).and_then(|e| e.parent))
    }

    /// Ids of the element and everything below it, parents first.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(element) = self.elt(next) {
                stack.extend(element.children.iter().rev());
            }
        }
        out
    }

    fn all_namespaces(&self) -> impl Iterator<Item = (NamespaceKind, &Namespace)> {
        let groups = [
            (NamespaceKind::Personal, &self.namespaces.personal),
            (NamespaceKind::OtherUsers, &self.namespaces.other_users),
            (NamespaceKind::Shared, &self.namespaces.shared),
        ];
        groups
            .into_iter()
            .flat_map(|(kind, list)| list.iter().map(move |ns| (kind, ns)))
    }

    fn is_namespace_root(&self, name: &str) -> bool {
        self.all_namespaces().any(|(_, ns)| {
            let root = match ns.delimiter {
                Some(d) => ns.prefix.strip_suffix(d).unwrap_or(&ns.prefix),
                None => &ns.prefix,
            };
            !root.is_empty() && root == name
        })
    }

    fn is_personal(&self, namespace: &Namespace) -> bool {
        self.namespaces.personal.is_empty() || self.namespaces.personal.contains(namespace)
    }

    /// Delimiter for a new mailbox: from its namespace, else from the
    /// first personal namespace, else from any known element.
    fn delimiter_for(&self, name: &str) -> Option<char> {
        self.all_namespaces()
            .filter(|(_, ns)| !ns.prefix.is_empty() && name.starts_with(&ns.prefix))
            .max_by_key(|(_, ns)| ns.prefix.len())
            .and_then(|(_, ns)| ns.delimiter)
            .or_else(|| self.namespaces.personal_delimiter())
            .or_else(|| self.nodes.iter().flatten().find_map(|e| e.delimiter))
    }
}

impl<'a> IntoIterator for &'a Ftree {
    type Item = &'a Element;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Any spelling of INBOX is INBOX.
fn normalize(name: &str) -> &str {
    if name.eq_ignore_ascii_case("INBOX") {
        "INBOX"
    } else {
        name
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
pub(super) mod tests {
    use super::*;
    use crate::types::{Mailbox, Status};

    pub(crate) fn entry(name: &str, attributes: &[&str]) -> ListResponse {
        entry_with(name, Some('/'), attributes)
    }

    pub(crate) fn entry_with(name: &str, delimiter: Option<char>, attributes: &[&str]) -> ListResponse {
        ListResponse {
            attributes: attributes.iter().map(|a| MailboxAttribute::parse(a)).collect(),
            delimiter,
            mailbox: Mailbox::new(name),
        }
    }

    pub(crate) fn tree_of(names: &[&str]) -> Ftree {
        let mut tree = Ftree::new();
        for name in names {
            tree.insert(&entry(name, &[]));
        }
        tree
    }

    /// In-memory server that records the commands it receives.
    #[derive(Default)]
    struct FakeBackend {
        mailboxes: Vec<ListResponse>,
        subscribed: Vec<String>,
        namespaces: Option<Namespaces>,
        reject: Option<&'static str>,
        calls: Vec<String>,
    }

    impl FakeBackend {
        fn with(names: &[(&str, &[&str])]) -> Self {
            Self {
                mailboxes: names.iter().map(|(n, a)| entry(n, a)).collect(),
                ..Self::default()
            }
        }

        fn command(&mut self, verb: &'static str, args: &str) -> Result<()> {
            self.calls.push(format!("{verb} {args}"));
            if self.reject == Some(verb) {
                return Err(Error::Command {
                    status: Status::No,
                    code: None,
                    text: format!("{verb} refused"),
                });
            }
            Ok(())
        }
    }

    impl MailboxBackend for FakeBackend {
        async fn list(&mut self, _reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
            self.command("LIST", pattern)?;
            if pattern.is_empty() {
                return Ok(vec![entry("", &["\\Noselect"])]);
            }
            let prefix = pattern.trim_end_matches('*');
            Ok(self
                .mailboxes
                .iter()
                .filter(|m| m.mailbox.as_str().starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn lsub(&mut self, _reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
            self.command("LSUB", pattern)?;
            Ok(self.subscribed.iter().map(|n| entry(n, &[])).collect())
        }

        async fn namespace(&mut self) -> Result<Namespaces> {
            self.calls.push("NAMESPACE".into());
            self.namespaces
                .clone()
                .ok_or_else(|| Error::Unsupported("NAMESPACE".into()))
        }

        async fn create(&mut self, mailbox: &str) -> Result<()> {
            self.command("CREATE", mailbox)
        }

        async fn delete(&mut self, mailbox: &str) -> Result<()> {
            self.command("DELETE", mailbox)
        }

        async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
            self.command("RENAME", &format!("{from} {to}"))
        }

        async fn subscribe(&mut self, mailbox: &str) -> Result<()> {
            self.command("SUBSCRIBE", mailbox)
        }

        async fn unsubscribe(&mut self, mailbox: &str) -> Result<()> {
            self.command("UNSUBSCRIBE", mailbox)
        }
    }

    fn personal() -> Namespace {
        Namespace {
            prefix: String::new(),
            delimiter: Some('/'),
        }
    }

    fn names(elements: &[&Element]) -> Vec<String> {
        elements.iter().map(|e| e.name().to_string()).collect()
    }

    async fn populated(backend: &mut FakeBackend) -> Ftree {
        let mut tree = Ftree::new();
        tree.populate(backend, &personal()).await.unwrap();
        backend.calls.clear();
        tree
    }

    fn standard() -> FakeBackend {
        let mut backend = FakeBackend::with(&[
            ("INBOX", &[]),
            ("Drafts", &["\\Drafts"]),
            ("Trash", &["\\Trash"]),
            ("Archive/2023/Q1", &[]),
            ("Work", &["\\HasChildren"]),
            ("Work/Clients", &[]),
            ("Work/Clients/Acme", &[]),
        ]);
        backend.subscribed = vec!["Work".into(), "Work/Clients".into()];
        backend
    }

    #[tokio::test]
    async fn populate_infers_hierarchy() {
        let mut backend = standard();
        let tree = populated(&mut backend).await;

        assert_eq!(tree.len(), 9);
        assert!(tree.node("Archive").unwrap().is_container());
        assert!(tree.node("Archive/2023").unwrap().is_container());
        assert!(!tree.node("Archive/2023/Q1").unwrap().is_container());
        assert_eq!(tree.parent("Archive/2023/Q1").unwrap().unwrap().name(), "Archive/2023");
        assert!(tree.parent("Work").unwrap().is_none());
        assert_eq!(names(&tree.children("Work").unwrap()), vec!["Work/Clients"]);
        assert_eq!(
            names(&tree.roots()),
            vec!["INBOX", "Archive", "Drafts", "Trash", "Work"]
        );
        assert!(tree.node("Work/Clients").unwrap().is_subscribed());
        assert!(!tree.node("Work/Clients/Acme").unwrap().is_subscribed());
        assert!(tree.node("INBOX").unwrap().is_subscribed());
        assert_eq!(tree.node("Drafts").unwrap().special_use(), Some(SpecialUse::Drafts));
    }

    #[tokio::test]
    async fn populate_is_lazy() {
        let mut backend = standard();
        let mut tree = Ftree::new();
        tree.ensure_populated(&mut backend, &personal()).await.unwrap();
        tree.ensure_populated(&mut backend, &personal()).await.unwrap();
        assert_eq!(backend.calls, vec!["LIST *", "LSUB *"]);
    }

    #[tokio::test]
    async fn populate_adds_missing_inbox() {
        let mut backend = FakeBackend::with(&[("INBOX.Sent", &[])]);
        let mut tree = Ftree::new();
        let namespace = Namespace {
            prefix: "INBOX.".into(),
            delimiter: Some('.'),
        };
        tree.set_namespaces(Namespaces {
            personal: vec![namespace.clone()],
            ..Namespaces::default()
        });
        tree.populate(&mut backend, &namespace).await.unwrap();
        assert!(tree.contains("INBOX"));
        assert!(!tree.node("INBOX").unwrap().is_container());
    }

    #[tokio::test]
    async fn inbox_namespace_keeps_inbox_selectable() {
        let mut backend = FakeBackend {
            mailboxes: vec![
                entry_with("INBOX", Some('.'), &["\\HasChildren"]),
                entry_with("INBOX.Sent", Some('.'), &["\\Sent"]),
                entry_with("INBOX.Lists.rust", Some('.'), &[]),
            ],
            ..FakeBackend::default()
        };
        let namespace = Namespace {
            prefix: "INBOX.".into(),
            delimiter: Some('.'),
        };
        let mut tree = Ftree::new();
        tree.set_namespaces(Namespaces {
            personal: vec![namespace.clone()],
            ..Namespaces::default()
        });
        tree.populate(&mut backend, &namespace).await.unwrap();

        let inbox = tree.node("INBOX").unwrap();
        assert!(!inbox.is_container());
        assert_eq!(names(&tree.children("INBOX").unwrap()), vec!["INBOX.Lists", "INBOX.Sent"]);
        assert!(tree.node("INBOX.Lists").unwrap().is_container());
        tree.set_polled("INBOX", true).unwrap();
        assert_eq!(names(&tree.polled()), vec!["INBOX"]);
    }

    #[test]
    fn inbox_created_as_parent_is_not_a_container() {
        let mut tree = Ftree::new();
        tree.insert(&entry_with("INBOX.Drafts", Some('.'), &[]));
        assert!(!tree.node("INBOX").unwrap().is_container());
        assert!(tree.set_polled("inbox", true).is_ok());
    }

    #[tokio::test]
    async fn namespaces_fall_back_without_support() {
        let mut backend = FakeBackend::with(&[("INBOX", &[])]);
        let mut tree = Ftree::new();
        tree.populate_all(&mut backend).await.unwrap();
        assert_eq!(backend.calls, vec!["NAMESPACE", "LIST ", "LIST *", "LSUB *"]);
        assert_eq!(tree.namespaces().personal_delimiter(), Some('/'));
    }

    #[tokio::test]
    async fn namespace_kinds() {
        let mut backend = FakeBackend::with(&[
            ("INBOX", &[]),
            ("Other Users/bob/INBOX", &[]),
            ("Shared/team", &[]),
        ]);
        backend.namespaces = Some(Namespaces {
            personal: vec![personal()],
            other_users: vec![Namespace {
                prefix: "Other Users/".into(),
                delimiter: Some('/'),
            }],
            shared: vec![Namespace {
                prefix: "Shared/".into(),
                delimiter: Some('/'),
            }],
        });
        let mut tree = Ftree::new();
        tree.populate_all(&mut backend).await.unwrap();

        assert_eq!(tree.node("INBOX").unwrap().namespace(), NamespaceKind::Personal);
        assert_eq!(
            tree.node("Other Users/bob/INBOX").unwrap().namespace(),
            NamespaceKind::OtherUsers
        );
        assert_eq!(tree.node("Shared/team").unwrap().namespace(), NamespaceKind::Shared);
        assert!(!tree.node("Other Users/bob/INBOX").unwrap().is_inbox());

        // Namespace roots survive losing their last child.
        tree.delete(&mut backend, "Shared/team").await.unwrap();
        assert!(tree.contains("Shared"));
    }

    #[test]
    fn inbox_is_case_insensitive() {
        let tree = tree_of(&["inbox", "Inbox/Sub"]);
        assert!(tree.contains("InBoX"));
        assert!(tree.node("INBOX").unwrap().is_inbox());
        assert_eq!(names(&tree.children("INBOX").unwrap()), vec!["Inbox/Sub"]);
        assert_eq!(tree.len(), 2);
        assert!(matches!(tree.node("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn noselect_does_not_downgrade() {
        let mut tree = tree_of(&["Lists"]);
        tree.insert(&entry("Lists", &["\\Noselect"]));
        assert!(!tree.node("Lists").unwrap().is_container());
        tree.insert(&entry("Folder", &["\\Noselect", "\\HasChildren"]));
        assert!(tree.node("Folder").unwrap().is_container());
        tree.insert(&entry("Folder", &[]));
        assert!(!tree.node("Folder").unwrap().is_container());
    }

    #[tokio::test]
    async fn pinned_mailboxes_are_guarded_locally() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;

        for name in ["INBOX", "Drafts", "Trash"] {
            assert!(matches!(
                tree.delete(&mut backend, name).await,
                Err(Error::SpecialMailbox(_))
            ));
            assert!(matches!(
                tree.rename(&mut backend, name, "Elsewhere").await,
                Err(Error::SpecialMailbox(_))
            ));
        }
        tree.pin("Work/Clients/Acme");
        assert!(matches!(
            tree.rename(&mut backend, "Work", "Jobs").await,
            Err(Error::SpecialMailbox(_))
        ));
        assert!(backend.calls.is_empty());
        assert!(tree.contains("Work/Clients/Acme"));
    }

    #[tokio::test]
    async fn delete_keeps_parents_as_containers() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;

        tree.delete(&mut backend, "Work/Clients").await.unwrap();
        let clients = tree.node("Work/Clients").unwrap();
        assert!(clients.is_container());
        assert!(tree.contains("Work/Clients/Acme"));

        tree.delete(&mut backend, "Work/Clients/Acme").await.unwrap();
        assert!(!tree.contains("Work/Clients/Acme"));
        assert!(!tree.contains("Work/Clients"));
        assert!(tree.contains("Work"));
        assert!(!tree.node("Work").unwrap().has_children());

        tree.delete(&mut backend, "Archive/2023/Q1").await.unwrap();
        assert!(!tree.contains("Archive"));
        assert_eq!(
            backend.calls,
            vec!["DELETE Work/Clients", "DELETE Work/Clients/Acme", "DELETE Archive/2023/Q1"]
        );
    }

    #[tokio::test]
    async fn rejected_command_leaves_tree_untouched() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;
        backend.reject = Some("DELETE");

        let before: Vec<String> = tree.iter().map(|e| e.name().to_string()).collect();
        let err = tree.delete(&mut backend, "Work/Clients/Acme").await.unwrap_err();
        assert!(err.is_command());
        let after: Vec<String> = tree.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(before, after);

        backend.reject = Some("CREATE");
        assert!(tree.create(&mut backend, "New").await.is_err());
        assert!(!tree.contains("New"));
    }

    #[tokio::test]
    async fn rename_carries_state() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;
        tree.set_polled("Work/Clients/Acme", true).unwrap();
        tree.expand("Work").unwrap();

        tree.rename(&mut backend, "Work", "Jobs/Current").await.unwrap();

        assert!(!tree.contains("Work"));
        assert!(!tree.contains("Work/Clients/Acme"));
        assert!(tree.node("Jobs").unwrap().is_container());
        let jobs = tree.node("Jobs/Current").unwrap();
        assert!(jobs.is_subscribed());
        assert!(jobs.is_open());
        assert!(tree.node("Jobs/Current/Clients").unwrap().is_subscribed());
        assert!(tree.node("Jobs/Current/Clients/Acme").unwrap().is_polled());
        assert_eq!(names(&tree.polled()), vec!["Jobs/Current/Clients/Acme"]);
        assert_eq!(backend.calls, vec!["RENAME Work Jobs/Current"]);
    }

    #[tokio::test]
    async fn rename_keeps_parents_expanded() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;
        tree.expand("Archive").unwrap();
        tree.expand("Archive/2023").unwrap();

        tree.rename(&mut backend, "Archive/2023", "Archive/2024").await.unwrap();
        let archive = tree.node("Archive").unwrap();
        assert!(archive.is_container());
        assert!(archive.is_open());
        assert!(tree.node("Archive/2024").unwrap().is_open());

        tree.expand("Work").unwrap();
        tree.rename(&mut backend, "Work/Clients", "Work/Customers").await.unwrap();
        assert!(tree.node("Work").unwrap().is_open());
        assert!(!tree.node("Work/Customers").unwrap().is_open());
    }

    #[tokio::test]
    async fn subscriptions() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;

        assert!(matches!(
            tree.unsubscribe(&mut backend, "inbox").await,
            Err(Error::SpecialMailbox(_))
        ));
        tree.unsubscribe(&mut backend, "Work").await.unwrap();
        let work = tree.node("Work").unwrap();
        assert!(!work.is_subscribed());
        assert!(work.has_children());

        tree.subscribe(&mut backend, "Archive/2023/Q1").await.unwrap();
        assert!(tree.node("Archive/2023/Q1").unwrap().is_subscribed());
        assert_eq!(backend.calls, vec!["UNSUBSCRIBE Work", "SUBSCRIBE Archive/2023/Q1"]);
    }

    #[tokio::test]
    async fn create_uses_namespace_delimiter() {
        let mut backend = standard();
        let mut tree = populated(&mut backend).await;
        tree.set_namespaces(Namespaces {
            personal: vec![personal()],
            ..Namespaces::default()
        });
        tree.create(&mut backend, "Work/Clients/Globex").await.unwrap();
        assert_eq!(
            names(&tree.children("Work/Clients").unwrap()),
            vec!["Work/Clients/Acme", "Work/Clients/Globex"]
        );
    }

    #[test]
    fn expand_and_collapse() {
        let mut tree = tree_of(&["a/b/c", "d"]);
        tree.expand("d").unwrap();
        assert!(!tree.node("d").unwrap().is_open());
        tree.expand_all();
        assert!(tree.node("a").unwrap().is_open());
        assert!(tree.node("a/b").unwrap().is_open());
        tree.collapse("a").unwrap();
        assert!(!tree.node("a").unwrap().is_open());
        tree.collapse_all();
        assert!(tree.iter().all(|e| !e.is_open()));
        assert!(tree.expand("zzz").is_err());
    }

    #[test]
    fn containers_cannot_be_polled() {
        let mut tree = tree_of(&["a/b"]);
        assert!(matches!(tree.set_polled("a", true), Err(Error::InvalidState(_))));
        tree.set_polled("a/b", true).unwrap();
        tree.set_polled("a/b", false).unwrap();
        assert!(tree.polled().is_empty());
    }

    #[test]
    fn clear_keeps_pins() {
        let mut tree = tree_of(&["Keep", "Other"]);
        tree.pin("Keep");
        tree.clear();
        assert!(tree.is_empty());
        tree.insert(&entry("Keep", &[]));
        assert!(tree.node("Keep").unwrap().is_pinned());
    }
}
