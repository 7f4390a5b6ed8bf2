//! Arena-based mutable DOM.
//!
//! All nodes live in one vector and link to each other by index. Detached
//! nodes stay in the arena; everything that walks the tree starts from the
//! document root, so they are never seen again.

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Cached `id` attribute for selector matching.
        id: Option<String>,
        /// Cached `class` attribute, split on whitespace.
        classes: Vec<String>,
    },
    Text(String),
    Comment(String),
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

impl Attribute {
    /// Build an attribute in the null namespace.
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: QualName::new(None, ns!(), LocalName::from(name)),
            value: value.into(),
        }
    }
}

/// A node in the arena DOM.
#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// A parsed, mutable HTML document.
///
/// This is the value every transform stage receives and returns. It is
/// plain data (no interior mutability), so it can be moved between tasks.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    document: NodeId,
}

impl Document {
    /// Create a new empty document with only a root node.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn root(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a new (detached) element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        let (id, classes) = cached_attrs(&attrs);
        self.alloc(Node::new(NodeData::Element {
            name,
            attrs,
            id,
            classes,
        }))
    }

    /// Create a detached HTML element from a tag name and attribute pairs.
    pub fn new_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute::new(name, *value))
            .collect();
        self.create_element(html_name(tag), attrs)
    }

    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    pub fn create_doctype(&mut self, name: String, public_id: String, system_id: String) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert `new_node` immediately before `sibling`, detaching it first.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        if sibling == new_node {
            return;
        }
        self.detach(new_node);
        let (parent, prev) = match self.get(sibling) {
            Some(n) => (n.parent, n.prev_sibling),
            None => return,
        };

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Insert `new_node` immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, new_node: NodeId) {
        if sibling == new_node {
            return;
        }
        let next = self.next_sibling(sibling);
        if next.is_some() {
            self.insert_before(next, new_node);
        } else {
            let parent = self.parent(sibling);
            if parent.is_some() {
                self.append(parent, new_node);
            }
        }
    }

    /// Unlink a node from its parent and siblings. Its subtree is kept.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = match self.get(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Remove a node (and its subtree) from the document.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Put `replacement` where `old` was and detach `old`.
    pub fn replace_with(&mut self, old: NodeId, replacement: NodeId) {
        if old == replacement {
            return;
        }
        self.insert_before(old, replacement);
        self.detach(old);
    }

    /// Wrap `id` in `wrapper`: the wrapper takes the node's place and the
    /// node becomes its last child.
    pub fn wrap(&mut self, id: NodeId, wrapper: NodeId) {
        self.insert_before(id, wrapper);
        self.append(wrapper, id);
    }

    /// Replace an element by its children.
    pub fn unwrap(&mut self, id: NodeId) {
        for child in self.child_ids(id) {
            self.insert_before(id, child);
        }
        self.detach(id);
    }

    /// Move every child of `from` to the end of `to`.
    pub fn reparent_children(&mut self, from: NodeId, to: NodeId) {
        for child in self.child_ids(from) {
            self.append(to, child);
        }
    }

    pub fn remove_children(&mut self, id: NodeId) {
        for child in self.child_ids(id) {
            self.detach(child);
        }
    }

    /// Append text to an existing trailing text node, or create a new one.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(existing) = &mut last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Replace the children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Text(existing) = &mut node.data
        {
            *existing = text.to_string();
            return;
        }
        self.remove_children(id);
        if !text.is_empty() {
            self.append_text(id, text);
        }
    }

    /// Deep-copy a subtree of this document. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let source = self.clone();
        self.import_node(&source, id)
    }

    /// Deep-copy a subtree of another document into this one. The copy is
    /// detached.
    pub fn import_node(&mut self, other: &Document, id: NodeId) -> NodeId {
        let data = match other.get(id) {
            Some(node) => node.data.clone(),
            None => return NodeId::NONE,
        };
        let copy = self.alloc(Node::new(data));
        for child in other.children(id) {
            let child_copy = self.import_node(other, child);
            self.append(copy, child_copy);
        }
        copy
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// The `<body>` element, or the root if the document has none.
    pub fn body(&self) -> NodeId {
        self.find_by_tag("body").unwrap_or(self.document)
    }

    pub fn parent(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE)
    }

    pub fn prev_sibling(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE)
    }

    pub fn next_sibling(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.next_sibling).unwrap_or(NodeId::NONE)
    }

    pub fn first_child(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.first_child).unwrap_or(NodeId::NONE)
    }

    pub fn last_child(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.last_child).unwrap_or(NodeId::NONE)
    }

    /// Previous sibling that is an element, skipping text and comments.
    pub fn prev_element_sibling(&self, id: NodeId) -> NodeId {
        let mut current = self.prev_sibling(id);
        while current.is_some() && !self.is_element(current) {
            current = self.prev_sibling(current);
        }
        current
    }

    pub fn next_element_sibling(&self, id: NodeId) -> NodeId {
        let mut current = self.next_sibling(id);
        while current.is_some() && !self.is_element(current) {
            current = self.next_sibling(current);
        }
        current
    }

    pub fn last_element_child(&self, id: NodeId) -> NodeId {
        let mut current = self.last_child(id);
        while current.is_some() && !self.is_element(current) {
            current = self.prev_sibling(current);
        }
        current
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        ChildrenIter {
            dom: self,
            current: self.first_child(parent),
        }
    }

    /// Snapshot of the child ids, for loops that mutate the tree.
    pub fn child_ids(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent).collect()
    }

    pub fn element_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.child_ids(id);
        stack.reverse();
        while let Some(current) = stack.pop() {
            out.push(current);
            let mut children = self.child_ids(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.parent(id);
        std::iter::from_fn(move || {
            if current.is_none() {
                return None;
            }
            let found = current;
            current = self.parent(current);
            Some(found)
        })
    }

    /// Nearest element, starting with `id` itself, that satisfies `predicate`.
    pub fn closest<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.is_element(n) && predicate(self, n))
    }

    /// True if `ancestor` contains `id` (strictly).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Whether the node is still reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.document || self.is_ancestor(self.document, id)
    }

    /// Find the first node matching a predicate (DFS from the root).
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let mut stack = vec![self.document];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if predicate(node) {
                    return Some(id);
                }
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        None
    }

    /// Find element by tag name (first match).
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| matches!(&node.data, NodeData::Element { name, .. } if name.local.as_ref() == tag))
    }

    /// Every attached element with the given tag, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.document)
            .into_iter()
            .filter(|&id| self.is_tag(id, tag))
            .collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a Document,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self.dom.next_sibling(id);
        Some(id)
    }
}

/// Convenience methods for element and text nodes.
impl Document {
    /// Get element's local name (tag).
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    /// Tag name as a string slice, for elements.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element_name(id).map(|n| n.as_ref())
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name.local.as_ref() == attr_name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, attr_name: &str) -> bool {
        self.get_attr(id, attr_name).is_some()
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: impl Into<String>) {
        let value = value.into();
        self.edit_attrs(id, |attrs| {
            match attrs.iter_mut().find(|a| a.name.local.as_ref() == attr_name) {
                Some(attr) => attr.value = value,
                None => attrs.push(Attribute::new(attr_name, value)),
            }
        });
    }

    pub fn remove_attr(&mut self, id: NodeId, attr_name: &str) {
        self.edit_attrs(id, |attrs| attrs.retain(|a| a.name.local.as_ref() != attr_name));
    }

    /// Replace the whole attribute list of an element.
    pub fn replace_attrs(&mut self, id: NodeId, new_attrs: Vec<Attribute>) {
        self.edit_attrs(id, |attrs| *attrs = new_attrs);
    }

    /// Keep only the attributes for which `keep` returns true.
    pub fn retain_attrs<F>(&mut self, id: NodeId, keep: F)
    where
        F: FnMut(&Attribute) -> bool,
    {
        self.edit_attrs(id, |attrs| attrs.retain(keep));
    }

    fn edit_attrs<F>(&mut self, id: NodeId, edit: F)
    where
        F: FnOnce(&mut Vec<Attribute>),
    {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element {
                attrs, id, classes, ..
            } = &mut node.data
        {
            edit(attrs);
            (*id, *classes) = cached_attrs(attrs);
        }
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: NodeId) -> &[String] {
        match self.get(id).map(|n| &n.data) {
            Some(NodeData::Element { classes, .. }) => classes,
            _ => &[],
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if !self.is_element(id) || self.has_class(id, class) {
            return;
        }
        let mut classes = self.element_classes(id).to_vec();
        classes.push(class.to_string());
        self.set_attr(id, "class", classes.join(" "));
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Get text content of a text node.
    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of a node and all its descendants.
    pub fn text(&self, id: NodeId) -> String {
        if let Some(text) = self.text_content(id) {
            return text.to_string();
        }
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text_content(node) {
                out.push_str(text);
            }
        }
        out
    }
}

fn cached_attrs(attrs: &[Attribute]) -> (Option<String>, Vec<String>) {
    let mut id = None;
    let mut classes = Vec::new();
    for attr in attrs {
        match attr.name.local.as_ref() {
            "id" => id = Some(attr.value.clone()),
            "class" => {
                classes = attr.value.split_whitespace().map(str::to_string).collect();
            }
            _ => {}
        }
    }
    (id, classes)
}

/// Qualified name for an element in the HTML namespace.
pub fn html_name(tag: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(tag))
}
