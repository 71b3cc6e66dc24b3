use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use super::selector::{AttrCondition, Compound, ElementTree, Selector};
use crate::{
    Capabilities, Dispatch, DispatchReport, Document, DomEvent, ElementId, Error, Listener, Result,
};

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn node(&self, element: ElementId) -> Option<&Node> {
        self.nodes.get(element.raw() as usize)
    }

    fn node_mut(&mut self, element: ElementId) -> Result<&mut Node> {
        self.nodes
            .get_mut(element.raw() as usize)
            .ok_or(Error::UnknownElement(element))
    }

    fn collect_dfs(&self, element: ElementId, out: &mut Vec<ElementId>) {
        out.push(element);
        if let Some(node) = self.node(element) {
            for child in &node.children {
                self.collect_dfs(*child, out);
            }
        }
    }

    fn path_to_root(&self, element: ElementId) -> Vec<ElementId> {
        let mut path = vec![element];
        let mut cursor = self.parent(element);
        while let Some(ancestor) = cursor {
            path.push(ancestor);
            cursor = self.parent(ancestor);
        }
        path
    }
}

impl ElementTree for Tree {
    fn parent(&self, element: ElementId) -> Option<ElementId> {
        self.node(element).and_then(|n| n.parent)
    }

    fn previous_sibling(&self, element: ElementId) -> Option<ElementId> {
        let parent = self.node(self.parent(element)?)?;
        let pos = parent.children.iter().position(|c| *c == element)?;
        pos.checked_sub(1).map(|p| parent.children[p])
    }

    fn tag(&self, element: ElementId) -> Option<&str> {
        self.node(element).map(|n| n.tag.as_str())
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<&str> {
        self.node(element)
            .and_then(|n| n.attrs.get(name))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Model {
    Unified,
    Legacy,
}

struct Registration {
    event_type: String,
    listener: Listener,
    model: Model,
}

/// In-memory element tree with browser-like listener and dispatch semantics.
///
/// Stands in for a real DOM in tests and demos. Elements are created with a
/// compact markup string (`tag#id.class[attr=value]`) and may be mutated or
/// detached later; queries always see the live tree.
///
/// ```rust
/// use storyline::{Document, MemoryDocument};
///
/// let doc = MemoryDocument::new();
/// let nav = doc.append(doc.root(), "nav#menu").unwrap();
/// let next = doc.append(nav, "button.next[type=button]").unwrap();
/// assert_eq!(doc.query_selector_all("#menu > .next").unwrap(), vec![next]);
/// ```
pub struct MemoryDocument {
    tree: RefCell<Tree>,
    listeners: RefCell<HashMap<ElementId, Vec<Registration>>>,
    capabilities: Capabilities,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A document with unified listeners and native selector matching.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::modern())
    }

    /// A document that only exposes what `capabilities` advertises.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        let root = Node {
            tag: "html".to_string(),
            attrs: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            tree: RefCell::new(Tree { nodes: vec![root] }),
            listeners: RefCell::new(HashMap::new()),
            capabilities,
        }
    }

    /// The `html` element every attached element descends from.
    pub fn root(&self) -> ElementId {
        ElementId::new(0)
    }

    /// Create an element from `markup` and append it as the last child of `parent`.
    ///
    /// `markup` is a single compound selector restricted to a type, an id,
    /// classes and `[attr=value]` pairs, e.g. `button#next.primary[type=submit]`.
    pub fn append(&self, parent: ElementId, markup: &str) -> Result<ElementId> {
        let compound = Compound::parse(markup)?;
        let Some(tag) = compound.tag else {
            return Err(Error::invalid_selector(markup, "markup needs an element type"));
        };

        let mut attrs = BTreeMap::new();
        if let Some(id) = compound.id {
            attrs.insert("id".to_string(), id);
        }
        if !compound.classes.is_empty() {
            attrs.insert("class".to_string(), compound.classes.join(" "));
        }
        for cond in compound.attrs {
            match cond {
                AttrCondition::Eq { key, value } => {
                    attrs.insert(key, value);
                }
                AttrCondition::Exists { key } => {
                    attrs.insert(key, String::new());
                }
                _ => {
                    return Err(Error::invalid_selector(
                        markup,
                        "markup attributes must be [name] or [name=value]",
                    ));
                }
            }
        }

        let mut tree = self.tree.borrow_mut();
        let element = ElementId::new(tree.nodes.len() as u64);
        tree.node_mut(parent)?.children.push(element);
        tree.nodes.push(Node {
            tag: tag.to_ascii_lowercase(),
            attrs,
            parent: Some(parent),
            children: Vec::new(),
        });
        Ok(element)
    }

    pub fn set_attribute(&self, element: ElementId, name: &str, value: &str) -> Result<()> {
        self.tree
            .borrow_mut()
            .node_mut(element)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.tree
            .borrow()
            .attribute(element, name)
            .map(str::to_string)
    }

    pub fn add_class(&self, element: ElementId, class_name: &str) -> Result<()> {
        let mut tree = self.tree.borrow_mut();
        let node = tree.node_mut(element)?;
        let classes = node.attrs.entry("class".to_string()).or_default();
        if !classes.split_ascii_whitespace().any(|c| c == class_name) {
            if !classes.is_empty() {
                classes.push(' ');
            }
            classes.push_str(class_name);
        }
        Ok(())
    }

    pub fn remove_class(&self, element: ElementId, class_name: &str) -> Result<()> {
        let mut tree = self.tree.borrow_mut();
        let node = tree.node_mut(element)?;
        if let Some(classes) = node.attrs.get_mut("class") {
            *classes = classes
                .split_ascii_whitespace()
                .filter(|c| *c != class_name)
                .collect::<Vec<_>>()
                .join(" ");
        }
        Ok(())
    }

    /// Remove `element` (and its subtree) from the document.
    ///
    /// Detached elements no longer show up in queries, but keep their
    /// listeners and can still be dispatched to.
    pub fn detach(&self, element: ElementId) -> Result<()> {
        if element == self.root() {
            return Err(Error::Unsupported("detaching the document root"));
        }
        let mut tree = self.tree.borrow_mut();
        let Some(parent) = tree.node_mut(element)?.parent.take() else {
            return Ok(());
        };
        tree.node_mut(parent)?.children.retain(|c| *c != element);
        Ok(())
    }

    /// Number of listeners registered on `element`, across both models.
    pub fn listener_count(&self, element: ElementId) -> usize {
        self.listeners
            .borrow()
            .get(&element)
            .map_or(0, |regs| regs.len())
    }

    fn ensure_element(&self, element: ElementId) -> Result<()> {
        match self.tree.borrow().node(element) {
            Some(_) => Ok(()),
            None => Err(Error::UnknownElement(element)),
        }
    }

    fn register(&self, element: ElementId, event_type: &str, listener: Listener, model: Model) {
        let mut listeners = self.listeners.borrow_mut();
        let regs = listeners.entry(element).or_default();
        let duplicate = regs.iter().any(|r| {
            r.model == Model::Unified && r.event_type == event_type && Rc::ptr_eq(&r.listener, &listener)
        });
        // Unified registration ignores exact duplicates, legacy registration doesn't.
        if model == Model::Legacy || !duplicate {
            regs.push(Registration {
                event_type: event_type.to_string(),
                listener,
                model,
            });
        }
    }

    fn unregister(&self, element: ElementId, event_type: &str, listener: &Listener, model: Model) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(regs) = listeners.get_mut(&element) {
            if let Some(pos) = regs.iter().position(|r| {
                r.model == model && r.event_type == event_type && Rc::ptr_eq(&r.listener, listener)
            }) {
                regs.remove(pos);
            }
        }
    }

    fn require(&self, available: bool, what: &'static str) -> Result<()> {
        if available {
            Ok(())
        } else {
            Err(Error::Unsupported(what))
        }
    }
}

fn legacy_event_type(handler: &str) -> Result<&str> {
    handler
        .strip_prefix("on")
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unsupported("legacy handler names without the 'on' prefix"))
}

impl Document for MemoryDocument {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        let mut candidates = Vec::new();
        tree.collect_dfs(self.root(), &mut candidates);

        if let Some(id) = selector.id_only() {
            return Ok(candidates
                .into_iter()
                .filter(|el| tree.attribute(*el, "id") == Some(id))
                .collect());
        }
        Ok(candidates
            .into_iter()
            .filter(|el| selector.matches(&*tree, *el))
            .collect())
    }

    fn matches(&self, element: ElementId, selector: &str) -> Result<bool> {
        self.require(self.capabilities.native_matches, "native selector matching")?;
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        Ok(tree.node(element).is_some() && selector.matches(&*tree, element))
    }

    fn add_event_listener(
        &self,
        element: ElementId,
        event_type: &str,
        listener: Listener,
    ) -> Result<()> {
        self.require(self.capabilities.unified_listeners, "unified event listeners")?;
        self.ensure_element(element)?;
        self.register(element, event_type, listener, Model::Unified);
        Ok(())
    }

    fn remove_event_listener(
        &self,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()> {
        self.require(self.capabilities.unified_listeners, "unified event listeners")?;
        self.unregister(element, event_type, listener, Model::Unified);
        Ok(())
    }

    fn attach_event(&self, element: ElementId, handler: &str, listener: Listener) -> Result<()> {
        let event_type = legacy_event_type(handler)?;
        self.ensure_element(element)?;
        self.register(element, event_type, listener, Model::Legacy);
        Ok(())
    }

    fn detach_event(&self, element: ElementId, handler: &str, listener: &Listener) -> Result<()> {
        let event_type = legacy_event_type(handler)?;
        self.unregister(element, event_type, listener, Model::Legacy);
        Ok(())
    }
}

impl Dispatch for MemoryDocument {
    fn dispatch_event(&self, target: ElementId, event_type: &str) -> Result<DispatchReport> {
        self.ensure_element(target)?;
        let path = self.tree.borrow().path_to_root(target);
        let unified = DomEvent::new(event_type, target);
        let legacy = DomEvent::legacy(event_type, target);
        let mut report = DispatchReport::default();

        for element in path {
            // Snapshot, so listeners may register or remove listeners while running.
            let batch: Vec<(Listener, Model)> = self
                .listeners
                .borrow()
                .get(&element)
                .map(|regs| {
                    regs.iter()
                        .filter(|r| r.event_type == event_type)
                        .map(|r| (r.listener.clone(), r.model))
                        .collect()
                })
                .unwrap_or_default();

            for (listener, model) in batch {
                let event = match model {
                    Model::Unified => unified.at(element),
                    Model::Legacy => legacy.at(element),
                };
                report.invoked += 1;
                if let Err(e) = listener(&event) {
                    tracing::warn!(%element, event_type, error = %e, "listener failed");
                    report.errors.push(e);
                }
            }
        }

        Ok(report)
    }
}
