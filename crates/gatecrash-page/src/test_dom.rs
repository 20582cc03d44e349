//! In-memory fakes for the page host traits, shared by the crate's tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::dom::{BackgroundPort, ClientState, PageDocument, PageError, PageNode, Result};

// ====== Nodes ======

#[derive(Debug, Default)]
struct NodeData {
    classes: Vec<String>,
    id: String,
    size: (f64, f64),
    text_len: usize,
    inline_hidden: bool,
    hidden: bool,
    detached: bool,
    revealed: bool,
    // A persistent node stays visible and selectable no matter what is
    // done to it, modelling a paywall that a page script re-inserts.
    persistent: bool,
}

/// Builder passed to `FakeDocument::add_node` closures.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    data: NodeData,
}

impl NodeBuilder {
    pub fn class(mut self, class: &str) -> Self {
        self.data.classes.push(class.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.data.id = id.to_string();
        self
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.data.size = (width, height);
        self
    }

    pub fn text_len(mut self, len: usize) -> Self {
        self.data.text_len = len;
        self
    }

    pub fn inline_hidden(mut self) -> Self {
        self.data.inline_hidden = true;
        self
    }
}

/// A clonable handle to a fake element.
#[derive(Debug, Clone)]
pub struct FakeNode {
    data: Rc<RefCell<NodeData>>,
}

impl FakeNode {
    fn from_builder(builder: NodeBuilder) -> Self {
        Self {
            data: Rc::new(RefCell::new(builder.data)),
        }
    }

    pub fn hidden(&self) -> bool {
        self.data.borrow().hidden
    }

    pub fn detached(&self) -> bool {
        self.data.borrow().detached
    }

    pub fn revealed(&self) -> bool {
        self.data.borrow().revealed
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.data.borrow().classes.iter().any(|c| c == class)
    }

    pub fn add_class(&self, class: &str) {
        self.data.borrow_mut().classes.push(class.to_string());
    }
}

impl PageNode for FakeNode {
    fn detach(&self) {
        self.data.borrow_mut().detached = true;
    }

    fn hide(&self) {
        self.data.borrow_mut().hidden = true;
    }

    fn reveal(&self) {
        let mut data = self.data.borrow_mut();
        data.revealed = true;
        data.inline_hidden = false;
        data.hidden = false;
    }

    fn remove_class(&self, class: &str) {
        self.data.borrow_mut().classes.retain(|c| c != class);
    }

    fn size(&self) -> (f64, f64) {
        self.data.borrow().size
    }

    fn text_len(&self) -> usize {
        self.data.borrow().text_len
    }

    fn is_visible(&self) -> bool {
        let data = self.data.borrow();
        data.persistent || (!data.hidden && !data.detached && !data.inline_hidden)
    }

    fn class_attr(&self) -> String {
        self.data.borrow().classes.join(" ")
    }

    fn id_attr(&self) -> String {
        self.data.borrow().id.clone()
    }
}

// ====== Document ======

/// A scripted document: each node is registered with the exact selectors
/// that should return it.
pub struct FakeDocument {
    nodes: RefCell<Vec<(Vec<String>, FakeNode)>>,
    scripts: RefCell<Vec<(FakeNode, String)>>,
    rejected: RefCell<HashSet<String>>,
    root: FakeNode,
    body: FakeNode,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            scripts: RefCell::new(Vec::new()),
            rejected: RefCell::new(HashSet::new()),
            root: FakeNode::from_builder(NodeBuilder::default()),
            body: FakeNode::from_builder(NodeBuilder::default()),
        }
    }

    /// Adds a node returned by the given selectors.
    pub fn add_node<F>(&self, selectors: &[&str], build: F) -> FakeNode
    where
        F: FnOnce(NodeBuilder) -> NodeBuilder,
    {
        let node = FakeNode::from_builder(build(NodeBuilder::default()));
        self.nodes.borrow_mut().push((
            selectors.iter().map(|s| s.to_string()).collect(),
            node.clone(),
        ));
        node
    }

    /// Adds a node that stays visible and selectable even after hide or
    /// detach calls.
    pub fn add_persistent_node<F>(&self, selectors: &[&str], build: F) -> FakeNode
    where
        F: FnOnce(NodeBuilder) -> NodeBuilder,
    {
        let node = self.add_node(selectors, build);
        node.data.borrow_mut().persistent = true;
        node
    }

    /// Adds a script element with the given source URL.
    pub fn add_script(&self, src: &str) -> FakeNode {
        let node = FakeNode::from_builder(NodeBuilder::default());
        self.scripts
            .borrow_mut()
            .push((node.clone(), src.to_string()));
        node
    }

    /// Makes `select` fail for the given selector.
    pub fn reject_selector(&self, selector: &str) {
        self.rejected.borrow_mut().insert(selector.to_string());
    }

    pub fn root_handle(&self) -> FakeNode {
        self.root.clone()
    }

    pub fn body_handle(&self) -> FakeNode {
        self.body.clone()
    }
}

impl PageDocument for FakeDocument {
    type Node = FakeNode;

    fn select(&self, selector: &str) -> Result<Vec<FakeNode>> {
        if self.rejected.borrow().contains(selector) {
            return Err(PageError::InvalidSelector(selector.to_string()));
        }
        Ok(self
            .nodes
            .borrow()
            .iter()
            .filter(|(selectors, node)| {
                selectors.iter().any(|s| s == selector)
                    && (node.data.borrow().persistent || !node.detached())
            })
            .map(|(_, node)| node.clone())
            .collect())
    }

    fn inline_hidden(&self) -> Vec<FakeNode> {
        self.nodes
            .borrow()
            .iter()
            .filter(|(_, node)| node.data.borrow().inline_hidden && !node.detached())
            .map(|(_, node)| node.clone())
            .collect()
    }

    fn scripts(&self) -> Vec<(FakeNode, String)> {
        self.scripts
            .borrow()
            .iter()
            .filter(|(node, _)| !node.detached())
            .map(|(node, src)| (node.clone(), src.clone()))
            .collect()
    }

    fn root(&self) -> FakeNode {
        self.root.clone()
    }

    fn body(&self) -> Option<FakeNode> {
        Some(self.body.clone())
    }
}

// ====== Client persistence ======

/// In-memory origin storage. `broken` makes every call fail.
pub struct FakeClientState {
    values: HashMap<String, String>,
    broken: bool,
}

impl FakeClientState {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            values: HashMap::new(),
            broken: true,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl ClientState for FakeClientState {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.broken {
            return Err(PageError::Storage("simulated failure".to_string()));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.broken {
            return Err(PageError::Storage("simulated failure".to_string()));
        }
        self.values.remove(key);
        Ok(())
    }
}

// ====== Background port ======

/// Scripted background channel.
pub struct FakePort {
    status: Option<bool>,
    custom: Vec<String>,
    sweeps: RefCell<Vec<String>>,
}

impl FakePort {
    pub fn enabled() -> Self {
        Self {
            status: Some(true),
            custom: Vec::new(),
            sweeps: RefCell::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            status: Some(false),
            ..Self::enabled()
        }
    }

    /// A port whose every call fails, modelling a dead background process.
    pub fn broken() -> Self {
        Self {
            status: None,
            ..Self::enabled()
        }
    }

    pub fn with_custom_sites(mut self, sites: &[&str]) -> Self {
        self.custom = sites.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn cookie_sweeps(&self) -> Vec<String> {
        self.sweeps.borrow().clone()
    }
}

impl BackgroundPort for FakePort {
    fn get_status(&self) -> Result<bool> {
        self.status
            .ok_or_else(|| PageError::Channel("port closed".to_string()))
    }

    fn custom_sites(&self) -> Result<Vec<String>> {
        if self.status.is_none() {
            return Err(PageError::Channel("port closed".to_string()));
        }
        Ok(self.custom.clone())
    }

    fn clear_cookies(&self, hostname: &str) -> Result<()> {
        if self.status.is_none() {
            return Err(PageError::Channel("port closed".to_string()));
        }
        self.sweeps.borrow_mut().push(hostname.to_string());
        Ok(())
    }
}
