use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Directed graph of causal relationships between named variables.
///
/// Nodes are interned on first appearance and addressed by a dense index;
/// each node keeps its direct successors in insertion order. The graph is
/// append-only: there is no removal, and neither duplicate edges, self-loops
/// nor cycles are rejected. Identification reads the raw successor lists, so
/// they are kept exactly as inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GraphDocument", into = "GraphDocument")]
pub struct CausalGraph {
    /// Node names, indexed by node id
    names: Vec<String>,
    /// Name -> node id
    index: HashMap<String, usize>,
    /// successors[id] = direct effects of node `id`, in insertion order
    successors: Vec<Vec<usize>>,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph by inserting `(cause, effect)` pairs in order.
    pub fn from_edges<I, A, B>(edges: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut graph = Self::new();
        for (cause, effect) in edges {
            graph.add_edge(cause.as_ref(), effect.as_ref());
        }
        graph
    }

    /// Append `effect` to the successor list of `cause`.
    pub fn add_edge(&mut self, cause: &str, effect: &str) {
        let from = self.intern(cause);
        let to = self.intern(effect);
        self.successors[from].push(to);
    }

    /// Direct successors of `node`; empty for a node the graph has never seen.
    pub fn edges_from(&self, node: &str) -> Vec<&str> {
        match self.index.get(node) {
            Some(&id) => self.successors[id]
                .iter()
                .map(|&succ| self.names[succ].as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether `effect` appears in the successor list of `cause`.
    pub fn has_edge(&self, cause: &str, effect: &str) -> bool {
        match (self.index.get(cause), self.index.get(effect)) {
            (Some(&from), Some(&to)) => self.successors[from].contains(&to),
            _ => false,
        }
    }

    /// Node names in order of first appearance.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// All edges, grouped by cause in node order, each group in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.successors.iter().enumerate().flat_map(move |(from, succs)| {
            succs
                .iter()
                .map(move |&to| (self.names[from].as_str(), self.names[to].as_str()))
        })
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.successors.push(Vec::new());
        id
    }
}

impl fmt::Display for CausalGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (cause, effect) in self.edges() {
            writeln!(f, "{} -> {}", cause, effect)?;
        }
        Ok(())
    }
}

/// On-disk form of a graph: an ordered edge list.
///
/// ```toml
/// edges = [["T", "X1"], ["X1", "Y"]]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

impl From<GraphDocument> for CausalGraph {
    fn from(doc: GraphDocument) -> Self {
        CausalGraph::from_edges(doc.edges)
    }
}

impl From<CausalGraph> for GraphDocument {
    fn from(graph: CausalGraph) -> Self {
        GraphDocument {
            edges: graph
                .edges()
                .map(|(c, e)| (c.to_string(), e.to_string()))
                .collect(),
        }
    }
}
