use crate::{Edge, GraphError, Node, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Validated view over a workflow's nodes and edges.
///
/// Construction checks the structural invariants: at least one node, unique
/// node ids, every edge endpoint known, and at least one node without an
/// incoming edge. Acyclicity is left to the planner.
#[derive(Debug)]
pub struct WorkflowGraph<'a> {
    nodes: &'a [Node],
    edges: &'a [Edge],
    /// Node weight is the position in `nodes`, edge weight the position in `edges`.
    graph: DiGraph<usize, usize>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> WorkflowGraph<'a> {
    pub fn new(nodes: &'a [Node], edges: &'a [Edge]) -> Result<Self, GraphError> {
        if nodes.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for (pos, node) in nodes.iter().enumerate() {
            let idx = graph.add_node(pos);
            if index.insert(node.id.as_str(), idx).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        for (pos, edge) in edges.iter().enumerate() {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| GraphError::DanglingEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    missing: id.to_string(),
                })
            };
            let from = lookup(&edge.source)?;
            let to = lookup(&edge.target)?;
            graph.add_edge(from, to, pos);
        }

        let built = Self {
            nodes,
            edges,
            graph,
            index,
        };

        if built.starting_nodes().is_empty() {
            return Err(GraphError::NoStart);
        }

        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "Workflow graph validated"
        );

        Ok(built)
    }

    pub fn nodes(&self) -> &'a [Node] {
        self.nodes
    }

    pub fn edges(&self) -> &'a [Edge] {
        self.edges
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        let idx = self.index.get(id)?;
        Some(&self.nodes[self.graph[*idx]])
    }

    /// Incoming edges of `node_id`, in edge-list order.
    pub fn predecessors_of(&self, node_id: &str) -> Vec<&'a Edge> {
        let Some(idx) = self.index.get(node_id) else {
            return Vec::new();
        };

        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(*idx, Direction::Incoming)
            .map(|e| *e.weight())
            .collect();
        positions.sort_unstable();

        positions.into_iter().map(|pos| &self.edges[pos]).collect()
    }

    /// Ids of nodes with no incoming edge, in node-list order.
    pub fn starting_nodes(&self) -> Vec<&'a NodeId> {
        self.graph
            .node_indices()
            .filter(|idx| {
                self.graph
                    .neighbors_directed(*idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| &self.nodes[self.graph[idx]].id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    fn node(id: &str) -> Node {
        Node::new(id, NodeKind::Action)
    }

    #[test]
    fn rejects_empty_workflow() {
        assert_eq!(WorkflowGraph::new(&[], &[]).unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn rejects_dangling_edge() {
        let nodes = vec![node("a")];
        let edges = vec![Edge::new("a", "ghost")];
        let err = WorkflowGraph::new(&nodes, &edges).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge {
                from: "a".into(),
                to: "ghost".into(),
                missing: "ghost".into(),
            }
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let nodes = vec![node("a"), node("a")];
        let err = WorkflowGraph::new(&nodes, &[]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("a".into()));
    }

    #[test]
    fn rejects_graph_without_start() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a")];
        assert_eq!(
            WorkflowGraph::new(&nodes, &edges).unwrap_err(),
            GraphError::NoStart
        );
    }

    #[test]
    fn predecessors_keep_edge_list_order() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![Edge::new("b", "c"), Edge::new("a", "c"), Edge::new("a", "b")];
        let graph = WorkflowGraph::new(&nodes, &edges).unwrap();

        let sources: Vec<&str> = graph
            .predecessors_of("c")
            .iter()
            .map(|e| e.source.as_str())
            .collect();
        assert_eq!(sources, vec!["b", "a"]);
        assert!(graph.predecessors_of("a").is_empty());
        assert_eq!(graph.starting_nodes(), vec!["a"]);
    }
}
