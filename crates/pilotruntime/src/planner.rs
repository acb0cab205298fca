//! Topological planning.
//!
//! Depth-first walk over dependencies with three-colour marking. Visiting a
//! node first visits every source of an edge that targets it, so each node is
//! emitted after all of its dependencies. Roots are taken in node-list order
//! and dependencies in edge-list order, which makes the plan deterministic.

use pilotcore::{CycleDetected, Edge, Node};
use std::collections::HashMap;

/// Dependency-first execution order for one graph.
#[derive(Debug, Clone)]
pub struct Plan<'a> {
    order: Vec<&'a Node>,
}

impl<'a> Plan<'a> {
    pub fn nodes(&self) -> &[&'a Node] {
        &self.order
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.order.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Compute the execution order for `nodes`, or report the node at which a
/// cycle closes. Edges touching unknown nodes are ignored here; the graph
/// model rejects them before a run plans.
pub fn plan<'a>(nodes: &'a [Node], edges: &[Edge]) -> Result<Plan<'a>, CycleDetected> {
    let by_id: HashMap<&str, &'a Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut dependencies: HashMap<&str, Vec<&'a Node>> = HashMap::with_capacity(nodes.len());
    for edge in edges {
        let (Some(&source), Some(&target)) = (
            by_id.get(edge.source.as_str()),
            by_id.get(edge.target.as_str()),
        ) else {
            continue;
        };
        dependencies.entry(target.id.as_str()).or_default().push(source);
    }

    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(nodes.len());
    let mut order = Vec::with_capacity(nodes.len());
    // (node, index of the next dependency to visit)
    let mut stack: Vec<(&'a Node, usize)> = Vec::new();

    for root in nodes {
        if marks.contains_key(root.id.as_str()) {
            continue;
        }
        marks.insert(root.id.as_str(), Mark::InProgress);
        stack.push((root, 0));

        while let Some(&(current, next)) = stack.last() {
            let deps = dependencies
                .get(current.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            if let Some(dep) = deps.get(next).copied() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match marks.get(dep.id.as_str()) {
                    Some(Mark::InProgress) => {
                        return Err(CycleDetected {
                            node_id: dep.id.clone(),
                        })
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(dep.id.as_str(), Mark::InProgress);
                        stack.push((dep, 0));
                    }
                }
            } else {
                marks.insert(current.id.as_str(), Mark::Done);
                order.push(current);
                stack.pop();
            }
        }
    }

    tracing::debug!(nodes = order.len(), "Execution plan computed");

    Ok(Plan { order })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilotcore::NodeKind;

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| Node::new(*id, NodeKind::Action)).collect()
    }

    #[test]
    fn dependencies_come_first() {
        let nodes = nodes(&["c", "b", "a"]);
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c")];
        let plan = plan(&nodes, &edges).unwrap();
        assert_eq!(plan.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_visits_shared_dependency_once() {
        let nodes = nodes(&["d", "b", "c", "a"]);
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];
        let plan = plan(&nodes, &edges).unwrap();
        assert_eq!(plan.ids(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let nodes = nodes(&["a"]);
        let edges = vec![Edge::new("a", "a")];
        assert_eq!(plan(&nodes, &edges).unwrap_err().node_id, "a");
    }

    #[test]
    fn two_node_cycle_is_detected() {
        let nodes = nodes(&["a", "b"]);
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a")];
        assert!(plan(&nodes, &edges).is_err());
    }

    #[test]
    fn disconnected_nodes_follow_input_order() {
        let nodes = nodes(&["x", "y", "z"]);
        let plan = plan(&nodes, &[]).unwrap();
        assert_eq!(plan.ids(), vec!["x", "y", "z"]);
    }
}
