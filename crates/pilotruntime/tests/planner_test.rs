// crates/pilotruntime/tests/planner_test.rs

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use pilotcore::{Edge, Node, NodeKind};
use pilotruntime::plan;
use std::collections::HashMap;

/// Small deterministic generator so failures are reproducible from the seed.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Random graph of `size` nodes in a shuffled declaration order. With
/// `acyclic` every edge points from a lower to a higher rank.
fn random_graph(rng: &mut Lcg, size: usize, acyclic: bool) -> (Vec<Node>, Vec<Edge>) {
    let mut ids: Vec<String> = (0..size).map(|i| format!("n{}", i)).collect();
    for i in (1..ids.len()).rev() {
        let j = rng.below(i as u64 + 1) as usize;
        ids.swap(i, j);
    }
    let nodes = ids
        .iter()
        .map(|id| Node::new(id.clone(), NodeKind::Action))
        .collect();

    let mut edges = Vec::new();
    for _ in 0..size * 2 {
        let a = rng.below(size as u64) as usize;
        let b = rng.below(size as u64) as usize;
        if acyclic {
            if a == b {
                continue;
            }
            let (from, to) = if a < b { (a, b) } else { (b, a) };
            edges.push(Edge::new(format!("n{}", from), format!("n{}", to)));
        } else {
            edges.push(Edge::new(format!("n{}", a), format!("n{}", b)));
        }
    }
    (nodes, edges)
}

fn is_cyclic(nodes: &[Node], edges: &[Edge]) -> bool {
    let mut graph = DiGraph::<(), ()>::new();
    let index: HashMap<&str, _> = nodes
        .iter()
        .map(|n| (n.id.as_str(), graph.add_node(())))
        .collect();
    for edge in edges {
        graph.add_edge(index[edge.source.as_str()], index[edge.target.as_str()], ());
    }
    is_cyclic_directed(&graph)
}

#[test]
fn test_plan_respects_every_edge() {
    let mut rng = Lcg(0x5eed);
    for round in 0..200 {
        let size = 1 + round % 12;
        let (nodes, edges) = random_graph(&mut rng, size, true);

        let order = plan(&nodes, &edges)
            .unwrap_or_else(|e| panic!("round {}: acyclic graph rejected: {}", round, e))
            .ids();
        assert_eq!(order.len(), nodes.len(), "round {}: every node exactly once", round);

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        assert_eq!(position.len(), nodes.len(), "round {}: no duplicates", round);
        for edge in &edges {
            assert!(
                position[edge.source.as_str()] < position[edge.target.as_str()],
                "round {}: {} must precede {}",
                round,
                edge.source,
                edge.target
            );
        }
    }
}

#[test]
fn test_plan_is_deterministic() {
    let mut rng = Lcg(42);
    for _ in 0..50 {
        let (nodes, edges) = random_graph(&mut rng, 10, true);
        let first = plan(&nodes, &edges).unwrap().ids();
        let second = plan(&nodes, &edges).unwrap().ids();
        assert_eq!(first, second);
    }
}

#[test]
fn test_plan_fails_exactly_on_cycles() {
    let mut rng = Lcg(7);
    let mut saw_cycle = false;
    for round in 0..200 {
        let (nodes, edges) = random_graph(&mut rng, 2 + round % 6, false);
        let cyclic = is_cyclic(&nodes, &edges);
        saw_cycle |= cyclic;
        assert_eq!(
            plan(&nodes, &edges).is_err(),
            cyclic,
            "round {}: planner disagrees with petgraph on {:?}",
            round,
            edges.iter().map(|e| (&e.source, &e.target)).collect::<Vec<_>>()
        );
    }
    assert!(saw_cycle, "generator should produce some cycles");
}
