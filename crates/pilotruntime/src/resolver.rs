use pilotcore::{Edge, Payload, ResultStore};
use serde_json::Value;

/// Merge the stored results of `node_id`'s direct predecessors into one
/// input mapping.
///
/// Edges are applied in edge-list order and a later edge overwrites keys set
/// by an earlier one. Predecessors without a result, or whose result is not a
/// JSON object, contribute nothing.
pub fn resolve_inputs(node_id: &str, edges: &[Edge], results: &ResultStore) -> Payload {
    let mut inputs = Payload::new();

    for edge in edges.iter().filter(|e| e.target == node_id) {
        match results.get(&edge.source) {
            Some(Value::Object(fields)) => {
                for (key, value) in fields {
                    inputs.insert(key.clone(), value.clone());
                }
            }
            Some(other) => {
                tracing::debug!(
                    node_id,
                    source = %edge.source,
                    "Skipping non-object result ({})",
                    kind_of(other)
                );
            }
            None => {}
        }
    }

    inputs
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn later_edge_wins_on_collision() {
        let mut results = ResultStore::new();
        results.insert("a", json!({"x": 1, "only_a": true}));
        results.insert("b", json!({"x": 2}));
        let edges = vec![Edge::new("a", "c"), Edge::new("b", "c")];

        let inputs = resolve_inputs("c", &edges, &results);
        assert_eq!(inputs["x"], json!(2));
        assert_eq!(inputs["only_a"], json!(true));
    }

    #[test]
    fn node_without_incoming_edges_gets_empty_inputs() {
        let mut results = ResultStore::new();
        results.insert("a", json!({"x": 1}));
        let edges = vec![Edge::new("a", "b")];
        assert!(resolve_inputs("a", &edges, &results).is_empty());
    }

    #[test]
    fn scalar_results_are_not_merged() {
        let mut results = ResultStore::new();
        results.insert("a", json!("plain text"));
        let edges = vec![Edge::new("a", "b")];
        assert!(resolve_inputs("b", &edges, &results).is_empty());
    }
}
