use crate::value::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type WorkflowId = String;
pub type NodeId = String;

/// Complete workflow definition: metadata plus the node/edge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(id: impl Into<WorkflowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            owner: None,
            status: WorkflowStatus::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) {
        self.edges.push(Edge::new(source, target));
    }

    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// Kind of a node, which selects its executor strategy.
///
/// `Other` carries a kind string that is not part of the known set so the
/// dispatcher can reject it with a proper error instead of failing to load
/// the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Trigger,
    AiText,
    AiImage,
    Webhook,
    Action,
    Condition,
    Delay,
    Loop,
    Other(String),
}

impl NodeKind {
    pub const KNOWN: [NodeKind; 8] = [
        NodeKind::Trigger,
        NodeKind::AiText,
        NodeKind::AiImage,
        NodeKind::Webhook,
        NodeKind::Action,
        NodeKind::Condition,
        NodeKind::Delay,
        NodeKind::Loop,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::AiText => "ai-text",
            NodeKind::AiImage => "ai-image",
            NodeKind::Webhook => "webhook",
            NodeKind::Action => "action",
            NodeKind::Condition => "condition",
            NodeKind::Delay => "delay",
            NodeKind::Loop => "loop",
            NodeKind::Other(s) => s,
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "trigger" => NodeKind::Trigger,
            "ai-text" => NodeKind::AiText,
            "ai-image" => NodeKind::AiImage,
            "webhook" => NodeKind::Webhook,
            "action" => NodeKind::Action,
            "condition" => NodeKind::Condition,
            "delay" => NodeKind::Delay,
            "loop" => NodeKind::Loop,
            other => NodeKind::Other(other.to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        NodeKind::from(s.as_str())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for NodeKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NodeKind::from(s))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "NodeRepr")]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub config: Payload,
    /// Editor-only; never read by the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            config: Payload::new(),
            position: None,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// Accepted document shapes for a node: the flat form written by this crate
/// and the nested form produced by the visual editor.
#[derive(Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    Editor {
        id: NodeId,
        #[serde(default)]
        position: Option<Position>,
        data: EditorNodeData,
    },
    Flat {
        id: NodeId,
        kind: NodeKind,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        config: Payload,
        #[serde(default)]
        position: Option<Position>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditorNodeData {
    #[serde(default)]
    label: Option<String>,
    block_type: NodeKind,
    #[serde(default)]
    config: Payload,
}

impl From<NodeRepr> for Node {
    fn from(repr: NodeRepr) -> Self {
        match repr {
            NodeRepr::Editor { id, position, data } => Node {
                id,
                kind: data.block_type,
                label: data.label,
                config: data.config,
                position,
            },
            NodeRepr::Flat {
                id,
                kind,
                label,
                config,
                position,
            } => Node {
                id,
                kind,
                label,
                config,
                position,
            },
        }
    }
}

/// Directed dependency from `source`'s output to `target`'s input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}
