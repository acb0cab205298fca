// crates/pilotcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pilotcore::{ExecutionEvent, InMemoryStore, Node, NodeKind, Payload, Workflow, WorkflowGraph};
use pilotnodes::NodesConfig;
use pilotruntime::{NodeRegistry, PilotRuntime, RunRequest, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pilot")]
#[command(about = "PromptPilot workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// User the run is attributed to
        #[arg(short, long, default_value = "cli")]
        user: String,

        /// Execution id (generated when omitted)
        #[arg(short, long)]
        execution_id: Option<String>,

        /// Trigger data as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// Print the execution order of a workflow file
    Plan {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node kinds
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            user,
            execution_id,
            input,
            verbose,
        } => {
            let default_level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .init();

            run_workflow(&file, user, execution_id, input).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Plan { file } => {
            print_plan(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("{} is not a workflow document", file.display()))?;
    Ok(workflow)
}

fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    pilotnodes::register_all(&mut registry, &NodesConfig::from_env());
    registry
}

fn parse_trigger_data(input: Option<String>) -> Result<Payload> {
    let Some(input_str) = input else {
        return Ok(Payload::new());
    };
    match serde_json::from_str(&input_str)? {
        serde_json::Value::Object(obj) => Ok(obj),
        _ => Err(anyhow::anyhow!("Input must be a JSON object")),
    }
}

async fn run_workflow(
    file: &Path,
    user: String,
    execution_id: Option<String>,
    input: Option<String>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;
    let trigger_data = parse_trigger_data(input)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!();

    let store = Arc::new(InMemoryStore::new());
    let workflow_id = workflow.id.clone();
    store.put_workflow(workflow).await;

    let runtime = PilotRuntime::new(
        Arc::new(standard_registry()),
        store.clone(),
        RuntimeConfig::from_env(),
    );

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::ExecutionProgress { status, counts, .. } => {
                    println!(
                        "▶️  Execution {} ({}/{} nodes)",
                        status, counts.completed_nodes, counts.total_nodes
                    );
                }
                ExecutionEvent::NodeStarted {
                    node_id, node_kind, ..
                } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, node_kind);
                }
                ExecutionEvent::NodeCompleted {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed [{}]: {}", node_id, error.kind, error.message);
                }
            }
        }
    });

    let response = runtime
        .handle(RunRequest {
            workflow_id,
            execution_id: execution_id.unwrap_or_default(),
            user_id: user,
            trigger_data,
        })
        .await;

    // Give the printer a moment to drain the channel
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", response.execution_id);
    if let Some(record) = store.execution(&response.execution_id).await {
        println!(
            "   Completed: {}/{} nodes ({} failed)",
            record.counts.completed_nodes, record.counts.total_nodes, record.counts.failed_nodes
        );
    }

    if let Some(failure) = &response.error {
        println!();
        println!("💥 Workflow failed [{}]: {}", failure.code, failure.message);
        return Err(anyhow::anyhow!("execution {} failed", response.execution_id));
    }

    if let Some(results) = &response.results {
        println!();
        println!("📤 Results:");
        for (node_id, result) in results {
            println!("   {}: {}", node_id, serde_json::to_string_pretty(result)?);
        }
    }

    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let graph = WorkflowGraph::new(&workflow.nodes, &workflow.edges)
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.kind(), e))?;
    let plan = pilotruntime::plan(graph.nodes(), graph.edges())
        .map_err(|e| anyhow::anyhow!("[plan.cycle_detected] {}", e))?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Edges: {}", workflow.edges.len());
    println!("   Starting nodes: {:?}", graph.starting_nodes());
    println!("   Plan length: {}", plan.len());

    let registry = standard_registry();
    let unsupported: Vec<&Node> = workflow
        .nodes
        .iter()
        .filter(|n| registry.get(&n.kind).is_none())
        .collect();
    for node in unsupported {
        println!("⚠️  Node {} has kind '{}' which no strategy serves", node.id, node.kind);
    }

    Ok(())
}

fn print_plan(file: &Path) -> Result<()> {
    let workflow = load_workflow(file)?;
    let graph = WorkflowGraph::new(&workflow.nodes, &workflow.edges)
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.kind(), e))?;
    let plan = pilotruntime::plan(graph.nodes(), graph.edges())
        .map_err(|e| anyhow::anyhow!("[plan.cycle_detected] {}", e))?;

    println!("🧭 Execution order for {}:", workflow.name);
    for (step, node) in plan.nodes().iter().enumerate() {
        let inputs: Vec<&str> = graph
            .predecessors_of(&node.id)
            .iter()
            .map(|e| e.source.as_str())
            .collect();
        if inputs.is_empty() {
            println!("  {}. {} ({})", step + 1, node.id, node.kind);
        } else {
            println!(
                "  {}. {} ({}) <- {}",
                step + 1,
                node.id,
                node.kind,
                inputs.join(", ")
            );
        }
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Kinds:");
    println!();

    let registry = standard_registry();
    for kind in registry.list_node_kinds() {
        if let Some(info) = registry.info(&kind) {
            println!("  • {} ({})", kind, info.category);
            println!("    {}", info.description);
        } else {
            println!("  • {}", kind);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new("example-summarize", "Summarize and post");
    workflow.description =
        Some("Summarizes the trigger text and posts the summary to a webhook".to_string());

    let trigger = workflow.add_node(
        Node::new("trigger", NodeKind::Trigger)
            .with_label("Start")
            .with_position(100.0, 100.0),
    );
    let summarize = workflow.add_node(
        Node::new("summarize", NodeKind::AiText)
            .with_label("Summarize")
            .with_config("model", "gpt-3.5-turbo")
            .with_position(300.0, 100.0),
    );
    let post = workflow.add_node(
        Node::new("post", NodeKind::Webhook)
            .with_label("Post Summary")
            .with_config("url", "https://httpbin.org/post")
            .with_config("method", "POST")
            .with_position(500.0, 100.0),
    );

    workflow.connect(trigger, summarize.clone());
    workflow.connect(summarize, post);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  pilot run --file {} --input '{{\"text\": \"Some long article...\"}}'",
        output.display()
    );

    Ok(())
}
