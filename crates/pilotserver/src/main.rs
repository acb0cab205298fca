use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use pilotcore::{
    InMemoryStore, PersistenceError, ProgressBroadcaster, RunError, TracingBroadcaster, Workflow,
    WorkflowStore,
};
use pilotnodes::NodesConfig;
use pilotruntime::{NodeRegistry, PilotRuntime, RunRequest, RunResponse, RuntimeConfig};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Application state shared across handlers
struct AppState {
    runtime: Arc<PilotRuntime>,
    store: Arc<InMemoryStore>,
}

fn app_state(registry: NodeRegistry, config: RuntimeConfig) -> web::Data<AppState> {
    let store = Arc::new(InMemoryStore::new());
    let runtime = PilotRuntime::with_broadcasters(
        Arc::new(registry),
        store.clone(),
        config,
        vec![Arc::new(TracingBroadcaster) as Arc<dyn ProgressBroadcaster>],
    );

    web::Data::new(AppState {
        runtime: Arc::new(runtime),
        store,
    })
}

/// Response for workflow creation
#[derive(Debug, Serialize)]
struct WorkflowResponse {
    id: String,
    message: String,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn not_found(what: &str, id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: format!("{} {} not found", what, id),
    })
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "promptpilot"
    }))
}

/// List all workflows
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let workflow_list: Vec<_> = data
        .store
        .list_workflows()
        .await
        .iter()
        .map(|w| {
            serde_json::json!({
                "id": w.id,
                "name": w.name,
                "description": w.description,
                "status": w.status,
                "nodes": w.nodes.len(),
                "edges": w.edges.len(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(workflow_list))
}

/// Create or replace a workflow
#[post("/api/workflows")]
async fn create_workflow(
    data: web::Data<AppState>,
    workflow: web::Json<Workflow>,
) -> ActixResult<impl Responder> {
    let workflow = workflow.into_inner();
    let workflow_id = workflow.id.clone();

    if workflow_id.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "workflow id is required".to_string(),
        }));
    }

    info!("Creating workflow: {} ({})", workflow.name, workflow_id);
    data.store.put_workflow(workflow).await;

    Ok(HttpResponse::Created().json(WorkflowResponse {
        id: workflow_id,
        message: "Workflow created successfully".to_string(),
    }))
}

/// Get a specific workflow
#[get("/api/workflows/{id}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();

    match data.store.get(&workflow_id).await {
        Ok(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        Err(PersistenceError::NotFound(_)) => Ok(not_found("Workflow", &workflow_id)),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Delete a workflow
#[actix_web::delete("/api/workflows/{id}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();

    match data.store.remove_workflow(&workflow_id).await {
        Some(_) => {
            info!("Deleted workflow: {}", workflow_id);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Workflow deleted successfully"
            })))
        }
        None => Ok(not_found("Workflow", &workflow_id)),
    }
}

/// Unreadable run requests get the same envelope as a failed run.
fn run_request_json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let rejection = RunError::InvalidRequest(err.to_string());
        warn!("Rejected run request: {}", rejection);
        let response =
            HttpResponse::BadRequest().json(RunResponse::failed(String::new(), &rejection));
        actix_web::error::InternalError::from_response(err, response).into()
    })
}

/// `POST /api/executions`
fn executions_resource() -> actix_web::Resource {
    web::resource("/api/executions")
        .app_data(run_request_json_config())
        .route(web::post().to(create_execution))
}

/// Run a stored workflow and wait for the outcome
async fn create_execution(
    data: web::Data<AppState>,
    req: web::Json<RunRequest>,
) -> ActixResult<HttpResponse> {
    let mut request = req.into_inner();
    if request.execution_id.trim().is_empty() {
        request.execution_id = Uuid::new_v4().to_string();
    }

    info!(
        "Executing workflow {} as {}",
        request.workflow_id, request.execution_id
    );
    if let Err(e) = data
        .store
        .create_execution(&request.execution_id, &request.workflow_id, &request.user_id)
        .await
    {
        warn!("Refusing execution {}: {}", request.execution_id, e);
        let rejection = RunError::InvalidRequest(e.to_string());
        return Ok(HttpResponse::Conflict()
            .json(RunResponse::failed(request.execution_id, &rejection)));
    }

    let response = data.runtime.handle(request).await;
    if response.success {
        Ok(HttpResponse::Ok().json(response))
    } else {
        if let Some(failure) = &response.error {
            error!(
                "Execution {} failed [{}]: {}",
                response.execution_id, failure.code, failure.message
            );
        }
        Ok(HttpResponse::InternalServerError().json(response))
    }
}

/// Get the persisted state of an execution
#[get("/api/executions/{id}")]
async fn get_execution(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let execution_id = path.into_inner();

    match data.store.execution(&execution_id).await {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(not_found("Execution", &execution_id)),
    }
}

/// Get the log entries of an execution
#[get("/api/executions/{id}/logs")]
async fn get_execution_logs(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let execution_id = path.into_inner();

    if data.store.execution(&execution_id).await.is_none() {
        return Ok(not_found("Execution", &execution_id));
    }
    Ok(HttpResponse::Ok().json(data.store.logs_for(&execution_id).await))
}

/// WebSocket endpoint for real-time events
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("WebSocket client lagged, skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// List available node kinds
#[get("/api/nodes")]
async fn list_node_kinds(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let registry = data.runtime.registry();

    let nodes: Vec<_> = registry
        .list_node_kinds()
        .iter()
        .map(|kind| {
            let info = registry.info(kind);
            serde_json::json!({
                "kind": kind,
                "description": info.as_ref().map(|i| i.description.clone()).unwrap_or_default(),
                "category": info.as_ref().map(|i| i.category.clone()).unwrap_or_default(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(nodes))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting PromptPilot Server");

    let mut registry = NodeRegistry::new();
    pilotnodes::register_all(&mut registry, &NodesConfig::from_env());

    let app_state = app_state(registry, RuntimeConfig::from_env());

    info!("✅ Runtime initialized with standard nodes");

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_workflows)
            .service(create_workflow)
            .service(get_workflow)
            .service(delete_workflow)
            .service(executions_resource())
            .service(get_execution)
            .service(get_execution_logs)
            .service(websocket_events)
            .service(list_node_kinds)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
