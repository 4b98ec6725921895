use crate::agent::Agent;
use crate::config::Config;
use crate::error::ApiError;
use crate::file_system;
use crate::gemini::ContentModel;
use crate::models::{FilesResponse, GenerateRequest, GenerateResponse, PublishRequest, PublishResponse};
use crate::publisher::{DeploymentOutcome, Publisher, PublisherConfig};
use crate::sandbox::{Sandbox, SandboxError};
use crate::session::SessionStore;
use actix_web::{error, get, post, web, HttpResponse};
use log::{debug, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub sandbox: Arc<Sandbox>,
    pub agent: Agent,
    pub sessions: SessionStore,
    pub publisher: Publisher,
}

impl AppState {
    pub fn new(config: &Config, model: Arc<dyn ContentModel>) -> Result<Self, SandboxError> {
        let sandbox = Arc::new(Sandbox::new(&config.storage_root, config.root_name())?);
        Ok(Self {
            agent: Agent::new(
                model,
                Arc::clone(&sandbox),
                config.max_agent_steps,
                config.command_timeout,
            ),
            sessions: SessionStore::new(config.session_ttl),
            publisher: Publisher::new(
                Arc::clone(&sandbox),
                PublisherConfig {
                    cli: config.deploy_cli.clone(),
                    token: config.vercel_token.clone(),
                    install: config.deploy_install,
                    timeout: config.deploy_timeout,
                },
            ),
            sandbox,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(index)
        .service(generate)
        .service(publish)
        .service(list_files);
}

/// Malformed bodies get the same JSON error shape as validation failures.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Rejected request body: {}", err);
        let response = HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": err.to_string() }));
        error::InternalError::from_response(err, response).into()
    })
}

#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("✅ sitegen backend is running.")
}

#[post("/api/generate")]
pub async fn generate(
    state: web::Data<AppState>,
    req: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ApiError> {
    let GenerateRequest { prompt, session_id } = req.into_inner();
    let prompt = match prompt {
        Some(p) if !p.trim().is_empty() => p,
        _ => {
            warn!("Received generate request with no prompt.");
            return Err(ApiError::BadRequest("Prompt is required".to_string()));
        }
    };
    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(SessionStore::new_session_id);
    info!("Received generate request for session {}", session_id);
    let start_time = Instant::now();

    let conversation = state.sessions.checkout(&session_id);
    let mut conversation = conversation.lock().await;
    let events = state.agent.run(&mut conversation, &prompt).await;

    info!(
        "Generate request for session {} processed in {:.2?}.",
        session_id,
        start_time.elapsed()
    );
    Ok(HttpResponse::Ok().json(GenerateResponse {
        success: true,
        session_id,
        data: events,
    }))
}

#[post("/api/publish")]
pub async fn publish(
    state: web::Data<AppState>,
    req: web::Json<PublishRequest>,
) -> Result<HttpResponse, ApiError> {
    let folder_name = match req.folder_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => {
            warn!("Received publish request with no folder name.");
            return Err(ApiError::BadRequest("folderName is required".to_string()));
        }
    };
    info!("Received publish request for folder: {}", folder_name);

    let record = state.publisher.publish(folder_name).await.map_err(|e| {
        warn!("Publish rejected for '{}': {}", folder_name, e);
        ApiError::NotFound(e.to_string())
    })?;

    match record.outcome {
        DeploymentOutcome::Deployed(url) => {
            info!("Published '{}' at {}", record.folder_name, url);
            Ok(HttpResponse::Ok().json(PublishResponse {
                success: true,
                deployed_url: Some(url),
                message: None,
            }))
        }
        DeploymentOutcome::Failed(reason) => {
            warn!("Publishing '{}' failed: {}", record.folder_name, reason);
            Err(ApiError::Internal("Deployment failed".to_string()))
        }
    }
}

#[get("/api/files")]
pub async fn list_files(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let start_time = Instant::now();
    let files = file_system::list_files(state.sandbox.root(), state.sandbox.root_name())
        .await
        .map_err(|e| {
            warn!("Failed to read files under '{}': {}", state.sandbox.root().display(), e);
            ApiError::Internal("Failed to load files".to_string())
        })?;

    debug!("Listed {} files in {:.2?}.", files.len(), start_time.elapsed());
    Ok(HttpResponse::Ok().json(FilesResponse {
        success: true,
        files,
        message: None,
    }))
}
