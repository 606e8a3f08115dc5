pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod router;
pub mod server;
pub mod service;

use std::sync::Arc;

use commands::ai::AnthropicInterpreter;
use commands::kubectl::KubectlExecutor;
use commands::lookup::KubeLookup;
use config::Settings;
use orchestrator::Resolver;
use router::DirectRouter;
use server::AppState;
use service::QueryService;

/// Builds the service the settings ask for. Fails when a required
/// collaborator (translator or cluster client) cannot be constructed.
pub async fn build_service(settings: &Settings) -> Result<QueryService, Box<dyn std::error::Error>> {
    let mode = settings.mode();
    log::info!("startup: mode {mode:?}");

    let resolver = if mode.needs_translator() {
        let interpreter = AnthropicInterpreter::new(
            settings.api_key.clone().unwrap_or_default(),
            settings.api_url.clone(),
            settings.model.clone(),
            settings.max_tokens,
            settings.interpret_timeout(),
        )?;
        let executor = KubectlExecutor::new(settings.kube_context.clone());
        Some(Resolver::new(
            Arc::new(interpreter),
            Arc::new(executor),
            settings.interpret_timeout(),
            settings.execute_timeout(),
        ))
    } else {
        None
    };

    let router = if mode.needs_router() {
        let client = commands::kubeconfig::cluster_client(settings.kube_context.as_deref()).await?;
        Some(DirectRouter::new(
            Arc::new(KubeLookup::new(client)),
            settings.log_tail_lines,
        ))
    } else {
        None
    };

    Ok(QueryService::new(router, resolver))
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();

    let service = build_service(&settings).await?;
    let app = server::create_router(AppState {
        service,
        kube_context: settings.kube_context.clone(),
    });

    log::info!("startup: listening on {}", settings.bind);
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
