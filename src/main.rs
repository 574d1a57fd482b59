//! BK Assistant - advising chatbot for Ho Chi Minh City University of Technology
//!
//! Routes each user turn to a topic flow through a conversation state
//! machine and answers from a hybrid retrieval + rerank knowledge base.

mod api;
mod classifier;
mod config;
mod db;
mod flows;
mod llm;
mod prompt;
mod retrieval;
mod runtime;
mod state_machine;
mod title_generator;

use api::{create_router, AppState};
use classifier::TopicClassifier;
use config::{AppConfig, ModelAssignments, RetrievalSettings};
use db::Database;
use flows::FlowRunner;
use llm::ModelRegistry;
use retrieval::{
    HttpEmbeddingProvider, HttpReranker, HybridRetrievalEngine, KnowledgeBase, PineconeIndex,
    SparseVectorizerRegistry, UnavailableKnowledgeBase, SPARSE_TOPICS,
};
use runtime::{ConversationRouter, DatabaseStorage, LlmClient, RegistryLlmClient, RouterManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bk_assistant=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm, config.completion_timeout));
    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set GROQ_API_KEY or OPENAI_API_KEY.");
    }

    let models = ModelAssignments::from_env(llm_registry.default_model_id());
    tracing::info!(router = %models.router, generation = %models.generation, "Model assignments");

    let knowledge = knowledge_base(&config.retrieval);
    let flows = FlowRunner::new(knowledge, models.clone()).with_top_k(config.retrieval.top_k);
    let llm: Arc<dyn LlmClient> = Arc::new(RegistryLlmClient::new(llm_registry.clone()));
    let router = ConversationRouter::new(
        DatabaseStorage::new(db.clone()),
        llm,
        TopicClassifier::new(models.router.clone()),
        flows,
    );

    let state = AppState::new(RouterManager::new(router), db, llm_registry);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("BK Assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Hybrid engine when an index is configured, otherwise a knowledge base
/// that reports itself unhealthy so retrieval flows answer with the
/// unavailable reply.
fn knowledge_base(settings: &RetrievalSettings) -> Arc<dyn KnowledgeBase> {
    let Some((host, api_key)) = settings.index() else {
        tracing::warn!("PINECONE_API_KEY or PINECONE_INDEX_HOST not set, retrieval disabled");
        return Arc::new(UnavailableKnowledgeBase);
    };

    let client = reqwest::Client::new();
    let sparse = SparseVectorizerRegistry::load_dir(&settings.sparse_model_dir, &SPARSE_TOPICS);
    tracing::info!(
        dir = %settings.sparse_model_dir.display(),
        topics = sparse.len(),
        "Sparse vectorizers loaded"
    );

    let engine = HybridRetrievalEngine::new(
        Arc::new(HttpEmbeddingProvider::new(
            client.clone(),
            settings.embedding_url.clone(),
            settings.embedding_model.clone(),
            settings.embedding_api_key.clone(),
        )),
        Arc::new(PineconeIndex::new(client.clone(), host, api_key.to_string())),
        Arc::new(HttpReranker::new(client, settings.rerank_url.clone())),
        Arc::new(sparse),
    )
    .with_retrieve_k(settings.retrieve_k)
    .with_timeout(settings.timeout);

    Arc::new(engine)
}
