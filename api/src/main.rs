use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod extract;
mod generate;
mod inference;
mod materials;
mod middleware;
mod ownership;
mod routes;
mod state;
mod validate;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Kapsa API",
        version = "0.1.0",
        description = "Backend for the Kapsa study companion: AI chat, flashcard and quiz \
                       generation, capture ingestion, and account management."
    ),
    paths(
        routes::health::health_check,
        routes::assistant::run_assistant,
        routes::chat::send_chat_message,
        routes::flashcards::generate_flashcards,
        routes::quiz::handle_quiz,
        routes::capture::process_capture,
        routes::account::delete_own_account,
    ),
    components(schemas(
        HealthResponse,
        kapsa_core::error::ApiError,
        routes::assistant::AssistantRequest,
        routes::assistant::AssistantMode,
        routes::assistant::InsightResponse,
        routes::assistant::AssistantReply,
        routes::assistant::CalendarEventRow,
        routes::assistant::CalendarSuggestionsResponse,
        routes::chat::ChatRequest,
        routes::chat::HistoryMessage,
        routes::chat::ChatMessageRow,
        routes::flashcards::GenerateFlashcardsRequest,
        routes::flashcards::DeckRow,
        routes::quiz::QuizRequest,
        routes::quiz::AnswerInput,
        routes::quiz::TestRow,
        routes::quiz::TestQuestionRow,
        routes::quiz::QuizResponse,
        routes::capture::CaptureRequest,
        routes::capture::CaptureKind,
        routes::capture::CourseMaterialRow,
        routes::account::AccountDeletedResponse,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kapsa_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // External collaborators: identity provider and inference API
    let identity = auth::IdentityClient::new(
        std::env::var("SUPABASE_URL").expect("SUPABASE_URL must be set"),
        std::env::var("SUPABASE_ANON_KEY").expect("SUPABASE_ANON_KEY must be set"),
        std::env::var("SUPABASE_SERVICE_ROLE_KEY").expect("SUPABASE_SERVICE_ROLE_KEY must be set"),
    );
    let replicate = inference::ReplicateClient::new(
        std::env::var("REPLICATE_API_KEY").expect("REPLICATE_API_KEY must be set"),
        std::env::var("REPLICATE_BASE_URL").ok(),
    );

    let app_state = state::AppState {
        db: pool,
        identity,
        replicate,
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::assistant::router())
        .merge(routes::chat::router())
        .merge(routes::flashcards::router())
        .merge(routes::quiz::router())
        .merge(routes::capture::router())
        .merge(routes::account::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Kapsa API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
