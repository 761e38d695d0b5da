//! Comunimapp server entry point.

use std::sync::Arc;

use axum::middleware;
use comunimapp_api::{AppState, auth_middleware, router as api_router};
use comunimapp_common::Config;
use comunimapp_core::{
    AiService, CaseUpdateService, EmailService, IdentityService, MediaService, MetricsService,
    NotificationService, PushService, ReportService, SessionService, UserService,
};
use comunimapp_db::repositories::{
    CaseUpdateRepository, FcmTokenRepository, NotificationRepository, ReportRepository,
    UserRepository,
};
use comunimapp_db::store::SharedStore;
use comunimapp_db::{FirestoreStore, GoogleAuth};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comunimapp=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting comunimapp server...");

    let config = Config::load()?;
    let project_id = config.firebase.project_id.clone();

    // Google service-account credentials back Firestore, Firebase Auth and FCM.
    let auth = GoogleAuth::from_file(&config.firebase.credentials_path).await?;
    let store: SharedStore = Arc::new(FirestoreStore::new(auth.clone(), &project_id));
    info!(project_id = %project_id, "Connected to Firestore");

    // Repositories
    let user_repo = UserRepository::new(Arc::clone(&store));
    let report_repo = ReportRepository::new(Arc::clone(&store));
    let case_update_repo = CaseUpdateRepository::new(Arc::clone(&store));
    let notification_repo = NotificationRepository::new(Arc::clone(&store));
    let fcm_token_repo = FcmTokenRepository::new(Arc::clone(&store));

    // Optional side channels
    let email_service = config
        .email
        .clone()
        .map(|settings| Arc::new(EmailService::new(Some(settings))));
    if email_service.is_none() {
        info!("Email delivery disabled (no provider configured)");
    }
    let media_service = config
        .cloudinary
        .clone()
        .map(|cloudinary| Arc::new(MediaService::new(Some(cloudinary))));
    if media_service.is_none() {
        info!("Image uploads disabled (Cloudinary not configured)");
    }
    let ai_service = config.ai.clone().map(|ai| Arc::new(AiService::new(ai)));
    if ai_service.is_none() {
        info!("AI analysis disabled (Gemini not configured)");
    }

    let push_service = Arc::new(PushService::new(
        fcm_token_repo,
        Some(auth.clone()),
        project_id.clone(),
        config.fcm.enabled,
    ));
    if !config.fcm.enabled {
        info!("Push delivery disabled; device token registry stays available");
    }

    // Services
    let session_service = SessionService::new(&config.session);
    let identity_service = Arc::new(IdentityService::new(auth, project_id));
    let notification_service = Arc::new(NotificationService::new(
        notification_repo,
        Some(Arc::clone(&push_service)),
        email_service.clone(),
    ));
    let user_service = UserService::new(
        user_repo.clone(),
        session_service.clone(),
        Some(Arc::clone(&identity_service)),
        email_service,
        config.server.public_url.clone(),
    );
    let report_service = ReportService::new(
        report_repo.clone(),
        user_repo.clone(),
        case_update_repo.clone(),
        Arc::clone(&notification_service),
        media_service.clone(),
    );
    let case_update_service = CaseUpdateService::new(
        case_update_repo,
        report_repo.clone(),
        user_repo.clone(),
        Arc::clone(&notification_service),
        media_service,
    );
    let metrics_service = MetricsService::new(report_repo, ai_service);

    let state = AppState {
        user_service,
        report_service,
        case_update_service,
        notification_service,
        push_service: Some(push_service),
        metrics_service,
        session_service,
        identity_service: Some(identity_service),
        users: user_repo,
    };

    let app = api_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
