use crate::{
    Command, CommandHandler, NotificationSink, PgSubscriptionStore, Settings, StatusFetcher,
    SubscriptionStore, TelegramClient, TelegramUpdate, WatchGate, Watcher, init_db, spawn_watcher,
};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct AppState {
    commands: CommandHandler,
    sink: Arc<dyn NotificationSink>,
}

pub struct Application {
    pub port: u16,
    pub router: Router,
    shutdown: CancellationToken,
    watcher: JoinHandle<()>,
}

impl Application {
    pub async fn build(configuration: Settings, pool: PgPool) -> Result<Self, StartupError> {
        init_db(&pool).await?;

        let telegram = TelegramClient::new(
            configuration.telegram.base_url.clone(),
            configuration.telegram.bot_token.clone(),
            configuration.telegram.timeout(),
        )?;

        Self::build_with(
            configuration,
            Arc::new(PgSubscriptionStore::new(pool)),
            Arc::new(telegram),
        )
    }

    /// Wires the router and spawns the watch loop on top of the given
    /// store and sink. Must be called inside a Tokio runtime.
    pub fn build_with(
        configuration: Settings,
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, StartupError> {
        let fetcher = StatusFetcher::new(configuration.watcher.fetch_timeout())?;
        let watcher = Arc::new(Watcher::new(
            store.clone(),
            sink.clone(),
            fetcher,
            WatchGate::default(),
            &configuration.watcher,
        ));

        let shutdown = CancellationToken::new();
        let commands = CommandHandler::new(
            store,
            watcher.clone(),
            configuration.travis.api_base_url.clone(),
        );
        let watcher = spawn_watcher(watcher, shutdown.clone());
        let router = Self::app(AppState { commands, sink });

        Ok(Self {
            port: configuration.application.port,
            router,
            shutdown,
            watcher,
        })
    }

    pub fn app(state: AppState) -> Router {
        Router::new()
            .route("/", get(|| async { "Watching your builds!" }))
            .route("/health", get(health_check))
            .route("/webhook", post(webhook_handler))
            .with_state(state)
    }

    /// Cancels the watch loop and waits until it has stopped.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.watcher.await {
            error!("Watcher task ended abnormally: {}", e);
        }
        info!("Application shut down");
    }
}

async fn health_check() -> &'static str {
    "OK"
}

/// Telegram redelivers any update that is not answered with 200, so an
/// undecodable body is logged and acknowledged like every other update.
async fn webhook_handler(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Dropping undecodable update: {}", e);
            return StatusCode::OK;
        }
    };
    let Some((user_id, text)) = update.text_message() else {
        debug!("Ignoring update {} without text", update.update_id);
        return StatusCode::OK;
    };
    info!("Received message from {}: {}", user_id, text);

    let reply = state.commands.handle(user_id, Command::parse(text)).await;
    if let Err(e) = state.sink.send(user_id, &reply).await {
        error!("Failed to reply to {}: {}", user_id, e);
    }
    StatusCode::OK
}
