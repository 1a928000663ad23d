use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use travisbot::{Application, get_configuration};

#[shuttle_runtime::main]
async fn main(#[shuttle_shared_db::Postgres] pool: PgPool) -> shuttle_axum::ShuttleAxum {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    info!("Starting travisbot service...");

    let configuration = get_configuration().expect("Failed to read configuration.");
    let application = Application::build(configuration, pool)
        .await
        .expect("Failed to build application");

    info!("Watching builds, listening for Telegram updates on /webhook");
    Ok(application.router.into())
}
