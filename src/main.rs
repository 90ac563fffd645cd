//src/main.rs

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rental_lifecycle::{
    config::{AppState, Settings},
    db::TransitionRuleRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; sem ele, info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let rules = TransitionRuleRepository::new(app_state.db_pool.clone()).list_all().await?;
    let automatic = rules.iter().filter(|r| r.is_auto()).count();
    tracing::info!(total = rules.len(), automatic, "Regras de transição carregadas");

    app_state.scheduler.start();

    for job in app_state.scheduler.get_status().jobs {
        tracing::info!(job = %job.job, schedule = %job.schedule, next_run_at = ?job.next_run_at, "Job agendado");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Falha ao escutar o sinal de desligamento")?;

    tracing::info!("Sinal de desligamento recebido");
    app_state.scheduler.stop().await;
    app_state.db_pool.close().await;

    Ok(())
}
