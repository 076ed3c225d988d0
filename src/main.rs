use clap::Parser;
use one_vs_hundred::{config::Settings, hub, question::QuestionSet, server};
use tokio::net::TcpListener;

/// Loads the questions, starts the session and serves it until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::parse();

    let questions = match QuestionSet::load(&settings.questions) {
        Ok(questions) => questions,
        Err(e) => {
            log::error!("{}: {e}", settings.questions.display());
            return Err(e.into());
        }
    };

    let hub = hub::spawn(questions);

    let listener = TcpListener::bind(settings.listen_address()).await?;
    log::info!("listening on {}", listener.local_addr()?);

    if let Err(e) = server::serve(listener, hub, shutdown_signal()).await {
        log::error!("server stopped: {e}");
        return Err(e.into());
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}
