use clap::Parser;
use policy_training::cli::{TrainArgs, run_train};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = TrainArgs::parse();
    let summary = run_train(&args)?;
    info!(
        run_dir = %summary.run_dir.display(),
        loss = ?summary.loss,
        checkpoint = ?summary.checkpoint,
        "done"
    );
    Ok(())
}
