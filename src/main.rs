use std::future::Future;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    let outcome = block_on_detached(try_main()).and_then(|outcome| outcome);
    if let Err(err) = outcome {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    penzu_export::logging::init().context("init logging")?;

    let cli = penzu_export::cli::Cli::parse();
    tracing::debug!(journal_id = %cli.journal_id, out = %cli.out.display(), "parsed cli");

    penzu_export::export::run(cli).await?;

    Ok(())
}

/// Runs `future` to completion, then drops the runtime without joining
/// blocking tasks still parked on stdin.
fn block_on_detached<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
