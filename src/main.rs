use crypto_ratio_scrapper::{
    archive::PageArchive,
    config::Config,
    harvest::HttpHarvester,
    pipeline::{CancelToken, Pipeline},
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_ratio_scrapper=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Load configuration
    let config = Config::load()?;
    info!(base_url = %config.base_url, output_dir = %config.output_dir.display(), "configuration loaded");

    // First Ctrl-C stops after the current document and still writes partial
    // results; a second one exits immediately.
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if on_interrupt.is_cancelled() {
                warn!("second interrupt, exiting without export");
                std::process::exit(130);
            }
            warn!("interrupt received, finishing current document");
            on_interrupt.cancel();
        }
    });

    let pipeline = Pipeline::new(config.extraction.clone(), config.output_dir.clone(), cancel);

    let summary = match &config.archive_path {
        Some(path) => {
            info!(archive = %path.display(), "extracting from saved archive");
            let details = PageArchive::load(path)?;
            pipeline.run_archive(&details)?
        }
        None => {
            let harvester = HttpHarvester::new(&config)?;
            pipeline.run(&harvester, config.list_pages).await?
        }
    };

    println!(
        "{} harvested, {} failed, {} extracted, {} kept (ratio <= {})",
        summary.harvested, summary.failed, summary.extracted, summary.kept, summary.ratio_threshold
    );
    if let Some(path) = &summary.kept_path {
        println!("Filtered records written to {}", path.display());
    }

    Ok(())
}
