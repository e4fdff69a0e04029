use std::sync::Arc;

use tracing::{error, info, warn};

use ottomail::channels::{
    DraftBox, EmlDraftBox, InquirySpool, LogNotifier, Notifier, WebhookNotifier,
};
use ottomail::config::AppConfig;
use ottomail::llm::create_service;
use ottomail::pipeline::ProposalPipeline;
use ottomail::store::{LibSqlStorage, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("📬 OttoMail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Provider: {:?}", config.llm.backend);
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Inbox: {}", config.inbox_dir.display());
    eprintln!("   Drafts: {}", config.drafts_dir.display());
    eprintln!("   Database: {}\n", config.db_path.display());

    let llm = create_service(&config.llm)?;

    let storage: Arc<dyn Storage> = Arc::new(LibSqlStorage::new_local(&config.db_path).await?);

    let drafts: Arc<dyn DraftBox> =
        Arc::new(EmlDraftBox::new(&config.drafts_dir, &config.from_address)?);

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };

    let spool = InquirySpool::new(&config.inbox_dir, &config.processed_dir)?;
    let pipeline = ProposalPipeline::new(llm, storage, drafts, notifier);

    info!(
        interval_secs = config.poll_interval.as_secs(),
        "Spool poller started"
    );
    let mut tick = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let inquiries = match spool.fetch_new() {
                    Ok(inquiries) => inquiries,
                    Err(e) => {
                        error!(error = %e, "Failed to read inbox spool");
                        continue;
                    }
                };

                for email in inquiries {
                    let id = email.id.clone();
                    match pipeline.run(email).await {
                        Ok(state) => {
                            info!(id = %id, step = %state.current_step(), "Run finished");
                            if let Err(e) = spool.mark_processed(&id) {
                                warn!(id = %id, error = %e, "Failed to move processed inquiry");
                            }
                        }
                        Err(e) => {
                            // Contract violation — leave the file in place
                            // and surface it loudly.
                            error!(id = %id, error = %e, "Pipeline aborted");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
