//! Hostwatch - host stats and error notification service
//!
//! Samples memory and CPU usage on a schedule, evaluates alert thresholds and
//! delivers reports, together with traced error reports, to Slack webhooks.

pub mod config;
pub mod error;
pub mod io;
pub mod markup;
pub mod notifier;
pub mod procfs;
pub mod reporter;
pub mod sampler;
pub mod slack;
pub mod system;
pub mod trace;

pub use config::{load_config, Config};
pub use error::{HostwatchError, Result};
pub use notifier::{Attachment, Channel, Notifier, Payload};
pub use reporter::ErrorReporter;
pub use sampler::{CycleOutcome, StatsSampler};
pub use trace::Traced;

use std::sync::Arc;

use crate::io::ReqwestHttpClient;
use crate::procfs::ProcfsSource;
use crate::slack::SlackWebhook;

/// Run the hostwatch service with the given configuration until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    if config.notifier.stats.is_none() {
        return Err(HostwatchError::ChannelUnconfigured(Channel::Stats));
    }

    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::default());
    let delivery = Arc::new(SlackWebhook::new(
        config.notifier.username.clone(),
        Arc::clone(&http),
    ));
    let notifier = Arc::new(Notifier::new(&config.notifier, delivery)?);
    let reporter = Arc::new(ErrorReporter::new(&config.reporter, Arc::clone(&notifier)));
    let source = Arc::new(ProcfsSource::new(config.stats.proc_root.clone()));

    let sampler = StatsSampler::new(&config.stats, notifier, reporter, source)?;
    sampler.start();

    tracing::info!("Hostwatch started as '{}'", sampler.label());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    // The loop only notices the stop after its interval sleep; don't wait it out.
    sampler.stop();
    tracing::info!("Hostwatch stopped");

    Ok(())
}
