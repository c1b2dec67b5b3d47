//! Run command implementation

use super::SourceOverrides;
use crate::collector::Collector;
use crate::config::Config;
use clap::Args;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub overrides: SourceOverrides,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let config = self.overrides.apply(config);
        let today = chrono::Local::now().date_naive();
        let mut collector = Collector::from_config(&config, today).await?;

        tracing::info!(
            source = %config.source.kind,
            specs = ?config.source.data_specs,
            "Starting collector"
        );
        collector.run().await
    }
}
