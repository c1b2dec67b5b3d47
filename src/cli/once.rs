//! Once command implementation

use super::SourceOverrides;
use crate::collector::Collector;
use crate::config::Config;
use chrono::NaiveDateTime;
use clap::Args;

#[derive(Args, Debug)]
pub struct OnceArgs {
    #[command(flatten)]
    pub overrides: SourceOverrides,

    /// Local time to run the cycle at (e.g. 2024-06-15T15:20:00)
    #[arg(long)]
    pub at: Option<NaiveDateTime>,
}

impl OnceArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let config = self.overrides.apply(config);
        let now = self
            .at
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let mut collector = Collector::from_config(&config, now.date()).await?;

        let report = collector.run_cycle(now).await;
        collector.engine_mut().flush()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
