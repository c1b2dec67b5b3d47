//! Keys command implementation

use crate::config::Config;
use crate::source::RealtimeKeys;
use chrono::NaiveDate;
use clap::Args;

#[derive(Args, Debug)]
pub struct KeysArgs {
    /// Race day (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Highest place code (defaults to the configured value)
    #[arg(long)]
    pub places: Option<u8>,

    /// Races per place (defaults to the configured value)
    #[arg(long)]
    pub races: Option<u8>,
}

impl KeysArgs {
    pub fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let date = self
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let keys = RealtimeKeys::for_date(
            date,
            self.places.unwrap_or(config.source.place_codes),
            self.races.unwrap_or(config.source.races_per_place),
        );
        for key in keys.iter() {
            println!("{}", key);
        }
        Ok(())
    }
}
