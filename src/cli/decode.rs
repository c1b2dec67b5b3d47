//! Decode command implementation

use crate::record::{RecordDecoder, Source};
use crate::snapshot::SnapshotAssembler;
use crate::source::{collect_batch, BatchLimits, ReplaySource, SourceRequest};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Replay file with one raw record per line
    pub file: PathBuf,

    /// Feed the records came from
    #[arg(long, default_value = "JRA")]
    pub source: Source,

    /// Print assembled snapshots instead of individual records
    #[arg(long)]
    pub snapshots: bool,
}

impl DecodeArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let mut replay = ReplaySource::from_file(self.source, &self.file).await?;
        let request = SourceRequest::new("replay", self.file.display().to_string());
        let raw = collect_batch(&mut replay, &[request], BatchLimits::default()).await;

        let decoder = RecordDecoder::default();
        let decoded: Vec<_> = raw.iter().filter_map(|r| decoder.decode(r)).collect();
        tracing::info!(read = raw.len(), decoded = decoded.len(), "Decoded replay file");

        if self.snapshots {
            let snapshots = SnapshotAssembler::new().assemble(decoded);
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        } else {
            for record in &decoded {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        Ok(())
    }
}
