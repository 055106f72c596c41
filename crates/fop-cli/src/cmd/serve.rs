use anyhow::Context;
use fop_core::config::WarnLevel;
use fop_core::roster::YamlRoster;
use std::path::Path;
use std::sync::Arc;

pub fn run(config: Option<&Path>, roster: &Path, port: u16) -> anyhow::Result<()> {
    let config = super::config::load(config)?;
    let warnings = config.validate();
    for w in &warnings {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors; run `fop config validate`");
    }

    let roster = YamlRoster::open(roster)
        .with_context(|| format!("failed to open roster {}", roster.display()))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(fop_server::serve(config, Arc::new(roster), port))
}
