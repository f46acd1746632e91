use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use site_mirror::{MirrorCommand, WebsiteMirror};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "site_mirror=debug"
    } else {
        "site_mirror=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();
    init_tracing(args.verbose);

    let config = args.into_config();
    println!("🚀 Mirroring: {}", config.base_url.blue());
    println!("📁 Content: {:?}", config.content_root);
    println!("🖼️  Assets: {:?}", config.public_dir);

    let mirror = WebsiteMirror::new(config)?;
    let report = mirror.mirror_site().await?;

    println!(
        "✅ Done. Saved {} routes and {} assets.",
        report.routes.len().to_string().green(),
        report.assets.to_string().green()
    );
    Ok(())
}
