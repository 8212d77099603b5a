use clap::Parser;
use presencerelay::{default_source, Catalog, PresenceBridge, RelayConfig, Result};
use std::path::PathBuf;

/// Local Rich Presence relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the detectable applications catalog (JSON array)
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Scan processes every second instead of every five
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() -> Result {
    // Load .env file if it exists (optional)
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();

    let catalog_path = args
        .catalog
        .or_else(|| std::env::var_os("PRESENCERELAY_CATALOG").map(PathBuf::from))
        .unwrap_or_else(|| {
            eprintln!("Error: a catalog is required!");
            eprintln!("Provide it via:");
            eprintln!("  - Command line: cargo run --example relay_server -- --catalog detectable.json");
            eprintln!("  - Environment: PRESENCERELAY_CATALOG=detectable.json cargo run --example relay_server");
            eprintln!("  - .env file: set PRESENCERELAY_CATALOG");
            std::process::exit(1);
        });

    let catalog = Catalog::from_path(&catalog_path)?;
    let config = if args.fast {
        RelayConfig::fast_poll()
    } else {
        RelayConfig::default()
    };

    let (bridge, mut events) = PresenceBridge::start(config, catalog, default_source()).await?;
    println!("Listening on {} (Ctrl+C to stop)", bridge.address());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => println!("{} {}", event.name(), event.to_json()?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("Shutting down...");
    bridge.stop().await;
    Ok(())
}
