//! Headless campaign runner.
//!
//! ```bash
//! cargo run -p campaign-cli -- --prompt "A dragon terrorizes the north" --name Aria --class ranger
//! ```

mod headless;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so narration on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = headless::parse_config_from_args(&args);
    if config.prompt.trim().is_empty() && config.load.is_none() {
        tracing::warn!("No --prompt given, the campaign will use a generic premise");
    }

    headless::run_headless(config).await.map_err(|e| e.into())
}

fn print_help() {
    println!("campaign - adaptive narrative campaign runner");
    println!();
    println!("USAGE:");
    println!("  campaign [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help                 Show this help message");
    println!("  --prompt <TEXT>            Campaign premise");
    println!("  --name <NAME>              Character name (default: Adventurer)");
    println!("  --class <CLASS>            Character class");
    println!("  --background <BG>          Character background");
    println!("  --description <TEXT>       Free-form character description");
    println!("  --load <PATH>              Resume a saved campaign");
    println!("  --save-dir <DIR>           Directory for #save without a path (default: saves)");
    println!();
    println!("ENVIRONMENT:");
    println!("  ANTHROPIC_API_KEY          Use Claude as the primary backend");
    println!("  OLLAMA_BASE_URL, OLLAMA_MODEL");
    println!("                             Local OpenAI-compatible fallback backend");
    println!("  CAMPAIGN_ADVANCE_POLICY    discretion | objectives");
    println!("  CAMPAIGN_TIMEOUT_SECS      Per-call generation timeout");
    println!("  RUST_LOG                   Log filter (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("  campaign --prompt \"Explore the sunken city\" --name Aria --class ranger");
    println!("  campaign --load saves/The_Sunken_City_autosave.json");
}
