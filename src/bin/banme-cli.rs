use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "banme-cli")]
#[command(about = "Management CLI for the banme proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Diagnostic API path prefix.
    #[arg(long, default_value = "/__banme")]
    prefix: String,

    #[arg(long, default_value = "admin")]
    user: String,

    #[arg(short, long, env = "BANME_ADMIN_PASSWORD")]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bans, latency percentiles and recent requests
    Info,
    /// Lift every active ban
    Unban,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!(
        "{}{}/api",
        cli.url.trim_end_matches('/'),
        cli.prefix.trim_end_matches('/')
    );

    match cli.command {
        Commands::Info => {
            let res = client
                .get(format!("{base}/info"))
                .basic_auth(&cli.user, Some(&cli.password))
                .send()
                .await?;
            if let Some(res) = check_status(res).await {
                let json: Value = res.json().await?;
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        Commands::Unban => {
            let res = client
                .post(format!("{base}/unban"))
                .basic_auth(&cli.user, Some(&cli.password))
                .send()
                .await?;
            if let Some(res) = check_status(res).await {
                println!("{}", res.text().await?);
            }
        }
    }

    Ok(())
}

async fn check_status(res: reqwest::Response) -> Option<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Some(res);
    }

    eprintln!("Error: Admin API returned status {}", status);
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
    None
}
