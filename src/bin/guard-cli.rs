use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for the propguard admin surface", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check guard system status
    Status,
    /// Error statistics over a trailing window
    Errors {
        #[arg(short, long, default_value = "24h")]
        window: String,
    },
    /// Critical event statistics over a trailing window
    Events {
        #[arg(short, long, default_value = "24h")]
        window: String,
    },
    /// Navigation statistics over a trailing window
    Navigation {
        #[arg(short, long, default_value = "24h")]
        window: String,
    },
    /// Combined weekly report
    Report,
    /// Export every monitor's stored events
    Export,
    /// Clear all telemetry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Errors { window } => {
            let res = client
                .get(format!("{}/admin/telemetry/errors", cli.url))
                .query(&[("window", window)])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Events { window } => {
            let res = client
                .get(format!("{}/admin/telemetry/events", cli.url))
                .query(&[("window", window)])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Navigation { window } => {
            let res = client
                .get(format!("{}/admin/telemetry/navigation", cli.url))
                .query(&[("window", window)])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Report => {
            let res = client
                .get(format!("{}/admin/telemetry/report", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Export => {
            let res = client
                .get(format!("{}/admin/telemetry/export", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Clear => {
            let res = client
                .delete(format!("{}/admin/telemetry", cli.url))
                .headers(headers)
                .send()
                .await?;
            if res.status().is_success() {
                println!("Telemetry cleared");
            } else {
                eprintln!("Error: Admin API returned status {}", res.status());
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
