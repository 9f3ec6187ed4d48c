use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hydra-cli")]
#[command(about = "Admin CLI for a running hydra-mock server", long_about = None)]
struct Cli {
    /// Base URL of the server, including the admin mount path.
    #[arg(short, long, default_value = "http://localhost:3000/hydra-admin")]
    url: String,

    /// Admin API key, sent as a bearer token.
    #[arg(short, long)]
    key: Option<String>,

    /// Target a named hydra instead of the default one.
    #[arg(long)]
    hydra: Option<String>,

    /// Header the server uses to pick a hydra.
    #[arg(long, default_value = "x-hydra")]
    hydra_header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List plugins with their heads and scenarios
    Plugins,
    /// Show one plugin
    Plugin { name: String },
    /// Attach a head
    Attach { plugin: String, head: String },
    /// Detach a head
    Detach { plugin: String, head: String },
    /// Start a scenario
    Start { plugin: String, scenario: String },
    /// Stop the active scenario
    Stop,
    /// Show the active scenario
    Current,
    /// Show assertion results per scenario
    Results,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/rest", cli.url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }
    if let Some(hydra) = &cli.hydra {
        headers.insert(
            HeaderName::from_bytes(cli.hydra_header.as_bytes())?,
            HeaderValue::from_str(hydra)?,
        );
    }

    let request = match cli.command {
        Commands::Plugins => client.get(format!("{base}/plugins")),
        Commands::Plugin { name } => client.get(format!("{base}/plugins/{name}")),
        Commands::Attach { plugin, head } => client
            .post(format!("{base}/plugins/{plugin}/heads/{head}"))
            .form(&[("attached", "true")]),
        Commands::Detach { plugin, head } => client
            .post(format!("{base}/plugins/{plugin}/heads/{head}"))
            .form(&[("attached", "false")]),
        Commands::Start { plugin, scenario } => client
            .post(format!("{base}/plugins/{plugin}/scenarios/{scenario}"))
            .form(&[("active", "true")]),
        Commands::Stop => client.delete(format!("{base}/current-scenario")),
        Commands::Current => client.get(format!("{base}/current-scenario")),
        Commands::Results => client.get(format!("{base}/test-results")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if !status.is_success() {
        eprintln!("Error: admin API returned status {status}");
        eprintln!("{rendered}");
        std::process::exit(1);
    }
    println!("{rendered}");
    Ok(())
}
