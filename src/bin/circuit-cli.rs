use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use url::Url;

#[derive(Parser)]
#[command(name = "circuit-cli")]
#[command(about = "Management CLI for the circuit manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081", env = "CIRCUIT_ADMIN_URL")]
    url: String,

    #[arg(short, long, env = "CIRCUIT_ADMIN_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Version and breaker counts per state
    Status,
    /// List every breaker with its counters
    Breakers,
    /// Show one breaker
    Show {
        /// Operation name, e.g. routing.getOptimalRoute
        name: String,
    },
    /// Force every breaker back to closed
    Reset,
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

    let (method, url) = admin_request(&cli.url, &cli.command)?;

    let res = client
        .request(method, url)
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

/// Method and URL for `command`. Breaker names are percent-encoded as a
/// single path segment.
fn admin_request(base: &str, command: &Commands) -> Result<(Method, Url), Box<dyn std::error::Error>> {
    let (method, segments) = match command {
        Commands::Status => (Method::GET, vec!["admin", "status"]),
        Commands::Breakers => (Method::GET, vec!["admin", "breakers"]),
        Commands::Show { name } => (Method::GET, vec!["admin", "breakers", name.as_str()]),
        Commands::Reset => (Method::POST, vec!["admin", "breakers", "reset"]),
    };

    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("admin URL cannot have a path: {}", base))?
        .pop_if_empty()
        .extend(segments);
    Ok((method, url))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
