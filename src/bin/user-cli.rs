use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "user-cli")]
#[command(about = "Management CLI for the user service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all users
    List,
    /// Show one user
    Get { id: u64 },
    /// Create a user
    Create {
        username: String,
        email: String,
        full_name: String,
    },
    /// Delete a user
    Delete { id: u64 },
    /// Hit the simulated-error endpoint
    Error,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/api/v1/users", cli.url.trim_end_matches('/'));

    let res = match cli.command {
        Commands::List => client.get(&base).send().await?,
        Commands::Get { id } => client.get(format!("{base}/{id}")).send().await?,
        Commands::Create {
            username,
            email,
            full_name,
        } => {
            client
                .post(&base)
                .json(&json!({
                    "username": username,
                    "email": email,
                    "fullName": full_name,
                }))
                .send()
                .await?
        }
        Commands::Delete { id } => client.delete(format!("{base}/{id}")).send().await?,
        Commands::Error => client.get(format!("{base}/error")).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let request_id = res
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    println!("HTTP {} (request {})", status, request_id);

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
