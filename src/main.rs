use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

use dash_oauth_login::auth::{ApiClient, LoginFlow, RedirectFlow, REDIRECT_URI_PATHNAME};
use dash_oauth_login::config::{AppConfig, Location};
use dash_oauth_login::popup::ProcessWindowSystem;

#[derive(Parser)]
#[command(name = "dash-login")]
#[command(about = "OAuth login flow for Plotly-protected Dash apps", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the authorization popup and complete the login handshake
    Login,
    /// Print the authorization URL without opening anything
    Url,
    /// Check whether the current session is authorized to view the app
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::from_file(&config_path)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let location = Location::from_url(&config.app_url)?;

    match cli.command {
        Commands::Url => {
            let windows = ProcessWindowSystem::new(config.browser_command.clone());
            let flow = LoginFlow::new(config.auth.clone(), location, windows);
            println!("{}", flow.authorization_url());
        }
        Commands::Status => {
            let api = ApiClient::new(&location, &config.auth)?;
            let status = api
                .check_authorization()
                .await
                .context("authorization check failed")?;
            report_authorization(status);
        }
        Commands::Login => run_login(config, location).await?,
    }

    Ok(())
}

async fn run_login(config: AppConfig, location: Location) -> Result<()> {
    let windows = ProcessWindowSystem::new(config.browser_command.clone());
    let flow = LoginFlow::new(config.auth.clone(), location.clone(), windows);

    let api = ApiClient::new(&location, &config.auth)?;
    if let Err(e) = api.prime().await {
        tracing::warn!(error = %e, "could not fetch the app root to pick up the CSRF cookie");
    }

    let handle = flow.open_popup()?;
    println!("🔐 Opened the authorization page in your browser.");
    println!();
    println!("If nothing opened, visit:");
    println!("  {}", flow.authorization_url());
    println!();
    println!("After you log in, the browser lands on the {REDIRECT_URI_PATHNAME} page.");
    print!("Paste that page's full URL here: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let redirect_url = Url::parse(line.trim()).context("that does not look like a URL")?;

    let cancel = CancellationToken::new();
    let (ack_tx, ack_rx) = oneshot::channel();

    let mut redirect = RedirectFlow::new(api);
    let phase = redirect.run(&redirect_url, &handle, &cancel).await?;
    println!();
    println!("{}", phase.describe());
    let _ = ack_tx.send(());

    let outcome = flow.wait_closed(&handle, Some(ack_rx), &cancel).await?;
    tracing::debug!(?outcome, "popup wait finished");

    // The "reload": re-evaluate authorization now that the popup is gone.
    let status = redirect
        .api()
        .check_authorization()
        .await
        .context("authorization re-check failed")?;
    println!();
    report_authorization(status);

    Ok(())
}

fn report_authorization(status: u16) {
    match status {
        200 => println!("✅ You are logged in and authorized to view this app."),
        403 => println!("⛔ Logged in, but not authorized to view this app."),
        other => println!("❌ Authorization check returned HTTP {other}"),
    }
}
