// src/main.rs
use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use knocker_web::auto_knock::AutoKnockStore;
use knocker_web::config::Config;
use knocker_web::location::Location;
use knocker_web::mock::{self, MockConfig};
use knocker_web::page::{KnockState, KnockerPage};
use knocker_web::render;
use knocker_web::session::SessionStore;
use knocker_web::KnockClient;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "knocker-web", about = "Whitelist an IP with a Knocker service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the page, prefilled from the last session, and auto-knock if enabled.
    Open {
        #[arg(long)]
        url: Option<String>,
    },
    /// Knock once with the stored form values and any overrides.
    Knock {
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        ttl: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Flip the auto-knock preference.
    Toggle {
        #[arg(long)]
        url: Option<String>,
    },
    /// Forget the stored session.
    Forget,
    /// Serve a mock knock service.
    Mock {
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Accept any non-empty API key.
        #[arg(long)]
        lenient: bool,
    },
}

fn open_page(cfg: &Config, url: Option<String>) -> anyhow::Result<KnockerPage> {
    let location = match url {
        Some(url) => Location::parse(&url)?,
        None => cfg.location()?,
    };
    let jar = cfg.cookie_jar();
    let mut page = KnockerPage::new(
        KnockClient::new(),
        SessionStore::with_jar(&jar, cfg.tab()),
        AutoKnockStore::with_jar(&jar),
        location,
    );
    page.mount();
    Ok(page)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Open { url } => {
            let mut page = open_page(&cfg, url)?;
            let teardown = CancellationToken::new();
            let ctrl_c = teardown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });
            if !page.run_effects(&teardown).await {
                print!("{}", render::form(&page));
                if !page.location().auto_knock_requested() {
                    info!("auto-knock not requested by {}", page.location());
                } else if !page.auto_knock_enabled() {
                    info!("auto-knock is switched off");
                } else {
                    info!("no stored endpoint and token to knock with");
                }
                return Ok(());
            }
            print!("{}", render::page(&page));
            exit_on_error(&page);
        }
        Command::Knock { endpoint, token, ttl, ip, url } => {
            let mut page = open_page(&cfg, url)?;
            let form = page.form_mut();
            if let Some(endpoint) = endpoint {
                form.endpoint = endpoint;
            }
            if let Some(token) = token {
                form.token = token;
            }
            if let Some(ttl) = ttl {
                form.ttl = ttl;
            }
            if let Some(ip) = ip {
                form.ip = ip;
            }
            anyhow::ensure!(
                !page.form().endpoint.is_empty() && !page.form().token.is_empty(),
                "endpoint and token are required"
            );
            page.submit().await;
            print!("{}", render::page(&page));
            exit_on_error(&page);
        }
        Command::Toggle { url } => {
            let mut page = open_page(&cfg, url)?;
            let enabled = page.toggle_auto_knock();
            println!("Auto-knock on page load: {}", if enabled { "on" } else { "off" });
            println!("{}", page.location());
        }
        Command::Forget => {
            let jar = cfg.cookie_jar();
            SessionStore::with_jar(&jar, cfg.tab()).clear();
            info!("session cleared");
        }
        Command::Mock { bind, lenient } => {
            let config = MockConfig {
                strict: !lenient,
                ..MockConfig::default()
            };
            let addr = match bind {
                Some(addr) => addr,
                None => cfg.mock_addr()?,
            };
            mock::serve(config, addr).await?;
        }
    }
    Ok(())
}

fn exit_on_error(page: &KnockerPage) {
    if let KnockState::Error(_) = page.state() {
        std::process::exit(1);
    }
}
