use std::sync::Arc;

use anyhow::{Context, bail};
use atelier_client::notifications::Notifier;
use atelier_client::scanner::ScannerController;
use atelier_client::security::SecureCredential;
use atelier_client::services::{
    AuthService, GalleryService, ProfileService, ScanService, WalletService,
};
use atelier_client::{ApiClient, SessionStore};
use atelier_config::{ClientConfig, ConfigLoader, ConfigSource};
use atelier_model::{Money, PageRequest, SessionTokens, WithdrawalMethod, WithdrawalRequest};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod stdin_camera;

use stdin_camera::StdinCamera;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "atelierctl", version)]
#[command(about = "Command-line client for the Atelier gallery platform")]
struct Cli {
    #[command(flatten)]
    auth: TokenArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
struct TokenArgs {
    /// Access token for an existing session
    #[arg(long, global = true, env = "ATELIER_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Refresh token used when the access token expires
    #[arg(long, global = true, env = "ATELIER_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the issued tokens as environment assignments
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "ATELIER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Wallet balance, history and withdrawals
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },
    /// List galleries
    Galleries {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show the signed-in profile and subscription
    Profile,
    /// Approve a QR sign-in code; each stdin line is treated as a decoded frame
    Scan,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    /// Show available, pending and total balance
    Balance,
    /// List wallet transactions
    Transactions {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Request a withdrawal
    Withdraw {
        /// Amount in minor units (cents)
        #[arg(long)]
        amount_minor: i64,
        #[arg(long, default_value = "EUR")]
        currency: String,
        #[arg(long, value_enum, default_value = "bank-transfer")]
        method: MethodArg,
    },
}

#[derive(ClapArgs, Debug, Clone, Copy)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = PageRequest::DEFAULT_PER_PAGE)]
    per_page: u32,
}

impl From<PageArgs> for PageRequest {
    fn from(args: PageArgs) -> Self {
        PageRequest::new(args.page, args.per_page)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum MethodArg {
    BankTransfer,
    Card,
    CryptoWallet,
}

impl From<MethodArg> for WithdrawalMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::BankTransfer => WithdrawalMethod::BankTransfer,
            MethodArg::Card => WithdrawalMethod::Card,
            MethodArg::CryptoWallet => WithdrawalMethod::CryptoWallet,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config()?;
    let session = session_from_args(&cli.auth);
    let api = ApiClient::from_config(&config, session.clone())
        .context("failed to build HTTP client")?;

    match cli.command {
        Command::Login { username, password } => {
            AuthService::new(api.clone())
                .login(&username, SecureCredential::from(password))
                .await?;
            if let Some(access) = session.access_token() {
                println!("ATELIER_ACCESS_TOKEN={access}");
            }
            if let Some(refresh) = session.refresh_token() {
                println!("ATELIER_REFRESH_TOKEN={refresh}");
            }
        }
        Command::Wallet { command } => {
            require_session(&session)?;
            let wallet = WalletService::new(api);
            match command {
                WalletCommand::Balance => print_json(&wallet.balance().await?)?,
                WalletCommand::Transactions { page } => {
                    print_json(&wallet.transactions(page.into()).await?)?
                }
                WalletCommand::Withdraw {
                    amount_minor,
                    currency,
                    method,
                } => {
                    let request =
                        WithdrawalRequest::new(Money::new(amount_minor, currency), method.into())?;
                    print_json(&wallet.withdraw(&request).await?)?
                }
            }
        }
        Command::Galleries { page } => {
            let galleries = GalleryService::new(api);
            print_json(&galleries.list_galleries(page.into()).await?)?
        }
        Command::Profile => {
            require_session(&session)?;
            let profiles = ProfileService::new(api);
            print_json(&profiles.me().await?)?;
            print_json(&profiles.subscription().await?)?;
        }
        Command::Scan => {
            require_session(&session)?;
            run_scan(&config, api).await?;
        }
    }

    Ok(())
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let load = ConfigLoader::from_process()
        .load()
        .context("failed to load configuration")?;

    match &load.source {
        ConfigSource::Default => debug!("using default configuration"),
        ConfigSource::EnvPath(path) | ConfigSource::File(path) => {
            info!(path = %path.display(), "configuration loaded from file")
        }
        ConfigSource::EnvInline => info!("configuration loaded from inline environment json"),
    }
    if !load.overrides.is_empty() {
        debug!(overrides = ?load.overrides, "environment overrides applied");
    }

    Ok(load.config)
}

fn session_from_args(args: &TokenArgs) -> SessionStore {
    match args.access_token.as_deref().map(str::trim) {
        Some(access) if !access.is_empty() => SessionStore::with_tokens(SessionTokens::new(
            access,
            args.refresh_token.clone(),
        )),
        _ => SessionStore::new(),
    }
}

fn require_session(session: &SessionStore) -> anyhow::Result<()> {
    if !session.is_authenticated() {
        bail!("not signed in: pass --access-token or set ATELIER_ACCESS_TOKEN");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_scan(config: &ClientConfig, api: ApiClient) -> anyhow::Result<()> {
    let notifier = Notifier::new();
    let camera = Arc::new(StdinCamera::spawn());
    let controller = ScannerController::spawn(
        config.scanner.clone(),
        camera.clone(),
        Arc::new(ScanService::new(api.clone())),
        api.session().clone(),
        notifier.clone(),
    );

    let mut notes = notifier.subscribe();
    let mut snapshot = controller.subscribe();
    controller.start().await?;
    eprintln!("Scanning: paste or pipe decoded QR text, one code per line.");

    let outcome = loop {
        tokio::select! {
            Ok(note) = notes.recv() => eprintln!("{note}"),
            changed = snapshot.changed() => {
                changed.context("scanner stopped unexpectedly")?;
                let current = snapshot.borrow_and_update().clone();
                if current.completed {
                    break Ok(current.redirect.unwrap_or_default());
                }
            }
            _ = camera.input_closed() => {
                break Err(anyhow::anyhow!("input ended before a code was approved"));
            }
            _ = tokio::signal::ctrl_c() => {
                break Err(anyhow::anyhow!("scan cancelled"));
            }
        }
    };

    controller.close().await?;
    let redirect = outcome?;
    println!("{redirect}");
    Ok(())
}
