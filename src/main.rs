use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use quire::auth::SecretHasher;
use quire::billing::StripeClient;
use quire::config::{BillingConfig, Environment, ServerConfig};
use quire::server::dto::SignUpForm;
use quire::server::validation::{Submission, parse_sign_up};
use quire::server::{AppState, create_router};
use quire::store::{Connector, SqliteConnector};
use quire::types::User;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Multi-tenant blogging dashboard server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "3000")]
        port: u16,

        /// Store connection string (e.g., "sqlite://./data/quire.db")
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Billing provider secret key
        #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
        stripe_secret_key: String,

        /// Recurring price that checkout subscribes to
        #[arg(long, env = "STRIPE_PRICE_ID")]
        stripe_price_id: String,

        /// Deployment environment: development or production
        #[arg(long, env = "APP_ENV", default_value = "development")]
        environment: Environment,

        /// Public base URL used for payment redirects in production
        /// (e.g., "https://blog.example.com").
        #[arg(long, env = "PUBLIC_BASE_URL")]
        public_base_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a user account
    CreateUser {
        /// Store connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        /// Password; prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

fn run_create_user(
    database_url: String,
    email: String,
    name: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => inquire::Password::new("Password:")
            .with_display_mode(inquire::PasswordDisplayMode::Masked)
            .prompt()?,
    };

    let form = SignUpForm {
        email: Some(email),
        password: Some(password),
        name: Some(name),
    };
    let input = match parse_sign_up(&form) {
        Submission::Success(input) => input,
        Submission::Failure(report) => {
            bail!("Invalid user: {}", serde_json::to_string(&report)?);
        }
    };

    let store = SqliteConnector::new(database_url)
        .connect()
        .context("Failed to open store")?;
    if store.get_user_by_email(&input.email)?.is_some() {
        bail!("A user with email '{}' already exists", input.email);
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        password_hash: SecretHasher::new().hash(&input.password)?,
        name: input.name,
        profile_image: None,
        customer_id: None,
        customer_pending_key: None,
        created_at: Utc::now(),
    };
    store.create_user(&user)?;

    println!("Created user '{}' ({})", user.email, user.id);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("quire=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::CreateUser {
                database_url,
                email,
                name,
                password,
            } => {
                run_create_user(database_url, email, name, password)?;
            }
        },
        Commands::Serve {
            host,
            port,
            database_url,
            stripe_secret_key,
            stripe_price_id,
            environment,
            public_base_url,
        } => {
            let config = ServerConfig {
                host,
                port,
                database_url,
                environment,
                public_base_url,
                billing: BillingConfig::new(stripe_secret_key, stripe_price_id),
            };
            config.validate().context("Invalid configuration")?;

            let billing = Arc::new(StripeClient::new(&config.billing)?);
            let state = Arc::new(AppState::new(&config, billing)?);
            state
                .database
                .connect()
                .await
                .context("Failed to open store")?;

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {} ({})", addr, config.environment);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
