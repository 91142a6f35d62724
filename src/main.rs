//! duck-explore - explore the NYPD complaints sample data from the terminal.

use anyhow::{bail, Context};
use duck_explore::auth::{self, Credential};
use duck_explore::cli::Cli;
use duck_explore::config::Config;
use duck_explore::connection::ConnectionManager;
use duck_explore::engine::{create_engine, EngineBackend};
use duck_explore::query::{Connector, Query, QueryExecutor};
use duck_explore::tui::{self, TuiContext};
use duck_explore::{logging, output};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.is_headless() || cli.print_token_url {
        logging::init_stderr_logging();
    } else {
        logging::init_file_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.engine.apply_env_defaults();

    let token_url = auth::token_request_url(
        &config.auth.token_service_url,
        &config.auth.app_name,
        None,
    )?;
    if cli.print_token_url {
        println!("{token_url}");
        return Ok(());
    }

    let backend = cli.backend(&config);
    let mut credential = if cli.paste {
        Some(auth::credential_from_clipboard().context("Failed to read token from clipboard")?)
    } else {
        auth::resolve_credential(cli.token.as_deref())
    };
    if credential.is_none() && backend == EngineBackend::Mock && cli.is_headless() {
        credential = Some(Credential::new("mock"));
    }

    let engine = create_engine(backend, config.engine.database.as_deref())?;
    let manager = ConnectionManager::new(engine, cli.endpoint(&config)?);

    match cli.query.as_deref() {
        Some(sql) => run_query(&cli, manager, credential, sql).await,
        None => {
            tui::run(TuiContext {
                manager,
                token_url: Some(token_url.to_string()),
                initial_credential: credential,
            })
            .await?;
            Ok(())
        }
    }
}

/// Runs one query without the terminal UI and prints the result.
async fn run_query(
    cli: &Cli,
    mut manager: ConnectionManager,
    credential: Option<Credential>,
    sql: &str,
) -> anyhow::Result<()> {
    let kind = cli.query_kind().map_err(anyhow::Error::msg)?;
    let format = cli.parse_output_format().map_err(anyhow::Error::msg)?;
    let Some(credential) = credential else {
        bail!(
            "No token: pass --token, use --paste, or set {}",
            auth::TOKEN_ENV_VAR
        );
    };

    let outcome = manager.connect(credential);
    let executor = QueryExecutor::new(outcome.connection().clone());
    executor.connection().wait_ready().await?;

    let data = executor.query(Query::new(sql, kind)).await?;
    println!("{}", output::render(&data, format)?);
    Ok(())
}
