//! Command-line argument parsing for duck-explore.

use crate::config::{self, Config};
use crate::engine::EngineBackend;
use crate::error::Result;
use crate::query::QueryKind;
use clap::Parser;
use std::path::PathBuf;

/// Output format for headless queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Bordered text table.
    #[default]
    Text,
    /// JSON array of row objects.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Explore the NYPD complaints sample data with MotherDuck.
#[derive(Parser, Debug)]
#[command(name = "duck-explore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Access token (prefer the MOTHERDUCK_TOKEN environment variable)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Read the access token from the clipboard
    #[arg(long, conflicts_with = "token")]
    pub paste: bool,

    /// Engine server URL. Recorded on the connection and shown in the
    /// header; the duckdb backend reaches MotherDuck through its md: URI
    #[arg(long, value_name = "URL", env = "MOTHERDUCK_SERVER_URL")]
    pub endpoint: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use the in-memory engine with bundled sample data
    #[arg(long)]
    pub mock: bool,

    /// Run a single query without the terminal UI and print the result
    #[arg(long, value_name = "SQL")]
    pub query: Option<String>,

    /// Result shape for --query: exec, arrow, or json (inferred when omitted)
    #[arg(long, value_name = "KIND")]
    pub kind: Option<String>,

    /// Output format for --query: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Print the token request URL and exit
    #[arg(long)]
    pub print_token_url: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Returns true if a headless query was requested.
    pub fn is_headless(&self) -> bool {
        self.query.is_some()
    }

    /// Engine backend to use; `--mock` overrides the config file.
    pub fn backend(&self, config: &Config) -> EngineBackend {
        if self.mock {
            EngineBackend::Mock
        } else {
            config.engine.backend
        }
    }

    /// Endpoint to record on the connection; the flag (or
    /// `MOTHERDUCK_SERVER_URL`) overrides the config file. Must be an
    /// absolute URL.
    pub fn endpoint(&self, config: &Config) -> Result<Option<String>> {
        let endpoint = self
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .or_else(|| config.engine.endpoint.clone());
        if let Some(endpoint) = &endpoint {
            config::validate_endpoint(endpoint)?;
        }
        Ok(endpoint)
    }

    /// Parses the result kind, inferring it from the SQL when not given.
    pub fn query_kind(&self) -> std::result::Result<QueryKind, String> {
        match (&self.kind, &self.query) {
            (Some(kind), _) => kind.parse(),
            (None, Some(sql)) => Ok(QueryKind::infer(sql)),
            (None, None) => Ok(QueryKind::default()),
        }
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.output.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_no_args() {
        let cli = parse_args(&["duck-explore"]);
        assert!(!cli.is_headless());
        assert!(!cli.mock);
        assert_eq!(cli.parse_output_format(), Ok(OutputFormat::Text));
    }

    #[test]
    fn test_parse_headless_query() {
        let cli = parse_args(&[
            "duck-explore",
            "--mock",
            "--query",
            "select 1",
            "--kind",
            "arrow",
            "--output",
            "json",
        ]);
        assert!(cli.is_headless());
        assert_eq!(cli.query_kind(), Ok(QueryKind::Arrow));
        assert_eq!(cli.parse_output_format(), Ok(OutputFormat::Json));
    }

    #[test]
    fn test_query_kind_inferred() {
        let cli = parse_args(&["duck-explore", "--query", "drop table t"]);
        assert_eq!(cli.query_kind(), Ok(QueryKind::Exec));
    }

    #[test]
    fn test_invalid_kind_and_format() {
        let cli = parse_args(&["duck-explore", "--kind", "csv", "--output", "xml"]);
        assert!(cli.query_kind().is_err());
        assert!(cli.parse_output_format().is_err());
    }

    #[test]
    fn test_token_conflicts_with_paste() {
        assert!(Cli::try_parse_from(["duck-explore", "--token", "t", "--paste"]).is_err());
    }

    #[test]
    fn test_parse_config_path() {
        let cli = parse_args(&["duck-explore", "--config", "/tmp/explore.toml"]);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/explore.toml"));
    }

    #[test]
    fn test_mock_flag_overrides_backend() {
        let mut config = Config::default();
        config.engine.backend = EngineBackend::Duckdb;

        let cli = parse_args(&["duck-explore", "--mock"]);
        assert_eq!(cli.backend(&config), EngineBackend::Mock);

        let cli = parse_args(&["duck-explore"]);
        assert_eq!(cli.backend(&config), EngineBackend::Duckdb);
    }

    #[test]
    fn test_endpoint_flag_overrides_config() {
        let mut config = Config::default();
        config.engine.endpoint = Some("https://config.example.com".to_string());

        let cli = parse_args(&["duck-explore", "--endpoint", "https://flag.example.com"]);
        assert_eq!(
            cli.endpoint(&config).unwrap().as_deref(),
            Some("https://flag.example.com")
        );
    }

    #[test]
    fn test_invalid_endpoint_flag_rejected() {
        let cli = parse_args(&["duck-explore", "--endpoint", "not a url"]);
        let err = cli.endpoint(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("Invalid endpoint"));
    }
}
