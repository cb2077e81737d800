//! CLI commands and argument parsing

use crate::types::{Params, RequestOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the persisted session
pub const DEFAULT_STORAGE_PATH: &str = ".dashboard-client/session.json";

/// Admin dashboard API client
#[derive(Parser, Debug)]
#[command(name = "dashboard-client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overrides config and environment
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Session storage file (JSON)
    #[arg(short, long, global = true, default_value = DEFAULT_STORAGE_PATH)]
    pub storage: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// GET a resource
    Get {
        /// Path relative to the API URL
        path: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// POST a JSON body
    Post {
        path: String,

        /// Request body (JSON)
        #[arg(short, long)]
        data: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// PUT a JSON body
    Put {
        path: String,

        /// Request body (JSON)
        #[arg(short, long)]
        data: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// PATCH a JSON body
    Patch {
        path: String,

        /// Request body (JSON)
        #[arg(short, long)]
        data: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// DELETE a resource
    Delete {
        path: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show the signed-in user
    Whoami,
}

/// Per-request flags shared by the verb subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Query parameter (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Bypass the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Bypass request deduplication
    #[arg(long)]
    pub no_dedup: bool,

    /// Do not send the bearer token
    #[arg(long)]
    pub no_auth: bool,

    /// Cache TTL in milliseconds
    #[arg(long)]
    pub ttl_ms: Option<u64>,

    /// Request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl RequestArgs {
    /// Convert the flags into client request options
    pub fn to_options(&self) -> RequestOptions {
        let params: Params = self.params.iter().cloned().collect();
        RequestOptions {
            skip_auth: self.no_auth,
            skip_cache: self.no_cache,
            skip_deduplication: self.no_dedup,
            ttl: self.ttl_ms.map(Duration::from_millis),
            timeout: self.timeout_ms.map(Duration::from_millis),
            params,
        }
    }
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_get_with_flags() {
        let cli = Cli::try_parse_from([
            "dashboard-client",
            "get",
            "/list/items",
            "--param",
            "page=1",
            "-p",
            "limit=10",
            "--no-cache",
            "--ttl-ms",
            "30000",
        ])
        .unwrap();

        let Commands::Get { path, request } = cli.command else {
            panic!("expected get");
        };
        assert_eq!(path, "/list/items");

        let options = request.to_options();
        assert!(options.skip_cache);
        assert!(!options.skip_deduplication);
        assert_eq!(options.ttl, Some(Duration::from_millis(30_000)));
        assert_eq!(options.params.get("page").map(String::as_str), Some("1"));
        assert_eq!(options.params.get("limit").map(String::as_str), Some("10"));
        assert_eq!(cli.storage, PathBuf::from(DEFAULT_STORAGE_PATH));
    }

    #[test]
    fn test_parse_post_with_body() {
        let cli = Cli::try_parse_from([
            "dashboard-client",
            "--api-url",
            "https://admin.example.com/api",
            "post",
            "/items",
            "--data",
            r#"{"name":"widget"}"#,
            "--no-auth",
        ])
        .unwrap();

        assert_eq!(cli.api_url.as_deref(), Some("https://admin.example.com/api"));
        let Commands::Post { data, request, .. } = cli.command else {
            panic!("expected post");
        };
        assert_eq!(data.as_deref(), Some(r#"{"name":"widget"}"#));
        assert!(request.to_options().skip_auth);
    }

    #[test]
    fn test_param_requires_key_value() {
        assert!(parse_param("page").is_err());
        assert!(parse_param("=1").is_err());
        assert_eq!(
            parse_param("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
    }
}
