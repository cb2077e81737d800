//! CLI runner - executes commands

use crate::auth::{AuthService, LoginCredentials};
use crate::cli::commands::{Cli, Commands, RequestArgs};
use crate::config::ClientConfig;
use crate::error::{ApiError, Error, Result};
use crate::http::HttpClient;
use crate::storage::FileStorage;
use crate::types::{JsonValue, Method};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let client = self.client().await?;

        match &self.cli.command {
            Commands::Get { path, request } => {
                let envelope = client
                    .request(Method::GET, path, None, request.to_options())
                    .await?;
                print_json(&envelope)
            }
            Commands::Post {
                path,
                data,
                request,
            } => {
                self.send(&client, Method::POST, path, data.as_deref(), request)
                    .await
            }
            Commands::Put {
                path,
                data,
                request,
            } => {
                self.send(&client, Method::PUT, path, data.as_deref(), request)
                    .await
            }
            Commands::Patch {
                path,
                data,
                request,
            } => {
                self.send(&client, Method::PATCH, path, data.as_deref(), request)
                    .await
            }
            Commands::Delete { path, request } => {
                let envelope = client
                    .request(Method::DELETE, path, None, request.to_options())
                    .await?;
                print_json(&envelope)
            }
            Commands::Login { email, password } => {
                let auth = AuthService::new(client);
                let response = auth
                    .login(&LoginCredentials::new(email.as_str(), password.as_str()))
                    .await?;
                print_json(&response.user)
            }
            Commands::Logout => {
                AuthService::new(client).logout().await?;
                print_json(&serde_json::json!({"message": "Signed out"}))
            }
            Commands::Whoami => {
                let user = AuthService::new(client).current_user().await?;
                print_json(&user)
            }
        }
    }

    /// Resolve the config: YAML file if given, else environment, then flags
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ClientConfig::from_yaml_file(path)?,
            None => ClientConfig::from_env()?,
        };

        if let Some(url) = &self.cli.api_url {
            config.api_url.clone_from(url);
            config.validate()?;
        }

        Ok(config)
    }

    async fn client(&self) -> Result<HttpClient> {
        let config = self.load_config()?;
        debug!(api_url = %config.api_url, storage = %self.cli.storage.display(), "Building client");

        let storage = FileStorage::open(&self.cli.storage)?;
        HttpClient::builder(config)
            .storage(Arc::new(storage))
            .build()
            .await
    }

    async fn send(
        &self,
        client: &HttpClient,
        method: Method,
        path: &str,
        data: Option<&str>,
        request: &RequestArgs,
    ) -> Result<()> {
        let body = data
            .map(|raw| serde_json::from_str::<JsonValue>(raw).context("Invalid --data JSON"))
            .transpose()?;

        let envelope = client
            .request(method, path, body, request.to_options())
            .await?;
        print_json(&envelope)
    }
}

/// Failure report for stderr: the normalized error as pretty JSON
pub fn render_error(err: Error) -> String {
    let api = ApiError::from(err);
    serde_json::to_string_pretty(&api).unwrap_or_else(|_| api.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(Error::from)?;
    println!("{rendered}");
    Ok(())
}
