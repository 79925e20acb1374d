use crate::{
    config::{ClientConfig, Credentials},
    endpoints::{EndpointArgs, EndpointCatalog},
    retry::RetryPolicy,
    IgsClient,
};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Command-line interface for the Xsolla in-game store
#[derive(Parser)]
#[command(name = "igs")]
#[command(about = "Xsolla in-game store client", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List known endpoints
    Endpoints {
        /// OpenAPI document to read endpoints from instead of the built-in table
        #[arg(short, long)]
        spec: Option<PathBuf>,
    },
    /// Call an endpoint and print the JSON result
    Call {
        /// Operation id, e.g. get_virtual_items
        operation_id: String,

        /// OpenAPI document to read endpoints from instead of the built-in table
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// YAML configuration file; IGS_* environment variables otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Path argument as name=value (repeatable)
        #[arg(short = 'p', long = "path", value_parser = parse_key_value)]
        path: Vec<(String, String)>,

        /// Query argument as name=value (repeatable)
        #[arg(short = 'q', long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Maximum attempts, first one included
        #[arg(long)]
        retry_count: Option<u32>,

        /// Delay between attempts
        #[arg(long, default_value_t = 500)]
        retry_delay_ms: u64,
    },
}

/// Parse a `name=value` argument.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got `{s}`")),
    }
}

fn load_catalog(spec: Option<&Path>) -> anyhow::Result<Arc<EndpointCatalog>> {
    match spec {
        Some(path) => {
            let catalog = EndpointCatalog::from_openapi_file(path)
                .with_context(|| format!("failed to load endpoints from {}", path.display()))?;
            Ok(Arc::new(catalog))
        }
        None => Ok(EndpointCatalog::builtin()),
    }
}

/// Execute a parsed command line.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Endpoints { spec } => {
            let catalog = load_catalog(spec.as_deref())?;
            for endpoint in catalog.iter() {
                let mut line = format!(
                    "{:<48} {:<7} {}",
                    endpoint.operation_id, endpoint.method, endpoint.path_template
                );
                if endpoint.has_body {
                    line.push_str(" [body]");
                }
                println!("{line}");
            }
            Ok(())
        }
        Commands::Call {
            operation_id,
            spec,
            config,
            path,
            query,
            body,
            retry_count,
            retry_delay_ms,
        } => {
            let mut client_config = match config {
                Some(file) => ClientConfig::from_yaml_file(&file)
                    .with_context(|| format!("failed to load config {}", file.display()))?,
                None => ClientConfig::from_env(),
            };
            if let Some(count) = retry_count {
                client_config = client_config
                    .with_retry(RetryPolicy::fixed(count, Duration::from_millis(retry_delay_ms)));
            }

            let catalog = load_catalog(spec.as_deref())?;
            let client = IgsClient::new(client_config)
                .context("failed to create client")?
                .with_catalog(catalog);
            client.set_credentials(Credentials::from_env());

            let endpoint = client
                .catalog()
                .get(&operation_id)
                .ok_or_else(|| anyhow!("unknown operation `{operation_id}`; see `igs endpoints`"))?;
            for name in endpoint.path_params() {
                let supplied = path.iter().any(|(k, _)| k == name);
                let from_config = name == crate::endpoints::PROJECT_ID_PARAM
                    && client.config().project_id.is_some();
                if !supplied && !from_config {
                    return Err(anyhow!("missing path argument `{name}` (use -p {name}=VALUE)"));
                }
            }
            if endpoint.has_body && body.is_none() {
                return Err(anyhow!("`{operation_id}` requires --body"));
            }

            let mut args = EndpointArgs::new();
            for (name, value) in path {
                args = args.path(name, value);
            }
            for (name, value) in query {
                args = args.query(name, Some(value));
            }
            if let Some(body) = body {
                let value: Value = serde_json::from_str(&body).context("--body is not valid JSON")?;
                args = args.json(&value)?;
            }

            let scoped = client.clone();
            let result = client.run_scoped(move || scoped.call(&operation_id, args), None)?;
            let value = result?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("item_sku=big_rocket"),
            Ok(("item_sku".to_string(), "big_rocket".to_string()))
        );
        assert_eq!(
            parse_key_value("promo_code=a=b"),
            Ok(("promo_code".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[test]
    fn test_call_arguments_parse() {
        let cli = Cli::try_parse_from([
            "igs",
            "call",
            "get_virtual_items",
            "-q",
            "limit=5",
            "-p",
            "project_id=44056",
            "--retry-count",
            "3",
        ])
        .expect("valid command line");
        match cli.command {
            Commands::Call {
                operation_id,
                path,
                query,
                retry_count,
                retry_delay_ms,
                ..
            } => {
                assert_eq!(operation_id, "get_virtual_items");
                assert_eq!(path, vec![("project_id".to_string(), "44056".to_string())]);
                assert_eq!(query, vec![("limit".to_string(), "5".to_string())]);
                assert_eq!(retry_count, Some(3));
                assert_eq!(retry_delay_ms, 500);
            }
            Commands::Endpoints { .. } => panic!("expected call"),
        }
    }

    #[test]
    fn test_builtin_catalog_when_no_spec() {
        let catalog = load_catalog(None).expect("builtin");
        assert!(catalog.get("get_user_cart").is_some());
    }
}
