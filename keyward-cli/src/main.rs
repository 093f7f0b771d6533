//! Keyward CLI
//!
//! Command-line interface for reading and writing credentials in the OS
//! secure storage.
//!
//! # Usage
//!
//! ```bash
//! # Store a password
//! keyward set github octocat -p ghp_token
//! printf 'ghp_token\n' | keyward set github octocat --stdin
//!
//! # Read one password, or every credential of a service
//! keyward get github octocat
//! keyward get github
//!
//! # Delete a password
//! keyward delete github octocat -y
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyward_core::{BackendKind, CredentialStore, Secret};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

mod config;

#[derive(Parser)]
#[command(name = "keyward")]
#[command(about = "Get, set, and delete credentials in the OS keyring")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credential backend: keyring (default), auto, or memory
    #[arg(long, global = true, env = "KEYWARD_BACKEND")]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a password, or every credential of a service
    Get {
        /// Service name
        service: String,

        /// Account name; omit to list the whole service
        account: Option<String>,

        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Store a password
    Set {
        /// Service name
        service: String,

        /// Account name
        account: String,

        /// Password value
        #[arg(short, long)]
        password: Option<String>,

        /// Read the password from the first line of stdin
        #[arg(long, conflicts_with = "password")]
        stdin: bool,
    },

    /// Delete a password
    Delete {
        /// Service name
        service: String,

        /// Account name
        account: String,

        /// Confirm the deletion
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Find a password by `service/account` or a bare service name
    Find {
        /// Combined search key
        key: String,
    },

    /// List the account names stored under a service
    List {
        /// Service name
        service: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    init_logging(cli.verbose, &config.log_level);
    debug!(path = ?config.config_path, backend = %config.backend, "loaded configuration");

    let store = CredentialStore::from_kind(config.backend, &config.index_namespace)
        .context("Failed to open credential backend")?;
    if let Some(note) = persistence_note(&store) {
        eprintln!("{}", note);
    }

    match cli.command {
        Commands::Get { service, account: Some(account), json } => {
            get_password(&store, &service, &account, json).await
        }
        Commands::Get { service, account: None, .. } => {
            get_service(&store, &service).await
        }
        Commands::Set { service, account, password, stdin } => {
            let password = if stdin {
                Some(read_stdin_password()?)
            } else {
                password.map(Secret::new)
            };
            set_password(&store, &service, &account, password).await
        }
        Commands::Delete { service, account, yes } => {
            delete_password(&store, &service, &account, yes).await
        }
        Commands::Find { key } => find_password(&store, &key).await,
        Commands::List { service } => list_accounts(&store, &service).await,
    }
}

/// Warning to show when the resolved backend keeps nothing after exit,
/// whether memory was requested or `auto` fell back to it.
fn persistence_note(store: &CredentialStore) -> Option<&'static str> {
    (store.backend_name() == "memory")
        .then_some("note: using in-memory storage; nothing will be persisted")
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read one line from stdin, dropping only the line terminator.
fn read_stdin_password() -> Result<Secret> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Secret::new(line))
}

async fn get_password(
    store: &CredentialStore,
    service: &str,
    account: &str,
    json: bool,
) -> Result<ExitCode> {
    let password = store
        .get_password(service, account)
        .await
        .with_context(|| format!("Failed to get password for {}/{}", service, account))?;

    let Some(password) = password else {
        eprintln!("No password stored for {}/{}", service, account);
        return Ok(ExitCode::FAILURE);
    };

    if json {
        let output = serde_json::json!({
            "service": service,
            "account": account,
            "password": password.expose(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", password.expose());
    }
    Ok(ExitCode::SUCCESS)
}

async fn get_service(store: &CredentialStore, service: &str) -> Result<ExitCode> {
    let records = store
        .find_credentials(service)
        .await
        .with_context(|| format!("Failed to list credentials for {}", service))?;

    let output: BTreeMap<&str, &str> = records
        .iter()
        .map(|record| (record.account.as_str(), record.password.expose()))
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

async fn set_password(
    store: &CredentialStore,
    service: &str,
    account: &str,
    password: Option<Secret>,
) -> Result<ExitCode> {
    store
        .set_password(service, account, password.as_ref().map(Secret::expose))
        .await
        .with_context(|| format!("Failed to set password for {}/{}", service, account))?;
    Ok(ExitCode::SUCCESS)
}

async fn delete_password(
    store: &CredentialStore,
    service: &str,
    account: &str,
    yes: bool,
) -> Result<ExitCode> {
    if !yes {
        eprintln!(
            "Refusing to delete {}/{} without confirmation; pass -y to confirm",
            service, account
        );
        return Ok(ExitCode::FAILURE);
    }

    let deleted = store
        .delete_password(service, account)
        .await
        .with_context(|| format!("Failed to delete password for {}/{}", service, account))?;
    if deleted {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("No password stored for {}/{}", service, account);
        Ok(ExitCode::FAILURE)
    }
}

async fn find_password(store: &CredentialStore, key: &str) -> Result<ExitCode> {
    match store
        .find_password(key)
        .await
        .with_context(|| format!("Failed to find password for {}", key))?
    {
        Some(password) => {
            println!("{}", password.expose());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No single password matches {}", key);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn list_accounts(store: &CredentialStore, service: &str) -> Result<ExitCode> {
    let mut accounts: Vec<String> = store
        .find_credentials(service)
        .await
        .with_context(|| format!("Failed to list credentials for {}", service))?
        .into_iter()
        .map(|record| record.account)
        .collect();
    accounts.sort();

    for account in accounts {
        println!("{}", account);
    }
    Ok(ExitCode::SUCCESS)
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
    fn test_parse_set_with_password() {
        let cli = Cli::try_parse_from(["keyward", "set", "svc", "acct", "-p", "pw"]).unwrap();
        match cli.command {
            Commands::Set { service, account, password, stdin } => {
                assert_eq!(service, "svc");
                assert_eq!(account, "acct");
                assert_eq!(password.as_deref(), Some("pw"));
                assert!(!stdin);
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn test_parse_set_password_conflicts_with_stdin() {
        let result = Cli::try_parse_from(["keyward", "set", "svc", "acct", "-p", "pw", "--stdin"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_backend_flag() {
        let cli = Cli::try_parse_from(["keyward", "--backend", "memory", "list", "svc"]).unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Memory));

        assert!(Cli::try_parse_from(["keyward", "--backend", "vault", "list", "svc"]).is_err());
    }

    #[test]
    fn test_parse_get_without_account() {
        let cli = Cli::try_parse_from(["keyward", "get", "svc"]).unwrap();
        assert!(matches!(cli.command, Commands::Get { account: None, .. }));
    }

    #[test]
    fn test_parse_empty_identity_fields() {
        let cli = Cli::try_parse_from(["keyward", "delete", "", "acct", "-y"]).unwrap();
        match cli.command {
            Commands::Delete { service, account, yes } => {
                assert_eq!(service, "");
                assert_eq!(account, "acct");
                assert!(yes);
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn test_memory_backend_gets_persistence_note() {
        let store = CredentialStore::from_kind(BackendKind::Memory, "keyward-test").unwrap();
        assert!(persistence_note(&store).is_some());
    }

    #[test]
    fn test_auto_fallback_gets_persistence_note() {
        // Whichever backend auto resolves to, memory is always flagged
        let store = CredentialStore::from_kind(BackendKind::Auto, "keyward-test").unwrap();
        assert_eq!(persistence_note(&store).is_some(), store.backend_name() == "memory");
    }

    #[tokio::test]
    async fn test_set_without_password_is_rejected() {
        let store = CredentialStore::from_kind(BackendKind::Memory, "keyward-test").unwrap();
        let result = set_password(&store, "svc", "acct", None).await;
        assert!(result.is_err());
        assert!(store.get_password("svc", "acct").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let store = CredentialStore::from_kind(BackendKind::Memory, "keyward-test").unwrap();
        store.set_password("svc", "acct", Some("pw")).await.unwrap();

        let code = delete_password(&store, "svc", "acct", false).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
        assert!(store.get_password("svc", "acct").await.unwrap().is_some());

        let code = delete_password(&store, "svc", "acct", true).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(store.get_password("svc", "acct").await.unwrap().is_none());
    }
}
