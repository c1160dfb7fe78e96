//! keeper — operational tooling for the account/vault/key protocol.
//!
//! Usage:
//!   keeper serve
//!   keeper register --username <name> --password <pass>
//!   keeper sync
//!   keeper add --name <name> --description <desc> --text <text>
//!   keeper get <name>
//!   keeper list
//!   keeper delete <name>

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use keeper_secrets::Secret;
use keeper_store::StorageBackend;

const DEFAULT_WEB_ADDRESS: &str = "0.0.0.0:8443";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let result: Result<(), Box<dyn std::error::Error>> = match args[1].as_str() {
        "serve" => cmd_serve().await,
        "register" => cmd_register(&args[2..]).await,
        "sync" => cmd_sync().await,
        "add" => cmd_add(&args[2..]).await,
        "get" => cmd_get(&args[2..]).await,
        "list" => cmd_list().await,
        "delete" => cmd_delete(&args[2..]).await,
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("keeper {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{cmd}'");
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "keeper_cli=info,keeper_server=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn print_usage() {
    eprintln!(
        r#"keeper — multi-device encrypted secret keeper

USAGE:
    keeper <COMMAND> [OPTIONS]

COMMANDS:
    serve                                       Run the account/vault/key API server
    register --username <n> --password <p>      Create an account on the configured remote
    sync                                        Sign in, catch up, and stream notifications
    add --name <n> --description <d> --text <t> Add a free-text secret and save the vault
    get <name>                                  Print a secret by name
    list                                        List secret names and descriptions
    delete <name>                               Remove a secret and save the vault

ENVIRONMENT:
    WEB_ADDRESS           Listen address for `serve` (default {DEFAULT_WEB_ADDRESS})
    DSN_ADDRESS           Postgres DSN for `serve`; in-memory store if unset
    KEEPER_REMOTE_USERNAME, KEEPER_REMOTE_PASSWORD, KEEPER_REMOTE_URL
    KEEPER_PGP_PASSPHRASE Passphrase locking the local device key (required by all client commands)

OPTIONS:
    -h, --help       Print help
    -V, --version    Print version
"#
    );
}

async fn cmd_serve() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = std::env::var("WEB_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_WEB_ADDRESS.into())
        .parse()
        .map_err(|_| "WEB_ADDRESS is not a valid socket address")?;

    let store: Arc<dyn StorageBackend> = match std::env::var("DSN_ADDRESS") {
        Ok(dsn) => {
            tracing::info!("connecting to postgres store");
            let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(&dsn).await?;
            Arc::new(keeper_store::PostgresBackend::new(pool))
        }
        Err(_) => {
            tracing::warn!("DSN_ADDRESS not set, using in-memory store");
            Arc::new(keeper_store::InMemoryBackend::new())
        }
    };

    keeper_server::serve(addr, store).await
}

fn parse_flags(args: &[String], known: &[&str]) -> Result<std::collections::HashMap<String, String>, String> {
    let mut out = std::collections::HashMap::new();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].trim_start_matches("--");
        if !known.contains(&flag) {
            return Err(format!("unknown option: {}", args[i]));
        }
        i += 1;
        let value = args.get(i).ok_or_else(|| format!("missing value for --{flag}"))?;
        out.insert(flag.to_string(), value.clone());
        i += 1;
    }
    Ok(out)
}

async fn cmd_register(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let flags = parse_flags(args, &["username", "password"])?;
    let username = flags.get("username").ok_or("missing --username")?;
    let password = flags.get("password").ok_or("missing --password")?;

    let passphrase = keeper_client::Config::pgp_passphrase().ok_or("KEEPER_PGP_PASSPHRASE is not set")?;
    let config = keeper_client::Config::load(DEFAULT_CONFIG_PATH);
    if !config.is_client_server() {
        return Err("KEEPER_REMOTE_URL (or remote-http in config.json) must be set to register".into());
    }

    let keyring = keeper_keyring::Keyring::bootstrap("openpgp", &passphrase)?;
    let transport = keeper_client::HttpTransport::new(config.remote_http.clone())?;
    transport.signup(username, password, &keyring.my_public_key()).await?;

    eprintln!("registered '{username}'; run `keeper sync` to sign in from this device");
    Ok(())
}

async fn cmd_sync() -> Result<(), Box<dyn std::error::Error>> {
    let mut client = keeper_client::Client::bootstrap(DEFAULT_CONFIG_PATH).await?;
    match client.connect().await? {
        keeper_client::SigninOutcome::Trusted => {}
        keeper_client::SigninOutcome::PendingConfirmation => {
            eprintln!("this device's key is registered but not yet confirmed by another device");
            return Ok(());
        }
        keeper_client::SigninOutcome::UnknownKeyRegistered => {
            eprintln!("this device's key was just registered; confirm it from an already-trusted device");
            return Ok(());
        }
    }

    let Some(mut notifications) = client.open_notifications() else {
        eprintln!("standalone mode: nothing to sync");
        return Ok(());
    };
    eprintln!("synced, listening for notifications (ctrl-c to stop)");

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                match notification {
                    Ok(n) => eprintln!("{}", keeper_client::Client::describe_notification(&n)),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Bootstraps the local vault/keyring and, in client-server mode, signs in.
/// Fails fast on the two "wait for another device" outcomes rather than
/// operating on a vault the server hasn't caught this device up on yet.
async fn bootstrap_connected() -> Result<keeper_client::Client, Box<dyn std::error::Error>> {
    let mut client = keeper_client::Client::bootstrap(DEFAULT_CONFIG_PATH).await?;
    match client.connect().await? {
        keeper_client::SigninOutcome::Trusted => Ok(client),
        keeper_client::SigninOutcome::PendingConfirmation => {
            Err("this device's key is registered but not yet confirmed by another device".into())
        }
        keeper_client::SigninOutcome::UnknownKeyRegistered => {
            Err("this device's key was just registered; confirm it from an already-trusted device first".into())
        }
    }
}

async fn cmd_add(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let flags = parse_flags(args, &["name", "description", "text"])?;
    let name = flags.get("name").ok_or("missing --name")?;
    let description = flags.get("description").cloned().unwrap_or_default();
    let text = flags.get("text").ok_or("missing --text")?;

    let client = bootstrap_connected().await?;
    client.vault().insert(name.clone(), description, Secret::free_text(text.clone())).await;
    client.save().await?;
    eprintln!("saved '{name}'");
    Ok(())
}

async fn cmd_get(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.first().ok_or("missing secret name")?;
    let client = bootstrap_connected().await?;
    match client.vault().get(name).await {
        Some(secret) => {
            println!("{secret:?}");
            Ok(())
        }
        None => Err(format!("no such secret: {name}").into()),
    }
}

async fn cmd_list() -> Result<(), Box<dyn std::error::Error>> {
    let client = bootstrap_connected().await?;
    let mut entries: Vec<(String, String)> = client.vault().list().await.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, description) in entries {
        println!("{name}\t{description}");
    }
    Ok(())
}

async fn cmd_delete(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let name = args.first().ok_or("missing secret name")?;
    let client = bootstrap_connected().await?;
    client.vault().delete(name).await;
    client.save().await?;
    eprintln!("deleted '{name}'");
    Ok(())
}
