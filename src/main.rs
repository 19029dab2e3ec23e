use std::{process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use portal_gate::{
    ApiRequest, AppState, Env, FileSessionStore, GateConfig, Right, SessionRecord,
    session::{Rights, SessionState, SessionStore},
};
use reqwest::{
    Method,
    header::{HeaderName, HeaderValue},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portal-gate")]
#[command(about = "Authenticated request pipeline and route guard for the portal client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request through the interceptor pipeline and print the result
    Request {
        /// HTTP method (GET, POST, ...)
        #[arg(value_parser = parse_method)]
        method: Method,

        /// Path relative to the API base URL, query string allowed
        target: String,

        /// JSON body
        #[arg(long)]
        json: Option<String>,

        /// Extra header as `Name: value`; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Run a navigation through the route guard and print where it settles
    Navigate {
        path: String,
    },
    /// Inspect or modify the stored session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print the stored session
    Show,
    /// Remove the stored session
    Clear,
    /// Store a session the way the login flow would
    Login {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        login: Option<String>,
        /// Display name
        #[arg(long)]
        fio: Option<String>,
        /// Granted right, by its backend name; repeatable
        #[arg(long = "right")]
        rights: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let config = match GateConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.env);
    tracing::debug!(env = ?config.env, base_url = %config.api_base_url, "configuration loaded");

    let session = Arc::new(FileSessionStore::new(&config.session_dir)) as SessionState;
    let cli = Cli::parse();

    let state = match AppState::build(config, session) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("failed to build HTTP client: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Request {
            method,
            target,
            json,
            headers,
        } => send(&state, method, &target, json, headers).await,
        Commands::Navigate { path } => {
            let navigation = state.router.push(&path);
            for step in &navigation.trail {
                println!("{} -> {:?}", step.path, step.decision);
            }
            println!("settled at {}", navigation.path);
            ExitCode::SUCCESS
        }
        Commands::Session { action } => session_command(state.session.as_ref(), action),
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(env: Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portal_gate=debug".into());

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn send(
    state: &AppState,
    method: Method,
    target: &str,
    json: Option<String>,
    headers: Vec<String>,
) -> ExitCode {
    let mut request = ApiRequest::new(method, target);

    for raw in headers {
        match parse_header(&raw) {
            Some((name, value)) => request = request.header(name, value),
            None => {
                eprintln!("invalid header: {raw:?}");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Some(body) = json {
        match serde_json::from_str(&body) {
            Ok(value) => request = request.json(value),
            Err(e) => {
                eprintln!("invalid JSON body: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    match state.client.send(request).await {
        Ok(response) => {
            println!("{}", response.text());
            ExitCode::SUCCESS
        }
        Err(error) => {
            println!("{}", serde_json::to_string_pretty(&error).unwrap_or(error.message));
            ExitCode::FAILURE
        }
    }
}

fn session_command(store: &dyn SessionStore, action: SessionAction) -> ExitCode {
    match action {
        SessionAction::Show => {
            match store.read_session() {
                Some(session) => match serde_json::to_string_pretty(&session) {
                    Ok(encoded) => println!("{encoded}"),
                    Err(e) => eprintln!("failed to encode session: {e}"),
                },
                None => println!("no session"),
            }
            ExitCode::SUCCESS
        }
        SessionAction::Clear => {
            store.clear_session();
            ExitCode::SUCCESS
        }
        SessionAction::Login {
            token,
            login,
            fio,
            rights,
        } => {
            let mut granted = Rights::default();
            for name in rights {
                match Right::from_wire(&name) {
                    Some(right) => granted = granted.with(right, true),
                    None => {
                        eprintln!("unknown right: {name}");
                        return ExitCode::FAILURE;
                    }
                }
            }

            let session = SessionRecord {
                token,
                login,
                fio,
                rights: granted,
            };
            match store.write_session(&session) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("failed to store session: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_uppercase().as_bytes()).map_err(|e| e.to_string())
}

fn parse_header(raw: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = raw.split_once(':')?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((name, value))
}
