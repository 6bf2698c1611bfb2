//! CLI commands

use anyhow::{Result, bail};
use clap::Subcommand;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info};
use vetdesk_core::token::{ExpiryHint, decode_unverified_claims, now_timestamp, unverified_expiry_hint};
use vetdesk_core::{CredentialStore, FileCredentialStore, UserProfile};
use vetdesk_http::client::auth::RegisterRequest;
use vetdesk_http::{ApiClient, ClientConfig, QueryParams, SessionEvent};

/// Everything a command needs: the configured gateway and the store behind it
pub struct Context {
    pub client: ApiClient,
    pub store: Arc<FileCredentialStore>,
    pub config: ClientConfig,
}

impl Context {
    pub fn new(config: ClientConfig, data_dir: &Path) -> Result<Self> {
        let store = Arc::new(FileCredentialStore::in_dir(data_dir));
        debug!(path = %store.path().display(), "Using credential file");
        let client = config.builder(store.clone()).build()?;
        Ok(Self {
            client,
            store,
            config,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long, env = "VETDESK_EMAIL")]
        email: String,

        /// Read from stdin when not given
        #[arg(long, env = "VETDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and store the session
    Register {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        phone: Option<String>,

        /// Read from stdin when not given
        #[arg(long, env = "VETDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the session on the server and forget local credentials
    Logout,

    /// Show the signed-in user
    Whoami {
        /// Print the stored profile without contacting the server
        #[arg(long)]
        cached: bool,
    },

    /// Show the local session state
    Status,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// GET an API path and print the JSON response
    Get {
        /// Path relative to the base URL, e.g. /animals/
        path: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_parser = parse_key_val)]
        query: Vec<(String, String)>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as JSON
    Show,
}

impl Commands {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Login { email, password } => login(ctx, email, password).await,
            Self::Register {
                email,
                name,
                phone,
                password,
            } => register(ctx, email, name, phone, password).await,
            Self::Logout => {
                ctx.client.logout().await;
                println!("Logged out");
                Ok(())
            }
            Self::Whoami { cached } => whoami(ctx, cached).await,
            Self::Status => {
                status(ctx);
                Ok(())
            }
            Self::Refresh => {
                ctx.client.refresh_session().await?;
                println!("Session refreshed");
                Ok(())
            }
            Self::Get { path, query } => get(ctx, &path, query).await,
            Self::Config { command } => command.execute(ctx),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Show => {
                println!("{}", serde_json::to_string_pretty(&ctx.config)?);
                Ok(())
            }
        }
    }
}

/// Reason of the first `Expired` event still queued, if any
pub fn session_expired(events: &mut broadcast::Receiver<SessionEvent>) -> Option<String> {
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Expired { reason }) => return Some(reason),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
        }
    }
}

async fn login(ctx: &Context, email: String, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password)?;
    let session = ctx.client.login(email, password).await?;

    match session.user {
        Some(user) => println!("Logged in as {}", describe(&user)),
        None => println!("Logged in"),
    }
    Ok(())
}

async fn register(
    ctx: &Context,
    email: String,
    name: String,
    phone: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let request = RegisterRequest {
        email,
        password: password_or_prompt(password)?,
        name,
        phone,
    };
    let session = ctx.client.register(&request).await?;
    info!(email = %request.email, "Account registered");

    match session.user {
        Some(user) => println!("Registered and logged in as {}", describe(&user)),
        None => println!("Registered and logged in"),
    }
    Ok(())
}

async fn whoami(ctx: &Context, cached: bool) -> Result<()> {
    let user = if cached {
        match ctx.store.user() {
            Some(user) => user,
            None => bail!("no stored profile; run `vetdesk login` first"),
        }
    } else {
        if ctx.store.access_token().is_none() {
            bail!("not logged in; run `vetdesk login` first");
        }
        ctx.client.current_user().await?
    };

    println!("{}", describe(&user));
    Ok(())
}

fn status(ctx: &Context) {
    let store = &ctx.store;
    println!("Server:        {}", ctx.client.base_url());
    println!("Credentials:   {}", store.path().display());

    let Some(access) = store.access_token() else {
        println!("Session:       none");
        return;
    };

    let state = if store.is_authenticated() {
        "active"
    } else {
        "stale"
    };
    println!("Session:       {state}");

    let now = now_timestamp();
    match unverified_expiry_hint(&access, now) {
        ExpiryHint::Valid { expires_at } => {
            println!("Access token:  expires in {}s (unverified)", expires_at - now);
        }
        ExpiryHint::Expired => println!("Access token:  expired (unverified)"),
        ExpiryHint::Unknown => println!("Access token:  opaque, expiry unknown"),
    }
    if let Some(subject) = decode_unverified_claims(&access)
        .as_ref()
        .and_then(|claims| claims.subject().map(str::to_owned))
    {
        println!("Token subject: {subject}");
    }

    println!(
        "Refresh token: {}",
        if store.refresh_token().is_some() {
            "present"
        } else {
            "missing"
        }
    );
    if let Some(user) = store.user() {
        println!("User:          {}", describe(&user));
    }
}

async fn get(ctx: &Context, path: &str, query: Vec<(String, String)>) -> Result<()> {
    let params: QueryParams = query.into_iter().collect();
    let mut request = ctx.client.get(path);
    if !params.is_empty() {
        request = request.query(&params);
    }

    let body: serde_json::Value = ctx.client.execute(request).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn describe(user: &UserProfile) -> String {
    format!("{} <{}> ({})", user.name, user.email, user.role)
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password is required");
    }
    Ok(password)
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{s}`"))
}
