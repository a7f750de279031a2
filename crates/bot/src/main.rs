mod health;
mod logging;
mod plugins;

use core::time::Duration;
use std::{
    fs,
    io::IsTerminal as _,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result, anyhow};
use clap::Parser;
use matrix_sdk::{
    Client, SessionMeta,
    authentication::{SessionTokens, matrix::MatrixSession},
    config::SyncSettings,
    room::Room,
    ruma::events::room::{
        member::{MembershipState, StrippedRoomMemberEvent},
        message::{MessageType, OriginalSyncRoomMessageEvent},
    },
};
use plugin_core::{
    PluginContext, PluginRegistry, PluginSpec, RoleCatalog, RoleDef, RoomMessageMeta,
    normalize_cmd, truncate,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use trigger_store::{JsonFile, MatchEngine, MatchMode, TriggerStore};

use crate::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "trigger-bot",
    version,
    about = "Matrix bot that answers trigger words and hands out roles"
)]
struct Args {
    /// Homeserver base URL, e.g. `https://matrix-client.matrix.org`.
    #[arg(long, env = "MATRIX_HOMESERVER")]
    homeserver: String,

    /// Username (localpart or full user ID)
    #[arg(long, env = "MATRIX_USERNAME")]
    username: String,

    /// Password (if omitted, will prompt if needed)
    #[arg(long, env = "MATRIX_PASSWORD")]
    password: Option<String>,

    /// Directory for persistent state (encryption keys, sync cache)
    #[arg(long, env = "MATRIX_STORE", default_value = "./bot-store")]
    store: PathBuf,

    /// JSON session file for access token/device info
    #[arg(long, env = "MATRIX_SESSION_FILE", default_value = "./session.json")]
    session_file: PathBuf,

    /// Device display name
    #[arg(long, env = "MATRIX_DEVICE_NAME", default_value = "trigger-bot")]
    device_name: String,

    /// Path to YAML config (roles, managers, match mode, footer)
    #[arg(long, env = "MATRIX_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// JSON file holding autoresponders and role words
    #[arg(long, env = "TRIGGERS_FILE", default_value = "./data.json")]
    triggers_file: PathBuf,

    /// Listen address for the liveness endpoint
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    health_addr: SocketAddr,

    /// Do not start the liveness endpoint
    #[arg(long)]
    no_health: bool,

    /// Disable auto-joining rooms when invited
    #[arg(long)]
    no_autojoin: bool,

    /// Sync timeout in milliseconds
    #[arg(long, env = "MATRIX_SYNC_TIMEOUT_MS", default_value_t = 30000)]
    sync_timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user_id: String,
    device_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BotConfig {
    match_mode: MatchMode,
    footer: Option<String>,
    roles: Vec<RoleDef>,
    /// Users allowed to change triggers; empty means everyone.
    managers: Vec<String>,
    /// Senders treated like bots: never dispatched, never matched.
    ignore_users: Vec<String>,
    #[serde(alias = "tools")]
    plugins: Vec<PluginSpec>,
}

/// State every message handler invocation shares.
#[derive(Debug, Clone)]
struct Shared {
    registry: Arc<PluginRegistry>,
    triggers: Arc<TriggerStore>,
    roles: Arc<RoleCatalog>,
    engine: MatchEngine,
    footer: Option<Arc<str>>,
    managers: Arc<[String]>,
    ignore_users: Arc<[String]>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so it can feed RUST_LOG as well as clap's env fallbacks.
    let _ = dotenvy::dotenv();
    init_tracing()?;
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let triggers = TriggerStore::open(JsonFile::new(&args.triggers_file))
        .await
        .with_context(|| format!("loading triggers from {}", args.triggers_file.display()))?;
    let engine = MatchEngine::new(config.match_mode);
    let roles = RoleCatalog::new(config.roles);
    info!(
        match_mode = ?engine.mode(),
        roles = roles.roles().len(),
        managers = config.managers.len(),
        "Trigger engine ready"
    );

    if !args.no_health {
        let addr = args.health_addr;
        tokio::spawn(async move {
            if let Err(e) = health::serve(addr).await {
                warn!(error = %e, "Liveness endpoint failed");
            }
        });
    }

    fs::create_dir_all(&args.store)
        .with_context(|| format!("creating store directory at {}", args.store.display()))?;

    // Build client with SQLite store to persist E2EE state
    let client = Client::builder()
        .homeserver_url(&args.homeserver)
        .handle_refresh_tokens()
        .sqlite_store(&args.store, None)
        .build()
        .await
        .context("building matrix client")?;

    login(&client, &args).await?;

    let registry = plugins::build_registry(&config.plugins).await;
    info!(commands = ?registry.commands().await, "Registered plugin commands");

    let shared = Shared {
        registry,
        triggers: Arc::new(triggers),
        roles: Arc::new(roles),
        engine,
        footer: config.footer.as_deref().map(Arc::from),
        managers: config.managers.into(),
        ignore_users: config.ignore_users.into(),
    };

    // Auto-join handler for invites
    if !args.no_autojoin {
        client.add_event_handler(
            async move |ev: StrippedRoomMemberEvent, room: Room, client: Client| {
                if ev.content.membership != MembershipState::Invite {
                    return;
                }
                let Some(own_id) = client.user_id() else {
                    return;
                };
                if ev.state_key != own_id.as_str() {
                    return;
                }
                info!(room_id = %room.room_id(), "Auto-joining invited room");
                if let Err(e) = room.join().await {
                    warn!(error = %e, "Failed to accept invite");
                }
            },
        );
    }

    // Catch up before listening so history from the initial sync is not
    // replayed as fresh commands and triggers.
    let initial = client
        .sync_once(SyncSettings::default())
        .await
        .context("initial sync")?;
    info!(next_batch = %initial.next_batch, "Initial sync done; skipping backlog");

    client.add_event_handler(
        move |ev: OriginalSyncRoomMessageEvent, room: Room, client: Client| {
            let shared = shared.clone();
            async move { handle_message(ev, room, client, shared).await }
        },
    );

    info!(
        timeout_ms = args.sync_timeout_ms,
        "Starting sync… Press Ctrl+C to stop."
    );
    let settings = SyncSettings::new()
        .timeout(Duration::from_millis(args.sync_timeout_ms))
        .token(initial.next_batch);
    client
        .sync(settings)
        .await
        .map_err(|e| anyhow!("sync terminated: {e}"))
}

async fn handle_message(
    ev: OriginalSyncRoomMessageEvent,
    room: Room,
    client: Client,
    shared: Shared,
) {
    let Some(own_id) = client.user_id() else {
        return;
    };
    let body_opt = match &ev.content.msgtype {
        MessageType::Text(t) => Some(t.body.as_str()),
        MessageType::Notice(n) => Some(n.body.as_str()),
        MessageType::Audio(_)
        | MessageType::Emote(_)
        | MessageType::File(_)
        | MessageType::Image(_)
        | MessageType::Location(_)
        | MessageType::ServerNotice(_)
        | MessageType::Video(_)
        | MessageType::VerificationRequest(_)
        | _ => None,
    };
    info!(
        room_id = %room.room_id(),
        sender = %ev.sender,
        body = ?body_opt.map(|b| truncate(b, 200)),
        "Incoming message"
    );

    let from_bot = ev.sender == own_id || is_ignored(&shared.ignore_users, ev.sender.as_str());
    let base_ctx = PluginContext {
        client: client.clone(),
        room: room.clone(),
        sender: ev.sender.clone(),
        trigger: None,
        registry: Arc::clone(&shared.registry),
        triggers: Arc::clone(&shared.triggers),
        roles: Arc::clone(&shared.roles),
        engine: shared.engine,
        footer: shared.footer.clone(),
        managers: Arc::clone(&shared.managers),
    };

    // !command
    let mut command: Option<String> = None;
    if !from_bot
        && let Some(body) = body_opt.map(str::trim)
        && body.starts_with('!')
    {
        let (cmd, args_raw) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let token = normalize_cmd(cmd);
        if let Some(entry) = shared.registry.entry_by_command(&token).await {
            let plugin_id = entry.spec.id.clone();
            info!(cmd = %token, plugin = %plugin_id, "Parsed command token");
            if shared.registry.is_enabled(&plugin_id).await {
                let ctx = PluginContext {
                    trigger: Some(token.clone()),
                    ..base_ctx.clone()
                };
                if let Err(e) = entry.plugin.run(&ctx, args_raw.trim(), &entry.spec).await {
                    warn!(error = %e, plugin = %plugin_id, "Plugin failed");
                }
            } else {
                info!(plugin = %plugin_id, "Plugin disabled");
            }
            command = Some(token);
        }
    }

    let meta = RoomMessageMeta {
        body: body_opt,
        command: command.as_deref(),
        from_bot,
    };

    // Passive plugins (trigger matching)
    for (plugin_id, entry) in shared.registry.entries().await {
        if !entry.plugin.handles_room_messages() {
            continue;
        }
        if !shared.registry.is_enabled(&plugin_id).await {
            continue;
        }
        if let Err(e) = entry
            .plugin
            .on_room_message(&base_ctx, &ev, &entry.spec, &meta)
            .await
        {
            warn!(error = %e, plugin = %plugin_id, "Plugin on_room_message failed");
        }
    }
}

fn is_ignored(ignore_users: &[String], sender: &str) -> bool {
    ignore_users.iter().any(|u| u.eq_ignore_ascii_case(sender))
}

async fn login(client: &Client, args: &Args) -> Result<()> {
    // Restore session if available; otherwise login
    if let Some(session) = load_session(&args.session_file)? {
        info!("Restoring session for {}", session.user_id);
        let matrix_session = MatrixSession {
            meta: SessionMeta {
                user_id: session.user_id.parse().context("invalid stored user_id")?,
                device_id: session.device_id.into(),
            },
            tokens: SessionTokens {
                access_token: session.access_token,
                refresh_token: session.refresh_token,
            },
        };
        client
            .restore_session(matrix_session)
            .await
            .context("restoring session")?;
        return Ok(());
    }

    // Treat empty env/arg as missing; avoid prompting in non-interactive (Docker) mode.
    let password = if let Some(p) = args
        .password
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        p.to_owned()
    } else {
        if !std::io::stdin().is_terminal() {
            return Err(anyhow!(
                "No MATRIX_PASSWORD provided and no stored session. In Docker/non-interactive mode, set MATRIX_PASSWORD env or mount an existing session at {}",
                args.session_file.display()
            ));
        }
        warn!("No password provided via --password or MATRIX_PASSWORD. Prompting...");
        #[cfg(feature = "rpassword")]
        {
            rpassword::prompt_password("Matrix password:")
                .map_err(|e| anyhow!("Failed to read password: {e}"))?
        }
        #[cfg(not(feature = "rpassword"))]
        {
            return Err(anyhow!(
                "rpassword feature is not enabled. Cannot prompt for password."
            ));
        }
    };

    info!("Logging in as {}", args.username);
    let response = client
        .matrix_auth()
        .login_username(&args.username, &password)
        .initial_device_display_name(&args.device_name)
        .request_refresh_token()
        .send()
        .await
        .context("login failed")?;

    // Save session for future runs
    let session = SavedSession {
        access_token: response.access_token.clone(),
        refresh_token: response.refresh_token.clone(),
        user_id: response.user_id.to_string(),
        device_id: response.device_id.to_string(),
    };
    save_session(&args.session_file, &session)?;
    info!(
        "Logged in: user={} device={}",
        session.user_id, session.device_id
    );
    Ok(())
}

fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "config file not found at {}. Create one or set --config",
            path.display()
        ));
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    parse_config(&yaml)
}

fn parse_config(yaml: &str) -> Result<BotConfig> {
    // An empty file deserializes to YAML null; treat it as all defaults.
    if yaml.trim().is_empty() {
        return Ok(BotConfig::default());
    }
    serde_yaml::from_str(yaml).context("parsing YAML config")
}

fn load_session(path: &Path) -> Result<Option<SavedSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading session file at {}", path.display()))?;
    let session: SavedSession = serde_json::from_str(&data).context("parsing session JSON")?;
    Ok(Some(session))
}

fn save_session(path: &Path, session: &SavedSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(session)?;
    fs::write(path, data).with_context(|| format!("writing session file at {}", path.display()))?;
    Ok(())
}
