//! Paynode CLI
//!
//!   paynode serve                     → HTTP server (batches, ledger, sign-in)
//!   paynode process <file>            → Disburse one payroll file, print BatchResult
//!   paynode list [prefix] [--limit N] → Ledger records, oldest first
//!   paynode challenge <address>       → Ask a running node for a sign-in challenge
//!
//! Configuration precedence: flags, then `PAYNODE_*` environment, then `.env`.
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, bail, Context};
use paynode::logging::init_logging;
use paynode::runtime::{spawn_challenge_sweeper, CHALLENGE_SWEEP_INTERVAL};
use paynode::server::NodeClient;
use paynode::{create_router, install_signal_handlers, ledger, LedgerKind, Node, NodeConfig, SecretSource};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("paynode {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let Some(command) = opts.command.clone() else {
        print_usage();
        return;
    };

    let result = tokio::runtime::Runtime::new()
        .context("failed to create runtime")
        .and_then(|rt| {
            rt.block_on(async {
                match command.as_str() {
                    "serve" => cmd_serve(&opts).await,
                    "process" => cmd_process(&opts).await,
                    "list" | "ls" => cmd_list(&opts).await,
                    "challenge" => cmd_challenge(&opts).await,
                    other => Err(anyhow!("unknown command: {other}")),
                }
            })
        });

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{e:#}")}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    target: Option<String>,
    app: Option<String>,
    port: Option<u16>,
    data_dir: Option<String>,
    ledger: Option<String>,
    gateway_url: Option<String>,
    gateway_timeout_secs: Option<u64>,
    domain: Option<String>,
    secrets_file: Option<String>,
    concurrency: Option<usize>,
    max_attempts: Option<u32>,
    session_lifetime_secs: Option<u64>,
    limit: Option<usize>,
    server_url: Option<String>,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let next = args.get(i + 1).cloned();
            let mut takes_value = true;
            match arg.as_str() {
                "--help" | "-h" => { opts.help = true; takes_value = false }
                "--version" | "-V" => { opts.version = true; takes_value = false }
                "--json" => { opts.json = true; takes_value = false }
                "--pretty" => { opts.pretty = true; takes_value = false }
                "--app" | "-a" => opts.app = next,
                "--port" | "-p" => opts.port = next.and_then(|v| v.parse().ok()),
                "--data-dir" | "-d" => opts.data_dir = next,
                "--ledger" => opts.ledger = next,
                "--gateway" | "-g" => opts.gateway_url = next,
                "--gateway-timeout" => opts.gateway_timeout_secs = next.and_then(|v| v.parse().ok()),
                "--domain" => opts.domain = next,
                "--secrets-file" => opts.secrets_file = next,
                "--concurrency" | "-c" => opts.concurrency = next.and_then(|v| v.parse().ok()),
                "--max-attempts" => opts.max_attempts = next.and_then(|v| v.parse().ok()),
                "--session-lifetime" => opts.session_lifetime_secs = next.and_then(|v| v.parse().ok()),
                "--limit" | "-n" => opts.limit = next.and_then(|v| v.parse().ok()),
                "--server" | "-s" => opts.server_url = next,
                _ if !arg.starts_with('-') => { positional.push(arg.clone()); takes_value = false }
                _ => takes_value = false, // Ignore unknown flags
            }
            i += if takes_value { 2 } else { 1 };
        }

        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.target = positional.next();

        // Environment (lower priority than CLI args)
        let var = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());
        opts.app = opts.app.or_else(|| var("PAYNODE_APP"));
        opts.port = opts.port.or_else(|| var("PAYNODE_PORT").and_then(|s| s.parse().ok()));
        opts.data_dir = opts.data_dir.or_else(|| var("PAYNODE_DATA_DIR"));
        opts.ledger = opts.ledger.or_else(|| var("PAYNODE_LEDGER"));
        opts.gateway_url = opts.gateway_url.or_else(|| var("PAYNODE_GATEWAY_URL"));
        opts.gateway_timeout_secs = opts
            .gateway_timeout_secs
            .or_else(|| var("PAYNODE_GATEWAY_TIMEOUT_SECS").and_then(|s| s.parse().ok()));
        opts.domain = opts.domain.or_else(|| var("PAYNODE_DOMAIN"));
        opts.secrets_file = opts.secrets_file.or_else(|| var("PAYNODE_SECRETS_FILE"));
        opts.concurrency = opts.concurrency.or_else(|| var("PAYNODE_CONCURRENCY").and_then(|s| s.parse().ok()));
        opts.max_attempts = opts.max_attempts.or_else(|| var("PAYNODE_MAX_ATTEMPTS").and_then(|s| s.parse().ok()));
        opts.session_lifetime_secs = opts
            .session_lifetime_secs
            .or_else(|| var("PAYNODE_SESSION_LIFETIME_SECS").and_then(|s| s.parse().ok()));
        opts.server_url = opts.server_url.or_else(|| var("PAYNODE_SERVER_URL"));

        opts
    }

    fn node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = NodeConfig::new(self.app.clone().unwrap_or_else(|| "paynode".into()));
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(kind) = &self.ledger {
            let kind = LedgerKind::from_str(kind).ok_or_else(|| anyhow!("unknown ledger kind: {kind}"))?;
            config = config.with_ledger(kind);
        }
        if let Some(url) = &self.gateway_url {
            config = config.with_gateway_url(url);
        }
        if let Some(secs) = self.gateway_timeout_secs {
            config = config.with_gateway_timeout(Duration::from_secs(secs));
        }
        if let Some(domain) = &self.domain {
            config = config.with_domain(domain);
        }
        if let Some(path) = &self.secrets_file {
            config = config.with_secrets(SecretSource::File(path.into()));
        }
        if let Some(n) = self.concurrency {
            config = config.with_concurrency(n);
        }
        if let Some(n) = self.max_attempts {
            let backoff = config.engine.retry_backoff;
            config = config.with_retry(n, backoff);
        }
        if let Some(secs) = self.session_lifetime_secs {
            if secs == 0 {
                bail!("session lifetime must be positive");
            }
            config = config.with_session_lifetime(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn print_usage() {
    println!(
        r#"paynode - payroll disbursement node

USAGE:
    paynode <command> [target] [options]

COMMANDS:
    serve                       Start HTTP server
    process <file>              Disburse a payroll file (CSV or JSON)
    list [prefix]               List ledger records (prefix like 2026/10)
    challenge <address>         Request a sign-in challenge from a running node

OPTIONS:
    --app, -a <name>            Application name (env: PAYNODE_APP)
    --port, -p <port>           Server port (default: 8080, env: PAYNODE_PORT)
    --data-dir, -d <path>       Ledger root (env: PAYNODE_DATA_DIR)
    --ledger <file|memory>      Ledger backend (env: PAYNODE_LEDGER)
    --gateway, -g <url>         Signing gateway base URL (env: PAYNODE_GATEWAY_URL)
    --gateway-timeout <secs>    Per-call gateway timeout (default: 10)
    --domain <name>             Domain bound into challenges (env: PAYNODE_DOMAIN)
    --secrets-file <path>       JSON secrets file instead of PAYNODE_SECRET_* vars
    --concurrency, -c <n>       Gateway calls in flight (1-16, default: 8)
    --max-attempts <n>          Attempts for ProviderUnavailable (default: 1)
    --session-lifetime <secs>   Session token lifetime (default: 86400)
    --limit, -n <n>             Records to list (default: 100, max: 1000)
    --server, -s <url>          Running node for `challenge` (default: http://127.0.0.1:<port>,
                                env: PAYNODE_SERVER_URL)

OUTPUT OPTIONS:
    --json                      Raw JSON output
    --pretty                    Pretty-print JSON
    --version, -V               Print version

SECRETS:
    PAYNODE_SECRET_SIGNING_GATEWAY='{{"apiKey":"..."}}'
    PAYNODE_SECRET_SESSION_SIGNING_KEY='{{"key":"<at least 32 bytes>"}}'

EXAMPLES:
    paynode process october.csv --gateway https://signer.internal
    paynode list 2026/10 --limit 20
    paynode serve --port 8080
    paynode challenge 0x52908400098527886e0f7030069857d2e4169ee7 --server http://127.0.0.1:8080
"#
    );
}

async fn cmd_serve(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let config = opts.node_config()?;
    let port = config.port;
    let node = Arc::new(Node::from_config(config).await.context("failed to start node")?);

    let shutdown = install_signal_handlers();
    let sweeper = spawn_challenge_sweeper(node.clone(), CHALLENGE_SWEEP_INTERVAL, &shutdown);

    let router = create_router(node.clone());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(app = node.app_name(), "paynode listening on http://{addr}");

    tokio::select! {
        result = axum::serve(listener, router) => {
            result.context("server error")?;
        }
        _ = shutdown.wait() => {
            info!("shutdown signal received, stopping server");
        }
    }

    shutdown.trigger().await;
    let _ = sweeper.await;
    Ok(json!({"status": "stopped"}))
}

async fn cmd_process(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let path = opts.target.as_deref().ok_or_else(|| anyhow!("usage: paynode process <file>"))?;
    let bytes = tokio::fs::read(path).await.with_context(|| format!("failed to read {path}"))?;
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string();

    let node = Node::from_config(opts.node_config()?).await?;
    let result = node.engine().process_batch(&bytes, &file_name).await?;
    Ok(serde_json::to_value(result)?)
}

async fn cmd_list(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let node = Node::from_config(opts.node_config()?).await?;
    let prefix = opts.target.as_deref().unwrap_or("");
    let mut records = node.ledger().list(prefix, ledger::clamp_limit(opts.limit)).await?;
    ledger::sort_chronologically(&mut records);
    Ok(json!({"count": records.len(), "records": records}))
}

async fn cmd_challenge(opts: &ParsedArgs) -> anyhow::Result<Value> {
    let address = opts.target.as_deref().ok_or_else(|| anyhow!("usage: paynode challenge <address>"))?;
    let server = match &opts.server_url {
        Some(url) => url.clone(),
        None => format!("http://127.0.0.1:{}", opts.node_config()?.port),
    };
    let client = NodeClient::new(server, Duration::from_secs(10))?;
    let grant = client
        .request_challenge(address)
        .await
        .with_context(|| format!("challenge from {}", client.base_url()))?;
    Ok(serde_json::to_value(grant)?)
}
