use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use monitor_core::Redirection;
use redirections::{HistoryStore, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Jsonl }

mod config;

#[derive(Debug, Parser)]
#[command(name = "upnp-monitor", version, about = "Watch a UPnP gateway for new port redirections")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./upnp-monitor.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// One-shot dump of the gateway's current redirection table
    List {
        /// SSDP discovery delay in milliseconds
        #[arg(long, default_value_t = 200)]
        discover_delay_ms: u64,
        /// Output format: text or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Poll the gateway and alert on newly observed redirections
    Watch {
        /// SSDP discovery delay in milliseconds
        #[arg(long, default_value_t = 200)]
        discover_delay_ms: u64,
        /// Seconds between poll cycles
        #[arg(long, default_value_t = 2)]
        interval_secs: u64,
        /// Append-only file of already-seen redirections
        #[arg(long, value_name = "FILE", default_value = "redirections.txt")]
        state_file: PathBuf,
        /// Alert format: text or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn parse_format(s: &str) -> OutputFormat {
    match s { "jsonl" => OutputFormat::Jsonl, _ => OutputFormat::Text }
}

/// Discovery and selection happen exactly once per process; any failure here
/// is fatal and surfaces as a non-zero exit before polling starts.
fn discover_gateway(delay_ms: u64) -> Result<igd_gateway::IgdGateway> {
    println!("discovering gateway (delay {} ms)...", delay_ms);
    let gw = igd_gateway::discover(Duration::from_millis(delay_ms))
        .map_err(|e| anyhow!("no usable gateway: {}", e))?;
    println!("selected gateway {} ({})", gw.addr(), gw.root_url());
    Ok(gw)
}

fn alert_line(r: &Redirection, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => r.to_string(),
        OutputFormat::Jsonl => serde_json::json!({
            "observed_at": now_rfc3339(),
            "protocol": r.protocol.to_string(),
            "host_ip": r.host_ip,
            "host_port": r.host_port,
            "remote_host": r.remote_host,
            "remote_port": r.remote_port,
            "description": r.description,
        })
        .to_string(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded_cfg = config::load_config(cli.config.as_deref());
    match cli.command {
        Commands::Version => {
            println!("upnp-monitor {} (core {})", env!("CARGO_PKG_VERSION"), monitor_core::version());
        }
        Commands::List { mut discover_delay_ms, mut format } => {
            if let Some(cfg) = &loaded_cfg { if let Some(l) = &cfg.list {
                if l.discover_delay_ms.is_some() { discover_delay_ms = l.discover_delay_ms.unwrap(); }
                if let Some(f) = &l.format { format = parse_format(f); }
            }}
            let gw = discover_gateway(discover_delay_ms)?;
            match gw.external_ip() {
                Ok(ip) => println!("external ip address: {}", ip),
                Err(e) => println!("external ip address: unavailable ({})", e),
            }
            let table = gw.mappings()?;
            if table.is_empty() {
                println!("no active redirections");
            }
            for (index, r) in table.iter().enumerate() {
                match format {
                    OutputFormat::Text => println!("{} {}", index, r),
                    OutputFormat::Jsonl => println!("{}", alert_line(r, format)),
                }
            }
        }
        Commands::Watch { mut discover_delay_ms, mut interval_secs, mut state_file, mut format } => {
            if let Some(cfg) = &loaded_cfg { if let Some(w) = &cfg.watch {
                if w.discover_delay_ms.is_some() { discover_delay_ms = w.discover_delay_ms.unwrap(); }
                if w.interval_secs.is_some() { interval_secs = w.interval_secs.unwrap(); }
                if let Some(p) = &w.state_file { state_file = PathBuf::from(p); }
                if let Some(f) = &w.format { format = parse_format(f); }
            }}
            let gw = discover_gateway(discover_delay_ms)?;
            let watcher = Watcher::new(gw, HistoryStore::new(&state_file));
            println!("loaded {} known redirection(s) from {}", watcher.history().len(), state_file.display());
            println!("polling every {} s", interval_secs.max(1));
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(watcher.run(Duration::from_secs(interval_secs.max(1)), |r| {
                println!("{}", alert_line(r, format));
            }))?;
        }
    }
    Ok(())
}
