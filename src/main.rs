use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use tracker_addin::config::{AddinConfig, EnvSettings};
use tracker_addin::controller::SimulatedControllerFactory;
use tracker_addin::host::memory::{MemoryCommandSurface, MemoryOutput, MemoryToolWindow};
use tracker_addin::host::{ExecMode, LoadMode, UnloadReason};
use tracker_addin::{ExtensionLifecycleManager, HostAdapter, HostServices};

const HELP: &str = "\
Commands:
  load [deferred]      host loads the add-in
  startup              host finished starting
  query <command>      status query (short or full command name)
  exec <command>       run a command
  unload <reason>      shutdown | user | addins | solution
  status               session snapshot as JSON
  output               everything written to the output pane
  window               tool window as the host shows it
  help | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; keep the appender guard alive until exit.
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _log_guard = match std::env::var("TRACKER_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tracker-addin.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    let config = AddinConfig::from_env();
    config.validate()?;
    let namespace = config.command_namespace.clone();

    eprintln!("Tracker add-in host simulator v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Product: {}", config.product_name);
    eprintln!("   Endpoint: {}", config.endpoint);
    eprintln!("   Commands: {namespace}.*");
    eprintln!("   Type 'help' for commands.\n");

    let output = Arc::new(MemoryOutput::new(config.output_pane.clone()).echoing());
    let window = Arc::new(MemoryToolWindow::new());
    let host = HostServices {
        output: Some(output.clone()),
        commands: Arc::new(MemoryCommandSurface::new()),
        tool_window: window.clone(),
        settings: Arc::new(EnvSettings),
        controllers: Arc::new(SimulatedControllerFactory::new(
            tokio::runtime::Handle::current(),
        )),
    };
    let adapter = HostAdapter::new(ExtensionLifecycleManager::new(config, host));

    let qualify = |name: &str| {
        if name.contains('.') {
            name.to_string()
        } else {
            format!("{namespace}.{name}")
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            eprint!("> ");
            continue;
        };
        let arg = parts.next();

        match (verb, arg) {
            ("load", mode) => {
                let mode = match mode {
                    Some("deferred") => LoadMode::Deferred,
                    _ => LoadMode::Startup,
                };
                adapter.on_connection(mode);
            }
            ("startup", _) => adapter.on_startup_complete(),
            ("query", Some(name)) => {
                let reply = adapter.query_status(&qualify(name), true);
                println!("{}", serde_json::to_string(&reply)?);
            }
            ("exec", Some(name)) => {
                let handled = adapter.exec(&qualify(name), ExecMode::Default);
                println!("handled: {handled}");
            }
            ("unload", reason) => {
                adapter.on_disconnection(UnloadReason::parse(reason.unwrap_or("shutdown")));
            }
            ("status", _) => println!("{}", serde_json::to_string_pretty(&adapter.snapshot())?),
            ("output", _) => print!("{}", output.contents()),
            ("window", _) => println!("{:?}", window.record()),
            ("help", _) => println!("{HELP}"),
            ("quit", _) | ("exit", _) => break,
            _ => println!("unrecognised input, type 'help'"),
        }
        eprint!("> ");
    }

    Ok(())
}
