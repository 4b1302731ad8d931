//! End-to-end host sessions.
//!
//! Each test drives a `HostAdapter` the way the host would, against the
//! in-memory host surfaces. Connection changes come from the simulated
//! controller's tokio tasks, so assertions on them wait for the bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use tracker_addin::config::{AddinConfig, StaticSettings};
use tracker_addin::connection::ConnectionState;
use tracker_addin::controller::{
    ConnectionEvent, ControllerFactory, ManualController, ManualControllerFactory,
    SimulatedControllerFactory,
};
use tracker_addin::host::memory::{MemoryCommandSurface, MemoryOutput, MemoryToolWindow};
use tracker_addin::host::adapter::QueryStatusReply;
use tracker_addin::host::{CommandStatus, ExecMode, LoadMode, UnloadReason};
use tracker_addin::session::SessionPhase;
use tracker_addin::{ExtensionLifecycleManager, HostAdapter, HostServices};

/// Maximum time any wait is allowed before the test counts as hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Host {
    output: Arc<MemoryOutput>,
    commands: Arc<MemoryCommandSurface>,
    window: Arc<MemoryToolWindow>,
    adapter: HostAdapter,
}

fn config() -> AddinConfig {
    AddinConfig {
        endpoint: "https://svc.example".to_string(),
        connect_latency: Duration::from_millis(5),
        ..AddinConfig::default()
    }
}

fn host(auto_login: bool, controllers: Arc<dyn ControllerFactory>) -> Host {
    let output = Arc::new(MemoryOutput::new("Tracker"));
    let commands = Arc::new(MemoryCommandSurface::new());
    let window = Arc::new(MemoryToolWindow::new());
    let services = HostServices {
        output: Some(output.clone()),
        commands: commands.clone(),
        tool_window: window.clone(),
        settings: Arc::new(StaticSettings { auto_login }),
        controllers,
    };
    Host {
        output,
        commands,
        window,
        adapter: HostAdapter::new(ExtensionLifecycleManager::new(config(), services)),
    }
}

fn simulated(auto_login: bool) -> (Arc<SimulatedControllerFactory>, Host) {
    let factory = Arc::new(SimulatedControllerFactory::new(tokio::runtime::Handle::current()));
    let host = host(auto_login, factory.clone());
    (factory, host)
}

/// Poll until `check` holds, yielding to the runtime in between.
async fn wait_until(check: impl Fn() -> bool) {
    timeout(TEST_TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn connected(host: &Host) -> bool {
    host.adapter
        .snapshot()
        .connection
        .is_some_and(|c| c.is_connected())
}

#[tokio::test]
async fn startup_with_auto_login_connects_and_shows_window() {
    let (factory, host) = simulated(true);

    host.adapter.on_connection(LoadMode::Startup);
    assert_eq!(host.adapter.snapshot().phase, SessionPhase::Ready);
    assert!(!host.window.record().visible);

    host.adapter.on_startup_complete();
    assert!(host.window.record().visible);

    wait_until(|| connected(&host)).await;
    assert_eq!(
        host.window.record().caption,
        "Tracker Window - Connected to https://svc.example"
    );
    assert_eq!(
        host.adapter.query_status("Tracker.Connect.Login", false).status,
        CommandStatus::SUPPORTED
    );
    assert_eq!(
        host.adapter.query_status("Tracker.Connect.Logout", false).status,
        CommandStatus::ENABLED
    );

    host.adapter.on_disconnection(UnloadReason::HostShutdown);
    let snapshot = host.adapter.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Disposed);
    assert!(snapshot.commands.is_empty());
    assert!(host.commands.popups().is_empty());
    assert!(factory.last().is_some_and(|c| c.is_disposed()));
}

#[tokio::test]
async fn login_and_logout_commands_round_trip_the_caption() {
    let (_factory, host) = simulated(false);
    host.adapter.on_connection(LoadMode::Startup);
    host.adapter.on_startup_complete();
    assert_eq!(host.window.record().caption, "Tracker Window - Disconnected");

    assert!(host.adapter.exec("Tracker.Connect.Login", ExecMode::Default));
    wait_until(|| connected(&host)).await;
    assert_eq!(
        host.window.record().caption,
        "Tracker Window - Connected to https://svc.example"
    );

    assert!(host.adapter.exec("Tracker.Connect.Logout", ExecMode::Default));
    wait_until(|| !connected(&host)).await;
    assert_eq!(host.window.record().caption, "Tracker Window - Disconnected");
    assert_eq!(
        host.adapter.snapshot().connection,
        Some(ConnectionState::Disconnected)
    );
}

#[tokio::test]
async fn addins_update_unload_keeps_session_ready() {
    let (_factory, host) = simulated(false);
    host.adapter.on_connection(LoadMode::Startup);

    host.adapter.on_addins_update();
    host.adapter.on_disconnection(UnloadReason::AddInsUpdated);
    host.adapter.on_disconnection(UnloadReason::SolutionReload);

    let snapshot = host.adapter.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Ready);
    assert_eq!(snapshot.commands.len(), 4);
    assert!(host.adapter.exec("Tracker.Connect.ToDoList", ExecMode::Default));
    assert!(host.window.record().visible);
}

#[tokio::test]
async fn phases_never_move_backwards_after_teardown() {
    let (_factory, host) = simulated(true);
    host.adapter.on_connection(LoadMode::Deferred);
    host.adapter.on_disconnection(UnloadReason::UserClosed);
    assert_eq!(host.adapter.snapshot().phase, SessionPhase::Disposed);

    host.adapter.on_connection(LoadMode::Startup);
    host.adapter.on_startup_complete();
    host.adapter.on_disconnection(UnloadReason::HostShutdown);
    assert_eq!(host.adapter.snapshot().phase, SessionPhase::Disposed);
    assert_eq!(
        host.adapter.query_status("Tracker.Connect.Options", true).status,
        CommandStatus::NONE
    );
    assert!(!host.adapter.exec("Tracker.Connect.Options", ExecMode::Default));

    let output = host.output.contents();
    assert_eq!(output.matches("add-in unloaded").count(), 1);
}

#[tokio::test]
async fn unknown_and_non_default_execs_are_not_handled() {
    let (_factory, host) = simulated(false);
    host.adapter.on_connection(LoadMode::Startup);

    assert!(!host.adapter.exec("Tracker.Connect.Nope", ExecMode::Default));
    assert!(!host.adapter.exec("Other.AddIn.Login", ExecMode::Default));
    assert!(!host.adapter.exec("Tracker.Connect.Options", ExecMode::ShowHelp));
    assert_eq!(
        host.adapter.query_status("Tracker.Connect.Nope", true),
        QueryStatusReply {
            status: CommandStatus::SUPPORTED,
            text: None,
        }
    );
}

#[tokio::test]
async fn controller_events_from_other_threads_update_the_caption() {
    let controller = Arc::new(ManualController::new());
    let host = host(false, Arc::new(ManualControllerFactory::new(Arc::clone(&controller))));
    host.adapter.on_connection(LoadMode::Startup);

    let emitter = Arc::clone(&controller);
    tokio::task::spawn_blocking(move || {
        emitter.emit(ConnectionEvent::connected("https://svc.example"));
    })
    .await
    .unwrap();

    assert!(connected(&host));
    assert_eq!(
        host.window.record().caption,
        "Tracker Window - Connected to https://svc.example"
    );
    assert_eq!(
        host.adapter.query_status("Tracker.Connect.Login", false).status,
        CommandStatus::SUPPORTED
    );
}

#[tokio::test]
async fn failed_load_reports_and_a_retry_succeeds() {
    let controller = Arc::new(ManualController::new());
    let factory = Arc::new(ManualControllerFactory::new(controller));
    factory.fail_next(1);
    let host = host(false, factory.clone());

    host.adapter.on_connection(LoadMode::Startup);
    let snapshot = host.adapter.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Uninitialized);
    assert_eq!(snapshot.failed_loads, 1);
    assert!(host.output.contents().contains("Initialization failed"));

    host.adapter.on_connection(LoadMode::Startup);
    assert_eq!(host.adapter.snapshot().phase, SessionPhase::Ready);
    assert_eq!(host.commands.controls().len(), 4);
}
