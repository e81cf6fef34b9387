//! Supervises host launch sequencing and runtime orchestration.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::info;

use hearth_config::{PathResolver, PathsError, StartupOptions};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader};
use crate::crash::CrashReporter;
use crate::environment::EnvironmentSnapshot;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::lifecycle::{Engine, LifecycleHost, StartError, StartOutcome, StartupTask};
use crate::localizer::{self, messages};
use crate::placeholder_engine::{HeartbeatTask, IdleEngine};
use crate::shell::{HeadlessShell, HostShell, ShellContext};
use crate::shutdown::{SessionEvents, ShutdownCoordinator, SignalSessionEvents};
use crate::telemetry;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};

const WORKER_THREAD_NAME: &str = "hearthd-worker";

/// How a launch ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// `-v` was supplied; the version was printed and nothing else ran.
    VersionPrinted {
        /// Engine version that was printed.
        version: String,
    },
    /// The host ran and was shut down.
    Stopped,
}

/// Process-level collaborators needed to control the host lifecycle.
pub(crate) struct ProcessControl<S, W> {
    pub(crate) session_events: S,
    pub(crate) output: W,
    pub(crate) install_crash_hook: bool,
}

/// Service dependencies required to construct the host.
pub(crate) struct ServiceDeps<L, E> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) engine: E,
    pub(crate) startup_tasks: Vec<Box<dyn StartupTask>>,
    pub(crate) shell: Arc<dyn HostShell>,
}

/// Supplies the path resolver once the launch needs the filesystem.
pub(crate) trait ResolverSource: Send {
    fn resolver(&self) -> Result<PathResolver, PathsError>;
}

/// Resolves paths from the running executable and working directory.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EnvironmentResolver;

impl ResolverSource for EnvironmentResolver {
    fn resolver(&self) -> Result<PathResolver, PathsError> {
        PathResolver::from_environment()
    }
}

impl ResolverSource for PathResolver {
    fn resolver(&self) -> Result<PathResolver, PathsError> {
        Ok(self.clone())
    }
}

/// Collaborators required to launch the host.
pub(crate) struct LaunchPlan<L, E, S, W> {
    pub(crate) arguments: Vec<String>,
    pub(crate) resolver: Box<dyn ResolverSource>,
    pub(crate) process: ProcessControl<S, W>,
    pub(crate) services: ServiceDeps<L, E>,
}

/// Runs the service host using the production collaborators.
pub fn run_service() -> Result<LaunchOutcome, LaunchError> {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    let plan = LaunchPlan {
        arguments: EnvironmentSnapshot::process_arguments(),
        resolver: Box::new(EnvironmentResolver),
        process: ProcessControl {
            session_events: SignalSessionEvents::new(),
            output: io::stdout(),
            install_crash_hook: true,
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter,
            engine: IdleEngine,
            startup_tasks: vec![Box::new(HeartbeatTask::default())],
            shell: Arc::new(HeadlessShell::new()),
        },
    };
    run_service_with(plan)
}

/// Runs the service host with injected collaborators.
pub(crate) fn run_service_with<L, E, S, W>(
    plan: LaunchPlan<L, E, S, W>,
) -> Result<LaunchOutcome, LaunchError>
where
    L: ConfigLoader,
    E: Engine,
    S: SessionEvents,
    W: Write,
{
    let LaunchPlan {
        arguments,
        resolver,
        process,
        services,
    } = plan;
    let ProcessControl {
        session_events,
        mut output,
        install_crash_hook,
    } = process;
    let ServiceDeps {
        loader,
        reporter,
        engine,
        startup_tasks,
        shell,
    } = services;

    let options = StartupOptions::parse(&arguments);
    let localizer = localizer::build_localizer();

    // `-v` must not touch the filesystem or the lifecycle state.
    if options.version_requested() {
        let version = engine.version().to_owned();
        let prefix = localizer::message(localizer.as_ref(), &messages::VERSION_PREFIX);
        writeln!(output, "{prefix} {version}")
            .and_then(|()| output.flush())
            .map_err(|source| LaunchError::VersionOutput { source })?;
        return Ok(LaunchOutcome::VersionPrinted { version });
    }

    let paths = Arc::new(resolver.resolver()?.resolve(&options));
    paths.prepare()?;
    let config = loader.load(&paths)?;
    let logs = telemetry::initialise(&paths, &config)?;
    let logger = logs.logger("process");
    info!(
        target: PROCESS_TARGET,
        parent: logger.span(),
        program_data = %paths.program_data(),
        custom_program_data = paths.is_custom_program_data(),
        "starting service host"
    );
    let environment = EnvironmentSnapshot::capture(&paths, arguments);
    environment.log(&logs.logger("environment"));

    let host = Arc::new(
        LifecycleHost::new(Arc::clone(&paths), &logs, engine)
            .with_startup_tasks(startup_tasks)
            .with_reporter(Arc::clone(&reporter))
            .with_certificate_policy(config.certificate_policy()),
    );
    let crash_hook = install_crash_hook.then(|| {
        Arc::new(CrashReporter::new(&logs, environment).with_lifecycle(host.state_handle()))
            .install()
    });

    let mut guard = ProcessGuard::acquire(&paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name(WORKER_THREAD_NAME)
        .build()
        .map_err(|source| LaunchError::Runtime { source })?;

    let coordinator = {
        let host = Arc::clone(&host);
        let shell = Arc::clone(&shell);
        ShutdownCoordinator::with_reporter(
            move || {
                host.shutdown();
                shell.terminate();
            },
            reporter,
        )
    };
    let registration = coordinator.register_session_events(&session_events)?;

    let run = match host.start(&runtime, &options) {
        Ok(StartOutcome::Started) => guard.write_health(HealthState::Ready).and_then(|()| {
            let handle = coordinator.handle();
            let shell_logger = logs.logger("shell");
            let context = ShellContext::new(&handle, &shell_logger, &config, localizer.as_ref());
            shell.run(context).map_err(LaunchError::from)
        }),
        Ok(StartOutcome::VersionOnly(_)) | Err(StartError::ShutdownRequested) => Ok(()),
        Err(error) => Err(error.into()),
    };

    let stopping = guard.write_health(HealthState::Stopping);
    coordinator.request_shutdown();
    coordinator.wait_completed();
    registration.unregister();
    if let Some(hook) = crash_hook {
        hook.uninstall();
    }
    runtime.shutdown_timeout(config.shutdown_timeout());
    run?;
    stopping?;
    info!(
        target: PROCESS_TARGET,
        parent: logger.span(),
        state = %host.state(),
        "shutdown sequence completed"
    );
    Ok(LaunchOutcome::Stopped)
}
