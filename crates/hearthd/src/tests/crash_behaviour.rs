//! Behavioural tests covering crash records and exit codes.

use std::cell::RefCell;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use crate::crash::{
    CrashOutcome, CrashRecord, CrashReporter, DebuggerProbe, FAULT_EXIT_CODE_MAX,
    FAULT_EXIT_CODE_MIN, Fault, FaultLocation, REENTRANT_FAULT_EXIT_CODE, Terminator,
};
use crate::environment::EnvironmentSnapshot;
use crate::lifecycle::{LifecycleState, StateHandle};
use crate::telemetry::Logger;
use crate::tests::support::temp_paths;

/// Records exit codes instead of exiting.
#[derive(Debug, Default)]
struct RecordingTerminator {
    codes: Mutex<Vec<u8>>,
}

impl RecordingTerminator {
    fn codes(&self) -> Vec<u8> {
        self.codes.lock().expect("terminator mutex poisoned").clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, code: u8) {
        self.codes.lock().expect("terminator mutex poisoned").push(code);
    }
}

#[derive(Debug)]
struct FixedProbe(AtomicBool);

impl DebuggerProbe for FixedProbe {
    fn is_attached(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct CrashWorld {
    _dir: TempDir,
    log_dir: Utf8PathBuf,
    environment: EnvironmentSnapshot,
    terminator: Arc<RecordingTerminator>,
    state: StateHandle,
    reporter: Option<CrashReporter>,
    outcomes: Vec<CrashOutcome>,
    codes: Vec<u8>,
}

impl CrashWorld {
    fn new() -> Self {
        let (dir, paths) = temp_paths();
        Self {
            log_dir: paths.log_dir().to_owned(),
            environment: EnvironmentSnapshot::capture(&paths, vec!["-programdata".into()]),
            _dir: dir,
            terminator: Arc::new(RecordingTerminator::default()),
            state: running_state(),
            reporter: None,
            outcomes: Vec::new(),
            codes: Vec::new(),
        }
    }

    fn build(&self, attached: bool) -> CrashReporter {
        CrashReporter::with_log_dir(&self.log_dir, Logger::named("crash"), self.environment.clone())
            .with_debugger_probe(FixedProbe(AtomicBool::new(attached)))
            .with_terminator(Arc::clone(&self.terminator))
            .with_lifecycle(self.state.clone())
    }

    fn report(&mut self, fault: &Fault) {
        let outcome = self
            .reporter
            .as_ref()
            .expect("reporter should be built")
            .report(fault);
        self.outcomes.push(outcome);
    }

    fn records(&self) -> Vec<Utf8PathBuf> {
        crash_files(&self.log_dir)
    }
}

fn running_state() -> StateHandle {
    let state = StateHandle::new();
    state
        .transition(LifecycleState::NotStarted, LifecycleState::Initializing)
        .expect("initializing");
    state
        .transition(LifecycleState::Initializing, LifecycleState::Running)
        .expect("running");
    state
}

fn crash_files(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut files: Vec<_> = dir
        .read_dir_utf8()
        .expect("log dir readable")
        .map(|entry| entry.expect("dir entry").into_path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.starts_with("crash-") && name.ends_with(".json"))
        })
        .collect();
    files.sort();
    files
}

fn sample_fault() -> Fault {
    Fault::message(
        "called `Option::unwrap()` on a `None` value",
        Some(FaultLocation::new("src/engine/cache.rs", 88, 17)),
    )
}

#[fixture]
fn world() -> RefCell<CrashWorld> {
    RefCell::new(CrashWorld::new())
}

#[given("a crash reporter over a running lifecycle")]
fn given_reporter(world: &RefCell<CrashWorld>) {
    let mut world = world.borrow_mut();
    let reporter = world.build(false);
    world.reporter = Some(reporter);
}

#[given("a crash reporter with a debugger attached")]
fn given_debugger(world: &RefCell<CrashWorld>) {
    let mut world = world.borrow_mut();
    let reporter = world.build(true);
    world.reporter = Some(reporter);
}

#[when("a fault is reported")]
fn when_fault(world: &RefCell<CrashWorld>) {
    world.borrow_mut().report(&sample_fault());
}

#[when("a second fault arrives before the first is handled")]
fn when_second_fault(world: &RefCell<CrashWorld>) {
    world
        .borrow_mut()
        .report(&Fault::opaque(Some(FaultLocation::new("src/host.rs", 1, 1))));
}

#[when("the same fault is reported by two fresh reporters")]
fn when_two_reporters(world: &RefCell<CrashWorld>) {
    let mut world = world.borrow_mut();
    let codes: Vec<u8> = (0..2)
        .map(|_| match world.build(false).report(&sample_fault()) {
            CrashOutcome::Terminated { exit_code, .. } => exit_code,
            other => panic!("expected termination, got {other:?}"),
        })
        .collect();
    world.codes = codes;
}

#[then("one crash record was written")]
fn then_one_record(world: &RefCell<CrashWorld>) {
    let world = world.borrow();
    let records = world.records();
    assert_eq!(records.len(), 1, "records: {records:?}");
    let contents = fs::read_to_string(&records[0]).expect("crash record readable");
    let record: CrashRecord = serde_json::from_str(&contents).expect("crash record parses");
    assert_eq!(
        record.message.as_deref(),
        Some("called `Option::unwrap()` on a `None` value")
    );
    assert_eq!(record.environment, world.environment);
}

#[then("the process was terminated with the fault's exit code")]
fn then_terminated_with_code(world: &RefCell<CrashWorld>) {
    let world = world.borrow();
    let Some(CrashOutcome::Terminated { exit_code, record }) = world.outcomes.first() else {
        panic!("expected termination, got {:?}", world.outcomes);
    };
    assert!((FAULT_EXIT_CODE_MIN..=FAULT_EXIT_CODE_MAX).contains(exit_code));
    assert_eq!(world.terminator.codes(), [*exit_code]);
    let path = record.as_ref().expect("record should be persisted");
    let contents = fs::read_to_string(path).expect("crash record readable");
    let persisted: CrashRecord = serde_json::from_str(&contents).expect("crash record parses");
    assert_eq!(persisted.exit_code, *exit_code);
}

#[then("the lifecycle was forced to terminated")]
fn then_lifecycle_terminated(world: &RefCell<CrashWorld>) {
    assert_eq!(world.borrow().state.current(), LifecycleState::Terminated);
}

#[then("both reports share an exit code in the fault range")]
fn then_shared_code(world: &RefCell<CrashWorld>) {
    let world = world.borrow();
    assert_eq!(world.codes.len(), 2);
    assert_eq!(world.codes[0], world.codes[1]);
    assert!((FAULT_EXIT_CODE_MIN..=FAULT_EXIT_CODE_MAX).contains(&world.codes[0]));
}

#[then("the second report was re-entrant")]
fn then_reentrant(world: &RefCell<CrashWorld>) {
    let world = world.borrow();
    assert_eq!(world.outcomes.get(1), Some(&CrashOutcome::Reentrant));
    assert_eq!(
        world.terminator.codes().last(),
        Some(&REENTRANT_FAULT_EXIT_CODE)
    );
}

#[then("the process was not terminated")]
fn then_not_terminated(world: &RefCell<CrashWorld>) {
    let world = world.borrow();
    assert!(matches!(
        world.outcomes.first(),
        Some(CrashOutcome::DebuggerAttached { .. })
    ));
    assert!(world.terminator.codes().is_empty());
}

#[then("a later fault is handled normally")]
fn then_later_fault_normal(world: &RefCell<CrashWorld>) {
    world.borrow_mut().report(&sample_fault());
    let world = world.borrow();
    assert!(matches!(
        world.outcomes.last(),
        Some(CrashOutcome::DebuggerAttached { .. })
    ));
    assert_eq!(world.records().len(), 2);
}

#[scenario(
    path = "tests/features/crash.feature",
    name = "A fault is recorded and terminates with a derived exit code"
)]
fn fault_is_recorded(world: RefCell<CrashWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crash.feature",
    name = "The same fault always yields the same exit code"
)]
fn same_fault_same_code(world: RefCell<CrashWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crash.feature",
    name = "A fault raised while another is handled exits with the sentinel"
)]
fn reentrant_fault_uses_sentinel(world: RefCell<CrashWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/crash.feature",
    name = "An attached debugger keeps the process alive"
)]
fn debugger_keeps_process_alive(world: RefCell<CrashWorld>) {
    drop(world);
}
