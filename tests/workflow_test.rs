use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use shellflow::remote::{CommandRunner, FileTransfer, RemoteOrchestrator, ShellSession, FINISH_TOKEN};
use shellflow::{Artifact, Error, FileArtifact, Result, SolveOptions, WorkflowConfig};

/// Shared view of what the fakes did and what the remote filesystem holds.
#[derive(Default)]
struct Remote {
    events: Vec<String>,
    files: HashMap<String, Vec<u8>>,
    local_paths: Vec<PathBuf>,
    fail_put: bool,
    fail_get: bool,
    exit_code: i32,
}

type Shared = Rc<RefCell<Remote>>;

struct RecordingTransfer(Shared);

impl FileTransfer for RecordingTransfer {
    fn put(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let mut state = self.0.borrow_mut();
        state.events.push(format!("put {}", remote));
        state.local_paths.push(local.to_path_buf());
        if state.fail_put {
            return Err(Error::transfer(format!("put {}", remote), "permission denied"));
        }
        let bytes = fs::read(local)?;
        let len = bytes.len() as u64;
        state.files.insert(remote.to_string(), bytes);
        Ok(len)
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let mut state = self.0.borrow_mut();
        state.events.push(format!("get {}", remote));
        state.local_paths.push(local.to_path_buf());
        if state.fail_get {
            return Err(Error::transfer(format!("get {}", remote), "no such file"));
        }
        let bytes = state
            .files
            .get(remote)
            .cloned()
            .ok_or_else(|| Error::transfer(format!("get {}", remote), "no such file"))?;
        fs::write(local, &bytes)?;
        Ok(bytes.len() as u64)
    }

    fn write_remote(&mut self, remote: &str, contents: &[u8]) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.events.push(format!("write {}", remote));
        state.files.insert(remote.to_string(), contents.to_vec());
        Ok(())
    }
}

/// Pretends to run the driver script: copies the unsolved file to the solved
/// path with a marker appended.
struct RecordingRunner {
    remote: Shared,
    workflow: WorkflowConfig,
}

impl CommandRunner for RecordingRunner {
    fn execute(&mut self, command: &str) -> Result<()> {
        let mut state = self.remote.borrow_mut();
        state.events.push(format!("execute {}", command));
        if state.exit_code != 0 {
            return Err(Error::Execution {
                exit_code: state.exit_code,
            });
        }
        if let Some(mut model) = state.files.get(&self.workflow.unsolved_path).cloned() {
            model.extend_from_slice(b"+solved");
            state.files.insert(self.workflow.solved_path.clone(), model);
        }
        Ok(())
    }
}

fn workflow() -> WorkflowConfig {
    WorkflowConfig {
        script_path: "/tmp/test-run.py".to_string(),
        unsolved_path: "/tmp/test-unsolved.nc".to_string(),
        solved_path: "/tmp/test-solved.nc".to_string(),
        ..WorkflowConfig::default()
    }
}

fn orchestrator(
    remote: &Shared,
    workflow: WorkflowConfig,
) -> RemoteOrchestrator<RecordingRunner, RecordingTransfer> {
    let runner = RecordingRunner {
        remote: Rc::clone(remote),
        workflow: workflow.clone(),
    };
    RemoteOrchestrator::new(workflow, runner, RecordingTransfer(Rc::clone(remote))).unwrap()
}

fn model() -> FileArtifact {
    FileArtifact::from_bytes(b"CDF-model".to_vec())
}

#[test]
fn test_successful_run_order() {
    let remote = Shared::default();
    let mut orchestrator = orchestrator(&remote, workflow());

    let solved = orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap();

    assert_eq!(solved.bytes(), b"CDF-model+solved");
    assert_eq!(
        remote.borrow().events,
        vec![
            "write /tmp/test-run.py",
            "put /tmp/test-unsolved.nc",
            "execute python /tmp/test-run.py",
            "get /tmp/test-solved.nc",
        ]
    );
}

#[test]
fn test_uploaded_bytes_match_saved_artifact() {
    let remote = Shared::default();
    let mut orchestrator = orchestrator(&remote, workflow());

    orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap();

    assert_eq!(
        remote.borrow().files.get("/tmp/test-unsolved.nc").unwrap(),
        b"CDF-model"
    );
}

#[test]
fn test_staged_script_embeds_paths_and_options() {
    let remote = Shared::default();
    let mut orchestrator = orchestrator(&remote, workflow());

    let options = SolveOptions::new()
        .with("solver_name", "highs")
        .with("time_limit", 10);
    orchestrator.run_workflow(&model(), &options).unwrap();

    let state = remote.borrow();
    let script = String::from_utf8(state.files.get("/tmp/test-run.py").unwrap().clone()).unwrap();
    assert!(script.contains(r#"linopy.read_netcdf("/tmp/test-unsolved.nc")"#));
    assert!(script.contains("m.solve(**{'solver_name': 'highs', 'time_limit': 10})"));
    assert!(script.contains(r#"m.to_netcdf("/tmp/test-solved.nc")"#));
}

#[test]
fn test_failed_upload_never_executes() {
    let remote = Shared::default();
    remote.borrow_mut().fail_put = true;
    let mut orchestrator = orchestrator(&remote, workflow());

    let err = orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap_err();

    match err {
        Error::Transfer { context, .. } => assert!(context.starts_with("staging unsolved artifact")),
        other => panic!("expected transfer error, got {}", other),
    }
    assert!(!remote
        .borrow()
        .events
        .iter()
        .any(|e| e.starts_with("execute")));
}

#[test]
fn test_failed_execution_never_fetches() {
    let remote = Shared::default();
    remote.borrow_mut().exit_code = 1;
    let mut orchestrator = orchestrator(&remote, workflow());

    let err = orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap_err();

    assert!(matches!(err, Error::Execution { exit_code: 1 }));
    assert!(!remote.borrow().events.iter().any(|e| e.starts_with("get")));
}

#[test]
fn test_failed_fetch_names_stage() {
    let remote = Shared::default();
    remote.borrow_mut().fail_get = true;
    let mut orchestrator = orchestrator(&remote, workflow());

    let err = orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap_err();
    assert!(err.to_string().contains("fetching solved artifact"));
}

#[test]
fn test_local_temp_files_removed() {
    for fail_get in [false, true] {
        let remote = Shared::default();
        remote.borrow_mut().fail_get = fail_get;
        let mut orchestrator = orchestrator(&remote, workflow());

        let _ = orchestrator.run_workflow(&model(), &SolveOptions::new());

        let state = remote.borrow();
        assert_eq!(state.local_paths.len(), 2);
        for path in &state.local_paths {
            assert!(!path.exists(), "{} was left behind", path.display());
            assert!(path.to_string_lossy().ends_with(".nc"));
        }
    }
}

#[test]
fn test_hooks_wrap_interpreter_line() {
    let remote = Shared::default();
    let workflow = WorkflowConfig {
        pre_execution: Some("conda activate opt".to_string()),
        post_execution: Some("echo done".to_string()),
        interpreter: "python3".to_string(),
        ..workflow()
    };
    let mut orchestrator = orchestrator(&remote, workflow);

    orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap();

    let state = remote.borrow();
    let executed: Vec<&String> = state
        .events
        .iter()
        .filter(|e| e.starts_with("execute"))
        .collect();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0],
        "execute conda activate opt\npython3 /tmp/test-run.py\necho done"
    );
}

#[test]
fn test_custom_renderer() {
    let remote = Shared::default();
    let workflow = workflow();
    let runner = RecordingRunner {
        remote: Rc::clone(&remote),
        workflow: workflow.clone(),
    };
    let mut orchestrator = RemoteOrchestrator::with_renderer(
        workflow,
        runner,
        RecordingTransfer(Rc::clone(&remote)),
        |u: &str, s: &str, o: &str| format!("solve {} -> {} with {}", u, s, o),
    );

    orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap();

    assert_eq!(
        remote.borrow().files.get("/tmp/test-run.py").unwrap(),
        b"solve /tmp/test-unsolved.nc -> /tmp/test-solved.nc with **{}"
    );
}

#[test]
fn test_repeated_runs_reuse_paths() {
    let remote = Shared::default();
    let mut orchestrator = orchestrator(&remote, workflow());

    orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap();
    let second = orchestrator
        .run_workflow(&FileArtifact::from_bytes(b"other".to_vec()), &SolveOptions::new())
        .unwrap();

    assert_eq!(second.bytes(), b"other+solved");
    assert_eq!(remote.borrow().files.len(), 3);
}

/// Transfer whose remote already holds a solved file, for driving the real
/// shell protocol.
fn preloaded_transfer(solved: &[u8]) -> (Shared, RecordingTransfer) {
    let remote = Shared::default();
    remote
        .borrow_mut()
        .files
        .insert("/tmp/test-solved.nc".to_string(), solved.to_vec());
    let transfer = RecordingTransfer(Rc::clone(&remote));
    (remote, transfer)
}

fn transcript(lines: &[&str]) -> Cursor<Vec<u8>> {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push_str("\r\n");
    }
    Cursor::new(text.into_bytes())
}

#[test]
fn test_workflow_over_shell_protocol() {
    let (_, transfer) = preloaded_transfer(b"solved-model");
    let output = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&output);

    let sentinel_echo = format!("user@box:~$ echo {} $?", FINISH_TOKEN);
    let sentinel = format!("{} 0", FINISH_TOKEN);
    let shell = ShellSession::new(
        Vec::new(),
        transcript(&[
            "Welcome to box",
            "Last login: yesterday",
            "user@box:~$ python /tmp/test-run.py",
            "Running HiGHS 1.7",
            "Optimal objective 42",
            sentinel_echo.as_str(),
            sentinel.as_str(),
        ]),
    )
    .with_sink(move |line: &str| sink.borrow_mut().push(line.to_string()));

    let mut orchestrator = RemoteOrchestrator::new(workflow(), shell, transfer).unwrap();
    let solved = orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap();

    assert_eq!(solved.bytes(), b"solved-model");
    assert_eq!(
        *output.borrow(),
        vec!["Running HiGHS 1.7", "Optimal objective 42"]
    );

    let (mut shell, _) = orchestrator.into_parts();
    let written = String::from_utf8(shell.writer_mut().clone()).unwrap();
    assert_eq!(
        written,
        format!("python /tmp/test-run.py\necho {} $?\n", FINISH_TOKEN)
    );
}

#[test]
fn test_nonzero_exit_over_shell_protocol() {
    let (remote, transfer) = preloaded_transfer(b"stale");
    let sentinel = format!("{} 1", FINISH_TOKEN);
    let shell = ShellSession::new(
        Vec::new(),
        transcript(&[
            "python /tmp/test-run.py",
            "Traceback (most recent call last):",
            sentinel.as_str(),
        ]),
    )
    .with_sink(|_: &str| {});

    let mut orchestrator = RemoteOrchestrator::new(workflow(), shell, transfer).unwrap();
    let err = orchestrator
        .run_workflow(&model(), &SolveOptions::new())
        .unwrap_err();

    assert!(matches!(err, Error::Execution { exit_code: 1 }));
    assert!(!remote.borrow().events.iter().any(|e| e.starts_with("get")));
}

#[test]
fn test_artifact_file_roundtrip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("model.nc");
    let artifact = model();

    artifact.save(&path).unwrap();
    assert_eq!(FileArtifact::load(&path).unwrap(), artifact);
}
