//! Script step execution

use kiln_errors::{BuildError, Error};
use kiln_events::{AppEvent, BuildEvent, EventEmitter, EventSender};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Lines of stderr kept for the failure message
const STDERR_TAIL_LINES: usize = 20;

/// Where and how script steps run
pub struct ScriptContext<'a> {
    pub package: &'a str,
    pub session_id: &'a str,
    pub working_dir: &'a Path,
    pub vars: &'a BTreeMap<String, String>,
    pub event_sender: Option<&'a EventSender>,
}

impl EventEmitter for ScriptContext<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender
    }
}

/// Run each step through `sh -c`, stopping at the first failure
///
/// Dropping the returned future kills the running step.
///
/// # Errors
///
/// Returns `BuildError::StepFailed` with the exit code and the tail of
/// stderr when a step cannot be spawned or exits non-zero.
pub async fn run_script(steps: &[String], ctx: &ScriptContext<'_>) -> Result<(), Error> {
    let total = steps.len();
    for (index, step) in steps.iter().enumerate() {
        ctx.emit(AppEvent::Build(BuildEvent::StepStarted {
            session_id: ctx.session_id.to_string(),
            package: ctx.package.to_string(),
            index: index + 1,
            total,
            command: step.clone(),
        }));

        let started = Instant::now();
        run_step(step, ctx).await?;

        ctx.emit(AppEvent::Build(BuildEvent::StepCompleted {
            session_id: ctx.session_id.to_string(),
            package: ctx.package.to_string(),
            index: index + 1,
            duration: started.elapsed(),
        }));
    }
    Ok(())
}

async fn run_step(step: &str, ctx: &ScriptContext<'_>) -> Result<(), Error> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(step)
        .current_dir(ctx.working_dir)
        .envs(ctx.vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BuildError::StepFailed {
            step: step.to_string(),
            code: None,
            stderr: format!("failed to spawn sh: {e}"),
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let forward_stdout = async {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                emit_output(ctx, line, false);
            }
        }
    };

    let collect_stderr = async {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
                emit_output(ctx, line, true);
            }
        }
        tail
    };

    let ((), tail, status) = tokio::join!(forward_stdout, collect_stderr, child.wait());
    let status = status.map_err(|e| BuildError::StepFailed {
        step: step.to_string(),
        code: None,
        stderr: format!("failed to wait for step: {e}"),
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(BuildError::StepFailed {
            step: step.to_string(),
            code: status.code(),
            stderr: Vec::from(tail).join("\n"),
        }
        .into())
    }
}

fn emit_output(ctx: &ScriptContext<'_>, line: String, is_stderr: bool) {
    ctx.emit(AppEvent::Build(BuildEvent::StepOutput {
        session_id: ctx.session_id.to_string(),
        package: ctx.package.to_string(),
        line,
        is_stderr,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(dir: &'a Path, vars: &'a BTreeMap<String, String>) -> ScriptContext<'a> {
        ScriptContext {
            package: "smokey",
            session_id: "test",
            working_dir: dir,
            vars,
            event_sender: None,
        }
    }

    #[tokio::test]
    async fn test_steps_see_exported_vars() {
        let dir = tempfile::tempdir().unwrap();
        let vars = BTreeMap::from([("PKG_NAME".to_string(), "smokey".to_string())]);
        let steps = vec!["echo \"$PKG_NAME\" > out.txt".to_string()];

        run_script(&steps, &context(dir.path(), &vars)).await.unwrap();

        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "smokey");
    }

    #[tokio::test]
    async fn test_failing_step_reports_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let vars = BTreeMap::new();
        let steps = vec![
            "echo boom >&2; exit 3".to_string(),
            "touch never".to_string(),
        ];

        let err = run_script(&steps, &context(dir.path(), &vars))
            .await
            .unwrap_err();
        match err {
            Error::Build(BuildError::StepFailed { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("never").exists());
    }

    #[tokio::test]
    async fn test_step_output_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let vars = BTreeMap::new();
        let (tx, mut rx) = kiln_events::channel();
        let ctx = ScriptContext {
            event_sender: Some(&tx),
            ..context(dir.path(), &vars)
        };

        run_script(&["echo hello".to_string()], &ctx).await.unwrap();
        drop(tx);

        let mut saw_line = false;
        while let Some(event) = rx.recv().await {
            if let AppEvent::Build(BuildEvent::StepOutput { line, is_stderr, .. }) = event {
                saw_line |= line == "hello" && !is_stderr;
            }
        }
        assert!(saw_line);
    }
}
