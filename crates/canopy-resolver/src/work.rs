//! Built-in work kinds.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use canopy_config::WorkDef;
use canopy_task::{Work, WorkError};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{CommandError, ResolveError};

/// Build the [`Work`] for a leaf declared at `path`.
pub(crate) fn build(
  def: &WorkDef,
  path: &str,
  working_dir: Option<&PathBuf>,
) -> Result<Work, ResolveError> {
  let work = match def {
    WorkDef::Emit { text, delay_ms } => emit(text.clone(), *delay_ms),
    WorkDef::Fail { message, delay_ms } => fail(message.clone(), *delay_ms),
    WorkDef::Command {
      program,
      args,
      trim,
    } => {
      if program.trim().is_empty() {
        return Err(ResolveError::EmptyProgram {
          path: path.to_string(),
        });
      }
      command(
        CommandSpec {
          program: program.clone(),
          args: args.clone(),
          working_dir: working_dir.cloned(),
        },
        *trim,
      )
    }
  };

  Ok(work)
}

async fn pause(delay_ms: Option<u64>) {
  if let Some(ms) = delay_ms {
    tokio::time::sleep(Duration::from_millis(ms)).await;
  }
}

fn emit(text: String, delay_ms: Option<u64>) -> Work {
  Work::new(move || {
    let text = text.clone();
    async move {
      pause(delay_ms).await;
      Ok(text)
    }
  })
}

fn fail(message: String, delay_ms: Option<u64>) -> Work {
  Work::new(move || {
    let message = message.clone();
    async move {
      pause(delay_ms).await;
      Err(WorkError::msg(message))
    }
  })
}

struct CommandSpec {
  program: String,
  args: Vec<String>,
  working_dir: Option<PathBuf>,
}

impl CommandSpec {
  fn command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command
      .args(&self.args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(dir) = &self.working_dir {
      command.current_dir(dir);
    }
    command
  }
}

/// The process is spawned when the work is invoked, not when its future is
/// first polled.
fn command(spec: CommandSpec, trim: bool) -> Work {
  Work::new(move || {
    debug!(program = %spec.program, args = ?spec.args, "spawning command");
    let child = spec.command().spawn();
    let program = spec.program.clone();

    async move { collect(child, program, trim).await.map_err(WorkError::from) }
  })
}

async fn collect(
  child: io::Result<Child>,
  program: String,
  trim: bool,
) -> Result<String, CommandError> {
  let child = child.map_err(|source| CommandError::Spawn {
    program: program.clone(),
    source,
  })?;
  let output = child
    .wait_with_output()
    .await
    .map_err(|source| CommandError::Wait {
      program: program.clone(),
      source,
    })?;

  if !output.status.success() {
    return Err(CommandError::Failed {
      program,
      status: output.status,
      stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
    });
  }

  let stdout =
    String::from_utf8(output.stdout).map_err(|_| CommandError::InvalidOutput { program })?;
  Ok(if trim {
    stdout.trim_end().to_string()
  } else {
    stdout
  })
}
