use crate::backup::archiver::Archiver;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use bon::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static DEFAULT_PROGRAM: &str = "tar";
static POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs an external archiving program, `tar` by default.
///
/// The program is called as `<program> zcf <dst> <src>`, so anything that
/// understands tar's flags can be swapped in.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Builder, PartialEq, Eq, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct CommandArchiver {
    #[serde(default = "default_program")]
    #[builder(default = default_program(), into)]
    program: String,
    /// Kill the program and fail the entry once this much time has passed
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

fn default_program() -> String {
    DEFAULT_PROGRAM.into()
}

impl Default for CommandArchiver {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Archiver for CommandArchiver {
    fn archive(&self, src: &Path, dst: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("zcf")
            .arg(dst)
            .arg(src)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // own group so a timeout can kill whatever the program forks
            cmd.process_group(0);
        }
        debug!("Running command: {} zcf {:?} {:?}", self.program, dst, src);

        let child = cmd
            .spawn()
            .map_err(Error::from)
            .with_msg(format!("Failed to execute {}", self.program))?;
        let (status, stderr) = match self.timeout {
            None => wait(child)?,
            Some(timeout) => self.wait_timeout(child, timeout)?,
        };

        if !status.success() {
            return Err(Error::ArchiverFailed {
                program: self.program.clone(),
                status,
                stderr,
            });
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, stderr.trim());
        }

        Ok(())
    }
}

fn wait(child: Child) -> Result<(ExitStatus, String)> {
    let output = child.wait_with_output()?;
    Ok((
        output.status,
        String::from_utf8_lossy(&output.stderr).into_owned(),
    ))
}

impl CommandArchiver {
    fn wait_timeout(&self, mut child: Child, timeout: Duration) -> Result<(ExitStatus, String)> {
        // drained on its own thread so a chatty program cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                let stderr = stderr_reader
                    .and_then(|r| r.join().ok())
                    .unwrap_or_default();
                return Ok((status, stderr));
            }
            if Instant::now() >= deadline {
                warn!("{} exceeded {:?}, killing it", self.program, timeout);
                if let Err(e) = kill_tree(&mut child) {
                    warn!("Failed to kill {}: {}", self.program, e);
                }
                let _ = child.wait();
                // not joined: a descendant outside the group may still hold the pipe
                drop(stderr_reader);
                return Err(Error::Timeout {
                    program: self.program.clone(),
                    timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(child.id() as i32);
    killpg(pgid, Signal::SIGKILL).or_else(|errno| {
        debug!("killpg({pgid}) failed: {errno}, killing the child only");
        child.kill()
    })
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}
