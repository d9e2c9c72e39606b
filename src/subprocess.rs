//! The subprocess boundary (§9 design note, §5.1): an injectable interface so
//! the action executor's `execute` phase can be driven by a real shell in
//! production and by a stub in tests.
use std::process::Command;

/// The outcome of running one command: its captured stdout and exit status.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub status: i32,
}

/// Runs a single shell command line and captures its output.
///
/// Modeled as a trait (rather than calling `std::process::Command` directly
/// from the executor) so tests can stub subprocess behavior instead of
/// depending on a real shell (§9 design note: "Model the executor as an
/// injectable interface").
pub trait CommandRunner {
    fn run(&self, command: &str) -> std::io::Result<CommandOutput>;
}

/// The production runner: shells out via `/bin/sh -c <command>`, matching
/// Python's `subprocess.run(cmd, shell=True)` on POSIX (§5.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> std::io::Result<CommandOutput> {
        log::debug!("running command `{command}`");
        let output = Command::new("/bin/sh").arg("-c").arg(command).output()?;
        let status = output.status.code().unwrap_or(-1);
        if status != 0 {
            log::warn!("command `{command}` exited with status {status}");
        }
        Ok(CommandOutput { stdout: String::from_utf8_lossy(&output.stdout).into_owned(), status })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// A stub runner returning canned output per exact command string, used by
    /// executor/engine unit tests to avoid depending on an actual shell.
    #[derive(Default)]
    pub struct StubRunner {
        responses: RefCell<HashMap<String, CommandOutput>>,
    }

    impl StubRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn stub(&self, command: impl Into<String>, stdout: impl Into<String>, status: i32) {
            self.responses
                .borrow_mut()
                .insert(command.into(), CommandOutput { stdout: stdout.into(), status });
        }
    }

    impl CommandRunner for StubRunner {
        fn run(&self, command: &str) -> std::io::Result<CommandOutput> {
            self.responses.borrow().get(command).cloned().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no stub registered for command `{command}`"),
                )
            })
        }
    }
}
