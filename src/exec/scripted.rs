// src/exec/scripted.rs
use super::{CommandOutput, CommandRunner};
use crate::error::ExecError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Success(String),
    Failure {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    Hang,
    Delayed(Duration, String),
}

/// In-memory [`CommandRunner`] with canned responses.
///
/// Responses are keyed by the full command line (`program arg1 arg2`).
/// A program that was not registered with [`ScriptedRunner::with_tool`] is
/// treated as not installed. Unscripted command lines fail with exit code 1.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    installed: HashSet<String>,
    responses: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, program: &str) -> Self {
        self.installed.insert(program.to_string());
        self
    }

    pub fn with_tools(mut self, programs: &[&str]) -> Self {
        self.installed
            .extend(programs.iter().map(|p| p.to_string()));
        self
    }

    pub fn respond(mut self, command_line: &str, stdout: &str) -> Self {
        self.responses.insert(
            command_line.to_string(),
            Scripted::Success(stdout.to_string()),
        );
        self
    }

    pub fn fail(mut self, command_line: &str, code: i32, stderr: &str) -> Self {
        self.responses.insert(
            command_line.to_string(),
            Scripted::Failure {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn fail_with_stdout(mut self, command_line: &str, code: i32, stdout: &str) -> Self {
        self.responses.insert(
            command_line.to_string(),
            Scripted::Failure {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    /// The command never finishes; the caller's timeout decides the outcome.
    pub fn hang(mut self, command_line: &str) -> Self {
        self.responses
            .insert(command_line.to_string(), Scripted::Hang);
        self
    }

    pub fn delay(mut self, command_line: &str, delay: Duration, stdout: &str) -> Self {
        self.responses.insert(
            command_line.to_string(),
            Scripted::Delayed(delay, stdout.to_string()),
        );
        self
    }

    /// Command lines started so far, in start order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn timed_out(program: &str, timeout: Duration) -> ExecError {
        ExecError::Timeout {
            program: program.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    fn is_available(&self, program: &str) -> bool {
        self.installed.contains(program)
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, ExecError> {
        let command_line = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command_line.clone());
        }

        if !self.is_available(program) {
            return Err(ExecError::NotFound {
                program: program.to_string(),
            });
        }

        match self.responses.get(&command_line).cloned() {
            Some(Scripted::Success(stdout)) => Ok(CommandOutput {
                stdout,
                stderr: String::new(),
            }),
            Some(Scripted::Failure {
                code,
                stdout,
                stderr,
            }) => Err(ExecError::Failed {
                program: program.to_string(),
                code,
                stdout,
                stderr,
            }),
            Some(Scripted::Hang) => {
                tokio::time::sleep(timeout).await;
                Err(Self::timed_out(program, timeout))
            }
            Some(Scripted::Delayed(delay, stdout)) => {
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(Self::timed_out(program, timeout));
                }
                tokio::time::sleep(delay).await;
                Ok(CommandOutput {
                    stdout,
                    stderr: String::new(),
                })
            }
            None => Err(ExecError::Failed {
                program: program.to_string(),
                code: Some(1),
                stdout: String::new(),
                stderr: format!("no scripted response for `{}`", command_line),
            }),
        }
    }
}
