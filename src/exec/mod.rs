mod runner;
mod scripted;

pub use runner::{resolve_executable, CommandOutput, CommandRunner, SystemRunner};
pub use scripted::ScriptedRunner;
