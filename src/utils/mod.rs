pub mod logging;

pub use logging::{FileLogger, Logger, MemoryLogger, MultiLogger, TracingLogger};
