mod dispatcher;

pub use dispatcher::{cluster_info_args, AuthDispatcher, AuthStrategy, REMOTE_AUTH_REQUIRED};
