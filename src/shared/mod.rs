pub mod errors;
pub mod ids;
pub mod logging;
pub mod state_paths;

pub use errors::StateError;
pub use ids::{ChannelId, ConfirmationToken, JobId, MessageId, RoleId, TenantId, UserId};
pub use logging::{append_runtime_log, append_runtime_log_fields, LogLevel};
pub use state_paths::{
    bootstrap_state_root, default_state_root_path, StatePaths, DEFAULT_STATE_ROOT_DIR,
};
