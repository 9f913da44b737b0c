/// Workspace manifest file name, relative to the workspace root.
pub const WORKSPACE_FILE: &str = "capsa.json";

/// Per-capsule scratch directory, relative to the capsule root.
pub const CAPSULE_STATE_DIR: &str = ".capsa";

/// Value of SOURCE_DATE_EPOCH inside capsules (1980-01-01, the ZIP epoch).
pub const SOURCE_DATE_EPOCH: &str = "315532800";

/// Maximum number of trailing output bytes kept for a failed command.
pub const MAX_CAPTURED_OUTPUT: usize = 64 * 1024;
