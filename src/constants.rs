/// Width (in grid cells) of a square region column used for deferred loading
pub const DEFAULT_REGION_SIZE: i32 = 16;

/// Version header written in front of every serialized graph snapshot
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// File extension used for snapshot files
pub const SNAPSHOT_EXTENSION: &str = "segsnap";
