mod groups;
mod instance;
mod recent;
mod registry;
mod storage;

pub use groups::{normalize_category, CategoryIndex, UNCATEGORIZED};
pub use instance::{NewSession, Session, SessionUpdate};
pub use recent::{RecentEntry, RecentSessions, MAX_RECENT};
pub use registry::SessionRegistry;
pub use storage::{
    load_json, save_json, Backend, FileBackend, MemoryBackend, StoreId, StoreLock, HOME_ENV,
};

/// Default profile name
pub const DEFAULT_PROFILE: &str = "default";
