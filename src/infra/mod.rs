mod delete;
mod metadata_scan;
mod paths;
mod preferences;
mod project_scan;
mod session_scan;
mod task_store;
mod watch;

pub use delete::*;
pub use metadata_scan::*;
pub use paths::*;
pub use preferences::*;
pub use project_scan::*;
pub use session_scan::*;
pub use task_store::*;
pub use watch::*;
