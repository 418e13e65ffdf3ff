mod metadata;
mod project;
mod selection;
mod session;
mod task;

pub use metadata::*;
pub use project::*;
pub use selection::*;
pub use session::*;
pub use task::*;
