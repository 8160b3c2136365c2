pub mod document;
pub mod issue;
pub mod page_index;

pub use document::{ClipFilter, LayoutDocument, LayoutError};
pub use issue::{discover_issues, Issue};
pub use page_index::{PageIndex, ResolveError};
