//! Domain operations for Codestep tutorials.
//!
//! The instruction and project endpoints are transport-agnostic: each takes
//! the [`Storage`](codestep_storage::Storage) handle, the caller's
//! [`Identity`], and a typed input, and logs its start and completion. The
//! [`page`] module composes them into the tutorial page controller.

mod endpoint;
pub mod identity;
pub mod instructions;
pub mod navigation;
pub mod page;
pub mod projects;

pub use identity::Identity;
pub use navigation::{find_next_instruction, find_previous_instruction};
pub use page::{PageProps, PageQuery, PageSettings, PageView, load_page_props, render_page};
