//! Data-bound rendering of the main content area.
//!
//! # Responsibility
//! - Turn store snapshots into page HTML through compiled templates.
//! - Tie live subscriptions to the view that created them.
//!
//! # Invariants
//! - Page functions are pure; all store access goes through [`scope`].
//! - User-provided text is always escaped in markup.

pub mod pages;
pub mod scope;
pub mod surface;
pub mod templates;

pub use scope::{bind_live, bind_once, bind_static, RenderFn, SnapshotSet, ViewScope};
pub use surface::Surface;
pub use templates::render_page;
