//! View routing: identifiers, history stack and the re-entrancy gate.
//!
//! # Responsibility
//! - Map fragments to views and views to access rules.
//! - Track visited views for back navigation.
//!
//! # Invariants
//! - The URL fragment is the primary navigation record; history is derived
//!   from the navigations that actually rendered.

pub mod gate;
pub mod history;
pub mod view;

pub use gate::{NavOutcome, NavRequest, NavigationError, NavigationGate};
pub use history::{BackPolicy, ViewHistory};
pub use view::ViewId;
