//! Route guard and navigation

pub mod guard;
pub mod navigator;

pub use guard::{GuardDecision, RouteGuard};
pub use navigator::{Navigation, Navigator};
