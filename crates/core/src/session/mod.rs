//! Session store and its published state

pub mod state;
pub mod store;

pub use state::{Session, SessionState};
pub use store::SessionStore;
