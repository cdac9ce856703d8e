//! View aggregation and connection state for a user profile page.
//!
//! A [`ViewController`] loads the subject's public profile and the viewer's
//! own identity concurrently, reconciles their ids, looks up the connection
//! between them and keeps one [`ViewModel`] current for the subject on
//! display. Changing the subject cancels the previous load and discards
//! anything it still delivers.

pub mod aggregator;
pub mod backend;
pub mod config;
pub mod controller;
pub mod coordinator;
mod errors;
pub mod gateway;
pub mod id;
pub mod model;
pub mod session;
pub mod slot;

pub use controller::ViewController;
pub use errors::{Result, ViewError};
pub use id::CanonicalId;
pub use model::{
    ConnectAction, ConnectionState, Identity, Notice, NoticeKind,
    ProfileContent, ViewModel,
};
pub use session::{MemorySession, SessionProvider};
pub use slot::ViewSubscriber;

#[cfg(test)]
pub(crate) fn initialize() {
    let _ = env_logger::builder().is_test(true).try_init();
}
