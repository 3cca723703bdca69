//! Bidirectional translation between the two peers.
//!
//! Both directions are plain functions over a [`SessionContext`]:
//!
//! - [`upstream::translate_event`]: upstream event -> downstream messages
//! - [`downstream::translate_command`]: downstream command -> upstream call
//!
//! They never call each other. The only state they share is the context the
//! coordinator passes in.
//!
//! [`SessionContext`]: crate::context::SessionContext

pub mod downstream;
pub mod upstream;

pub use downstream::{translate_command, CommandError};
pub use upstream::{translate_event, SessionDirective, Translation};
