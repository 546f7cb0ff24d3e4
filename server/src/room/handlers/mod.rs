//! Command handlers, one module per concern. Each public handler matches
//! [`super::dispatch::Handler`].

pub mod booth;
pub mod chat;
pub mod dj;
pub mod player;
pub mod playlist;
pub mod session;
