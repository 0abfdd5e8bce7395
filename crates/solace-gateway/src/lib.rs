//! Local backend for the peer-support core: SQLite persistence plus an
//! in-process presence broadcast.

pub mod backend;
pub mod dispatcher;

pub use backend::LocalBackend;
pub use dispatcher::PresenceDispatcher;
