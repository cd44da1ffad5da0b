//! Capabilities the repository engine depends on.
//!
//! Hosts plug into the engine through three traits:
//!
//! - [`StorageContext`] - a live storage session the engine reads and writes
//! - [`TransactionAdapter`] - runs units of work under a [`Propagation`]
//! - [`SessionProvider`] - opens sessions cached by a [`SessionRegistry`]

pub mod session;
pub mod storage;
pub mod transaction;

pub use session::{SessionProvider, SessionRegistry};
pub use storage::{Selection, StorageContext};
pub use transaction::{Propagation, PropagationAction, TransactionAdapter};
