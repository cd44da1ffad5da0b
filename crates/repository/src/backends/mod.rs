//! Storage backends.
//!
//! Each backend provides a [`StorageContext`](crate::core::StorageContext),
//! [`TransactionAdapter`](crate::core::TransactionAdapter)s and a
//! [`SessionProvider`](crate::core::SessionProvider). Backends are enabled
//! through cargo features.

#[cfg(feature = "sqlite")]
pub mod sqlite;
