//! Synchronization primitives.

pub mod once_lock;
