/// Persisted record shapes and keys.
pub mod models;
/// Typed session/seat access on top of the store.
pub mod repository;
/// Keyed record store with change notifications.
pub mod session_store;
/// Storage abstraction layer errors.
pub mod storage;
