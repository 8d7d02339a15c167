//! Core client contract shared between the bootstrap orchestrator and UI shells.
//!
//! This crate defines the backend procedure surface, the observable state
//! types, timestamp normalization, and the bootstrap view projection.

/// Stable RPC error types.
pub mod error;
/// Backend timestamp normalization.
pub mod normalization;
/// Backend procedure surface consumed by the orchestrator.
pub mod rpc;
/// Snapshot cell and in-flight latch primitives.
pub mod store;
/// Shared contract types (connection, setup, sync, avatars, chats).
pub mod types;
/// Bootstrap view projection.
pub mod view;

pub use error::{RpcError, RpcErrorCategory};
pub use normalization::{
    PLATFORM_EPOCH_OFFSET_SECS, normalize_timestamp, normalize_timestamp_ms,
};
pub use rpc::BackendRpc;
pub use store::{InFlight, StateCell};
pub use types::{
    AvatarMap, ChatPreview, ConnectionStatus, RawTimestamp, ServerInfo, SetupState, SyncGateState,
    address_digits,
};
pub use view::{BootstrapSnapshot, RootView, select_root_view};
