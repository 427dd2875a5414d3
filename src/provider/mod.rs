//! Cryptography provider boundary
//!
//! Address validation and portable storage (de)serialization sit behind the
//! [`CryptoProvider`] trait. A [`ProviderHandle`] carries the provider's
//! lifecycle: uninitialized, ready, shut down. Calls outside the ready state
//! fail with [`ProviderError::ProviderUnavailable`].

pub mod native;

pub use native::{AddressType, DecodedAddress, NativeProvider};

use crate::codec::{CodecError, WireValue};
use crate::core::NetworkType;
use bytes::Bytes;
use std::sync::{Arc, OnceLock, RwLock};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Provider errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Cryptography provider is not available")]
    ProviderUnavailable,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Capabilities the client needs from a cryptography implementation
pub trait CryptoProvider: Send + Sync {
    /// Check that `address` is well formed and belongs to `network`
    fn validate_address(&self, address: &str, network: NetworkType) -> Result<(), ProviderError>;

    /// Decode portable storage bytes
    fn decode_storage(&self, bytes: Bytes) -> Result<WireValue, ProviderError>;

    /// Encode a value tree as portable storage bytes
    fn encode_storage(&self, value: &WireValue) -> Result<Bytes, ProviderError>;
}

// =============================================================================
// Lifecycle Handle
// =============================================================================

enum ProviderState {
    Uninitialized,
    Ready(Arc<dyn CryptoProvider>),
    ShutDown,
}

/// Shared handle to the installed provider
pub struct ProviderHandle {
    state: RwLock<ProviderState>,
}

impl ProviderHandle {
    /// Handle with no provider installed yet
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ProviderState::Uninitialized),
        }
    }

    /// Handle that is ready with `provider`
    pub fn ready(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            state: RwLock::new(ProviderState::Ready(provider)),
        }
    }

    /// Install (or replace) the provider; not allowed after shutdown
    pub fn install(&self, provider: Arc<dyn CryptoProvider>) -> Result<(), ProviderError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, ProviderState::ShutDown) {
            return Err(ProviderError::ProviderUnavailable);
        }
        *state = ProviderState::Ready(provider);
        log::debug!("Cryptography provider installed");
        Ok(())
    }

    /// Release the provider; every later call fails
    pub fn shutdown(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = ProviderState::ShutDown;
        log::debug!("Cryptography provider shut down");
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(|e| e.into_inner()),
            ProviderState::Ready(_)
        )
    }

    /// The installed provider
    pub fn get(&self) -> Result<Arc<dyn CryptoProvider>, ProviderError> {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            ProviderState::Ready(provider) => Ok(Arc::clone(provider)),
            _ => Err(ProviderError::ProviderUnavailable),
        }
    }

    pub fn validate_address(&self, address: &str, network: NetworkType) -> Result<(), ProviderError> {
        self.get()?.validate_address(address, network)
    }

    pub fn decode_storage(&self, bytes: Bytes) -> Result<WireValue, ProviderError> {
        self.get()?.decode_storage(bytes)
    }

    pub fn encode_storage(&self, value: &WireValue) -> Result<Bytes, ProviderError> {
        self.get()?.encode_storage(value)
    }
}

impl Default for ProviderHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide provider handle, uninitialized until something installs one
pub fn global() -> Arc<ProviderHandle> {
    static GLOBAL: OnceLock<Arc<ProviderHandle>> = OnceLock::new();
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(ProviderHandle::new())))
}
