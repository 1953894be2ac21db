//! PairSink trait - Dispatcher output interface
//!
//! Renderer-side consumers of synchronized pairs.

use crate::{ContractError, SynchronizedPair};

/// Pair output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(PairSink: Send)]
pub trait LocalPairSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Consume one synchronized pair
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, pair: &SynchronizedPair) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
