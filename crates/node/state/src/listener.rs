//! Event listeners observing block lifecycle and state mutations.

use thiserror::Error;
use urna_proto::{ProcessResult, ProcessStatus, Vote};

/// Error returned by listener callbacks.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener detected a condition that must stop consensus; the
    /// driver surfaces this verbatim and refuses further blocks.
    #[error("halt: {0}")]
    Halt(String),

    /// Any other listener failure; logged and swallowed on commit.
    #[error("{0}")]
    Other(String),
}

/// Observer of block events and state mutations.
///
/// Callback order within a block is: `rollback`, then per-transaction
/// callbacks in delivery order (each after its mutation has been applied
/// to the write context), then `commit` once the forest is persisted.
/// The driver serializes all callbacks on its own thread; listeners may
/// read the latest committed view during `commit` but must never touch
/// the live write context, and must not submit transactions back into
/// the driver.
#[allow(unused_variables)]
pub trait EventListener: Send + Sync {
    /// A vote was added. `tx_index` is the 0-based ordinal of the
    /// transaction within its block.
    fn on_vote(&self, vote: &Vote, tx_index: i32) {}

    /// Fired for every delivered transaction, whatever its kind.
    fn on_new_tx(&self, block_height: u32, tx_index: i32) {}

    /// A process was created.
    fn on_process(
        &self,
        process_id: &[u8],
        entity_id: &[u8],
        census_root: &str,
        census_uri: &str,
        tx_index: i32,
    ) {
    }

    /// A process changed status (except cancellation).
    fn on_process_status_change(&self, process_id: &[u8], status: ProcessStatus, tx_index: i32) {}

    /// A process was canceled.
    fn on_cancel(&self, process_id: &[u8], tx_index: i32) {}

    /// Keys were added to a process.
    fn on_process_keys(
        &self,
        process_id: &[u8],
        encryption_pub: &str,
        commitment: &str,
        tx_index: i32,
    ) {
    }

    /// Keys were revealed for a process.
    fn on_reveal_keys(
        &self,
        process_id: &[u8],
        encryption_priv: &str,
        reveal: &str,
        tx_index: i32,
    ) {
    }

    /// Results were submitted for a process. Returning an error rejects
    /// the results transaction: the state layer does not validate result
    /// contents itself, listeners decide.
    fn on_process_results(
        &self,
        process_id: &[u8],
        results: &ProcessResult,
        tx_index: i32,
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    /// The block at `height` was committed and the new view published.
    /// A [`ListenerError::Halt`] escalates to a consensus halt; other
    /// errors are logged and swallowed.
    fn commit(&self, height: u32) -> Result<(), ListenerError> {
        Ok(())
    }

    /// The in-flight block (if any) was thrown away; fired once per
    /// block begin before any transaction of that block.
    fn rollback(&self) {}
}
