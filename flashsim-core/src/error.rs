//! Fatal scheduler conditions.

use crate::{EventId, EventKind, Lba, OpId};
use thiserror::Error;

/// Errors that abort a simulation run.
///
/// Everything here denotes either a scheduler bug (inconsistent internal
/// state) or a collaborator breaking its contract. There is no retry; the
/// run is deterministic for a given seed, so the driver reports the error
/// and stops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// An operation id was registered twice.
    #[error("operation {0} is already registered")]
    DuplicateOperation(OpId),

    /// A completing operation did not hold the lock its bookkeeping says
    /// it should.
    #[error("no lock held on {lba} at completion of {op_id}")]
    LockMissing {
        /// The logical address whose lock was expected.
        lba: Lba,
        /// The operation completing.
        op_id: OpId,
    },

    /// The redundancy resolver saw a combination its decision table does
    /// not categorize.
    #[error(
        "unresolved conflict on {lba}: new {new_op} ({new_kind:?}) vs \
         existing {existing_op} ({existing_kind:?})"
    )]
    UnresolvedConflict {
        /// The contested logical address.
        lba: Lba,
        /// The arriving operation.
        new_op: OpId,
        /// The arriving operation's kind.
        new_kind: EventKind,
        /// The operation holding the lock.
        existing_op: OpId,
        /// The lock holder's kind.
        existing_kind: EventKind,
    },

    /// An operation the scheduler was about to act on has no bookkeeping.
    #[error("operation {0} is not registered")]
    UnknownOperation(OpId),

    /// The device reported failure for an issued event.
    #[error("device reported failure for event {0}")]
    DeviceFailure(EventId),

    /// A dispatched event has no physical address.
    #[error("event {0} reached dispatch without a physical address")]
    UnassignedAddress(EventId),

    /// The block manager chose a page index beyond the block bound.
    #[error("page {page} out of bounds for block size {block_size}")]
    PageOutOfBounds {
        /// The offending page index.
        page: u32,
        /// The configured pages-per-block bound.
        block_size: u32,
    },
}

/// A type alias for `Result<T, SchedulerError>`.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
