//! Redundancy resolution: what happens when a new event targets a logical
//! address another operation already owns.
//!
//! The resolver is consulted exactly once per admission attempt. It may
//! admit the newcomer, park it behind the owner, cancel the owner and hand
//! the lock over, or cancel the newcomer — always as a state change, never
//! as control flow: cancelled events stay in the queues flagged noop so
//! the tick machinery drains them in order and their bookkeeping unwinds
//! through the normal completion path.

use crate::scheduler::IoScheduler;
use flashsim_core::{Event, EventKind, OpId, PhysicalAddress, SchedulerError, SchedulerResult};
use tracing::{debug, warn};

/// The die register a cancelled event must give back, if any.
fn reserved_register(event: &Event) -> Option<PhysicalAddress> {
    match event.kind() {
        EventKind::ReadTransfer => event.physical(),
        EventKind::CopyBack => event.replace(),
        _ => None,
    }
}

impl IoScheduler {
    /// Run the newcomer through the resolver, then push it if it ended up
    /// owning its logical address.
    pub(crate) fn guarded_push(&mut self, event: Event) -> SchedulerResult<()> {
        let Some(event) = self.resolve_redundancy(event)? else {
            return Ok(());
        };
        let lba = event.lba();
        let op_id = event.op_id();
        if self.locks.is_owner(lba, op_id) {
            self.current.push(event);
            Ok(())
        } else {
            // Every admitting branch of the resolver transfers the lock;
            // reaching this means the decision table is inconsistent.
            let existing_op = self.locks.owner(lba).unwrap_or(op_id);
            Err(SchedulerError::UnresolvedConflict {
                lba,
                new_op: op_id,
                new_kind: event.kind(),
                existing_op,
                existing_kind: self.deps.kind_of(existing_op).unwrap_or(event.kind()),
            })
        }
    }

    /// The decision table. Returns the newcomer when it should proceed to
    /// admission (it now owns the address); `None` when it was parked as a
    /// dependent or cancelled in place.
    fn resolve_redundancy(&mut self, mut new_event: Event) -> SchedulerResult<Option<Event>> {
        let lba = new_event.lba();
        let new_op = new_event.op_id();
        let existing_op = match self.locks.owner(lba) {
            None => {
                self.locks.set_owner(lba, new_op);
                return Ok(Some(new_event));
            }
            Some(owner) if owner == new_op => return Ok(Some(new_event)),
            Some(owner) => owner,
        };

        let new_kind = self.deps.kind_of(new_op).unwrap_or(new_event.kind());
        let Some(existing_kind) = self.deps.kind_of(existing_op) else {
            return Err(SchedulerError::UnknownOperation(existing_op));
        };
        let existing_flags = self
            .current
            .find_mut(existing_op)
            .map(|event| (event.is_garbage_collection(), event.is_mapping_op()));
        let existing_is_gc = existing_flags.is_some_and(|(gc, _)| gc);
        let existing_is_mapping = existing_flags.is_some_and(|(_, mapping)| mapping);

        use EventKind::{CopyBack, Read, Trim, Write};

        if new_event.is_garbage_collection() && existing_kind == Write {
            // A fresher user write to this address is already in flight;
            // its chain inherits the migration's obligation and the
            // migration itself becomes a noop.
            debug!(lba = %lba, kept = %existing_op, cancelled = %new_op, "user write absorbs GC migration");
            self.promote_op(existing_op);
            self.cancel_event(&mut new_event);
            self.current.push(new_event);
            self.stats.num_write_cancellations += 1;
            Ok(None)
        } else if new_event.is_garbage_collection() && existing_kind == Trim {
            debug!(lba = %lba, "trim made GC migration redundant");
            self.block_manager.register_trim_making_gc_redundant();
            self.cancel_event(&mut new_event);
            self.current.push(new_event);
            Ok(None)
        } else if existing_is_gc && (new_kind == Write || new_kind == Trim) {
            if new_kind == Trim {
                self.block_manager.register_trim_making_gc_redundant();
            }
            new_event.set_garbage_collection(true);
            self.deps.flag_gc(new_op);
            self.cancel_existing(existing_op);
            self.locks.set_owner(lba, new_op);
            self.stats.num_write_cancellations += 1;
            Ok(Some(new_event))
        } else if new_kind == Write && existing_kind == Write {
            // Two writes to the same page: only the later one matters.
            debug!(lba = %lba, cancelled = %existing_op, "write superseded by newer write");
            self.cancel_existing(existing_op);
            self.locks.set_owner(lba, new_op);
            self.stats.num_write_cancellations += 1;
            Ok(Some(new_event))
        } else if new_kind == Write && existing_kind == Read && existing_is_mapping {
            self.cancel_existing(existing_op);
            self.locks.set_owner(lba, new_op);
            Ok(Some(new_event))
        } else if new_kind == CopyBack && existing_kind == Read && existing_flags.is_some() {
            self.cancel_existing(existing_op);
            self.locks.set_owner(lba, new_op);
            Ok(Some(new_event))
        } else if new_kind == Write && existing_kind.is_read() {
            // The older read must observe the pre-write contents.
            self.deps.make_dependent(new_event, existing_op);
            Ok(None)
        } else if new_kind == Read && (existing_kind == Write || existing_kind == CopyBack) {
            // The write's payload is buffered; the read waits for it.
            self.deps.make_dependent(new_event, existing_op);
            Ok(None)
        } else if new_kind.is_read() && existing_kind.is_read() {
            // Same page, already being read; no point reading it twice.
            if !new_event.is_garbage_collection() {
                self.cancel_event(&mut new_event);
            }
            self.deps.make_dependent(new_event, existing_op);
            Ok(None)
        } else if new_kind == Trim && existing_kind == Write {
            debug!(lba = %lba, cancelled = %existing_op, "trim cancels pending write");
            if existing_is_gc {
                self.block_manager.register_trim_making_gc_redundant();
            }
            self.cancel_existing(existing_op);
            self.locks.set_owner(lba, new_op);
            self.stats.num_write_cancellations += 1;
            Ok(Some(new_event))
        } else if new_kind == Write && existing_kind == Trim {
            self.deps.make_dependent(new_event, existing_op);
            Ok(None)
        } else if new_kind == Trim && existing_kind.is_read() {
            // The read still sees pre-trim contents; trim afterwards.
            self.deps.make_dependent(new_event, existing_op);
            Ok(None)
        } else if new_kind.is_read() && existing_kind == Trim {
            if new_event.is_garbage_collection() {
                self.block_manager.register_trim_making_gc_redundant();
                self.cancel_event(&mut new_event);
                self.current.push(new_event);
            } else {
                // Reading an address about to be trimmed: the read drains
                // as a noop once the trim settles.
                self.cancel_event(&mut new_event);
                self.deps.make_dependent(new_event, existing_op);
            }
            Ok(None)
        } else {
            Err(SchedulerError::UnresolvedConflict {
                lba,
                new_op,
                new_kind,
                existing_op,
                existing_kind,
            })
        }
    }

    /// Cancel the event an operation has parked in the current map.
    pub(crate) fn cancel_existing(&mut self, existing_op: OpId) {
        let cleared = {
            let Some(event) = self.current.find_mut(existing_op) else {
                warn!(op = %existing_op, "conflicting operation has no event parked in current");
                return;
            };
            event.set_noop(true);
            reserved_register(event)
        };
        if let Some(address) = cleared {
            self.device.clear_register(address);
            self.block_manager.register_register_cleared();
        }
    }

    /// Cancel an event still held by the scheduler (not yet pushed).
    pub(crate) fn cancel_event(&mut self, event: &mut Event) {
        event.set_noop(true);
        if let Some(address) = reserved_register(event) {
            self.device.clear_register(address);
            self.block_manager.register_register_cleared();
        }
    }

    /// Flag an operation's parked event and queued chain as garbage
    /// collection.
    pub(crate) fn promote_op(&mut self, op_id: OpId) {
        if let Some(event) = self.current.find_mut(op_id) {
            event.set_garbage_collection(true);
        }
        self.deps.flag_gc(op_id);
    }
}
