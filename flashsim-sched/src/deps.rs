//! Dependency bookkeeping for multi-event operations.
//!
//! Each operation is a FIFO of sub-events: the head is the one eligible to
//! run, the rest wait for it. The store also remembers, per operation, the
//! logical address and canonical kind the redundancy resolver reasons
//! about, and which other operations are blocked on this one.

use flashsim_core::{Event, EventKind, Lba, OpId, SchedulerError, SchedulerResult, SimTime};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
pub(crate) struct DependencyStore {
    pending: HashMap<OpId, VecDeque<Event>>,
    lba_of: HashMap<OpId, Lba>,
    kind_of: HashMap<OpId, EventKind>,
    dependents: HashMap<OpId, VecDeque<OpId>>,
}

impl DependencyStore {
    /// Register a new operation from its full sub-event queue and return
    /// the head event, ready to be placed into the future bag.
    ///
    /// The operation's id, logical address, and canonical kind are taken
    /// from the queue's last event. If the operation is an original
    /// application I/O led by a mapping read, the mapping read is split
    /// off under its own (fresh) operation id and the original operation
    /// is recorded as its dependent.
    ///
    /// An empty queue registers nothing and yields `None`.
    pub(crate) fn register(&mut self, mut queue: VecDeque<Event>) -> SchedulerResult<Option<Event>> {
        let Some(last) = queue.back() else {
            return Ok(None);
        };
        let op_id = last.op_id();
        let lba = last.lba();
        let kind = last.kind();
        let original_io = last.is_original_application_io();

        if self.pending.contains_key(&op_id) {
            return Err(SchedulerError::DuplicateOperation(op_id));
        }
        if kind != EventKind::GarbageCollection && kind != EventKind::Erase {
            self.lba_of.insert(op_id, lba);
        }
        self.kind_of.insert(op_id, kind);

        let Some(mut first) = queue.pop_front() else {
            return Ok(None);
        };
        self.pending.insert(op_id, queue);

        if original_io && first.is_mapping_op() && first.kind() == EventKind::Read {
            let mapping_op = OpId::from(first.event_id());
            first.set_op_id(mapping_op);
            self.kind_of.insert(mapping_op, EventKind::Read);
            self.lba_of.insert(mapping_op, first.lba());
            self.dependents
                .entry(mapping_op)
                .or_default()
                .push_back(op_id);
        }
        Ok(Some(first))
    }

    /// Pop the operation's next sub-event after `completed` finished,
    /// crediting it with the time the chain spent on its predecessor and
    /// propagating the noop flag. Updates the recorded address and kind to
    /// the new head's. Returns `None` when the chain is exhausted.
    pub(crate) fn advance(&mut self, op_id: OpId, completed: &Event) -> Option<Event> {
        let queue = self.pending.get_mut(&op_id)?;
        let mut next = queue.pop_front()?;
        next.set_op_id(op_id);
        let waited = (completed.current_time() - next.current_time()).max(0.0);
        next.incr_accumulated_wait(waited);
        next.set_noop(completed.is_noop());
        self.lba_of.insert(op_id, next.lba());
        self.kind_of.insert(op_id, next.kind());
        Some(next)
    }

    /// Erase the operation's bookkeeping and release the heads of every
    /// operation blocked on it, each credited with the time it waited.
    /// The returned events are ready for re-admission.
    pub(crate) fn complete(&mut self, op_id: OpId, now: SimTime) -> Vec<Event> {
        self.pending.remove(&op_id);
        self.lba_of.remove(&op_id);
        self.kind_of.remove(&op_id);

        let mut released = Vec::new();
        if let Some(blocked) = self.dependents.remove(&op_id) {
            for dependent in blocked {
                let Some(queue) = self.pending.get_mut(&dependent) else {
                    continue;
                };
                let Some(mut head) = queue.pop_front() else {
                    continue;
                };
                let waited = (now - head.current_time()).max(0.0);
                head.incr_bus_wait(waited);
                released.push(head);
            }
        }
        released
    }

    /// Park `event` at the front of its own operation's queue and record
    /// that operation as blocked on `independent`.
    pub(crate) fn make_dependent(&mut self, event: Event, independent: OpId) {
        let dependent = event.op_id();
        self.dependents
            .entry(independent)
            .or_default()
            .push_back(dependent);
        self.pending.entry(dependent).or_default().push_front(event);
    }

    /// The operation's remaining sub-event queue, created empty on demand.
    pub(crate) fn queue_mut(&mut self, op_id: OpId) -> &mut VecDeque<Event> {
        self.pending.entry(op_id).or_default()
    }

    pub(crate) fn remaining(&self, op_id: OpId) -> usize {
        self.pending.get(&op_id).map_or(0, VecDeque::len)
    }

    /// Remove and return every remaining sub-event (noop drain).
    pub(crate) fn drain_op(&mut self, op_id: OpId) -> VecDeque<Event> {
        self.pending.remove(&op_id).unwrap_or_default()
    }

    /// Drop the pending entry without touching address/kind records.
    pub(crate) fn remove_op(&mut self, op_id: OpId) {
        self.pending.remove(&op_id);
    }

    /// Drop the address/kind records (noop drain).
    pub(crate) fn clear_meta(&mut self, op_id: OpId) {
        self.lba_of.remove(&op_id);
        self.kind_of.remove(&op_id);
    }

    /// Register a garbage-collection migration under its own op id.
    pub(crate) fn insert_queue(
        &mut self,
        op_id: OpId,
        queue: VecDeque<Event>,
    ) -> SchedulerResult<()> {
        if self.pending.contains_key(&op_id) {
            return Err(SchedulerError::DuplicateOperation(op_id));
        }
        self.pending.insert(op_id, queue);
        Ok(())
    }

    pub(crate) fn record_lba(&mut self, op_id: OpId, lba: Lba) {
        self.lba_of.insert(op_id, lba);
    }

    pub(crate) fn record_kind(&mut self, op_id: OpId, kind: EventKind) {
        self.kind_of.insert(op_id, kind);
    }

    pub(crate) fn lba_of(&self, op_id: OpId) -> Option<Lba> {
        self.lba_of.get(&op_id).copied()
    }

    pub(crate) fn kind_of(&self, op_id: OpId) -> Option<EventKind> {
        self.kind_of.get(&op_id).copied()
    }

    /// Flag the operation's queued sub-events as garbage collection.
    pub(crate) fn flag_gc(&mut self, op_id: OpId) {
        if let Some(queue) = self.pending.get_mut(&op_id) {
            for event in queue {
                event.set_garbage_collection(true);
            }
        }
    }

    /// True when no operation has sub-events parked here.
    pub(crate) fn no_pending_work(&self) -> bool {
        self.pending.values().all(VecDeque::is_empty)
    }
}
