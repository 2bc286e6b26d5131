//! The scheduler: admission, per-tick dispatch, and the completion pipeline.

use crate::deps::DependencyStore;
use crate::lock::LbaLockTable;
use crate::queues::{CurrentEvents, FutureEvents};
use crate::rng::SchedulerRng;
use crate::stats::SchedulerStats;
use flashsim_core::{
    BlockManager, Device, Event, EventKind, Ftl, IssueOutcome, OpId, PhysicalAddress,
    SchedulerConfig, SchedulerError, SchedulerResult, SchedulingScheme, SimTime,
};
use std::collections::VecDeque;
use tracing::{debug, instrument, trace, warn};

/// The I/O scheduling core of one simulated SSD.
///
/// Operations enter through [`schedule_event`] / [`schedule_events_queue`]
/// and flow future → current → device → completion. Per tick, the soonest
/// time bucket is partitioned by event class, ordered by the configured
/// [`SchedulingScheme`], and handed to the per-type handlers. A single
/// operation's sub-events always run in chain order; across operations the
/// per-LBA lock table and the redundancy resolver decide who runs, who
/// waits, and whose work has become redundant.
///
/// [`schedule_event`]: IoScheduler::schedule_event
/// [`schedule_events_queue`]: IoScheduler::schedule_events_queue
pub struct IoScheduler {
    pub(crate) config: SchedulerConfig,
    pub(crate) future: FutureEvents,
    pub(crate) current: CurrentEvents,
    pub(crate) deps: DependencyStore,
    pub(crate) locks: LbaLockTable,
    pub(crate) rng: SchedulerRng,
    pub(crate) stats: SchedulerStats,
    pub(crate) block_manager: Box<dyn BlockManager>,
    pub(crate) ftl: Box<dyn Ftl>,
    pub(crate) device: Box<dyn Device>,
}

impl IoScheduler {
    /// Build a scheduler over its collaborators.
    ///
    /// The block manager is the strategy named by
    /// `config.block_manager`, constructed by the embedding simulator.
    pub fn new(
        config: SchedulerConfig,
        device: Box<dyn Device>,
        ftl: Box<dyn Ftl>,
        block_manager: Box<dyn BlockManager>,
    ) -> Self {
        let rng = SchedulerRng::from_seed(config.seed);
        Self {
            config,
            future: FutureEvents::default(),
            current: CurrentEvents::default(),
            deps: DependencyStore::default(),
            locks: LbaLockTable::default(),
            rng,
            stats: SchedulerStats::default(),
            block_manager,
            ftl,
            device,
        }
    }

    /// Submit a single-event operation.
    pub fn schedule_event(&mut self, event: Event) -> SchedulerResult<()> {
        self.schedule_events_queue(VecDeque::from([event]))
    }

    /// Submit an operation as its ordered queue of sub-events.
    ///
    /// All sub-events share the last event's operation id and logical
    /// address; only the head enters the queues now, the rest follow as
    /// their predecessors complete.
    #[instrument(skip(self, events), fields(len = events.len()))]
    pub fn schedule_events_queue(&mut self, events: VecDeque<Event>) -> SchedulerResult<()> {
        if let Some(first) = self.deps.register(events)? {
            trace!(op = %first.op_id(), kind = ?first.kind(), time = first.current_time(), "operation scheduled");
            self.future.push(first);
        }
        Ok(())
    }

    /// Advance the simulation until the clock reaches `time` or no
    /// admitted event remains.
    #[instrument(skip(self))]
    pub fn finish_all_events_until_this_time(&mut self, time: SimTime) -> SchedulerResult<()> {
        self.update_current_events()?;
        while self.current_time() < time && !self.current.is_empty() {
            self.execute_current_waiting_ios()?;
            self.update_current_events()?;
        }
        Ok(())
    }

    /// Advance the simulation by one tick.
    pub fn execute_soonest_events(&mut self) -> SchedulerResult<()> {
        self.finish_all_events_until_this_time(self.current_time() + 1.0)
    }

    /// True when no event remains anywhere: both queues are empty and no
    /// operation has pending sub-events.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.future.is_empty() && self.deps.no_pending_work()
    }

    /// The simulation clock: the soonest admitted bucket, else the floor
    /// of the soonest future event, else zero.
    pub fn current_time(&self) -> SimTime {
        if let Some(tick) = self.current.soonest_tick() {
            tick as SimTime
        } else if let Some(soonest) = self.future.soonest_time() {
            soonest.floor()
        } else {
            0.0
        }
    }

    /// Number of events sitting in the queues (admitted or future).
    pub fn pending_event_count(&self) -> usize {
        self.current.len() + self.future.len()
    }

    /// The run configuration this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Counters describing the run so far.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// A uniform value in `0..limit` from the run's seeded generator.
    ///
    /// Block managers share this generator so one seed governs the run.
    pub fn random_range(&mut self, limit: usize) -> usize {
        self.rng.random_range(limit)
    }

    /// Flag an event and every queued sub-event of its operation as
    /// garbage collection. Used by block managers assembling migrations.
    pub fn promote_to_gc(&mut self, event: &mut Event) {
        event.set_garbage_collection(true);
        self.deps.flag_gc(event.op_id());
    }

    /// Park `event` behind the operation `independent`; it re-enters the
    /// queues when that operation completes.
    pub fn make_dependent(&mut self, event: Event, independent: OpId) {
        self.deps.make_dependent(event, independent);
    }

    /// Admit every future event that has become due, in seed-shuffled
    /// order so same-timestamp arrivals carry no systematic bias.
    fn update_current_events(&mut self) -> SchedulerResult<()> {
        self.stats.sample_queue_depth(self.current.len());
        let cutoff = self.current_time() + 1.0;
        for event in self.future.take_due(cutoff, &mut self.rng) {
            self.admit(event)?;
        }
        Ok(())
    }

    /// One tick: pop the soonest bucket, partition by class, dispatch in
    /// policy order, then drain cancelled work.
    fn execute_current_waiting_ios(&mut self) -> SchedulerResult<()> {
        let Some(events) = self.current.pop_soonest() else {
            return Ok(());
        };

        let mut read_commands = Vec::new();
        let mut read_commands_copyback = Vec::new();
        let mut read_commands_flexible = Vec::new();
        let mut read_transfers = Vec::new();
        let mut writes = Vec::new();
        let mut gc_writes = Vec::new();
        let mut erases = Vec::new();
        let mut copy_backs = Vec::new();
        let mut noops = Vec::new();

        for event in events {
            if event.is_noop() {
                noops.push(event);
                continue;
            }
            match event.kind() {
                EventKind::ReadCommand
                    if self.deps.kind_of(event.op_id()) == Some(EventKind::CopyBack) =>
                {
                    read_commands_copyback.push(event)
                }
                EventKind::ReadCommand if event.is_flexible_read() => {
                    read_commands_flexible.push(event)
                }
                EventKind::ReadCommand => read_commands.push(event),
                EventKind::ReadTransfer => read_transfers.push(event),
                EventKind::Write if event.is_garbage_collection() => gc_writes.push(event),
                EventKind::Write => writes.push(event),
                EventKind::Erase => erases.push(event),
                EventKind::CopyBack => copy_backs.push(event),
                // Trims settle the mapping; they take no die time and run
                // as soon as they surface.
                EventKind::Trim => self.execute_next(event)?,
                EventKind::Read | EventKind::GarbageCollection => {
                    warn!(op = %event.op_id(), kind = ?event.kind(), "unexpected kind in current events");
                }
            }
        }

        match self.config.scheme {
            SchedulingScheme::ApplicationPriority => {
                read_commands.append(&mut read_commands_flexible);
                sort_by_bus_wait(&mut erases);
                sort_by_bus_wait(&mut read_commands);
                sort_by_bus_wait(&mut writes);
                sort_by_overall_wait(&mut gc_writes);
                sort_by_overall_wait(&mut read_transfers);

                self.handle_batch(read_commands)?;
                self.handle_batch(read_transfers)?;
                self.handle_batch(writes)?;
                self.handle_batch(gc_writes)?;
                self.handle_batch(erases)?;
                self.handle_batch(read_commands_copyback)?;
                self.handle_batch(copy_backs)?;
            }
            SchedulingScheme::GcPriority => {
                read_commands.append(&mut read_commands_flexible);

                self.handle_batch(erases)?;
                self.handle_batch(gc_writes)?;
                self.handle_batch(read_commands)?;
                self.handle_batch(writes)?;
                self.handle_batch(read_transfers)?;
                self.handle_batch(read_commands_copyback)?;
                self.handle_batch(copy_backs)?;
            }
            SchedulingScheme::InterleavedEqual => {
                read_commands.append(&mut read_commands_flexible);
                writes.append(&mut gc_writes);
                read_transfers.append(&mut copy_backs);

                sort_by_bus_wait(&mut erases);
                sort_by_overall_wait(&mut read_commands);
                sort_by_bus_wait(&mut writes);
                sort_by_overall_wait(&mut read_transfers);
                sort_by_overall_wait(&mut read_commands_copyback);

                self.handle_batch(erases)?;
                self.handle_batch(read_commands)?;
                self.handle_batch(read_commands_copyback)?;
                self.handle_batch(writes)?;
                self.handle_batch(read_transfers)?;
            }
            SchedulingScheme::FlexReadEqualsWrite => {
                writes.append(&mut gc_writes);
                writes.append(&mut read_commands_flexible);
                read_transfers.append(&mut copy_backs);

                sort_by_bus_wait(&mut erases);
                sort_by_overall_wait(&mut read_commands);
                sort_by_bus_wait(&mut writes);
                sort_by_overall_wait(&mut read_transfers);
                sort_by_overall_wait(&mut read_commands_copyback);

                self.handle_batch(erases)?;
                self.handle_batch(read_commands)?;
                self.handle_batch(read_commands_copyback)?;
                self.handle_batch(writes)?;
                self.handle_batch(read_transfers)?;
            }
        }

        self.handle_noop_events(noops)
    }

    /// Dispatch one class list, longest-waiting event first.
    fn handle_batch(&mut self, mut events: Vec<Event>) -> SchedulerResult<()> {
        while let Some(event) = events.pop() {
            match event.kind() {
                EventKind::Write | EventKind::CopyBack => self.handle_write(event)?,
                EventKind::ReadCommand if event.is_flexible_read() => {
                    self.handle_flexible_read(event)?
                }
                _ => self.handle_event(event)?,
            }
        }
        Ok(())
    }

    /// Read commands, read transfers, and erases: the address is already
    /// known, only die availability is in question.
    fn handle_event(&mut self, event: Event) -> SchedulerResult<()> {
        let Some(address) = event.physical() else {
            return Err(SchedulerError::UnassignedAddress(event.event_id()));
        };
        let wait = self
            .block_manager
            .in_how_long_can_this_event_be_scheduled(address, event.current_time());
        let die_free =
            self.block_manager
                .can_schedule_on_die(address, event.kind(), event.op_id());
        if die_free && wait <= 0.0 {
            self.execute_next(event)
        } else {
            self.suspend(event, wait);
            Ok(())
        }
    }

    /// Writes and copy-backs: placement first, then the same availability
    /// test. A copy-back whose reserved destination is gone is transformed
    /// into a plain read-then-write migration.
    fn handle_write(&mut self, mut event: Event) -> SchedulerResult<()> {
        match self.block_manager.choose_write_address(&event) {
            Some(address) => {
                let wait = self
                    .block_manager
                    .in_how_long_can_this_event_be_scheduled(address, event.current_time());
                let die_free =
                    self.block_manager
                        .can_schedule_on_die(address, event.kind(), event.op_id());
                if die_free && wait <= 0.0 {
                    self.check_page_bound(address)?;
                    event.set_physical(address);
                    self.ftl.set_replace_address(&mut event);
                    self.execute_next(event)
                } else {
                    self.suspend(event, wait);
                    Ok(())
                }
            }
            None => {
                if event.kind() == EventKind::CopyBack {
                    self.transform_copyback(&mut event);
                }
                self.suspend(event, 0.0);
                Ok(())
            }
        }
    }

    /// A flexible read resolves its replica at dispatch: the block manager
    /// picks a die, the candidate table yields the logical address served
    /// there, and a locked candidate is swapped for an alternative.
    fn handle_flexible_read(&mut self, mut event: Event) -> SchedulerResult<()> {
        let Some(address) = self.block_manager.choose_flexible_read_address(&event) else {
            self.suspend(event, 0.0);
            return Ok(());
        };
        let mut wait = self
            .block_manager
            .in_how_long_can_this_event_be_scheduled(address, event.current_time());
        if wait <= 0.0
            && !self
                .block_manager
                .can_schedule_on_die(address, event.kind(), event.op_id())
        {
            wait = self.config.wait_time;
        }

        let resolved = event
            .flex()
            .and_then(|flex| flex.lba_at(address.package, address.die));
        let locked = resolved.is_some_and(|lba| self.locks.owner(lba).is_some());
        if locked {
            debug!(op = %event.op_id(), package = address.package, die = address.die,
                   "flexible-read candidate locked, asking for an alternative");
            if let Some(flex) = event.flex_mut() {
                flex.find_alternative_immediate_candidate(address.package, address.die);
            }
        }

        match resolved {
            Some(lba) if wait <= 0.0 && !locked => {
                self.check_page_bound(address)?;
                event.set_physical(address);
                event.set_lba(lba);
                if let Some(flex) = event.flex_mut() {
                    flex.register_read_commencement();
                }
                let op_id = event.op_id();
                if let Some(next) = self.deps.queue_mut(op_id).front_mut() {
                    next.set_lba(lba);
                }
                self.deps.record_lba(op_id, lba);
                self.execute_next(event)
            }
            _ => {
                self.suspend(event, wait);
                Ok(())
            }
        }
    }

    /// Convert a copy-back that lost its reserved destination into a read
    /// transfer from the source page plus a queued migration write.
    fn transform_copyback(&mut self, event: &mut Event) {
        let Some(source) = event.replace() else {
            warn!(op = %event.op_id(), "copy-back without a replace address cannot be transformed");
            return;
        };
        event.set_kind(EventKind::ReadTransfer);
        event.set_physical(source);

        let mut write = Event::new(
            EventKind::Write,
            event.lba(),
            event.event_id(),
            event.current_time(),
        );
        write.set_op_id(event.op_id());
        write.set_garbage_collection(true);
        write.set_replace(source);
        self.deps.queue_mut(event.op_id()).push_back(write);
        self.deps.record_kind(event.op_id(), EventKind::Write);
        debug!(op = %event.op_id(), "copy-back transformed into read-transfer + migration write");
    }

    /// Re-queue a suspended event, charging at least the configured
    /// minimum bus-wait penalty.
    fn suspend(&mut self, mut event: Event, wait: SimTime) {
        event.incr_bus_wait(wait.max(self.config.wait_time));
        self.current.push(event);
    }

    fn check_page_bound(&self, address: PhysicalAddress) -> SchedulerResult<()> {
        if address.page >= self.config.block_size {
            return Err(SchedulerError::PageOutOfBounds {
                page: address.page,
                block_size: self.config.block_size,
            });
        }
        Ok(())
    }

    /// Issue the event, then advance its operation's chain or complete the
    /// operation, releasing dependents.
    fn execute_next(&mut self, mut event: Event) -> SchedulerResult<()> {
        let outcome = self.device.issue(&mut event);
        trace!(op = %event.op_id(), kind = ?event.kind(), time = event.current_time(),
               flexible = event.is_flexible_read(), "issued");
        if outcome == IssueOutcome::Failure {
            warn!(op = %event.op_id(), event = %event.event_id(), "device reported failure");
            let event_id = event.event_id();
            self.deps.remove_op(event.op_id());
            self.device.register_event_completion(event);
            return Err(SchedulerError::DeviceFailure(event_id));
        }
        self.stats.events_dispatched += 1;
        self.register_outcome(&event, outcome);

        let op_id = event.op_id();
        let next = if self.deps.remaining(op_id) > 0 {
            self.deps.advance(op_id, &event)
        } else {
            None
        };
        match next {
            Some(next) => {
                // The next sub-event may target a different address or
                // kind; the lock follows the head of the chain.
                self.locks.release(event.lba());
                self.locks.set_owner(next.lba(), op_id);
                self.admit(next)?;
            }
            None => {
                self.deps.remove_op(op_id);
                let lba = self.deps.lba_of(op_id).unwrap_or(event.lba());
                if event.kind() != EventKind::Erase && !event.is_flexible_read() {
                    if self.locks.release(lba).is_none() {
                        return Err(SchedulerError::LockMissing { lba, op_id });
                    }
                } else if self.locks.is_owner(lba, op_id) {
                    self.locks.release(lba);
                }
                self.complete_op(op_id, event.current_time())?;
            }
        }
        self.device.register_event_completion(event);
        Ok(())
    }

    /// Fan a successful completion out to the FTL and block manager.
    fn register_outcome(&mut self, event: &Event, outcome: IssueOutcome) {
        match event.kind() {
            EventKind::Write | EventKind::CopyBack => {
                self.ftl.register_write_completion(event, outcome);
                self.block_manager.register_write_outcome(event, outcome);
            }
            EventKind::Erase => self.block_manager.register_erase_outcome(event, outcome),
            EventKind::ReadCommand => self
                .block_manager
                .register_read_command_outcome(event, outcome),
            EventKind::ReadTransfer => {
                self.ftl.register_read_completion(event, outcome);
                self.block_manager
                    .register_read_transfer_outcome(event, outcome);
            }
            EventKind::Trim => {
                self.ftl.register_trim_completion(event);
                self.block_manager.trim(event);
            }
            EventKind::Read | EventKind::GarbageCollection => {
                warn!(op = %event.op_id(), kind = ?event.kind(), "completed event of unexpected kind");
            }
        }
    }

    /// Erase the operation's bookkeeping and re-admit the heads of every
    /// operation that was blocked on it.
    fn complete_op(&mut self, op_id: OpId, now: SimTime) -> SchedulerResult<()> {
        for head in self.deps.complete(op_id, now) {
            self.admit(head)?;
        }
        Ok(())
    }

    /// Drain cancelled operations: every remaining sub-event is released
    /// without touching the device, then dependents are admitted.
    fn handle_noop_events(&mut self, events: Vec<Event>) -> SchedulerResult<()> {
        for event in events {
            let op_id = event.op_id();
            debug!(op = %op_id, "draining cancelled operation");
            for sub_event in self.deps.drain_op(op_id) {
                self.device.register_event_completion(sub_event);
            }
            self.deps.clear_meta(op_id);
            self.complete_op(op_id, event.current_time())?;
            self.stats.noops_completed += 1;
            self.device.register_event_completion(event);
        }
        Ok(())
    }

    /// Admission: the original entry point for an operation's head event,
    /// re-entered as chains advance and dependents release.
    ///
    /// Performs the per-kind arrival side effects, rewrites virtual reads,
    /// runs the redundancy guard, and places the event into the current
    /// map — or parks it, if the resolver decided it must wait.
    pub(crate) fn admit(&mut self, mut event: Event) -> SchedulerResult<()> {
        if event.is_noop() && event.kind() != EventKind::GarbageCollection {
            self.current.push(event);
            return Ok(());
        }
        match event.kind() {
            EventKind::Read => {
                event.set_kind(EventKind::ReadCommand);
                let transfer = event.derive_transfer();
                self.deps.queue_mut(event.op_id()).push_front(transfer);
                self.admit(event)
            }
            EventKind::ReadCommand | EventKind::ReadTransfer if event.is_flexible_read() => {
                // Replica selection happens at dispatch; no lock is taken
                // until the read commences.
                self.current.push(event);
                Ok(())
            }
            EventKind::ReadCommand | EventKind::ReadTransfer => {
                self.ftl.set_read_address(&mut event);
                self.guarded_push(event)
            }
            EventKind::Write => {
                self.block_manager.register_write_arrival(&event);
                self.guarded_push(event)
            }
            EventKind::Trim => {
                self.ftl.set_replace_address(&mut event);
                self.guarded_push(event)
            }
            EventKind::CopyBack => self.guarded_push(event),
            EventKind::Erase => {
                self.current.push(event);
                Ok(())
            }
            EventKind::GarbageCollection => self.inject_migrations(event),
        }
    }

    /// Expand a garbage-collection request into its migrations, register
    /// each under its own operation, and admit the heads. The request
    /// itself is consumed.
    fn inject_migrations(&mut self, event: Event) -> SchedulerResult<()> {
        let migrations = self.block_manager.migrate(&event);
        debug!(op = %event.op_id(), migrations = migrations.len(), "garbage collection request expanded");
        for mut migration in migrations {
            let Some(first) = migration.pop_front() else {
                continue;
            };
            let op_id = first.op_id();
            // The op's canonical kind is the payload kind: the write (or
            // copy-back) that follows the leading read.
            let canonical = migration.front().map_or(first.kind(), Event::kind);
            self.deps.insert_queue(op_id, migration)?;
            self.deps.record_lba(op_id, first.lba());
            self.deps.record_kind(op_id, canonical);
            self.admit(first)?;
        }
        // The request op is fully consumed; drop its bookkeeping.
        self.deps.remove_op(event.op_id());
        self.deps.clear_meta(event.op_id());
        Ok(())
    }
}

fn sort_by_bus_wait(events: &mut [Event]) {
    events.sort_by(|a, b| a.bus_wait_time().total_cmp(&b.bus_wait_time()));
}

fn sort_by_overall_wait(events: &mut [Event]) {
    events.sort_by(|a, b| a.overall_wait_time().total_cmp(&b.overall_wait_time()));
}
