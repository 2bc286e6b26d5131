//! End-to-end scheduling scenarios.

use crate::harness::{build, event, make_die_busy, run};
use flashsim_core::{Event, EventId, EventKind, Lba, OpId, PhysicalAddress, SchedulerConfig};
use std::collections::VecDeque;

#[test]
fn read_decomposes_into_command_and_transfer() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    scheduler
        .schedule_event(event(EventKind::Read, 100, 1, 0.0))
        .unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let kinds: Vec<_> = recorder.issued.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, [EventKind::ReadCommand, EventKind::ReadTransfer]);
    assert!(recorder.issued.iter().all(|i| i.lba == Lba(100)));
    assert!(recorder.issued.iter().all(|i| i.op == OpId(1)));
    // Command at t=4, transfer at t=4+10.
    assert_eq!(recorder.issued[0].completed_at, 4.0);
    assert_eq!(recorder.issued[1].completed_at, 14.0);
}

#[test]
fn second_write_to_same_lba_cancels_the_first() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    scheduler
        .schedule_event(event(EventKind::Write, 7, 1, 0.0))
        .unwrap();
    scheduler
        .schedule_event(event(EventKind::Write, 7, 2, 0.0))
        .unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    assert_eq!(recorder.issued_of_kind(EventKind::Write).len(), 1);
    assert_eq!(scheduler.stats().num_write_cancellations, 1);
    assert!(
        recorder
            .released
            .iter()
            .any(|r| r.kind == EventKind::Write && r.noop),
        "the cancelled write should drain through the noop path"
    );
}

#[test]
fn three_writes_to_same_lba_dispatch_once() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    for id in 1..=3 {
        scheduler
            .schedule_event(event(EventKind::Write, 7, id, 0.0))
            .unwrap();
    }
    run(&mut scheduler);

    assert_eq!(
        harness
            .recorder
            .borrow()
            .issued_of_kind(EventKind::Write)
            .len(),
        1
    );
    assert_eq!(scheduler.stats().num_write_cancellations, 2);
}

#[test]
fn read_after_write_serializes_on_the_lba() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    // Park the write: its die is busy until t=10, so it is still pending
    // when the read arrives.
    make_die_busy(&harness, 0, 0, 10.0);
    scheduler
        .schedule_event(event(EventKind::Write, 7, 1, 0.0))
        .unwrap();
    scheduler
        .schedule_event(event(EventKind::Read, 7, 2, 1.5))
        .unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let kinds: Vec<_> = recorder.issued.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        [
            EventKind::Write,
            EventKind::ReadCommand,
            EventKind::ReadTransfer
        ]
    );
    // The read only started after the write completed at t=30.
    assert_eq!(recorder.issued[0].completed_at, 30.0);
    assert!(recorder.issued[1].completed_at > 30.0);
    assert_eq!(scheduler.stats().num_write_cancellations, 0);
}

#[test]
fn trim_cancels_the_pending_write() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    make_die_busy(&harness, 0, 0, 10.0);
    scheduler
        .schedule_event(event(EventKind::Write, 7, 1, 0.0))
        .unwrap();
    scheduler
        .schedule_event(event(EventKind::Trim, 7, 2, 1.5))
        .unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let kinds: Vec<_> = recorder.issued.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, [EventKind::Trim]);
    assert_eq!(recorder.trimmed, [Lba(7)]);
    assert_eq!(scheduler.stats().num_write_cancellations, 1);
    assert!(
        recorder
            .released
            .iter()
            .any(|r| r.kind == EventKind::Write && r.noop)
    );
}

#[test]
fn gc_write_folds_into_the_pending_user_write() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    make_die_busy(&harness, 0, 0, 10.0);
    scheduler
        .schedule_event(event(EventKind::Write, 7, 1, 0.0))
        .unwrap();
    let mut migration_write = event(EventKind::Write, 7, 2, 1.5);
    migration_write.set_garbage_collection(true);
    scheduler.schedule_event(migration_write).unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let writes = recorder.issued_of_kind(EventKind::Write);
    assert_eq!(writes.len(), 1, "only one physical write must happen");
    assert_eq!(writes[0].op, OpId(1), "the user write survives");
    assert!(writes[0].gc, "the surviving write inherits the GC flag");
    assert_eq!(scheduler.stats().num_write_cancellations, 1);
}

#[test]
fn flexible_read_moves_to_an_unlocked_replica() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    // Lock LBA 100: a write to it sits parked on busy die 0.
    make_die_busy(&harness, 0, 0, 10.0);
    scheduler
        .schedule_event(event(EventKind::Write, 100, 1, 0.0))
        .unwrap();
    // Candidate table: die 0 serves LBA 100 (locked), die 1 serves LBA 200.
    let flex = Event::flexible_read(
        vec![vec![Some(Lba(100)), Some(Lba(200))]],
        EventId(2),
        1.5,
    );
    scheduler.schedule_event(flex).unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let commands = recorder.issued_of_kind(EventKind::ReadCommand);
    assert_eq!(commands.len(), 1);
    let command = commands[0];
    assert_eq!(
        command.physical.map(|a| (a.package, a.die)),
        Some((0, 1)),
        "the read must land on the alternative die"
    );
    assert_eq!(command.lba, Lba(200));
    // Its transfer follows under the same op at the resolved LBA.
    let transfers = recorder.issued_of_kind(EventKind::ReadTransfer);
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].lba, Lba(200));
    assert_eq!(transfers[0].op, command.op);
    // The parked write still went through.
    assert_eq!(recorder.issued_of_kind(EventKind::Write).len(), 1);
}

#[test]
fn gc_request_expands_into_migrations() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    // One migration: read LBA 50, then rewrite it elsewhere.
    let mut migration: VecDeque<Event> = VecDeque::new();
    let mut read = event(EventKind::Read, 50, 10, 0.0);
    read.set_op_id(OpId(10));
    read.set_garbage_collection(true);
    let mut write = event(EventKind::Write, 50, 11, 0.0);
    write.set_op_id(OpId(10));
    write.set_garbage_collection(true);
    migration.push_back(read);
    migration.push_back(write);
    harness.bm.borrow_mut().migrations.push(migration);

    scheduler
        .schedule_event(event(EventKind::GarbageCollection, 0, 1, 0.0))
        .unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let kinds: Vec<_> = recorder.issued.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        [
            EventKind::ReadCommand,
            EventKind::ReadTransfer,
            EventKind::Write
        ]
    );
    assert!(recorder.issued.iter().all(|i| i.gc));
    assert!(recorder.issued.iter().all(|i| i.op == OpId(10)));
}

#[test]
fn mapping_read_runs_as_its_own_operation_before_the_write() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    // A write whose target mapping must be paged in first: the leading
    // mapping read is split off and the write waits on it.
    let mut mapping_read = event(EventKind::Read, 900, 10, 0.0);
    mapping_read.set_op_id(OpId(11));
    mapping_read.set_mapping_op(true);
    mapping_read.set_original_application_io(true);
    let mut write = event(EventKind::Write, 7, 11, 0.0);
    write.set_original_application_io(true);
    scheduler
        .schedule_events_queue(VecDeque::from([mapping_read, write]))
        .unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let issued: Vec<_> = recorder.issued.iter().map(|i| (i.kind, i.lba)).collect();
    assert_eq!(
        issued,
        [
            (EventKind::ReadCommand, Lba(900)),
            (EventKind::ReadTransfer, Lba(900)),
            (EventKind::Write, Lba(7)),
        ]
    );
    // The mapping read ran under its own op id.
    assert_eq!(recorder.issued[0].op, OpId(10));
    assert_eq!(recorder.issued[2].op, OpId(11));
}

#[test]
fn scheme_controls_same_tick_dispatch_order() {
    use flashsim_core::SchedulingScheme;

    let order_under = |scheme: SchedulingScheme| {
        let (mut scheduler, harness) = build(SchedulerConfig::with_scheme(scheme));
        make_die_busy(&harness, 0, 0, 10.0);
        let mut gc_write = event(EventKind::Write, 3, 1, 0.0);
        gc_write.set_garbage_collection(true);
        scheduler.schedule_event(gc_write).unwrap();
        scheduler
            .schedule_event(event(EventKind::Read, 5, 2, 1.5))
            .unwrap();
        run(&mut scheduler);
        let recorder = harness.recorder.borrow();
        recorder.issued.iter().map(|i| i.kind).collect::<Vec<_>>()
    };

    // Application priority serves the read chain before the GC write; GC
    // priority does the opposite.
    let application = order_under(SchedulingScheme::ApplicationPriority);
    assert_eq!(application[0], EventKind::ReadCommand);
    assert_eq!(application.last(), Some(&EventKind::Write));

    let gc_first = order_under(SchedulingScheme::GcPriority);
    assert_eq!(gc_first[0], EventKind::Write);
    assert_eq!(gc_first.last(), Some(&EventKind::ReadTransfer));
}

#[test]
fn copyback_without_a_slot_becomes_read_then_write() {
    let (mut scheduler, harness) = build(SchedulerConfig::default());
    // The first placement request finds no slot; the retry succeeds.
    harness.bm.borrow_mut().refuse_writes = 1;
    let mut copyback = event(EventKind::CopyBack, 30, 1, 0.0);
    copyback.set_replace(PhysicalAddress::new(0, 0, 0, 0, 30));
    scheduler.schedule_event(copyback).unwrap();
    run(&mut scheduler);

    let recorder = harness.recorder.borrow();
    let kinds: Vec<_> = recorder.issued.iter().map(|i| i.kind).collect();
    assert_eq!(kinds, [EventKind::ReadTransfer, EventKind::Write]);
    // The transfer reads the source page the copy-back was moving.
    assert_eq!(
        recorder.issued[0].physical,
        Some(PhysicalAddress::new(0, 0, 0, 0, 30))
    );
    assert!(recorder.issued[1].gc, "the replacement write is a migration");
    assert_eq!(recorder.issued[1].op, OpId(1));
}
