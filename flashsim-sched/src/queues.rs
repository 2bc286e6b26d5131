//! The two event queues: the future bag and the time-bucketed current map.

use crate::rng::SchedulerRng;
use flashsim_core::{tick_of, Event, OpId, SimTime};
use std::collections::BTreeMap;

/// Events not yet admitted: an unordered bag of events whose time lies at
/// or beyond the next tick.
#[derive(Debug, Default)]
pub(crate) struct FutureEvents {
    events: Vec<Event>,
}

impl FutureEvents {
    pub(crate) fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    /// The earliest timestamp in the bag.
    pub(crate) fn soonest_time(&self) -> Option<SimTime> {
        self.events
            .iter()
            .map(Event::current_time)
            .min_by(f64::total_cmp)
    }

    /// Remove and return every event due before `cutoff`.
    ///
    /// The whole bag is shuffled first so events sharing a timestamp are
    /// admitted in seed-determined order rather than arrival order.
    pub(crate) fn take_due(&mut self, cutoff: SimTime, rng: &mut SchedulerRng) -> Vec<Event> {
        rng.shuffle(&mut self.events);
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.events.len() {
            if self.events[i].current_time() < cutoff {
                due.push(self.events.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due
    }
}

/// Admitted events, bucketed by integer tick. The smallest key is "now".
#[derive(Debug, Default)]
pub(crate) struct CurrentEvents {
    buckets: BTreeMap<i64, Vec<Event>>,
}

impl CurrentEvents {
    pub(crate) fn push(&mut self, event: Event) {
        let tick = tick_of(event.current_time());
        self.buckets.entry(tick).or_default().push(event);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub(crate) fn soonest_tick(&self) -> Option<i64> {
        self.buckets.keys().next().copied()
    }

    /// Remove and return the entire bucket at the smallest key.
    pub(crate) fn pop_soonest(&mut self) -> Option<Vec<Event>> {
        let tick = self.soonest_tick()?;
        self.buckets.remove(&tick)
    }

    /// Find the queued event belonging to `op_id`, if it is parked here.
    pub(crate) fn find_mut(&mut self, op_id: OpId) -> Option<&mut Event> {
        self.buckets
            .values_mut()
            .flat_map(|events| events.iter_mut())
            .find(|event| event.op_id() == op_id)
    }
}
