/*
    QxFDC
    MB8877 floppy disk controller emulation for the Yamaha QX1

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    devices::fdc::scheduler.rs

    Deferred, cancellable controller events on a microsecond clock.
*/

//! The controller never blocks. Anything that takes time on a real drive (head steps, settling,
//! the gap between sectors, a host that stops servicing DRQ) is a [ScheduledEvent] that fires
//! back into the controller when the clock passes its fire time. There is at most one pending
//! event of each [EventKind]; scheduling a kind again replaces the pending instance.
//!
//! Each event carries the [CommandType] that registered it. The controller discards events
//! whose owner no longer matches the current command.

use crate::device_types::fdc::CommandType;
use strum::EnumCount;
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter};

#[derive(Copy, Clone, Debug, Display, EnumCountMacro, EnumIter, PartialEq, Eq)]
pub enum EventKind {
    /// One head step toward the seek target.
    Seek,
    /// Completion of a Type I command that needs no step.
    SeekEnd,
    /// The searched record arrived under the head. Raises DRQ.
    Search,
    /// A Force Interrupt takes effect.
    Type4,
    /// Multi-sector continuation: advance the sector register.
    Multi1,
    /// Multi-sector continuation: search for the next sector.
    Multi2,
    /// The host failed to service DRQ in time.
    Lost,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScheduledEvent {
    pub kind: EventKind,
    pub fire_time: f64,
    pub owner: CommandType,
    seq: u64,
}

pub struct EventScheduler {
    now: f64,
    seq: u64,
    pending: [Option<ScheduledEvent>; EventKind::COUNT],
    fired: [u64; EventKind::COUNT],
    stale: [u64; EventKind::COUNT],
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventScheduler {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            seq: 0,
            pending: [None; EventKind::COUNT],
            fired: [0; EventKind::COUNT],
            stale: [0; EventKind::COUNT],
        }
    }

    /// The current time in microseconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Register an event to fire `delay_us` from now, replacing any pending event of the same kind.
    pub fn schedule(&mut self, kind: EventKind, delay_us: f64, owner: CommandType) {
        let seq = self.seq;
        self.seq += 1;
        let slot = &mut self.pending[kind as usize];
        if let Some(old) = slot {
            log::trace!("Replacing pending {} event due at {:.1}us", kind, old.fire_time);
        }
        *slot = Some(ScheduledEvent {
            kind,
            fire_time: self.now + delay_us.max(0.0),
            owner,
            seq,
        });
    }

    /// Remove a pending event without firing it. Returns true if one was pending.
    pub fn cancel(&mut self, kind: EventKind) -> bool {
        self.pending[kind as usize].take().is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending = [None; EventKind::COUNT];
    }

    pub fn is_pending(&self, kind: EventKind) -> bool {
        self.pending[kind as usize].is_some()
    }

    pub fn fire_time(&self, kind: EventKind) -> Option<f64> {
        self.pending[kind as usize].map(|e| e.fire_time)
    }

    /// Return all pending events in firing order.
    pub fn pending(&self) -> Vec<ScheduledEvent> {
        let mut events: Vec<ScheduledEvent> = self.pending.iter().flatten().copied().collect();
        events.sort_by(|a, b| a.fire_time.total_cmp(&b.fire_time).then(a.seq.cmp(&b.seq)));
        events
    }

    /// Remove and return the earliest event due at or before `until`, advancing the clock to its
    /// fire time. Ties fire in the order they were scheduled.
    pub fn pop_due(&mut self, until: f64) -> Option<ScheduledEvent> {
        let next = self
            .pending
            .iter()
            .flatten()
            .filter(|e| e.fire_time <= until)
            .min_by(|a, b| a.fire_time.total_cmp(&b.fire_time).then(a.seq.cmp(&b.seq)))
            .copied()?;

        self.pending[next.kind as usize] = None;
        self.now = self.now.max(next.fire_time);
        self.fired[next.kind as usize] += 1;
        Some(next)
    }

    /// Advance the clock with no events firing.
    pub fn advance_to(&mut self, until: f64) {
        if until > self.now {
            self.now = until;
        }
    }

    /// Record that a fired event was discarded as stale.
    pub fn note_stale(&mut self, kind: EventKind) {
        self.stale[kind as usize] += 1;
    }

    /// The number of events of this kind that have fired, including stale ones.
    pub fn fired_count(&self, kind: EventKind) -> u64 {
        self.fired[kind as usize]
    }

    pub fn stale_count(&self, kind: EventKind) -> u64 {
        self.stale[kind as usize]
    }

    pub fn reset_counters(&mut self) {
        self.fired = [0; EventKind::COUNT];
        self.stale = [0; EventKind::COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_fires_in_time_order() {
        let mut sched = EventScheduler::new();
        sched.schedule(EventKind::Lost, 500.0, CommandType::ReadSector);
        sched.schedule(EventKind::Search, 200.0, CommandType::ReadSector);
        sched.schedule(EventKind::Multi1, 200.0, CommandType::ReadSector);

        assert!(sched.pop_due(100.0).is_none());
        let e = sched.pop_due(1000.0).unwrap();
        assert_eq!(e.kind, EventKind::Search);
        assert_eq!(sched.now(), 200.0);
        // Same fire time: scheduling order breaks the tie.
        assert_eq!(sched.pop_due(1000.0).unwrap().kind, EventKind::Multi1);
        assert_eq!(sched.pop_due(1000.0).unwrap().kind, EventKind::Lost);
        assert!(sched.pop_due(1000.0).is_none());
    }

    #[test]
    fn test_reschedule_replaces() {
        let mut sched = EventScheduler::new();
        sched.schedule(EventKind::Seek, 6000.0, CommandType::Seek);
        sched.schedule(EventKind::Seek, 12000.0, CommandType::Seek);
        assert_eq!(sched.pending().len(), 1);
        assert_eq!(sched.fire_time(EventKind::Seek), Some(12000.0));
        assert!(sched.pop_due(7000.0).is_none());
    }

    #[test]
    fn test_cancel() {
        let mut sched = EventScheduler::new();
        for kind in EventKind::iter() {
            sched.schedule(kind, 10.0, CommandType::Seek);
        }
        assert_eq!(sched.pending().len(), EventKind::COUNT);
        assert!(sched.cancel(EventKind::Lost));
        assert!(!sched.cancel(EventKind::Lost));
        assert!(!sched.is_pending(EventKind::Lost));
        sched.cancel_all();
        assert!(sched.pop_due(f64::MAX).is_none());
        for kind in EventKind::iter() {
            assert_eq!(sched.fired_count(kind), 0);
        }
    }

    #[test]
    fn test_delay_is_relative_to_now() {
        let mut sched = EventScheduler::new();
        sched.advance_to(1000.0);
        sched.schedule(EventKind::Type4, 100.0, CommandType::ForceInterrupt);
        assert_eq!(sched.fire_time(EventKind::Type4), Some(1100.0));
        let e = sched.pop_due(2000.0).unwrap();
        assert_eq!(e.owner, CommandType::ForceInterrupt);
        assert_eq!(sched.fired_count(EventKind::Type4), 1);
    }
}
