//! Elapsed-time computation.
//!
//! Every backend and the engine derive a timer's elapsed time from the same
//! functions here, so the result depends only on the stored timer, the
//! timer's slices and the current time, never on which backend holds them.
//!
//! # Rules
//!
//! 1. A closed slice contributes `finish - start`, truncated to milliseconds.
//! 2. The timer's active slice contributes `now - start`, or zero if `now` is
//!    earlier. Any other open slice contributes nothing.
//! 3. Slices belonging to other timers are ignored.

use chrono::{DateTime, Utc};

use crate::time_slice::TimeSlice;
use crate::timer::Timer;

/// Duration of a closed slice in milliseconds.
pub fn slice_elapsed_ms(start: DateTime<Utc>, finish: DateTime<Utc>) -> i64 {
    finish.signed_duration_since(start).num_milliseconds()
}

/// Sum of the timer's closed slices. This is what a backend reports.
pub fn closed_elapsed_ms(timer: &Timer, slices: &[TimeSlice]) -> i64 {
    slices
        .iter()
        .filter(|slice| slice.timer_id == timer.id)
        .filter_map(|slice| {
            slice
                .finish
                .map(|finish| slice_elapsed_ms(slice.start, finish))
        })
        .sum()
}

/// Closed slices plus the live delta of the active slice at `now`.
pub fn elapsed_ms(timer: &Timer, slices: &[TimeSlice], now: DateTime<Utc>) -> i64 {
    let live_ms = timer.active_time_slice_id.as_ref().map_or(0, |active| {
        slices
            .iter()
            .find(|slice| &slice.id == active && slice.timer_id == timer.id && slice.is_open())
            .map_or(0, |slice| slice_elapsed_ms(slice.start, now).max(0))
    });
    closed_elapsed_ms(timer, slices) + live_ms
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::time_slice::TimeSlicePartial;
    use crate::timer::TimerPartial;
    use crate::types::TimerId;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn slice(timer_id: &TimerId, start: i64, finish: Option<i64>) -> TimeSlice {
        TimeSlice::create(
            TimeSlicePartial {
                timer_id: Some(timer_id.clone()),
                start: Some(ts(start)),
                finish: finish.map(ts),
                ..TimeSlicePartial::default()
            },
            ts(0),
        )
        .unwrap()
    }

    #[test]
    fn empty_timer_has_no_elapsed_time() {
        let timer = Timer::create(TimerPartial::default(), ts(0));
        assert_eq!(elapsed_ms(&timer, &[], ts(100)), 0);
    }

    #[test]
    fn sums_closed_slices() {
        let timer = Timer::create(TimerPartial::default(), ts(0));
        let slices = vec![
            slice(&timer.id, 0, Some(10)),
            slice(&timer.id, 20, Some(25)),
        ];
        assert_eq!(closed_elapsed_ms(&timer, &slices), 15_000);
        assert_eq!(elapsed_ms(&timer, &slices, ts(1_000)), 15_000);
    }

    #[test]
    fn folds_active_slice_delta() {
        let mut timer = Timer::create(TimerPartial::default(), ts(0));
        let slices = vec![slice(&timer.id, 0, Some(10)), slice(&timer.id, 20, None)];
        timer.active_time_slice_id = Some(slices[1].id.clone());

        assert_eq!(closed_elapsed_ms(&timer, &slices), 10_000);
        assert_eq!(elapsed_ms(&timer, &slices, ts(21)), 11_000);
        assert_eq!(elapsed_ms(&timer, &slices, ts(30)), 20_000);
    }

    #[test]
    fn open_slice_never_counts_negative() {
        let mut timer = Timer::create(TimerPartial::default(), ts(0));
        let slices = vec![slice(&timer.id, 20, None)];
        timer.active_time_slice_id = Some(slices[0].id.clone());
        assert_eq!(elapsed_ms(&timer, &slices, ts(10)), 0);
    }

    #[test]
    fn open_slice_that_is_not_active_adds_nothing() {
        let mut timer = Timer::create(TimerPartial::default(), ts(0));
        let slices = vec![slice(&timer.id, 0, Some(10)), slice(&timer.id, 20, None)];
        assert_eq!(elapsed_ms(&timer, &slices, ts(3_600)), 10_000);

        let active = slice(&timer.id, 30, None);
        timer.active_time_slice_id = Some(active.id.clone());
        let slices = [slices, vec![active]].concat();
        assert_eq!(elapsed_ms(&timer, &slices, ts(40)), 20_000);
    }

    #[test]
    fn ignores_other_timers() {
        let timer = Timer::create(TimerPartial::default(), ts(0));
        let other = TimerId::new("other").unwrap();
        let slices = vec![slice(&timer.id, 0, Some(1)), slice(&other, 0, Some(60))];
        assert_eq!(elapsed_ms(&timer, &slices, ts(100)), 1_000);
    }

    #[test]
    fn truncates_to_milliseconds() {
        let start = ts(0);
        let finish = start + Duration::microseconds(1_999);
        assert_eq!(slice_elapsed_ms(start, finish), 1);
    }
}
