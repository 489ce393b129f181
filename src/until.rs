// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::time::Duration;

use tokio::time::{sleep, timeout_at};
use tracing::{debug, info_span, trace, Instrument};

use crate::bound::{Bound, ErrorHandler};
use crate::deadline::Deadline;
use crate::error::{Expectation, PersevereError};
use crate::probe::Probe;

const MIN_SLEEP: Duration = Duration::from_millis(1);

/// The outcome of racing a single probe attempt against the deadline.
enum Attempt<T, E> {
    Resolved(T),
    Failed(E),
    TimedOut,
}

/// A probe bound to a time window, waiting on one of the terminal expectations.
///
/// Each terminal call starts a fresh evaluation: its deadline is measured from the moment
/// the call begins, not from when the chain was configured.
pub struct Until<P> {
    bound: Bound,
    poll_interval: Duration,
    error_handler: Option<ErrorHandler>,
    probe: P,
}

impl<P> Until<P> {
    pub(crate) fn new(
        bound: Bound,
        poll_interval: Duration,
        error_handler: Option<ErrorHandler>,
        probe: P,
    ) -> Until<P> {
        Until {
            bound,
            poll_interval,
            error_handler,
            probe,
        }
    }
}

impl<P> Until<P>
where
    P: Probe,
    P::Output: fmt::Debug,
{
    /// Persevere, polling the probe, until it yields the expected value or the bounds are
    /// breached. Returns the value the probe yielded.
    pub async fn yields_value(
        &mut self,
        expected: P::Output,
    ) -> Result<P::Output, PersevereError<P::Error>>
    where
        P::Output: PartialEq,
    {
        self.evaluate(Expectation::YieldsValue, |actual| *actual == expected)
            .await
    }

    /// Persevere, polling the probe, until it yields a value satisfying the predicate or
    /// the bounds are breached. Returns the value the probe yielded.
    pub async fn satisfies<F>(
        &mut self,
        predicate: F,
    ) -> Result<P::Output, PersevereError<P::Error>>
    where
        F: FnMut(&P::Output) -> bool,
    {
        self.evaluate(Expectation::Satisfies, predicate).await
    }

    /// Persevere, polling the probe, until it stops failing or the bounds are breached.
    /// Failures before then are swallowed. Returns the value the probe yielded.
    pub async fn no_exceptions(&mut self) -> Result<P::Output, PersevereError<P::Error>> {
        self.evaluate(Expectation::NoExceptions, |_| true).await
    }

    async fn evaluate<F>(
        &mut self,
        expectation: Expectation,
        qualifies: F,
    ) -> Result<P::Output, PersevereError<P::Error>>
    where
        F: FnMut(&P::Output) -> bool,
    {
        let span = info_span!(
            "persevere",
            %expectation,
            min_ms = self.bound.min_millis(),
            max_ms = self.bound.max_millis(),
            poll_ms = self.poll_interval.as_millis() as u64
        );
        self.poll(expectation, qualifies).instrument(span).await
    }

    async fn poll<F>(
        &mut self,
        expectation: Expectation,
        mut qualifies: F,
    ) -> Result<P::Output, PersevereError<P::Error>>
    where
        F: FnMut(&P::Output) -> bool,
    {
        let started = Deadline::now();
        let deadline = started.plus_millis(self.bound.max_millis());
        let earliest = self.bound.min_millis().map(|min| started.plus_millis(min));

        let mut last_value: Option<P::Output> = None;
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;

            match self.race(&deadline).await {
                Attempt::Resolved(value) if qualifies(&value) => {
                    if earliest.is_some_and(|earliest| earliest.is_in_future()) {
                        debug!(attempt, "Condition held before the minimum wait time.");
                        return Err(self.fail(PersevereError::Premature { expectation }, Some(&value)));
                    }

                    debug!(attempt, "Condition held.");
                    return Ok(value);
                }
                Attempt::Resolved(value) => {
                    trace!(attempt, ?value, "Condition not held yet.");
                    last_value = Some(value);
                }
                Attempt::Failed(_) if expectation.retries_failures() => {
                    trace!(attempt, "Probe failed, retrying.");
                }
                Attempt::Failed(err) => {
                    debug!(attempt, "Probe failed.");
                    return Err(PersevereError::Probe(err));
                }
                Attempt::TimedOut => {
                    debug!(attempt, "Probe did not settle before the deadline.");
                }
            }

            // A zero interval still waits a tick so a paused clock can reach the deadline.
            let remaining = deadline.remaining();
            trace!(attempt, remaining_ms = remaining.as_millis() as u64, "Sleeping.");
            sleep(self.poll_interval.max(MIN_SLEEP).min(remaining)).await;

            if !deadline.is_in_future() {
                break;
            }
        }

        debug!(attempt, "Deadline exceeded.");
        Err(self.fail(
            PersevereError::DeadlineExceeded {
                expectation,
                max_millis: self.bound.max_millis(),
                lower_bounded: self.bound.min_millis().is_some(),
            },
            last_value.as_ref(),
        ))
    }

    /// Runs one probe attempt, giving up on it once the deadline passes. An attempt that
    /// loses the race is dropped and its outcome is never observed.
    async fn race(&mut self, deadline: &Deadline) -> Attempt<P::Output, P::Error> {
        match timeout_at(deadline.instant(), self.probe.attempt()).await {
            Ok(Ok(value)) => Attempt::Resolved(value),
            Ok(Err(err)) => Attempt::Failed(err),
            Err(_) => Attempt::TimedOut,
        }
    }

    /// Passes a bound violation through the error handler, if one is configured.
    fn fail(
        &self,
        err: PersevereError<P::Error>,
        last_value: Option<&P::Output>,
    ) -> PersevereError<P::Error> {
        match (&self.error_handler, err.failure_message()) {
            (Some(handler), Some(message)) => PersevereError::Handled(handler(
                &message,
                last_value.map(|value| value as &dyn fmt::Debug),
            )),
            _ => err,
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use tokio::time::{sleep, Instant};

    use crate::bound::{AtLeast, Binding, Bound};
    use crate::deadline::Deadline;
    use crate::error::PersevereError;
    use crate::unit::TemporalUnit;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("Not ready!")]
    struct NotReady;

    fn at_most(max_millis: u64) -> Binding {
        Binding::new(Bound::upper_only(max_millis))
    }

    fn between(min_millis: u64, max_millis: u64) -> Binding {
        AtLeast::new(min_millis)
            .and_at_most(max_millis, TemporalUnit::Milliseconds)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_yields_value_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let value = at_most(1_000)
            .until(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { 5 }
            })
            .yields_value(5)
            .await
            .unwrap();

        assert_eq!(5, value);
        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert_eq!(Duration::ZERO, start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_yields_value_within_allotted_time() {
        let pass_after = Deadline::now().plus_millis(1_000);

        let value = at_most(3_000)
            .with_poll_interval(50, TemporalUnit::Milliseconds)
            .unwrap()
            .until(|| async move {
                if pass_after.is_in_past() {
                    2
                } else {
                    0
                }
            })
            .yields_value(2)
            .await
            .unwrap();

        assert_eq!(2, value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_yields_value_deadline_exceeded() {
        let start = Instant::now();

        let err = at_most(500)
            .with_poll_interval(50, TemporalUnit::Milliseconds)
            .unwrap()
            .until(|| async { 0 })
            .yields_value(2)
            .await
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert_eq!(
            "The provided function did not yield the expected value within the allotted time (500 millis)",
            err.to_string()
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(510));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_does_not_overrun_deadline() {
        let start = Instant::now();

        let err = at_most(500)
            .until(|| async {
                sleep(Duration::from_secs(10)).await;
                "success"
            })
            .yields_value("success")
            .await
            .unwrap_err();

        assert_eq!(
            "The provided function did not yield the expected value within the allotted time (500 millis)",
            err.to_string()
        );
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfies_within_allotted_time() {
        let pass_after = Deadline::now().plus_millis(1_000);

        let value = at_most(3_000)
            .with_poll_interval(50, TemporalUnit::Milliseconds)
            .unwrap()
            .until(|| async move {
                if pass_after.is_in_past() {
                    "Hello World"
                } else {
                    "Goodbye World!"
                }
            })
            .satisfies(|value| value.starts_with("Hello"))
            .await
            .unwrap();

        assert_eq!("Hello World", value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_satisfies_slow_probe() {
        let err = at_most(500)
            .until(|| async {
                sleep(Duration::from_secs(10)).await;
                "success"
            })
            .satisfies(|value| *value == "success")
            .await
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_premature_yield() {
        let err = between(1_000, 2_000)
            .until(|| async { 5 })
            .yields_value(5)
            .await
            .unwrap_err();

        assert!(err.is_premature());
        assert_eq!(
            "The provided function yielded the value before it was supposed to!",
            err.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_premature_satisfies() {
        let err = between(1_000, 2_000)
            .until(|| async { "Hello World" })
            .satisfies(|value| value.starts_with("Hello"))
            .await
            .unwrap_err();

        assert!(err.is_premature());
    }

    #[tokio::test(start_paused = true)]
    async fn test_yields_value_between_bounds() {
        let pass_after = Deadline::now().plus_millis(30);

        let value = between(30, 100)
            .with_poll_interval(20, TemporalUnit::Milliseconds)
            .unwrap()
            .until(|| async move {
                if pass_after.is_in_past() {
                    2
                } else {
                    0
                }
            })
            .yields_value(2)
            .await
            .unwrap();

        assert_eq!(2, value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_between_bounds_deadline_exceeded() {
        let err = between(10, 20)
            .until(|| async { 0 })
            .yields_value(2)
            .await
            .unwrap_err();

        assert_eq!(
            "The provided function did not yield the expected value after the max allotted time (20 millis)",
            err.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exceptions_immediately() {
        let value = at_most(1_000)
            .until_result(|| async { Ok::<_, NotReady>("Hello World!") })
            .no_exceptions()
            .await
            .unwrap();

        assert_eq!("Hello World!", value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exceptions_within_allotted_time() {
        let pass_after = Deadline::now().plus_millis(1_000);
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();

        let value = at_most(3_000)
            .with_poll_interval(50, TemporalUnit::Milliseconds)
            .unwrap()
            .until_result(move || {
                let counter = counter.clone();
                async move {
                    if pass_after.is_in_past() {
                        Ok("Hello World")
                    } else {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(NotReady)
                    }
                }
            })
            .no_exceptions()
            .await
            .unwrap();

        assert_eq!("Hello World", value);
        assert!(failures.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exceptions_deadline_exceeded() {
        let err = at_most(500)
            .with_poll_interval(50, TemporalUnit::Milliseconds)
            .unwrap()
            .until_result(|| async { Err::<(), _>(NotReady) })
            .no_exceptions()
            .await
            .unwrap_err();

        assert_eq!(
            "The provided function did not stop throwing within the allotted time (500 millis)",
            err.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exceptions_slow_probe() {
        let err = at_most(500)
            .until_result(|| async {
                sleep(Duration::from_secs(10)).await;
                Ok::<_, NotReady>("success")
            })
            .no_exceptions()
            .await
            .unwrap_err();

        assert_eq!(
            "The provided function did not stop throwing within the allotted time (500 millis)",
            err.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exceptions_between_bounds() {
        let pass_after = Deadline::now().plus_millis(50);

        let value = between(40, 200)
            .with_poll_interval(10, TemporalUnit::Milliseconds)
            .unwrap()
            .until_result(|| async move {
                if pass_after.is_in_past() {
                    Ok(7)
                } else {
                    Err(NotReady)
                }
            })
            .no_exceptions()
            .await
            .unwrap();

        assert_eq!(7, value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exceptions_premature() {
        let err = between(1_000, 2_000)
            .until_result(|| async { Ok::<_, NotReady>(1) })
            .no_exceptions()
            .await
            .unwrap_err();

        assert_eq!(
            "The provided function stopped throwing before it was supposed to!",
            err.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_propagates_while_waiting_on_value() {
        let start = Instant::now();

        let err = at_most(1_000)
            .until_result(|| async { Err::<u32, _>(NotReady) })
            .yields_value(1)
            .await
            .unwrap_err();

        match err {
            PersevereError::Probe(inner) => assert_eq!(NotReady, inner),
            other => panic!("expected probe failure, got {:?}", other),
        }
        assert_eq!(Duration::ZERO, start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_measured_from_evaluation_start() {
        let binding = at_most(100);

        // Time spent between configuring and evaluating does not count.
        sleep(Duration::from_millis(500)).await;

        let pass_after = Deadline::now().plus_millis(50);
        let value = binding
            .until(|| async move {
                if pass_after.is_in_past() {
                    "ready"
                } else {
                    "waiting"
                }
            })
            .yields_value("ready")
            .await
            .unwrap();

        assert_eq!("ready", value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_evaluations_get_fresh_windows() {
        let mut until = at_most(100).until(|| async { 0 });

        for _ in 0..3 {
            let start = Instant::now();
            assert!(until.yields_value(1).await.is_err());
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(110));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_evaluations_share_binding() {
        let binding = at_most(200)
            .with_poll_interval(10, TemporalUnit::Milliseconds)
            .unwrap();
        let pass_after = Deadline::now().plus_millis(50);

        let first = binding.clone();
        let second = binding.clone();
        let (a, b) = tokio::join!(
            async move {
                first
                    .until(|| async move { pass_after.is_in_past() })
                    .yields_value(true)
                    .await
            },
            async move { second.until(|| async { 0 }).yields_value(1).await },
        );

        assert!(a.unwrap());
        assert!(b.unwrap_err().is_deadline_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_never_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let (in_flight_probe, overlaps_probe) = (in_flight.clone(), overlaps.clone());

        let _ = at_most(300)
            .with_poll_interval(5, TemporalUnit::Milliseconds)
            .unwrap()
            .until(move || {
                let in_flight = in_flight_probe.clone();
                let overlaps = overlaps_probe.clone();
                async move {
                    if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    sleep(Duration::from_millis(40)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    0
                }
            })
            .yields_value(1)
            .await;

        assert_eq!(0, overlaps.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_spaces_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let _ = at_most(500)
            .with_poll_interval(100, TemporalUnit::Milliseconds)
            .unwrap()
            .until(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { 0 }
            })
            .yields_value(1)
            .await;

        // Attempts at 0, 100, 200, 300 and 400ms.
        assert_eq!(5, calls.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_handler_receives_message_and_last_value() {
        let seen: Arc<Mutex<Option<(String, String)>>> = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let mut next = 0;

        let err = at_most(100)
            .with_error_handler(move |message, last| {
                *recorder.lock().expect("failed to get lock") =
                    Some((message.to_string(), format!("{:?}", last)));
                format!("custom: {}", message).into()
            })
            .until(move || {
                next += 1;
                let value = next;
                async move { value }
            })
            .yields_value(0)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("custom: The provided function"));
        let (message, last) = seen
            .lock()
            .expect("failed to get lock")
            .clone()
            .expect("handler was not called");
        assert_eq!(
            "The provided function did not yield the expected value within the allotted time (100 millis)",
            message
        );
        // Attempts at 0, 20, 40, 60 and 80ms.
        assert_eq!("Some(5)", last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_handler_on_premature() {
        let err = between(1_000, 2_000)
            .with_error_handler(|message, last| format!("{} {:?}", message, last).into())
            .until(|| async { 5 })
            .yields_value(5)
            .await
            .unwrap_err();

        let handled = err.into_handled().expect("error handler was not used");
        assert_eq!(
            "The provided function yielded the value before it was supposed to! Some(5)",
            handled.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_handler_without_value() {
        let err = at_most(100)
            .with_error_handler(|message, last| {
                assert!(last.is_none());
                message.to_string().into()
            })
            .until_result(|| async { Err::<u8, _>(NotReady) })
            .no_exceptions()
            .await
            .unwrap_err();

        assert_eq!(
            "The provided function did not stop throwing within the allotted time (100 millis)",
            err.to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_future_replays_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = at_most(100)
            .until_future(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                0
            })
            .yields_value(1)
            .await
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_reaches_deadline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            at_most(4)
                .until(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { 0 }
                })
                .yields_value(1),
        )
        .await
        .unwrap();

        assert!(result.unwrap_err().is_deadline_exceeded());
        assert!(start.elapsed() >= Duration::from_millis(4));
        assert!(start.elapsed() < Duration::from_millis(10));
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_lower_bound_reaches_deadline() {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            between(0, 1_000).until(|| async { 0 }).yields_value(1),
        )
        .await
        .unwrap();

        assert!(result.unwrap_err().is_deadline_exceeded());
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_upper_bound_single_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = at_most(0)
            .until(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { 0 }
            })
            .yields_value(1)
            .await
            .unwrap_err();

        assert!(err.is_deadline_exceeded());
        assert_eq!(1, calls.load(Ordering::SeqCst));

        let value = at_most(0)
            .until(|| async { 1 })
            .yields_value(1)
            .await
            .unwrap();
        assert_eq!(1, value);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_future_still_pending_across_evaluations() {
        let mut until = at_most(250).until_future(async {
            sleep(Duration::from_millis(300)).await;
            7
        });

        let err = until.yields_value(7).await.unwrap_err();
        assert!(err.is_deadline_exceeded());

        let start = Instant::now();
        let value = until.yields_value(7).await.unwrap();
        assert_eq!(7, value);
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert!(start.elapsed() < Duration::from_millis(60));
    }
}
