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
use std::convert::Infallible;
use std::future::Future;

use futures_util::future::{Map, Shared};
use futures_util::FutureExt;

/// An asynchronous operation that is invoked once per polling attempt.
pub trait Probe {
    /// The value a successful attempt yields.
    type Output;

    /// The failure an attempt may produce.
    type Error;

    /// A single in-flight attempt.
    type Attempt: Future<Output = Result<Self::Output, Self::Error>>;

    /// Starts a new attempt.
    fn attempt(&mut self) -> Self::Attempt;
}

type Succeed<T> = fn(T) -> Result<T, Infallible>;

/// A probe built from a closure whose futures cannot fail.
pub struct FnProbe<F>(F);

impl<F> FnProbe<F> {
    pub fn new(probe: F) -> FnProbe<F> {
        FnProbe(probe)
    }
}

impl<F, Fut> Probe for FnProbe<F>
where
    F: FnMut() -> Fut,
    Fut: Future,
{
    type Output = Fut::Output;
    type Error = Infallible;
    type Attempt = Map<Fut, Succeed<Fut::Output>>;

    fn attempt(&mut self) -> Self::Attempt {
        (self.0)().map(Ok as Succeed<Fut::Output>)
    }
}

/// A probe built from a closure whose futures resolve to a `Result`.
pub struct ResultProbe<F>(F);

impl<F> ResultProbe<F> {
    pub fn new(probe: F) -> ResultProbe<F> {
        ResultProbe(probe)
    }
}

impl<F, Fut, T, E> Probe for ResultProbe<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    type Output = T;
    type Error = E;
    type Attempt = Fut;

    fn attempt(&mut self) -> Self::Attempt {
        (self.0)()
    }
}

/// A probe over a single future. The future is driven once and its outcome is replayed
/// to every subsequent attempt.
pub struct ReplayProbe<Fut>
where
    Fut: Future,
{
    shared: Shared<Map<Fut, Succeed<Fut::Output>>>,
}

impl<Fut> ReplayProbe<Fut>
where
    Fut: Future,
    Fut::Output: Clone,
{
    pub fn new(future: Fut) -> ReplayProbe<Fut> {
        ReplayProbe {
            shared: future.map(Ok as Succeed<Fut::Output>).shared(),
        }
    }
}

impl<Fut> Probe for ReplayProbe<Fut>
where
    Fut: Future,
    Fut::Output: Clone,
{
    type Output = Fut::Output;
    type Error = Infallible;
    type Attempt = Shared<Map<Fut, Succeed<Fut::Output>>>;

    fn attempt(&mut self) -> Self::Attempt {
        self.shared.clone()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::{FnProbe, Probe, ReplayProbe, ResultProbe};

    #[tokio::test]
    async fn test_fn_probe_invokes_each_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut probe = FnProbe::new(move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
        });

        assert_eq!(1, probe.attempt().await.unwrap());
        assert_eq!(2, probe.attempt().await.unwrap());
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_result_probe_passes_failures_through() {
        let mut probe = ResultProbe::new(|| async { Err::<u32, _>("not ready") });
        assert_eq!(Err("not ready"), probe.attempt().await);
    }

    #[tokio::test]
    async fn test_replay_probe_samples_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut probe = ReplayProbe::new(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            "sampled"
        });

        for _ in 0..3 {
            assert_eq!("sampled", probe.attempt().await.unwrap());
        }
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }
}
