//! Collection cadence and snapshot dispatch.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;
use tracing::debug;

use crate::metrics::runtime::RuntimeSampler;
use crate::metrics::system::SystemSampler;
use crate::metrics::traits::Sampler;

/// Callback receiving every snapshot a collector produces.
pub type StatsHandler<T> = Box<dyn FnMut(T) + Send>;

/// Collector of operating-system metrics from the local host.
pub type SystemCollector = Collector<SystemSampler>;

/// Collector of process and runtime metrics.
pub type RuntimeCollector = Collector<RuntimeSampler>;

/// Drives a [`Sampler`] on a fixed interval and hands each snapshot to a
/// handler.
///
/// A collector is single-owner: [`sample_once`](Self::sample_once) borrows it
/// mutably and [`run`](Self::run) consumes it, so the sampler's delta state is
/// never touched from two places. Once `run` returns the collector is gone; a
/// new one has to be built to start collecting again.
pub struct Collector<S: Sampler> {
    sampler: S,
    interval: Duration,
    handler: StatsHandler<S::Output>,
}

impl<S: Sampler> Collector<S> {
    /// Create a collector with the default interval and a handler that
    /// discards snapshots.
    pub fn new(sampler: S) -> Self {
        Self {
            sampler,
            interval: crate::DEFAULT_INTERVAL,
            handler: Box::new(|_| {}),
        }
    }

    /// Set the collection interval. A zero interval selects the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = if interval.is_zero() {
            crate::DEFAULT_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Set the handler called with every snapshot produced by [`run`](Self::run).
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(S::Output) + Send + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Take one snapshot now, bypassing the handler.
    pub fn sample_once(&mut self) -> S::Output {
        self.sampler.sample()
    }

    /// Emit a snapshot immediately, then one every interval until `shutdown`
    /// completes.
    ///
    /// The handler runs inline, so a slow handler delays the next tick and a
    /// handler that never returns stalls the loop. Shutdown is only observed
    /// between snapshots. This future runs for the collector's whole life and
    /// is meant to be spawned on its own task, see [`spawn`](Self::spawn).
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let interval = self.interval;
        run_ticker(interval, shutdown, || (self.handler)(self.sampler.sample())).await;
    }

    /// Spawn [`run`](Self::run) on a new tokio task.
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        S: 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run(shutdown))
    }

    /// Turn the collector into a stream of snapshots, the first one
    /// immediately. The handler is not called.
    pub fn into_stream(self) -> BoxStream<'static, S::Output>
    where
        S: 'static,
    {
        let Collector {
            mut sampler,
            interval,
            ..
        } = self;

        let mut ticks = time::interval(interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        IntervalStream::new(ticks)
            .map(move |_| sampler.sample())
            .boxed()
    }
}

/// Call `step` once right away and then every `period` until `shutdown`
/// completes.
///
/// Late ticks fire late and are not caught up. When both the shutdown and a
/// tick are ready, shutdown wins.
pub(crate) async fn run_ticker<F, T>(period: Duration, shutdown: F, mut step: T)
where
    F: Future<Output = ()>,
    T: FnMut(),
{
    tokio::pin!(shutdown);

    debug!(interval_ms = period.as_millis() as u64, "collector started");
    step();

    let mut ticks = time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticks.tick() => step(),
        }
    }

    debug!("collector stopped");
}
