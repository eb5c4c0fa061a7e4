//! Sweep and multiplex drivers.
//!
//! For every payload size of a [`SweepPlan`] the driver samples host
//! resources, opens a link (timed as setup), probes it (timed as first
//! byte), runs a batch of transfers and emits one [`Trial`]. A failed
//! batch is reported and skipped; connection and sampler errors end the
//! sweep.

use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::emitter::Emitter;
use crate::error::{MeterError, Result};
use crate::link::{Connector, Link, MultiplexLink};
use crate::params;
use crate::payload::Payload;
use crate::sampler::{ResourceSampler, ResourceSnapshot};
use crate::trial::{ResourceUsage, Trial};

/// Sizes and batch length of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPlan {
    /// First payload size.
    pub initial: usize,
    /// Last payload size, inclusive.
    pub last: usize,
    /// Transfers per size for sequential sweeps.
    pub files: usize,
}

impl Default for SweepPlan {
    fn default() -> Self {
        SweepPlan {
            initial: params::INITIAL_MESSAGE_SIZE,
            last: params::FINAL_MESSAGE_SIZE,
            files: params::FILES_TO_SEND,
        }
    }
}

impl SweepPlan {
    /// Payload sizes: `initial`, doubling, up to and including `last`.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + use<> {
        let last = self.last;
        std::iter::successors(Some(self.initial.max(1)), |s| s.checked_mul(2))
            .take_while(move |&s| s <= last)
    }
}

/// What a sweep produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Trials handed to the emitter.
    pub trials: usize,
    /// Sizes whose batch failed.
    pub failures: usize,
}

/// Runs sweeps for one environment, reporting through `emitter`.
pub struct Sweep<'a, S: ?Sized, E: ?Sized> {
    environment: &'a str,
    payload: &'a Payload,
    plan: SweepPlan,
    sampler: &'a mut S,
    emitter: &'a mut E,
}

struct Opened<L> {
    link: L,
    before: ResourceSnapshot,
    setup: std::time::Duration,
    first_byte: std::time::Duration,
}

impl<'a, S, E> Sweep<'a, S, E>
where
    S: ResourceSampler + ?Sized,
    E: Emitter + ?Sized,
{
    /// Create a driver. `payload` must hold at least `plan.last` bytes.
    pub fn new(
        environment: &'a str,
        payload: &'a Payload,
        plan: SweepPlan,
        sampler: &'a mut S,
        emitter: &'a mut E,
    ) -> Self {
        Sweep {
            environment,
            payload,
            plan,
            sampler,
            emitter,
        }
    }

    /// Sweep `connector`, running `plan.files` transfers one after another
    /// on each link.
    pub async fn run<C: Connector>(&mut self, connector: &C) -> Result<SweepReport> {
        let files = self.plan.files;
        let payload = self.payload;
        self.each_size(connector, files, async |link: &mut C::Link, size| {
            for _ in 0..files {
                link.transfer(payload, size).await?;
            }
            Ok(())
        })
        .await
    }

    /// Sweep `connector`, running `streams` transfers concurrently on each
    /// link.
    pub async fn run_multiplexed<C>(&mut self, connector: &C, streams: usize) -> Result<SweepReport>
    where
        C: Connector,
        C::Link: MultiplexLink,
    {
        let payload = self.payload;
        self.each_size(connector, streams, async |link: &mut C::Link, size| {
            concurrent(&*link, payload, size, streams).await.map(drop)
        })
        .await
    }

    async fn each_size<C, F>(&mut self, connector: &C, files: usize, mut batch: F) -> Result<SweepReport>
    where
        C: Connector,
        F: AsyncFnMut(&mut C::Link, usize) -> Result<()>,
    {
        let protocol = connector.protocol();
        let mut report = SweepReport::default();
        self.emitter.on_starting(protocol)?;

        for (index, size) in self.plan.sizes().enumerate() {
            tracing::debug!(protocol, index, size, files, "sweep step");
            let mut opened = self.open(connector).await?;

            let start = Instant::now();
            let outcome = batch(&mut opened.link, size).await;
            let duration = start.elapsed();

            match outcome {
                Ok(()) => {
                    let after = self.sampler.sample()?;
                    let trial = Trial {
                        protocol: protocol.to_owned(),
                        kind: connector.kind(),
                        environment: self.environment.to_owned(),
                        files,
                        setup: opened.setup,
                        first_byte: opened.first_byte,
                        size,
                        duration,
                        resources: ResourceUsage::between(&opened.before, &after),
                    };
                    self.emitter.on_trial(&trial)?;
                    report.trials += 1;
                }
                Err(e) => {
                    let e = MeterError::incomplete(protocol, size, e);
                    tracing::warn!("{e}");
                    self.emitter.on_error(protocol, size, &e.to_string())?;
                    report.failures += 1;
                }
            }
        }

        self.emitter.on_complete(protocol)?;
        Ok(report)
    }

    async fn open<C: Connector>(&mut self, connector: &C) -> Result<Opened<C::Link>> {
        let before = self.sampler.sample()?;
        let start = Instant::now();
        let mut link = connector.connect().await?;
        let setup = start.elapsed();
        link.probe().await;
        let first_byte = start.elapsed();
        Ok(Opened {
            link,
            before,
            setup,
            first_byte,
        })
    }
}

/// Run `streams` transfers of `size` bytes on `link` at the same time and
/// wait for all of them.
///
/// Each transfer is its own task on the runtime. Returns the number of
/// completed transfers, or the last error if any transfer failed.
pub async fn concurrent<L>(link: &L, payload: &Payload, size: usize, streams: usize) -> Result<usize>
where
    L: MultiplexLink + ?Sized,
{
    let mut tasks = JoinSet::new();
    for _ in 0..streams {
        tasks.spawn(link.transfer_shared(payload.clone(), size));
    }

    let mut completed = 0;
    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => completed += 1,
            Ok(Err(e)) => failure = Some(e),
            Err(e) => failure = Some(e.into()),
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(completed),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::MeterError;
    use crate::trial::TrialKind;

    const MIB: usize = 1 << 20;

    #[test]
    fn default_sizes_double_to_64_mib() {
        let sizes: Vec<usize> = SweepPlan::default().sizes().collect();
        assert_eq!(sizes.len(), 27);
        assert_eq!(sizes[0], 1);
        assert_eq!(*sizes.last().unwrap(), 64 * MIB);
        assert!(sizes.windows(2).all(|w| w[1] == 2 * w[0]));
    }

    #[test]
    fn sizes_stop_before_exceeding_last() {
        let plan = SweepPlan {
            initial: 1,
            last: 100,
            files: 1,
        };
        assert_eq!(
            plan.sizes().collect::<Vec<_>>(),
            vec![1, 2, 4, 8, 16, 32, 64]
        );
    }

    #[derive(Default)]
    struct Counting {
        samples: usize,
    }

    impl ResourceSampler for Counting {
        fn sample(&mut self) -> Result<ResourceSnapshot> {
            self.samples += 1;
            Ok(ResourceSnapshot {
                cpu_user: self.samples as u64,
                cpu_system: 0,
                cpu_total: 10 * self.samples as u64,
                memory_used: 1 << 30,
            })
        }
    }

    #[derive(Default)]
    struct Collect {
        trials: Vec<Trial>,
        errors: Vec<(String, usize)>,
        started: Vec<String>,
        completed: Vec<String>,
    }

    impl Emitter for Collect {
        fn on_starting(&mut self, protocol: &str) -> Result<()> {
            self.started.push(protocol.to_owned());
            Ok(())
        }
        fn on_error(&mut self, protocol: &str, size: usize, _err: &str) -> Result<()> {
            self.errors.push((protocol.to_owned(), size));
            Ok(())
        }
        fn on_trial(&mut self, trial: &Trial) -> Result<()> {
            self.trials.push(trial.clone());
            Ok(())
        }
        fn on_complete(&mut self, protocol: &str) -> Result<()> {
            self.completed.push(protocol.to_owned());
            Ok(())
        }
    }

    /// In-memory connector: transfers sleep briefly and fail for one size.
    struct Fake {
        fail_size: Option<usize>,
        refuse: bool,
        transfers: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Fake {
        fn new() -> Self {
            Fake {
                fail_size: None,
                refuse: false,
                transfers: Arc::default(),
                in_flight: Arc::default(),
                peak: Arc::default(),
            }
        }
    }

    struct FakeLink {
        fail_size: Option<usize>,
        transfers: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Connector for Fake {
        type Link = FakeLink;

        fn protocol(&self) -> &str {
            "FAKE"
        }

        fn kind(&self) -> TrialKind {
            TrialKind::Raw
        }

        async fn connect(&self) -> Result<FakeLink> {
            if self.refuse {
                return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
            }
            Ok(FakeLink {
                fail_size: self.fail_size,
                transfers: self.transfers.clone(),
                in_flight: self.in_flight.clone(),
                peak: self.peak.clone(),
            })
        }
    }

    impl Link for FakeLink {
        async fn probe(&mut self) {}

        async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()> {
            self.transfer_shared(payload.clone(), size).await
        }
    }

    impl MultiplexLink for FakeLink {
        fn transfer_shared(
            &self,
            _payload: Payload,
            size: usize,
        ) -> impl Future<Output = Result<()>> + Send + 'static {
            let fail_size = self.fail_size;
            let transfers = self.transfers.clone();
            let in_flight = self.in_flight.clone();
            let peak = self.peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                // stagger completion order
                let n = transfers.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis((7 - n % 7) as u64)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);

                if Some(size) == fail_size {
                    return Err(MeterError::AckMismatch {
                        expected: size,
                        acked: 0,
                    });
                }
                Ok(())
            }
        }
    }

    fn plan(last: usize, files: usize) -> SweepPlan {
        SweepPlan {
            initial: 1,
            last,
            files,
        }
    }

    #[tokio::test]
    async fn one_trial_per_size() {
        let payload = Payload::random(64);
        let mut sampler = Counting::default();
        let mut emitter = Collect::default();
        let connector = Fake::new();

        let report = Sweep::new("Local", &payload, plan(64, 10), &mut sampler, &mut emitter)
            .run(&connector)
            .await
            .unwrap();

        assert_eq!(report, SweepReport { trials: 7, failures: 0 });
        let sizes: Vec<_> = emitter.trials.iter().map(|t| t.size).collect();
        assert_eq!(sizes, vec![1, 2, 4, 8, 16, 32, 64]);
        assert_eq!(connector.transfers.load(Ordering::SeqCst), 70);
        assert_eq!(sampler.samples, 14);
        assert_eq!(emitter.started, vec!["FAKE"]);
        assert_eq!(emitter.completed, vec!["FAKE"]);

        let t = emitter.trials.iter().find(|t| t.size == 32).unwrap();
        assert_eq!(t.files, 10);
        assert_eq!(t.environment, "Local");
        assert_eq!((t.resources.cpu_user, t.resources.cpu_total), (1, 10));
        let expected = 32.0 / t.duration.as_secs_f64() * 10.0;
        assert!((t.goodput() - expected).abs() < 1e-6);
        assert!(t.first_byte >= t.setup);
    }

    #[tokio::test]
    async fn failed_size_is_skipped() {
        let payload = Payload::random(64);
        let mut sampler = Counting::default();
        let mut emitter = Collect::default();
        let mut connector = Fake::new();
        connector.fail_size = Some(8);

        let report = Sweep::new("Local", &payload, plan(32, 3), &mut sampler, &mut emitter)
            .run(&connector)
            .await
            .unwrap();

        assert_eq!(report, SweepReport { trials: 5, failures: 1 });
        assert_eq!(emitter.errors, vec![("FAKE".to_owned(), 8)]);
        assert!(emitter.trials.iter().all(|t| t.size != 8));
        // the failing size stops after its first repetition
        assert_eq!(connector.transfers.load(Ordering::SeqCst), 5 * 3 + 1);
    }

    #[tokio::test]
    async fn connect_failure_aborts() {
        let payload = Payload::random(8);
        let mut sampler = Counting::default();
        let mut emitter = Collect::default();
        let mut connector = Fake::new();
        connector.refuse = true;

        let err = Sweep::new("Local", &payload, plan(8, 1), &mut sampler, &mut emitter)
            .run(&connector)
            .await
            .unwrap_err();

        assert!(matches!(err, MeterError::IoError(_)));
        assert!(emitter.trials.is_empty());
    }

    #[tokio::test]
    async fn multiplexed_batch_size_is_stream_count() {
        let payload = Payload::random(16);
        let mut sampler = Counting::default();
        let mut emitter = Collect::default();
        let connector = Fake::new();

        let report = Sweep::new("Local", &payload, plan(16, 10), &mut sampler, &mut emitter)
            .run_multiplexed(&connector, 4)
            .await
            .unwrap();

        assert_eq!(report.trials, 5);
        assert!(emitter.trials.iter().all(|t| t.files == 4));
        assert_eq!(connector.transfers.load(Ordering::SeqCst), 20);
        assert_eq!(connector.peak.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn concurrent_join_waits_for_all() {
        let payload = Payload::random(8);
        let connector = Fake::new();
        let link = connector.connect().await.unwrap();

        for n in [1, 2, 4, 8] {
            let completed = concurrent(&link, &payload, 8, n).await.unwrap();
            assert_eq!(completed, n);
            assert_eq!(connector.in_flight.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn concurrent_reports_any_failure() {
        let payload = Payload::random(8);
        let mut connector = Fake::new();
        connector.fail_size = Some(8);
        let link = connector.connect().await.unwrap();

        let err = concurrent(&link, &payload, 8, 8).await.unwrap_err();
        assert!(matches!(err, MeterError::AckMismatch { expected: 8, .. }));
        assert_eq!(connector.in_flight.load(Ordering::SeqCst), 0);
    }

    /// Records the runtime task every transfer ran on.
    #[derive(Default)]
    struct TaskIds(Arc<std::sync::Mutex<Vec<Option<tokio::task::Id>>>>);

    impl Link for TaskIds {
        async fn probe(&mut self) {}

        async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()> {
            self.transfer_shared(payload.clone(), size).await
        }
    }

    impl MultiplexLink for TaskIds {
        fn transfer_shared(
            &self,
            _payload: Payload,
            _size: usize,
        ) -> impl Future<Output = Result<()>> + Send + 'static {
            let ids = self.0.clone();
            async move {
                ids.lock().unwrap().push(tokio::task::try_id());
                Ok(())
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_transfers_are_separate_tasks() {
        let payload = Payload::random(8);
        let link = TaskIds::default();

        assert_eq!(concurrent(&link, &payload, 8, 8).await.unwrap(), 8);

        let ids: HashSet<_> = link.0.lock().unwrap().iter().map(|id| id.unwrap()).collect();
        assert_eq!(ids.len(), 8);
    }
}
