//! Bounded extraction worker pool
//!
//! A fixed set of tokio tasks pull [`ExtractionRequest`]s from one shared
//! queue. Each worker owns a [`WorkerAnalyzer`]: the analyzer instance is
//! created on the worker's first task and reused for every later task of
//! that worker, never shared with another.
//!
//! Failures never stop a worker. A panic inside one extraction is caught,
//! logged, and the worker moves on to the next job.

use super::{ExtractionOutcome, ExtractionPipeline, ExtractionRequest};
use crate::analyzer::{AnalysisError, AnalyzerFactory, AudioAnalyzer, DescriptorPool};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info};

/// Lower bound on worker count
pub const MIN_WORKERS: usize = 3;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 4;

/// Lazily created analyzer owned by one worker
pub struct WorkerAnalyzer {
    factory: AnalyzerFactory,
    instance: Option<Box<dyn AudioAnalyzer>>,
}

impl WorkerAnalyzer {
    pub fn new(factory: AnalyzerFactory) -> Self {
        Self {
            factory,
            instance: None,
        }
    }

    /// Whether an instance has been created (and survived)
    pub fn is_initialized(&self) -> bool {
        self.instance.is_some()
    }

    /// Analyze on a blocking thread, creating the instance on first use
    ///
    /// The instance travels into the blocking task and back. If that task
    /// panics the instance is lost and the next call creates a fresh one.
    pub async fn analyze(&mut self, audio_path: PathBuf) -> Result<DescriptorPool, AnalysisError> {
        let existing = self.instance.take();
        let factory = Arc::clone(&self.factory);

        let (instance, result) = tokio::task::spawn_blocking(move || {
            let mut instance = match existing {
                Some(instance) => instance,
                None => match factory() {
                    Ok(instance) => instance,
                    Err(e) => return (None, Err(e)),
                },
            };
            let result = instance.analyze(&audio_path);
            (Some(instance), result)
        })
        .await
        .map_err(|e| AnalysisError::Execution(format!("Analysis task failed: {}", e)))?;

        self.instance = instance;
        result
    }
}

struct ExtractionJob {
    request: ExtractionRequest,
    reply: Option<oneshot::Sender<ExtractionOutcome>>,
}

/// Fixed-size pool running extractions
pub struct ExtractionPool {
    sender: mpsc::UnboundedSender<ExtractionJob>,
    workers: usize,
}

impl ExtractionPool {
    /// Spawn `workers` tasks (at least [`MIN_WORKERS`]) on the current runtime
    pub fn start(
        pipeline: Arc<ExtractionPipeline>,
        factory: AnalyzerFactory,
        workers: usize,
    ) -> Self {
        let workers = workers.max(MIN_WORKERS);
        let (sender, receiver) = mpsc::unbounded_channel::<ExtractionJob>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..workers {
            let receiver = Arc::clone(&receiver);
            let pipeline = Arc::clone(&pipeline);
            let analyzer = WorkerAnalyzer::new(Arc::clone(&factory));
            tokio::spawn(worker_loop(worker_id, receiver, pipeline, analyzer));
        }

        info!(workers, "Extraction pool started");
        Self { sender, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Queue an extraction without waiting for it
    ///
    /// Returns `false` if the pool has shut down.
    pub fn submit(&self, request: ExtractionRequest) -> bool {
        self.sender
            .send(ExtractionJob {
                request,
                reply: None,
            })
            .is_ok()
    }

    /// Queue an extraction and wait for its outcome
    pub async fn run(&self, request: ExtractionRequest) -> ExtractionOutcome {
        let song_id = request.song_id.clone();
        let (reply, outcome) = oneshot::channel();

        if self
            .sender
            .send(ExtractionJob {
                request,
                reply: Some(reply),
            })
            .is_err()
        {
            return ExtractionOutcome::Failed {
                song_id,
                reason: "Extraction pool is shut down".to_string(),
            };
        }

        outcome.await.unwrap_or(ExtractionOutcome::Failed {
            song_id,
            reason: "Extraction worker dropped the job".to_string(),
        })
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<ExtractionJob>>>,
    pipeline: Arc<ExtractionPipeline>,
    mut analyzer: WorkerAnalyzer,
) {
    debug!(worker = worker_id, "Extraction worker ready");

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            break;
        };

        let song_id = job.request.song_id.clone();
        debug!(worker = worker_id, song_id = %song_id, "Extraction started");

        let outcome = AssertUnwindSafe(pipeline.extract_and_store(&job.request, &mut analyzer))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(worker = worker_id, song_id = %song_id, "Extraction panicked");
                ExtractionOutcome::Failed {
                    song_id: song_id.clone(),
                    reason: "Extraction panicked".to_string(),
                }
            });

        if let Some(reply) = job.reply {
            let _ = reply.send(outcome);
        }
    }

    debug!(worker = worker_id, "Extraction worker stopped");
}
