use crate::fs::FileSystem;
use crate::models::{BatchOutcome, RenameMapping, RenameStep};
use crate::transaction::{CrossDirMode, TransactionExecutor};
use crossbeam_channel::{Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

#[derive(Debug, Clone)]
pub enum BatchJob {
    /// Plan and apply proposed names.
    Apply {
        mappings: Vec<RenameMapping>,
        target_dir: Option<PathBuf>,
    },
    /// Replay explicit path pairs from undo or redo.
    Steps(Vec<RenameStep>),
}

#[derive(Debug)]
pub enum WorkerEvent {
    /// Percent complete, strictly increasing.
    Progress(u8),
    Finished(BatchOutcome),
    /// The batch was refused before anything ran.
    Failed(String),
}

pub struct BatchHandle {
    events: Receiver<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BatchHandle {
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Asks the worker to stop before the next item. Finished items stay done.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Blocks until the terminal event, forwarding progress along the way.
    pub fn wait(mut self, mut on_progress: impl FnMut(u8)) -> Result<BatchOutcome, String> {
        let mut result = Err("worker exited without reporting".to_string());
        for event in self.events.iter() {
            match event {
                WorkerEvent::Progress(percent) => on_progress(percent),
                WorkerEvent::Finished(outcome) => {
                    result = Ok(outcome);
                    break;
                }
                WorkerEvent::Failed(message) => {
                    result = Err(message);
                    break;
                }
            }
        }
        self.join();
        result
    }

    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("batch worker panicked");
            }
        }
    }
}

pub fn spawn_batch<F>(fs: Arc<F>, mode: CrossDirMode, job: BatchJob) -> BatchHandle
where
    F: FileSystem + Send + Sync + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded::<WorkerEvent>();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();

    let thread = std::thread::spawn(move || run_job(&*fs, mode, flag, job, tx));

    BatchHandle { events: rx, cancel, thread: Some(thread) }
}

fn run_job<F: FileSystem + Sync>(
    fs: &F,
    mode: CrossDirMode,
    cancel: Arc<AtomicBool>,
    job: BatchJob,
    tx: Sender<WorkerEvent>,
) {
    let executor = TransactionExecutor::new(fs).with_mode(mode).with_cancel_flag(cancel);

    let mut last: Option<u8> = None;
    let progress_tx = tx.clone();
    let report = move |progress: crate::transaction::Progress| {
        let percent = progress.percent();
        if last.is_none_or(|prev| percent > prev) {
            last = Some(percent);
            let _ = progress_tx.send(WorkerEvent::Progress(percent));
        }
    };

    let event = match job {
        BatchJob::Apply { mappings, target_dir } => {
            match executor.batch_apply(&mappings, target_dir.as_deref(), report) {
                Ok(outcome) => WorkerEvent::Finished(outcome),
                Err(err) => {
                    tracing::error!(%err, "batch refused");
                    WorkerEvent::Failed(err.to_string())
                }
            }
        }
        BatchJob::Steps(steps) => WorkerEvent::Finished(executor.execute_steps(&steps, report)),
    };
    let _ = tx.send(event);
}
