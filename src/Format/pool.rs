// Worker pool driving one shared InputFormatter.
//
// Units that hit WouldBlock are parked until another unit was formatted (the
// only thing that can free a slot) or a new unit was submitted, then retried.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use super::{InputFormatter, Record};
use crate::Core::error::{FormatError, Result};

/// Receives the records the pool produces, in discovery order.
pub trait RecordSink: Send + Sync {
    /// Records completed by formatting unit `sequence`. Never empty.
    fn emit(&self, sequence: u64, records: Vec<Record>);

    /// Unit `sequence` was dropped.
    fn fail(&self, sequence: u64, error: &FormatError) {
        error!(sequence, %error, "unit dropped");
    }
}

/// Sink that keeps everything in memory.
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Record>>,
    failures: Mutex<Vec<(u64, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far, in stream order.
    pub fn records(&self) -> Vec<Record> {
        let mut records = self.records.lock().clone();
        records.sort_by_key(|record| (record.sequence, record.offset));
        records
    }

    pub fn failures(&self) -> Vec<(u64, String)> {
        self.failures.lock().clone()
    }
}

impl RecordSink for CollectingSink {
    fn emit(&self, _sequence: u64, records: Vec<Record>) {
        self.records.lock().extend(records);
    }

    fn fail(&self, sequence: u64, error: &FormatError) {
        self.failures.lock().push((sequence, error.to_string()));
    }
}

struct Task {
    sequence: u64,
    data: Bytes,
    /// Successful formats counted when the task was taken.
    epoch: u64,
    blocked: Option<FormatError>,
}

#[derive(Default)]
struct Queue {
    tasks: VecDeque<Task>,
    parked: Vec<Task>,
    in_flight: usize,
    epoch: u64,
    closing: bool,
    fatal: Option<FormatError>,
}

impl Queue {
    fn unpark(&mut self) {
        self.tasks.extend(self.parked.drain(..));
    }
}

struct Shared {
    formatter: InputFormatter,
    sink: Arc<dyn RecordSink>,
    queue: Mutex<Queue>,
    ready: Condvar,
}

impl Shared {
    fn next_task(&self) -> Option<Task> {
        let mut queue = self.queue.lock();
        loop {
            if queue.fatal.is_some() {
                return None;
            }
            if let Some(mut task) = queue.tasks.pop_front() {
                queue.in_flight += 1;
                task.epoch = queue.epoch;
                return Some(task);
            }
            if queue.closing && queue.in_flight == 0 {
                // nothing left that could free a slot
                let abandoned: Vec<Task> = queue.parked.drain(..).collect();
                drop(queue);
                for task in abandoned {
                    let error = task.blocked.unwrap_or(FormatError::ShutDown);
                    warn!(sequence = task.sequence, %error, "abandoning blocked unit");
                    self.sink.fail(task.sequence, &error);
                }
                self.ready.notify_all();
                return None;
            }
            self.ready.wait(&mut queue);
        }
    }

    fn complete(&self, mut task: Task, outcome: Result<Vec<Record>>) {
        let mut queue = self.queue.lock();
        queue.in_flight -= 1;
        match outcome {
            Ok(records) => {
                queue.epoch += 1;
                queue.unpark();
                drop(queue);
                self.ready.notify_all();
                if !records.is_empty() {
                    self.sink.emit(task.sequence, records);
                }
            }
            Err(error) if error.is_retryable() => {
                task.blocked = Some(error);
                if task.epoch == queue.epoch {
                    queue.parked.push(task);
                } else {
                    // something was freed while this task ran
                    queue.tasks.push_back(task);
                }
                drop(queue);
                self.ready.notify_all();
            }
            Err(error) => {
                error!(sequence = task.sequence, %error, "formatting failed, stopping pool");
                self.sink.fail(task.sequence, &error);
                let dropped = queue.tasks.len() + queue.parked.len();
                if dropped > 0 {
                    warn!(dropped, "pending units discarded");
                }
                queue.fatal = Some(error);
                drop(queue);
                self.ready.notify_all();
            }
        }
    }

    /// A worker is about to unwind: stop the others instead of letting them
    /// wait for its task.
    fn abort(&self, sequence: u64) {
        let mut queue = self.queue.lock();
        queue.in_flight -= 1;
        queue.fatal.get_or_insert(FormatError::ShutDown);
        drop(queue);
        error!(sequence, "worker panicked, stopping pool");
        self.ready.notify_all();
    }
}

fn run_worker(shared: &Shared) {
    while let Some(task) = shared.next_task() {
        let data = task.data.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            shared.formatter.format(task.sequence, data)
        }));
        match outcome {
            Ok(outcome) => shared.complete(task, outcome),
            Err(payload) => {
                shared.abort(task.sequence);
                panic::resume_unwind(payload);
            }
        }
    }
}

/// A fixed set of worker threads formatting units in any order.
pub struct FormatterPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl FormatterPool {
    pub(crate) fn start(formatter: InputFormatter, sink: Arc<dyn RecordSink>, workers: usize) -> Self {
        let shared = Arc::new(Shared {
            formatter,
            sink,
            queue: Mutex::new(Queue::default()),
            ready: Condvar::new(),
        });
        let workers = (0..workers)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || run_worker(&shared))
            })
            .collect();
        debug!("formatter pool started");
        Self { shared, workers }
    }

    pub fn formatter(&self) -> &InputFormatter {
        &self.shared.formatter
    }

    /// Queue unit `sequence` for formatting.
    pub fn submit(&self, sequence: u64, data: impl Into<Bytes>) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        if queue.closing || queue.fatal.is_some() {
            return Err(FormatError::ShutDown);
        }
        queue.tasks.push_back(Task {
            sequence,
            data: data.into(),
            epoch: 0,
            blocked: None,
        });
        queue.unpark();
        drop(queue);
        self.shared.ready.notify_one();
        Ok(())
    }

    /// Finish every queued unit, stop the workers and end the stream at
    /// `next_sequence`. Returns the sequence numbers still unresolved.
    ///
    /// A worker panic (protocol violation) is resumed on the calling thread.
    pub fn shutdown(mut self, next_sequence: u64) -> Result<Vec<u64>> {
        self.close();
        for handle in self.workers.drain(..) {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
        if let Some(error) = self.shared.queue.lock().fatal.take() {
            return Err(error);
        }

        let records = self.shared.formatter.finish(next_sequence)?;
        if !records.is_empty() {
            self.shared.sink.emit(next_sequence, records);
        }
        let unresolved = self.shared.formatter.buffer().unresolved();
        debug!(next_sequence, unresolved = unresolved.len(), "formatter pool shut down");
        Ok(unresolved)
    }

    fn close(&self) {
        self.shared.queue.lock().closing = true;
        self.shared.ready.notify_all();
    }
}

impl Drop for FormatterPool {
    fn drop(&mut self) {
        self.close();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
