use std::thread::JoinHandle;

use crossbeam_channel::Sender;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of threads pulling tasks from an unbounded queue.
///
/// With zero workers every task runs inline in [`WorkerPool::execute`].
/// Dropping the pool closes the queue; workers finish what is already
/// queued and are joined.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        if size == 0 {
            return Self {
                sender: None,
                workers: Vec::new(),
            };
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let workers = (0..size)
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("faceblur-worker-{i}"))
                    .spawn(move || {
                        for task in receiver {
                            task();
                        }
                    })
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("Could not spawn worker thread: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        if workers.is_empty() {
            log::warn!("No worker threads available, running jobs inline");
            return Self {
                sender: None,
                workers,
            };
        }

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(Box::new(task)) {
                    // every worker is gone; keep the job alive on this thread
                    (rejected.into_inner())();
                }
            }
            None => task(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("Worker thread panicked");
            }
        }
    }
}
