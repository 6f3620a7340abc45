use std::collections::VecDeque;

use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::concurrency::Error;

/// Wraps the given block into a task that can be registered in the [`ConcurrentExecutor`],
/// moving the environment into the block.
#[macro_export]
macro_rules! task {
    (|$n: ident| $e: block) => {
        move |$n| { Box::pin(async move $e) }
    };
    (|_| $e: block) => {
        move |_| { Box::pin(async move $e) }
    };
}

type Task<C, S> = Box<dyn FnOnce(C) -> BoxFuture<'static, S> + Send + Sync>;

/// Bounded task pool. At most `n_workers` tasks run at the same time, the others wait in
/// registration order. Every task receives a clone of the context.
pub struct ConcurrentExecutor<C, S> {
    context: C,
    n_workers: usize,
    registered: usize,

    workers: JoinSet<(usize, S)>,
    queue: VecDeque<(usize, Task<C, S>)>,
}

impl<C: Clone, S: 'static + Send> ConcurrentExecutor<C, S> {
    pub fn new(context: C, n_workers: usize) -> Self {
        Self {
            context,
            n_workers,
            registered: 0,

            workers: JoinSet::new(),
            queue: VecDeque::new(),
        }
    }

    /// Registers a task and returns its registration index. The task starts right away
    /// when a worker is free.
    pub fn register<F>(&mut self, task: F) -> usize
    where
        F: 'static + FnOnce(C) -> BoxFuture<'static, S>,
        F: Send + Sync,
    {
        let index = self.registered;
        self.registered += 1;

        if self.workers.len() >= self.n_workers {
            self.queue.push_back((index, Box::new(task)));
        } else {
            self.spawn(index, Box::new(task));
        }

        index
    }

    fn spawn(&mut self, index: usize, task: Task<C, S>) {
        let future = task(self.context.clone());
        self.workers.spawn(async move { (index, future.await) }.in_current_span());
    }

    /// Waits for the next task to complete and returns its index and result. A queued
    /// task is started in its place.
    pub async fn next(&mut self) -> Option<Result<(usize, S), Error>> {
        if self.n_workers == 0 {
            return match self.queue.is_empty() {
                true => None,
                false => Some(Err(Error::NoWorkers)),
            };
        }

        let value = match self.workers.join_next().await {
            Some(Ok(value)) => Some(Ok(value)),
            None => None,
            Some(Err(e)) => return Some(Err(Error::Join(e))),
        };

        if let Some((index, task)) = self.queue.pop_front() {
            self.spawn(index, task);
        }

        value
    }

    /// Runs every registered task to completion and returns the results in registration order.
    pub async fn execute(&mut self) -> Result<Vec<S>, Error> {
        let mut results = Vec::with_capacity(self.registered);
        while let Some(value) = self.next().await {
            results.push(value?)
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}
