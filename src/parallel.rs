//! Counter-based manager for parallel stage execution.
//!
//! A processing stage runs as: init (the first thread to arrive runs the
//! stage initializer, others wait), process (threads pull task tickets
//! with an atomic counter), wait (blocks until every started task is
//! complete) and term (first arrival runs the finalizer). There is no
//! dedicated main thread; any worker can be first. Init happens-before
//! any process step, and wait happens-before term.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct State {
    init_done: bool,
    term_done: bool,
    done_count: usize,
    task_count: usize,
}

#[derive(Default)]
pub struct ParallelManager {
    lock: Mutex<State>,
    complete: Condvar,
    start_count: AtomicUsize,
}

impl ParallelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new processing batch. Must be called from
    /// single-threaded code before workers arrive.
    pub fn reset(&self) {
        let mut state = self.lock.lock().unwrap();
        *state = State::default();
        self.start_count.store(0, Ordering::Relaxed);
    }

    /// Run the stage initializer; only the first thread executes it, and
    /// every caller observes the task count it returned.
    pub fn init<F: FnOnce() -> usize>(&self, init_func: F) -> usize {
        let mut state = self.lock.lock().unwrap();
        if !state.init_done {
            state.task_count = init_func();
            state.init_done = true;
        }
        state.task_count
    }

    /// As `init`, with a precomputed task count.
    pub fn init_with_count(&self, task_count: usize) -> usize {
        self.init(|| task_count)
    }

    /// Request up to `granule` tasks. Returns the base task index and the
    /// actual count, which is zero once the queue is drained.
    pub fn get_task_assignment(&self, granule: usize) -> (usize, usize) {
        let base = self.start_count.fetch_add(granule, Ordering::Relaxed);
        let task_count = self.lock.lock().unwrap().task_count;
        if base >= task_count {
            return (0, 0);
        }
        (base, (task_count - base).min(granule))
    }

    /// Mark `count` tasks as complete, waking waiters when the stage
    /// finishes.
    pub fn complete_task_assignment(&self, count: usize) {
        let mut state = self.lock.lock().unwrap();
        state.done_count += count;
        if state.done_count == state.task_count {
            drop(state);
            self.complete.notify_all();
        }
    }

    /// Block until all tasks of the stage have completed.
    pub fn wait(&self) {
        let state = self.lock.lock().unwrap();
        let _guard = self
            .complete
            .wait_while(state, |s| s.done_count != s.task_count)
            .unwrap();
    }

    /// Run the stage finalizer; only the first thread executes it. The
    /// caller must have called `wait` first.
    pub fn term<F: FnOnce()>(&self, term_func: F) {
        let mut state = self.lock.lock().unwrap();
        if !state.term_done {
            term_func();
            state.term_done = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_single_thread_drains_queue() {
        let mgr = ParallelManager::new();
        mgr.reset();
        assert_eq!(mgr.init_with_count(10), 10);

        let mut seen = Vec::new();
        loop {
            let (base, count) = mgr.get_task_assignment(3);
            if count == 0 {
                break;
            }
            for i in base..base + count {
                seen.push(i);
            }
            mgr.complete_task_assignment(count);
        }
        mgr.wait();

        let ran = AtomicUsize::new(0);
        mgr.term(|| {
            ran.fetch_add(1, Ordering::Relaxed);
        });
        mgr.term(|| {
            ran.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_multi_thread_each_task_once() {
        let mgr = ParallelManager::new();
        mgr.reset();

        const TASKS: usize = 1000;
        let hits: Vec<AtomicUsize> = (0..TASKS).map(|_| AtomicUsize::new(0)).collect();
        let inits = AtomicUsize::new(0);
        let terms = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    mgr.init(|| {
                        inits.fetch_add(1, Ordering::Relaxed);
                        TASKS
                    });
                    loop {
                        let (base, count) = mgr.get_task_assignment(7);
                        if count == 0 {
                            break;
                        }
                        for i in base..base + count {
                            hits[i].fetch_add(1, Ordering::Relaxed);
                        }
                        mgr.complete_task_assignment(count);
                    }
                    mgr.wait();
                    mgr.term(|| {
                        terms.fetch_add(1, Ordering::Relaxed);
                    });
                });
            }
        });

        assert_eq!(inits.load(Ordering::Relaxed), 1);
        assert_eq!(terms.load(Ordering::Relaxed), 1);
        for hit in &hits {
            assert_eq!(hit.load(Ordering::Relaxed), 1);
        }
    }
}
