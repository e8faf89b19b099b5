//! Bulk-synchronous task execution.
//!
//! A [`TaskExecutor`] runs one generation phase (crossover per pair,
//! mutation per child, evaluation per genome) as a set of independent
//! tasks and joins all of them before returning. Results keep input
//! order. A task that returns an error or panics fails the whole phase:
//! the first failure is returned and the other results are dropped.

use crate::error::GeneticError;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
enum Mode {
    #[default]
    Sequential,
    Global,
    Pool(Arc<ThreadPool>),
}

/// Runs phase tasks either inline or on a rayon pool.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone, Default)]
pub struct TaskExecutor {
    mode: Mode,
}

impl TaskExecutor {
    /// Runs every task on the calling thread.
    pub fn sequential() -> Self {
        Self {
            mode: Mode::Sequential,
        }
    }

    /// Runs tasks on rayon's global pool.
    pub fn parallel() -> Self {
        Self { mode: Mode::Global }
    }

    /// Runs tasks on a dedicated pool of `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, GeneticError> {
        if threads == 0 {
            return Err(GeneticError::InvalidConfig(
                "threads must be at least 1".into(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("u-genetic-{i}"))
            .build()
            .map_err(|e| GeneticError::InvalidConfig(format!("thread pool: {e}")))?;
        Ok(Self {
            mode: Mode::Pool(Arc::new(pool)),
        })
    }

    /// Builds the executor described by the `parallel` / `threads` options.
    pub fn from_options(parallel: bool, threads: Option<usize>) -> Result<Self, GeneticError> {
        match (parallel, threads) {
            (false, _) => Ok(Self::sequential()),
            (true, None) => Ok(Self::parallel()),
            (true, Some(n)) => Self::with_threads(n),
        }
    }

    /// Whether tasks may run on more than one thread.
    pub fn is_parallel(&self) -> bool {
        !matches!(self.mode, Mode::Sequential)
    }

    /// Runs a single closure inside the executor's pool.
    pub fn execute<T, F>(&self, op: F) -> Result<T, GeneticError>
    where
        T: Send,
        F: FnOnce() -> Result<T, GeneticError> + Send,
    {
        match &self.mode {
            Mode::Pool(pool) => pool.install(|| guarded(op)),
            Mode::Sequential | Mode::Global => guarded(op),
        }
    }

    /// Applies `task` to every item and joins, preserving order.
    pub fn map<T, U, F>(&self, items: Vec<T>, task: F) -> Result<Vec<U>, GeneticError>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> Result<U, GeneticError> + Send + Sync,
    {
        match &self.mode {
            Mode::Sequential => items
                .into_iter()
                .map(|item| guarded(|| task(item)))
                .collect(),
            Mode::Global => items
                .into_par_iter()
                .map(|item| guarded(|| task(item)))
                .collect(),
            Mode::Pool(pool) => pool.install(|| {
                items
                    .into_par_iter()
                    .map(|item| guarded(|| task(item)))
                    .collect()
            }),
        }
    }

    /// Applies `task` to every element of a slice in place and joins.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], task: F) -> Result<(), GeneticError>
    where
        T: Send,
        F: Fn(&mut T) -> Result<(), GeneticError> + Send + Sync,
    {
        match &self.mode {
            Mode::Sequential => items.iter_mut().try_for_each(|item| guarded(|| task(item))),
            Mode::Global => items
                .par_iter_mut()
                .try_for_each(|item| guarded(|| task(item))),
            Mode::Pool(pool) => pool.install(|| {
                items
                    .par_iter_mut()
                    .try_for_each(|item| guarded(|| task(item)))
            }),
        }
    }
}

/// Converts a panic inside `op` into [`GeneticError::TaskPanicked`].
fn guarded<T>(op: impl FnOnce() -> Result<T, GeneticError>) -> Result<T, GeneticError> {
    panic::catch_unwind(AssertUnwindSafe(op))
        .unwrap_or_else(|payload| Err(GeneticError::TaskPanicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_modes() -> Vec<TaskExecutor> {
        vec![
            TaskExecutor::sequential(),
            TaskExecutor::parallel(),
            TaskExecutor::with_threads(2).unwrap(),
        ]
    }

    // ---- map ----

    #[test]
    fn test_map_preserves_order() {
        for executor in all_modes() {
            let out = executor
                .map((0..100).collect(), |x: i32| Ok(x * 2))
                .unwrap();
            let expected: Vec<i32> = (0..100).map(|x| x * 2).collect();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn test_map_returns_task_error() {
        for executor in all_modes() {
            let result = executor.map((0..10).collect(), |x: i32| {
                if x == 7 {
                    Err(GeneticError::InvalidArgument("seven".into()))
                } else {
                    Ok(x)
                }
            });
            assert!(matches!(result, Err(GeneticError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_map_surfaces_panic() {
        for executor in all_modes() {
            let result = executor.map((0..10).collect(), |x: i32| {
                if x == 3 {
                    panic!("boom at {x}");
                }
                Ok(x)
            });
            match result {
                Err(GeneticError::TaskPanicked(msg)) => assert!(msg.contains("boom"), "got: {msg}"),
                other => panic!("expected TaskPanicked, got {other:?}"),
            }
        }
    }

    // ---- for_each_mut ----

    #[test]
    fn test_for_each_mut_updates_all() {
        for executor in all_modes() {
            let mut items = vec![1u64; 64];
            executor
                .for_each_mut(&mut items, |x| {
                    *x += 1;
                    Ok(())
                })
                .unwrap();
            assert!(items.iter().all(|&x| x == 2));
        }
    }

    // ---- Construction ----

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            TaskExecutor::with_threads(0),
            Err(GeneticError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_options() {
        assert!(!TaskExecutor::from_options(false, Some(4)).unwrap().is_parallel());
        assert!(TaskExecutor::from_options(true, None).unwrap().is_parallel());
        assert!(TaskExecutor::from_options(true, Some(2)).unwrap().is_parallel());
    }

    #[test]
    fn test_execute_runs_in_pool() {
        let executor = TaskExecutor::with_threads(1).unwrap();
        let name = executor
            .execute(|| Ok(std::thread::current().name().map(str::to_string)))
            .unwrap();
        assert_eq!(name.as_deref(), Some("u-genetic-0"));
    }
}
