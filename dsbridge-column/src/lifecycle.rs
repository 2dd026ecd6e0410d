//! Unit-of-work lifecycle and guaranteed cleanup.
//!
//! A [`TaskContext`] represents one unit of work, typically one task scanning
//! one file split. Buffers allocated on its behalf register completion actions
//! with the context; [`TaskContext::complete`] runs each of them exactly once.
//! [`run_task`] wraps a closure so the context completes on every exit path:
//! normal return, error return, and unwinding panic.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dsbridge_result::{Error, Result};
use tracing::{debug, warn};

use crate::allocator::BufferAllocator;
use crate::column::Column;

/// How a unit of work ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
    Interrupted(String),
}

type CompletionAction = Box<dyn FnOnce(&TaskOutcome) + Send + 'static>;

#[derive(Default)]
struct CompletionState {
    actions: Vec<CompletionAction>,
    outcome: Option<TaskOutcome>,
}

/// Scope under which column buffers are allocated and released.
pub struct TaskContext {
    task_id: u64,
    allocator: Arc<BufferAllocator>,
    interrupted: Mutex<Option<String>>,
    completion: Mutex<CompletionState>,
}

impl TaskContext {
    pub fn new(task_id: u64, allocator: Arc<BufferAllocator>) -> Arc<Self> {
        Arc::new(Self {
            task_id,
            allocator,
            interrupted: Mutex::new(None),
            completion: Mutex::new(CompletionState::default()),
        })
    }

    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn allocator(&self) -> &Arc<BufferAllocator> {
        &self.allocator
    }

    fn lock_completion(&self) -> MutexGuard<'_, CompletionState> {
        self.completion.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `action` to run once when this unit of work completes.
    ///
    /// Actions run in reverse registration order. Registering on a context
    /// that already completed runs the action immediately.
    pub fn add_completion_action<F>(&self, action: F)
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        let outcome = {
            let mut state = self.lock_completion();
            match state.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    state.actions.push(Box::new(action));
                    return;
                }
            }
        };
        debug!(task_id = self.task_id, "running completion action on completed task");
        action(&outcome);
    }

    /// Release `columns` when this unit of work completes.
    pub fn release_on_completion(&self, columns: Vec<Column>) {
        if columns.is_empty() {
            return;
        }
        let task_id = self.task_id;
        self.add_completion_action(move |_| {
            debug!(task_id, columns = columns.len(), "releasing task-scoped columns");
            for column in columns {
                column.release();
            }
        });
    }

    /// Number of actions still waiting for completion.
    pub fn pending_actions(&self) -> usize {
        self.lock_completion().actions.len()
    }

    /// Finish this unit of work and run every registered action.
    ///
    /// Returns `false` if the context had already completed; actions never run
    /// twice.
    pub fn complete(&self, outcome: TaskOutcome) -> bool {
        let actions = {
            let mut state = self.lock_completion();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            mem::take(&mut state.actions)
        };

        debug!(
            task_id = self.task_id,
            ?outcome,
            actions = actions.len(),
            "completing task"
        );
        for action in actions.into_iter().rev() {
            action(&outcome);
        }
        true
    }

    pub fn is_completed(&self) -> bool {
        self.lock_completion().outcome.is_some()
    }

    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.lock_completion().outcome.clone()
    }

    /// Ask the unit of work to stop at its next interruption check.
    pub fn interrupt(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(task_id = self.task_id, %reason, "task interrupted");
        let mut interrupted = self
            .interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        interrupted.get_or_insert(reason);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Fail with [`Error::TaskInterrupted`] if [`TaskContext::interrupt`] was called.
    pub fn check_interrupted(&self) -> Result<()> {
        match self
            .interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(reason) => Err(Error::TaskInterrupted(reason.clone())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("completed", &self.is_completed())
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// Completes the context when dropped, including during unwinding.
struct CompletionGuard {
    ctx: Arc<TaskContext>,
    outcome: Option<TaskOutcome>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| TaskOutcome::Failed("task panicked".to_string()));
        self.ctx.complete(outcome);
    }
}

/// Run `f` as one unit of work with guaranteed cleanup.
///
/// The context passed to `f` completes after `f` returns, whatever it returns,
/// and also if `f` panics.
pub fn run_task<T, F>(task_id: u64, allocator: Arc<BufferAllocator>, f: F) -> Result<T>
where
    F: FnOnce(&Arc<TaskContext>) -> Result<T>,
{
    let ctx = TaskContext::new(task_id, allocator);
    let mut guard = CompletionGuard {
        ctx: Arc::clone(&ctx),
        outcome: None,
    };

    let result = f(&ctx);
    guard.outcome = Some(match &result {
        Ok(_) => TaskOutcome::Succeeded,
        Err(Error::TaskInterrupted(reason)) => TaskOutcome::Interrupted(reason.clone()),
        Err(err) => TaskOutcome::Failed(err.to_string()),
    });
    drop(guard);
    result
}
