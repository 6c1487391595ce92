//! Multi-step mutations with named compensations
//!
//! The state store commits every `put` on its own, so an operation touching
//! several records cannot rely on the host to roll it back. A [`Saga`] runs
//! the steps in order and remembers a compensation for each completed step.
//! When a later step fails the compensations run in reverse order and the
//! original error is returned.
//!
//! Compensation is best-effort: a failing compensation is logged and
//! recorded, never retried, and the remaining compensations still run.
//!
//! ```
//! use datamarket_ledger::saga::Saga;
//!
//! let mut saga: Saga<'_, String> = Saga::new("example");
//! let value = saga.run_step("first", || Ok(1), || Ok(())).unwrap();
//! let result: Result<(), String> = saga.run_step("second", || Err("boom".to_string()), || Ok(()));
//! assert_eq!(value, 1);
//! assert!(result.is_err());
//! assert_eq!(saga.compensated(), &["first"]);
//! ```

use std::fmt::Display;

type Undo<'a, E> = Box<dyn FnOnce() -> Result<(), E> + 'a>;

struct Compensation<'a, E> {
    step: &'static str,
    undo: Undo<'a, E>,
}

/// Ordered steps with reverse-order compensation on failure
pub struct Saga<'a, E> {
    name: &'static str,
    completed: Vec<Compensation<'a, E>>,
    compensated: Vec<&'static str>,
    failed_compensations: Vec<&'static str>,
}

impl<'a, E: Display> Saga<'a, E> {
    /// Start a saga
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            completed: Vec::new(),
            compensated: Vec::new(),
            failed_compensations: Vec::new(),
        }
    }

    /// Run a step; on success remember `compensation`, on failure roll back
    pub fn run_step<T>(
        &mut self,
        step: &'static str,
        action: impl FnOnce() -> Result<T, E>,
        compensation: impl FnOnce() -> Result<(), E> + 'a,
    ) -> Result<T, E> {
        match action() {
            Ok(value) => {
                tracing::debug!(saga = self.name, step, "Saga step completed");
                self.completed.push(Compensation {
                    step,
                    undo: Box::new(compensation),
                });
                Ok(value)
            }
            Err(err) => Err(self.abort_at(step, err)),
        }
    }

    /// Run a step that needs no compensation (a check or the final write)
    pub fn run_final<T>(
        &mut self,
        step: &'static str,
        action: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        match action() {
            Ok(value) => {
                tracing::debug!(saga = self.name, step, "Saga step completed");
                Ok(value)
            }
            Err(err) => Err(self.abort_at(step, err)),
        }
    }

    /// Roll back every completed step and hand back `err`
    pub fn abort(&mut self, err: E) -> E {
        self.abort_at("external", err)
    }

    /// Forget the compensations; the saga's effects stand
    pub fn complete(mut self) {
        tracing::debug!(
            saga = self.name,
            steps = self.completed.len(),
            "Saga completed"
        );
        self.completed.clear();
    }

    /// Steps whose compensation ran successfully, in execution order
    pub fn compensated(&self) -> &[&'static str] {
        &self.compensated
    }

    /// Steps whose compensation failed
    pub fn failed_compensations(&self) -> &[&'static str] {
        &self.failed_compensations
    }

    fn abort_at(&mut self, step: &'static str, err: E) -> E {
        tracing::warn!(
            saga = self.name,
            step,
            error = %err,
            pending = self.completed.len(),
            "Saga step failed, compensating"
        );

        while let Some(compensation) = self.completed.pop() {
            match (compensation.undo)() {
                Ok(()) => {
                    tracing::info!(
                        saga = self.name,
                        step = compensation.step,
                        "Compensation applied"
                    );
                    self.compensated.push(compensation.step);
                }
                Err(undo_err) => {
                    // Not retried: the record stays as the failed step left it
                    tracing::error!(
                        saga = self.name,
                        step = compensation.step,
                        error = %undo_err,
                        "Compensation failed"
                    );
                    self.failed_compensations.push(compensation.step);
                }
            }
        }

        err
    }
}
