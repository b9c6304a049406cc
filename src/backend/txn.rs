//! Transaction guard
//!
//! WATCH / MULTI / EXEC / DISCARD as a scoped resource: writes are queued
//! locally and reach the backend only on `commit`. Dropping an uncommitted
//! transaction discards it.

use crate::error::Result;

use super::{Backend, TxnOutcome, TxnRequest, Watched, WriteOp};

/// An open transaction against one backend
pub struct Transaction<'a, B: Backend + ?Sized> {
    backend: &'a B,
    request: TxnRequest,
    open: bool,
}

impl<'a, B: Backend + ?Sized> Transaction<'a, B> {
    pub fn begin(backend: &'a B) -> Self {
        Self {
            backend,
            request: TxnRequest::default(),
            open: true,
        }
    }

    /// Record the current versions of `keys`; commit fails if any changes
    pub fn watch(&mut self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let versions = self.backend.watch(keys)?;
        self.request.watched.extend(
            keys.iter()
                .cloned()
                .zip(versions)
                .map(|(key, version)| Watched { key, version }),
        );
        Ok(())
    }

    pub fn queue(&mut self, op: WriteOp) {
        self.request.ops.push(op);
    }

    pub fn queued(&self) -> usize {
        self.request.ops.len()
    }

    /// Send every queued write as one atomic EXEC
    pub fn commit(mut self) -> Result<TxnOutcome> {
        self.open = false;
        match self.backend.exec(&self.request) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(
                    "EXEC of {} queued writes failed, transaction discarded: {}",
                    self.request.ops.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Discard every queued write
    pub fn abort(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if self.open {
            self.open = false;
            tracing::trace!("DISCARD {} queued writes", self.request.ops.len());
            self.request.ops.clear();
            self.request.watched.clear();
        }
    }
}

impl<B: Backend + ?Sized> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        self.discard();
    }
}
