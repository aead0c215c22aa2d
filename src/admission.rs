//! In-flight accounting and admission control for one cache instance.
//!
//! A single counter backs both concerns: `admit` suspends callers until the
//! count drops below the ceiling, and `idle` suspends until it reaches
//! zero. Waiters are woken all at once and race for the freed slot, so no
//! ordering is guaranteed among them; this keeps the original coarse,
//! non-FIFO admission policy while replacing its polling loops with native
//! suspension.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Clones share the same counter; one gate serves one cache instance.
#[derive(Clone)]
pub(crate) struct Gate {
  inner: Arc<Inner>,
}

struct Inner {
  ceiling: usize,
  count: Mutex<usize>,
  changed: Notify,
}

impl Gate {
  pub(crate) fn new(ceiling: usize) -> Self {
    Self {
      inner: Arc::new(Inner {
        ceiling,
        count: Mutex::new(0),
        changed: Notify::new(),
      }),
    }
  }

  /// Wait until the in-flight count is below the ceiling, then register.
  /// The returned guard deregisters on drop, on every exit path.
  pub(crate) async fn admit(&self) -> GateGuard {
    loop {
      let notified = self.inner.changed.notified();
      tokio::pin!(notified);
      // Register for wakeups before checking, so a release between the
      // check and the await is not lost.
      notified.as_mut().enable();

      {
        let mut count = self.inner.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count < self.inner.ceiling {
          *count += 1;
          return GateGuard { gate: self.clone() };
        }
      }

      notified.await;
    }
  }

  /// Register without the ceiling check. Bulk queries count toward
  /// quiescence but are not admission-gated.
  pub(crate) fn enter(&self) -> GateGuard {
    let mut count = self.inner.count.lock().unwrap_or_else(PoisonError::into_inner);
    *count += 1;
    GateGuard { gate: self.clone() }
  }

  /// Wait until every registered operation has deregistered.
  pub(crate) async fn idle(&self) {
    loop {
      let notified = self.inner.changed.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      if *self.inner.count.lock().unwrap_or_else(PoisonError::into_inner) == 0 {
        return;
      }

      notified.await;
    }
  }

  #[cfg(test)]
  fn in_flight(&self) -> usize {
    *self.inner.count.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

pub(crate) struct GateGuard {
  gate: Gate,
}

impl Drop for GateGuard {
  fn drop(&mut self) {
    {
      let mut count = self.gate.inner.count.lock().unwrap_or_else(PoisonError::into_inner);
      *count -= 1;
    }
    self.gate.inner.changed.notify_waiters();
  }
}
