//! Per-process session state.
//!
//! Created once at startup and passed to whatever needs it. It is never
//! reset while the process runs; a restart is a new session.

#[derive(Debug, Default)]
pub struct SessionState {
  initial_check_done: bool,
}

impl SessionState {
  pub fn new() -> Self { Self::default() }

  /// Returns `true` exactly once per session.
  pub fn begin_initial_check(&mut self) -> bool {
    !std::mem::replace(&mut self.initial_check_done, true)
  }

  pub fn initial_check_done(&self) -> bool { self.initial_check_done }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn initial_check_runs_once() {
    let mut session = SessionState::new();
    assert!(session.begin_initial_check());
    assert!(!session.begin_initial_check());
    assert!(session.initial_check_done());
  }
}
