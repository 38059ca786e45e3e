//! Test utilities for ensemble-lib.
//!
//! Fake [`Work`] implementations and small builders for action sets, so
//! planner and scheduler tests can describe graphs compactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::action::{Action, ActionError, ActionSet, BuildScope, RunContext, Work};

/// Tracks how many fake actions run at the same time.
#[derive(Debug, Default)]
pub struct Concurrency {
  current: AtomicUsize,
  max: AtomicUsize,
}

impl Concurrency {
  pub fn max(&self) -> usize {
    self.max.load(Ordering::SeqCst)
  }
}

/// In-memory work whose behaviour is fixed at construction.
#[derive(Debug, Default)]
pub struct FakeWork {
  satisfied: AtomicBool,
  fail: bool,
  panic: bool,
  delay: Option<Duration>,
  prerequisite: Option<String>,
  runs: AtomicUsize,
  last_ctx: std::sync::Mutex<Option<RunContext>>,
  concurrency: Option<Arc<Concurrency>>,
}

impl FakeWork {
  pub fn satisfied() -> Arc<Self> {
    Arc::new(Self {
      satisfied: AtomicBool::new(true),
      ..Default::default()
    })
  }

  pub fn unsatisfied() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn failing() -> Arc<Self> {
    Arc::new(Self {
      fail: true,
      ..Default::default()
    })
  }

  pub fn panicking() -> Arc<Self> {
    Arc::new(Self {
      panic: true,
      ..Default::default()
    })
  }

  /// Unsatisfied work that sleeps while running and reports into `tracker`.
  pub fn slow(delay: Duration, tracker: Arc<Concurrency>) -> Arc<Self> {
    Arc::new(Self {
      delay: Some(delay),
      concurrency: Some(tracker),
      ..Default::default()
    })
  }

  /// Slow work that fails after sleeping.
  pub fn slow_failing(delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      fail: true,
      delay: Some(delay),
      ..Default::default()
    })
  }

  /// Work whose prerequisite check fails with `message`.
  pub fn missing_prerequisite(satisfied: bool, message: &str) -> Arc<Self> {
    Arc::new(Self {
      satisfied: AtomicBool::new(satisfied),
      prerequisite: Some(message.to_string()),
      ..Default::default()
    })
  }

  pub fn runs(&self) -> usize {
    self.runs.load(Ordering::SeqCst)
  }

  pub fn last_ctx(&self) -> Option<RunContext> {
    *self.last_ctx.lock().unwrap()
  }
}

impl Work for FakeWork {
  fn is_satisfied(&self) -> bool {
    self.satisfied.load(Ordering::SeqCst)
  }

  fn run(&self, ctx: &RunContext) -> Result<(), ActionError> {
    self.runs.fetch_add(1, Ordering::SeqCst);
    *self.last_ctx.lock().unwrap() = Some(*ctx);

    if let Some(tracker) = &self.concurrency {
      let now = tracker.current.fetch_add(1, Ordering::SeqCst) + 1;
      tracker.max.fetch_max(now, Ordering::SeqCst);
    }
    if let Some(delay) = self.delay {
      std::thread::sleep(delay);
    }
    if let Some(tracker) = &self.concurrency {
      tracker.current.fetch_sub(1, Ordering::SeqCst);
    }

    if self.panic {
      panic!("fake work exploded");
    }
    if self.fail {
      return Err(ActionError::Failed("fake failure".to_string()));
    }
    if !ctx.pretend {
      self.satisfied.store(true, Ordering::SeqCst);
    }
    Ok(())
  }

  fn check_prerequisites(&self) -> Result<(), ActionError> {
    match &self.prerequisite {
      Some(message) => Err(ActionError::Prerequisite {
        action: "fake".to_string(),
        message: message.clone(),
      }),
      None => Ok(()),
    }
  }
}

pub fn names(list: &[&str]) -> Vec<String> {
  list.iter().map(|s| s.to_string()).collect()
}

/// Builder for action sets used across graph and scheduler tests.
#[derive(Default)]
pub struct SetBuilder {
  set: ActionSet,
}

impl SetBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn task(mut self, name: &str, deps: &[&str], work: Arc<FakeWork>) -> Self {
    self.set.insert(Action::task(name, names(deps), work)).unwrap();
    self
  }

  pub fn build(mut self, component: &str, build: &str, deps: &[&str], work: Arc<FakeWork>) -> Self {
    self
      .set
      .insert(Action::build(BuildScope::new(component, build), names(deps), work))
      .unwrap();
    self
  }

  pub fn any_of(mut self, name: &str, alternatives: &[&str], preferred: Option<&str>) -> Self {
    self
      .set
      .insert(Action::any_of(name, names(alternatives), preferred.map(str::to_string)))
      .unwrap();
    self
  }

  pub fn finish(self) -> ActionSet {
    self.set
  }
}
