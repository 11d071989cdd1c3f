use linkerd_namer::resolver::{Error, Result};
use linkerd_namer::{Combiner, Completion, Locked, OrphanablePtr, ResolutionResult, Resolver};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct State {
    next_calls: usize,
    reresolution_calls: usize,
    shutdown_calls: usize,
    pending: Option<Completion>,
    last: Option<Result<ResolutionResult>>,
    fresh: bool,
    shutdown: bool,
}

impl State {
    fn maybe_finish(&mut self) {
        if !self.fresh {
            return;
        }
        if let Some(ref last) = self.last {
            if let Some(c) = self.pending.take() {
                self.fresh = false;
                c.complete(last.clone());
            }
        }
    }
}

/// Inspects and drives a mock resolver from a test.
///
/// Updates are scheduled onto the resolver's combiner, like a real naming service
/// callback would be.
#[derive(Clone)]
pub struct MockHandle {
    combiner: Combiner,
    state: Arc<Mutex<State>>,
}

impl MockHandle {
    /// Simulates the naming service sending `result`.
    pub fn push(&self, result: Result<ResolutionResult>) {
        let state = self.state.clone();
        self.combiner
            .run(move |_| {
                     let mut state = state.lock().unwrap();
                     if state.shutdown {
                         return;
                     }
                     state.last = Some(result);
                     state.fresh = true;
                     state.maybe_finish();
                 })
            .expect("combiner closed");
    }

    pub fn next_calls(&self) -> usize {
        self.state().next_calls
    }

    pub fn reresolution_calls(&self) -> usize {
        self.state().reresolution_calls
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state().shutdown_calls
    }

    pub fn has_pending(&self) -> bool {
        self.state().pending.is_some()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

fn next(state: &Mutex<State>, on_complete: Completion) {
    let mut state = state.lock().unwrap();
    assert!(state.pending.is_none(), "second pending next");
    state.next_calls += 1;
    if state.shutdown {
        on_complete.fail(Error::Shutdown);
        return;
    }
    state.pending = Some(on_complete);
    state.maybe_finish();
}

fn shutdown(state: &Mutex<State>) {
    let mut state = state.lock().unwrap();
    state.shutdown_calls += 1;
    state.shutdown = true;
    if let Some(c) = state.pending.take() {
        c.fail(Error::Shutdown);
    }
}

/// A push-simulated resolver: results arrive only when the test pushes them.
/// Re-resolution hands back a copy of the last pushed result, if any.
pub struct MockPush(Arc<Mutex<State>>);

pub fn mock_push(combiner: &Combiner) -> (OrphanablePtr<MockPush>, MockHandle) {
    let state = Arc::new(Mutex::new(State::default()));
    let resolver = OrphanablePtr::new(combiner, MockPush(state.clone()));
    let handle = MockHandle {
        combiner: combiner.clone(),
        state,
    };
    (resolver, handle)
}

impl Resolver for MockPush {
    fn next_locked(&mut self, _: &Locked<'_, Self>, on_complete: Completion) {
        next(&self.0, on_complete);
    }

    fn request_reresolution_locked(&mut self, _: &Locked<'_, Self>) {
        let mut state = self.0.lock().unwrap();
        state.reresolution_calls += 1;
        if state.last.is_some() {
            state.fresh = true;
            state.maybe_finish();
        }
    }

    fn shutdown_locked(&mut self, _: &Locked<'_, Self>) {
        shutdown(&self.0);
    }
}

/// A pull-simulated resolver that always defers its query: re-resolution is answered
/// with a copy of the last-known result.
pub struct MockPull(Arc<Mutex<State>>);

pub fn mock_pull(combiner: &Combiner,
                 initial: ResolutionResult)
                 -> (OrphanablePtr<MockPull>, MockHandle) {
    let state = State {
        last: Some(Ok(initial)),
        fresh: true,
        ..State::default()
    };
    let state = Arc::new(Mutex::new(state));
    let resolver = OrphanablePtr::new(combiner, MockPull(state.clone()));
    let handle = MockHandle {
        combiner: combiner.clone(),
        state,
    };
    (resolver, handle)
}

impl Resolver for MockPull {
    fn next_locked(&mut self, _: &Locked<'_, Self>, on_complete: Completion) {
        next(&self.0, on_complete);
    }

    fn request_reresolution_locked(&mut self, _: &Locked<'_, Self>) {
        let mut state = self.0.lock().unwrap();
        state.reresolution_calls += 1;
        state.fresh = true;
        state.maybe_finish();
    }

    fn shutdown_locked(&mut self, _: &Locked<'_, Self>) {
        shutdown(&self.0);
    }
}
