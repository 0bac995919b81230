// Stackful coroutines
// Each coroutine body runs on its own parked OS thread; resume hands the
// argument list over a channel and blocks until the body yields, returns
// or fails. Exactly one thread of a runtime executes at any instant, so
// single-threaded Lua semantics are preserved. Yields may cross any call
// depth, including native frames, because suspension is just a blocking
// receive on the body thread.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::lua_interp::{LuaError, LuaErrorKind, LuaResult, LuaRuntime, LuaState};
use crate::lua_value::LuaValue;

/// Coroutine body stack size; Lua permits deep recursion inside bodies.
const COROUTINE_STACK_SIZE: usize = 1 << 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoStatus {
    Suspended,
    Running,
    /// Active but currently resuming another coroutine.
    Normal,
    Dead,
}

impl CoStatus {
    pub fn name(self) -> &'static str {
        match self {
            CoStatus::Suspended => "suspended",
            CoStatus::Running => "running",
            CoStatus::Normal => "normal",
            CoStatus::Dead => "dead",
        }
    }
}

pub enum CoEvent {
    Yield(Vec<LuaValue>),
    Return(Vec<LuaValue>),
    Error(LuaError),
}

/// Body-side endpoints, owned by the coroutine's LuaState.
pub struct YieldChannel {
    pub(crate) event_tx: Sender<CoEvent>,
    pub(crate) resume_rx: Receiver<Vec<LuaValue>>,
}

pub struct Coroutine {
    status: Mutex<CoStatus>,
    resume_tx: Mutex<Option<Sender<Vec<LuaValue>>>>,
    event_rx: Mutex<Option<Receiver<CoEvent>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Coroutine {
    /// Create a coroutine around `func`. The body thread parks until the
    /// first resume delivers its arguments.
    pub fn spawn(rt: Arc<LuaRuntime>, func: LuaValue) -> LuaResult<Arc<Coroutine>> {
        let (resume_tx, resume_rx) = channel::<Vec<LuaValue>>();
        let (event_tx, event_rx) = channel::<CoEvent>();

        let coroutine = Arc::new(Coroutine {
            status: Mutex::new(CoStatus::Suspended),
            resume_tx: Mutex::new(Some(resume_tx)),
            event_rx: Mutex::new(Some(event_rx)),
            handle: Mutex::new(None),
        });

        let thread_co = coroutine.clone();
        let handle = std::thread::Builder::new()
            .name("lua-coroutine".to_string())
            .stack_size(COROUTINE_STACK_SIZE)
            .spawn(move || {
                // First resume delivers the initial arguments; a closed
                // channel means the coroutine was dropped unresumed.
                let Ok(args) = resume_rx.recv() else { return };
                let final_tx = event_tx.clone();
                let mut state = LuaState::for_coroutine(
                    rt,
                    thread_co,
                    YieldChannel {
                        event_tx,
                        resume_rx,
                    },
                );
                let event = match state.call_value(func, args) {
                    Ok(values) => CoEvent::Return(values),
                    Err(err) => CoEvent::Error(err),
                };
                let _ = final_tx.send(event);
            })
            .map_err(|e| LuaError::internal(format!("cannot spawn coroutine thread: {}", e)))?;

        *lock(&coroutine.handle) = Some(handle);
        Ok(coroutine)
    }

    pub fn status(&self) -> CoStatus {
        *lock(&self.status)
    }

    pub fn set_status(&self, status: CoStatus) {
        *lock(&self.status) = status;
    }

    /// Transfer control into the coroutine and block until it comes back.
    pub fn resume(
        self: &Arc<Self>,
        resumer: &mut LuaState,
        args: Vec<LuaValue>,
    ) -> LuaResult<Vec<LuaValue>> {
        match self.status() {
            CoStatus::Suspended => {}
            status => {
                return Err(LuaError::runtime(format!(
                    "cannot resume {} coroutine",
                    if status == CoStatus::Dead { "dead" } else { "non-suspended" }
                )));
            }
        }

        let sender = lock(&self.resume_tx).clone();
        let Some(sender) = sender else {
            self.set_status(CoStatus::Dead);
            return Err(LuaError::runtime("cannot resume dead coroutine"));
        };

        if let Some(current) = &resumer.current_coroutine {
            current.set_status(CoStatus::Normal);
        }
        self.set_status(CoStatus::Running);

        let outcome = if sender.send(args).is_err() {
            None
        } else {
            let receiver = lock(&self.event_rx);
            receiver.as_ref().and_then(|rx| rx.recv().ok())
        };

        if let Some(current) = &resumer.current_coroutine {
            current.set_status(CoStatus::Running);
        }

        match outcome {
            Some(CoEvent::Yield(values)) => {
                self.set_status(CoStatus::Suspended);
                Ok(values)
            }
            Some(CoEvent::Return(values)) => {
                self.teardown();
                Ok(values)
            }
            Some(CoEvent::Error(err)) => {
                self.teardown();
                Err(err)
            }
            None => {
                self.teardown();
                Err(LuaError::internal("coroutine channel closed unexpectedly"))
            }
        }
    }

    /// Close a suspended coroutine: tear down its channels so the body
    /// thread unwinds (running `__close` handlers on its own stack) and
    /// exits. Errors raised during that unwind are not observable here.
    pub fn close(&self) -> LuaResult<()> {
        match self.status() {
            CoStatus::Dead => Ok(()),
            CoStatus::Suspended => {
                self.teardown();
                Ok(())
            }
            _ => Err(LuaError::runtime("cannot close a running coroutine")),
        }
    }

    fn teardown(&self) {
        self.set_status(CoStatus::Dead);
        *lock(&self.resume_tx) = None;
        *lock(&self.event_rx) = None;
    }
}

impl LuaState {
    /// `coroutine.yield`: hand the values to the resumer and park until
    /// the next resume.
    pub fn do_yield(&mut self, values: Vec<LuaValue>) -> LuaResult<Vec<LuaValue>> {
        let Some(channel) = &self.yield_channel else {
            return Err(self.error("attempt to yield from outside a coroutine"));
        };
        if channel.event_tx.send(CoEvent::Yield(values)).is_err() {
            // The coroutine handle was dropped; unwind the body thread
            return Err(LuaError::new(
                LuaErrorKind::Internal,
                "coroutine dropped while suspended",
            ));
        }
        match channel.resume_rx.recv() {
            Ok(args) => Ok(args),
            Err(_) => Err(LuaError::new(
                LuaErrorKind::Internal,
                "coroutine dropped while suspended",
            )),
        }
    }

    pub fn is_yieldable(&self) -> bool {
        self.yield_channel.is_some()
    }

    pub fn running_coroutine(&self) -> Option<Arc<Coroutine>> {
        self.current_coroutine.clone()
    }
}
