//! Global hotkey capture.
//!
//! Combinations are registered up front, then [`HotkeyCapture::start`] moves
//! them onto a dedicated `hotkey-capture` thread that runs the OS keyboard
//! listener for the rest of the process. Every match calls one dispatch
//! function with the identifier that was registered, on that thread.
//!
//! The OS backend is rdev (feature `os-hooks`). rdev offers no way to remove
//! its hook once installed, so [`CaptureHandle::stop`] disarms dispatch and
//! the hook itself goes away with the process.

mod combo;
#[cfg(feature = "os-hooks")]
mod listener;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use combo::{
    ComboMatcher, ComboParseError, KeyCode, KeyCombo, KeyInput, Modifier, Modifiers, PhysicalKey, Side,
};

use crate::actions::normalize_combo;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("unsupported key combination '{combo}': {source}")]
    UnsupportedCombination {
        combo: String,
        #[source]
        source: ComboParseError,
    },
    #[error("'{combo}' is the same key combination as '{existing}'")]
    DuplicateCombination { combo: String, existing: String },
    #[error("no hotkeys could be registered")]
    NothingRegistered,
    #[error("global keyboard listener failed: {0}")]
    Listen(String),
    #[error("built without OS hotkey support (enable the `os-hooks` feature)")]
    Unavailable,
}

/// Registered combinations, not yet listening.
#[derive(Debug, Default)]
pub struct HotkeyCapture {
    bindings: HashMap<KeyCombo, String>,
}

impl HotkeyCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one combination. The normalized identifier is what the
    /// dispatch function receives when it fires.
    pub fn register(&mut self, combo_id: &str) -> Result<(), CaptureError> {
        let id = normalize_combo(combo_id);
        let combo: KeyCombo =
            id.parse()
                .map_err(|source| CaptureError::UnsupportedCombination {
                    combo: id.clone(),
                    source,
                })?;
        if let Some(existing) = self.bindings.get(&combo) {
            return Err(CaptureError::DuplicateCombination {
                combo: id,
                existing: existing.clone(),
            });
        }
        tracing::debug!(combo = %id, chord = %combo, "hotkey registered");
        self.bindings.insert(combo, id);
        Ok(())
    }

    /// Register every identifier, logging and skipping the ones that fail.
    ///
    /// Fails only when nothing at all could be registered.
    pub fn register_all<'a, I>(&mut self, combo_ids: I) -> Result<usize, CaptureError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut registered = 0;
        for combo_id in combo_ids {
            match self.register(combo_id) {
                Ok(()) => registered += 1,
                Err(e) => tracing::error!(combo = combo_id, error = %e, "failed to register hotkey"),
            }
        }
        if registered == 0 {
            return Err(CaptureError::NothingRegistered);
        }
        Ok(registered)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Split into the thread-side dispatcher and the owner-side handle
    /// without starting an OS listener. `start` is built on this; tests
    /// drive the returned [`KeyDispatch`] directly.
    pub fn into_dispatch<F>(self, on_match: F) -> (KeyDispatch<F>, CaptureHandle)
    where
        F: Fn(&str) + Send + 'static,
    {
        let armed = Arc::new(AtomicBool::new(true));
        let registered = self.bindings.len();
        let dispatch = KeyDispatch {
            matcher: ComboMatcher::new(self.bindings),
            armed: armed.clone(),
            on_match,
        };
        let handle = CaptureHandle {
            armed,
            registered,
            _listener: None,
        };
        (dispatch, handle)
    }

    /// Start listening on a background thread and return immediately.
    pub fn start<F>(self, on_match: F) -> Result<CaptureHandle, CaptureError>
    where
        F: Fn(&str) + Send + 'static,
    {
        if self.is_empty() {
            return Err(CaptureError::NothingRegistered);
        }
        let (dispatch, handle) = self.into_dispatch(on_match);

        #[cfg(feature = "os-hooks")]
        {
            let mut handle = handle;
            match listener::spawn(dispatch) {
                Ok(thread) => handle._listener = Some(thread),
                Err(e) => {
                    handle.disarm();
                    return Err(e);
                }
            }
            tracing::info!(hotkeys = handle.registered, "hotkey listener started");
            Ok(handle)
        }

        #[cfg(not(feature = "os-hooks"))]
        {
            drop(dispatch);
            handle.disarm();
            Err(CaptureError::Unavailable)
        }
    }
}

/// Thread-side half: turns key events into dispatch calls while armed.
pub struct KeyDispatch<F> {
    matcher: ComboMatcher,
    armed: Arc<AtomicBool>,
    on_match: F,
}

impl<F: Fn(&str)> KeyDispatch<F> {
    /// Feed one key event. Returns true if it triggered a dispatch.
    pub fn feed(&mut self, input: KeyInput) -> bool {
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }
        match self.matcher.feed(input) {
            Some(combo_id) => {
                (self.on_match)(combo_id);
                true
            }
            None => false,
        }
    }
}

/// Owner-side half. Dropping it stops capture.
pub struct CaptureHandle {
    armed: Arc<AtomicBool>,
    registered: usize,
    _listener: Option<std::thread::JoinHandle<()>>,
}

impl CaptureHandle {
    /// Stop dispatching hotkeys. Idempotent.
    pub fn stop(&self) {
        if self.armed.swap(false, Ordering::AcqRel) {
            tracing::info!(hotkeys = self.registered, "hotkey hooks released");
        }
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn registered(&self) -> usize {
        self.registered
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
