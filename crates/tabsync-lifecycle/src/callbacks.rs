//! Consumer callbacks.

use std::fmt;
use std::time::Duration;

type Callback = Box<dyn Fn() + Send + Sync>;
type VisibilityCallback = Box<dyn Fn(bool) + Send + Sync>;

/// What a consumer wants to hear about. Every hook is optional.
///
/// Callbacks run on the task that delivered the signal (or on the debounce
/// timer task for a hidden dispatch), outside any lock. They should be
/// quick; spawn if there is real work to do.
///
/// ```rust
/// use std::time::Duration;
/// use tabsync_lifecycle::LifecycleCallbacks;
///
/// let callbacks = LifecycleCallbacks::new()
///     .on_visibility_change(|visible| println!("visible: {visible}"))
///     .on_resume(|| println!("revalidate"))
///     .debounce_delay(Duration::from_millis(100));
/// ```
#[derive(Default)]
pub struct LifecycleCallbacks {
    pub(crate) visibility_change: Option<VisibilityCallback>,
    pub(crate) freeze: Option<Callback>,
    pub(crate) resume: Option<Callback>,
    pub(crate) focus: Option<Callback>,
    pub(crate) blur: Option<Callback>,
    pub(crate) terminate: Option<Callback>,
    pub(crate) debounce_delay: Option<Duration>,
}

impl LifecycleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `false` once the page has stayed hidden for the debounce
    /// delay, and with `true` when it comes back after that.
    pub fn on_visibility_change(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.visibility_change = Some(Box::new(f));
        self
    }

    pub fn on_freeze(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.freeze = Some(Box::new(f));
        self
    }

    /// Called when a frozen page resumes. Anything cached may be stale.
    pub fn on_resume(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.resume = Some(Box::new(f));
        self
    }

    pub fn on_focus(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.focus = Some(Box::new(f));
        self
    }

    pub fn on_blur(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.blur = Some(Box::new(f));
        self
    }

    /// Called once when the page is torn down.
    pub fn on_terminate(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.terminate = Some(Box::new(f));
        self
    }

    /// Overrides the manager's default debounce delay for this consumer.
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = Some(delay);
        self
    }

    pub(crate) fn dispatch(&self, dispatch: Dispatch) {
        let hook = match dispatch {
            Dispatch::Visibility(visible) => {
                if let Some(f) = &self.visibility_change {
                    f(visible);
                }
                return;
            }
            Dispatch::Freeze => &self.freeze,
            Dispatch::Resume => &self.resume,
            Dispatch::Focus => &self.focus,
            Dispatch::Blur => &self.blur,
            Dispatch::Terminate => &self.terminate,
        };
        if let Some(f) = hook {
            f();
        }
    }
}

impl fmt::Debug for LifecycleCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCallbacks")
            .field("visibility_change", &self.visibility_change.is_some())
            .field("freeze", &self.freeze.is_some())
            .field("resume", &self.resume.is_some())
            .field("focus", &self.focus.is_some())
            .field("blur", &self.blur.is_some())
            .field("terminate", &self.terminate.is_some())
            .field("debounce_delay", &self.debounce_delay)
            .finish()
    }
}

/// One callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Visibility(bool),
    Freeze,
    Resume,
    Focus,
    Blur,
    Terminate,
}
