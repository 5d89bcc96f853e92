use std::fmt;
use std::rc::Rc;

use crate::{EventTarget, EventTask, Listener, OptionsArg};

pub const ADD_EVENT_LISTENER: &str = "addEventListener";
pub const REMOVE_EVENT_LISTENER: &str = "removeEventListener";
pub const EVENT_LISTENERS: &str = "eventListeners";
pub const REMOVE_ALL_LISTENERS: &str = "removeAllListeners";

pub const ADD_LISTENER: &str = "addListener";
pub const PREPEND_LISTENER: &str = "prependListener";
pub const REMOVE_LISTENER: &str = "removeListener";
pub const LISTENERS: &str = "listeners";

/// Returning `false` skips the registration (or removal) silently.
pub type ValidateHandler = Rc<dyn Fn(&Rc<EventTarget>, &Listener, &str, &OptionsArg) -> bool>;

/// Decides whether a tracked task was registered with `delegate`.
pub type CompareFn = Rc<dyn Fn(&EventTask, &Listener) -> bool>;

#[derive(Clone)]
pub struct PatchOptions {
    pub add_event_listener: String,
    pub remove_event_listener: String,
    pub prepend_event_listener: Option<String>,
    pub listeners: String,
    pub remove_all_listeners: String,
    /// One shared native router per (target, event, capture) instead of one
    /// native registration per tracked listener.
    pub use_global_callback: bool,
    pub check_duplicate: bool,
    pub return_target: bool,
    /// The platform removes `once` listeners on its own; the router must not
    /// remove them a second time.
    pub native_auto_removes_once: bool,
    pub validate_handler: Option<ValidateHandler>,
    pub compare_task_callback_vs_delegate: Option<CompareFn>,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            add_event_listener: ADD_EVENT_LISTENER.to_string(),
            remove_event_listener: REMOVE_EVENT_LISTENER.to_string(),
            prepend_event_listener: None,
            listeners: EVENT_LISTENERS.to_string(),
            remove_all_listeners: REMOVE_ALL_LISTENERS.to_string(),
            use_global_callback: true,
            check_duplicate: true,
            return_target: false,
            native_auto_removes_once: false,
            validate_handler: None,
            compare_task_callback_vs_delegate: None,
        }
    }
}

impl PatchOptions {
    pub fn with_method_names(
        mut self,
        add: &str,
        remove: &str,
        listeners: &str,
        remove_all: &str,
    ) -> Self {
        self.add_event_listener = add.to_string();
        self.remove_event_listener = remove.to_string();
        self.listeners = listeners.to_string();
        self.remove_all_listeners = remove_all.to_string();
        self
    }

    pub fn with_prepend(mut self, prepend: &str) -> Self {
        self.prepend_event_listener = Some(prepend.to_string());
        self
    }

    pub fn with_global_callback(mut self, enabled: bool) -> Self {
        self.use_global_callback = enabled;
        self
    }

    pub fn with_check_duplicate(mut self, enabled: bool) -> Self {
        self.check_duplicate = enabled;
        self
    }

    pub fn with_return_target(mut self, enabled: bool) -> Self {
        self.return_target = enabled;
        self
    }

    pub fn with_native_auto_removes_once(mut self, enabled: bool) -> Self {
        self.native_auto_removes_once = enabled;
        self
    }

    pub fn with_validate_handler(
        mut self,
        validate: impl Fn(&Rc<EventTarget>, &Listener, &str, &OptionsArg) -> bool + 'static,
    ) -> Self {
        self.validate_handler = Some(Rc::new(validate));
        self
    }

    pub fn with_compare(mut self, compare: impl Fn(&EventTask, &Listener) -> bool + 'static) -> Self {
        self.compare_task_callback_vs_delegate = Some(Rc::new(compare));
        self
    }
}

impl fmt::Debug for PatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchOptions")
            .field("add_event_listener", &self.add_event_listener)
            .field("remove_event_listener", &self.remove_event_listener)
            .field("prepend_event_listener", &self.prepend_event_listener)
            .field("listeners", &self.listeners)
            .field("remove_all_listeners", &self.remove_all_listeners)
            .field("use_global_callback", &self.use_global_callback)
            .field("check_duplicate", &self.check_duplicate)
            .field("return_target", &self.return_target)
            .field("native_auto_removes_once", &self.native_auto_removes_once)
            .field("validate_handler", &self.validate_handler.is_some())
            .field(
                "compare_task_callback_vs_delegate",
                &self.compare_task_callback_vs_delegate.is_some(),
            )
            .finish()
    }
}

/// Per target type presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetProfile {
    /// DOM style `EventTarget`: shared router, duplicate checks, `once`
    /// re-implemented by the router.
    EventTarget,
    /// Emitter style: one native registration per listener, duplicates
    /// allowed, chaining, the emitter removes `once` wrappers itself.
    EventEmitter,
}

impl TargetProfile {
    pub fn into_options(self) -> PatchOptions {
        match self {
            Self::EventTarget => PatchOptions::default(),
            Self::EventEmitter => PatchOptions::default()
                .with_method_names(ADD_LISTENER, REMOVE_LISTENER, LISTENERS, REMOVE_ALL_LISTENERS)
                .with_prepend(PREPEND_LISTENER)
                .with_global_callback(false)
                .with_check_duplicate(false)
                .with_return_target(true)
                .with_native_auto_removes_once(true),
        }
    }
}

impl From<TargetProfile> for PatchOptions {
    fn from(profile: TargetProfile) -> Self {
        profile.into_options()
    }
}
