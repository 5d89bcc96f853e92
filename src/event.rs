use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::symbols::zone_symbol;
use crate::{EventTarget, Global};

pub const STOP_IMMEDIATE_PROPAGATION: &str = "stopImmediatePropagation";
pub const STOP_PROPAGATION: &str = "stopPropagation";
pub const PREVENT_DEFAULT: &str = "preventDefault";

pub type EventMethod = Rc<dyn Fn(&Event)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
}

impl Default for EventInit {
    fn default() -> Self {
        Self {
            bubbles: true,
            cancelable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

pub struct Event {
    event_type: String,
    init: EventInit,
    detail: Option<String>,
    prototype: Rc<EventPrototype>,
    target: RefCell<Weak<EventTarget>>,
    current_target: RefCell<Weak<EventTarget>>,
    phase: Cell<EventPhase>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    stop_immediate_propagation_flag: Cell<bool>,
    // Set by the patched stopImmediatePropagation; the dispatch router checks
    // it between tracked listeners.
    immediate_stop_requested: Cell<bool>,
}

impl Event {
    pub fn new(global: &Global, event_type: &str) -> Rc<Self> {
        Self::with_init(global, event_type, EventInit::default())
    }

    pub fn with_init(global: &Global, event_type: &str, init: EventInit) -> Rc<Self> {
        Rc::new(Self::build(global, event_type, init, None))
    }

    /// Payload carrying variant, used for emitter meta events such as
    /// `removeListener`.
    pub fn with_detail(global: &Global, event_type: &str, detail: &str) -> Rc<Self> {
        Rc::new(Self::build(
            global,
            event_type,
            EventInit {
                bubbles: false,
                cancelable: false,
            },
            Some(detail.to_string()),
        ))
    }

    fn build(global: &Global, event_type: &str, init: EventInit, detail: Option<String>) -> Self {
        Self {
            event_type: event_type.to_string(),
            init,
            detail,
            prototype: global.event_prototype(),
            target: RefCell::new(Weak::new()),
            current_target: RefCell::new(Weak::new()),
            phase: Cell::new(EventPhase::None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            stop_immediate_propagation_flag: Cell::new(false),
            immediate_stop_requested: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.init.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.init.cancelable
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn target(&self) -> Option<Rc<EventTarget>> {
        self.target.borrow().upgrade()
    }

    pub fn set_target(&self, target: &Rc<EventTarget>) {
        *self.target.borrow_mut() = Rc::downgrade(target);
    }

    pub fn current_target(&self) -> Option<Rc<EventTarget>> {
        self.current_target.borrow().upgrade()
    }

    pub(crate) fn set_current_target(&self, target: Option<&Rc<EventTarget>>) {
        *self.current_target.borrow_mut() = target.map(Rc::downgrade).unwrap_or_default();
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub(crate) fn set_phase(&self, phase: EventPhase) {
        self.phase.set(phase);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.stop_immediate_propagation_flag.get()
    }

    pub fn immediate_stop_requested(&self) -> bool {
        self.immediate_stop_requested.get()
    }

    pub fn stop_immediate_propagation(&self) {
        self.call(STOP_IMMEDIATE_PROPAGATION);
    }

    pub fn stop_propagation(&self) {
        self.call(STOP_PROPAGATION);
    }

    pub fn prevent_default(&self) {
        self.call(PREVENT_DEFAULT);
    }

    fn call(&self, name: &str) {
        if let Some(method) = self.prototype.method(name) {
            method(self);
        }
    }

    pub(crate) fn finish_dispatch(&self) {
        self.phase.set(EventPhase::None);
        self.set_current_target(None);
        self.propagation_stopped.set(false);
        self.stop_immediate_propagation_flag.set(false);
        self.immediate_stop_requested.set(false);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("init", &self.init)
            .field("phase", &self.phase.get())
            .field("default_prevented", &self.default_prevented.get())
            .field("propagation_stopped", &self.propagation_stopped.get())
            .field(
                "immediate_propagation_stopped",
                &self.stop_immediate_propagation_flag.get(),
            )
            .finish()
    }
}

/// Method table shared by every event created from one global.
pub struct EventPrototype {
    methods: RefCell<HashMap<String, EventMethod>>,
}

impl EventPrototype {
    pub fn new() -> Rc<Self> {
        let mut methods: HashMap<String, EventMethod> = HashMap::new();
        methods.insert(
            STOP_IMMEDIATE_PROPAGATION.to_string(),
            Rc::new(|event: &Event| {
                event.propagation_stopped.set(true);
                event.stop_immediate_propagation_flag.set(true);
            }),
        );
        methods.insert(
            STOP_PROPAGATION.to_string(),
            Rc::new(|event: &Event| event.propagation_stopped.set(true)),
        );
        methods.insert(
            PREVENT_DEFAULT.to_string(),
            Rc::new(|event: &Event| {
                if event.init.cancelable {
                    event.default_prevented.set(true);
                }
            }),
        );
        Rc::new(Self {
            methods: RefCell::new(methods),
        })
    }

    pub fn method(&self, name: &str) -> Option<EventMethod> {
        self.methods.borrow().get(name).cloned()
    }

    /// The pre-patch implementation of `name`, if it has been patched.
    pub fn original(&self, name: &str) -> Option<EventMethod> {
        self.method(&zone_symbol(name))
    }

    pub fn is_patched(&self, name: &str) -> bool {
        self.methods.borrow().contains_key(&zone_symbol(name))
    }

    pub(crate) fn patch_method(
        &self,
        name: &str,
        patch: impl FnOnce(EventMethod) -> EventMethod,
    ) -> bool {
        if self.is_patched(name) {
            return false;
        }
        let Some(delegate) = self.method(name) else {
            return false;
        };
        let patched = patch(delegate.clone());
        let mut methods = self.methods.borrow_mut();
        methods.insert(zone_symbol(name), delegate);
        methods.insert(name.to_string(), patched);
        true
    }
}

impl fmt::Debug for EventPrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.methods.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("EventPrototype")
            .field("methods", &names)
            .finish()
    }
}

/// Augments `stopImmediatePropagation` so that it also marks the event for
/// the dispatch router. The native method still runs.
pub fn patch_event_prototype(global: &Global) -> bool {
    let patched = global
        .event_prototype()
        .patch_method(STOP_IMMEDIATE_PROPAGATION, |delegate| {
            Rc::new(move |event: &Event| {
                tracing::trace!(event = event.event_type(), "immediate propagation stop requested");
                event.immediate_stop_requested.set(true);
                delegate(event);
            })
        });
    if patched {
        tracing::debug!("patched Event.stopImmediatePropagation");
    }
    patched
}
