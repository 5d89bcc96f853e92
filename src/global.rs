use std::cell::RefCell;
use std::rc::Rc;

use crate::{Event, EventPrototype, EventTarget};

/// Process-level state the interception layer falls back on: the receiver
/// used when neither `this` nor `event.target` is available, the ambient
/// `event` of the dispatch in progress, and the event method table.
#[derive(Debug)]
pub struct Global {
    fallback_target: RefCell<Option<Rc<EventTarget>>>,
    event: RefCell<Option<Rc<Event>>>,
    event_prototype: Rc<EventPrototype>,
}

impl Global {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            fallback_target: RefCell::new(None),
            event: RefCell::new(None),
            event_prototype: EventPrototype::new(),
        })
    }

    pub fn event_prototype(&self) -> Rc<EventPrototype> {
        Rc::clone(&self.event_prototype)
    }

    pub fn fallback_target(&self) -> Option<Rc<EventTarget>> {
        self.fallback_target.borrow().clone()
    }

    pub fn set_fallback_target(&self, target: &Rc<EventTarget>) {
        *self.fallback_target.borrow_mut() = Some(Rc::clone(target));
    }

    pub fn current_event(&self) -> Option<Rc<Event>> {
        self.event.borrow().clone()
    }

    /// Returns the previously ambient event so nested dispatches can restore it.
    pub fn replace_current_event(&self, event: Option<Rc<Event>>) -> Option<Rc<Event>> {
        self.event.replace(event)
    }
}
