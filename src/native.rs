//! The unpatched platform: per-target native listener storage, DOM style and
//! emitter style prototypes, and native event delivery.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::{
    ADD_EVENT_LISTENER, ADD_LISTENER, EVENT_LISTENERS, LISTENERS, PREPEND_LISTENER,
    REMOVE_ALL_LISTENERS, REMOVE_EVENT_LISTENER, REMOVE_LISTENER,
};
use crate::target::{AddListenerFn, ListenersFn, RemoveAllListenersFn, RemoveListenerFn};
use crate::{Event, EventPhase, EventTarget, Global, Listener, Method, OptionsArg, Prototype};

const REMOVE_LISTENER_EVENT: &str = "removeListener";

#[derive(Debug, Clone)]
pub(crate) struct NativeListener {
    event: String,
    capture: bool,
    once: bool,
    passive: bool,
    options: OptionsArg,
    handler: Listener,
}

#[derive(Debug, Default)]
pub(crate) struct NativeListenerStore {
    listeners: Vec<NativeListener>,
}

impl NativeListenerStore {
    fn add(&mut self, listener: NativeListener, dedupe: bool, prepend: bool) -> bool {
        // Match browser semantics: dedupe only when the same callback reference
        // is re-registered for the same type/capture pair.
        if dedupe
            && self.listeners.iter().any(|existing| {
                existing.event == listener.event
                    && existing.capture == listener.capture
                    && existing.handler.same(&listener.handler)
            })
        {
            return false;
        }
        if prepend {
            self.listeners.insert(0, listener);
        } else {
            self.listeners.push(listener);
        }
        true
    }

    fn remove(&mut self, event: &str, capture: bool, handler: &Listener) -> bool {
        if let Some(pos) = self.listeners.iter().position(|listener| {
            listener.event == event && listener.capture == capture && listener.handler.same(handler)
        }) {
            self.listeners.remove(pos);
            return true;
        }
        false
    }

    fn contains(&self, candidate: &NativeListener) -> bool {
        self.listeners.iter().any(|listener| {
            listener.event == candidate.event
                && listener.capture == candidate.capture
                && listener.handler.same(&candidate.handler)
        })
    }

    fn get(&self, event: &str, capture: bool) -> Vec<NativeListener> {
        self.listeners
            .iter()
            .filter(|listener| listener.event == event && listener.capture == capture)
            .cloned()
            .collect()
    }

    fn handlers(&self, event: Option<&str>) -> Vec<Listener> {
        self.listeners
            .iter()
            .filter(|listener| event.is_none_or(|event| listener.event == event))
            .map(|listener| listener.handler.clone())
            .collect()
    }

    fn clear(&mut self, event: Option<&str>) -> Vec<NativeListener> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.listeners)
            .into_iter()
            .partition(|listener| event.is_none_or(|event| listener.event == event));
        self.listeners = kept;
        removed
    }

    pub(crate) fn options(&self, event: &str, capture: bool) -> Vec<OptionsArg> {
        self.listeners
            .iter()
            .filter(|listener| listener.event == event && listener.capture == capture)
            .map(|listener| listener.options.clone())
            .collect()
    }

    pub(crate) fn count(&self, event: &str, capture: bool) -> usize {
        self.listeners
            .iter()
            .filter(|listener| listener.event == event && listener.capture == capture)
            .count()
    }
}

/// A DOM style prototype: `addEventListener`, `removeEventListener`,
/// `eventListeners` and `removeAllListeners`.
pub fn event_target_prototype(name: &str) -> Rc<Prototype> {
    let proto = Prototype::new(name);

    let remove: RemoveListenerFn = Rc::new(
        |target: &Rc<EventTarget>,
         event_name: &str,
         listener: Option<Listener>,
         options: OptionsArg| {
            if let Some(handler) = listener {
                target
                    .native
                    .borrow_mut()
                    .remove(event_name, options.capture(), &handler);
            }
        },
    );

    proto.define(ADD_EVENT_LISTENER, Method::AddListener(dom_add(false)));
    proto.define(REMOVE_EVENT_LISTENER, Method::RemoveListener(remove));
    proto.define(EVENT_LISTENERS, Method::Listeners(native_listeners()));
    proto.define(
        REMOVE_ALL_LISTENERS,
        Method::RemoveAllListeners(Rc::new(
            |target: &Rc<EventTarget>, event_name: Option<&str>| {
                target.native.borrow_mut().clear(event_name);
            },
        )),
    );
    proto
}

/// Gives a DOM style prototype a native `name` method that registers like
/// `addEventListener` but ahead of the target's existing listeners.
pub fn define_prepend_method(proto: &Prototype, name: &str) {
    proto.define(name, Method::AddListener(dom_add(true)));
}

fn dom_add(prepend: bool) -> AddListenerFn {
    Rc::new(
        move |target: &Rc<EventTarget>,
              event_name: &str,
              listener: Option<Listener>,
              options: OptionsArg| {
            let handler = listener?;
            let normalized = options.normalize();
            target.native.borrow_mut().add(
                NativeListener {
                    event: event_name.to_string(),
                    capture: normalized.capture,
                    once: normalized.once,
                    passive: options.passive(),
                    options,
                    handler,
                },
                true,
                prepend,
            );
            None
        },
    )
}

/// An emitter style prototype: `addListener`, `prependListener`,
/// `removeListener`, `listeners` and `removeAllListeners`. Adds return the
/// target for chaining, duplicates are kept, and every removal is announced
/// through a `removeListener` event whose detail is the event name.
pub fn event_emitter_prototype(global: &Rc<Global>, name: &str) -> Rc<Prototype> {
    let proto = Prototype::new(name);

    proto.define(ADD_LISTENER, Method::AddListener(emitter_add(false)));
    proto.define(PREPEND_LISTENER, Method::AddListener(emitter_add(true)));
    let weak = Rc::downgrade(global);
    let remove: RemoveListenerFn = Rc::new(
        move |target: &Rc<EventTarget>,
              event_name: &str,
              listener: Option<Listener>,
              _options: OptionsArg| {
            let Some(handler) = listener else {
                return;
            };
            let removed = target
                .native
                .borrow_mut()
                .remove(event_name, false, &handler);
            if let (true, Some(global)) = (removed, weak.upgrade()) {
                announce_removal(&global, target, event_name);
            }
        },
    );
    let weak = Rc::downgrade(global);
    let remove_all: RemoveAllListenersFn =
        Rc::new(move |target: &Rc<EventTarget>, event_name: Option<&str>| {
            let removed = target.native.borrow_mut().clear(event_name);
            let Some(global) = weak.upgrade() else {
                return;
            };
            for listener in removed {
                announce_removal(&global, target, &listener.event);
            }
        });

    proto.define(REMOVE_LISTENER, Method::RemoveListener(remove));
    proto.define(LISTENERS, Method::Listeners(native_listeners()));
    proto.define(REMOVE_ALL_LISTENERS, Method::RemoveAllListeners(remove_all));
    proto
}

fn emitter_add(prepend: bool) -> AddListenerFn {
    Rc::new(
        move |target: &Rc<EventTarget>,
              event_name: &str,
              listener: Option<Listener>,
              _options: OptionsArg| {
            let handler = listener?;
            target.native.borrow_mut().add(
                NativeListener {
                    event: event_name.to_string(),
                    capture: false,
                    once: false,
                    passive: false,
                    options: OptionsArg::Absent,
                    handler,
                },
                false,
                prepend,
            );
            Some(Rc::clone(target))
        },
    )
}

fn native_listeners() -> ListenersFn {
    Rc::new(|target: &Rc<EventTarget>, event_name: Option<&str>| {
        target.native.borrow().handlers(event_name)
    })
}

fn announce_removal(global: &Global, target: &Rc<EventTarget>, event_name: &str) {
    let listeners = target.native.borrow().get(REMOVE_LISTENER_EVENT, false);
    if listeners.is_empty() {
        return;
    }
    let event = Event::with_detail(global, REMOVE_LISTENER_EVENT, event_name);
    event.set_target(target);
    invoke_snapshot(target, &event, listeners);
}

/// Emitter style delivery: every listener registered for the event name, in
/// order, against a snapshot taken before the first call. Returns whether
/// there were listeners.
pub fn emit(global: &Global, target: &Rc<EventTarget>, event: &Rc<Event>) -> bool {
    let listeners = target.native.borrow().get(event.event_type(), false);
    if listeners.is_empty() {
        return false;
    }
    event.set_target(target);
    let previous = global.replace_current_event(Some(Rc::clone(event)));
    invoke_snapshot(target, event, listeners);
    global.replace_current_event(previous);
    event.finish_dispatch();
    true
}

fn invoke_snapshot(target: &Rc<EventTarget>, event: &Rc<Event>, listeners: Vec<NativeListener>) {
    event.set_current_target(Some(target));
    for listener in listeners {
        if let Err(err) = listener.handler.call(Some(target), Some(event)) {
            tracing::error!(event = event.event_type(), error = %err, "native listener failed");
        }
    }
}

/// Emitter helper: registers a wrapper that removes itself through the
/// target's remove method before running `listener`, then returns the
/// wrapper so callers can remove it early.
pub fn once(target: &Rc<EventTarget>, event_name: &str, listener: Listener) -> Listener {
    let slot: Rc<RefCell<Option<Listener>>> = Rc::new(RefCell::new(None));
    let own = Rc::clone(&slot);
    let name = event_name.to_string();
    let wrapper = Listener::bound(move |receiver, event| {
        let Some(wrapper) = own.borrow_mut().take() else {
            return Ok(());
        };
        if let Some(receiver) = receiver {
            receiver.call_remove(REMOVE_LISTENER, &name, Some(wrapper), OptionsArg::Absent);
        }
        listener.call(receiver, event)
    });
    *slot.borrow_mut() = Some(wrapper.clone());
    target.call_add(ADD_LISTENER, event_name, Some(wrapper.clone()), OptionsArg::Absent);
    wrapper
}

/// DOM style delivery: capture phase from the root down, the target's own
/// capture then bubble listeners, and the bubble phase back up when the event
/// bubbles. Returns `false` when the default action was prevented.
pub fn dispatch_event(global: &Global, target: &Rc<EventTarget>, event: &Rc<Event>) -> bool {
    event.set_target(target);
    let previous = global.replace_current_event(Some(Rc::clone(event)));

    let mut path = Vec::new();
    let mut cursor = Some(Rc::clone(target));
    while let Some(node) = cursor {
        cursor = node.parent();
        path.push(node);
    }
    path.reverse();
    let ancestors = &path[..path.len() - 1];

    run_phases(target, ancestors, event);

    global.replace_current_event(previous);
    let not_prevented = !event.default_prevented();
    event.finish_dispatch();
    not_prevented
}

fn run_phases(target: &Rc<EventTarget>, ancestors: &[Rc<EventTarget>], event: &Rc<Event>) {
    // Capture phase.
    event.set_phase(EventPhase::Capturing);
    for node in ancestors {
        invoke_listeners(node, event, true);
        if event.propagation_stopped() {
            return;
        }
    }

    // Target phase: capture listeners first.
    event.set_phase(EventPhase::AtTarget);
    invoke_listeners(target, event, true);
    if event.propagation_stopped() {
        return;
    }

    // Target phase: bubble listeners.
    invoke_listeners(target, event, false);
    if event.propagation_stopped() || !event.bubbles() {
        return;
    }

    // Bubble phase.
    event.set_phase(EventPhase::Bubbling);
    for node in ancestors.iter().rev() {
        invoke_listeners(node, event, false);
        if event.propagation_stopped() {
            return;
        }
    }
}

fn invoke_listeners(node: &Rc<EventTarget>, event: &Rc<Event>, capture: bool) {
    let listeners = node.native.borrow().get(event.event_type(), capture);
    event.set_current_target(Some(node));
    for listener in listeners {
        // Removed by an earlier listener of this run.
        if !node.native.borrow().contains(&listener) {
            continue;
        }
        if listener.once {
            node.native
                .borrow_mut()
                .remove(&listener.event, listener.capture, &listener.handler);
        }
        tracing::trace!(
            event = event.event_type(),
            target = node.constructor_name(),
            phase = ?event.phase(),
            passive = listener.passive,
            "native listener"
        );
        if let Err(err) = listener.handler.call(Some(node), Some(event)) {
            tracing::error!(event = event.event_type(), error = %err, "native listener failed");
        }
        if event.immediate_propagation_stopped() {
            break;
        }
    }
}
