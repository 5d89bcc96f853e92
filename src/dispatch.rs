use std::rc::{Rc, Weak};

use crate::symbols::cached_symbol_event_name;
use crate::{Event, EventTarget, EventTask, Global, Listener};

/// The callback the native layer sees. One router serves every prototype
/// patched by a single `patch_event_target` call.
pub(crate) struct DispatchRouter {
    global: Weak<Global>,
    remove_event_listener: String,
    native_auto_removes_once: bool,
}

impl DispatchRouter {
    pub(crate) fn new(
        global: &Rc<Global>,
        remove_event_listener: &str,
        native_auto_removes_once: bool,
    ) -> Rc<Self> {
        Rc::new(Self {
            global: Rc::downgrade(global),
            remove_event_listener: remove_event_listener.to_string(),
            native_auto_removes_once,
        })
    }

    /// Native handlers for the bubble and capture slots.
    pub(crate) fn callbacks(self: &Rc<Self>) -> (Listener, Listener) {
        let bubble = Rc::clone(self);
        let capture = Rc::clone(self);
        (
            Listener::bound(move |receiver, event| {
                bubble.route(receiver, event, false);
                Ok(())
            }),
            Listener::bound(move |receiver, event| {
                capture.route(receiver, event, true);
                Ok(())
            }),
        )
    }

    /// Native handler for a single task when the shared router is not used.
    pub(crate) fn task_callback(self: &Rc<Self>, task: &Rc<EventTask>) -> Listener {
        let router = Rc::clone(self);
        let task = Rc::downgrade(task);
        Listener::bound(move |receiver, event| {
            let Some(task) = task.upgrade() else {
                return Ok(());
            };
            let Some(event) = router.resolve_event(event) else {
                return Ok(());
            };
            let target = receiver
                .cloned()
                .or_else(|| task.target())
                .or_else(|| router.fallback_target(&event));
            if let Some(target) = target {
                router.invoke_task(&task, &target, &event);
            }
            Ok(())
        })
    }

    fn resolve_event(&self, event: Option<&Rc<Event>>) -> Option<Rc<Event>> {
        event
            .cloned()
            .or_else(|| self.global.upgrade().and_then(|global| global.current_event()))
    }

    fn fallback_target(&self, event: &Event) -> Option<Rc<EventTarget>> {
        event
            .target()
            .or_else(|| self.global.upgrade().and_then(|global| global.fallback_target()))
    }

    pub(crate) fn route(
        &self,
        receiver: Option<&Rc<EventTarget>>,
        event: Option<&Rc<Event>>,
        capture: bool,
    ) {
        let Some(event) = self.resolve_event(event) else {
            tracing::trace!("dispatch skipped, no event");
            return;
        };
        let Some(target) = receiver.cloned().or_else(|| self.fallback_target(&event)) else {
            return;
        };
        let Some(key) = cached_symbol_event_name(event.event_type(), capture) else {
            return;
        };
        let Some(tasks) = target.listener_slot(&key) else {
            return;
        };
        tracing::trace!(
            event = event.event_type(),
            capture,
            listeners = tasks.len(),
            "dispatching to tracked listeners"
        );
        if let [task] = tasks.as_slice() {
            self.invoke_task(task, &target, &event);
            return;
        }
        // `tasks` is a copy; listeners may add or remove entries of the live
        // slot while it is iterated.
        for task in &tasks {
            if event.immediate_stop_requested() {
                tracing::trace!(event = event.event_type(), "immediate propagation stopped");
                break;
            }
            self.invoke_task(task, &target, &event);
        }
    }

    pub(crate) fn invoke_task(&self, task: &Rc<EventTask>, target: &Rc<EventTarget>, event: &Rc<Event>) {
        if task.is_removed() {
            return;
        }
        task.wrap_handle_event();
        if let Err(err) = task.zone().run_task(task, Some(target), event) {
            tracing::warn!(task = task.id(), error = %err, "event task could not run");
        }
        if task.options().is_once() && !self.native_auto_removes_once {
            target.call_remove(
                &self.remove_event_listener,
                event.event_type(),
                Some(task.delegate()),
                task.options().clone(),
            );
        }
    }
}
