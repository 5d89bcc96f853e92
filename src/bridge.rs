use std::rc::Rc;

use crate::dispatch::DispatchRouter;
use crate::symbols::cached_symbol_event_name;
use crate::target::{AddListenerFn, RemoveListenerFn};
use crate::zone::{CancelFn, ScheduleFn};
use crate::{EventTask, EventTaskData, Listener, Zone};

/// Turns listeners into zone tasks. The installers it hands to the zone are
/// the only place native registrations happen.
pub(crate) struct TaskBridge {
    native_add: AddListenerFn,
    native_remove: RemoveListenerFn,
    native_prepend: Option<AddListenerFn>,
    router: Rc<DispatchRouter>,
    bubble_callback: Listener,
    capture_callback: Listener,
    use_global_callback: bool,
}

impl TaskBridge {
    pub(crate) fn new(
        native_add: AddListenerFn,
        native_remove: RemoveListenerFn,
        native_prepend: Option<AddListenerFn>,
        router: Rc<DispatchRouter>,
        use_global_callback: bool,
    ) -> Rc<Self> {
        let (bubble_callback, capture_callback) = router.callbacks();
        Rc::new(Self {
            native_add,
            native_remove,
            native_prepend,
            router,
            bubble_callback,
            capture_callback,
            use_global_callback,
        })
    }

    fn router_callback(&self, capture: bool) -> Listener {
        if capture {
            self.capture_callback.clone()
        } else {
            self.bubble_callback.clone()
        }
    }

    pub(crate) fn schedule(
        self: &Rc<Self>,
        zone: &Rc<Zone>,
        source: &str,
        callback: Listener,
        data: EventTaskData,
        prepend: bool,
    ) -> Rc<EventTask> {
        zone.schedule_event_task(
            source,
            callback,
            data,
            self.schedule_fn(prepend),
            self.cancel_fn(),
        )
    }

    fn schedule_fn(self: &Rc<Self>, prepend: bool) -> ScheduleFn {
        let bridge = Rc::clone(self);
        if self.use_global_callback {
            Rc::new(move |task: &Rc<EventTask>| bridge.install_router(task))
        } else {
            Rc::new(move |task: &Rc<EventTask>| bridge.install_task(task, prepend))
        }
    }

    fn cancel_fn(self: &Rc<Self>) -> CancelFn {
        let bridge = Rc::clone(self);
        if self.use_global_callback {
            Rc::new(move |task: &Rc<EventTask>| bridge.uninstall_router(task))
        } else {
            Rc::new(move |task: &Rc<EventTask>| bridge.uninstall_task(task))
        }
    }

    // Shared router: installed for the first task of a slot, detached with
    // the last one.
    fn install_router(&self, task: &Rc<EventTask>) {
        let data = task.data();
        if data.is_existing {
            return;
        }
        let Some(target) = task.target() else {
            return;
        };
        tracing::debug!(
            target = target.constructor_name(),
            event = %data.event_name,
            capture = data.capture,
            "installing shared router"
        );
        (self.native_add)(
            &target,
            &data.event_name,
            Some(self.router_callback(data.capture)),
            data.options.without_once(),
        );
    }

    fn uninstall_router(&self, task: &Rc<EventTask>) {
        let Some(target) = task.target() else {
            return;
        };
        // Cancelled straight through the zone: the task is still linked.
        if !task.is_removed() {
            unlink(task);
        }
        if !task.is_all_removed() {
            return;
        }
        tracing::debug!(
            target = target.constructor_name(),
            event = task.event_name(),
            capture = task.capture(),
            "removing shared router"
        );
        (self.native_remove)(
            &target,
            task.event_name(),
            Some(self.router_callback(task.capture())),
            task.options().clone(),
        );
    }

    // One native registration per task.
    fn install_task(&self, task: &Rc<EventTask>, prepend: bool) {
        let Some(target) = task.target() else {
            return;
        };
        let invoke = self.router.task_callback(task);
        task.set_invoke(invoke.clone());
        let data = task.data();
        let native = match (&self.native_prepend, prepend) {
            (Some(native_prepend), true) => native_prepend,
            _ => &self.native_add,
        };
        native(
            &target,
            &data.event_name,
            Some(invoke),
            data.options.without_once(),
        );
    }

    fn uninstall_task(&self, task: &Rc<EventTask>) {
        if !task.is_removed() {
            unlink(task);
        }
        let (Some(target), Some(invoke)) = (task.target(), task.invoke()) else {
            return;
        };
        (self.native_remove)(
            &target,
            task.event_name(),
            Some(invoke),
            task.options().clone(),
        );
    }
}

/// Removes `task` from its Listener Slot, clearing the slot when it empties.
pub(crate) fn unlink(task: &Rc<EventTask>) -> bool {
    let Some(target) = task.target() else {
        return false;
    };
    let Some(key) = cached_symbol_event_name(task.event_name(), task.capture()) else {
        return false;
    };
    target
        .unlink_task_where(&key, |existing| Rc::ptr_eq(existing, task))
        .is_some()
}

/// Unlinks `task` if still linked, then cancels it through its zone, which
/// detaches the native registration when required.
pub(crate) fn cancel(task: &Rc<EventTask>) {
    if !task.is_removed() {
        unlink(task);
    }
    if let Err(err) = task.zone().cancel_task(task) {
        tracing::warn!(task = task.id(), error = %err, "event task cancellation failed");
    }
}
