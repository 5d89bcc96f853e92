use std::rc::Rc;

use crate::bridge::{self, TaskBridge};
use crate::dispatch::DispatchRouter;
use crate::enumerate::{find_event_tasks, tracked_event_names};
use crate::symbols::{
    cached_symbol_event_name, cached_symbol_event_names, global_source, symbol_event_name,
};
use crate::target::{AddListenerFn, ListenersFn, RemoveAllListenersFn, RemoveListenerFn};
use crate::{EventTarget, EventTask, EventTaskData, Global, Listener, Method, OptionsArg};
use crate::{PatchOptions, Prototype, Zone};

const REMOVE_LISTENER_EVENT: &str = "removeListener";

/// Replaces the listener entry points of every prototype in `apis`. Returns,
/// per prototype, whether it was patched; prototypes without the add method
/// or already patched are left alone.
pub fn patch_event_target(
    global: &Rc<Global>,
    apis: &[Rc<Prototype>],
    options: &PatchOptions,
) -> Vec<bool> {
    let router = DispatchRouter::new(
        global,
        &options.remove_event_listener,
        options.native_auto_removes_once,
    );
    apis.iter()
        .map(|proto| patch_prototype(proto, options, &router))
        .collect()
}

fn patch_prototype(
    proto: &Rc<Prototype>,
    options: &PatchOptions,
    router: &Rc<DispatchRouter>,
) -> bool {
    if !proto.has_own(&options.add_event_listener) {
        return false;
    }
    if proto.is_patched(&options.add_event_listener) {
        tracing::debug!(prototype = proto.name(), "already patched");
        return false;
    }
    let Some(Method::AddListener(native_add)) = proto.method(&options.add_event_listener) else {
        return false;
    };
    let Some(Method::RemoveListener(native_remove)) = proto.method(&options.remove_event_listener)
    else {
        return false;
    };

    proto.save_original(&options.add_event_listener);
    proto.save_original(&options.remove_event_listener);
    proto.save_original(&options.listeners);
    proto.save_original(&options.remove_all_listeners);
    let native_prepend = options
        .prepend_event_listener
        .as_deref()
        .and_then(|name| match proto.save_original(name) {
            Some(Method::AddListener(prepend)) => Some(prepend),
            _ => None,
        });

    let bridge = TaskBridge::new(
        Rc::clone(&native_add),
        Rc::clone(&native_remove),
        native_prepend.clone(),
        Rc::clone(router),
        options.use_global_callback,
    );
    let interceptor = Rc::new(Interceptor {
        bridge,
        native_remove,
        options: options.clone(),
    });

    proto.define(
        &options.add_event_listener,
        Method::AddListener(make_add_listener(
            &interceptor,
            native_add,
            &format!(".{}:", options.add_event_listener),
            false,
        )),
    );
    if let (Some(name), Some(native_prepend)) = (&options.prepend_event_listener, native_prepend) {
        proto.define(
            name,
            Method::AddListener(make_add_listener(
                &interceptor,
                native_prepend,
                &format!(".{name}:"),
                true,
            )),
        );
    }

    let weak = Rc::downgrade(&interceptor);
    let remove: RemoveListenerFn = Rc::new(
        move |target: &Rc<EventTarget>,
              event_name: &str,
              delegate: Option<Listener>,
              listener_options: OptionsArg| {
            if let Some(interceptor) = weak.upgrade() {
                interceptor.remove_listener(target, event_name, delegate, listener_options);
            }
        },
    );
    proto.define(&options.remove_event_listener, Method::RemoveListener(remove));

    let weak = Rc::downgrade(&interceptor);
    let listeners: ListenersFn = Rc::new(move |target: &Rc<EventTarget>, event_name: Option<&str>| {
        weak.upgrade()
            .map(|interceptor| interceptor.listeners(target, event_name))
            .unwrap_or_default()
    });
    proto.define(&options.listeners, Method::Listeners(listeners));

    let weak = Rc::downgrade(&interceptor);
    let remove_all: RemoveAllListenersFn =
        Rc::new(move |target: &Rc<EventTarget>, event_name: Option<&str>| {
            if let Some(interceptor) = weak.upgrade() {
                interceptor.remove_all_listeners(target, event_name);
            }
        });
    proto.define(&options.remove_all_listeners, Method::RemoveAllListeners(remove_all));

    tracing::debug!(
        prototype = proto.name(),
        add = %options.add_event_listener,
        shared = options.use_global_callback,
        "patched event target"
    );
    true
}

// The add closures own the interceptor; the others hold it weakly so the
// prototype's method table is the single owner.
fn make_add_listener(
    interceptor: &Rc<Interceptor>,
    native: AddListenerFn,
    source_suffix: &str,
    prepend: bool,
) -> AddListenerFn {
    let interceptor = Rc::clone(interceptor);
    let source_suffix = source_suffix.to_string();
    Rc::new(
        move |target: &Rc<EventTarget>,
              event_name: &str,
              delegate: Option<Listener>,
              options: OptionsArg| {
            interceptor.add_listener(
                target,
                event_name,
                delegate,
                options,
                &native,
                &source_suffix,
                prepend,
            )
        },
    )
}

struct Interceptor {
    bridge: Rc<TaskBridge>,
    native_remove: RemoveListenerFn,
    options: PatchOptions,
}

impl Interceptor {
    fn compare(&self, task: &EventTask, delegate: &Listener) -> bool {
        match &self.options.compare_task_callback_vs_delegate {
            Some(compare) => compare(task, delegate),
            None => compare_task_callback_vs_delegate(task, delegate),
        }
    }

    fn validate(
        &self,
        target: &Rc<EventTarget>,
        delegate: &Listener,
        event_name: &str,
        options: &OptionsArg,
    ) -> bool {
        self.options
            .validate_handler
            .as_ref()
            .is_none_or(|validate| validate(target, delegate, event_name, options))
    }

    #[allow(clippy::too_many_arguments)]
    fn add_listener(
        &self,
        target: &Rc<EventTarget>,
        event_name: &str,
        delegate: Option<Listener>,
        options: OptionsArg,
        native: &AddListenerFn,
        source_suffix: &str,
        prepend: bool,
    ) -> Option<Rc<EventTarget>> {
        let Some(delegate) = delegate else {
            return native(target, event_name, None, options);
        };
        // Objects without handleEvent are not ours to track.
        if !delegate.is_listener_like() {
            return native(target, event_name, Some(delegate), options);
        }
        if !self.validate(target, &delegate, event_name, &options) {
            return None;
        }

        let capture = options.capture();
        let key = symbol_event_name(event_name, capture);
        let is_existing = target.has_listener_slot(&key);
        if is_existing && self.options.check_duplicate {
            let duplicate = target
                .listener_slot(&key)
                .unwrap_or_default()
                .iter()
                .any(|task| self.compare(task, &delegate));
            if duplicate {
                tracing::trace!(event = event_name, capture, "duplicate listener ignored");
                return None;
            }
        }
        if !is_existing {
            target.ensure_listener_slot(&key);
        }

        let source = global_source(target.constructor_name(), event_name)
            .unwrap_or_else(|| format!("{}{source_suffix}{event_name}", target.constructor_name()));
        let data = EventTaskData {
            target: Rc::downgrade(target),
            event_name: event_name.to_string(),
            capture,
            options,
            is_existing,
            use_global_callback: self.options.use_global_callback,
        };
        let object = delegate.as_object().cloned();
        let zone = Zone::current();
        let task = self.bridge.schedule(&zone, &source, delegate, data, prepend);
        if let Some(object) = object {
            task.set_original_delegate(object);
        }
        target.insert_task(&key, task, prepend);

        if self.options.return_target {
            Some(Rc::clone(target))
        } else {
            None
        }
    }

    fn remove_listener(
        &self,
        target: &Rc<EventTarget>,
        event_name: &str,
        delegate: Option<Listener>,
        options: OptionsArg,
    ) {
        let capture = options.capture();
        let Some(delegate) = delegate else {
            (self.native_remove)(target, event_name, None, options);
            return;
        };
        if !delegate.is_listener_like() {
            (self.native_remove)(target, event_name, Some(delegate), options);
            return;
        }
        if !self.validate(target, &delegate, event_name, &options) {
            return;
        }
        let Some(key) = cached_symbol_event_name(event_name, capture) else {
            return;
        };
        if let Some(task) = target.unlink_task_where(&key, |task| self.compare(task, &delegate)) {
            bridge::cancel(&task);
        }
    }

    fn listeners(&self, target: &Rc<EventTarget>, event_name: Option<&str>) -> Vec<Listener> {
        find_event_tasks(target, event_name)
            .iter()
            .map(|task| task.delegate())
            .collect()
    }

    fn remove_all_listeners(&self, target: &Rc<EventTarget>, event_name: Option<&str>) {
        let remove_all = &self.options.remove_all_listeners;
        let Some(event_name) = event_name else {
            // Listeners of the emitter's removeListener meta event must see
            // every other removal, so that event goes last.
            for name in tracked_event_names(target) {
                if name != REMOVE_LISTENER_EVENT {
                    target.call_remove_all(remove_all, Some(&name));
                }
            }
            target.call_remove_all(remove_all, Some(REMOVE_LISTENER_EVENT));
            return;
        };
        let Some(names) = cached_symbol_event_names(event_name) else {
            return;
        };
        for key in [&names.bubble, &names.capture] {
            for task in target.listener_slot(key).unwrap_or_default() {
                target.call_remove(
                    &self.options.remove_event_listener,
                    event_name,
                    Some(task.delegate()),
                    task.options().clone(),
                );
            }
        }
    }
}

/// Default identity comparison: callables by identity of the registered
/// callback, objects by identity of the original delegate.
pub(crate) fn compare_task_callback_vs_delegate(task: &EventTask, delegate: &Listener) -> bool {
    match delegate {
        Listener::Object(object) => task.delegate_is(object),
        callable => task.callback().same(callable),
    }
}
