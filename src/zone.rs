use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::listener::same_object;
use crate::{CallbackResult, Error, Event, EventTarget, HandleEvent, Listener, ListenerError};
use crate::{OptionsArg, Result};

pub type ScheduleFn = Rc<dyn Fn(&Rc<EventTask>)>;
pub type CancelFn = Rc<dyn Fn(&Rc<EventTask>)>;

/// Interception hooks of a forked zone. Every method has a pass-through
/// default.
pub trait ZoneSpec {
    fn on_schedule_task(&self, _zone: &Zone, _task: &EventTask) {}

    fn on_invoke_task(
        &self,
        _zone: &Zone,
        task: &EventTask,
        receiver: Option<&Rc<EventTarget>>,
        event: &Rc<Event>,
    ) -> CallbackResult {
        task.invoke_callback(receiver, event)
    }

    fn on_cancel_task(&self, _zone: &Zone, _task: &EventTask) {}

    /// Returns whether the error was handled; unhandled errors are recorded
    /// on the zone.
    fn on_handle_error(&self, _zone: &Zone, _error: &ListenerError) -> bool {
        false
    }
}

/// An execution context. Listeners run inside the zone that was current
/// when they were registered.
pub struct Zone {
    name: String,
    parent: Option<Rc<Zone>>,
    spec: Option<Rc<dyn ZoneSpec>>,
    event_task_count: Cell<usize>,
    errors: RefCell<Vec<ListenerError>>,
}

thread_local! {
    static ROOT_ZONE: Rc<Zone> = Rc::new(Zone {
        name: "<root>".to_string(),
        parent: None,
        spec: None,
        event_task_count: Cell::new(0),
        errors: RefCell::new(Vec::new()),
    });
    static CURRENT_ZONE: RefCell<Option<Rc<Zone>>> = const { RefCell::new(None) };
    static NEXT_TASK_ID: Cell<u64> = const { Cell::new(1) };
}

struct ZoneFrame {
    previous: Option<Rc<Zone>>,
}

impl Drop for ZoneFrame {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_ZONE.with(|current| *current.borrow_mut() = previous);
    }
}

impl Zone {
    pub fn root() -> Rc<Zone> {
        ROOT_ZONE.with(Rc::clone)
    }

    pub fn current() -> Rc<Zone> {
        CURRENT_ZONE
            .with(|current| current.borrow().clone())
            .unwrap_or_else(Zone::root)
    }

    pub fn fork(self: &Rc<Self>, name: &str, spec: Option<Rc<dyn ZoneSpec>>) -> Rc<Zone> {
        Rc::new(Zone {
            name: name.to_string(),
            parent: Some(Rc::clone(self)),
            spec,
            event_task_count: Cell::new(0),
            errors: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Zone>> {
        self.parent.as_ref()
    }

    pub fn event_task_count(&self) -> usize {
        self.event_task_count.get()
    }

    /// Unhandled listener errors, oldest first.
    pub fn take_errors(&self) -> Vec<ListenerError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    pub fn run<R>(self: &Rc<Self>, f: impl FnOnce() -> R) -> R {
        let previous = CURRENT_ZONE.with(|current| current.replace(Some(Rc::clone(self))));
        let _frame = ZoneFrame { previous };
        f()
    }

    pub fn schedule_event_task(
        self: &Rc<Self>,
        source: &str,
        callback: Listener,
        data: EventTaskData,
        schedule_fn: ScheduleFn,
        cancel_fn: CancelFn,
    ) -> Rc<EventTask> {
        let id = NEXT_TASK_ID.with(|next| {
            let id = next.get();
            next.set(id.saturating_add(1));
            id
        });
        let task = Rc::new(EventTask {
            id,
            zone: Rc::clone(self),
            source: source.to_string(),
            callback: RefCell::new(callback),
            original_delegate: RefCell::new(None),
            invoke: RefCell::new(None),
            data,
            removed: Cell::new(false),
            all_removed: Cell::new(false),
            state: Cell::new(TaskState::Scheduling),
            run_count: Cell::new(0),
            schedule_fn,
            cancel_fn,
        });
        if let Some(spec) = &self.spec {
            spec.on_schedule_task(self, &task);
        }
        let schedule = Rc::clone(&task.schedule_fn);
        schedule(&task);
        task.state.set(TaskState::Scheduled);
        self.event_task_count.set(self.event_task_count.get() + 1);
        tracing::trace!(zone = %self.name, task = id, source, "scheduled event task");
        task
    }

    pub fn cancel_task(&self, task: &Rc<EventTask>) -> Result<()> {
        if !std::ptr::eq(Rc::as_ptr(&task.zone), self) {
            return Err(Error::WrongZone {
                task: task.id,
                owner: task.zone.name.clone(),
                zone: self.name.clone(),
            });
        }
        match task.state.get() {
            TaskState::NotScheduled => return Ok(()),
            TaskState::Scheduled | TaskState::Running => {}
            state => {
                return Err(Error::InvalidTaskState {
                    task: task.id,
                    state,
                });
            }
        }
        task.state.set(TaskState::Canceling);
        if let Some(spec) = &self.spec {
            spec.on_cancel_task(self, task);
        }
        let cancel = Rc::clone(&task.cancel_fn);
        cancel(task);
        task.state.set(TaskState::NotScheduled);
        task.run_count.set(0);
        self.event_task_count
            .set(self.event_task_count.get().saturating_sub(1));
        tracing::trace!(zone = %self.name, task = task.id, source = %task.source, "cancelled event task");
        Ok(())
    }

    /// Runs the task's callback inside this zone. Listener errors go to the
    /// zone's error channel and never reach the caller.
    pub fn run_task(
        self: &Rc<Self>,
        task: &Rc<EventTask>,
        receiver: Option<&Rc<EventTarget>>,
        event: &Rc<Event>,
    ) -> Result<()> {
        if !Rc::ptr_eq(&task.zone, self) {
            return Err(Error::WrongZone {
                task: task.id,
                owner: task.zone.name.clone(),
                zone: self.name.clone(),
            });
        }
        if task.state.get() == TaskState::NotScheduled {
            return Ok(());
        }
        let re_entered = task.state.get() == TaskState::Running;
        if !re_entered {
            task.state.set(TaskState::Running);
        }
        task.run_count.set(task.run_count.get() + 1);
        let result = self.run(|| match &self.spec {
            Some(spec) => spec.on_invoke_task(self, task, receiver, event),
            None => task.invoke_callback(receiver, event),
        });
        if let Err(error) = result {
            self.handle_error(error);
        }
        if !re_entered && task.state.get() == TaskState::Running {
            task.state.set(TaskState::Scheduled);
        }
        Ok(())
    }

    pub fn handle_error(&self, error: ListenerError) {
        let handled = self
            .spec
            .as_ref()
            .is_some_and(|spec| spec.on_handle_error(self, &error));
        if !handled {
            tracing::error!(zone = %self.name, error = %error, "unhandled listener error");
            self.errors.borrow_mut().push(error);
        }
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|parent| parent.name.clone()))
            .field("event_task_count", &self.event_task_count.get())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotScheduled,
    Scheduling,
    Scheduled,
    Running,
    Canceling,
}

/// What the interceptor hands to the engine alongside the callback.
#[derive(Debug, Clone)]
pub struct EventTaskData {
    pub target: Weak<EventTarget>,
    pub event_name: String,
    pub capture: bool,
    /// As passed by the caller, `once` included.
    pub options: OptionsArg,
    /// A task for this (event, capture) pair already existed on the target.
    pub is_existing: bool,
    pub use_global_callback: bool,
}

/// A Tracked Listener: one registered listener as a unit of work owned by a
/// zone.
pub struct EventTask {
    id: u64,
    zone: Rc<Zone>,
    source: String,
    callback: RefCell<Listener>,
    original_delegate: RefCell<Option<Rc<dyn HandleEvent>>>,
    invoke: RefCell<Option<Listener>>,
    data: EventTaskData,
    removed: Cell<bool>,
    all_removed: Cell<bool>,
    state: Cell<TaskState>,
    run_count: Cell<u64>,
    schedule_fn: ScheduleFn,
    cancel_fn: CancelFn,
}

impl EventTask {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn zone(&self) -> &Rc<Zone> {
        &self.zone
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> Option<Rc<EventTarget>> {
        self.data.target.upgrade()
    }

    pub fn event_name(&self) -> &str {
        &self.data.event_name
    }

    pub fn capture(&self) -> bool {
        self.data.capture
    }

    pub fn options(&self) -> &OptionsArg {
        &self.data.options
    }

    pub fn data(&self) -> &EventTaskData {
        &self.data
    }

    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    pub fn run_count(&self) -> u64 {
        self.run_count.get()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub fn is_all_removed(&self) -> bool {
        self.all_removed.get()
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
    }

    pub(crate) fn mark_all_removed(&self) {
        self.all_removed.set(true);
    }

    /// The effective callback; object-style listeners are replaced by a
    /// forwarding closure on first invocation.
    pub fn callback(&self) -> Listener {
        self.callback.borrow().clone()
    }

    pub fn original_delegate(&self) -> Option<Rc<dyn HandleEvent>> {
        self.original_delegate.borrow().clone()
    }

    pub(crate) fn set_original_delegate(&self, delegate: Rc<dyn HandleEvent>) {
        *self.original_delegate.borrow_mut() = Some(delegate);
    }

    /// The listener as the application registered it.
    pub fn delegate(&self) -> Listener {
        match self.original_delegate() {
            Some(original) => Listener::Object(original),
            None => self.callback(),
        }
    }

    pub fn delegate_is(&self, object: &Rc<dyn HandleEvent>) -> bool {
        self.original_delegate
            .borrow()
            .as_ref()
            .is_some_and(|original| same_object(original, object))
    }

    /// Native handler installed for this task alone when the shared router
    /// is not used.
    pub fn invoke(&self) -> Option<Listener> {
        self.invoke.borrow().clone()
    }

    pub(crate) fn set_invoke(&self, invoke: Listener) {
        *self.invoke.borrow_mut() = Some(invoke);
    }

    pub(crate) fn wrap_handle_event(&self) {
        let object = self.callback.borrow().as_object().cloned();
        if let Some(object) = object {
            let forward = Rc::clone(&object);
            *self.callback.borrow_mut() = Listener::plain(move |event| forward.handle_event(event));
            self.set_original_delegate(object);
        }
    }

    pub fn invoke_callback(
        &self,
        receiver: Option<&Rc<EventTarget>>,
        event: &Rc<Event>,
    ) -> CallbackResult {
        let callback = self.callback();
        callback.call(receiver, Some(event))
    }
}

impl fmt::Debug for EventTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTask")
            .field("id", &self.id)
            .field("zone", &self.zone.name)
            .field("source", &self.source)
            .field("event_name", &self.data.event_name)
            .field("capture", &self.data.capture)
            .field("state", &self.state.get())
            .field("removed", &self.removed.get())
            .field("all_removed", &self.all_removed.get())
            .finish()
    }
}
