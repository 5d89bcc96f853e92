use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::{
    ADD_EVENT_LISTENER, ADD_LISTENER, EVENT_LISTENERS, LISTENERS, PREPEND_LISTENER,
    REMOVE_ALL_LISTENERS, REMOVE_EVENT_LISTENER, REMOVE_LISTENER,
};
use crate::native::NativeListenerStore;
use crate::symbols::zone_symbol;
use crate::{EventTask, Listener, OptionsArg};

pub type AddListenerFn =
    Rc<dyn Fn(&Rc<EventTarget>, &str, Option<Listener>, OptionsArg) -> Option<Rc<EventTarget>>>;
pub type RemoveListenerFn = Rc<dyn Fn(&Rc<EventTarget>, &str, Option<Listener>, OptionsArg)>;
pub type ListenersFn = Rc<dyn Fn(&Rc<EventTarget>, Option<&str>) -> Vec<Listener>>;
pub type RemoveAllListenersFn = Rc<dyn Fn(&Rc<EventTarget>, Option<&str>)>;

#[derive(Clone)]
pub enum Method {
    AddListener(AddListenerFn),
    RemoveListener(RemoveListenerFn),
    Listeners(ListenersFn),
    RemoveAllListeners(RemoveAllListenersFn),
}

impl Method {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddListener(_) => "add_listener",
            Self::RemoveListener(_) => "remove_listener",
            Self::Listeners(_) => "listeners",
            Self::RemoveAllListeners(_) => "remove_all_listeners",
        }
    }

    pub(crate) fn identity(&self) -> *const () {
        match self {
            Self::AddListener(f) => Rc::as_ptr(f) as *const (),
            Self::RemoveListener(f) => Rc::as_ptr(f) as *const (),
            Self::Listeners(f) => Rc::as_ptr(f) as *const (),
            Self::RemoveAllListeners(f) => Rc::as_ptr(f) as *const (),
        }
    }

    pub fn same(&self, other: &Method) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method::{}({:p})", self.kind(), self.identity())
    }
}

/// Named method table shared by every target of one type. Patching replaces
/// entries in place and keeps the native entry under its zone symbol.
pub struct Prototype {
    name: String,
    methods: RefCell<HashMap<String, Method>>,
}

impl Prototype {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            methods: RefCell::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn define(&self, name: &str, method: Method) {
        self.methods.borrow_mut().insert(name.to_string(), method);
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.methods.borrow().contains_key(name)
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods.borrow().get(name).cloned()
    }

    /// The native implementation a patched method replaced.
    pub fn original(&self, name: &str) -> Option<Method> {
        self.method(&zone_symbol(name))
    }

    pub fn is_patched(&self, name: &str) -> bool {
        self.has_own(&zone_symbol(name))
    }

    pub(crate) fn save_original(&self, name: &str) -> Option<Method> {
        let method = self.method(name)?;
        self.define(&zone_symbol(name), method.clone());
        Some(method)
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.methods.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field("methods", &names)
            .finish()
    }
}

/// Own properties of a target holding Listener Slots, in creation order.
/// A slot emptied by removal keeps its key with no value.
#[derive(Default)]
pub(crate) struct ListenerSlots {
    keys: Vec<Rc<str>>,
    slots: HashMap<Rc<str>, Option<Vec<Rc<EventTask>>>>,
}

impl ListenerSlots {
    fn get(&self, key: &str) -> Option<&Vec<Rc<EventTask>>> {
        self.slots.get(key).and_then(Option::as_ref)
    }

    fn ensure(&mut self, key: &Rc<str>) -> &mut Vec<Rc<EventTask>> {
        if !self.slots.contains_key(key) {
            self.keys.push(Rc::clone(key));
        }
        self.slots
            .entry(Rc::clone(key))
            .or_insert(None)
            .get_or_insert_with(Vec::new)
    }
}

thread_local! {
    static NEXT_TARGET_ID: Cell<usize> = const { Cell::new(1) };
}

pub struct EventTarget {
    id: usize,
    constructor_name: String,
    prototype: Rc<Prototype>,
    parent: RefCell<Weak<EventTarget>>,
    slots: RefCell<ListenerSlots>,
    pub(crate) native: RefCell<NativeListenerStore>,
}

impl EventTarget {
    pub fn new(constructor_name: &str, prototype: &Rc<Prototype>) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_TARGET_ID.with(|next| {
                let id = next.get();
                next.set(id.saturating_add(1));
                id
            }),
            constructor_name: constructor_name.to_string(),
            prototype: Rc::clone(prototype),
            parent: RefCell::new(Weak::new()),
            slots: RefCell::new(ListenerSlots::default()),
            native: RefCell::new(NativeListenerStore::default()),
        })
    }

    pub fn with_parent(
        constructor_name: &str,
        prototype: &Rc<Prototype>,
        parent: &Rc<EventTarget>,
    ) -> Rc<Self> {
        let target = Self::new(constructor_name, prototype);
        target.set_parent(Some(parent));
        target
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn constructor_name(&self) -> &str {
        &self.constructor_name
    }

    pub fn prototype(&self) -> &Rc<Prototype> {
        &self.prototype
    }

    pub fn parent(&self) -> Option<Rc<EventTarget>> {
        self.parent.borrow().upgrade()
    }

    pub fn set_parent(&self, parent: Option<&Rc<EventTarget>>) {
        *self.parent.borrow_mut() = parent.map(Rc::downgrade).unwrap_or_default();
    }

    // Listener Slots.

    /// Own property names, including keys of emptied slots.
    pub fn own_property_names(&self) -> Vec<String> {
        self.slots
            .borrow()
            .keys
            .iter()
            .map(|key| key.to_string())
            .collect()
    }

    pub fn has_listener_slot(&self, key: &str) -> bool {
        self.slots.borrow().get(key).is_some()
    }

    /// Point-in-time copy of a slot; the live list may change while the copy
    /// is iterated.
    pub fn listener_slot(&self, key: &str) -> Option<Vec<Rc<EventTask>>> {
        self.slots.borrow().get(key).cloned()
    }

    pub fn listener_slot_len(&self, key: &str) -> usize {
        self.slots.borrow().get(key).map_or(0, Vec::len)
    }

    pub(crate) fn ensure_listener_slot(&self, key: &Rc<str>) {
        self.slots.borrow_mut().ensure(key);
    }

    pub(crate) fn insert_task(&self, key: &Rc<str>, task: Rc<EventTask>, prepend: bool) {
        let mut slots = self.slots.borrow_mut();
        let tasks = slots.ensure(key);
        if prepend {
            tasks.insert(0, task);
        } else {
            tasks.push(task);
        }
    }

    /// Unlinks the first task accepted by `matches`, marking it removed, and
    /// all-removed when the slot is left empty.
    pub(crate) fn unlink_task_where(
        &self,
        key: &str,
        matches: impl Fn(&Rc<EventTask>) -> bool,
    ) -> Option<Rc<EventTask>> {
        let task = self
            .listener_slot(key)?
            .into_iter()
            .find(|task| matches(task))?;
        let mut slots = self.slots.borrow_mut();
        let slot = slots.slots.get_mut(key)?;
        let tasks = slot.as_mut()?;
        let pos = tasks.iter().position(|existing| Rc::ptr_eq(existing, &task))?;
        tasks.remove(pos);
        task.mark_removed();
        if tasks.is_empty() {
            task.mark_all_removed();
            *slot = None;
        }
        Some(task)
    }

    // Entry points through the prototype's method table.

    pub fn call_add(
        self: &Rc<Self>,
        method: &str,
        event_name: &str,
        listener: Option<Listener>,
        options: OptionsArg,
    ) -> Option<Rc<EventTarget>> {
        match self.prototype.method(method) {
            Some(Method::AddListener(add)) => add(self, event_name, listener, options),
            other => {
                self.missing_method(method, other.as_ref());
                None
            }
        }
    }

    pub fn call_remove(
        self: &Rc<Self>,
        method: &str,
        event_name: &str,
        listener: Option<Listener>,
        options: OptionsArg,
    ) {
        match self.prototype.method(method) {
            Some(Method::RemoveListener(remove)) => remove(self, event_name, listener, options),
            other => self.missing_method(method, other.as_ref()),
        }
    }

    pub fn call_listeners(self: &Rc<Self>, method: &str, event_name: Option<&str>) -> Vec<Listener> {
        match self.prototype.method(method) {
            Some(Method::Listeners(listeners)) => listeners(self, event_name),
            other => {
                self.missing_method(method, other.as_ref());
                Vec::new()
            }
        }
    }

    pub fn call_remove_all(self: &Rc<Self>, method: &str, event_name: Option<&str>) {
        match self.prototype.method(method) {
            Some(Method::RemoveAllListeners(remove_all)) => remove_all(self, event_name),
            other => self.missing_method(method, other.as_ref()),
        }
    }

    fn missing_method(&self, method: &str, found: Option<&Method>) {
        tracing::debug!(
            prototype = self.prototype.name(),
            method,
            found = found.map(Method::kind),
            "no matching method on prototype"
        );
    }

    pub fn add_event_listener(
        self: &Rc<Self>,
        event_name: &str,
        listener: Listener,
        options: impl Into<OptionsArg>,
    ) {
        self.call_add(ADD_EVENT_LISTENER, event_name, Some(listener), options.into());
    }

    pub fn remove_event_listener(
        self: &Rc<Self>,
        event_name: &str,
        listener: &Listener,
        options: impl Into<OptionsArg>,
    ) {
        self.call_remove(
            REMOVE_EVENT_LISTENER,
            event_name,
            Some(listener.clone()),
            options.into(),
        );
    }

    pub fn event_listeners(self: &Rc<Self>, event_name: &str) -> Vec<Listener> {
        self.call_listeners(EVENT_LISTENERS, Some(event_name))
    }

    pub fn remove_all_listeners(self: &Rc<Self>, event_name: Option<&str>) {
        self.call_remove_all(REMOVE_ALL_LISTENERS, event_name);
    }

    pub fn add_listener(self: &Rc<Self>, event_name: &str, listener: Listener) -> Option<Rc<Self>> {
        self.call_add(ADD_LISTENER, event_name, Some(listener), OptionsArg::Absent)
    }

    pub fn prepend_listener(
        self: &Rc<Self>,
        event_name: &str,
        listener: Listener,
    ) -> Option<Rc<Self>> {
        self.call_add(PREPEND_LISTENER, event_name, Some(listener), OptionsArg::Absent)
    }

    pub fn remove_listener(self: &Rc<Self>, event_name: &str, listener: &Listener) {
        self.call_remove(
            REMOVE_LISTENER,
            event_name,
            Some(listener.clone()),
            OptionsArg::Absent,
        );
    }

    pub fn listeners(self: &Rc<Self>, event_name: &str) -> Vec<Listener> {
        self.call_listeners(LISTENERS, Some(event_name))
    }

    // Native bookkeeping, exposed for diagnostics.

    /// Number of handlers registered with the native layer for `event_name`.
    pub fn native_listener_count(&self, event_name: &str, capture: bool) -> usize {
        self.native.borrow().count(event_name, capture)
    }

    /// Options each native registration for `event_name` was made with.
    pub fn native_listener_options(&self, event_name: &str, capture: bool) -> Vec<OptionsArg> {
        self.native.borrow().options(event_name, capture)
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("id", &self.id)
            .field("constructor_name", &self.constructor_name)
            .field("prototype", &self.prototype.name())
            .field("slots", &self.own_property_names())
            .finish()
    }
}
