use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::{CallbackResult, Event, EventTarget};

pub type EventCallback = Rc<dyn Fn(&Rc<Event>) -> CallbackResult>;
pub type BoundCallback = Rc<dyn Fn(Option<&Rc<EventTarget>>, Option<&Rc<Event>>) -> CallbackResult>;

/// Object-style listener, the `{ handleEvent(event) }` form of the DOM API.
pub trait HandleEvent {
    fn handle_event(&self, event: &Rc<Event>) -> CallbackResult;

    /// Objects that do not expose the capability are handed to the native
    /// implementation untouched.
    fn has_handle_event(&self) -> bool {
        true
    }
}

/// A user supplied listener, resolved once at registration time.
#[derive(Clone)]
pub enum Listener {
    Plain(EventCallback),
    /// A callable that also observes the receiver it was invoked on.
    Bound(BoundCallback),
    Object(Rc<dyn HandleEvent>),
}

impl Listener {
    pub fn plain(callback: impl Fn(&Rc<Event>) -> CallbackResult + 'static) -> Self {
        Self::Plain(Rc::new(callback))
    }

    pub fn bound(
        callback: impl Fn(Option<&Rc<EventTarget>>, Option<&Rc<Event>>) -> CallbackResult + 'static,
    ) -> Self {
        Self::Bound(Rc::new(callback))
    }

    pub fn object(handler: Rc<dyn HandleEvent>) -> Self {
        Self::Object(handler)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Plain(_) | Self::Bound(_))
    }

    pub fn is_listener_like(&self) -> bool {
        match self {
            Self::Plain(_) | Self::Bound(_) => true,
            Self::Object(handler) => handler.has_handle_event(),
        }
    }

    pub fn as_object(&self) -> Option<&Rc<dyn HandleEvent>> {
        match self {
            Self::Object(handler) => Some(handler),
            _ => None,
        }
    }

    /// Identity comparison; two listeners are the same when they share the
    /// same allocation.
    pub fn same(&self, other: &Listener) -> bool {
        self.identity() == other.identity()
    }

    pub(crate) fn identity(&self) -> *const () {
        match self {
            Self::Plain(callback) => Rc::as_ptr(callback) as *const (),
            Self::Bound(callback) => Rc::as_ptr(callback) as *const (),
            Self::Object(handler) => Rc::as_ptr(handler) as *const (),
        }
    }

    pub(crate) fn call(
        &self,
        receiver: Option<&Rc<EventTarget>>,
        event: Option<&Rc<Event>>,
    ) -> CallbackResult {
        match self {
            Self::Bound(callback) => callback(receiver, event),
            Self::Plain(callback) => match event {
                Some(event) => callback(event),
                None => Ok(()),
            },
            Self::Object(handler) => match event {
                Some(event) if handler.has_handle_event() => handler.handle_event(event),
                _ => Ok(()),
            },
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Plain(_) => "Plain",
            Self::Bound(_) => "Bound",
            Self::Object(_) => "Object",
        };
        write!(f, "Listener::{kind}({:p})", self.identity())
    }
}

pub(crate) fn same_object(left: &Rc<dyn HandleEvent>, right: &Rc<dyn HandleEvent>) -> bool {
    Rc::as_ptr(left) as *const () == Rc::as_ptr(right) as *const ()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    pub capture: Option<bool>,
    pub once: Option<bool>,
    pub passive: Option<bool>,
    /// Platform options this layer does not interpret; handed to the native
    /// registration as given.
    pub extra: BTreeMap<String, String>,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_once(mut self, once: bool) -> Self {
        self.once = Some(once);
        self
    }

    pub fn with_passive(mut self, passive: bool) -> Self {
        self.passive = Some(passive);
        self
    }

    pub fn with_extra(mut self, name: &str, value: &str) -> Self {
        self.extra.insert(name.to_string(), value.to_string());
        self
    }
}

/// Third argument of the add/remove entry points: absent, the legacy
/// boolean capture form, or an options dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OptionsArg {
    #[default]
    Absent,
    Capture(bool),
    Options(ListenerOptions),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizedOptions {
    pub capture: bool,
    pub once: bool,
}

impl OptionsArg {
    pub fn normalize(&self) -> NormalizedOptions {
        match self {
            Self::Absent => NormalizedOptions::default(),
            Self::Capture(capture) => NormalizedOptions {
                capture: *capture,
                once: false,
            },
            Self::Options(options) => NormalizedOptions {
                capture: options.capture.unwrap_or(false),
                once: options.once.unwrap_or(false),
            },
        }
    }

    pub fn capture(&self) -> bool {
        self.normalize().capture
    }

    /// Only the dictionary form can carry `once`.
    pub fn is_once(&self) -> bool {
        self.normalize().once
    }

    pub fn passive(&self) -> bool {
        match self {
            Self::Options(options) => options.passive.unwrap_or(false),
            _ => false,
        }
    }

    /// The options handed to the native layer; `once` is handled by the
    /// dispatch router, never by the platform.
    pub(crate) fn without_once(&self) -> OptionsArg {
        match self {
            Self::Options(options) if options.once == Some(true) => Self::Options(ListenerOptions {
                once: Some(false),
                ..options.clone()
            }),
            other => other.clone(),
        }
    }
}

impl From<bool> for OptionsArg {
    fn from(capture: bool) -> Self {
        Self::Capture(capture)
    }
}

impl From<ListenerOptions> for OptionsArg {
    fn from(options: ListenerOptions) -> Self {
        Self::Options(options)
    }
}
