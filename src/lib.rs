//! Context-aware interception of event listener registration.
//!
//! [`patch_event_target`] replaces the add/remove/list/remove-all entry
//! points of a [`Prototype`] so that every listener becomes an [`EventTask`]
//! owned by the [`Zone`] that was current at registration. Dispatch goes
//! through a shared router that runs each listener inside its own zone,
//! honours `once` and `stopImmediatePropagation`, and tolerates listeners
//! that add or remove listeners while an event is being delivered.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use event_interceptor::{
//!     Event, EventTarget, Global, Listener, PatchOptions, native, patch_event_target,
//! };
//!
//! let global = Global::new();
//! let proto = native::event_target_prototype("Element");
//! patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());
//!
//! let button = EventTarget::new("HTMLButtonElement", &proto);
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! button.add_event_listener(
//!     "click",
//!     Listener::plain(move |event| {
//!         sink.borrow_mut().push(event.event_type().to_string());
//!         Ok(())
//!     }),
//!     false,
//! );
//!
//! native::dispatch_event(&global, &button, &Event::new(&global, "click"));
//! assert_eq!(*log.borrow(), vec!["click".to_string()]);
//! ```

pub mod config;
pub mod enumerate;
pub mod event;
pub mod global;
pub mod listener;
pub mod native;
pub mod symbols;
pub mod target;
pub mod zone;

mod bridge;
mod dispatch;
mod interceptor;

pub use config::{CompareFn, PatchOptions, TargetProfile, ValidateHandler};
pub use enumerate::find_event_tasks;
pub use event::{Event, EventInit, EventPhase, EventPrototype, patch_event_prototype};
pub use global::Global;
pub use interceptor::patch_event_target;
pub use listener::{HandleEvent, Listener, ListenerOptions, NormalizedOptions, OptionsArg};
pub use target::{EventTarget, Method, Prototype};
pub use zone::{EventTask, EventTaskData, TaskState, Zone, ZoneSpec};

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a single listener invocation.
pub type CallbackResult = std::result::Result<(), ListenerError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task {task} belongs to zone {owner}, not {zone}")]
    WrongZone {
        task: u64,
        owner: String,
        zone: String,
    },
    #[error("task {task} cannot be cancelled while {state:?}")]
    InvalidTaskState { task: u64, state: TaskState },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    #[error("listener threw: {0}")]
    Thrown(String),
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::Thrown(message.to_string())
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::Thrown(message)
    }
}
