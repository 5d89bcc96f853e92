use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const ZONE_SYMBOL_PREFIX: &str = "__zone_symbol__";
pub const TRUE_STR: &str = "true";
pub const FALSE_STR: &str = "false";

const EVENT_NAME_SYMBOL_PATTERN: &str = r"^__zone_symbol__(.*)(true|false)$";

/// Listener Slot keys for one event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEventNames {
    pub bubble: Rc<str>,
    pub capture: Rc<str>,
}

impl SymbolEventNames {
    fn derive(event_name: &str) -> Self {
        Self {
            bubble: format!("{ZONE_SYMBOL_PREFIX}{event_name}{FALSE_STR}").into(),
            capture: format!("{ZONE_SYMBOL_PREFIX}{event_name}{TRUE_STR}").into(),
        }
    }

    pub fn for_capture(&self, capture: bool) -> &Rc<str> {
        if capture { &self.capture } else { &self.bubble }
    }
}

thread_local! {
    static SYMBOL_EVENT_NAMES: RefCell<HashMap<String, SymbolEventNames>> =
        RefCell::new(HashMap::new());
    static GLOBAL_SOURCES: RefCell<HashMap<String, HashMap<String, String>>> =
        RefCell::new(HashMap::new());
    static EVENT_NAME_SYMBOL_REGEX: Option<fancy_regex::Regex> =
        fancy_regex::Regex::new(EVENT_NAME_SYMBOL_PATTERN).ok();
}

pub fn zone_symbol(name: &str) -> String {
    format!("{ZONE_SYMBOL_PREFIX}{name}")
}

/// Keys for `event_name`, derived on first use and cached for the thread.
pub fn symbol_event_names(event_name: &str) -> SymbolEventNames {
    SYMBOL_EVENT_NAMES.with(|names| {
        names
            .borrow_mut()
            .entry(event_name.to_string())
            .or_insert_with(|| SymbolEventNames::derive(event_name))
            .clone()
    })
}

pub fn symbol_event_name(event_name: &str, capture: bool) -> Rc<str> {
    symbol_event_names(event_name).for_capture(capture).clone()
}

/// Lookup without deriving; an event name that was never registered has no
/// slots anywhere.
pub fn cached_symbol_event_names(event_name: &str) -> Option<SymbolEventNames> {
    SYMBOL_EVENT_NAMES.with(|names| names.borrow().get(event_name).cloned())
}

pub fn cached_symbol_event_name(event_name: &str, capture: bool) -> Option<Rc<str>> {
    cached_symbol_event_names(event_name).map(|names| names.for_capture(capture).clone())
}

/// Splits a slot key back into `(event_name, capture)`.
pub fn parse_symbol_event_name(key: &str) -> Option<(String, bool)> {
    EVENT_NAME_SYMBOL_REGEX.with(|regex| {
        let regex = regex.as_ref()?;
        let captures = match regex.captures(key) {
            Ok(captures) => captures?,
            Err(err) => {
                tracing::warn!(key, error = %err, "slot key match failed");
                return None;
            }
        };
        let event_name = captures.get(1)?.as_str().to_string();
        let capture = captures.get(2)?.as_str() == TRUE_STR;
        Some((event_name, capture))
    })
}

/// Overrides the diagnostic source label of tasks registered for
/// `event_name` on targets built by `constructor_name`.
pub fn register_global_source(constructor_name: &str, event_name: &str, source: &str) {
    GLOBAL_SOURCES.with(|sources| {
        sources
            .borrow_mut()
            .entry(constructor_name.to_string())
            .or_default()
            .insert(event_name.to_string(), source.to_string());
    });
}

pub fn global_source(constructor_name: &str, event_name: &str) -> Option<String> {
    GLOBAL_SOURCES.with(|sources| {
        sources
            .borrow()
            .get(constructor_name)
            .and_then(|events| events.get(event_name))
            .cloned()
    })
}
