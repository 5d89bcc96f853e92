use std::rc::Rc;

use crate::symbols::parse_symbol_event_name;
use crate::{EventTarget, EventTask};

/// Every tracked task on `target`, optionally restricted to one event name.
/// Slots are visited in creation order, tasks in slot order.
pub fn find_event_tasks(target: &EventTarget, event_name: Option<&str>) -> Vec<Rc<EventTask>> {
    let mut found = Vec::new();
    for key in target.own_property_names() {
        let Some((name, _capture)) = parse_symbol_event_name(&key) else {
            continue;
        };
        if event_name.is_some_and(|filter| filter != name) {
            continue;
        }
        if let Some(tasks) = target.listener_slot(&key) {
            found.extend(tasks);
        }
    }
    found
}

/// Event names that have (or had) a Listener Slot on `target`, each once.
pub(crate) fn tracked_event_names(target: &EventTarget) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for key in target.own_property_names() {
        if let Some((name, _capture)) = parse_symbol_event_name(&key) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}
