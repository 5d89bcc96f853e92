use super::*;

#[test]
fn duplicate_registration_is_ignored_per_capture_flag() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");

    div.add_event_listener("click", a.clone(), false);
    div.add_event_listener("click", a.clone(), OptionsArg::Absent);
    div.add_event_listener("click", a.clone(), ListenerOptions::new().with_capture(false));
    assert_eq!(find_event_tasks(&div, Some("click")).len(), 1);

    // The capture flag selects a different slot, so this one is kept.
    div.add_event_listener("click", a.clone(), true);
    assert_eq!(find_event_tasks(&div, Some("click")).len(), 2);

    fx.fire(&div, "click");
    assert_eq!(fx.entries(), vec!["A", "A"]);
    Ok(())
}

#[test]
fn duplicate_check_can_be_disabled() -> Result<()> {
    let fx = dom_fixture_with(PatchOptions::default().with_check_duplicate(false));
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");

    div.add_event_listener("click", a.clone(), false);
    div.add_event_listener("click", a, false);
    fx.fire(&div, "click");
    assert_eq!(fx.entries(), vec!["A", "A"]);
    Ok(())
}

#[test]
fn add_then_remove_leaves_no_trace() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");
    let options = ListenerOptions::new().with_capture(true).with_passive(true);

    div.add_event_listener("scroll", a.clone(), options.clone());
    let key = symbols::symbol_event_name("scroll", true);
    assert!(div.has_listener_slot(&key));
    assert_eq!(div.native_listener_count("scroll", true), 1);

    div.remove_event_listener("scroll", &a, options);
    assert!(!div.has_listener_slot(&key));
    assert_eq!(div.native_listener_count("scroll", true), 0);
    assert!(find_event_tasks(&div, None).is_empty());
    // The emptied slot keeps its key.
    assert_eq!(div.own_property_names(), vec![key.to_string()]);
    Ok(())
}

#[test]
fn removal_with_the_wrong_capture_flag_is_a_no_op() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");

    div.add_event_listener("click", a.clone(), true);
    div.remove_event_listener("click", &a, false);
    div.remove_event_listener("click", &fx.recorder("other"), true);
    div.remove_event_listener("never-registered", &a, true);
    assert_eq!(find_event_tasks(&div, Some("click")).len(), 1);
    Ok(())
}

#[test]
fn slot_is_recreated_after_being_emptied() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");
    let b = fx.recorder("B");

    div.add_event_listener("click", a.clone(), false);
    div.remove_event_listener("click", &a, false);
    div.add_event_listener("click", b, false);

    assert_eq!(div.native_listener_count("click", false), 1);
    fx.fire(&div, "click");
    assert_eq!(fx.entries(), vec!["B"]);
    Ok(())
}

#[test]
fn absent_and_non_listener_delegates_go_straight_to_native() -> Result<()> {
    struct Inert(Log);

    impl HandleEvent for Inert {
        fn handle_event(&self, _event: &Rc<Event>) -> CallbackResult {
            self.0.borrow_mut().push("inert".to_string());
            Ok(())
        }

        fn has_handle_event(&self) -> bool {
            false
        }
    }

    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let inert = Listener::object(Rc::new(Inert(Rc::clone(&fx.log))));

    assert!(div.call_add(ADD_EVENT_LISTENER, "click", None, OptionsArg::Absent).is_none());
    div.add_event_listener("click", inert.clone(), false);
    assert!(div.own_property_names().is_empty());
    assert_eq!(div.native_listener_count("click", false), 1);

    // Registered natively, but there is nothing to call on it.
    fx.fire(&div, "click");
    assert!(fx.entries().is_empty());

    div.call_remove(REMOVE_EVENT_LISTENER, "click", Some(inert), OptionsArg::Absent);
    assert_eq!(div.native_listener_count("click", false), 0);
    Ok(())
}

#[test]
fn validate_handler_can_reject_registrations() -> Result<()> {
    let fx = dom_fixture_with(
        PatchOptions::default()
            .with_validate_handler(|_target, _listener, event_name, _options| event_name != "blocked"),
    );
    let div = fx.target("HTMLDivElement");

    div.add_event_listener("blocked", fx.recorder("blocked"), false);
    div.add_event_listener("click", fx.recorder("A"), false);
    fx.fire(&div, "blocked");
    fx.fire(&div, "click");

    assert_eq!(fx.entries(), vec!["A"]);
    assert_eq!(div.native_listener_count("blocked", false), 0);
    assert!(!div.has_listener_slot(&symbols::symbol_event_name("blocked", false)));
    Ok(())
}

#[test]
fn custom_compare_drives_duplicates_and_removal() -> Result<()> {
    // Any listener matches any task: one registration per slot, and any
    // listener removes it.
    let fx = dom_fixture_with(PatchOptions::default().with_compare(|_task, _listener| true));
    let div = fx.target("HTMLDivElement");

    div.add_event_listener("click", fx.recorder("A"), false);
    div.add_event_listener("click", fx.recorder("B"), false);
    assert_eq!(find_event_tasks(&div, Some("click")).len(), 1);

    div.remove_event_listener("click", &fx.recorder("unrelated"), false);
    assert!(find_event_tasks(&div, Some("click")).is_empty());
    assert_eq!(div.native_listener_count("click", false), 0);
    Ok(())
}

#[test]
fn source_label_names_constructor_method_and_event() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    div.add_event_listener("click", fx.recorder("A"), false);

    let tasks = find_event_tasks(&div, Some("click"));
    assert_eq!(tasks[0].source(), "HTMLDivElement.addEventListener:click");
    Ok(())
}

#[test]
fn registered_global_source_overrides_the_label() -> Result<()> {
    let fx = dom_fixture();
    let xhr = fx.target("XMLHttpRequest");
    symbols::register_global_source("XMLHttpRequest", "readystatechange", "XMLHttpRequest.send");

    xhr.add_event_listener("readystatechange", fx.recorder("A"), false);
    xhr.add_event_listener("load", fx.recorder("B"), false);

    let tasks = find_event_tasks(&xhr, None);
    assert_eq!(tasks[0].source(), "XMLHttpRequest.send");
    assert_eq!(tasks[1].source(), "XMLHttpRequest.addEventListener:load");
    Ok(())
}

#[test]
fn return_target_option_chains_registrations() -> Result<()> {
    let fx = dom_fixture_with(PatchOptions::default().with_return_target(true));
    let div = fx.target("HTMLDivElement");

    let returned = div.call_add(
        ADD_EVENT_LISTENER,
        "click",
        Some(fx.recorder("A")),
        OptionsArg::Absent,
    );
    assert!(returned.is_some_and(|target| Rc::ptr_eq(&target, &div)));

    let plain = dom_fixture();
    let span = plain.target("HTMLSpanElement");
    assert!(
        span.call_add(ADD_EVENT_LISTENER, "click", Some(plain.recorder("A")), OptionsArg::Absent)
            .is_none()
    );
    Ok(())
}

#[test]
fn patching_keeps_originals_and_is_idempotent() -> Result<()> {
    let global = Global::new();
    let proto = native::event_target_prototype("Element");
    let native_add = proto.method(ADD_EVENT_LISTENER);

    let first = patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());
    let second = patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());
    assert_eq!(first, vec![true]);
    assert_eq!(second, vec![false]);

    assert!(proto.is_patched(ADD_EVENT_LISTENER));
    assert!(proto.is_patched(REMOVE_EVENT_LISTENER));
    assert!(proto.is_patched(EVENT_LISTENERS));
    let original = proto.original(ADD_EVENT_LISTENER);
    assert!(matches!(
        (&original, &native_add),
        (Some(original), Some(native)) if original.same(native)
    ));
    assert!(matches!(
        (&original, &proto.method(ADD_EVENT_LISTENER)),
        (Some(original), Some(patched)) if !original.same(patched)
    ));
    Ok(())
}

#[test]
fn prototypes_without_the_add_method_are_skipped() -> Result<()> {
    let global = Global::new();
    let bare = Prototype::new("Bare");
    let element = native::event_target_prototype("Element");

    let patched = patch_event_target(
        &global,
        &[Rc::clone(&bare), Rc::clone(&element)],
        &PatchOptions::default(),
    );
    assert_eq!(patched, vec![false, true]);
    assert!(!bare.is_patched(ADD_EVENT_LISTENER));
    Ok(())
}

#[test]
fn event_prototype_patch_is_idempotent() -> Result<()> {
    let global = Global::new();
    assert!(patch_event_prototype(&global));
    assert!(!patch_event_prototype(&global));
    assert!(global.event_prototype().is_patched(event::STOP_IMMEDIATE_PROPAGATION));
    assert!(global.event_prototype().original(event::STOP_IMMEDIATE_PROPAGATION).is_some());
    Ok(())
}

#[test]
fn enumeration_filters_by_event_name_and_unwraps_delegates() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");
    let b = fx.recorder("B");
    let c = fx.recorder("C");

    div.add_event_listener("click", a.clone(), false);
    div.add_event_listener("keydown", b.clone(), false);
    div.add_event_listener("click", c.clone(), true);

    assert!(same_listeners(&div.event_listeners("click"), &[&a, &c]));
    assert!(same_listeners(&div.event_listeners("keydown"), &[&b]));
    assert!(div.event_listeners("scroll").is_empty());
    assert!(same_listeners(
        &div.call_listeners(EVENT_LISTENERS, None),
        &[&a, &b, &c]
    ));
    Ok(())
}

#[test]
fn event_names_with_punctuation_are_enumerable() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let a = fx.recorder("A");

    div.add_event_listener("my-event:ready", a.clone(), false);
    assert!(same_listeners(&div.event_listeners("my-event:ready"), &[&a]));
    Ok(())
}

#[test]
fn empty_event_name_is_enumerable_and_cleared_by_remove_all() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let e = fx.recorder("E");

    div.add_event_listener("", e.clone(), false);
    assert!(same_listeners(&div.event_listeners(""), &[&e]));
    assert_eq!(find_event_tasks(&div, None).len(), 1);

    div.remove_all_listeners(None);
    fx.fire(&div, "");
    assert!(fx.entries().is_empty());
    assert!(find_event_tasks(&div, None).is_empty());
    assert_eq!(div.native_listener_count("", false), 0);
    Ok(())
}

#[test]
fn unrecognised_options_reach_the_native_registration() -> Result<()> {
    let fx = dom_fixture();
    let div = fx.target("HTMLDivElement");
    let options = ListenerOptions::new()
        .with_once(true)
        .with_passive(true)
        .with_extra("mozSystemGroup", "true");

    div.add_event_listener("touchstart", fx.recorder("A"), options.clone());

    let expected = OptionsArg::Options(options.with_once(false));
    assert_eq!(div.native_listener_options("touchstart", false), vec![expected]);
    let tasks = find_event_tasks(&div, Some("touchstart"));
    assert!(tasks[0].options().is_once());
    Ok(())
}

#[test]
fn target_ids_are_sequential_per_thread() -> Result<()> {
    let fx = dom_fixture();
    let first = fx.target("HTMLDivElement");
    let second = fx.target("HTMLDivElement");
    assert_eq!(second.id(), first.id() + 1);

    let fresh = std::thread::spawn(|| {
        let proto = native::event_target_prototype("Element");
        EventTarget::new("HTMLDivElement", &proto).id()
    })
    .join()
    .expect("target thread panicked");
    assert_eq!(fresh, 1);
    Ok(())
}
