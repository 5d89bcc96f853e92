use super::*;

use crate::config::{ADD_LISTENER, LISTENERS, PREPEND_LISTENER, REMOVE_ALL_LISTENERS, REMOVE_LISTENER};

fn emit(fx: &Fixture, target: &Rc<EventTarget>, event_name: &str) -> bool {
    native::emit(&fx.global, target, &Event::with_detail(&fx.global, event_name, event_name))
}

#[test]
fn emitter_profile_patches_the_emitter_method_names() -> Result<()> {
    let fx = emitter_fixture();
    for name in [ADD_LISTENER, PREPEND_LISTENER, REMOVE_LISTENER, LISTENERS, REMOVE_ALL_LISTENERS] {
        assert!(fx.proto.is_patched(name), "{name} should be patched");
    }
    assert!(!fx.proto.has_own(ADD_EVENT_LISTENER));
    Ok(())
}

#[test]
fn add_listener_returns_the_emitter_and_keeps_duplicates() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");
    let a = fx.recorder("A");

    let chained = emitter.add_listener("data", a.clone());
    assert!(chained.is_some_and(|target| Rc::ptr_eq(&target, &emitter)));
    emitter.add_listener("data", a.clone());
    assert_eq!(emitter.native_listener_count("data", false), 2);

    assert!(emit(&fx, &emitter, "data"));
    assert_eq!(fx.entries(), vec!["A", "A"]);

    // Removal takes out one registration at a time.
    emitter.remove_listener("data", &a);
    assert!(same_listeners(&emitter.listeners("data"), &[&a]));
    assert_eq!(emitter.native_listener_count("data", false), 1);
    Ok(())
}

#[test]
fn prepend_listener_runs_before_earlier_registrations() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");
    let a = fx.recorder("A");
    let b = fx.recorder("B");
    let first = fx.recorder("first");

    emitter.add_listener("data", a.clone());
    emitter.add_listener("data", b.clone());
    emitter.prepend_listener("data", first.clone());

    assert!(same_listeners(&emitter.listeners("data"), &[&first, &a, &b]));
    emit(&fx, &emitter, "data");
    assert_eq!(fx.entries(), vec!["first", "A", "B"]);

    let tasks = find_event_tasks(&emitter, Some("data"));
    assert_eq!(tasks[0].source(), "Socket.prependListener:data");
    assert_eq!(tasks[1].source(), "Socket.addListener:data");
    Ok(())
}

#[test]
fn once_helper_removes_itself_through_the_patched_remove() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");

    let wrapper = native::once(&emitter, "data", fx.recorder("once"));
    assert!(same_listeners(&emitter.listeners("data"), &[&wrapper]));

    assert!(emit(&fx, &emitter, "data"));
    assert!(!emit(&fx, &emitter, "data"));
    assert_eq!(fx.entries(), vec!["once"]);
    assert!(emitter.listeners("data").is_empty());
    assert!(find_event_tasks(&emitter, None).is_empty());
    Ok(())
}

#[test]
fn once_helper_can_be_removed_before_it_fires() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");

    let wrapper = native::once(&emitter, "data", fx.recorder("once"));
    emitter.remove_listener("data", &wrapper);
    assert!(!emit(&fx, &emitter, "data"));
    assert!(fx.entries().is_empty());
    Ok(())
}

#[test]
fn remove_all_announces_every_removal_before_dropping_remove_listener() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");
    let announced = Rc::clone(&fx.log);

    // Registered first so a naive walk would drop it before the others.
    emitter.add_listener(
        "removeListener",
        Listener::plain(move |event| {
            announced
                .borrow_mut()
                .push(event.detail().unwrap_or_default().to_string());
            Ok(())
        }),
    );
    emitter.add_listener("data", fx.recorder("data"));
    emitter.add_listener("end", fx.recorder("end"));

    emitter.remove_all_listeners(None);

    assert_eq!(fx.entries(), vec!["data", "end"]);
    assert!(find_event_tasks(&emitter, None).is_empty());
    for name in ["removeListener", "data", "end"] {
        assert_eq!(emitter.native_listener_count(name, false), 0);
    }
    Ok(())
}

#[test]
fn remove_all_by_name_only_touches_that_event() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");
    let end = fx.recorder("end");

    emitter.add_listener("data", fx.recorder("A"));
    emitter.add_listener("data", fx.recorder("B"));
    emitter.add_listener("end", end.clone());
    emitter.remove_all_listeners(Some("data"));

    assert!(!emit(&fx, &emitter, "data"));
    assert!(same_listeners(&emitter.listeners("end"), &[&end]));
    Ok(())
}

#[test]
fn emitter_listeners_receive_the_emitter_as_receiver() -> Result<()> {
    let fx = emitter_fixture();
    let emitter = fx.target("Socket");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);

    emitter.add_listener(
        "data",
        Listener::bound(move |receiver, _event| {
            sink.borrow_mut().push(receiver.map(|target| target.id()));
            Ok(())
        }),
    );
    emit(&fx, &emitter, "data");
    assert_eq!(*seen.borrow(), vec![Some(emitter.id())]);
    Ok(())
}
