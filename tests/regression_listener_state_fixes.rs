use std::cell::RefCell;
use std::rc::Rc;

use event_interceptor::{
    Event, EventInit, EventTarget, Global, Listener, ListenerOptions, PatchOptions, Result,
    TargetProfile, Zone, find_event_tasks, native, patch_event_prototype, patch_event_target,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &str) -> Listener {
    let log = Rc::clone(log);
    let label = label.to_string();
    Listener::plain(move |_event| {
        log.borrow_mut().push(label.clone());
        Ok(())
    })
}

#[test]
fn prototypes_patched_together_keep_their_listeners_apart() -> Result<()> {
    init_tracing();
    let global = Global::new();
    let element = native::event_target_prototype("Element");
    let window = native::event_target_prototype("Window");
    let patched = patch_event_target(
        &global,
        &[Rc::clone(&element), Rc::clone(&window)],
        &PatchOptions::default(),
    );
    assert_eq!(patched, vec![true, true]);

    let log = Rc::new(RefCell::new(Vec::new()));
    let div = EventTarget::new("HTMLDivElement", &element);
    let win = EventTarget::new("Window", &window);
    div.add_event_listener("resize", recorder(&log, "div"), false);
    win.add_event_listener("resize", recorder(&log, "window"), false);

    native::dispatch_event(&global, &win, &Event::new(&global, "resize"));
    native::dispatch_event(&global, &div, &Event::new(&global, "resize"));
    assert_eq!(*log.borrow(), vec!["window", "div"]);
    Ok(())
}

#[test]
fn non_bubbling_event_skips_ancestor_bubble_listeners() -> Result<()> {
    init_tracing();
    let global = Global::new();
    let proto = native::event_target_prototype("Element");
    patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());

    let log = Rc::new(RefCell::new(Vec::new()));
    let form = EventTarget::new("HTMLFormElement", &proto);
    let input = EventTarget::with_parent("HTMLInputElement", &proto, &form);
    form.add_event_listener("focus", recorder(&log, "form-capture"), true);
    form.add_event_listener("focus", recorder(&log, "form-bubble"), false);
    input.add_event_listener("focus", recorder(&log, "input"), false);

    let focus = Event::with_init(
        &global,
        "focus",
        EventInit {
            bubbles: false,
            cancelable: false,
        },
    );
    native::dispatch_event(&global, &input, &focus);
    assert_eq!(*log.borrow(), vec!["form-capture", "input"]);
    Ok(())
}

#[test]
fn stop_propagation_in_capture_keeps_the_target_from_hearing() -> Result<()> {
    init_tracing();
    let global = Global::new();
    let proto = native::event_target_prototype("Element");
    patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());
    patch_event_prototype(&global);

    let log = Rc::new(RefCell::new(Vec::new()));
    let list = EventTarget::new("HTMLUListElement", &proto);
    let item = EventTarget::with_parent("HTMLLIElement", &proto, &list);
    list.add_event_listener(
        "click",
        Listener::plain(|event| {
            event.stop_propagation();
            event.prevent_default();
            Ok(())
        }),
        true,
    );
    item.add_event_listener("click", recorder(&log, "item"), false);

    let not_prevented = native::dispatch_event(&global, &item, &Event::new(&global, "click"));
    assert!(!not_prevented);
    assert!(log.borrow().is_empty());
    Ok(())
}

#[test]
fn once_listener_can_be_registered_again_after_it_fired() -> Result<()> {
    init_tracing();
    let global = Global::new();
    let proto = native::event_target_prototype("Element");
    patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());

    let log = Rc::new(RefCell::new(Vec::new()));
    let button = EventTarget::new("HTMLButtonElement", &proto);
    let listener = recorder(&log, "click");
    let click = || native::dispatch_event(&global, &button, &Event::new(&global, "click"));

    button.add_event_listener("click", listener.clone(), ListenerOptions::new().with_once(true));
    click();
    button.add_event_listener("click", listener, ListenerOptions::new().with_once(true));
    click();
    click();

    assert_eq!(log.borrow().len(), 2);
    assert!(find_event_tasks(&button, None).is_empty());
    assert_eq!(button.native_listener_count("click", false), 0);
    Ok(())
}

#[test]
fn dropped_target_leaves_tasks_inert() -> Result<()> {
    init_tracing();
    let global = Global::new();
    let proto = native::event_target_prototype("Element");
    patch_event_target(&global, &[Rc::clone(&proto)], &PatchOptions::default());

    let log = Rc::new(RefCell::new(Vec::new()));
    let zone = Zone::root().fork("detached", None);
    let div = EventTarget::new("HTMLDivElement", &proto);
    zone.run(|| div.add_event_listener("click", recorder(&log, "A"), false));
    let tasks = find_event_tasks(&div, None);
    drop(div);

    assert!(tasks[0].target().is_none());
    zone.cancel_task(&tasks[0])?;
    assert_eq!(zone.event_task_count(), 0);
    Ok(())
}

#[test]
fn emitter_profile_survives_listener_errors() -> Result<()> {
    init_tracing();
    let global = Global::new();
    let proto = native::event_emitter_prototype(&global, "EventEmitter");
    patch_event_target(
        &global,
        &[Rc::clone(&proto)],
        &PatchOptions::from(TargetProfile::EventEmitter),
    );

    let log = Rc::new(RefCell::new(Vec::new()));
    let zone = Zone::root().fork("worker", None);
    let emitter = EventTarget::new("Worker", &proto);
    zone.run(|| {
        emitter.add_listener("message", Listener::plain(|_event| Err("bad payload".into())));
        emitter.add_listener("message", recorder(&log, "after"));
    });

    let delivered = native::emit(&global, &emitter, &Event::new(&global, "message"));
    assert!(delivered);
    assert_eq!(*log.borrow(), vec!["after"]);
    assert_eq!(zone.take_errors().len(), 1);
    Ok(())
}
