//! Integration tests for the ordered mirror.

use ordered_mirror::{
    Item, Key, MemoryQuery, MirrorChange, MirrorConfig, MirrorObserver, MirrorState,
    MoveStrategy, OrderedMirror, SourceRef,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Clone, Debug, PartialEq)]
enum Notification {
    Added(String, usize),
    Changed(String, usize),
    Removed(String, usize),
    Moved(String, usize, usize),
}

/// Observer that records every callback.
#[derive(Clone, Default)]
struct Recorder {
    log: Rc<RefCell<Vec<Notification>>>,
    payloads: Rc<RefCell<Vec<serde_json::Value>>>,
}

impl Recorder {
    fn take(&self) -> Vec<Notification> {
        self.log.borrow_mut().drain(..).collect()
    }
}

impl MirrorObserver for Recorder {
    fn child_added(&mut self, item: &Item, index: usize) {
        self.log
            .borrow_mut()
            .push(Notification::Added(item.key().to_string(), index));
    }

    fn child_changed(&mut self, item: &Item, index: usize) {
        if let Ok(value) = item.decode::<serde_json::Value>() {
            self.payloads.borrow_mut().push(value);
        }
        self.log
            .borrow_mut()
            .push(Notification::Changed(item.key().to_string(), index));
    }

    fn child_removed(&mut self, item: &Item, index: usize) {
        self.log
            .borrow_mut()
            .push(Notification::Removed(item.key().to_string(), index));
    }

    fn child_moved(&mut self, item: &Item, from: usize, to: usize) {
        self.log
            .borrow_mut()
            .push(Notification::Moved(item.key().to_string(), from, to));
    }
}

fn todo(key: &str, title: &str) -> Item {
    Item::json(SourceRef::new("todos", key), &json!({ "title": title })).unwrap()
}

fn key(k: &str) -> Key {
    Key::from(k)
}

fn keys(mirror: &OrderedMirror) -> Vec<String> {
    mirror.keys().into_iter().map(|k| k.0).collect()
}

fn observed_mirror(config: MirrorConfig) -> (Arc<MemoryQuery>, OrderedMirror, Recorder) {
    init_tracing();
    let query = Arc::new(MemoryQuery::new("todos"));
    let mut mirror = OrderedMirror::with_config(query.clone(), config);
    let recorder = Recorder::default();
    mirror.set_observer(recorder.clone());
    mirror.process_pending().unwrap();
    assert!(mirror.is_caught_up());
    (query, mirror, recorder)
}

// --- Documented Scenarios ---

#[test]
fn test_scenario_add_change_remove() {
    let (_query, mut mirror, recorder) = observed_mirror(MirrorConfig::default());

    // Added(a, front)
    mirror.child_added(todo("a", "milk"), None).unwrap();
    assert_eq!(keys(&mirror), vec!["a"]);
    assert_eq!(recorder.take(), vec![Notification::Added("a".into(), 0)]);

    // Added(b, after a)
    mirror.child_added(todo("b", "bread"), Some(&key("a"))).unwrap();
    assert_eq!(keys(&mirror), vec!["a", "b"]);
    assert_eq!(recorder.take(), vec![Notification::Added("b".into(), 1)]);

    // Changed(a) with a new payload
    mirror.child_changed(todo("a", "oat milk")).unwrap();
    assert_eq!(keys(&mirror), vec!["a", "b"]);
    assert_eq!(recorder.take(), vec![Notification::Changed("a".into(), 0)]);
    let title: serde_json::Value = mirror.item_at(0).decode().unwrap();
    assert_eq!(title["title"], "oat milk");
    assert_eq!(recorder.payloads.borrow()[0]["title"], "oat milk");

    // Removed(a)
    mirror.child_removed(todo("a", "oat milk")).unwrap();
    assert_eq!(keys(&mirror), vec!["b"]);
    assert_eq!(recorder.take(), vec![Notification::Removed("a".into(), 0)]);
}

#[test]
fn test_scenario_move_with_duplicate_strategy() {
    let (_query, mut mirror, recorder) = observed_mirror(MirrorConfig {
        move_strategy: MoveStrategy::Duplicate,
        ..Default::default()
    });

    mirror.child_added(todo("a", "1"), None).unwrap();
    mirror.child_added(todo("b", "2"), Some(&key("a"))).unwrap();
    mirror.child_added(todo("c", "3"), Some(&key("b"))).unwrap();
    recorder.take();

    mirror.child_moved(todo("a", "1"), Some(&key("c"))).unwrap();
    assert_eq!(keys(&mirror), vec!["a", "b", "c", "a"]);
    assert_eq!(recorder.take(), vec![Notification::Moved("a".into(), 0, 3)]);
}

#[test]
fn test_scenario_move_with_relocate_strategy() {
    let (_query, mut mirror, recorder) = observed_mirror(MirrorConfig::default());

    mirror.child_added(todo("a", "1"), None).unwrap();
    mirror.child_added(todo("b", "2"), Some(&key("a"))).unwrap();
    mirror.child_added(todo("c", "3"), Some(&key("b"))).unwrap();
    recorder.take();

    let change = mirror.child_moved(todo("a", "1"), Some(&key("c"))).unwrap();
    assert_eq!(change, MirrorChange::Moved { key: key("a"), from: 0, to: 2 });
    assert_eq!(keys(&mirror), vec!["b", "c", "a"]);
    assert_eq!(recorder.take(), vec![Notification::Moved("a".into(), 0, 2)]);
}

// --- Driven by a Query ---

#[test]
fn test_mirror_follows_query() {
    let (query, mut mirror, recorder) = observed_mirror(MirrorConfig::default());

    query.push(todo("a", "milk")).unwrap();
    query.push(todo("b", "bread")).unwrap();
    query.insert_after(todo("c", "eggs"), None).unwrap();
    query.update(todo("b", "rye bread")).unwrap();
    query.move_after(&key("c"), Some(&key("b"))).unwrap();
    query.remove(&key("a")).unwrap();

    let applied = mirror.process_pending().unwrap();
    assert_eq!(applied, 6);
    assert_eq!(mirror.keys(), query.keys());
    assert_eq!(keys(&mirror), vec!["b", "c"]);

    assert_eq!(
        recorder.take(),
        vec![
            Notification::Added("a".into(), 0),
            Notification::Added("b".into(), 1),
            Notification::Added("c".into(), 0),
            Notification::Changed("b".into(), 2),
            Notification::Moved("c".into(), 0, 2),
            Notification::Removed("a".into(), 0),
        ]
    );
}

#[test]
fn test_late_mirror_replays_existing_children() {
    init_tracing();
    let query = Arc::new(MemoryQuery::new("todos"));
    query.push(todo("a", "milk")).unwrap();
    query.push(todo("b", "bread")).unwrap();

    let mut mirror = OrderedMirror::new(query.clone());
    assert!(!mirror.is_caught_up());

    assert_eq!(mirror.process_pending().unwrap(), 2);
    assert!(mirror.is_caught_up());
    assert_eq!(keys(&mirror), vec!["a", "b"]);
    assert_eq!(mirror.source_ref(1).path(), "todos/b");
}

#[test]
fn test_two_mirrors_on_one_query() {
    init_tracing();
    let query = Arc::new(MemoryQuery::new("todos"));
    let mut first = OrderedMirror::new(query.clone());
    let mut second = OrderedMirror::new(query.clone());
    assert_eq!(query.subscription_count(), 2);

    query.push(todo("a", "milk")).unwrap();
    first.process_pending().unwrap();

    // Independent sequences
    assert_eq!(first.count(), 1);
    assert_eq!(second.count(), 0);

    first.teardown();
    query.push(todo("b", "bread")).unwrap();
    second.process_pending().unwrap();
    assert_eq!(keys(&second), vec!["a", "b"]);
    assert_eq!(keys(&first), vec!["a"]);
}

#[test]
fn test_process_next_waits_for_event() {
    let (query, mut mirror, _recorder) = observed_mirror(MirrorConfig::default());

    let writer = {
        let query = query.clone();
        std::thread::spawn(move || {
            query.push(todo("a", "milk")).unwrap();
        })
    };

    let change = mirror
        .process_next(std::time::Duration::from_secs(5))
        .unwrap();
    writer.join().unwrap();

    assert_eq!(change, Some(MirrorChange::Added { key: key("a"), index: 0 }));
}

// --- Teardown ---

#[test]
fn test_teardown_is_idempotent() {
    let (query, mut mirror, recorder) = observed_mirror(MirrorConfig::default());
    query.push(todo("a", "milk")).unwrap();
    mirror.process_pending().unwrap();
    recorder.take();

    mirror.teardown();
    mirror.teardown();
    assert_eq!(mirror.state(), MirrorState::Detached);
    assert_eq!(query.subscription_count(), 0);

    query.push(todo("b", "bread")).unwrap();
    assert_eq!(mirror.process_pending().unwrap(), 0);
    assert!(recorder.take().is_empty());

    // Applied state survives teardown
    assert_eq!(keys(&mirror), vec!["a"]);
}

#[test]
fn test_drop_releases_subscription() {
    init_tracing();
    let query = Arc::new(MemoryQuery::new("todos"));
    {
        let _mirror = OrderedMirror::new(query.clone());
        assert_eq!(query.subscription_count(), 1);
    }
    assert_eq!(query.subscription_count(), 0);
}

#[test]
fn test_observer_replacement() {
    let (_query, mut mirror, first) = observed_mirror(MirrorConfig::default());

    let second = Recorder::default();
    assert!(mirror.set_observer(second.clone()).is_some());

    mirror.child_added(todo("a", "milk"), None).unwrap();
    assert!(first.take().is_empty());
    assert_eq!(second.take(), vec![Notification::Added("a".into(), 0)]);

    mirror.clear_observer();
    mirror.child_added(todo("b", "bread"), Some(&key("a"))).unwrap();
    assert!(second.take().is_empty());
}
