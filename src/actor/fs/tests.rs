use std::path::PathBuf;
use std::time::Duration;

use super::debouncer::Debouncer;
use super::types::ChangeKind;
use super::watch_roots::WatchRoots;

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn instant() -> Debouncer {
    Debouncer::new(Duration::ZERO)
}

#[test]
fn test_debouncer_empty() {
    let debouncer = instant();
    assert!(!debouncer.is_ready());
    assert_eq!(debouncer.sleep_duration(), Duration::from_secs(86400));
}

#[test]
fn test_event_kinds() {
    let mut debouncer = instant();
    debouncer.add_event(&make_event(vec!["/site/src/a-html.html"], create_kind()));
    debouncer.add_event(&make_event(vec!["/site/src/b-html.html"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/site/src/c-html.html"], remove_kind()));

    let changes = debouncer.take_if_ready().unwrap();
    assert_eq!(
        changes,
        vec![
            (PathBuf::from("/site/src/a-html.html"), ChangeKind::Created),
            (PathBuf::from("/site/src/b-html.html"), ChangeKind::Modified),
            (PathBuf::from("/site/src/c-html.html"), ChangeKind::Removed),
        ]
    );
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_metadata_and_temp_files_ignored() {
    let mut debouncer = instant();
    debouncer.add_event(&make_event(vec!["/site/src/a-html.html"], metadata_kind()));
    debouncer.add_event(&make_event(vec!["/site/src/.a-html.html.swp"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/site/src/a-html.html~"], create_kind()));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

mod dedup {
    use super::*;

    fn settle(events: &[notify::EventKind]) -> Option<Vec<(PathBuf, ChangeKind)>> {
        let mut debouncer = instant();
        for kind in events {
            debouncer.add_event(&make_event(vec!["/site/src/x.js"], *kind));
        }
        debouncer.take_if_ready()
    }

    #[test]
    fn remove_then_create_is_create() {
        let changes = settle(&[remove_kind(), create_kind()]).unwrap();
        assert_eq!(changes[0].1, ChangeKind::Created);
    }

    #[test]
    fn create_then_remove_is_dropped() {
        assert!(settle(&[create_kind(), remove_kind()]).is_none());
    }

    #[test]
    fn modify_then_remove_is_remove() {
        let changes = settle(&[modify_kind(), remove_kind()]).unwrap();
        assert_eq!(changes[0].1, ChangeKind::Removed);
    }

    #[test]
    fn first_event_wins_otherwise() {
        let changes = settle(&[create_kind(), modify_kind()]).unwrap();
        assert_eq!(changes, vec![(PathBuf::from("/site/src/x.js"), ChangeKind::Created)]);
    }
}

#[test]
fn test_debounce_window() {
    let mut debouncer = Debouncer::new(Duration::from_secs(60));
    debouncer.add_event(&make_event(vec!["/site/src/a.js"], modify_kind()));
    assert!(!debouncer.is_ready());
    assert!(debouncer.sleep_duration() > Duration::from_secs(50));
    assert!(debouncer.take_if_ready().is_none());
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_roots_cover_descendants() {
    let roots = WatchRoots::new(vec![PathBuf::from("/site/src")]);
    assert!(roots.covers(&PathBuf::from("/site/src/lib/a.js")));
    assert!(!roots.covers(&PathBuf::from("/site/styles/global.css")));
}
