// Tests for batch module
// Worker pool sizing, callbacks, failures, cancellation, and lifecycle

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use c4id::c4::{BatchConfig, BatchState, C4Error, C4Queue, CancelToken, DEFAULT_MAX_WORKERS};
use tempfile::tempdir;

use crate::common::{create_all_fixtures, create_fixture, ID_10KB};

fn fast_config() -> BatchConfig {
    BatchConfig::new().with_poll_interval(Duration::from_millis(10))
}

#[test]
fn test_batch_hashes_every_file() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());

    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&finished);
    let mut queue = C4Queue::with_config(fast_config().with_max_workers(2))
        .unwrap()
        .with_finished_callback(move |id| sink.lock().unwrap().push(id.id().to_string()));

    queue
        .submit(fixtures.iter().map(|(path, _)| path.clone()))
        .unwrap();
    queue.start().unwrap();
    assert_eq!(queue.worker_count(), 2);

    let stats = queue.join().unwrap();
    assert_eq!(queue.state(), BatchState::Joined);
    assert_eq!(stats.files_submitted, 4);
    assert_eq!(stats.files_processed, 4);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.files_abandoned, 0);
    assert_eq!(stats.total_bytes, (10 + 20 + 30 + 40) * 1024 + 4);
    assert!(!stats.cancelled);

    let results = queue.results();
    assert_eq!(results.len(), 4);
    for (path, expected) in &fixtures {
        assert_eq!(results[path].id().as_str(), *expected);
    }

    let mut seen = finished.lock().unwrap().clone();
    let mut expected: Vec<String> = fixtures.iter().map(|(_, id)| id.to_string()).collect();
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_worker_count_bounded_by_file_count() {
    let dir = tempdir().unwrap();
    let a = create_fixture(dir.path(), 10);
    let b = create_fixture(dir.path(), 20);

    let mut queue = C4Queue::with_config(fast_config()).unwrap();
    assert_eq!(queue.config().max_workers, DEFAULT_MAX_WORKERS);
    queue.submit([a, b]).unwrap();
    queue.start().unwrap();
    assert_eq!(queue.worker_count(), 2);
    queue.join().unwrap();
}

#[test]
fn test_empty_batch_joins_immediately() {
    let mut queue = C4Queue::with_config(fast_config()).unwrap();
    queue.start().unwrap();
    assert_eq!(queue.worker_count(), 0);

    let stats = queue.join().unwrap();
    assert_eq!(stats.files_submitted, 0);
    assert!(queue.results().is_empty());
}

#[test]
fn test_failed_file_reported_and_others_continue() {
    let dir = tempdir().unwrap();
    let good = create_fixture(dir.path(), 10);
    let missing = dir.path().join("missing.txt");

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let mut queue = C4Queue::with_config(fast_config().with_max_workers(2))
        .unwrap()
        .with_error_callback(move |path, e: &C4Error| {
            assert!(e.is_io());
            sink.lock().unwrap().push(path.to_path_buf());
        });

    queue.submit([missing.clone(), good.clone()]).unwrap();
    queue.start().unwrap();
    let stats = queue.join().unwrap();

    assert_eq!(stats.files_processed, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(*errors.lock().unwrap(), vec![missing.clone()]);
    assert!(queue.get(&missing).is_none());
    assert_eq!(queue.get(&good).unwrap().id().as_str(), ID_10KB);
}

#[test]
fn test_started_callback_sees_every_path() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());

    let started = Arc::new(Mutex::new(Vec::<PathBuf>::new()));
    let sink = Arc::clone(&started);
    let mut queue = C4Queue::with_config(fast_config().with_max_workers(3))
        .unwrap()
        .with_started_callback(move |path| sink.lock().unwrap().push(path.to_path_buf()));

    queue.submit(fixtures.iter().map(|(p, _)| p.clone())).unwrap();
    queue.start().unwrap();
    queue.join().unwrap();

    let mut started = started.lock().unwrap().clone();
    started.sort();
    let mut expected: Vec<PathBuf> = fixtures.into_iter().map(|(p, _)| p).collect();
    expected.sort();
    assert_eq!(started, expected);
}

#[test]
fn test_stop_before_start_abandons_everything() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());

    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let mut queue = C4Queue::with_config(fast_config())
        .unwrap()
        .with_finished_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    queue.submit(fixtures.into_iter().map(|(p, _)| p)).unwrap();
    queue.stop();
    assert!(queue.is_cancelling());
    queue.start().unwrap();
    let stats = queue.join().unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.files_processed, 0);
    assert_eq!(stats.files_abandoned, 4);
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert!(queue.results().is_empty());
    assert!(!queue.is_cancelling());
}

#[test]
fn test_cancel_from_callback_stops_the_batch() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());

    // The first worker to pick up a file pulls the plug before hashing it.
    let token = CancelToken::new();
    let trigger = token.clone();
    let mut queue = C4Queue::with_config(fast_config().with_max_workers(1))
        .unwrap()
        .with_cancel_token(token.clone())
        .with_started_callback(move |_| trigger.cancel());

    queue.submit(fixtures.into_iter().map(|(p, _)| p)).unwrap();
    queue.start().unwrap();
    let stats = queue.join().unwrap();

    assert!(token.is_cancelled());
    assert!(stats.cancelled);
    assert_eq!(stats.files_processed, 0);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.files_abandoned, 4);
}

#[test]
fn test_stop_handle_from_another_thread() {
    let dir = tempdir().unwrap();
    let path = create_fixture(dir.path(), 10);

    let mut queue = C4Queue::with_config(fast_config()).unwrap();
    let handle = queue.stop_handle();
    queue.submit([path]).unwrap();

    std::thread::spawn(move || handle.cancel()).join().unwrap();
    queue.start().unwrap();
    let stats = queue.join().unwrap();
    assert!(stats.cancelled);
}

#[test]
fn test_join_returns_when_every_worker_panics() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());

    let mut queue = C4Queue::with_config(fast_config().with_max_workers(2))
        .unwrap()
        .with_finished_callback(|_| panic!("finished callback failed"));
    queue
        .submit(fixtures.iter().map(|(path, _)| path.clone()))
        .unwrap();
    queue.start().unwrap();

    let (tx, rx) = bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(queue.join());
    });
    let stats = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("join did not return after all workers died")
        .unwrap();

    // Each worker records one result, then dies in the callback
    assert_eq!(stats.files_processed, 2);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.files_abandoned, 2);
    assert!(!stats.cancelled);
}

thread_local! {
    static EXIT_SIGNAL: RefCell<Option<ExitSignal>> = const { RefCell::new(None) };
}

/// Sends once when the owning thread exits.
struct ExitSignal(Sender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

#[test]
fn test_cancel_during_join_interrupts_hash_in_flight() {
    let dir = tempdir().unwrap();
    let path = create_fixture(dir.path(), 4096);

    let (started_tx, started_rx) = bounded::<()>(1);
    let (exited_tx, exited_rx) = bounded::<()>(1);
    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);

    let mut queue = C4Queue::with_config(fast_config().with_max_workers(1).with_chunk_size(1))
        .unwrap()
        .with_started_callback(move |_| {
            let signal = ExitSignal(exited_tx.clone());
            EXIT_SIGNAL.with(|slot| *slot.borrow_mut() = Some(signal));
            let _ = started_tx.send(());
        })
        .with_finished_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    queue.submit([path]).unwrap();

    let handle = queue.stop_handle();
    let canceller = std::thread::spawn(move || {
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.cancel();
    });

    queue.start().unwrap();
    let stats = queue.join().unwrap();
    canceller.join().unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.files_processed, 0);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(stats.files_abandoned, 1);
    assert!(queue.results().is_empty());
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    // The worker thread is gone once join returns
    assert!(exited_rx.try_recv().is_ok());
}

#[test]
fn test_submit_while_running_adds_workers() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());
    let mut paths = fixtures.iter().map(|(p, _)| p.clone());

    let mut queue = C4Queue::with_config(fast_config().with_max_workers(4)).unwrap();
    queue.submit(paths.next()).unwrap();
    queue.start().unwrap();
    assert_eq!(queue.worker_count(), 1);

    queue.submit(paths).unwrap();
    assert_eq!(queue.worker_count(), 4);

    let stats = queue.join().unwrap();
    assert_eq!(stats.files_processed, 4);
    assert_eq!(queue.results().len(), 4);
}

#[test]
fn test_progress_callback_values() {
    let dir = tempdir().unwrap();
    let fixtures = create_all_fixtures(dir.path());

    let percents = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&percents);
    let mut queue = C4Queue::with_config(fast_config().with_max_workers(2))
        .unwrap()
        .with_progress_callback(move |p| sink.lock().unwrap().push(p));

    queue.submit(fixtures.into_iter().map(|(p, _)| p)).unwrap();
    queue.start().unwrap();
    queue.join().unwrap();

    let percents = percents.lock().unwrap();
    assert!(percents.iter().all(|p| (0.0..=100.0).contains(p)));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_lifecycle_errors() {
    let mut queue = C4Queue::with_config(fast_config()).unwrap();
    assert!(matches!(
        queue.join(),
        Err(C4Error::InvalidState { state: BatchState::Idle, .. })
    ));

    queue.start().unwrap();
    assert!(matches!(queue.start(), Err(C4Error::InvalidState { .. })));
    assert!(matches!(queue.reset(), Err(C4Error::InvalidState { .. })));
    queue.join().unwrap();

    let err = queue.submit(["late.txt"]).unwrap_err();
    assert!(err.to_string().contains("joined"));
}

#[test]
fn test_reset_allows_reuse() {
    let dir = tempdir().unwrap();
    let a = create_fixture(dir.path(), 10);
    let b = create_fixture(dir.path(), 20);

    let finished = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finished);
    let mut queue = C4Queue::with_config(fast_config())
        .unwrap()
        .with_finished_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    queue.submit([a]).unwrap();
    queue.start().unwrap();
    queue.stop();
    queue.join().unwrap();

    queue.reset().unwrap();
    assert_eq!(queue.state(), BatchState::Idle);
    assert!(queue.files().is_empty());
    assert!(!queue.is_cancelling());

    queue.submit([b.clone()]).unwrap();
    queue.start().unwrap();
    let stats = queue.join().unwrap();
    assert_eq!(stats.files_processed, 1);
    assert!(queue.get(&b).is_some());
    assert!(finished.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_take_results_empties_the_map() {
    let dir = tempdir().unwrap();
    let a = create_fixture(dir.path(), 10);

    let mut queue = C4Queue::with_config(fast_config()).unwrap();
    queue.submit([a]).unwrap();
    queue.start().unwrap();
    queue.join().unwrap();

    assert_eq!(queue.take_results().len(), 1);
    assert!(queue.results().is_empty());
}

#[test]
fn test_config_validation() {
    for config in [
        BatchConfig::new().with_max_workers(0),
        BatchConfig::new().with_chunk_size(0),
        BatchConfig::new().with_poll_interval(Duration::ZERO),
    ] {
        assert!(matches!(
            C4Queue::with_config(config),
            Err(C4Error::InvalidConfiguration { .. })
        ));
    }
    assert!(BatchConfig::default().validate().is_ok());
}

#[test]
fn test_stats_serialize_duration_as_seconds() {
    let mut queue = C4Queue::with_config(fast_config()).unwrap();
    queue.start().unwrap();
    let stats = queue.join().unwrap();

    let value = serde_json::to_value(&stats).unwrap();
    assert!(value["duration"].is_f64());
    assert_eq!(value["files_submitted"], 0);
    assert_eq!(value["cancelled"], false);
}
