use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use keywedge::detector::DetectorConfig;
use keywedge::listener::{attach, ScannerHandle};
use keywedge::runtime::{TestEventSource, WedgeEvent};

// Sends are best-effort: after a detach the worker (and its receiver) is
// gone, and that is exactly what some tests exercise.
fn send_key(tx: &Sender<WedgeEvent>, c: char) {
    let _ = tx.send(WedgeEvent::Key(KeyEvent::new(
        KeyCode::Char(c),
        KeyModifiers::NONE,
    )));
}

fn send_enter(tx: &Sender<WedgeEvent>) {
    let _ = tx.send(WedgeEvent::Key(KeyEvent::new(
        KeyCode::Enter,
        KeyModifiers::NONE,
    )));
}

fn send_burst(tx: &Sender<WedgeEvent>, code: &str) {
    for c in code.chars() {
        send_key(tx, c);
    }
    send_enter(tx);
}

/// Worker-friendly config: a long idle timeout keeps scheduler pauses from
/// splitting a burst that the test sends in one go.
fn test_config() -> DetectorConfig {
    DetectorConfig {
        end_timeout_ms: 2000,
        ..DetectorConfig::default()
    }
}

fn attach_collecting(
    config: DetectorConfig,
) -> (Sender<WedgeEvent>, Arc<Mutex<Vec<String>>>, ScannerHandle) {
    let (tx, rx) = mpsc::channel();
    let codes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&codes);
    let handle = attach(
        TestEventSource::new(rx),
        config,
        Box::new(move |code| sink.lock().unwrap().push(code)),
    );
    (tx, codes, handle)
}

fn wait_for_codes(codes: &Arc<Mutex<Vec<String>>>, n: usize, budget: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < budget {
        if codes.lock().unwrap().len() >= n {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    codes.lock().unwrap().len() >= n
}

/// Long enough for the worker's control poll to run a few times.
fn settle() {
    thread::sleep(Duration::from_millis(150));
}

#[test]
fn attached_listener_fires_callback_once_per_scan() {
    let (tx, codes, mut handle) = attach_collecting(test_config());

    send_burst(&tx, "789123456789");
    assert!(wait_for_codes(&codes, 1, Duration::from_secs(2)));

    send_burst(&tx, "ABCDEF123456");
    assert!(wait_for_codes(&codes, 2, Duration::from_secs(2)));

    settle();
    assert_eq!(
        *codes.lock().unwrap(),
        vec!["789123456789".to_string(), "ABCDEF123456".to_string()]
    );
    handle.detach();
}

#[test]
fn clear_buffer_aborts_an_in_progress_scan() {
    let (tx, codes, handle) = attach_collecting(test_config());

    for c in "789123".chars() {
        send_key(&tx, c);
    }
    settle();
    handle.clear_buffer();
    settle();

    // The remaining six characters alone are below min_length.
    for c in "456789".chars() {
        send_key(&tx, c);
    }
    send_enter(&tx);
    settle();

    assert!(codes.lock().unwrap().is_empty());
    drop(handle);
}

#[test]
fn text_entry_mode_suppresses_detection() {
    let (tx, codes, handle) = attach_collecting(test_config());

    handle.set_text_entry(true);
    settle();
    send_burst(&tx, "789123456789");
    settle();
    assert!(codes.lock().unwrap().is_empty());

    handle.set_text_entry(false);
    settle();
    send_burst(&tx, "789123456789");
    assert!(wait_for_codes(&codes, 1, Duration::from_secs(2)));
}

#[test]
fn detach_is_idempotent_and_stops_callbacks() {
    let (tx, codes, mut handle) = attach_collecting(test_config());

    send_burst(&tx, "789123456789");
    assert!(wait_for_codes(&codes, 1, Duration::from_secs(2)));

    handle.detach();
    assert!(!handle.is_attached());
    handle.detach();

    // Events sent after detach go nowhere.
    send_burst(&tx, "ABCDEF123456");
    settle();
    assert_eq!(codes.lock().unwrap().len(), 1);
}

#[test]
fn dropping_the_handle_detaches() {
    let (tx, codes, handle) = attach_collecting(test_config());
    drop(handle);

    send_burst(&tx, "789123456789");
    settle();
    assert!(codes.lock().unwrap().is_empty());
}

#[test]
fn two_listeners_are_independent() {
    let (tx_a, codes_a, _handle_a) = attach_collecting(test_config());
    let (tx_b, codes_b, _handle_b) = attach_collecting(test_config());

    send_burst(&tx_a, "789123456789");
    assert!(wait_for_codes(&codes_a, 1, Duration::from_secs(2)));

    // Listener B saw nothing; its buffer is untouched by A's burst.
    settle();
    assert!(codes_b.lock().unwrap().is_empty());

    send_burst(&tx_b, "ABCDEF123456");
    assert!(wait_for_codes(&codes_b, 1, Duration::from_secs(2)));
    assert_eq!(*codes_b.lock().unwrap(), vec!["ABCDEF123456".to_string()]);
    assert_eq!(codes_a.lock().unwrap().len(), 1);
}
