use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind};

use crate::detector::ScanKey;

/// Unified event type consumed by the scan loop
#[derive(Clone, Debug)]
pub enum WedgeEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Map a terminal key event onto the detector's vocabulary.
pub fn scan_key(key: &KeyEvent) -> ScanKey {
    match key.code {
        KeyCode::Char(c) => ScanKey::Char(c),
        KeyCode::Enter => ScanKey::Enter,
        _ => ScanKey::Other,
    }
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait WedgeEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<WedgeEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<WedgeEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            match event::read() {
                // Release/repeat events would double-count keystrokes on
                // terminals that report them.
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if tx.send(WedgeEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if tx.send(WedgeEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WedgeEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<WedgeEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<WedgeEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<WedgeEvent>) -> Self {
        Self { rx }
    }
}

impl WedgeEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<WedgeEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the scan loop one event at a time.
///
/// Unlike a fixed ticker, the wait is bounded by the detector's pending flush
/// deadline when one exists, so idle flushes fire close to on time.
pub struct Runner<E: WedgeEventSource> {
    event_source: E,
    idle_wait: Duration,
}

impl<E: WedgeEventSource> Runner<E> {
    pub fn new(event_source: E, idle_wait: Duration) -> Self {
        Self {
            event_source,
            idle_wait,
        }
    }

    /// Blocks until the next event, `deadline`, or the idle wait, whichever
    /// comes first; returns Tick on timeout.
    pub fn step(&self, deadline: Option<Duration>) -> WedgeEvent {
        let timeout = match deadline {
            Some(d) => d.min(self.idle_wait),
            None => self.idle_wait,
        };
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                WedgeEvent::Tick
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let runner = Runner::new(es, Duration::from_millis(1));

        // With no events available, step should yield Tick
        let ev = runner.step(None);
        match ev {
            WedgeEvent::Tick => {}
            _ => panic!("expected Tick on timeout"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(WedgeEvent::Resize).unwrap();
        let es = TestEventSource::new(rx);
        let runner = Runner::new(es, Duration::from_millis(10));

        match runner.step(None) {
            WedgeEvent::Resize => {}
            _ => panic!("expected Resize event"),
        }
    }

    #[test]
    fn deadline_shortens_the_wait() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let runner = Runner::new(es, Duration::from_secs(60));

        let start = std::time::Instant::now();
        match runner.step(Some(Duration::from_millis(5))) {
            WedgeEvent::Tick => {}
            _ => panic!("expected Tick on deadline expiry"),
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn scan_key_maps_terminal_codes() {
        let ch = KeyEvent::new(KeyCode::Char('7'), KeyModifiers::NONE);
        assert_eq!(scan_key(&ch), ScanKey::Char('7'));

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(scan_key(&enter), ScanKey::Enter);

        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(scan_key(&esc), ScanKey::Other);
    }
}
