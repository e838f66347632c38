use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::detector::{BurstDetector, DetectorConfig, KeyTarget};
use crate::runtime::{scan_key, WedgeEvent, WedgeEventSource};

/// Invoked once per burst that classified as scanner input.
pub type BarcodeCallback = Box<dyn FnMut(String) + Send>;

/// How long the worker sleeps between control-channel checks while no flush
/// deadline is pending.
const CONTROL_POLL: Duration = Duration::from_millis(25);

enum Control {
    Clear,
    TextEntry(bool),
    Detach,
}

/// Handle to an attached scanner listener.
///
/// Each handle owns exactly one worker thread and one detector; handles are
/// fully independent of each other. Dropping the handle detaches.
pub struct ScannerHandle {
    control: Option<Sender<Control>>,
    worker: Option<JoinHandle<()>>,
}

/// Begin listening for scanner bursts on `source`.
///
/// With `enabled: false` no worker is spawned and the returned handle is
/// inert, mirroring a listener that was never registered.
pub fn attach<E: WedgeEventSource>(
    source: E,
    config: DetectorConfig,
    on_barcode: BarcodeCallback,
) -> ScannerHandle {
    if !config.enabled {
        debug!("scanner listener disabled; not attaching");
        return ScannerHandle {
            control: None,
            worker: None,
        };
    }

    let (control_tx, control_rx) = mpsc::channel();
    let worker = std::thread::spawn(move || run_worker(source, config, on_barcode, control_rx));

    ScannerHandle {
        control: Some(control_tx),
        worker: Some(worker),
    }
}

impl ScannerHandle {
    pub fn is_attached(&self) -> bool {
        self.worker.is_some()
    }

    /// Drop any in-progress burst and cancel the pending idle flush.
    pub fn clear_buffer(&self) {
        if let Some(control) = &self.control {
            let _ = control.send(Control::Clear);
        }
    }

    /// Tell the listener whether a text-entry widget owns the keyboard.
    /// While set, keystrokes are ignored by the detector.
    pub fn set_text_entry(&self, active: bool) {
        if let Some(control) = &self.control {
            let _ = control.send(Control::TextEntry(active));
        }
    }

    /// Stop listening. Idempotent; once this returns the worker has exited
    /// and the callback can no longer fire.
    pub fn detach(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(Control::Detach);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

fn run_worker<E: WedgeEventSource>(
    source: E,
    config: DetectorConfig,
    mut on_barcode: BarcodeCallback,
    control: Receiver<Control>,
) {
    let mut detector = BurstDetector::new(config);
    let mut text_entry = false;
    let epoch = Instant::now();

    loop {
        let now_ms = epoch.elapsed().as_millis() as u64;
        let timeout = match detector.deadline() {
            Some(deadline) => Duration::from_millis(deadline.saturating_sub(now_ms)).min(CONTROL_POLL),
            None => CONTROL_POLL,
        };

        let event = source.recv_timeout(timeout);

        // Control messages take effect before whatever just arrived.
        loop {
            match control.try_recv() {
                Ok(Control::Clear) => detector.clear(),
                Ok(Control::TextEntry(active)) => text_entry = active,
                Ok(Control::Detach) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => break,
            }
        }

        let now_ms = epoch.elapsed().as_millis() as u64;
        match event {
            Ok(WedgeEvent::Key(key)) => {
                // A key that sat in the channel past the deadline must not
                // join the burst the idle timer should already have flushed.
                if let Some(code) = detector.poll(now_ms) {
                    on_barcode(code);
                }
                let target = if text_entry {
                    KeyTarget::TextEntry
                } else {
                    KeyTarget::Global
                };
                if let Some(code) = detector.on_key(scan_key(&key), target, now_ms) {
                    on_barcode(code);
                }
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                if let Some(code) = detector.poll(now_ms) {
                    on_barcode(code);
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
