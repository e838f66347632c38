// The binary compiles the modules it uses directly; the attach/detach
// listener surface lives in the library (lib.rs) for embedding.
pub mod config;
pub mod detector;
pub mod inventory;
pub mod replay;
pub mod runtime;

use crate::config::{FileSettingsStore, ScannerSettings, SettingsStore};
use crate::detector::{BurstDetector, DetectorConfig, KeyTarget};
use crate::inventory::{Inventory, Product};
use crate::runtime::{scan_key, CrosstermEventSource, Runner, WedgeEvent};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
    tty::IsTty,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin, Write},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

/// keyboard-wedge barcode scanner detection for terminal inventory tools
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Listens to terminal keyboard input, tells scanner bursts apart from human typing by inter-keystroke timing, and looks detected barcodes up in a product catalog."
)]
pub struct Cli {
    /// minimum number of characters for a valid barcode
    #[clap(short = 'm', long)]
    min_length: Option<usize>,

    /// maximum average inter-key interval (ms) still treated as scanner speed
    #[clap(short = 't', long)]
    max_typing_speed: Option<u64>,

    /// idle time (ms) after the last key before the buffer is flushed
    #[clap(short = 'e', long)]
    end_timeout: Option<u64>,

    /// run a keystroke script instead of listening to the terminal
    #[clap(short = 'r', long)]
    replay: Option<PathBuf>,

    /// JSON product list to load into the in-memory catalog
    #[clap(short = 'c', long)]
    catalog: Option<PathBuf>,
}

impl Cli {
    /// Settings file first, CLI flags override.
    fn detector_config(&self, settings: &ScannerSettings) -> DetectorConfig {
        let mut config = DetectorConfig::from(settings);
        if let Some(v) = self.min_length {
            config.min_length = v;
        }
        if let Some(v) = self.max_typing_speed {
            config.max_typing_speed_ms = v;
        }
        if let Some(v) = self.end_timeout {
            config.end_timeout_ms = v;
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = FileSettingsStore::new().load();
    let config = cli.detector_config(&settings);

    let mut inventory = match &cli.catalog {
        Some(path) => {
            let bytes = fs::read(path)?;
            let products: Vec<Product> = serde_json::from_slice(&bytes)?;
            Inventory::with_products(products)?
        }
        None => Inventory::new(),
    };

    if let Some(path) = &cli.replay {
        let text = fs::read_to_string(path)?;
        let steps = replay::parse_script(&text)?;
        for code in replay::run_script(&steps, config) {
            println!("scan: {code}");
            if cli.catalog.is_some() {
                println!("{}", lookup_line(&inventory, &code));
            }
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::Io,
            "stdin must be a tty (use --replay for headless runs)",
        )
        .exit();
    }

    enable_raw_mode()?;
    let result = run_scan_loop(config, &mut inventory);
    disable_raw_mode()?;
    result
}

fn lookup_line(inventory: &Inventory, code: &str) -> String {
    match inventory.find(code) {
        Some(p) => format!("  {} ({} in stock)", p.name, p.quantity),
        None => "  unknown barcode".to_string(),
    }
}

fn say(msg: &str) {
    // Raw mode needs explicit carriage returns.
    print!("{msg}\r\n");
    let _ = io::stdout().flush();
}

fn report_scan(inventory: &Inventory, code: &str) {
    say(&format!("scan: {code}"));
    say(&lookup_line(inventory, code));
}

fn run_scan_loop(config: DetectorConfig, inventory: &mut Inventory) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), Duration::from_millis(50));
    let mut detector = BurstDetector::new(config);
    let epoch = Instant::now();
    let mut manual_entry: Option<String> = None;

    say("keywedge listening: scan a barcode, Tab for manual entry, Backspace to abort a scan, Esc to quit");

    loop {
        let now_ms = epoch.elapsed().as_millis() as u64;
        let deadline = detector
            .deadline()
            .map(|d| Duration::from_millis(d.saturating_sub(now_ms)));

        match runner.step(deadline) {
            WedgeEvent::Tick => {
                let now_ms = epoch.elapsed().as_millis() as u64;
                if let Some(code) = detector.poll(now_ms) {
                    report_scan(inventory, &code);
                }
            }
            WedgeEvent::Resize => {}
            WedgeEvent::Key(key) => {
                let now_ms = epoch.elapsed().as_millis() as u64;

                if key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c')
                {
                    break;
                }

                match key.code {
                    KeyCode::Esc => break,
                    KeyCode::Tab => {
                        if manual_entry.take().is_some() {
                            say("manual entry cancelled");
                        } else {
                            // Abort any half-scanned burst before handing the
                            // keyboard to the entry line.
                            detector.clear();
                            manual_entry = Some(String::new());
                            say("manual entry: type a barcode, Enter to look up, Tab to cancel");
                        }
                        continue;
                    }
                    _ => {}
                }

                if let Some(entry) = manual_entry.as_mut() {
                    // Keystrokes aimed at the entry line are invisible to the
                    // detector, like typing into a form field.
                    let _ = detector.on_key(scan_key(&key), KeyTarget::TextEntry, now_ms);
                    match key.code {
                        KeyCode::Char(c) => entry.push(c),
                        KeyCode::Backspace => {
                            entry.pop();
                        }
                        KeyCode::Enter => {
                            let code = manual_entry.take().unwrap_or_default();
                            if code.is_empty() {
                                say("manual entry cancelled");
                            } else {
                                say(&format!("lookup: {code}"));
                                say(&lookup_line(inventory, &code));
                            }
                        }
                        _ => {}
                    }
                } else {
                    match key.code {
                        KeyCode::Backspace => detector.clear(),
                        _ => {
                            if let Some(code) =
                                detector.on_key(scan_key(&key), KeyTarget::Global, now_ms)
                            {
                                report_scan(inventory, &code);
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
