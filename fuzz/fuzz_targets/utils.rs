#![allow(dead_code)]

use std::str;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

pub const MAX_INPUT_SIZE: usize = 256 * 1024;

pub const TIMEOUT: Duration = Duration::from_secs(1);

/// Returns a UTF-8 view of `data` truncated to `MAX_INPUT_SIZE`.
///
/// If the truncated data is not valid UTF-8, only up to 3 bytes are trimmed to recover
/// from cutting a multibyte codepoint.
#[inline]
pub fn truncate_utf8(data: &[u8]) -> Option<&str> {
    let cap = data.len().min(MAX_INPUT_SIZE);
    for trim in 0..=3 {
        if cap < trim {
            break;
        }
        if let Ok(text) = str::from_utf8(&data[..cap - trim]) {
            return Some(text);
        }
    }
    None
}

/// Runs each input on a worker thread so hangs surface as a timeout panic.
pub struct Runner<T> {
    name: &'static str,
    input_tx: mpsc::SyncSender<T>,
    output_rx: Mutex<mpsc::Receiver<()>>,
}

impl<T: Send + 'static> Runner<T> {
    pub fn new(name: &'static str, run_one: fn(T)) -> Self {
        let (input_tx, input_rx) = mpsc::sync_channel::<T>(0);
        let (output_tx, output_rx) = mpsc::sync_channel::<()>(0);

        std::thread::spawn(move || {
            for input in input_rx {
                run_one(input);
                let _ = output_tx.send(());
            }
        });

        Self {
            name,
            input_tx,
            output_rx: Mutex::new(output_rx),
        }
    }

    pub fn run(&self, input: T) {
        let name = self.name;
        self.input_tx
            .send(input)
            .unwrap_or_else(|_| panic!("{name} worker thread exited"));

        let rx = self
            .output_rx
            .lock()
            .unwrap_or_else(|_| panic!("{name} worker receiver poisoned"));
        match rx.recv_timeout(TIMEOUT) {
            Ok(()) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => panic!("{name} fuzz target timed out"),
            Err(mpsc::RecvTimeoutError::Disconnected) => panic!("{name} worker thread panicked"),
        }
    }
}
