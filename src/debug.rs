//! Real-time safe trace logging.
//!
//! `vx_log!` is usable from the capture callback and the frame worker: with
//! the `debug` feature it formats into a fixed-size entry and pushes it into a
//! bounded ring without blocking. If the ring is full, or another thread holds
//! the write side, the message is dropped. [`drain`] runs on the control
//! thread and writes the backlog to `/tmp/vxavatar.log` and to `log::trace!`.
//! Without the feature the macro compiles to nothing.

use std::fmt;

#[cfg(feature = "debug")]
pub mod logger {
    use ringbuf::{Consumer, Producer, RingBuffer};
    use std::fmt;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, OnceLock};

    const LOG_CAP: usize = 256;
    const LOG_MSG_MAX: usize = 256;
    const LOG_PATH: &str = "/tmp/vxavatar.log";

    #[derive(Copy, Clone)]
    struct LogEntry {
        len: u16,
        bytes: [u8; LOG_MSG_MAX],
    }

    impl fmt::Write for LogEntry {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let used = self.len as usize;
            let n = s.len().min(LOG_MSG_MAX - used);
            self.bytes[used..used + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len += n as u16;
            Ok(())
        }
    }

    struct LogRing {
        tx: Mutex<Producer<LogEntry>>,
        rx: Mutex<Consumer<LogEntry>>,
    }

    static RING: OnceLock<LogRing> = OnceLock::new();
    static ENABLED: AtomicBool = AtomicBool::new(false);

    pub fn init_logger() {
        RING.get_or_init(|| {
            let (tx, rx) = RingBuffer::<LogEntry>::new(LOG_CAP).split();
            LogRing {
                tx: Mutex::new(tx),
                rx: Mutex::new(rx),
            }
        });
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn log_args(args: fmt::Arguments) {
        if !ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let Some(ring) = RING.get() else { return };
        let mut entry = LogEntry {
            len: 0,
            bytes: [0; LOG_MSG_MAX],
        };
        let _ = fmt::write(&mut entry, args);
        // try_lock: a contended writer drops its message instead of waiting.
        if let Ok(mut tx) = ring.tx.try_lock() {
            let _ = tx.push(entry);
        }
    }

    pub fn drain_to_file() {
        if !ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let Some(ring) = RING.get() else { return };
        let Ok(mut rx) = ring.rx.lock() else { return };
        if rx.is_empty() {
            return;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(LOG_PATH).ok();

        while let Some(entry) = rx.pop() {
            let msg = std::str::from_utf8(&entry.bytes[..entry.len as usize]).unwrap_or("<invalid>");
            log::trace!(target: "vxavatar::rt", "{}", msg);
            if let Some(f) = file.as_mut() {
                let _ = writeln!(f, "{}", msg);
            }
        }
    }
}

/// Enable the trace ring. No-op without the `debug` feature.
pub fn init() {
    #[cfg(feature = "debug")]
    logger::init_logger();
}

/// Flush queued trace messages. Call from the control thread.
pub fn drain() {
    #[cfg(feature = "debug")]
    logger::drain_to_file();
}

#[doc(hidden)]
#[cfg(feature = "debug")]
pub fn vx_log_inner(args: fmt::Arguments) {
    logger::log_args(args);
}

#[doc(hidden)]
#[cfg(not(feature = "debug"))]
pub fn vx_log_inner(_args: fmt::Arguments) {}

#[macro_export]
macro_rules! vx_log {
    ($($arg:tt)*) => {
        $crate::debug::vx_log_inner(format_args!($($arg)*))
    };
}
