//! Zero-allocation diagnostics.
//!
//! Every macro formats into a fixed buffer on the caller's stack and hands the
//! finished line to a single `write(2)` on stderr. Nothing here touches
//! `core::fmt` or the heap, so the macros are usable from the preemption
//! signal handler.
//!
//! Verbosity is chosen at compile time:
//! - `no_logs`: nothing is emitted
//! - default: `sched_error!` and `sched_warn!`
//! - `log_info`, `log_debug`, `log_trace`: progressively more
//!
//! ```ignore
//! sched_debug!("resuming thread ", id);
//! sched_warn!("timer stop failed, errno=", errno);
//! ```

use crate::thread::{ThreadId, ThreadStatus};

pub const P_ERROR: &str = "[green-sched ERROR] ";
pub const P_WARN: &str = "[green-sched WARN] ";
pub const P_INFO: &str = "[green-sched INFO] ";
pub const P_DEBUG: &str = "[green-sched DEBUG] ";
pub const P_TRACE: &str = "[green-sched TRACE] ";

const LINE_CAPACITY: usize = 192;

/// A single log line being assembled. Overlong lines are truncated.
pub struct Line {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl Line {
    pub fn new(prefix: &str) -> Self {
        let mut line = Line {
            buf: [0; LINE_CAPACITY],
            len: 0,
        };
        line.push_bytes(prefix.as_bytes());
        line
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        // keep one byte for the newline
        let room = LINE_CAPACITY - 1 - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
    }

    fn push_decimal(&mut self, mut value: u64) {
        let mut digits = [0u8; 20];
        let mut i = digits.len();
        loop {
            i -= 1;
            digits[i] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        self.push_bytes(&digits[i..]);
    }

    pub fn push<T: Emit + ?Sized>(&mut self, part: &T) {
        part.emit(self);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn finish(mut self) {
        self.buf[self.len] = b'\n';
        self.len += 1;
        write_stderr(self.as_bytes());
    }
}

/// Something that can be appended to a [`Line`].
pub trait Emit {
    fn emit(&self, line: &mut Line);
}

impl Emit for str {
    fn emit(&self, line: &mut Line) {
        line.push_bytes(self.as_bytes());
    }
}

impl Emit for &str {
    fn emit(&self, line: &mut Line) {
        line.push_bytes(self.as_bytes());
    }
}

macro_rules! emit_unsigned {
    ($($ty:ty),*) => {
        $(impl Emit for $ty {
            fn emit(&self, line: &mut Line) {
                line.push_decimal(*self as u64);
            }
        })*
    };
}

emit_unsigned!(u8, u16, u32, u64, usize);

impl Emit for i32 {
    fn emit(&self, line: &mut Line) {
        if *self < 0 {
            line.push_bytes(b"-");
        }
        line.push_decimal(self.unsigned_abs() as u64);
    }
}

impl Emit for ThreadId {
    fn emit(&self, line: &mut Line) {
        line.push_bytes(b"#");
        line.push_decimal(self.get() as u64);
    }
}

impl Emit for ThreadStatus {
    fn emit(&self, line: &mut Line) {
        line.push_bytes(self.as_str().as_bytes());
    }
}

impl<T: Emit> Emit for Option<T> {
    fn emit(&self, line: &mut Line) {
        match self {
            Some(value) => value.emit(line),
            None => line.push_bytes(b"-"),
        }
    }
}

#[cfg(target_os = "linux")]
fn write_stderr(bytes: &[u8]) {
    // A short or failed write loses a diagnostic line; nothing to recover.
    unsafe {
        libc::write(2, bytes.as_ptr().cast(), bytes.len());
    }
}

#[cfg(not(target_os = "linux"))]
fn write_stderr(_bytes: &[u8]) {}

#[doc(hidden)]
#[macro_export]
macro_rules! __sched_log {
    ($prefix:expr, $($part:expr),+ $(,)?) => {{
        let mut line = $crate::logging::Line::new($prefix);
        $( line.push(&$part); )+
        line.finish();
    }};
}

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! sched_error {
    ($($part:expr),+ $(,)?) => { $crate::__sched_log!($crate::logging::P_ERROR, $($part),+) };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! sched_error {
    ($($t:tt)*) => {{}};
}

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! sched_warn {
    ($($part:expr),+ $(,)?) => { $crate::__sched_log!($crate::logging::P_WARN, $($part),+) };
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! sched_warn {
    ($($t:tt)*) => {{}};
}

#[cfg(all(feature = "log_info", not(feature = "no_logs")))]
#[macro_export]
macro_rules! sched_info {
    ($($part:expr),+ $(,)?) => { $crate::__sched_log!($crate::logging::P_INFO, $($part),+) };
}

#[cfg(not(all(feature = "log_info", not(feature = "no_logs"))))]
#[macro_export]
macro_rules! sched_info {
    ($($t:tt)*) => {{}};
}

#[cfg(all(feature = "log_debug", not(feature = "no_logs")))]
#[macro_export]
macro_rules! sched_debug {
    ($($part:expr),+ $(,)?) => { $crate::__sched_log!($crate::logging::P_DEBUG, $($part),+) };
}

#[cfg(not(all(feature = "log_debug", not(feature = "no_logs"))))]
#[macro_export]
macro_rules! sched_debug {
    ($($t:tt)*) => {{}};
}

#[cfg(all(feature = "log_trace", not(feature = "no_logs")))]
#[macro_export]
macro_rules! sched_trace {
    ($($part:expr),+ $(,)?) => { $crate::__sched_log!($crate::logging::P_TRACE, $($part),+) };
}

#[cfg(not(all(feature = "log_trace", not(feature = "no_logs"))))]
#[macro_export]
macro_rules! sched_trace {
    ($($t:tt)*) => {{}};
}
