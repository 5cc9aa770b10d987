use std::cell::RefCell;
use std::io::{self, Write};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Fatal,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Fatal => "fatal",
        }
    }
}

/// Receives the (severity, message) events emitted by a template session.
pub trait LogSink {
    fn log(&self, severity: Severity, message: &str);

    fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    fn fatal(&self, message: &str) {
        self.log(Severity::Fatal, message);
    }
}

pub struct ConsoleLog {
    enabled: bool,
    t0: Instant,
}

impl ConsoleLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }
}

impl LogSink for ConsoleLog {
    fn log(&self, severity: Severity, message: &str) {
        if !self.enabled && severity == Severity::Info {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {}: {message}", severity.label());
    }
}

/// Keeps every entry; handy for asserting on what a session reported.
#[derive(Default)]
pub struct MemoryLog {
    entries: RefCell<Vec<(Severity, String)>>,
}

impl MemoryLog {
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries.borrow().clone()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, severity: Severity, message: &str) {
        self.entries.borrow_mut().push((severity, message.to_string()));
    }
}

impl<T: LogSink + ?Sized> LogSink for std::rc::Rc<T> {
    fn log(&self, severity: Severity, message: &str) {
        (**self).log(severity, message);
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{fmt_elapsed, LogSink, MemoryLog, Severity};

    #[test]
    fn elapsed_format() {
        assert_eq!(fmt_elapsed(65.2), "01:05");
        assert_eq!(fmt_elapsed(3725.0), "01:02:05");
    }

    #[test]
    fn memory_log_records_in_order() {
        let log = MemoryLog::default();
        log.info("a");
        log.fatal("b");
        assert_eq!(
            log.entries(),
            vec![(Severity::Info, "a".to_string()), (Severity::Fatal, "b".to_string())]
        );
    }

    #[test]
    fn shared_sink_sees_session_and_caller_lines() {
        use std::rc::Rc;

        let log = Rc::new(MemoryLog::default());
        let session_side: Box<dyn LogSink> = Box::new(Rc::clone(&log));
        session_side.fatal("from session");
        log.info("from caller");
        assert_eq!(
            log.entries(),
            vec![
                (Severity::Fatal, "from session".to_string()),
                (Severity::Info, "from caller".to_string())
            ]
        );
    }
}
