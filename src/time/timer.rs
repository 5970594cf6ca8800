use std::fmt;
use std::time::{Duration, Instant};

/// A simple wall-clock timer for one pipeline phase.
pub struct Timer {
    start: Instant,
    title: String,
}

impl Timer {
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string(), start: Instant::now() }
    }

    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Restarts the timer and gives it a new title.
    pub fn restart(&mut self, title: &str) {
        self.title = title.to_string();
        self.start = Instant::now();
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.elapsed();
        if elapsed.as_millis() >= 1 {
            write!(f, "{:<24} {:>8.3} ms", self.title, elapsed.as_secs_f64() * 1e3)
        } else {
            write!(f, "{:<24} {:>8.3} µs", self.title, elapsed.as_secs_f64() * 1e6)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_reports_title() {
        let timer = Timer::new("parse");
        assert!(timer.to_string().contains("parse"));
        assert!(timer.elapsed() >= Duration::ZERO);
    }
}
