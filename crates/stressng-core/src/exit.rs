//! Worker exit status taxonomy

use core::fmt;

/// Outcome of one worker instance, carried as its process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Failure = 1,
    /// Ran, but could not complete its work
    NotSuccess = 2,
    /// Skipped: a resource it needs was unavailable
    NoResource = 3,
    /// Skipped: not supported on this system
    NotImplemented = 4,
    /// Terminated by a signal
    Signaled = 5,
    /// Exited through an unexpected path
    BySysExit = 6,
    /// Finished, but its counters cannot be trusted
    MetricsUntrustworthy = 7,
}

impl ExitStatus {
    #[inline]
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => ExitStatus::Success,
            1 => ExitStatus::Failure,
            2 => ExitStatus::NotSuccess,
            3 => ExitStatus::NoResource,
            4 => ExitStatus::NotImplemented,
            5 => ExitStatus::Signaled,
            6 => ExitStatus::BySysExit,
            7 => ExitStatus::MetricsUntrustworthy,
            _ => ExitStatus::Failure,
        }
    }

    /// Skipped instances do not count towards aggregation or pass/fail
    #[inline]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, ExitStatus::NoResource | ExitStatus::NotImplemented)
    }

    const fn severity(&self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::NotImplemented => 1,
            ExitStatus::NoResource => 2,
            ExitStatus::NotSuccess => 3,
            ExitStatus::MetricsUntrustworthy => 4,
            ExitStatus::BySysExit => 5,
            ExitStatus::Signaled => 6,
            ExitStatus::Failure => 7,
        }
    }

    /// Keep whichever of the two statuses is worse
    #[inline]
    pub fn escalate(self, other: ExitStatus) -> ExitStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Combine per-instance statuses into one stressor-class status
    ///
    /// Skipped instances only matter when every instance was skipped.
    pub fn combine<I: IntoIterator<Item = ExitStatus>>(statuses: I) -> ExitStatus {
        let mut ran = None;
        let mut skipped = None;
        for status in statuses {
            let acc = if status.is_skipped() { &mut skipped } else { &mut ran };
            *acc = Some(acc.map_or(status, |s: ExitStatus| s.escalate(status)));
        }
        ran.or(skipped).unwrap_or(ExitStatus::Success)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitStatus::Success => "passed",
            ExitStatus::Failure => "failed",
            ExitStatus::NotSuccess => "not successful",
            ExitStatus::NoResource => "skipped (no resources)",
            ExitStatus::NotImplemented => "skipped (not implemented)",
            ExitStatus::Signaled => "killed by signal",
            ExitStatus::BySysExit => "exited unexpectedly",
            ExitStatus::MetricsUntrustworthy => "metrics untrustworthy",
        };
        f.write_str(s)
    }
}
