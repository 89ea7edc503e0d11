//! Condvar-backed process control
//!
//! Stands in for SIGSTOP/SIGCONT where the "processes" are threads in one
//! address space, or on targets without job-control signals. Semantics
//! follow the signals: `resume` of a pid that is not parked is a no-op (not
//! remembered), so callers must keep resuming until the target reports it is
//! running, exactly as the start barrier does.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use stressng_core::{ProcessControl, SignalError};

pub struct ParkingControl {
    /// Pids currently parked
    parked: Mutex<HashSet<i32>>,

    /// Wakes parked callers when their pid is removed
    condvar: Condvar,
}

impl ParkingControl {
    pub fn new() -> Self {
        Self {
            parked: Mutex::new(HashSet::new()),
            condvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i32>> {
        self.parked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of currently parked pids (hint, may be stale)
    pub fn parked_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether `pid` is parked right now
    pub fn is_parked(&self, pid: i32) -> bool {
        self.lock().contains(&pid)
    }
}

impl Default for ParkingControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessControl for ParkingControl {
    /// Park the calling thread under `pid` until `resume(pid)`
    fn suspend(&self, pid: i32) -> Result<(), SignalError> {
        let mut guard = self.lock();
        guard.insert(pid);
        while guard.contains(&pid) {
            guard = self.condvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }

    fn resume(&self, pid: i32) -> Result<(), SignalError> {
        let woke = self.lock().remove(&pid);
        if woke {
            self.condvar.notify_all();
        }
        Ok(())
    }

    /// Threads cannot be killed; treated as a resume so nothing stays parked
    fn kill(&self, pid: i32) -> Result<(), SignalError> {
        self.resume(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_resume_wakes_parked() {
        let parking = Arc::new(ParkingControl::new());
        let parking2 = Arc::clone(&parking);

        let handle = thread::spawn(move || parking2.suspend(7));

        while !parking.is_parked(7) {
            thread::sleep(Duration::from_millis(1));
        }
        parking.resume(7).unwrap();

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(parking.parked_count(), 0);
    }

    #[test]
    fn test_resume_not_remembered() {
        let parking = Arc::new(ParkingControl::new());
        parking.resume(9).unwrap();
        assert!(!parking.is_parked(9));

        let parking2 = Arc::clone(&parking);
        let handle = thread::spawn(move || parking2.suspend(9));

        // The earlier resume must not let it through
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());

        parking.resume(9).unwrap();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_resume_only_wakes_target() {
        let parking = Arc::new(ParkingControl::new());
        let a = {
            let p = Arc::clone(&parking);
            thread::spawn(move || p.suspend(1001))
        };
        let b = {
            let p = Arc::clone(&parking);
            thread::spawn(move || p.suspend(1002))
        };
        while parking.parked_count() < 2 {
            thread::sleep(Duration::from_millis(1));
        }

        parking.resume(1001).unwrap();
        a.join().unwrap().unwrap();
        assert!(parking.is_parked(1002));

        parking.resume(1002).unwrap();
        b.join().unwrap().unwrap();
    }
}
