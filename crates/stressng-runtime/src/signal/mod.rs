//! Signal plumbing
//!
//! - SIGSTOP/SIGCONT process control for the start barrier
//! - SIGALRM run timeout for workers
//! - SIGINT/SIGTERM interrupt flag for the coordinator and workers

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
