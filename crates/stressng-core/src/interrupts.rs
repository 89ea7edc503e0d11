//! Interrupt capability table and delta aggregation
//!
//! The table is resolved per architecture at build time and iterated at
//! runtime; nothing else in the harness branches on the architecture.

use crate::constants::MAX_INTERRUPTS;

/// Where a counter comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSource {
    /// Line in `/proc/interrupts` starting with this label; per-CPU
    /// counts that follow it are summed
    ProcInterrupts(&'static str),
    /// Model-specific register read from one CPU's msr device
    Msr { register: u64, cpu: u32 },
}

/// One interrupt class the sampler tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptInfo {
    pub source: InterruptSource,
    /// Human description, singular ("Machine Check Exception")
    pub description: &'static str,
    /// A positive delta fails the stressor
    pub check_failure: bool,
}

impl InterruptInfo {
    const fn proc(label: &'static str, description: &'static str, check_failure: bool) -> Self {
        Self {
            source: InterruptSource::ProcInterrupts(label),
            description,
            check_failure,
        }
    }

    /// Machine-readable key: description lower-cased, spaces to underscores
    pub fn yaml_key(&self) -> String {
        self.description.to_lowercase().replace(' ', "_")
    }

    /// Description with an `s` appended when `count` is plural
    pub fn describe_count(&self, count: u64) -> String {
        if count > 1 {
            format!("{}s", self.description)
        } else {
            self.description.to_string()
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86_64", target_arch = "x86"))] {
        /// MSR_SMI_COUNT on Intel parts
        pub const MSR_SMI_COUNT: u64 = 0x34;

        static TABLE: &[InterruptInfo] = &[
            InterruptInfo::proc("MCE:", "Machine Check Exception", true),
            InterruptInfo::proc("ERR:", "APIC Error Interrupt", true),
            InterruptInfo::proc("MIS:", "Mis-routed IO-APIC Interrupt", true),
            InterruptInfo::proc("DFR:", "Deferred Error APIC Interrupt", true),
            InterruptInfo::proc("TRM:", "Thermal Event Interrupt", false),
            InterruptInfo::proc("SPU:", "Spurious Interrupt", false),
            InterruptInfo::proc("NMI:", "Non-Maskable Interrupt", false),
            InterruptInfo::proc("PMI:", "Performance Monitoring Interrupt", false),
            InterruptInfo::proc("MCP:", "Machine Check Poll", false),
            InterruptInfo {
                source: InterruptSource::Msr { register: MSR_SMI_COUNT, cpu: 0 },
                description: "System Management Interrupt",
                check_failure: false,
            },
        ];
    } else if #[cfg(any(target_arch = "aarch64", target_arch = "arm"))] {
        static TABLE: &[InterruptInfo] = &[
            InterruptInfo::proc("Err:", "Error Interrupt", true),
            InterruptInfo::proc("IPI5:", "Timer Broadcast Interrupt", false),
        ];
    } else {
        static TABLE: &[InterruptInfo] = &[
            InterruptInfo::proc("ERR:", "Error Interrupt", true),
        ];
    }
}

/// Interrupt classes for this build's architecture
pub fn interrupt_table() -> &'static [InterruptInfo] {
    debug_assert!(TABLE.len() <= MAX_INTERRUPTS);
    TABLE
}

/// One count per table entry, in table order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub counts: Vec<u64>,
}

impl CounterSnapshot {
    pub fn get(&self, idx: usize) -> u64 {
        self.counts.get(idx).copied().unwrap_or(0)
    }
}

/// Average of the positive per-instance deltas of one interrupt class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaAverage {
    /// Sum of positive deltas
    pub total: u64,
    /// Instances with a positive delta
    pub count: u64,
    /// `round(total / count)`, 0 when nothing contributed
    pub average: u64,
}

impl DeltaAverage {
    /// Zero and negative deltas (counter wrapped or reset) contribute nothing
    pub fn from_deltas<I: IntoIterator<Item = i64>>(deltas: I) -> Self {
        let (total, count) = deltas
            .into_iter()
            .filter(|&d| d > 0)
            .fold((0u64, 0u64), |(t, c), d| (t.saturating_add(d as u64), c + 1));
        let average = if count == 0 {
            0
        } else {
            (total as f64 / count as f64).round() as u64
        };
        Self { total, count, average }
    }
}

/// Sum the per-CPU counts following `label` in `/proc/interrupts` text
///
/// Summing stops at the first non-numeric field (the trailing description).
/// Returns 0 when the label is absent.
pub fn parse_proc_interrupts(text: &str, label: &str) -> u64 {
    text.lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(label))
        .map(|line| {
            line[label.len()..]
                .split_whitespace()
                .map_while(|field| field.parse::<u64>().ok())
                .fold(0u64, u64::saturating_add)
        })
        .unwrap_or(0)
}
