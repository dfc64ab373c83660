#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Cpu,
    Memory,
    Disk,
}

impl SortMode {
    pub fn label(self) -> &'static str {
        match self {
            SortMode::Cpu => "CPU",
            SortMode::Memory => "MEM",
            SortMode::Disk => "DISK",
        }
    }

    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "mem" | "memory" => SortMode::Memory,
            "disk" | "dsk" => SortMode::Disk,
            _ => SortMode::Cpu,
        }
    }
}

/// What to do with a `PRG` pid that has no row in another process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingEntryPolicy {
    /// Abort the join with [`crate::error::JoinError`].
    #[default]
    Fail,
    /// Treat the missing dimension as contributing nothing.
    Empty,
}

impl MissingEntryPolicy {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "empty" | "lenient" => MissingEntryPolicy::Empty,
            _ => MissingEntryPolicy::Fail,
        }
    }
}

/// Maximum rows kept per category after ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub processes: usize,
    pub cpu: usize,
    pub lvm: usize,
    pub disk: usize,
    pub interface: usize,
    pub numa: usize,
    pub llc: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            processes: 200,
            cpu: 0,
            lvm: 4,
            disk: 1,
            interface: 2,
            numa: 0,
            llc: 0,
        }
    }
}

/// Everything the normalizer needs from the viewer, passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub limits: Limits,
    pub sort_mode: SortMode,
    /// Leave threads out of the process list.
    pub only_proc: bool,
    pub missing_entry: MissingEntryPolicy,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            limits: Limits::default(),
            sort_mode: SortMode::Cpu,
            only_proc: true,
            missing_entry: MissingEntryPolicy::Fail,
        }
    }
}

/// Truncate to `limit` rows, never more than the list holds.
pub fn keep<T>(list: &mut Vec<T>, limit: usize) {
    let kept = limit.min(list.len());
    if kept < list.len() {
        tracing::debug!(from = list.len(), to = kept, "truncating list");
    }
    list.truncate(kept);
}
