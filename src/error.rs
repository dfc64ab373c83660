use thiserror::Error;

/// The raw document could not be turned into a sample.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid sample JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An array envelope must hold exactly one sample.
    #[error("expected exactly one sample, got {0}")]
    Envelope(usize),

    #[error("sample is not a JSON object")]
    NotAnObject,
}

/// Which per-process table a lookup went to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessTable {
    Cpu,
    Memory,
    Disk,
}

impl ProcessTable {
    pub fn label(self) -> &'static str {
        match self {
            ProcessTable::Cpu => "PRC",
            ProcessTable::Memory => "PRM",
            ProcessTable::Disk => "PRD",
        }
    }
}

impl std::fmt::Display for ProcessTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JoinError {
    /// A pid listed in `PRG` has no row in one of the other tables.
    #[error("pid {pid} has no {table} entry")]
    MissingEntry { pid: u32, table: ProcessTable },
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("process join failed: {0}")]
    Join(#[from] JoinError),
}

/// Transport-side failure reported by a [`crate::app::SampleSource`].
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read sample: {0}")]
    Io(#[from] std::io::Error),

    #[error("sample source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Relative navigation needs a previous sample to anchor on.
    #[error("no sample loaded yet")]
    NoSample,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_error_names_table_and_pid() {
        let err = JoinError::MissingEntry {
            pid: 42,
            table: ProcessTable::Disk,
        };
        assert_eq!(err.to_string(), "pid 42 has no PRD entry");
        let wrapped = NormalizeError::from(err);
        assert_eq!(wrapped.to_string(), "process join failed: pid 42 has no PRD entry");
    }
}
