use serde::{Deserialize, Serialize};

use super::Fields;
use super::numeric::lenient;

/// `PRG`: identity and state of one process or thread.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcGeneral {
    #[serde(deserialize_with = "lenient")]
    pub pid: u32,
    pub name: String,
    pub state: String,
    #[serde(deserialize_with = "lenient")]
    pub tgid: u32,
    #[serde(deserialize_with = "lenient")]
    pub nthr: u32,
    #[serde(deserialize_with = "lenient")]
    pub exitcode: i32,
    pub cmdline: String,
    #[serde(deserialize_with = "lenient")]
    pub nthrrun: u64,
    #[serde(deserialize_with = "lenient")]
    pub nthrslpi: u64,
    #[serde(deserialize_with = "lenient")]
    pub nthrslpu: u64,
    #[serde(deserialize_with = "lenient")]
    pub isproc: i32,
    #[serde(flatten)]
    pub extra: Fields,
}

impl ProcGeneral {
    /// Thread-group leaders are reported with `isproc == 1`.
    pub fn is_process(&self) -> bool {
        self.isproc == 1
    }

    pub fn has_exited(&self) -> bool {
        self.state == "E"
    }

    pub fn is_zombie(&self) -> bool {
        self.state == "Z"
    }
}

/// `PRC`: CPU consumption in clock ticks during the interval.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcCpu {
    #[serde(deserialize_with = "lenient")]
    pub pid: u32,
    #[serde(deserialize_with = "lenient")]
    pub utime: u64,
    #[serde(deserialize_with = "lenient")]
    pub stime: u64,
    #[serde(deserialize_with = "lenient")]
    pub curcpu: i64,
    #[serde(deserialize_with = "lenient")]
    pub tgid: u32,
    #[serde(deserialize_with = "lenient")]
    pub isproc: i32,
    #[serde(flatten)]
    pub extra: Fields,
}

impl ProcCpu {
    pub fn busy(&self) -> u64 {
        self.utime + self.stime
    }
}

/// `PRM`: memory sizes in kilobytes (growth fields may be negative).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcMemory {
    #[serde(deserialize_with = "lenient")]
    pub pid: u32,
    #[serde(deserialize_with = "lenient")]
    pub vmem: i64,
    #[serde(deserialize_with = "lenient")]
    pub rmem: i64,
    #[serde(deserialize_with = "lenient")]
    pub vexec: i64,
    #[serde(deserialize_with = "lenient")]
    pub vgrow: i64,
    #[serde(deserialize_with = "lenient")]
    pub rgrow: i64,
    #[serde(deserialize_with = "lenient")]
    pub vlibs: i64,
    #[serde(deserialize_with = "lenient")]
    pub vdata: i64,
    #[serde(deserialize_with = "lenient")]
    pub vstack: i64,
    #[serde(deserialize_with = "lenient")]
    pub vlock: i64,
    #[serde(deserialize_with = "lenient")]
    pub vswap: i64,
    #[serde(deserialize_with = "lenient")]
    pub pmem: i64,
    #[serde(flatten)]
    pub extra: Fields,
}

/// `PRD`: disk transfer in 512-byte sectors.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcDisk {
    #[serde(deserialize_with = "lenient")]
    pub pid: u32,
    #[serde(deserialize_with = "lenient")]
    pub rio: i64,
    #[serde(deserialize_with = "lenient")]
    pub rsz: i64,
    #[serde(deserialize_with = "lenient")]
    pub wio: i64,
    #[serde(deserialize_with = "lenient")]
    pub wsz: i64,
    #[serde(deserialize_with = "lenient")]
    pub cwsz: i64,
    #[serde(flatten)]
    pub extra: Fields,
}

impl ProcDisk {
    /// Written sectors minus the ones cancelled before reaching the disk.
    pub fn net_write(&self) -> i64 {
        (self.wsz - self.cwsz).max(0)
    }

    pub fn transferred(&self) -> i64 {
        self.rsz + self.net_write()
    }
}
