//! Raw performance samples as the atop http server emits them.
//!
//! Every section defaults when absent and keeps the fields it does not
//! interpret in `extra`, so a normalized snapshot still carries everything the
//! templates may reference.

pub mod numeric;
pub mod process;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;
use numeric::Numeric;
use process::{ProcCpu, ProcDisk, ProcGeneral, ProcMemory};

pub type Fields = serde_json::Map<String, Value>;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawSnapshot {
    #[serde(deserialize_with = "numeric::lenient")]
    pub timestamp: i64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub elapsed: i64,
    #[serde(rename = "CPU")]
    pub cpu: CpuTotals,
    #[serde(rename = "cpu")]
    pub cores: Vec<CpuCore>,
    #[serde(rename = "CPL", skip_serializing_if = "Option::is_none")]
    pub cpl: Option<Fields>,
    #[serde(rename = "MEM", skip_serializing_if = "Option::is_none")]
    pub mem: Option<MemStats>,
    #[serde(rename = "PSI", skip_serializing_if = "Option::is_none")]
    pub psi: Option<Psi>,
    #[serde(rename = "LVM")]
    pub lvm: Vec<LogicalVolume>,
    #[serde(rename = "DSK")]
    pub disks: Vec<Disk>,
    #[serde(rename = "NET")]
    pub interfaces: Vec<Interface>,
    #[serde(rename = "NUM")]
    pub numa_mem: Vec<NumaMemory>,
    #[serde(rename = "NUC")]
    pub numa_cpu: Vec<Fields>,
    #[serde(rename = "LLC")]
    pub llc: Vec<CacheDomain>,
    #[serde(rename = "PRG")]
    pub prg: Vec<ProcGeneral>,
    #[serde(rename = "PRC")]
    pub prc: Vec<ProcCpu>,
    #[serde(rename = "PRM")]
    pub prm: Vec<ProcMemory>,
    #[serde(rename = "PRD")]
    pub prd: Vec<ProcDisk>,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Parse one sample. The server answers with a bare object, the dashboard
/// historically wrapped it in a one-element array; both are accepted.
pub fn parse_snapshot(raw: &str) -> Result<RawSnapshot, ParseError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = match value {
        Value::Array(mut items) => match items.len() {
            1 => items.remove(0),
            n => return Err(ParseError::Envelope(n)),
        },
        other => other,
    };
    if !object.is_object() {
        return Err(ParseError::NotAnObject);
    }
    Ok(serde_json::from_value(object)?)
}

/// The eight jiffy counters summed into the CPU total.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CpuTimes {
    #[serde(deserialize_with = "numeric::lenient")]
    pub stime: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub utime: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ntime: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub itime: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub wtime: u64,
    #[serde(rename = "Itime", deserialize_with = "numeric::lenient")]
    pub irq: u64,
    #[serde(rename = "Stime", deserialize_with = "numeric::lenient")]
    pub softirq: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.stime
            + self.utime
            + self.ntime
            + self.itime
            + self.wtime
            + self.irq
            + self.softirq
            + self.steal
    }

    /// User plus system time, the ranking key for cores and processes.
    pub fn busy(&self) -> u64 {
        self.utime + self.stime
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CpuTotals {
    #[serde(deserialize_with = "numeric::lenient")]
    pub hertz: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub nrcpu: u64,
    #[serde(flatten)]
    pub times: CpuTimes,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CpuCore {
    #[serde(flatten)]
    pub times: CpuTimes,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Memory section; sizes are in kilobytes.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MemStats {
    #[serde(deserialize_with = "numeric::lenient")]
    pub physmem: u64,
    #[serde(flatten)]
    pub extra: Fields,
}

/// Pressure-stall information: 10/60/300 second averages and a running total
/// in microseconds for each resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Psi {
    #[serde(deserialize_with = "numeric::lenient")]
    pub cs10: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub cs60: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub cs300: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub cstot: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ms10: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ms60: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ms300: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub mstot: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub mf10: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub mf60: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub mf300: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub mftot: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ios10: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ios60: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ios300: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub iostot: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub iof10: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub iof60: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub iof300: f64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub ioftot: u64,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceIo {
    #[serde(deserialize_with = "numeric::lenient")]
    pub io_ms: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub nread: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub nrsect: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub nwrite: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub nwsect: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LogicalVolume {
    pub lvmname: String,
    #[serde(flatten)]
    pub io: DeviceIo,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Disk {
    #[serde(flatten)]
    pub io: DeviceIo,
    #[serde(flatten)]
    pub extra: Fields,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Interface {
    #[serde(deserialize_with = "numeric::lenient")]
    pub rpack: u64,
    #[serde(deserialize_with = "numeric::lenient")]
    pub spack: u64,
    #[serde(flatten)]
    pub extra: Fields,
}

impl Interface {
    pub fn packets(&self) -> u64 {
        self.rpack + self.spack
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NumaMemory {
    pub frag: Numeric,
    #[serde(flatten)]
    pub extra: Fields,
}

/// One last-level-cache domain (resctrl monitoring group).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheDomain {
    pub occupancy: Numeric,
    #[serde(flatten)]
    pub extra: Fields,
}
