use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer};

use super::header::DerivedAggregates;
use super::limits::{DisplayConfig, MissingEntryPolicy, keep};
use super::order;
use crate::error::{JoinError, ProcessTable};
use crate::format::truncate_chars;
use crate::sample::Fields;
use crate::sample::numeric::Fixed;
use crate::sample::process::{ProcCpu, ProcDisk, ProcGeneral, ProcMemory};

const NAME_WIDTH: usize = 15;
const KIB: i64 = 1024;
const SECTOR: i64 = 512;

/// A value that renders as `-` when it carries no information.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrDash<T> {
    Value(T),
    Dash,
}

impl<T: Serialize> Serialize for OrDash<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OrDash::Value(v) => v.serialize(serializer),
            OrDash::Dash => serializer.serialize_str("-"),
        }
    }
}

fn dash_if_zero<T: Default + PartialEq>(v: T) -> OrDash<T> {
    if v == T::default() {
        OrDash::Dash
    } else {
        OrDash::Value(v)
    }
}

/// Thread and process state counters over the whole identity table (`HPRC`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub proc_count: u64,
    pub sleep_count: u64,
    pub zombie_count: u64,
    pub exit_count: u64,
    pub running_count: u64,
    pub sleep_interrupt_count: u64,
    pub sleep_uninterrupt_count: u64,
    pub stime_unit_time: u64,
    pub utime_unit_time: u64,
}

impl ProcessSummary {
    fn tally(identities: &[&ProcGeneral]) -> Self {
        let mut summary = ProcessSummary::default();
        for general in identities {
            if general.has_exited() {
                summary.exit_count += 1;
                continue;
            }
            if general.is_zombie() {
                summary.zombie_count += 1;
            }
            summary.sleep_interrupt_count += general.nthrslpi;
            summary.sleep_uninterrupt_count += general.nthrslpu;
            summary.running_count += general.nthrrun;
            summary.proc_count += 1;
        }
        summary
    }
}

/// One process (or thread) with its four tables joined.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
    pub state: String,
    pub tgid: u32,
    /// Thread-group id for threads, `-` for processes.
    pub tid: OrDash<u32>,
    pub isproc: i32,
    pub nthr: u32,
    pub nthrrun: u64,
    pub nthrslpi: u64,
    pub nthrslpu: u64,
    pub exitcode: OrDash<i32>,

    pub utime: u64,
    pub stime: u64,
    pub utime_unit_time: u64,
    pub stime_unit_time: u64,
    pub curcpu: OrDash<i64>,
    pub cpubusy: Fixed,

    pub vmem: i64,
    pub rmem: i64,
    pub vexec: i64,
    pub vgrow: i64,
    pub rgrow: i64,
    pub vlibs: i64,
    pub vdata: i64,
    pub vstack: i64,
    pub vlock: i64,
    pub vswap: i64,
    pub pmem: i64,
    pub membusy: Fixed,

    pub rio: i64,
    pub wio: i64,
    pub rsz: i64,
    pub wsz: i64,
    pub cwsz: i64,
    pub diskbusy: Fixed,

    #[serde(flatten)]
    pub extra: Fields,
}

impl ProcessRecord {
    pub fn cpu_ticks(&self) -> u64 {
        self.stime + self.utime
    }

    /// Disk ranking key: read requests plus net written bytes.
    pub fn disk_rank(&self) -> i64 {
        if self.wsz > self.cwsz {
            self.rio + self.wsz - self.cwsz
        } else {
            self.rio
        }
    }
}

/// Output of the process join: ranked records plus the state summary.
#[derive(Clone, Debug)]
pub struct ProcessTables {
    pub records: Vec<ProcessRecord>,
    pub summary: ProcessSummary,
}

/// Raw per-process tables as they arrive in a sample.
pub struct RawProcessTables {
    pub general: Vec<ProcGeneral>,
    pub cpu: Vec<ProcCpu>,
    pub memory: Vec<ProcMemory>,
    pub disk: Vec<ProcDisk>,
}

fn index_by_pid<T>(rows: &[T], pid: impl Fn(&T) -> u32) -> HashMap<u32, &T> {
    // Later rows for the same pid replace earlier ones.
    rows.iter().map(|row| (pid(row), row)).collect()
}

/// One row per pid, at the position the pid first appeared, carrying the
/// values of its last occurrence.
fn dedupe_by_pid<T>(rows: &[T], pid: impl Fn(&T) -> u32 + Copy) -> Vec<&T> {
    let latest = index_by_pid(rows, pid);
    let mut seen = HashSet::with_capacity(latest.len());
    rows.iter()
        .filter(|row| seen.insert(pid(*row)))
        .filter_map(|row| latest.get(&pid(row)).copied())
        .collect()
}

fn lookup<'a, T>(
    index: &HashMap<u32, &'a T>,
    pid: u32,
    table: ProcessTable,
    policy: MissingEntryPolicy,
    fallback: &'a T,
) -> Result<&'a T, JoinError> {
    match index.get(&pid) {
        Some(row) => Ok(row),
        None => match policy {
            MissingEntryPolicy::Fail => Err(JoinError::MissingEntry { pid, table }),
            MissingEntryPolicy::Empty => Ok(fallback),
        },
    }
}

/// Sanitized display name and command line.
fn display_names(general: &ProcGeneral) -> (String, String) {
    let strip = |s: &str| s.replace(['(', ')'], "");
    let name = truncate_chars(&strip(&general.name), NAME_WIDTH);
    let cmdline = strip(&general.cmdline);
    let cmdline = if cmdline.is_empty() { name.clone() } else { cmdline };
    (name, cmdline)
}

fn share(part: f64, whole: f64) -> Fixed {
    if whole == 0.0 {
        return Fixed::new(0.0, 1);
    }
    Fixed::clamped_percent(part * 100.0 / whole, 1)
}

fn merge_extra(tables: [&Fields; 4]) -> Fields {
    let mut merged = Fields::new();
    for fields in tables {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Join the four per-process tables on pid, derive busy percentages, scale
/// sizes to bytes, rank by the configured mode and truncate.
pub fn join_processes(
    tables: RawProcessTables,
    aggregates: &DerivedAggregates,
    config: &DisplayConfig,
) -> Result<ProcessTables, JoinError> {
    let _span = tracing::debug_span!(
        "normalize.processes",
        identities = tables.general.len(),
        sort = config.sort_mode.label()
    )
    .entered();

    let identities = dedupe_by_pid(&tables.general, |g| g.pid);
    let mut summary = ProcessSummary::tally(&identities);

    let availdisk: i64 = dedupe_by_pid(&tables.disk, |d| d.pid)
        .into_iter()
        .map(ProcDisk::transferred)
        .sum();

    let cpu_by_pid = index_by_pid(&tables.cpu, |c| c.pid);
    let mem_by_pid = index_by_pid(&tables.memory, |m| m.pid);
    let disk_by_pid = index_by_pid(&tables.disk, |d| d.pid);

    let (no_cpu, no_mem, no_disk) = (
        ProcCpu::default(),
        ProcMemory::default(),
        ProcDisk::default(),
    );
    let policy = config.missing_entry;

    let mut records = Vec::with_capacity(identities.len());

    for general in identities {
        let pid = general.pid;
        let cpu = lookup(&cpu_by_pid, pid, ProcessTable::Cpu, policy, &no_cpu)?;
        let mem = lookup(&mem_by_pid, pid, ProcessTable::Memory, policy, &no_mem)?;
        let disk = lookup(&disk_by_pid, pid, ProcessTable::Disk, policy, &no_disk)?;

        let tid = if general.is_process() {
            OrDash::Dash
        } else {
            if config.only_proc {
                continue;
            }
            OrDash::Value(general.tgid)
        };

        summary.stime_unit_time += cpu.stime;
        summary.utime_unit_time += cpu.utime;

        let cpubusy = if aggregates.percputot == 0.0 {
            Fixed::new(0.0, 1)
        } else {
            Fixed::new(cpu.busy() as f64 / aggregates.percputot * 100.0, 1)
        };
        let (name, cmdline) = display_names(general);

        records.push(ProcessRecord {
            pid,
            name,
            cmdline,
            state: general.state.clone(),
            tgid: general.tgid,
            tid,
            isproc: general.isproc,
            nthr: general.nthr,
            nthrrun: general.nthrrun,
            nthrslpi: general.nthrslpi,
            nthrslpu: general.nthrslpu,
            exitcode: dash_if_zero(general.exitcode),

            utime: cpu.utime,
            stime: cpu.stime,
            utime_unit_time: cpu.utime,
            stime_unit_time: cpu.stime,
            curcpu: dash_if_zero(cpu.curcpu),
            cpubusy,

            vmem: mem.vmem * KIB,
            rmem: mem.rmem * KIB,
            vexec: mem.vexec * KIB,
            vgrow: mem.vgrow * KIB,
            rgrow: mem.rgrow * KIB,
            vlibs: mem.vlibs * KIB,
            vdata: mem.vdata * KIB,
            vstack: mem.vstack * KIB,
            vlock: mem.vlock * KIB,
            vswap: mem.vswap * KIB,
            pmem: mem.pmem * KIB,
            membusy: share(mem.rmem as f64, aggregates.availmem),

            rio: disk.rio,
            wio: disk.wio,
            rsz: disk.rsz * SECTOR,
            wsz: disk.wsz * SECTOR,
            cwsz: disk.cwsz * SECTOR,
            diskbusy: share(disk.transferred() as f64, availdisk as f64),

            extra: merge_extra([&cpu.extra, &mem.extra, &disk.extra, &general.extra]),
        });
    }

    order::rank_processes(&mut records, config.sort_mode);
    keep(&mut records, config.limits.processes);

    Ok(ProcessTables { records, summary })
}
