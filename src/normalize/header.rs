use chrono::{Local, TimeZone};
use serde::Serialize;

use super::limits::keep;
use super::order;
use crate::format::{tail_chars, to_fixed};
use crate::sample::numeric::{Fixed, serialize_number};
use crate::sample::{
    CacheDomain, CpuCore, CpuTotals, DeviceIo, Disk, Fields, Interface, LogicalVolume, MemStats,
    NumaMemory, Psi,
};

/// Denominators computed once per sample and reused by the process join and
/// the display layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DerivedAggregates {
    /// Milliseconds of CPU time available per core during the interval.
    #[serde(serialize_with = "serialize_number")]
    pub mstot: f64,
    /// Clock ticks available per core during the interval.
    #[serde(serialize_with = "serialize_number")]
    pub percputot: f64,
    /// Physical memory in megabytes.
    #[serde(serialize_with = "serialize_number")]
    pub availmem: f64,
}

impl DerivedAggregates {
    pub fn compute(cpu: &CpuTotals, mem: Option<&MemStats>) -> Self {
        let cores = cpu.nrcpu.max(1) as f64;
        let hertz = cpu.hertz.max(1) as f64;
        let total = cpu_total(cpu);
        DerivedAggregates {
            mstot: total * 1000.0 / hertz / cores,
            percputot: total / cores,
            availmem: mem.map_or(0.0, |m| m.physmem as f64 / 1024.0),
        }
    }
}

/// Sum of all jiffy counters; an idle sample counts as one tick so nothing
/// divides by zero.
fn cpu_total(cpu: &CpuTotals) -> f64 {
    match cpu.times.total() {
        0 => 1.0,
        total => total as f64,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CpuSummary {
    #[serde(flatten)]
    pub totals: CpuTotals,
    pub cpubusy: Fixed,
}

pub fn summarize_cpu(totals: CpuTotals, aggregates: &DerivedAggregates) -> CpuSummary {
    let total = cpu_total(&totals);
    let busy = total - totals.times.itime as f64 - totals.times.wtime as f64;
    CpuSummary {
        cpubusy: Fixed::new(busy / aggregates.percputot * 100.0, 1),
        totals,
    }
}

pub fn rank_cores(mut cores: Vec<CpuCore>, limit: usize) -> Vec<CpuCore> {
    order::rank_cores(&mut cores);
    keep(&mut cores, limit);
    cores
}

#[derive(Clone, Debug, Serialize)]
pub struct MemSummary {
    #[serde(flatten)]
    pub stats: MemStats,
    /// Number of NUMA memory nodes, counted before truncation.
    pub numanode: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct PsiSummary {
    #[serde(flatten)]
    pub raw: Psi,
    #[serde(serialize_with = "serialize_number")]
    pub cpusome: f64,
    #[serde(serialize_with = "serialize_number")]
    pub iosome: f64,
    #[serde(serialize_with = "serialize_number")]
    pub iofull: f64,
    #[serde(serialize_with = "serialize_number")]
    pub memsome: f64,
    #[serde(serialize_with = "serialize_number")]
    pub memfull: f64,
    #[serde(rename = "cs")]
    pub cpu_some_avg: String,
    #[serde(rename = "ms")]
    pub mem_some_avg: String,
    #[serde(rename = "mf")]
    pub mem_full_avg: String,
    #[serde(rename = "is")]
    pub io_some_avg: String,
    #[serde(rename = "if")]
    pub io_full_avg: String,
}

/// Stall share of the interval. The overflow test scales by 100 while the
/// stored value divides by `elapsed * 10000`; both are kept as the templates
/// expect them.
fn stall_ratio(total: u64, elapsed: i64) -> f64 {
    if elapsed == 0 {
        return 0.0;
    }
    let total = total as f64;
    let elapsed = elapsed as f64;
    if total / elapsed * 100.0 > 100.0 {
        100.0
    } else {
        total / (elapsed * 10000.0)
    }
}

fn windows(avg10: f64, avg60: f64, avg300: f64) -> String {
    format!(
        "{}/{}/{}",
        to_fixed(avg10, 0),
        to_fixed(avg60, 0),
        to_fixed(avg300, 0)
    )
}

pub fn summarize_psi(raw: Psi, elapsed: i64) -> PsiSummary {
    PsiSummary {
        cpusome: stall_ratio(raw.cstot, elapsed),
        iosome: stall_ratio(raw.iostot, elapsed),
        iofull: stall_ratio(raw.ioftot, elapsed),
        memsome: stall_ratio(raw.mstot, elapsed),
        memfull: stall_ratio(raw.mftot, elapsed),
        cpu_some_avg: windows(raw.cs10, raw.cs60, raw.cs300),
        mem_some_avg: windows(raw.ms10, raw.ms60, raw.ms300),
        mem_full_avg: windows(raw.mf10, raw.mf60, raw.mf300),
        io_some_avg: windows(raw.ios10, raw.ios60, raw.ios300),
        io_full_avg: windows(raw.iof10, raw.iof60, raw.iof300),
        raw,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct NumaNode {
    #[serde(rename = "numanodeId")]
    pub id: usize,
    pub frag: Fixed,
    #[serde(flatten)]
    pub extra: Fields,
}

pub fn number_numa_nodes(nodes: Vec<NumaMemory>, limit: usize) -> Vec<NumaNode> {
    let mut numbered: Vec<NumaNode> = nodes
        .into_iter()
        .enumerate()
        .map(|(id, node)| NumaNode {
            id,
            frag: Fixed::new(node.frag.value().unwrap_or(f64::NAN), 2),
            extra: node.extra,
        })
        .collect();
    keep(&mut numbered, limit);
    numbered
}

/// Per-device rates shared by logical volumes and disks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceRates {
    pub avio: Fixed,
    pub busy: Fixed,
    pub read_mbps: Fixed,
    pub write_mbps: Fixed,
}

impl DeviceRates {
    pub fn compute(io: &DeviceIo, mstot: f64, elapsed: i64) -> Self {
        let requests = io.nread + io.nwrite;
        let avio = if requests > 0 {
            io.io_ms as f64 / requests as f64
        } else {
            0.0
        };
        let busy = if mstot != 0.0 {
            io.io_ms as f64 / mstot
        } else {
            0.0
        };
        DeviceRates {
            avio: Fixed::new(avio, 2),
            busy: Fixed::new(busy, 2),
            read_mbps: Fixed::new(sectors_to_mbps(io.nrsect, elapsed), 1),
            write_mbps: Fixed::new(sectors_to_mbps(io.nwsect, elapsed), 1),
        }
    }
}

fn sectors_to_mbps(sectors: u64, elapsed: i64) -> f64 {
    if elapsed == 0 {
        return 0.0;
    }
    sectors as f64 / 2.0 / 1024.0 / elapsed as f64
}

#[derive(Clone, Debug, Serialize)]
pub struct LvmSummary {
    pub lvmname: String,
    #[serde(flatten)]
    pub io: DeviceIo,
    pub avio: Fixed,
    pub lvmbusy: Fixed,
    #[serde(rename = "MBr/s")]
    pub read_mbps: Fixed,
    #[serde(rename = "MBw/s")]
    pub write_mbps: Fixed,
    #[serde(flatten)]
    pub extra: Fields,
}

pub fn summarize_volumes(
    volumes: Vec<LogicalVolume>,
    mstot: f64,
    elapsed: i64,
    limit: usize,
) -> Vec<LvmSummary> {
    let mut out: Vec<LvmSummary> = volumes
        .into_iter()
        .map(|lv| {
            let rates = DeviceRates::compute(&lv.io, mstot, elapsed);
            LvmSummary {
                // Mapper names share long prefixes; the tail identifies them.
                lvmname: tail_chars(&lv.lvmname, 10),
                io: lv.io,
                avio: rates.avio,
                lvmbusy: rates.busy,
                read_mbps: rates.read_mbps,
                write_mbps: rates.write_mbps,
                extra: lv.extra,
            }
        })
        .collect();
    keep(&mut out, limit);
    out
}

#[derive(Clone, Debug, Serialize)]
pub struct DiskSummary {
    #[serde(flatten)]
    pub io: DeviceIo,
    pub avio: Fixed,
    pub diskbusy: Fixed,
    #[serde(rename = "MBr/s")]
    pub read_mbps: Fixed,
    #[serde(rename = "MBw/s")]
    pub write_mbps: Fixed,
    #[serde(flatten)]
    pub extra: Fields,
}

pub fn summarize_disks(disks: Vec<Disk>, mstot: f64, elapsed: i64, limit: usize) -> Vec<DiskSummary> {
    let mut out: Vec<DiskSummary> = disks
        .into_iter()
        .map(|disk| {
            let rates = DeviceRates::compute(&disk.io, mstot, elapsed);
            DiskSummary {
                io: disk.io,
                avio: rates.avio,
                diskbusy: rates.busy,
                read_mbps: rates.read_mbps,
                write_mbps: rates.write_mbps,
                extra: disk.extra,
            }
        })
        .collect();
    out.sort_by(|a, b| b.io.io_ms.cmp(&a.io.io_ms));
    keep(&mut out, limit);
    out
}

pub fn rank_interfaces(mut interfaces: Vec<Interface>, limit: usize) -> Vec<Interface> {
    order::rank_interfaces(&mut interfaces);
    keep(&mut interfaces, limit);
    interfaces
}

pub fn rank_cache_domains(mut domains: Vec<CacheDomain>, limit: usize) -> Vec<CacheDomain> {
    order::rank_cache_domains(&mut domains);
    keep(&mut domains, limit);
    domains
}

/// `YYYY-MM-DD HH:MM:SS` in the viewer's time zone.
pub fn format_date<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_opt(timestamp, 0).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

pub fn local_date(timestamp: i64) -> String {
    format_date(timestamp, &Local)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::sample::CpuTimes;
    use crate::sample::numeric::Numeric;

    fn totals(times: CpuTimes, nrcpu: u64, hertz: u64) -> CpuTotals {
        CpuTotals {
            hertz,
            nrcpu,
            times,
            extra: Fields::new(),
        }
    }

    #[test]
    fn cpu_busy_excludes_idle_time() {
        let cpu = totals(
            CpuTimes {
                stime: 100,
                utime: 200,
                itime: 600,
                ..CpuTimes::default()
            },
            2,
            100,
        );
        let agg = DerivedAggregates::compute(&cpu, None);
        assert_eq!(agg.percputot, 450.0);
        assert_eq!(agg.mstot, 4500.0);
        let summary = summarize_cpu(cpu, &agg);
        assert_eq!(summary.cpubusy.to_string(), "66.7");
    }

    #[test]
    fn idle_sample_counts_one_tick() {
        let cpu = totals(CpuTimes::default(), 4, 100);
        let agg = DerivedAggregates::compute(&cpu, None);
        assert_eq!(agg.percputot, 0.25);
        assert_eq!(agg.mstot, 2.5);
    }

    #[test]
    fn zero_core_count_and_hertz_are_guarded() {
        let cpu = totals(
            CpuTimes {
                utime: 50,
                ..CpuTimes::default()
            },
            0,
            0,
        );
        let agg = DerivedAggregates::compute(&cpu, None);
        assert_eq!(agg.percputot, 50.0);
        assert_eq!(agg.mstot, 50_000.0);
    }

    #[test]
    fn availmem_is_physmem_in_megabytes() {
        let mem = MemStats {
            physmem: 8 * 1024 * 1024,
            extra: Fields::new(),
        };
        let agg = DerivedAggregates::compute(&CpuTotals::default(), Some(&mem));
        assert_eq!(agg.availmem, 8192.0);
    }

    #[test]
    fn psi_keeps_asymmetric_scaling() {
        let psi = Psi {
            cstot: 5_000,
            iostot: 20,
            cs10: 2.5,
            cs60: 1.24,
            cs300: 0.0,
            ..Psi::default()
        };
        let summary = summarize_psi(psi, 10);
        // 5000 / 10 * 100 > 100: clamped.
        assert_eq!(summary.cpusome, 100.0);
        // 20 / 10 * 100 = 200 > 100 as well.
        assert_eq!(summary.iosome, 100.0);
        assert_eq!(summary.iofull, 0.0);
        assert_eq!(summary.cpu_some_avg, "3/1/0");
    }

    #[test]
    fn psi_unclamped_divides_by_ten_thousand() {
        let psi = Psi {
            mstot: 5,
            ..Psi::default()
        };
        let summary = summarize_psi(psi, 10);
        assert!((summary.memsome - 5.0 / 100_000.0).abs() < 1e-12);
    }

    #[test]
    fn psi_zero_elapsed_is_zero() {
        let psi = Psi {
            cstot: 5,
            ..Psi::default()
        };
        assert_eq!(summarize_psi(psi, 0).cpusome, 0.0);
    }

    #[test]
    fn device_rates() {
        let io = DeviceIo {
            io_ms: 300,
            nread: 100,
            nwrite: 50,
            nrsect: 20_480,
            nwsect: 0,
        };
        let rates = DeviceRates::compute(&io, 4500.0, 10);
        assert_eq!(rates.avio.to_string(), "2.00");
        assert_eq!(rates.busy.to_string(), "0.07");
        assert_eq!(rates.read_mbps.to_string(), "1.0");
        assert_eq!(rates.write_mbps.to_string(), "0.0");
    }

    #[test]
    fn device_rates_guard_zero_denominators() {
        let io = DeviceIo {
            io_ms: 300,
            nrsect: 100,
            ..DeviceIo::default()
        };
        let rates = DeviceRates::compute(&io, 0.0, 0);
        assert_eq!(rates.avio.to_string(), "0.00");
        assert_eq!(rates.busy.to_string(), "0.00");
        assert_eq!(rates.read_mbps.to_string(), "0.0");
    }

    #[test]
    fn disks_rank_by_io_ms_and_truncate() {
        let disk = |io_ms| Disk {
            io: DeviceIo {
                io_ms,
                ..DeviceIo::default()
            },
            extra: Fields::new(),
        };
        let out = summarize_disks(vec![disk(5), disk(50), disk(20)], 100.0, 1, 2);
        let ranked: Vec<u64> = out.iter().map(|d| d.io.io_ms).collect();
        assert_eq!(ranked, vec![50, 20]);
    }

    #[test]
    fn volumes_keep_name_tail_and_input_order() {
        let lv = |name: &str, io_ms| LogicalVolume {
            lvmname: name.to_string(),
            io: DeviceIo {
                io_ms,
                ..DeviceIo::default()
            },
            extra: Fields::new(),
        };
        let out = summarize_volumes(
            vec![lv("vg_system-lv_root", 1), lv("swap", 99), lv("data", 5)],
            100.0,
            1,
            2,
        );
        let names: Vec<&str> = out.iter().map(|v| v.lvmname.as_str()).collect();
        assert_eq!(names, vec!["em-lv_root", "swap"]);
    }

    #[test]
    fn numa_nodes_get_index_and_rounded_frag() {
        let node = |frag| NumaMemory {
            frag,
            extra: Fields::new(),
        };
        let out = number_numa_nodes(
            vec![
                node(Numeric::Number(0.123_456)),
                node(Numeric::Malformed("x".into())),
                node(Numeric::Number(1.0)),
            ],
            2,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, 0);
        assert_eq!(out[0].frag.to_string(), "0.12");
        assert_eq!(out[1].id, 1);
        assert_eq!(out[1].frag.to_string(), "NaN");
    }

    #[test]
    fn cores_rank_by_busy_time() {
        let core = |utime, stime| CpuCore {
            times: CpuTimes {
                utime,
                stime,
                ..CpuTimes::default()
            },
            extra: Fields::new(),
        };
        let out = rank_cores(vec![core(1, 1), core(10, 0), core(3, 3)], 5);
        let busy: Vec<u64> = out.iter().map(|c| c.times.busy()).collect();
        assert_eq!(busy, vec![10, 6, 2]);
    }

    #[test]
    fn date_renders_in_given_zone() {
        assert_eq!(format_date(0, &Utc), "1970-01-01 00:00:00");
        assert_eq!(format_date(1_700_000_000, &Utc), "2023-11-14 22:13:20");
    }
}
