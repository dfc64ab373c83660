//! One-shot normalization of a raw sample into the dashboard document.
//!
//! [`normalize`] consumes the [`RawSnapshot`], so a sample can never be
//! normalized twice.

pub mod header;
pub mod limits;
pub mod order;
pub mod process;

use serde::Serialize;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::sample::{CacheDomain, CpuCore, Fields, Interface, RawSnapshot};
use header::{
    CpuSummary, DerivedAggregates, DiskSummary, LvmSummary, MemSummary, NumaNode, PsiSummary,
};
use limits::{DisplayConfig, keep};
use process::{ProcessRecord, ProcessSummary, RawProcessTables};

/// A sample with every derived field filled in, lists ranked and truncated,
/// and the raw process tables replaced by `PRSUMMARY` and `HPRC`.
#[derive(Clone, Debug, Serialize)]
pub struct NormalizedSnapshot {
    pub timestamp: i64,
    pub elapsed: i64,
    pub date: String,
    #[serde(rename = "CPU")]
    pub cpu: CpuSummary,
    #[serde(rename = "cpu")]
    pub cores: Vec<CpuCore>,
    #[serde(rename = "CPL", skip_serializing_if = "Option::is_none")]
    pub cpl: Option<Fields>,
    #[serde(rename = "MEM", skip_serializing_if = "Option::is_none")]
    pub mem: Option<MemSummary>,
    #[serde(rename = "PSI", skip_serializing_if = "Option::is_none")]
    pub psi: Option<PsiSummary>,
    #[serde(rename = "LVM")]
    pub lvm: Vec<LvmSummary>,
    #[serde(rename = "DSK")]
    pub disks: Vec<DiskSummary>,
    #[serde(rename = "NET")]
    pub interfaces: Vec<Interface>,
    #[serde(rename = "NUM")]
    pub numa_mem: Vec<NumaNode>,
    #[serde(rename = "NUC")]
    pub numa_cpu: Vec<Fields>,
    #[serde(rename = "LLC")]
    pub llc: Vec<CacheDomain>,
    #[serde(rename = "EXTRA")]
    pub aggregates: DerivedAggregates,
    #[serde(rename = "HPRC")]
    pub process_summary: ProcessSummary,
    #[serde(rename = "PRSUMMARY")]
    pub processes: Vec<ProcessRecord>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl NormalizedSnapshot {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Derive, rank and truncate every section of `raw` under `config`.
pub fn normalize(
    raw: RawSnapshot,
    config: &DisplayConfig,
) -> Result<NormalizedSnapshot, NormalizeError> {
    let limits = &config.limits;
    let RawSnapshot {
        timestamp,
        elapsed,
        cpu,
        cores,
        cpl,
        mem,
        psi,
        lvm,
        disks,
        interfaces,
        numa_mem,
        mut numa_cpu,
        llc,
        prg,
        prc,
        prm,
        prd,
        extra,
    } = raw;

    let header_span = tracing::debug_span!("normalize.header", timestamp, elapsed).entered();

    let aggregates = DerivedAggregates::compute(&cpu, mem.as_ref());
    let nrcpu = cpu.nrcpu;
    let cpu = header::summarize_cpu(cpu, &aggregates);
    let cores = header::rank_cores(cores, limits.cpu);

    let cpl = cpl.map(|mut fields| {
        fields.insert("nrcpu".to_string(), nrcpu.into());
        fields
    });
    let mem = mem.map(|stats| MemSummary {
        stats,
        numanode: numa_mem.len(),
    });
    let psi = psi.map(|raw| header::summarize_psi(raw, elapsed));

    let numa_mem = header::number_numa_nodes(numa_mem, limits.numa);
    keep(&mut numa_cpu, limits.numa);

    let lvm = header::summarize_volumes(lvm, aggregates.mstot, elapsed, limits.lvm);
    let disks = header::summarize_disks(disks, aggregates.mstot, elapsed, limits.disk);
    let interfaces = header::rank_interfaces(interfaces, limits.interface);
    let llc = header::rank_cache_domains(llc, limits.llc);
    let date = header::local_date(timestamp);

    drop(header_span);

    let tables = process::join_processes(
        RawProcessTables {
            general: prg,
            cpu: prc,
            memory: prm,
            disk: prd,
        },
        &aggregates,
        config,
    )?;

    tracing::debug!(
        processes = tables.records.len(),
        proc_count = tables.summary.proc_count,
        "sample normalized"
    );

    Ok(NormalizedSnapshot {
        timestamp,
        elapsed,
        date,
        cpu,
        cores,
        cpl,
        mem,
        psi,
        lvm,
        disks,
        interfaces,
        numa_mem,
        numa_cpu,
        llc,
        aggregates,
        process_summary: tables.summary,
        processes: tables.records,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sample::parse_snapshot;

    fn sample() -> RawSnapshot {
        parse_snapshot(
            &json!({
                "host": "db01",
                "timestamp": 1_700_000_000,
                "elapsed": 10,
                "CPU": {"hertz": 100, "nrcpu": 2, "stime": 100, "utime": 200, "itime": 600},
                "CPL": {"lavg1": 0.5},
                "MEM": {"physmem": 1_048_576, "freemem": 4096},
                "NUM": [{"frag": "0.5"}, {"frag": "0.25"}],
                "NUC": [{"numanr": "0"}, {"numanr": "1"}],
                "PRG": [{"pid": 1, "name": "(init)", "state": "S", "isproc": 1, "tgid": 1}],
                "PRC": [{"pid": 1, "utime": 45, "stime": 0}],
                "PRM": [{"pid": 1, "rmem": 512}],
                "PRD": [{"pid": 1}]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn header_sections_gain_derived_fields() {
        let out = normalize(sample(), &DisplayConfig::default()).unwrap();
        let value = out.to_value().unwrap();
        assert_eq!(value["host"], "db01");
        assert_eq!(value["CPU"]["cpubusy"], "66.7");
        assert_eq!(value["CPL"]["nrcpu"], 2);
        assert_eq!(value["CPL"]["lavg1"], 0.5);
        assert_eq!(value["MEM"]["numanode"], 2);
        assert_eq!(value["MEM"]["freemem"], 4096);
        assert_eq!(value["EXTRA"]["percputot"], 450);
        assert_eq!(value["EXTRA"]["availmem"], 1024);
        assert!(value.get("PSI").is_none());
    }

    #[test]
    fn numa_lists_truncate_to_limit() {
        let out = normalize(sample(), &DisplayConfig::default()).unwrap();
        assert!(out.numa_mem.is_empty());
        assert!(out.numa_cpu.is_empty());
        assert_eq!(out.mem.as_ref().map(|m| m.numanode), Some(2));
    }

    #[test]
    fn process_tables_are_replaced_by_summary() {
        let out = normalize(sample(), &DisplayConfig::default()).unwrap();
        let value = out.to_value().unwrap();
        for table in ["PRG", "PRC", "PRM", "PRD"] {
            assert!(value.get(table).is_none(), "{table} should be removed");
        }
        assert_eq!(value["HPRC"]["proc_count"], 1);
        let record = &value["PRSUMMARY"][0];
        assert_eq!(record["name"], "init");
        assert_eq!(record["tid"], "-");
        assert_eq!(record["cpubusy"], "10.0");
        assert_eq!(record["membusy"], "50.0");
        assert_eq!(record["rmem"], 512 * 1024);
    }

    #[test]
    fn missing_process_row_aborts_strict_join() {
        let mut raw = sample();
        raw.prd.clear();
        let err = normalize(raw, &DisplayConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), "process join failed: pid 1 has no PRD entry");
    }
}
