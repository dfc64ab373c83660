use std::cmp::{Ordering, Reverse};

use super::limits::SortMode;
use super::process::ProcessRecord;
use crate::sample::{CacheDomain, CpuCore, Interface};

// All sorts below are stable: rows with equal keys keep their input order.

pub fn rank_cores(cores: &mut [CpuCore]) {
    cores.sort_by_key(|core| Reverse(core.times.busy()));
}

pub fn rank_interfaces(interfaces: &mut [Interface]) {
    interfaces.sort_by_key(|iface| Reverse(iface.packets()));
}

pub fn rank_cache_domains(domains: &mut [CacheDomain]) {
    domains.sort_by(|a, b| b.occupancy.sort_key().total_cmp(&a.occupancy.sort_key()));
}

pub fn rank_processes(records: &mut [ProcessRecord], mode: SortMode) {
    match mode {
        SortMode::Cpu => records.sort_by(by_cpu),
        SortMode::Disk => records.sort_by(by_disk),
        SortMode::Memory => records.sort_by(by_memory),
    }
}

fn by_cpu(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.cpu_ticks().cmp(&a.cpu_ticks())
}

fn by_disk(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.disk_rank().cmp(&a.disk_rank()).then_with(|| by_cpu(a, b))
}

fn by_memory(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.rmem.cmp(&a.rmem)
}
