use atopweb::display::annotate_snapshot;
use atopweb::normalize::limits::{DisplayConfig, SortMode};
use atopweb::normalize::normalize;
use atopweb::sample::{RawSnapshot, parse_snapshot};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;

fn make_sample_json(n: usize) -> String {
    let pids = 1..=n;
    let prg: Vec<Value> = pids
        .clone()
        .map(|pid| {
            let state = if pid % 17 == 0 { "Z" } else { "S" };
            json!({
                "pid": pid,
                "name": format!("(proc_{pid})"),
                "state": state,
                "tgid": pid,
                "nthr": 1,
                "cmdline": format!("(proc_{pid} --work)"),
                "nthrrun": pid % 2,
                "nthrslpi": 1,
                "nthrslpu": 0,
                "isproc": i32::from(pid % 5 != 0)
            })
        })
        .collect();
    let prc: Vec<Value> = pids
        .clone()
        .map(|pid| json!({"pid": pid, "utime": pid % 97, "stime": pid % 13, "curcpu": pid % 8}))
        .collect();
    let prm: Vec<Value> = pids
        .clone()
        .map(|pid| json!({"pid": pid, "vmem": pid * 4096, "rmem": (n - pid + 1) * 512, "pmem": pid * 256}))
        .collect();
    let prd: Vec<Value> = pids
        .map(|pid| json!({"pid": pid, "rio": pid % 7, "rsz": pid % 31, "wsz": pid % 53, "cwsz": pid % 11}))
        .collect();

    json!({
        "timestamp": 1_700_000_000,
        "elapsed": 10,
        "CPU": {"hertz": 100, "nrcpu": 8, "utime": 4000, "stime": 1000, "itime": 3000},
        "cpu": (0..8).map(|i| json!({"cpuid": i, "utime": 500 + i, "stime": 100})).collect::<Vec<_>>(),
        "MEM": {"physmem": 16_777_216, "freemem": 4_194_304},
        "DSK": (0..4).map(|i| json!({"dskname": format!("sd{i}"), "io_ms": i * 10, "nread": 5, "nrsect": 1024})).collect::<Vec<_>>(),
        "NET": (0..4).map(|i| json!({"name": format!("eth{i}"), "rpack": i * 3, "spack": 10 - i, "speed": "1000"})).collect::<Vec<_>>(),
        "PRG": prg,
        "PRC": prc,
        "PRM": prm,
        "PRD": prd
    })
    .to_string()
}

fn make_sample(n: usize) -> RawSnapshot {
    parse_snapshot(&make_sample_json(n)).expect("bench sample parses")
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let text = make_sample_json(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| {
                let raw = parse_snapshot(black_box(text)).expect("bench parse failed");
                black_box(raw);
            })
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_500_1000_2000");

    for mode in [SortMode::Cpu, SortMode::Disk] {
        let config = DisplayConfig {
            sort_mode: mode,
            ..DisplayConfig::default()
        };
        for size in [500usize, 1000, 2000] {
            let raw = make_sample(size);
            group.bench_with_input(
                BenchmarkId::new(mode.label(), size),
                &raw,
                |b, raw| {
                    b.iter(|| {
                        let out = normalize(black_box(raw.clone()), black_box(&config))
                            .expect("bench normalize failed");
                        black_box(out);
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_annotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotate_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let snapshot = normalize(make_sample(size), &DisplayConfig::default())
            .expect("bench normalize failed");
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| {
                let doc = annotate_snapshot(black_box(snapshot)).expect("bench annotate failed");
                black_box(doc);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_normalize, bench_annotate);
criterion_main!(benches);
