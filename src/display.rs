//! Field-name driven rendering of a normalized snapshot for the templates.
//!
//! Each scalar is classified by its key alone, wherever it appears in the
//! document. Unknown keys are left untouched.

use serde_json::Value;
use thiserror::Error;

use crate::format;
use crate::normalize::NormalizedSnapshot;
use crate::sample::numeric::Numeric;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Jiffies as a share of the per-core tick budget.
    CpuShare,
    Pressure,
    Frequency,
    /// Clock ticks as elapsed time.
    Duration,
    Bytes,
    Bandwidth,
    Percent,
}

const CPU_SHARE: &[&str] = &[
    "stime", "utime", "ntime", "itime", "wtime", "Itime", "Stime", "steal", "guest",
];
const PRESSURE: &[&str] = &["cpusome", "memsome", "memfull", "iosome", "iofull"];
const DURATION: &[&str] = &["stime_unit_time", "utime_unit_time", "rundelay", "blkdelay"];
const BYTES: &[&str] = &[
    "buffermem",
    "cachedrt",
    "cachemem",
    "commitlim",
    "committed",
    "freemem",
    "freeswap",
    "filepage",
    "physmem",
    "rgrow",
    "rsz",
    "shmem",
    "shmrss",
    "shmswp",
    "slabmem",
    "swcac",
    "totmem",
    "totswap",
    "slabreclaim",
    "pagetables",
    "vexec",
    "vdata",
    "vgrow",
    "vlibs",
    "vlock",
    "vmem",
    "vstack",
    "wsz",
    "rmem",
    "pmem",
    "vswap",
    "tcpsk",
    "udpsk",
    "dirtymem",
    "active",
    "mbm_total",
    "mbm_local",
    "inactive",
];
const BANDWIDTH: &[&str] = &["rbyte", "sbyte", "speed"];
const PERCENT: &[&str] = &["cpubusy", "membusy", "diskbusy", "lvmbusy", "frag", "occupancy"];

pub fn classify(field: &str) -> Option<FieldKind> {
    let kinds = [
        (CPU_SHARE, FieldKind::CpuShare),
        (PRESSURE, FieldKind::Pressure),
        (&["freq"][..], FieldKind::Frequency),
        (DURATION, FieldKind::Duration),
        (BYTES, FieldKind::Bytes),
        (BANDWIDTH, FieldKind::Bandwidth),
        (PERCENT, FieldKind::Percent),
    ];
    kinds
        .into_iter()
        .find(|(names, _)| names.contains(&field))
        .map(|(_, kind)| kind)
}

/// Per-sample denominators the formatters need.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayContext {
    pub percputot: f64,
    pub hertz: u64,
}

impl DisplayContext {
    pub fn from_snapshot(snapshot: &NormalizedSnapshot) -> Self {
        DisplayContext {
            percputot: snapshot.aggregates.percputot,
            hertz: snapshot.cpu.totals.hertz,
        }
    }
}

/// A classified field whose value is not a number. The field keeps its raw
/// value and the rest of the document is still rendered.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path}: `{field}` is not numeric: {value}")]
pub struct FieldError {
    pub path: String,
    pub field: String,
    pub value: String,
}

pub fn format_field(kind: FieldKind, value: f64, ctx: &DisplayContext) -> String {
    match kind {
        FieldKind::CpuShare => format::cpu_percent(value, ctx.percputot),
        FieldKind::Pressure => format::psi_percent(value),
        FieldKind::Frequency => format::cpu_frequency(value),
        FieldKind::Duration => format::duration(value, ctx.hertz),
        FieldKind::Bytes => format::bytes(value),
        FieldKind::Bandwidth => format::bandwidth(value),
        FieldKind::Percent => format::percent(&format_number(value)),
    }
}

/// Shortest decimal form, integers without a fraction.
fn format_number(value: f64) -> String {
    format!("{value}")
}

/// Render every classified scalar in `value` in place and return the fields
/// that could not be rendered.
pub fn annotate(value: &mut Value, ctx: &DisplayContext) -> Vec<FieldError> {
    let mut errors = Vec::new();
    annotate_at(value, "", ctx, &mut errors);
    for err in &errors {
        tracing::warn!(path = %err.path, field = %err.field, value = %err.value, "field left unformatted");
    }
    errors
}

/// Serialize a freshly normalized snapshot and annotate the copy. The
/// snapshot itself stays numeric.
pub fn annotate_snapshot(
    snapshot: &NormalizedSnapshot,
) -> Result<(Value, Vec<FieldError>), serde_json::Error> {
    let mut value = snapshot.to_value()?;
    let errors = annotate(&mut value, &DisplayContext::from_snapshot(snapshot));
    Ok((value, errors))
}

fn annotate_at(value: &mut Value, path: &str, ctx: &DisplayContext, errors: &mut Vec<FieldError>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match classify(key) {
                    Some(kind) if is_scalar(child) => {
                        if let Err(err) = render_scalar(child, kind, ctx) {
                            errors.push(FieldError {
                                path: child_path,
                                field: key.clone(),
                                value: err,
                            });
                        }
                    }
                    _ => annotate_at(child, &child_path, ctx, errors),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                annotate_at(item, &format!("{path}[{i}]"), ctx, errors);
            }
        }
        _ => {}
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

/// Replaces `value` with its rendering, or returns the raw text when it is
/// not numeric.
fn render_scalar(value: &mut Value, kind: FieldKind, ctx: &DisplayContext) -> Result<(), String> {
    if kind == FieldKind::Percent {
        return render_percent(value);
    }
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => match Numeric::parse(s) {
            Numeric::Number(v) => v,
            Numeric::Malformed(raw) => return Err(raw),
        },
        _ => return Ok(()),
    };
    *value = Value::String(format_field(kind, number, ctx));
    Ok(())
}

/// Percentages arrive already rounded, so the digits are kept as written and
/// only the sign is appended.
fn render_percent(value: &mut Value) -> Result<(), String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => match Numeric::parse(s) {
            Numeric::Number(_) => s.clone(),
            Numeric::Malformed(raw) => return Err(raw),
        },
        _ => return Ok(()),
    };
    *value = Value::String(format::percent(&text));
    Ok(())
}
