//! Human-readable renderings of raw counters.
//!
//! The thresholds and odd corners (no zero padding in short durations, the
//! x10 on negative byte counts) are what the dashboard templates were built
//! around, so they are kept as-is.

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Keep at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// The last `max_chars` characters of `s`.
pub fn tail_chars(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max_chars)).collect()
}

/// Fixed-point rendering where exact ties round away from zero.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    // Negative zero prints without a sign.
    let value = if value == 0.0 { 0.0 } else { value };
    let scale = 10f64.powi(digits as i32);
    let scaled = value * scale;
    if (scaled.fract().abs() - 0.5).abs() < f64::EPSILON && is_exact_tie(value, digits) {
        let nudge = value.signum() * 0.1 / scale;
        return format!("{:.*}", digits, value + nudge);
    }
    format!("{:.*}", digits, value)
}

fn is_exact_tie(value: f64, digits: usize) -> bool {
    let exact = format!("{:.1100}", value.abs());
    let Some(dot) = exact.find('.') else {
        return false;
    };
    let frac = &exact[dot + 1..];
    let mut rest = frac[digits..].chars();
    rest.next() == Some('5') && rest.all(|c| c == '0')
}

/// Half-way cases go toward positive infinity.
pub fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 { floor + 1.0 } else { floor }
}

/// Share of the per-core tick budget, e.g. `"42%"`.
pub fn cpu_percent(value: f64, percputot: f64) -> String {
    if percputot == 0.0 {
        return "0%".to_string();
    }
    format!("{}%", to_fixed(round_half_up(value * 100.0 / percputot), 0))
}

/// Clock frequency given in MHz.
pub fn cpu_frequency(mhz: f64) -> String {
    if mhz < 1000.0 {
        return format!("{mhz}MHz");
    }
    let mut scaled = mhz / 1000.0;
    let mut prefix = 'G';
    if scaled >= 1000.0 {
        prefix = 'T';
        scaled /= 1000.0;
    }
    let digits = if scaled < 10.0 {
        2
    } else if scaled < 100.0 {
        1
    } else {
        0
    };
    format!("{}{prefix}Hz", to_fixed(scaled, digits))
}

pub fn psi_percent(value: f64) -> String {
    format!("{}%", to_fixed(round_half_up(value), 0))
}

/// Clock ticks at `hertz` rendered as `1.5s`, `4m10s`, `1h48m` or `2d3h`.
pub fn duration(ticks: f64, hertz: u64) -> String {
    let hertz = hertz.max(1) as f64;
    let ms = (ticks * 1000.0 / hertz).trunc() as i64;

    if ms < 100_000 {
        return format!("{}.{}s", ms / 1000, ms % 1000 / 10);
    }

    let secs = (ms + 500) / 1000;
    if secs < 6000 {
        return format!("{}m{}s", secs / 60, secs % 60);
    }

    let mins = (secs + 30) / 60;
    if mins < 6000 {
        return format!("{}h{}m", mins / 60, mins % 60);
    }

    let hours = (mins + 30) / 60;
    format!("{}d{}h", hours / 24, hours % 24)
}

/// Binary-scaled size. A tier is entered once the value reaches 0.8 of the
/// next unit.
pub fn bytes(value: f64) -> String {
    let (prefix, value) = if value < 0.0 {
        ("-", -value * 10.0)
    } else {
        ("", value)
    };

    let scaled = if value < KB {
        format!("{value}B")
    } else if value < MB * 0.8 {
        format!("{}KB", to_fixed(value / KB, 1))
    } else if value < GB * 0.8 {
        format!("{}MB", to_fixed(value / MB, 1))
    } else if value < TB * 0.8 {
        format!("{}G", to_fixed(value / GB, 1))
    } else {
        format!("{}T", to_fixed(value / TB, 1))
    };
    format!("{prefix}{scaled}")
}

/// Decimal-scaled link rate, input in Kbps.
pub fn bandwidth(kbps: f64) -> String {
    const UNIT: f64 = 1000.0;

    if kbps < UNIT {
        format!("{kbps} Kbps")
    } else if kbps < UNIT * UNIT {
        format!("{} Mbps", to_fixed(kbps / UNIT, 2))
    } else if kbps < UNIT * UNIT * UNIT {
        format!("{} Gbps", to_fixed(kbps / (UNIT * UNIT), 2))
    } else {
        format!("{} Tbps", to_fixed(kbps / (UNIT * UNIT * UNIT), 2))
    }
}

/// Appends `%` to an already computed ratio.
pub fn percent(value: &str) -> String {
    format!("{value}%")
}
