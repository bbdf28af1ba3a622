//! Number formatting for CLI output.

pub fn format_currency(value: f64, currency: &str) -> String {
    if currency == "USD" {
        format!("${:.2}", value)
    } else {
        format!("{:.2} {}", value, currency)
    }
}

pub fn format_percentage(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value)
}

/// 1.2K / 3.4M / 5.6B with an optional unit.
pub fn format_large_number(value: f64, unit: &str) -> String {
    let abs = value.abs();
    let s = if abs >= 1e9 {
        format!("{:.1}B {}", value / 1e9, unit)
    } else if abs >= 1e6 {
        format!("{:.1}M {}", value / 1e6, unit)
    } else if abs >= 1e3 {
        format!("{:.1}K {}", value / 1e3, unit)
    } else {
        format!("{:.1} {}", value, unit)
    };
    s.trim().to_string()
}
