//! Console formatting for the report tables.

pub fn format_usd(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{sign}${:.2}B", abs / 1e9)
    } else if abs >= 1e6 {
        format!("{sign}${:.2}M", abs / 1e6)
    } else if abs >= 1e3 {
        format!("{sign}${:.2}K", abs / 1e3)
    } else {
        format!("{sign}${abs:.2}")
    }
}

pub fn format_pct(value: f64) -> String {
    format!("{value:.2}%")
}

pub fn format_amount(value: f64) -> String {
    if value.abs() >= 1.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.6}")
    }
}

/// Horizontal bar of `width` cells filled in proportion to `share` (0-100).
pub fn ascii_bar(share: f64, width: usize) -> String {
    let share = if share.is_finite() { share.clamp(0.0, 100.0) } else { 0.0 };
    let filled = ((share / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn separator(width: usize) -> String {
    "─".repeat(width)
}

pub fn print_header(title: &str) {
    let width = title.chars().count().max(60);
    println!();
    println!("{}", "═".repeat(width));
    println!("{title}");
    println!("{}", "═".repeat(width));
}
