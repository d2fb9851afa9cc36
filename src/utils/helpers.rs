/// Helper utilities shared by the viewers and the config loader

use chrono::format::{Item, StrftimeItems};

/// Round `value` to `places` decimals, half away from zero.
///
/// The scaled value is first snapped to 6 decimals so that a literal such as
/// `999.995`, stored in binary as `999.99499999...`, still rounds up.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let factor = 10f64.powi(places as i32);
    let scaled = value * factor;
    // Too large to carry any decimals anyway
    if !scaled.is_finite() {
        return value;
    }
    let snapped = format!("{:.6}", scaled).parse::<f64>().unwrap_or(scaled);
    snapped.round() / factor
}

/// Whether `format` is a strftime pattern chrono can render
pub fn is_valid_time_format(format: &str) -> bool {
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Whether `path` can be mounted as an absolute route
pub fn is_valid_route_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains("//")
        && !path.contains(|c: char| c.is_whitespace() || c == ':' || c == '*' || c == '{' || c == '}')
}
