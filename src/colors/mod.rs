use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

/// Preset swatches offered by the tag editor.
pub const PALETTE: [&str; 10] = [
    "#EF4444", "#F97316", "#F59E0B", "#84CC16", "#10B981", "#06B6D4", "#3B82F6", "#6366F1",
    "#8B5CF6", "#EC4899",
];

pub const DEFAULT_TAG_COLOR: &str = PALETTE[6];

/// A light, low-saturation color for imported folder tags.
pub fn generate_pastel_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    let hue = rng.gen_range(0..360);
    let saturation = rng.gen_range(50..70);
    let lightness = rng.gen_range(75..85);
    format!("hsl({hue}, {saturation}%, {lightness}%)")
}

static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid regex"));

static HSL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^hsl\(\s*(\d{1,3}(?:\.\d+)?)\s*,\s*(\d{1,3}(?:\.\d+)?)%\s*,\s*(\d{1,3}(?:\.\d+)?)%\s*\)$",
    )
    .expect("valid regex")
});

/// `#RGB`, `#RRGGBB` or `hsl(h, s%, l%)` with components in range.
/// Components may carry a fractional part, e.g. `hsl(123, 57.38%, 79.1%)`.
pub fn is_valid_color(color: &str) -> bool {
    let color = color.trim();
    if HEX_RE.is_match(color) {
        return true;
    }
    let Some(caps) = HSL_RE.captures(color) else {
        return false;
    };
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
    matches!(
        (part(1), part(2), part(3)),
        (Some(h), Some(s), Some(l)) if h < 360.0 && s <= 100.0 && l <= 100.0
    )
}
