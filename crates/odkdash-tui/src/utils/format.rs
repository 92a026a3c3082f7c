use odkdash_core::analytics::{Bin, BoxStats};

/// Shading from empty to full, used for density strips
const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Whole numbers without decimals, everything else to two places
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

pub fn format_optional(v: Option<f64>) -> String {
    v.map(format_number).unwrap_or_else(|| "-".to_string())
}

/// A horizontal bar `width` cells wide at 100%.
pub fn share_bar(share: f64, width: usize) -> String {
    let filled = (share.clamp(0.0, 1.0) * width as f64).round() as usize;
    "█".repeat(filled)
}

/// One-line box plot of `stats` over the axis `lo..=hi`.
///
/// `├─` whiskers, `▒` box, `│` median, `•` outliers.
pub fn box_line(stats: &BoxStats, lo: f64, hi: f64, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let last = width - 1;
    let span = if hi > lo { hi - lo } else { 1.0 };
    let pos = |v: f64| (((v - lo) / span) * last as f64).round().clamp(0.0, last as f64) as usize;

    let mut cells = vec![' '; width];
    let mut fill = |a: f64, b: f64, c: char| {
        let (from, to) = (pos(a.min(b)), pos(a.max(b)));
        for cell in &mut cells[from..=to] {
            *cell = c;
        }
    };
    fill(stats.lower_whisker, stats.upper_whisker, '─');
    fill(stats.q1, stats.q3, '▒');

    cells[pos(stats.lower_whisker)] = '├';
    cells[pos(stats.upper_whisker)] = '┤';
    cells[pos(stats.median)] = '│';
    for o in &stats.outliers {
        cells[pos(*o)] = '•';
    }
    cells.into_iter().collect()
}

/// Density bins (0.0..=1.0) as a strip of shade characters.
pub fn density_strip(bins: &[Bin]) -> String {
    bins.iter()
        .map(|b| {
            let idx = (b.value.clamp(0.0, 1.0) * (SHADES.len() - 1) as f64).round() as usize;
            SHADES[idx]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use odkdash_core::analytics::box_stats;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Ñandú Ñandú", 8), "Ñandú...");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(2.345), "2.35");
        assert_eq!(format_optional(None), "-");
        assert_eq!(format_optional(Some(0.5)), "0.50");
    }

    #[test]
    fn test_share_bar() {
        assert_eq!(share_bar(0.5, 10), "█████");
        assert_eq!(share_bar(1.5, 4), "████");
        assert_eq!(share_bar(0.0, 4), "");
    }

    #[test]
    fn test_box_line() {
        let stats = box_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(box_line(&stats, 1.0, 5.0, 9), "├─▒▒│▒▒─┤");
        assert_eq!(box_line(&stats, 1.0, 5.0, 0), "");
    }

    #[test]
    fn test_box_line_marks_outliers() {
        let stats = box_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        let line = box_line(&stats, 1.0, 100.0, 20);
        assert_eq!(line.chars().count(), 20);
        assert!(line.ends_with('•'));
    }

    #[test]
    fn test_density_strip() {
        let bins: Vec<Bin> = [0.0, 0.25, 0.5, 1.0]
            .iter()
            .map(|v| Bin { lower: 0.0, upper: 1.0, value: *v })
            .collect();
        assert_eq!(density_strip(&bins), " ░▒█");
    }
}
