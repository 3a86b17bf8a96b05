use log::warn;

use crate::frame::Frame;

/// Render every non-missing value of the named columns as a canonical base-10
/// integer string.  Columns holding integers with gaps arrive float-widened
/// from csv exports ("123.0"); left alone they would corrupt INTEGER columns
/// on bulk insert.  Missing values stay missing, values that cannot be read
/// as a number pass through unchanged.
///
/// Returns the number of values left unconverted per column so silent
/// data-quality problems stay visible without changing load semantics.
pub fn coerce_integer_columns(frame: &mut Frame, columns: &[&str]) -> Vec<(String, usize)> {
    let mut report = Vec::new();
    for &name in columns {
        let Some(idx) = frame.column_index(name) else {
            continue;
        };
        let mut unconverted = 0usize;
        for row in frame.rows.iter_mut() {
            if let Some(v) = &row[idx] {
                match integer_string(v) {
                    Some(s) => row[idx] = Some(s),
                    None => unconverted += 1,
                }
            }
        }
        if unconverted > 0 {
            warn!(
                "column {}: {} values could not be rendered as integers and were passed through",
                name, unconverted
            );
        }
        report.push((name.to_string(), unconverted));
    }
    report
}

/// "123" -> "123", "123.0" -> "123", "-7.9" -> "-7" (truncation toward zero),
/// "007" -> "7".  Non-numeric and non-finite input yields `None`.
fn integer_string(v: &str) -> Option<String> {
    let t = v.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Some(i.to_string());
    }
    match t.parse::<f64>() {
        // the cast saturates outside the i64 range, which would rewrite the
        // value instead of passing it through; reject those
        Ok(f) if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Some((f.trunc() as i64).to_string())
        }
        _ => None,
    }
}
