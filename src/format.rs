use pretty_dtoa::{dtoa, FmtFloatConfig};

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(6);

/// Formats a real value for a dump cell with six significant digits.
///
/// Values that are not defined are written as `nan` so that every cell
/// parses back as a float.
pub fn format_real(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x == f64::INFINITY {
        "inf".to_string()
    } else if x == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        dtoa(x, FLOAT_CONFIG)
    }
}

/// Returns `x` when it is a usable base quantity, NaN otherwise.
pub fn positive_or_nan(x: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        f64::NAN
    }
}
