//! Row serialisation: `<index>: <n1>,<d1> <n2>,<d2> ...`, one line per vertex.

use std::io::Write;

use crate::error::Result;
use crate::search::NeighbourRow;

/// Significant digits used when rendering distances (iostream default).
pub const SIGNIFICANT_DIGITS: usize = 6;

/// Renders `value` in `%g` style with [`SIGNIFICANT_DIGITS`] digits:
/// `41.7032`, `0.5`, `1e+15`.
pub fn format_distance(value: f64) -> String {
    if value == 0.0 { return "0".to_string(); }
    if value.is_nan() { return "nan".to_string(); }
    if value.is_infinite() { return if value > 0.0 { "inf" } else { "-inf" }.to_string(); }

    let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else { return sci };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.unsigned_abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') { s.trim_end_matches('0').trim_end_matches('.') } else { s }
}

/// Writes one row followed by a newline.
pub fn write_row<W: Write>(out: &mut W, row: &NeighbourRow) -> std::io::Result<()> {
    write!(out, "{}:", row.source)?;
    for &(v, d) in &row.neighbours {
        write!(out, " {},{}", v, format_distance(d))?;
    }
    writeln!(out)
}

/// Serialises rows to a single output stream.
pub struct RowEmitter<W: Write> {
    out: W,
    rows: u64,
}

impl<W: Write> RowEmitter<W> {
    pub fn new(out: W) -> Self { Self { out, rows: 0 } }
    pub fn rows_written(&self) -> u64 { self.rows }

    pub fn emit(&mut self, row: &NeighbourRow) -> Result<()> {
        write_row(&mut self.out, row)?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}
