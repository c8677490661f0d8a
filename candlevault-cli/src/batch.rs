//! Procedure files for `build-batch`.
//!
//! One build per non-blank line: `exchange symbol begin end interval [out_dir]`.
//! Lines starting with `#` are comments.

use anyhow::{bail, Context, Result};
use candlevault_core::domain::DateRange;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    /// 1-based line number in the procedure file.
    pub line: usize,
    pub exchange: String,
    pub symbol: String,
    pub range: DateRange,
    pub interval_secs: u32,
    pub out_dir: Option<PathBuf>,
}

/// Parse a procedure file. Each entry is either an item or the error for
/// that line; one bad line does not hide the others.
pub fn parse_procedure(text: &str) -> Vec<(usize, Result<BatchItem>)> {
    text.lines()
        .enumerate()
        .map(|(idx, raw)| (idx + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, content)| (line, parse_line(line, content)))
        .collect()
}

fn parse_line(line: usize, content: &str) -> Result<BatchItem> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    let [exchange, symbol, begin, end, interval, rest @ ..] = fields.as_slice() else {
        bail!("expected `exchange symbol begin end interval [out_dir]`, got {} field(s)", fields.len());
    };
    let out_dir = match rest {
        [] => None,
        [dir] => Some(PathBuf::from(dir)),
        _ => bail!("too many fields ({})", fields.len()),
    };

    let range = DateRange::parse(begin, end)?;
    let interval_secs: u32 = interval
        .parse()
        .with_context(|| format!("invalid interval '{interval}'"))?;

    Ok(BatchItem {
        line,
        exchange: exchange.to_ascii_lowercase(),
        symbol: symbol.to_string(),
        range,
        interval_secs,
        out_dir,
    })
}
