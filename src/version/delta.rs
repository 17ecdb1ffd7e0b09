//! Line-oriented delta encoding.
//!
//! # Wire Format
//!
//! One record per line, records joined with `\n`:
//!
//! ```text
//! =  / =<n>     keep 1 / n base lines
//! -  / -<n>     skip 1 / n base lines
//! ~<text>       replace one base line with <text>
//! \<text>       emit <text>, which starts with a marker character
//! <text>        emit <text>
//! ```
//!
//! Lines are split on `\n` only, so `\r` and trailing whitespace survive
//! untouched and joining the output with `\n` reproduces the input byte for
//! byte. The payload does not name its base. Callers keep the base's
//! [`checksum`] next to the payload and pass it to [`verify_base`] before
//! replaying, which turns a wrong base into
//! [`CompressError::DeltaBaseMismatch`] instead of wrong text.

use serde::{Deserialize, Serialize};

use crate::error::{CompressError, Result};

/// Largest LCS table (cells) before the diff degrades to replace-all
const MAX_LCS_CELLS: usize = 4_000_000;

/// Record prefixes that carry an op rather than a literal line
const MARKERS: [char; 4] = ['=', '-', '~', '\\'];

/// One edit against the base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    /// Copy base lines
    Keep(usize),
    /// Skip base lines
    Delete(usize),
    /// Emit a new line
    Insert(String),
}

/// A line range that differs between two texts (0-based line indexes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDifference {
    /// First differing line in the original
    pub original_start: usize,
    /// Lines of the original in the range
    pub original_len: usize,
    /// First differing line in the other text
    pub changed_start: usize,
    /// Lines of the other text in the range
    pub changed_len: usize,
}

/// Edit script turning a base version into a newer one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Edit script
    pub ops: Vec<DeltaOp>,
}

impl Delta {
    /// Compute the delta turning `base` into `current`
    pub fn compute(base: &str, current: &str) -> Self {
        Self {
            ops: diff_lines(base, current),
        }
    }

    /// Serialize to the compact wire format
    pub fn encode(&self) -> String {
        let mut records: Vec<String> = Vec::with_capacity(self.ops.len());
        let mut ops = self.ops.iter().peekable();
        while let Some(op) = ops.next() {
            let record = match op {
                DeltaOp::Keep(n) => count_record('=', *n),
                DeltaOp::Delete(1) => match ops.peek() {
                    Some(DeltaOp::Insert(line)) => {
                        ops.next();
                        format!("~{line}")
                    },
                    _ => count_record('-', 1),
                },
                DeltaOp::Delete(n) => count_record('-', *n),
                DeltaOp::Insert(line) if line.starts_with(MARKERS) => format!("\\{line}"),
                DeltaOp::Insert(line) => line.clone(),
            };
            records.push(record);
        }
        records.join("\n")
    }

    /// Parse the wire format
    pub fn parse(encoded: &str) -> Result<Self> {
        let mut ops = Vec::new();
        for record in encoded.split('\n') {
            // Markers are ASCII, so slicing at 1 stays on a char boundary
            match record.as_bytes().first() {
                Some(b'=') => ops.push(DeltaOp::Keep(parse_count(&record[1..])?)),
                Some(b'-') => ops.push(DeltaOp::Delete(parse_count(&record[1..])?)),
                Some(b'~') => {
                    ops.push(DeltaOp::Delete(1));
                    ops.push(DeltaOp::Insert(record[1..].to_string()));
                },
                Some(b'\\') => ops.push(DeltaOp::Insert(record[1..].to_string())),
                _ => ops.push(DeltaOp::Insert(record.to_string())),
            }
        }
        Ok(Self { ops })
    }

    /// Replay against `base`.
    ///
    /// Fails with `DeltaCorrupt` when the script does not consume `base`
    /// exactly. Use [`verify_base`] first to reject a wrong base outright.
    pub fn apply(&self, base: &str) -> Result<String> {
        let base_lines = split_lines(base);
        let mut out: Vec<&str> = Vec::with_capacity(base_lines.len());
        let mut cursor: usize = 0;
        for op in &self.ops {
            match op {
                DeltaOp::Keep(n) => {
                    let end = cursor.saturating_add(*n);
                    let kept = base_lines.get(cursor..end).ok_or_else(|| {
                        CompressError::DeltaCorrupt(format!("Keep past end of base at line {cursor}"))
                    })?;
                    out.extend_from_slice(kept);
                    cursor = end;
                },
                DeltaOp::Delete(n) => {
                    cursor = cursor.saturating_add(*n);
                    if cursor > base_lines.len() {
                        return Err(CompressError::DeltaCorrupt(format!(
                            "Delete past end of base at line {cursor}"
                        )));
                    }
                },
                DeltaOp::Insert(line) => out.push(line.as_str()),
            }
        }

        if cursor != base_lines.len() {
            return Err(CompressError::DeltaCorrupt(format!(
                "Delta consumed {cursor} of {} base lines",
                base_lines.len()
            )));
        }
        Ok(out.join("\n"))
    }
}

fn count_record(marker: char, n: usize) -> String {
    if n == 1 {
        marker.to_string()
    } else {
        format!("{marker}{n}")
    }
}

fn parse_count(n: &str) -> Result<usize> {
    if n.is_empty() {
        return Ok(1);
    }
    n.parse()
        .map_err(|e| CompressError::DeltaCorrupt(format!("Bad line count {n:?}: {e}")))
}

/// CRC-32 of a version's bytes
pub fn checksum(text: &str) -> u32 {
    crc32fast::hash(text.as_bytes())
}

/// Check that `base` is the version whose checksum was recorded
pub fn verify_base(base: &str, expected: u32) -> Result<()> {
    let actual = checksum(base);
    if actual == expected {
        Ok(())
    } else {
        Err(CompressError::DeltaBaseMismatch { expected, actual })
    }
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Line diff from `base` to `current` as a minimal-ish edit script.
///
/// Common prefix and suffix are trimmed first; the middle is diffed by LCS,
/// or replaced wholesale when the LCS table would be too large.
pub fn diff_lines(base: &str, current: &str) -> Vec<DeltaOp> {
    let a = split_lines(base);
    let b = split_lines(current);

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut ops = Vec::new();
    push_keep(&mut ops, prefix);

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];
    let cells = (mid_a.len() + 1).saturating_mul(mid_b.len() + 1);
    if cells > MAX_LCS_CELLS {
        push_delete(&mut ops, mid_a.len());
        ops.extend(mid_b.iter().map(|line| DeltaOp::Insert(line.to_string())));
    } else {
        lcs_script(mid_a, mid_b, &mut ops);
    }

    push_keep(&mut ops, suffix);
    ops
}

fn lcs_script(a: &[&str], b: &[&str], ops: &mut Vec<DeltaOp>) {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            push_keep(ops, 1);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            push_delete(ops, 1);
            i += 1;
        } else {
            ops.push(DeltaOp::Insert(b[j].to_string()));
            j += 1;
        }
    }
    push_delete(ops, n - i);
    ops.extend(b[j..].iter().map(|line| DeltaOp::Insert(line.to_string())));
}

fn push_keep(ops: &mut Vec<DeltaOp>, n: usize) {
    if n == 0 {
        return;
    }
    match ops.last_mut() {
        Some(DeltaOp::Keep(count)) => *count += n,
        _ => ops.push(DeltaOp::Keep(n)),
    }
}

fn push_delete(ops: &mut Vec<DeltaOp>, n: usize) {
    if n == 0 {
        return;
    }
    match ops.last_mut() {
        Some(DeltaOp::Delete(count)) => *count += n,
        _ => ops.push(DeltaOp::Delete(n)),
    }
}

/// Group an edit script into differing line ranges
pub fn differences(ops: &[DeltaOp]) -> Vec<LineDifference> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    let mut open: Option<LineDifference> = None;

    for op in ops {
        match op {
            DeltaOp::Keep(n) => {
                out.extend(open.take());
                i += n;
                j += n;
            },
            DeltaOp::Delete(n) => {
                let diff = open.get_or_insert_with(|| LineDifference {
                    original_start: i,
                    original_len: 0,
                    changed_start: j,
                    changed_len: 0,
                });
                diff.original_len += n;
                i += n;
            },
            DeltaOp::Insert(_) => {
                let diff = open.get_or_insert_with(|| LineDifference {
                    original_start: i,
                    original_len: 0,
                    changed_start: j,
                    changed_len: 0,
                });
                diff.changed_len += 1;
                j += 1;
            },
        }
    }
    out.extend(open);
    out
}

/// Lines kept by an edit script
pub fn kept_lines(ops: &[DeltaOp]) -> usize {
    ops.iter()
        .map(|op| match op {
            DeltaOp::Keep(n) => *n,
            _ => 0,
        })
        .sum()
}
