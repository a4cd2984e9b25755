//! Persistence of mask and epoch state.
//!
//! * 0/1 mask files: whitespace-separated `0`/`1` tokens, one per epoch.
//! * CHEP files: `<display epoch><TAB><channel>` per excluded pair, no header.
//! * Masked-run export: `<class><TAB><start s><TAB><stop s>` per merged run.
//! * Epoch state: a safetensors file with `start`, `stop` (U64 ticks),
//!   `display` (I32) and `mask` (U8) tensors of one entry per epoch.
use anyhow::{bail, ensure, Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::interval::Tp;
use crate::timeline::Timeline;

// ── 0/1 mask files ────────────────────────────────────────────────────────────

/// Parse a 0/1 mask (`true` = excluded).
pub fn parse_mask(text: &str) -> Result<Vec<bool>> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, tok)| match tok {
            "0" => Ok(false),
            "1" => Ok(true),
            other => bail!("mask entry {}: expected 0 or 1, got '{other}'", i + 1),
        })
        .collect()
}

pub fn read_mask_file(path: &Path) -> Result<Vec<bool>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading mask file {}", path.display()))?;
    parse_mask(&text)
}

/// One `0`/`1` line per epoch, in epoch order.
pub fn write_mask_file(path: &Path, tl: &Timeline) -> Result<()> {
    let mut out = String::with_capacity(tl.n_epochs() * 2);
    for &b in tl.mask().bits() {
        out.push(if b { '1' } else { '0' });
        out.push('\n');
    }
    std::fs::write(path, out).with_context(|| format!("writing mask file {}", path.display()))
}

// ── CHEP text format ──────────────────────────────────────────────────────────

/// Parse `(display epoch, channel)` pairs.  Blank lines are skipped.
pub fn parse_chep(text: &str) -> Result<Vec<(usize, String)>> {
    let mut pairs = vec![];
    for (ln, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (ep, ch) = line
            .split_once('\t')
            .with_context(|| format!("CHEP line {}: expected <epoch>\\t<channel>", ln + 1))?;
        let ep: usize = ep
            .trim()
            .parse()
            .with_context(|| format!("CHEP line {}: bad epoch number '{ep}'", ln + 1))?;
        ensure!(!ch.is_empty(), "CHEP line {}: empty channel label", ln + 1);
        pairs.push((ep, ch.to_string()));
    }
    Ok(pairs)
}

/// Load a CHEP file into `tl`, replacing its CHEP state or merging into it.
///
/// Returns the number of pairs read.
pub fn load_chep(path: &Path, tl: &mut Timeline, merge: bool) -> Result<usize> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading CHEP file {}", path.display()))?;
    let pairs = parse_chep(&text)?;
    let n = tl
        .load_chep(&pairs, merge)
        .with_context(|| format!("applying CHEP file {}", path.display()))?;
    log::info!("loaded {n} CHEP pairs from {} ({})", path.display(), if merge { "merge" } else { "replace" });
    Ok(n)
}

pub fn write_chep(path: &Path, tl: &Timeline) -> Result<()> {
    let mut f = std::fs::File::create(path)
        .with_context(|| format!("creating CHEP file {}", path.display()))?;
    for (d, ch) in tl.chep_pairs() {
        writeln!(f, "{d}\t{ch}")?;
    }
    Ok(())
}

// ── Masked-run export ─────────────────────────────────────────────────────────

/// Write merged runs of masked epochs as `class\tstart\tstop` (seconds).
pub fn write_masked_annotations(path: &Path, tl: &Timeline, class: &str) -> Result<usize> {
    let tps = tl.config().ticks_per_second;
    let runs = tl.masked_intervals();
    let mut f = std::fs::File::create(path)
        .with_context(|| format!("creating annotation file {}", path.display()))?;
    for iv in &runs {
        let (s, e) = iv.as_secs(tps);
        writeln!(f, "{class}\t{s}\t{e}")?;
    }
    Ok(runs.len())
}

// ── Low-level safetensors parser ──────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    ensure!(bytes.len() >= 8, "safetensors file too small");
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    let end = 8usize.checked_add(n).filter(|&e| e <= bytes.len()).context("safetensors header overruns file")?;
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end]).context("failed to parse safetensors header")?;
    Ok((header, end))
}

/// Raw bytes of tensor `name`, checking its dtype.
fn tensor_bytes<'a>(
    bytes: &'a [u8],
    header: &HashMap<String, serde_json::Value>,
    data_start: usize,
    name: &str,
    dtype: &str,
) -> Result<&'a [u8]> {
    let entry = header.get(name).with_context(|| format!("missing '{name}' tensor"))?;
    let got = entry["dtype"].as_str().unwrap_or("?");
    ensure!(got == dtype, "tensor '{name}': dtype {got}, expected {dtype}");
    let offsets = entry["data_offsets"]
        .as_array()
        .with_context(|| format!("tensor '{name}': no data_offsets"))?;
    let off = |i: usize| -> Result<usize> {
        offsets
            .get(i)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .with_context(|| format!("tensor '{name}': bad data_offsets"))
    };
    let (s, e) = (data_start + off(0)?, data_start + off(1)?);
    ensure!(s <= e && e <= bytes.len(), "tensor '{name}': data out of bounds");
    Ok(&bytes[s..e])
}

/// Minimal safetensors writer for the integer tensors of the epoch state.
#[derive(Debug, Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_u64(&mut self, name: &str, data: &[u64]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "U64", vec![data.len()]));
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", vec![data.len()]));
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", vec![data.len()]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter().chain(std::iter::repeat(b' ').take(pad)).collect();
        let mut f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Epoch state ───────────────────────────────────────────────────────────────

/// Epoch table and mask, one entry per original epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochState {
    pub start: Vec<Tp>,
    pub stop: Vec<Tp>,
    pub display: Vec<usize>,
    pub mask: Vec<bool>,
}

impl EpochState {
    pub fn from_timeline(tl: &Timeline) -> Self {
        let n = tl.n_epochs();
        Self {
            start: tl.epochs().iter().map(|e| e.start).collect(),
            stop: tl.epochs().iter().map(|e| e.stop).collect(),
            display: (0..n).map(|e| tl.display_epoch(e).unwrap_or(e + 1)).collect(),
            mask: tl.mask().bits().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let display = self
            .display
            .iter()
            .map(|&d| i32::try_from(d).context("display number exceeds i32"))
            .collect::<Result<Vec<i32>>>()?;
        let mut w = StWriter::new();
        w.add_u64("start", &self.start);
        w.add_u64("stop", &self.stop);
        w.add_i32("display", &display);
        w.add_u8("mask", &self.mask.iter().map(|&b| b as u8).collect::<Vec<_>>());
        w.write(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;
        let u64s = |name: &str| -> Result<Vec<u64>> {
            let raw = tensor_bytes(&bytes, &header, data_start, name, "U64")?;
            ensure!(raw.len() % 8 == 0, "tensor '{name}': ragged U64 data");
            Ok(raw
                .chunks_exact(8)
                .map(|b| {
                    let mut a = [0u8; 8];
                    a.copy_from_slice(b);
                    u64::from_le_bytes(a)
                })
                .collect())
        };
        let start = u64s("start")?;
        let stop = u64s("stop")?;
        let raw = tensor_bytes(&bytes, &header, data_start, "display", "I32")?;
        ensure!(raw.len() % 4 == 0, "tensor 'display': ragged I32 data");
        let display = raw
            .chunks_exact(4)
            .map(|b| {
                let d = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                usize::try_from(d).context("negative display number")
            })
            .collect::<Result<Vec<usize>>>()?;
        let mask: Vec<bool> = tensor_bytes(&bytes, &header, data_start, "mask", "U8")?
            .iter()
            .map(|&b| b != 0)
            .collect();
        let n = start.len();
        ensure!(
            stop.len() == n && display.len() == n && mask.len() == n,
            "epoch state tensors disagree in length"
        );
        Ok(Self { start, stop, display, mask })
    }

    /// Restore the saved mask into `tl`, whose epoch table must match.
    pub fn apply(&self, tl: &mut Timeline) -> Result<()> {
        ensure!(
            self.len() == tl.n_epochs(),
            "saved state has {} epochs, timeline has {}",
            self.len(),
            tl.n_epochs()
        );
        for (e, ep) in tl.epochs().iter().enumerate() {
            if ep.start != self.start[e] || ep.stop != self.stop[e] {
                bail!("epoch {} differs: saved [{}, {}), timeline {ep}", e + 1, self.start[e], self.stop[e]);
            }
        }
        tl.restore_mask(&self.mask)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_tokens() {
        assert_eq!(parse_mask("0 1\n1\t0\n").unwrap(), vec![false, true, true, false]);
        assert!(parse_mask("0 2").is_err());
        assert!(parse_mask("").unwrap().is_empty());
    }

    #[test]
    fn chep_lines() {
        let p = parse_chep("3\tC3\n\n12\tEEG Fpz-Cz\r\n").unwrap();
        assert_eq!(p, vec![(3, "C3".to_string()), (12, "EEG Fpz-Cz".to_string())]);
        assert!(parse_chep("3 C3").is_err());
        assert!(parse_chep("x\tC3").is_err());
    }

    #[test]
    fn truncated_header_rejected() {
        let mut bytes = 100u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(parse_header(&bytes).is_err());
    }
}
