//! Structured output sinks for mask summaries.
//!
//! Every mask operation logs its [`MaskSummary`] through `log` and hands it
//! to the timeline's [`SummarySink`].
use std::io::Write;

use crate::mask::MaskSummary;

/// Receiver of mask summaries.
pub trait SummarySink {
    fn record(&mut self, summary: &MaskSummary);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl SummarySink for NullSink {
    fn record(&mut self, _summary: &MaskSummary) {}
}

/// Keeps every summary in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub summaries: Vec<MaskSummary>,
}

impl SummarySink for MemorySink {
    fn record(&mut self, summary: &MaskSummary) {
        self.summaries.push(summary.clone());
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SummarySink for JsonLinesSink<W> {
    fn record(&mut self, summary: &MaskSummary) {
        let line = match serde_json::to_string(summary) {
            Ok(l) => l,
            Err(e) => {
                log::error!("could not serialise mask summary: {e}");
                return;
            }
        };
        if let Err(e) = writeln!(self.out, "{line}") {
            log::error!("could not write mask summary: {e}");
        }
    }
}

/// Shared handle so callers can inspect a sink the timeline owns.
impl<S: SummarySink + ?Sized> SummarySink for std::rc::Rc<std::cell::RefCell<S>> {
    fn record(&mut self, summary: &MaskSummary) {
        self.borrow_mut().record(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::MaskMode;

    #[test]
    fn json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let mut s = MaskSummary::new("annot=N2", MaskMode::Mask);
        s.matched = 3;
        sink.record(&s);
        sink.record(&s);
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["op"], "annot=N2");
        assert_eq!(v["mode"], "mask");
        assert_eq!(v["matched"], 3);
    }
}
