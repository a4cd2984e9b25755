//! Epoch numbering schemes and forward iteration.
//!
//! * **original**: zero-based index into the epoch sequence; the identity
//!   used by masks and epoch annotations.
//! * **display**: 1-based number for reports, fixed when the epochs are
//!   generated and carried across restructuring.
//! * **current**: sequence number among unmasked epochs, rebuilt lazily
//!   once the unmasked set changes.  Numbers already handed out to epochs
//!   that stay unmasked are kept; newly unmasked epochs get fresh numbers.
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct EpochNumbering {
    display: Vec<usize>,
    display2orig: BTreeMap<usize, usize>,
    orig2curr: BTreeMap<usize, usize>,
    curr2orig: BTreeMap<usize, usize>,
    next_current: usize,
    stale: bool,
}

impl EpochNumbering {
    /// Sequential display numbers `1..=n`.
    pub fn sequential(n: usize) -> Self {
        Self::with_display((1..=n).collect())
    }

    /// Explicit display numbers, one per original epoch.
    pub fn with_display(display: Vec<usize>) -> Self {
        let display2orig = display.iter().enumerate().map(|(e, &d)| (d, e)).collect();
        Self {
            display,
            display2orig,
            stale: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    pub fn display(&self, e: usize) -> Option<usize> {
        self.display.get(e).copied()
    }

    pub fn original(&self, display: usize) -> Option<usize> {
        self.display2orig.get(&display).copied()
    }

    pub fn max_display(&self) -> usize {
        self.display2orig.keys().next_back().copied().unwrap_or(0)
    }

    /// Mark the current numbering out of date.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Rebuild the current numbering from `mask` (`true` = excluded) if stale.
    pub fn refresh(&mut self, mask: &[bool]) {
        if !self.stale {
            return;
        }
        let mut cursor = EpochCursor::default();
        let mut orig2curr = BTreeMap::new();
        while let Some(e) = cursor.next(mask, false) {
            if mask[e] {
                continue;
            }
            let c = match self.orig2curr.get(&e) {
                Some(&c) => c,
                None => {
                    let c = self.next_current;
                    self.next_current += 1;
                    c
                }
            };
            orig2curr.insert(e, c);
        }
        self.curr2orig = orig2curr.iter().map(|(&e, &c)| (c, e)).collect();
        self.orig2curr = orig2curr;
        self.stale = false;
    }

    /// Current number of original epoch `e` (requires a prior [`refresh`](Self::refresh)).
    pub fn current(&self, e: usize) -> Option<usize> {
        self.orig2curr.get(&e).copied()
    }

    /// Original epoch holding current number `c`.
    pub fn original_of_current(&self, c: usize) -> Option<usize> {
        self.curr2orig.get(&c).copied()
    }
}

/// Forward cursor over original epoch indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochCursor {
    pos: usize,
}

impl EpochCursor {
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Next epoch, optionally skipping masked ones; `None` when exhausted.
    pub fn next(&mut self, mask: &[bool], skip_masked: bool) -> Option<usize> {
        while self.pos < mask.len() {
            let e = self.pos;
            self.pos += 1;
            if !(skip_masked && mask[e]) {
                return Some(e);
            }
        }
        None
    }
}
