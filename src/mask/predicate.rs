//! Mask predicates.
//!
//! Every masking source is a [`MaskPredicate`] variant carrying only the
//! parameters it needs.  [`MaskPredicate::evaluate`] produces one
//! [`MatchResult`] per epoch; the timeline then feeds each result through
//! the mask-mode rules.  Selection predicates (regional smoothing, random
//! subsampling, fixed-count selection) read the current mask and match the
//! epochs that should end up excluded, so applying them under `Force`
//! yields exactly their selection.  Trimming depends only on labels and
//! behaves like any other property predicate.
use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::expr::{identifier, Binding, Bindings, ExpressionEvaluator};
use crate::annot::AnnotationStore;
use crate::epoch::EpochNumbering;
use crate::error::{Result, TimelineError};
use crate::interval::Interval;

/// Per-epoch predicate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    NoMatch,
    /// Could not be evaluated; treated as no match but counted separately.
    Invalid,
}

impl MatchResult {
    #[inline]
    pub fn is_match(self) -> bool {
        self == MatchResult::Match
    }

    fn from_bool(b: bool) -> Self {
        if b {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }
}

/// A source of per-epoch matches.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskPredicate {
    /// Every epoch.
    All,
    /// Epochs overlapped by any instance of any named class; with `values`,
    /// only instances whose text value is in the set count.
    Annotation {
        names: Vec<String>,
        values: Option<BTreeSet<String>>,
    },
    /// Epochs carrying a label in the epoch-level annotation table.
    EpochLabel(String),
    /// Positional 0/1 list (`true` = match); must not be longer than the epoch count.
    File(Vec<bool>),
    /// Leading and trailing runs of `label`, each allowed to step over up to
    /// `keep` isolated unlabelled epochs and then shortened by `keep` epochs
    /// next to the unlabelled core.  If the leading run covers every epoch,
    /// every epoch matches.
    Trim { label: String, keep: usize },
    /// Regional smoothing: an included epoch with fewer than `min_good`
    /// included epochs within `window` epochs on both sides matches, as does
    /// any surviving epoch whose two immediate neighbours are excluded.
    /// Already-excluded epochs match.
    Regional { min_good: usize, window: usize },
    /// Draw up to `n` of the included epochs uniformly at random; everything
    /// not drawn matches.
    RandomSubsample { n: usize },
    /// Draw exactly `n` included epochs; if fewer than `n` are included,
    /// every epoch matches.
    FixedCount { n: usize },
    /// Epochs whose display number lies in `first..=last` (1-based).
    EpochRange { first: usize, last: usize },
    /// Epochs that carry `label` and whose `flank` neighbours on each side
    /// all carry it too.
    Flanked { label: String, flank: usize },
    /// Epochs overlapping any of the given intervals.
    TimeWindows(Vec<Interval>),
    /// Boolean expression over per-epoch annotation bindings.
    Expression(String),
    /// Negation; under `Force` this keeps only the epochs `p` matches.
    Not(Box<MaskPredicate>),
}

impl MaskPredicate {
    /// Negated predicate.
    pub fn not(p: MaskPredicate) -> Self {
        MaskPredicate::Not(Box::new(p))
    }

    /// Annotation presence for a single class.
    pub fn annotation(name: &str) -> Self {
        MaskPredicate::Annotation { names: vec![name.to_string()], values: None }
    }

    /// `true` for predicates whose matches are the complete post-selection
    /// exclusion state derived from the current mask.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            MaskPredicate::Regional { .. } | MaskPredicate::RandomSubsample { .. } | MaskPredicate::FixedCount { .. }
        )
    }

    /// Short label used in mask summaries.
    pub fn describe(&self) -> String {
        match self {
            MaskPredicate::All => "all".into(),
            MaskPredicate::Annotation { names, values: None } => format!("annot={}", names.join(",")),
            MaskPredicate::Annotation { names, values: Some(v) } => format!(
                "annot={}[{}]",
                names.join(","),
                v.iter().cloned().collect::<Vec<_>>().join(",")
            ),
            MaskPredicate::EpochLabel(l) => format!("label={l}"),
            MaskPredicate::File(v) => format!("file[{}]", v.len()),
            MaskPredicate::Trim { label, keep } => format!("trim={label},{keep}"),
            MaskPredicate::Regional { min_good, window } => format!("regional={min_good},{window}"),
            MaskPredicate::RandomSubsample { n } => format!("random={n}"),
            MaskPredicate::FixedCount { n } => format!("count={n}"),
            MaskPredicate::EpochRange { first, last } => format!("epochs={first}-{last}"),
            MaskPredicate::Flanked { label, flank } => format!("flanked={label},{flank}"),
            MaskPredicate::TimeWindows(w) => format!("windows[{}]", w.len()),
            MaskPredicate::Expression(e) => format!("expr={e}"),
            MaskPredicate::Not(p) => format!("not({})", p.describe()),
        }
    }

    /// Check arguments that do not depend on per-epoch state.
    pub fn validate(&self, n_epochs: usize) -> Result<()> {
        match self {
            MaskPredicate::File(v) if v.len() > n_epochs => {
                Err(TimelineError::MaskTooLong { got: v.len(), epochs: n_epochs })
            }
            MaskPredicate::EpochRange { first, last } if *first == 0 || first > last => {
                Err(TimelineError::InvalidRange { first: *first, last: *last })
            }
            MaskPredicate::Regional { min_good: 0, .. } | MaskPredicate::Regional { window: 0, .. } => {
                Err(TimelineError::Config("regional smoothing needs positive count and window".into()))
            }
            MaskPredicate::Not(p) => p.validate(n_epochs),
            _ => Ok(()),
        }
    }

    /// One result per epoch.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Vec<MatchResult>> {
        self.validate(ctx.epochs.len())?;
        let ne = ctx.epochs.len();
        let out = match self {
            MaskPredicate::All => vec![MatchResult::Match; ne],
            MaskPredicate::Annotation { names, values } => annotation_matches(ctx, names, values.as_ref()),
            MaskPredicate::EpochLabel(l) => (0..ne).map(|e| MatchResult::from_bool(ctx.epoch_has(l, e))).collect(),
            MaskPredicate::File(v) => {
                if v.len() < ne {
                    warn!("mask file covers {} of {} epochs; the rest do not match", v.len(), ne);
                }
                (0..ne).map(|e| MatchResult::from_bool(v.get(e).copied().unwrap_or(false))).collect()
            }
            MaskPredicate::Trim { label, keep } => bools(trim(&ctx.label_vector(label), *keep)),
            MaskPredicate::Regional { min_good, window } => bools(regional(ctx.mask, *min_good, *window)),
            MaskPredicate::RandomSubsample { n } => bools(subsample(ctx.mask, *n, false, ctx.seed)),
            MaskPredicate::FixedCount { n } => bools(subsample(ctx.mask, *n, true, ctx.seed)),
            MaskPredicate::EpochRange { first, last } => (0..ne)
                .map(|e| {
                    let d = ctx.numbering.display(e).unwrap_or(0);
                    MatchResult::from_bool(*first <= d && d <= *last)
                })
                .collect(),
            MaskPredicate::Flanked { label, flank } => bools(flanked(&ctx.label_vector(label), *flank)),
            MaskPredicate::TimeWindows(w) => ctx
                .epochs
                .iter()
                .map(|ep| MatchResult::from_bool(w.iter().any(|i| i.overlaps(ep))))
                .collect(),
            MaskPredicate::Expression(expr) => {
                let envs: Vec<Bindings> = (0..ne).map(|e| ctx.bindings(e)).collect();
                ctx.evaluator.evaluate(expr, &envs)?
            }
            MaskPredicate::Not(p) => p
                .evaluate(ctx)?
                .into_iter()
                .map(|r| match r {
                    MatchResult::Match => MatchResult::NoMatch,
                    MatchResult::NoMatch => MatchResult::Match,
                    MatchResult::Invalid => MatchResult::Invalid,
                })
                .collect(),
        };
        Ok(out)
    }
}

/// Everything a predicate may consult.
pub struct EvalContext<'a> {
    pub epochs: &'a [Interval],
    /// Current mask bits (`true` = excluded).
    pub mask: &'a [bool],
    pub numbering: &'a EpochNumbering,
    pub epoch_labels: &'a BTreeMap<String, BTreeSet<usize>>,
    pub annots: &'a dyn AnnotationStore,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub seed: Option<u64>,
    pub ticks_per_second: u64,
}

impl EvalContext<'_> {
    fn epoch_has(&self, label: &str, e: usize) -> bool {
        self.epoch_labels.get(label).is_some_and(|s| s.contains(&e))
    }

    /// Per-epoch label presence: the epoch-level table if it knows the
    /// label, otherwise annotation overlap.
    fn label_vector(&self, label: &str) -> Vec<bool> {
        if let Some(set) = self.epoch_labels.get(label) {
            return (0..self.epochs.len()).map(|e| set.contains(&e)).collect();
        }
        match self.annots.find(label) {
            Some(h) => self.epochs.iter().map(|ep| !self.annots.extract(h, ep).is_empty()).collect(),
            None => {
                warn!("label '{label}' not found in epoch table or annotations");
                vec![false; self.epochs.len()]
            }
        }
    }

    fn bindings(&self, e: usize) -> Bindings {
        let ep = &self.epochs[e];
        let mut env = Bindings::new();
        for name in self.annots.names() {
            let Some(h) = self.annots.find(&name) else { continue };
            let hits = self.annots.extract(h, ep);
            let id = identifier(&name);
            if let Some(v) = hits.iter().find_map(|a| a.value.clone()) {
                env.insert(format!("{id}_value"), Binding::Text(v));
            }
            env.insert(format!("n_{id}"), Binding::Int(hits.len() as i64));
            env.insert(id, Binding::Bool(!hits.is_empty()));
        }
        for (label, set) in self.epoch_labels {
            env.insert(identifier(label), Binding::Bool(set.contains(&e)));
        }
        let (start, stop) = ep.as_secs(self.ticks_per_second);
        env.insert("epoch".into(), Binding::Int(self.numbering.display(e).unwrap_or(0) as i64));
        env.insert("start".into(), Binding::Float(start));
        env.insert("stop".into(), Binding::Float(stop));
        env
    }
}

fn bools(v: Vec<bool>) -> Vec<MatchResult> {
    v.into_iter().map(MatchResult::from_bool).collect()
}

fn annotation_matches(
    ctx: &EvalContext<'_>,
    names: &[String],
    values: Option<&BTreeSet<String>>,
) -> Vec<MatchResult> {
    let handles: Vec<_> = names
        .iter()
        .filter_map(|n| {
            let h = ctx.annots.find(n);
            if h.is_none() {
                warn!("annotation class '{n}' not found");
            }
            h
        })
        .collect();
    ctx.epochs
        .iter()
        .map(|ep| {
            let hit = handles.iter().any(|&h| {
                ctx.annots.extract(h, ep).iter().any(|a| match values {
                    None => true,
                    Some(vs) => a.value.as_ref().is_some_and(|v| vs.contains(v)),
                })
            });
            MatchResult::from_bool(hit)
        })
        .collect()
}

/// Epochs in the shortened leading and trailing runs of `has`.
///
/// A run may step over up to `keep` isolated non-matching epochs (a single
/// non-match with matches on both sides); it ends at its last matching
/// epoch and is then shortened by `keep` epochs on its inner side.  A
/// leading run that reaches the last epoch matches everything.
pub fn trim(has: &[bool], keep: usize) -> Vec<bool> {
    let ne = has.len();
    let lead = run_length(has, keep);
    if lead == ne {
        return vec![true; ne];
    }
    let reversed: Vec<bool> = has.iter().rev().copied().collect();
    let trail = run_length(&reversed, keep);
    let lead_end = lead.saturating_sub(keep);
    let trail_start = (ne - trail + keep).min(ne);
    (0..ne).map(|e| e < lead_end || e >= trail_start).collect()
}

/// Length of the run at the front of `has`, up to its last match.
fn run_length(has: &[bool], keep: usize) -> usize {
    let mut end = 0;
    let mut tolerated = 0;
    for (e, &b) in has.iter().enumerate() {
        if b {
            end = e + 1;
        } else if end == e && end > 0 && tolerated < keep && has.get(e + 1).copied().unwrap_or(false) {
            tolerated += 1;
        } else {
            break;
        }
    }
    end
}

/// Regional smoothing over the mask (`true` = excluded); returns the new exclusion state.
pub fn regional(mask: &[bool], min_good: usize, window: usize) -> Vec<bool> {
    let ne = mask.len();
    let mut out = mask.to_vec();
    for e in 0..ne {
        if mask[e] {
            continue;
        }
        let left = (e.saturating_sub(window)..e).filter(|&j| !mask[j]).count();
        let right = (e + 1..(e + 1 + window).min(ne)).filter(|&j| !mask[j]).count();
        if left < min_good && right < min_good {
            out[e] = true;
        }
    }
    let smoothed = out.clone();
    for e in 1..ne.saturating_sub(1) {
        if !smoothed[e] && smoothed[e - 1] && smoothed[e + 1] {
            out[e] = true;
        }
    }
    out
}

/// Random selection among included epochs; returns the new exclusion state.
///
/// With `exact`, fewer than `n` included epochs excludes everything.
pub fn subsample(mask: &[bool], n: usize, exact: bool, seed: Option<u64>) -> Vec<bool> {
    let avail: Vec<usize> = (0..mask.len()).filter(|&e| !mask[e]).collect();
    if exact && avail.len() < n {
        return vec![true; mask.len()];
    }
    let k = n.min(avail.len());
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let drawn: BTreeSet<usize> = rand::seq::index::sample(&mut rng, avail.len(), k)
        .into_iter()
        .map(|i| avail[i])
        .collect();
    (0..mask.len()).map(|e| mask[e] || !drawn.contains(&e)).collect()
}

/// Epochs whose `flank` neighbours on both sides all carry the label.
pub fn flanked(has: &[bool], flank: usize) -> Vec<bool> {
    let ne = has.len();
    (0..ne)
        .map(|e| e >= flank && e + flank < ne && (e - flank..=e + flank).all(|j| has[j]))
        .collect()
}
