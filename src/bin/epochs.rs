use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use psg_timeline::io::{self, EpochState};
use psg_timeline::{AnnotationSet, JsonLinesSink, MaskMode, MaskPredicate, RecordIndex, Timeline, TimelineConfig};

#[derive(Parser)]
#[command(name = "epochs", about = "Epoch a record layout and apply mask files")]
struct Args {
    /// Number of records (continuous layout)
    #[arg(long, conflicts_with = "starts")]
    records: Option<usize>,

    /// File of record start times in seconds, one per line (discontinuous layout)
    #[arg(long)]
    starts: Option<PathBuf>,

    /// Record duration in seconds
    #[arg(long, default_value_t = 1.0)]
    record_secs: f64,

    /// Epoch length in seconds
    #[arg(long, default_value_t = 30.0)]
    epoch_len: f64,

    /// Epoch increment in seconds (default: epoch length)
    #[arg(long)]
    epoch_inc: Option<f64>,

    /// Offset of the first epoch in seconds
    #[arg(long, default_value_t = 0.0)]
    epoch_offset: f64,

    /// 0/1 mask file, one token per epoch
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Apply the mask file in force mode instead of mask mode
    #[arg(long)]
    force: bool,

    /// CHEP file (<epoch>\t<channel>)
    #[arg(long)]
    chep: Option<PathBuf>,

    /// Write mask summaries as JSON lines
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Write the resulting 0/1 mask
    #[arg(long)]
    out_mask: Option<PathBuf>,

    /// Write the resulting CHEP pairs
    #[arg(long)]
    out_chep: Option<PathBuf>,

    /// Write the epoch table and mask as safetensors
    #[arg(long)]
    out_state: Option<PathBuf>,

    /// Write masked runs as an annotation file
    #[arg(long)]
    out_annot: Option<PathBuf>,

    /// Annotation class used by --out-annot
    #[arg(long, default_value = "masked")]
    annot_class: String,
}

fn read_starts(path: &Path, cfg: &TimelineConfig) -> Result<Vec<u64>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            let s: f64 = l.parse().with_context(|| format!("bad start time '{l}'"))?;
            Ok(cfg.secs_to_tp(s))
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = TimelineConfig {
        epoch_len_secs: args.epoch_len,
        epoch_inc_secs: args.epoch_inc,
        epoch_offset_secs: args.epoch_offset,
        ..TimelineConfig::default()
    };
    let dur = cfg.secs_to_tp(args.record_secs);
    let records = match (&args.starts, args.records) {
        (Some(p), _) => RecordIndex::discontinuous(dur, read_starts(p, &cfg)?),
        (None, Some(n)) => RecordIndex::continuous(n, dur),
        (None, None) => bail!("one of --records or --starts is required"),
    };

    let mut tl = Timeline::new(cfg, records)?;
    if let Some(p) = &args.summary_json {
        let f = std::fs::File::create(p).with_context(|| format!("creating {}", p.display()))?;
        tl.set_sink(Box::new(JsonLinesSink::new(f)));
    }

    if let Some(p) = &args.mask {
        let bits = io::read_mask_file(p)?;
        if args.force {
            tl.set_mask_mode(MaskMode::Force);
        }
        tl.apply_mask(&MaskPredicate::File(bits), &AnnotationSet::new())?;
    }
    if let Some(p) = &args.chep {
        io::load_chep(p, &mut tl, false)?;
    }

    let tps = tl.config().ticks_per_second;
    println!("epoch\tstart\tstop\tmasked");
    for e in 0..tl.n_epochs() {
        let Some(ep) = tl.epoch(e) else { continue };
        let (s, t) = ep.as_secs(tps);
        let d = tl.display_epoch(e).unwrap_or(e + 1);
        println!("{d}\t{s}\t{t}\t{}", tl.is_masked(e) as u8);
    }
    println!("{} of {} epochs retained", tl.n_unmasked(), tl.n_epochs());

    if let Some(p) = &args.out_mask {
        io::write_mask_file(p, &tl)?;
    }
    if let Some(p) = &args.out_chep {
        io::write_chep(p, &tl)?;
    }
    if let Some(p) = &args.out_state {
        EpochState::from_timeline(&tl).save(p)?;
    }
    if let Some(p) = &args.out_annot {
        let n = io::write_masked_annotations(p, &tl, &args.annot_class)?;
        println!("Wrote {n} masked runs → {}", p.display());
    }
    Ok(())
}
