use anyhow::{Context, Result};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use vxavatar::audio::wav::read_mono;
use vxavatar::audio::{AudioFrame, FrameAssembler};
use vxavatar::params::SharedParams;
use vxavatar::{AvatarConfig, LipSyncMeters, LipSyncPipeline};

/// Offline lip-sync analysis: one JSON object per frame on stdout, summary on
/// stderr.
///
/// usage: vxavatar_analyze <input.wav> [config.json]
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .context("usage: vxavatar_analyze <input.wav> [config.json]")?;
    let config = match args.next() {
        Some(path) => AvatarConfig::from_file(&path)
            .with_context(|| format!("failed to load config '{}'", path))?,
        None => AvatarConfig::default(),
    };

    let (samples, sample_rate) = read_mono(&input)
        .with_context(|| format!("failed to read WAV '{}'", input.display()))?;

    let params = Arc::new(SharedParams::from_config(&config));
    let meters = Arc::new(LipSyncMeters::new());
    let mut pipeline = LipSyncPipeline::new(
        config.extractor_settings(),
        config.classifier,
        params,
        meters.clone(),
    );
    let mut assembler = FrameAssembler::new(config.frame_size);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut write_err: Option<std::io::Error> = None;

    assembler.push(&samples, |seq, block| {
        if write_err.is_some() {
            return;
        }
        let frame = AudioFrame::new(block.to_vec(), sample_rate, seq);
        let time_s = seq as f64 * block.len() as f64 / sample_rate.max(1) as f64;
        let processed = pipeline.process(&frame).map(|_| ());
        let line = match processed {
            Ok(_) => match pipeline.last_analysis() {
                Some(a) => serde_json::json!({
                    "sequence": seq,
                    "time_s": time_s,
                    "features": a.features,
                    "phoneme": a.phoneme,
                    "viseme": a.viseme,
                    "weights": a.weights,
                }),
                None => return,
            },
            Err(e) => serde_json::json!({
                "sequence": seq,
                "time_s": time_s,
                "error": e.to_string(),
            }),
        };
        if let Err(e) = writeln!(out, "{}", line) {
            write_err = Some(e);
        }
    });
    if let Some(e) = write_err {
        return Err(e).context("failed to write analysis output");
    }
    out.flush()?;

    let summary = meters.snapshot();
    eprintln!("Analysis summary for '{}':", input.display());
    eprintln!("  sample rate      : {} Hz", sample_rate);
    eprintln!("  frames analysed  : {}", assembler.frames_emitted());
    eprintln!("  numerical faults : {}", summary.numerical_faults);
    eprintln!(
        "  last formants    : {:.0} / {:.0} / {:.0} Hz",
        summary.formants_hz[0], summary.formants_hz[1], summary.formants_hz[2]
    );
    Ok(())
}
