// Waveform inspection tool
//
// Loads a waveform payload through the same store the dashboard uses and
// prints what the engine derives from it: bucket count, effective duration,
// marker positions and label layout.
//
// Usage:
//   recdeck <waveform-path> [--duration S] [--trigger S] [--release S]
//           [--pre-pad-ms N] [--post-pad-ms N]

use std::path::PathBuf;

use anyhow::Context;

use recdeck_lib::config::{default_config_path, DeviceConfig, DevicePadding};
use recdeck_lib::markers::{compute_markers, layout_labels, LabelLayoutConfig};
use recdeck_lib::waveform::{DefaultFetcher, WaveformEvent, WaveformStatus, WaveformStore};
use recdeck_lib::{Config, Recording};

fn flag<T: std::str::FromStr>(args: &[String], name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match args.iter().position(|a| a == name) {
        Some(i) => {
            let value = args
                .get(i + 1)
                .with_context(|| format!("{} needs a value", name))?;
            let parsed = value
                .parse::<T>()
                .with_context(|| format!("invalid value for {}: {}", name, value))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let Some(waveform_path) = args.get(1).filter(|a| !a.starts_with("--")).cloned() else {
        eprintln!(
            "usage: recdeck <waveform-path> [--duration S] [--trigger S] [--release S] \
             [--pre-pad-ms N] [--post-pad-ms N]"
        );
        std::process::exit(2);
    };

    let config = Config::load_or_default(&default_config_path());
    let padding = DevicePadding::from(&DeviceConfig {
        pre_pad_ms: flag(&args, "--pre-pad-ms")?,
        post_pad_ms: flag(&args, "--post-pad-ms")?,
    });

    let mut recording = Recording::new(waveform_path.clone());
    recording.waveform_path = Some(waveform_path.clone());
    recording.duration_seconds = flag(&args, "--duration")?;
    recording.trigger_offset_seconds = flag(&args, "--trigger")?;
    recording.release_offset_seconds = flag(&args, "--release")?;

    let mut store = WaveformStore::new(DefaultFetcher::local(PathBuf::from(".")));
    let mut events = store.subscribe();
    store.load(&recording);

    while let Some(event) = events.recv().await {
        if matches!(event, WaveformEvent::Loaded { .. } | WaveformEvent::Unavailable { .. }) {
            break;
        }
    }

    if let WaveformStatus::Unavailable(reason) = store.status() {
        anyhow::bail!("{}", reason);
    }
    let data = store
        .data()
        .context("waveform load finished without data")?;

    println!("waveform:  {}", waveform_path);
    println!("buckets:   {}", data.bucket_count());
    println!("duration:  {:.3}s", data.duration_seconds);
    println!("rms:       {}", if data.has_rms() { "yes" } else { "no" });

    let markers = compute_markers(
        &recording,
        Some(data.duration_seconds),
        &padding,
        config.marker_epsilon_secs,
    );
    let fractions = markers.fractions();
    if fractions.is_empty() {
        println!("markers:   none");
        return Ok(());
    }

    println!("markers:");
    for &(kind, fraction) in &fractions {
        let seconds = markers.get(kind).unwrap_or_default();
        println!("  {:<11} {:>9.3}s  {:.4}", kind.label(), seconds, fraction);
    }

    let layout = LabelLayoutConfig {
        edge_threshold: config.label_edge_threshold,
        spacing_threshold: config.label_spacing_threshold,
    };
    println!("labels:");
    for label in layout_labels(&fractions, &layout) {
        println!(
            "  {:<11} {:.4}  {:?} row {}",
            label.kind.label(),
            label.fraction,
            label.align,
            label.row
        );
    }

    Ok(())
}
