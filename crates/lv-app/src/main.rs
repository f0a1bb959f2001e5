//! Command-line entry point: build a session and print subset summaries

use std::path::PathBuf;

use anyhow::{Context, Result};
use lv_core::CoreSettings;
use lv_data::{compute_histogram, compute_statistic, DataCollection, Statistic};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod session;

use session::{find_component, find_data, HistogramSpec, SessionFile};

fn usage() -> ! {
    eprintln!("usage: linkview <session.json> [--settings <settings.json>]");
    std::process::exit(2);
}

fn print_subsets(dc: &DataCollection) -> Result<()> {
    for data in dc.iter() {
        println!("{} {:?}", data.label(), data.shape());
        for subset in dc.subsets_of(data.id())? {
            let selected = subset.state().to_index_list(dc, data.id())?;
            println!("  {}: {} of {} selected", subset.label(), selected.len(), data.size());
        }
    }
    Ok(())
}

fn print_histogram(dc: &DataCollection, spec: &HistogramSpec) -> Result<()> {
    let data = find_data(dc, &spec.data)?;
    let cid = find_component(dc, &spec.component)?;
    let bins = spec.bins.unwrap_or(dc.settings().histogram.default_bins);

    let lo = compute_statistic(dc, data, Statistic::Minimum, cid, None, None, true, None)?;
    let hi = compute_statistic(dc, data, Statistic::Maximum, cid, None, None, true, None)?;
    let range = (
        lo.first().copied().unwrap_or(f64::NAN),
        hi.first().copied().unwrap_or(f64::NAN),
    );
    if !(range.0.is_finite() && range.1.is_finite()) {
        println!("{} on {}: no finite values", spec.component, spec.data);
        return Ok(());
    }

    let counts = compute_histogram(dc, data, &[cid], &[range], &[bins], &[false], None)?;
    let width = (range.1 - range.0) / bins as f64;
    println!("{} on {}:", spec.component, spec.data);
    for (i, count) in counts.iter().enumerate() {
        let start = range.0 + width * i as f64;
        println!("  [{:>10.4}, {:>10.4}) {}", start, start + width, count);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let mut session_path = None;
    let mut settings_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => settings_path = Some(PathBuf::from(args.next().unwrap_or_else(|| usage()))),
            "-h" | "--help" => usage(),
            _ => session_path = Some(PathBuf::from(arg)),
        }
    }
    let session_path = session_path.unwrap_or_else(|| usage());

    let mut session = SessionFile::from_path(&session_path)?;
    if let Some(path) = settings_path {
        session.settings = CoreSettings::from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    }

    info!("Building session from {}", session_path.display());
    let stack = session.build()?;
    let dc = stack.session();

    print_subsets(dc)?;
    for spec in &session.histograms {
        print_histogram(dc, spec)?;
    }
    Ok(())
}
