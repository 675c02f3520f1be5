//! Lodstream - headless streaming session
//!
//! Orbits a camera around a volume and reports, per frame, how much of the
//! selected detail was resident.

use std::path::PathBuf;
use std::sync::Arc;

use lodstream::core::{StreamingConfig, logging, types::Vec3};
use lodstream::data::{DataSource, DataSourceRegistry};
use lodstream::math::Frustum;
use lodstream::streaming::{BrickPrefetcher, FrameInfo, MemorySink, PrefetchResult, RenderPipeline};

const WINDOW_HEIGHT: u32 = 768;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verbose") {
        logging::init_with_filter("debug");
    } else {
        logging::init();
    }

    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> lodstream::core::Result<()> {
    let mut config = match parse_path_arg(args, "--config") {
        Some(path) => {
            log::info!("Loading configuration from: {}", path.display());
            StreamingConfig::load(&path)?
        }
        None => StreamingConfig::default(),
    };
    if let Some(uri) = parse_value_arg(args, "--uri") {
        config.data_uri = uri.to_string();
    }
    if args.iter().any(|a| a == "--sync") {
        config.synchronous = true;
    }
    let frames: u32 = parse_value_arg(args, "--frames")
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    let registry = DataSourceRegistry::with_builtin();
    log::info!("Registered schemes: {}", registry.schemes().join(", "));
    let source = Arc::new(DataSource::open(&registry, &config.data_uri)?);

    let sink = Arc::new(MemorySink::new());
    let pipeline = RenderPipeline::new(config.clone(), source.clone(), sink.clone())?;
    let mut prefetcher = BrickPrefetcher::new(pipeline.data_cache().clone(), config.prefetch_threads)?;

    for frame in 0..frames {
        let angle = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
        let distance = 0.9 + 0.6 * (angle * 0.5).cos().abs();
        let eye = Vec3::new(angle.sin() * distance, 0.3, angle.cos() * distance);
        let frustum = Frustum::perspective(eye, Vec3::ZERO, Vec3::Y, 60f32.to_radians(), 1.0, 0.1, 10.0);

        let result = pipeline.render(&FrameInfo::new(frustum, WINDOW_HEIGHT, 0))?;

        // Warm the CPU cache with the parents of what is still missing
        for id in &result.missing {
            let parent = id.parent();
            if parent.is_valid() {
                prefetcher.request(parent)?;
            }
        }
        let failed = prefetcher
            .poll_results()
            .iter()
            .filter(|r| matches!(r, PrefetchResult::Failed(..)))
            .count();

        log::info!(
            "Frame {:3}: {:5} visible, {:5} rendered, {:5} missing, {} prefetch failures",
            frame,
            result.visibles.len(),
            result.render_nodes.len(),
            result.not_available,
            failed
        );
    }

    log::info!("{}", pipeline.texture_cache().statistics());
    log::info!("{}", pipeline.data_cache().statistics());
    log::info!("GPU resident: {} bricks, {} bytes", sink.resident_count(), sink.resident_bytes());
    Ok(())
}

/// Parse `<flag> <path>` from command line
fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    parse_value_arg(args, flag).map(PathBuf::from)
}

/// Value following `flag`, if any
fn parse_value_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
