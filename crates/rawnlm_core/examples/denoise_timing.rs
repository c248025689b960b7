use rawnlm_core::{denoise_raw, CfaLayout, NlmConfig, NoiseModel, RawFrame};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse::<T>().ok())
        .unwrap_or(default)
}

fn build_raw_frame(rows: usize, cols: usize) -> Vec<u16> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..rows * cols)
        .map(|i| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = ((state >> 40) as f32) / ((1u64 << 24) as f32) - 0.5;
            let level = 500.0 + 3000.0 * (i % cols) as f32 / cols as f32;
            (level + 150.0 * noise) as u16
        })
        .collect()
}

fn peak_rss_mb() -> Option<f64> {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    #[cfg(target_os = "macos")]
    {
        Some(usage.ru_maxrss as f64 / (1024.0 * 1024.0))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Some(usage.ru_maxrss as f64 / 1024.0)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let rows = parse_arg(&args, "--rows", 2000usize);
    let cols = parse_arg(&args, "--cols", 3000usize);
    let filters = parse_arg(&args, "--filters", 0x9494_9494u32);
    let patch_radius = parse_arg(&args, "--patch-radius", 2usize);
    let neighborhood_radius = parse_arg(&args, "--neighborhood-radius", 3usize);
    let h = parse_arg(&args, "--h", 1.0f32);
    let gain = parse_arg(&args, "--gain", 1.0f32);
    let offset = parse_arg(&args, "--offset", 0.0f32);

    let cfa = CfaLayout::from_filters(filters);
    println!(
        "denoise timing start rows={} cols={} cfa={} patch_radius={} neighborhood_radius={} h={} band_rows_env={:?}",
        rows,
        cols,
        cfa,
        patch_radius,
        neighborhood_radius,
        h,
        std::env::var("RAWNLM_BAND_ROWS").ok()
    );

    let data = build_raw_frame(rows, cols);
    let frame = RawFrame::from_slice(&data, cols, rows, cfa).expect("invalid frame buffer");
    let model = NoiseModel::<f32>::uniform(cfa, gain, offset).expect("invalid noise model");
    let config = NlmConfig::<f32>::new()
        .with_patch_radius(patch_radius)
        .with_neighborhood_radius(neighborhood_radius)
        .with_filter_strength(h);

    let rss_before_mb = peak_rss_mb().unwrap_or(0.0);

    let t0 = Instant::now();
    let out = denoise_raw(&frame, &model, &config).expect("denoise_raw failed");
    let elapsed = t0.elapsed();
    let rss_peak_mb = peak_rss_mb().unwrap_or(0.0);

    let checksum: u64 = out
        .iter()
        .step_by((rows * cols / 4096).max(1))
        .map(|&v| v as u64)
        .sum();

    println!(
        "denoise timing done elapsed_s={:.3} checksum={} rss_before_mb={:.1} rss_peak_mb={:.1}",
        elapsed.as_secs_f64(),
        checksum,
        rss_before_mb,
        rss_peak_mb
    );
}
