//! # Recomposer: Phased MNV Recomposition
//!
//! Merges nearby phased small variants that share a haplotype into
//! multi-nucleotide variant records.
//!
//! ## Usage
//! ```bash
//! recomposer --vcf phased.vcf.gz --ref genome.fa --out recomposed.vcf.gz
//!
//! # With link-back table and profiling output
//! recomposer --vcf phased.vcf.gz --ref genome.fa --out recomposed.vcf.gz --links links.tsv --profile
//! ```

use std::time::Instant;

use recomposer::config::Config;
use recomposer::pipelines::RecomposePipeline;
use recomposer::utils::threading::configure_global_pool;
use recomposer::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber for hierarchical profiling output
fn init_profiling() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();

    let config = Config::parse_and_validate()?;

    if config.profile {
        init_profiling();
        eprintln!("=== Profiling enabled ===\n");
    }

    let n_threads = config.nthreads();
    if !configure_global_pool(n_threads) {
        log::warn!(
            "Global thread pool already initialized; --nthreads {} ignored",
            n_threads
        );
    }

    eprintln!("Recomposer v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", n_threads);
    eprintln!("Input: {:?}", config.vcf);
    eprintln!("Reference: {:?}", config.r#ref);

    let mut pipeline = RecomposePipeline::new(config);
    pipeline.run()?;

    let elapsed = start.elapsed();
    eprintln!("\nCompleted in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use recomposer::{config, data, error, io, model, pipelines, utils};

    #[test]
    fn test_module_imports() {
        // Verify all modules are accessible
        let _ = config::Config::parse_and_validate;
        let _ = error::RecomposeError::vcf("test");
        let _ = data::haplotype::SampleIdx::new;
        let _ = io::vcf::VcfReader::open;
        let _ = model::merger::merge;
        let _ = pipelines::RecomposePipeline::new;
        let _ = utils::threading::build_thread_pool;
    }
}
