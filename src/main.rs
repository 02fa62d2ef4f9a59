use std::path::Path;
use std::time::Instant;
use tiera::{Archive, Cf, Filter, SeriesKey, Value};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> tiera::Result<()> {
    env_logger::builder()
        .filter_module("lsm_tree", log::LevelFilter::Warn)
        .filter_module("fjall", log::LevelFilter::Info)
        .filter_module("tiera", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let path = Path::new(".testy");

    if path.try_exists()? {
        std::fs::remove_dir_all(path)?;
    }

    let archive = Archive::builder().cache_size_mib(128).open(path)?;

    let now = tiera::timestamp();
    let hours = 24 * 7;

    let start = Instant::now();

    {
        use rand::Rng;

        let mut rng = rand::thread_rng();

        for host in ["h-0", "h-1", "h-2"] {
            let key = SeriesKey::new(host, "cpu.total", Cf::Average)?;

            // One sample every 10 seconds, ending now
            let first = now - hours * 3_600;

            let samples = (0..hours * 360)
                .map(|idx| {
                    // Low load first, high load for the last day
                    let base_value: Value = if idx < (hours - 24) * 360 { 10.0 } else { 75.0 };
                    let value = (base_value + rng.gen_range(-5.0..5.0)).max(0.0);

                    (first + idx * 10, Some(value))
                })
                .collect::<Vec<_>>();

            for chunk in samples.chunks(1_000) {
                archive.extend(&key, chunk)?;
            }

            log::info!("[{host}] ingested {} samples", samples.len());
        }
    }

    log::info!("ingested in {:?}", start.elapsed());

    for key in archive.series()? {
        for state in archive.tier_states(&key)? {
            log::info!(
                "{key} @ {}s: {} closed bins, open bin {:?}",
                state.tier.width(),
                state.len,
                state.last,
            );
        }
    }

    let key = SeriesKey::parse("h-1", "cpu.total", "ave")?;

    // NOTE: Stop defaults to now
    for (label, start) in [("last hour", -3_600), ("last week", -7 * 86_400)] {
        let start_time = Instant::now();

        let points = archive
            .query(&key)
            .start(start)
            .filter(Filter::SkipMissing)
            .filter(Filter::Sample(12))
            .run()?;

        log::info!("{label} done in {:?}", start_time.elapsed());
        log::info!("{label}: {points:#?}");
    }

    Ok(())
}
