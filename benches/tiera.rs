use criterion::{criterion_group, criterion_main, Criterion};
use tiera::{Archive, Cf, Filter, SeriesKey, Stencil};

fn encode_series_key(c: &mut Criterion) {
    let key = SeriesKey::new("node-1.example.org", "net.rx_bytes", Cf::Average).unwrap();

    c.bench_function("encode series key", |b| {
        b.iter(|| key.encode("records", &["3600", "last"]).unwrap());
    });

    c.bench_function("parse wire form", |b| {
        b.iter(|| SeriesKey::from_wire("node-1.example.org/net.rx_bytes/ave").unwrap());
    });
}

fn parse_value(c: &mut Criterion) {
    c.bench_function("parse value", |b| {
        b.iter(|| tiera::validate::value("52.7431", 2, tiera::Error::from).unwrap());
    });
}

fn append(c: &mut Criterion) {
    let key = SeriesKey::new("h-1", "cpu", Cf::Average).unwrap();

    c.bench_function("append (memory)", |b| {
        let archive = Archive::builder().in_memory().unwrap();
        let mut ts = 0;

        b.iter(|| {
            archive.append(&key, ts, Some(52.74)).unwrap();
            ts += 10;
        });
    });

    c.bench_function("append (fjall)", |b| {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::builder().open(&dir).unwrap();
        let mut ts = 0;

        b.iter(|| {
            archive.append(&key, ts, Some(52.74)).unwrap();
            ts += 10;
        });
    });

    c.bench_function("extend 1k (memory)", |b| {
        let archive = Archive::builder().in_memory().unwrap();
        let mut ts = 0;

        b.iter(|| {
            let samples = (0..1_000)
                .map(|idx| (ts + idx * 10, Some(52.74)))
                .collect::<Vec<_>>();

            archive.extend(&key, &samples).unwrap();
            ts += 10_000;
        });
    });
}

fn query(c: &mut Criterion) {
    let key = SeriesKey::new("h-1", "cpu", Cf::Average).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let archive = Archive::builder().open(&dir).unwrap();

    let samples = (0..86_400)
        .step_by(10)
        .map(|ts| (ts, Some(52.74)))
        .collect::<Vec<_>>();

    archive.extend(&key, &samples).unwrap();

    c.bench_function("query last day (minutes)", |b| {
        b.iter(|| {
            archive
                .query(&key)
                .start(0)
                .stop(86_400)
                .width(60)
                .run()
                .unwrap();
        });
    });

    c.bench_function("query last day (derive)", |b| {
        b.iter(|| {
            archive
                .query(&key)
                .start(0)
                .stop(86_400)
                .width(60)
                .filter(Filter::Derive(Stencil::Five))
                .run()
                .unwrap();
        });
    });
}

criterion_group!(benches, encode_series_key, parse_value, append, query);
criterion_main!(benches);
