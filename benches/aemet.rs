use aemet::{nearest_linear, CatalogEntry, LatLon, SpatialIndex};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A grid over the Iberian peninsula, roughly the size of the station catalog.
fn synthetic_catalog() -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for i in 0..60 {
        for j in 0..50 {
            entries.push(CatalogEntry {
                code: format!("{i:02}{j:02}X"),
                name: format!("Station {i}-{j}"),
                latitude: 36.0 + f64::from(i) * 0.1,
                longitude: -9.0 + f64::from(j) * 0.25,
                elevation: None,
            });
        }
    }
    entries
}

fn bench_nearest(c: &mut Criterion) {
    let entries = synthetic_catalog();
    let index = SpatialIndex::build(&entries);
    let madrid = LatLon(40.4168, -3.7038);

    c.bench_function("nearest_linear", |b| {
        b.iter(|| nearest_linear(black_box(&entries), black_box(madrid)))
    });
    c.bench_function("nearest_spatial_index", |b| {
        b.iter(|| index.nearest(black_box(&entries), black_box(madrid)))
    });
    c.bench_function("spatial_index_build", |b| {
        b.iter(|| SpatialIndex::build(black_box(&entries)))
    });
}

criterion_group!(benches, bench_nearest);
criterion_main!(benches);
