//! Benchmarks de la validation et de la réparation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use geolint_core::batch::{BatchCoordinator, BatchInput, BatchStrategy};
use geolint_core::crs::Crs;
use geolint_core::repair::{GeometryRepairer, RepairOptions};
use geolint_core::types::{Dataset, Feature};
use geolint_core::validation::ValidationEngine;

/// Grille de parcelles carrées, une sur sept en nœud papillon
fn parcels(n: usize) -> Dataset {
    let side = (n as f64).sqrt().ceil() as usize;
    let features = (0..n)
        .map(|i| {
            let x = 2.0 + (i % side) as f64 * 0.001;
            let y = 48.0 + (i / side) as f64 * 0.001;
            let d = 0.0008;
            let ring: Vec<Coord> = if i % 7 == 0 {
                vec![(x, y), (x + d, y + d), (x + d, y), (x, y + d)]
            } else {
                vec![(x, y), (x + d, y), (x + d, y + d), (x, y + d)]
            }
            .into_iter()
            .map(Coord::from)
            .collect();

            let polygon = Polygon::new(LineString::new(ring), vec![]);
            let geometry = if i % 5 == 0 {
                MultiPolygon::new(vec![polygon]).into()
            } else {
                polygon.into()
            };

            Feature {
                geometry: Some(geometry),
                attributes: Default::default(),
            }
            .with_attribute("id", i as i64)
        })
        .collect();

    Dataset::new("parcels", features).with_crs(Crs::epsg(4326))
}

/// Cercle de `n` sommets, un sommet sur dix échangé avec son voisin
fn tangled_ring(n: usize, tangled: bool) -> Dataset {
    let mut coords: Vec<Coord> = (0..n)
        .map(|i| {
            let t = i as f64 / n as f64 * std::f64::consts::TAU;
            Coord {
                x: 100.0 * t.cos(),
                y: 100.0 * t.sin(),
            }
        })
        .collect();
    if tangled {
        for i in (0..n - 1).step_by(10) {
            coords.swap(i, i + 1);
        }
    }

    let polygon = Polygon::new(LineString::new(coords), vec![]);
    let feature = Feature {
        geometry: Some(polygon.into()),
        attributes: Default::default(),
    };
    Dataset::new("ring", vec![feature]).with_crs(Crs::epsg(3857))
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    for size in [1_000, 10_000] {
        let dataset = parcels(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &dataset, |b, dataset| {
            b.iter(|| black_box(ValidationEngine.report(black_box(dataset))))
        });
    }

    let ring = tangled_ring(20_000, false);
    group.throughput(Throughput::Elements(20_000));
    group.bench_with_input(BenchmarkId::new("ring", 20_000), &ring, |b, ring| {
        b.iter(|| black_box(ValidationEngine.report(black_box(ring))))
    });
    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair");
    for size in [1_000, 10_000] {
        let validated = ValidationEngine.validate(&parcels(size));
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &validated, |b, validated| {
            b.iter(|| black_box(GeometryRepairer.repair(black_box(validated), &RepairOptions::all())))
        });
    }

    let tangled = ValidationEngine.validate(&tangled_ring(2_000, true));
    group.throughput(Throughput::Elements(2_000));
    group.bench_with_input(BenchmarkId::new("tangled_ring", 2_000), &tangled, |b, tangled| {
        b.iter(|| black_box(GeometryRepairer.repair(black_box(tangled), &RepairOptions::all())))
    });
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let strategy = BatchStrategy {
        fix_geometries: true,
        target_crs: Some(Crs::epsg(3857)),
        merge: true,
        ..Default::default()
    };
    let coordinator = BatchCoordinator::new(strategy);

    c.bench_function("batch_8x1000", |b| {
        b.iter(|| {
            let inputs = (0..8)
                .map(|i| BatchInput::new(format!("parcels-{}", i), Ok(parcels(1_000))))
                .collect();
            black_box(coordinator.run(inputs))
        })
    });
}

criterion_group!(benches, bench_validate, bench_repair, bench_batch);
criterion_main!(benches);
