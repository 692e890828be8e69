//! # Cost Grid Benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Vector2;

use traj_ctrl::cost_map::CostGrid;
use traj_ctrl::ctrl::Params;
use traj_ctrl::gradient;
use traj_ctrl::obstacle;
use traj_ctrl::Pose;

fn cost_grid_benchmark(c: &mut Criterion) {
    // ---- Build a grid with some structure in it ----

    let mut grid = CostGrid::new(400, 400, 0.05, Vector2::new(-10.0, -10.0));

    // A diagonal band of soft cost and a hard wall
    for i in 0..400usize {
        let x_m = -10.0 + 0.05 * i as f64;
        grid.set_world_rect(
            Vector2::new(x_m, x_m * 0.5 - 0.3),
            Vector2::new(x_m + 0.05, x_m * 0.5 + 0.3),
            160,
        );
    }
    grid.set_world_rect(Vector2::new(4.0, -10.0), Vector2::new(4.2, 10.0), u8::MAX);

    let params = Params::default();
    let pose = Pose::new(0.2, -0.1, 0.3);

    c.bench_function("CostGrid::avg_line_cost", |b| {
        b.iter(|| grid.avg_line_cost(Vector2::new(-1.0, -1.0), Vector2::new(2.0, 1.5)))
    });

    c.bench_function("CostGrid::max_line_cost", |b| {
        b.iter(|| grid.max_line_cost(Vector2::new(-1.0, -1.0), Vector2::new(2.0, 1.5)))
    });

    c.bench_function("gradient::estimate", |b| {
        b.iter(|| gradient::estimate(&grid, &pose, 0.5, &params))
    });

    c.bench_function("obstacle::scan", |b| {
        b.iter(|| obstacle::scan(&grid, &pose, 0.4, 0.1, &params))
    });
}

criterion_group!(benches, cost_grid_benchmark);
criterion_main!(benches);
