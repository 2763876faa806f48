// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;
use polyframe_studio::builtins::Builtins;
use polyframe_studio::eval::evaluate_expression;
use polyframe_studio::geometry::Primitive;
use polyframe_studio::kernel::Kernel;
use polyframe_studio::{Diagnostics, PipelineConfig};

const BRACKET: &str = r#"
    module hole(x) { translate([x, 5, -1]) cylinder(h = 12, r = 2, $fn = 32); }
    difference() {
        cube([40, 10, 10]);
        for (x = [5 : 10 : 35]) hole(x);
    }
"#;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for (name, source) in [("simple_cube", "cube([10, 10, 10]);"), ("bracket", BRACKET)] {
        group.bench_with_input(BenchmarkId::new(name, ""), &source, |b, source| {
            b.iter(|| polyframe_studio::script::parse(black_box(source)).unwrap());
        });
    }

    group.finish();
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("cube", |b| {
        b.iter(|| Primitive::cube(black_box(Vector3::new(10.0, 10.0, 10.0)), false).to_mesh());
    });

    for fragments in [32, 64] {
        group.bench_with_input(BenchmarkId::new("sphere", fragments), &fragments, |b, &fragments| {
            b.iter(|| Primitive::sphere(black_box(10.0), fragments).to_mesh());
        });
    }

    group.finish();
}

fn bench_builtins(c: &mut Criterion) {
    let mut group = c.benchmark_group("builtins");
    let builtins = Builtins::standard();
    let diagnostics = Diagnostics::silent();

    for (name, expression) in [
        ("lookup", "lookup(7.5, [[0, 0], [5, 50], [10, 100], [15, 150]])"),
        ("search", "search(\"abc\", \"abcdabcdabcdabcd\", 0)"),
        ("rands", "rands(0, 100, 64, 7)"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| evaluate_expression(black_box(expression), &builtins, &diagnostics).unwrap());
        });
    }

    group.finish();
}

fn bench_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("preview");
    group.sample_size(20);

    let grid = "for (x = [0 : 9]) for (y = [0 : 9]) translate([x * 3, y * 3, 0]) difference() { cube(2); sphere(1, $fn = 12); }";
    for (name, source) in [("bracket", BRACKET), ("grid", grid)] {
        group.bench_with_input(BenchmarkId::new(name, ""), &source, |b, source| {
            let mut kernel = Kernel::new(PipelineConfig::default(), Diagnostics::silent());
            kernel.set_text(*source);
            b.iter(|| kernel.preview().unwrap());
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.sample_size(10);

    group.bench_function("bracket_cold", |b| {
        b.iter(|| polyframe_studio::render(black_box(BRACKET)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_primitives, bench_builtins, bench_preview, bench_render);
criterion_main!(benches);
