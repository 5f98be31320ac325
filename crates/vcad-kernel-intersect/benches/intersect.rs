//! Intersection benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vcad_kernel_intersect::{
    intersect_curve_curve, intersect_curve_surface, intersect_surface_surface, CurveQuery,
    Subcurve, SurfaceQuery, Tolerances,
};
use vcad_kernel_math::Point3;
use vcad_kernel_nurbs::{NurbsCurve, NurbsSurface};

fn plane(z: f64) -> NurbsSurface {
    NurbsSurface::bilinear(
        Point3::new(-2.0, -2.0, z),
        Point3::new(2.0, -2.0, z),
        Point3::new(-2.0, 2.0, z),
        Point3::new(2.0, 2.0, z),
    )
}

fn curve_curve(c: &mut Criterion) {
    let a = NurbsCurve::circle(Point3::origin(), 1.0);
    let b = NurbsCurve::circle(Point3::new(1.0, 0.0, 0.0), 1.0);
    let tols = Tolerances::default();
    c.bench_function("cci_circles", |bench| {
        bench.iter(|| {
            let mut events = Vec::new();
            intersect_curve_curve(black_box(&a).into(), black_box(&b).into(), &tols, &mut events)
        })
    });

    // repeated queries against one prebuilt tree
    let tree = Subcurve::new(&a, None).expect("circle tree");
    c.bench_function("cci_circles_shared_tree", |bench| {
        bench.iter(|| {
            let mut events = Vec::new();
            let q = CurveQuery::new(&a).with_tree(&tree);
            intersect_curve_curve(q, black_box(&b).into(), &tols, &mut events)
        })
    });
}

fn curve_surface(c: &mut Criterion) {
    let sphere = NurbsSurface::sphere(Point3::origin(), 1.0);
    let line = NurbsCurve::line(Point3::new(-2.0, 0.3, 0.1), Point3::new(2.0, 0.3, 0.1));
    let tols = Tolerances::default();
    c.bench_function("csi_line_sphere", |bench| {
        bench.iter(|| {
            let mut events = Vec::new();
            intersect_curve_surface(
                black_box(&line).into(),
                SurfaceQuery::new(black_box(&sphere)),
                &tols,
                &mut events,
                None,
            )
        })
    });
}

fn surface_surface(c: &mut Criterion) {
    let sphere = NurbsSurface::sphere(Point3::origin(), 1.0);
    let cut = plane(0.5);
    let tols = Tolerances::default();
    c.bench_function("ssi_plane_sphere", |bench| {
        bench.iter(|| {
            let mut events = Vec::new();
            intersect_surface_surface(black_box(&sphere).into(), black_box(&cut).into(), &tols, &mut events)
        })
    });
}

criterion_group!(benches, curve_curve, curve_surface, surface_surface);
criterion_main!(benches);
