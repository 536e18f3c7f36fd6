//! Compositing benchmarks: full-spread compose and the press-artifact chain.
//! Run: cargo bench

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use imposer::compositor::Compositor;
use imposer::config::PressConfig;
use imposer::layout::{validate_layout, Layout};
use imposer::print_effects::apply_chain;
use imposer::report::ValidationReport;
use imposer::schema::LayoutDoc;
use imposer::typeset::FontLibrary;

const LAYOUT_YAML: &str = r##"
elements:
  - tag_id: L_featurebox_tips_01
    type: feature_box
    position: [250, 400]
    dimensions: [600, 450]
    asset: box.png
    appearance:
      border: { width: 4, color: "#F57D0D" }
      shadow: { offset: [3, 3], opacity: 60 }
  - tag_id: L_photo_mouse_01
    type: photo_instructional
    position: [250, 1100]
    dimensions: [800, 600]
    rotation: 3
    asset: photo.png
  - tag_id: R_doodle_arrow_01
    type: doodle
    position: [2200, 500]
    dimensions: [300, 200]
    asset: arrow.png
    appearance:
      organic: { max_rotation: 4.0, max_jitter: 10.0 }
  - tag_id: R_pixelart_cursor_01
    type: pixel_art
    position: [2300, 1200]
    dimensions: [256, 256]
    asset: cursor.png
"##;

fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
    img.save(path).expect("asset png should write");
}

fn prepare_layout(assets: &Path, config: &PressConfig) -> Layout {
    write_png(&assets.join("box.png"), 600, 450, [255, 255, 255, 255]);
    write_png(&assets.join("photo.png"), 800, 600, [120, 110, 95, 255]);
    write_png(&assets.join("arrow.png"), 300, 200, [40, 40, 160, 255]);
    write_png(&assets.join("cursor.png"), 32, 32, [26, 26, 26, 255]);

    let doc: LayoutDoc = serde_yaml::from_str(LAYOUT_YAML).expect("layout yaml should parse");
    validate_layout(&doc, config).expect("benchmark layout should validate")
}

fn bench_compose(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let assets = dir.path().to_path_buf();
    let config = PressConfig::default();
    let layout = prepare_layout(&assets, &config);

    let mut group = c.benchmark_group("compose_spread");
    group.sample_size(10);

    group.bench_function("compose_3400x2200", |b| {
        b.iter(|| {
            let mut fonts = FontLibrary::new(&config.typography.font_dir);
            let mut compositor = Compositor::new(&config, &mut fonts, &assets);
            let mut report = ValidationReport::new();
            black_box(
                compositor
                    .compose(&layout, &mut report)
                    .expect("compose should run")
                    .expect("compose should produce a raster"),
            )
        });
    });

    group.finish();
}

fn bench_effect_chain(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir should create");
    let assets = dir.path().to_path_buf();
    let config = PressConfig::default();
    let layout = prepare_layout(&assets, &config);

    let mut fonts = FontLibrary::new(&config.typography.font_dir);
    let mut compositor = Compositor::new(&config, &mut fonts, &assets);
    let mut report = ValidationReport::new();
    let spread = compositor
        .compose(&layout, &mut report)
        .expect("compose should run")
        .expect("compose should produce a raster");
    let spine = (config.canvas.spine_start(), config.canvas.spine_end());

    let mut group = c.benchmark_group("compose_spread");
    group.sample_size(10);

    group.bench_function("effect_chain_3400x2200", |b| {
        b.iter(|| {
            let mut rgba = spread.rgba.clone();
            apply_chain(&mut rgba, spread.width, spread.height, spine, &config.effects);
            black_box(rgba)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_compose, bench_effect_chain);
criterion_main!(benches);
