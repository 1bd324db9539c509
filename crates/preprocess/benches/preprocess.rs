use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use preprocess::{CpuPreProcessor, Normalization, Preprocess};
use schema::CanonicalImage;

/// Create a gradient image for benchmarking
fn create_test_image(width: u32, height: u32) -> CanonicalImage {
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            pixels[idx] = (x % 256) as u8; // R
            pixels[idx + 1] = (y % 256) as u8; // G
            pixels[idx + 2] = ((x + y) % 256) as u8; // B
        }
    }
    CanonicalImage::new(width, height, pixels).unwrap()
}

fn benchmark_cpu_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_preprocess");

    let resolutions = [(640, 480), (1280, 720), (1920, 1080), (3840, 2160)];
    let input_size = (640, 640);

    for normalization in [Normalization::Unit, Normalization::ImageNet] {
        let mut preprocessor = CpuPreProcessor::with_normalization(input_size, normalization);

        for (width, height) in resolutions.iter() {
            let image = create_test_image(*width, *height);

            group.bench_with_input(
                BenchmarkId::new(
                    format!("letterbox_{:?}", normalization),
                    format!("{}x{}", width, height),
                ),
                &image,
                |b, image| {
                    b.iter(|| preprocessor.preprocess(black_box(image)).unwrap());
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_cpu_preprocess);
criterion_main!(benches);
