use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sitemap_warmer::models::CacheStatus;
use sitemap_warmer::parser::{extract_locs, is_sitemap_index};
use sitemap_warmer::warmer::parse_trace_location;

fn urlset(count: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset>\n");
    for i in 0..count {
        xml.push_str(&format!(
            "  <url><loc>https://example.com/products/{}?a=1&amp;b=2</loc><lastmod>2024-01-01</lastmod></url>\n",
            i
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

fn bench_extract_locs(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_locs");

    for count in [100usize, 1_000, 10_000] {
        let xml = urlset(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &xml, |b, xml| {
            b.iter(|| extract_locs(black_box(xml)));
        });
    }

    group.finish();
}

fn bench_index_detection(c: &mut Criterion) {
    let xml = urlset(1_000);
    c.bench_function("is_sitemap_index_urlset", |b| {
        b.iter(|| is_sitemap_index(black_box(&xml)));
    });
}

fn bench_response_classification(c: &mut Criterion) {
    let traces = ["8a1b2c3d4e5f6789-LHR", "8a1b2c3d4e5f6789-syd", "no-hyphen-", "garbage"];
    let statuses = ["HIT", "miss", "EXPIRED", "DYNAMIC"];

    c.bench_function("classify_response", |b| {
        b.iter(|| {
            for (trace, status) in traces.iter().zip(statuses.iter()) {
                black_box(parse_trace_location(black_box(Some(*trace))));
                black_box(CacheStatus::from_header(black_box(Some(*status))));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_extract_locs,
    bench_index_detection,
    bench_response_classification
);
criterion_main!(benches);
