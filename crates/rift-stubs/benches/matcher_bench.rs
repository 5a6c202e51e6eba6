use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rift_stubs::stubs::{ResponsePattern, StubDeclaration};
use rift_stubs::{ObservedRequest, RequestPattern, StubEntry, StubRepository};
use std::path::Path;

fn create_test_stub(id: usize, with_capture: bool) -> StubEntry {
    let url = if with_capture {
        format!(r"^/api/v\d+/endpoint{id}/(\d+)$")
    } else {
        format!("{{{{/api/v1/endpoint{id}}}}}")
    };
    let request = RequestPattern::new()
        .with_url(url)
        .with_method("GET")
        .with_header("accept", "json");
    let declaration = StubDeclaration::new(request).with_response(
        ResponsePattern::new()
            .with_status("200")
            .with_body(r#"{"item": "<% url.0.1 %>"}"#),
    );
    StubEntry::compile(declaration, Path::new(".")).unwrap()
}

fn create_repository(count: usize, with_capture: bool) -> StubRepository {
    let entries = (0..count)
        .map(|i| create_test_stub(i, with_capture))
        .collect();
    StubRepository::with_contents(entries, Vec::new())
}

fn bench_find_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_match");

    for count in [10, 100, 1000] {
        group.throughput(Throughput::Elements(1));

        let literal = create_repository(count, false);
        let last = ObservedRequest::new("GET", &format!("/api/v1/endpoint{}", count - 1))
            .with_header("accept", "application/json");
        group.bench_with_input(BenchmarkId::new("literal_last", count), &count, |b, _| {
            b.iter(|| black_box(literal.find_match(black_box(&last))))
        });

        let captured = create_repository(count, true);
        let request = ObservedRequest::new("GET", &format!("/api/v2/endpoint{}/42", count / 2))
            .with_header("accept", "application/json");
        group.bench_with_input(BenchmarkId::new("regex_middle", count), &count, |b, _| {
            b.iter(|| black_box(captured.find_match(black_box(&request))))
        });

        let miss = ObservedRequest::new("GET", "/nothing/here");
        group.bench_with_input(BenchmarkId::new("no_match", count), &count, |b, _| {
            b.iter(|| black_box(literal.find_match(black_box(&miss))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_find_match);
criterion_main!(benches);
