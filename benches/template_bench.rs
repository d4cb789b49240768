use annur_og::async_api::document_etag;
use annur_og::template::{content_preview, render_html, EllipsisPolicy, RenderRequest, TemplateOptions};
use annur_og::Viewport;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_render_html(c: &mut Criterion) {
    let opts = TemplateOptions::default();
    let short = RenderRequest::default();
    let long = RenderRequest {
        title: "<b>عنوان</b> & \"اقتباس\"".to_string(),
        content: "تجربة حقيقية من الحياة ".repeat(40),
        ..Default::default()
    };

    c.bench_function("render_html_defaults", |b| {
        b.iter(|| render_html(black_box(&short), black_box(&opts)))
    });
    c.bench_function("render_html_escaped_long_content", |b| {
        b.iter(|| render_html(black_box(&long), black_box(&opts)))
    });
}

fn bench_preview_and_etag(c: &mut Criterion) {
    let content = "نص طويل ".repeat(200);
    c.bench_function("content_preview", |b| {
        b.iter(|| content_preview(black_box(&content), EllipsisPolicy::WhenTruncated))
    });

    let html = render_html(&RenderRequest::default(), &TemplateOptions::default());
    c.bench_function("document_etag", |b| {
        b.iter(|| document_etag(black_box(&html), Viewport::default()))
    });
}

criterion_group!(benches, bench_render_html, bench_preview_and_etag);
criterion_main!(benches);
