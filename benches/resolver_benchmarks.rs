//! Performance benchmarks for the request resolution path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use async_trait::async_trait;
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use speech_router::core::resolver::{finalize, plan};
use speech_router::{
    Backend, CustomModelCatalog, CustomModelEntry, DefaultBackend, Detection, Device, LanguageCode,
    RenderRequest, ScriptClassifier, SpeakerSet, SynthesisEngine, SynthesisRequest,
    SynthesisResult, VoiceHint, fallback_voice,
};

struct SilentEngine;

#[async_trait]
impl SynthesisEngine for SilentEngine {
    async fn render(&self, _request: RenderRequest<'_>) -> SynthesisResult<Bytes> {
        Ok(Bytes::new())
    }
}

fn backend(language: LanguageCode, speakers: &[(&str, u32)]) -> Arc<Backend> {
    let speakers: SpeakerSet = speakers.iter().copied().collect();
    Arc::new(
        Backend::new(
            language,
            language.as_str(),
            Device::Cpu,
            speakers,
            Box::new(SilentEngine),
        )
        .unwrap(),
    )
}

fn catalog() -> CustomModelCatalog {
    CustomModelCatalog::from_entries((0..64).map(|i| CustomModelEntry {
        model_id: format!("voice-{i}"),
        language: LanguageCode::En,
        config_path: PathBuf::from(format!("/models/voice-{i}/config.json")),
        ckpt_path: PathBuf::from(format!("/models/voice-{i}/G_latest.pth")),
        speaker_id: 0,
    }))
}

/// Benchmark voice hint parsing
fn bench_hint_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hint_parsing");

    for hint in ["EN/EN-US", "EN-BR", "", "a/b/c", "zh/"] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{hint:?}")), &hint, |b, hint| {
            b.iter(|| VoiceHint::parse(black_box(hint)));
        });
    }

    group.finish();
}

/// Benchmark planning against a populated catalog
fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    let catalog = catalog();

    group.bench_function("explicit_voice", |b| {
        b.iter(|| {
            plan(
                VoiceHint::parse(black_box("EN/EN-US")),
                Some(Detection::new("en", 0.9)),
                &catalog,
            )
        });
    });

    group.bench_function("chinese_override", |b| {
        b.iter(|| {
            plan(
                VoiceHint::parse(black_box("EN/EN-US")),
                Some(Detection::new("zh", 0.9)),
                &catalog,
            )
        });
    });

    group.bench_function("custom_voice", |b| {
        b.iter(|| plan(VoiceHint::parse(black_box("voice-42")), None, &catalog));
    });

    group.finish();
}

/// Benchmark reconciling a plan with the acquired backend
fn bench_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("finalize");
    let catalog = catalog();
    let english = backend(
        LanguageCode::En,
        &[("EN-US", 0), ("EN-BR", 1), ("EN-AU", 2), ("EN-Default", 3)],
    );
    let chinese = backend(LanguageCode::Zh, &[("ZH", 1)]);

    let member = plan(VoiceHint::parse("EN/EN-US"), None, &catalog);
    group.bench_function("voice_in_speaker_table", |b| {
        b.iter(|| {
            finalize(
                black_box(member.clone()),
                DefaultBackend::Ready(Arc::clone(&english)),
            )
        });
    });

    let hybrid = plan(
        VoiceHint::parse("EN/EN-US"),
        Some(Detection::new("zh", 0.9)),
        &catalog,
    );
    group.bench_function("chinese_revalidation", |b| {
        b.iter(|| {
            finalize(
                black_box(hybrid.clone()),
                DefaultBackend::Ready(Arc::clone(&chinese)),
            )
        });
    });

    group.finish();
}

/// Benchmark the speaker fallback chain
fn bench_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback");
    let speakers: SpeakerSet = (0..32).map(|i| (format!("SPK-{i}"), i)).collect();
    group.bench_function("fallback_to_first_speaker", |b| {
        b.iter(|| fallback_voice(black_box(&speakers), LanguageCode::Fr, false));
    });

    group.finish();
}

/// Benchmark in-process language classification
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    group.measurement_time(Duration::from_secs(5));
    let classifier = ScriptClassifier::new();

    let samples = [
        ("english", "The quick brown fox jumps over the lazy dog. ".repeat(20)),
        ("chinese", "我能吞下玻璃而不伤身体。".repeat(20)),
        ("hybrid", "我能 eat glass 而不傷身體。".repeat(20)),
        ("spanish", "Puedo comer vidrio, no me hace daño. ".repeat(20)),
    ];

    for (name, text) in &samples {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("detect", name), text, |b, text| {
            b.iter(|| classifier.detect(black_box(text)));
        });
    }

    group.finish();
}

/// Benchmark request body parsing
fn bench_request_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_parsing");

    let minimal = r#"{"input":"Hello"}"#;
    let full = format!(
        r#"{{"model":"voice-1","input":"{}","voice":"EN/EN-US","response_format":"wav","speed":1.2,"config_path":"/tmp/c.json","ckpt_path":"/tmp/G.pth"}}"#,
        "Hello, this is a test message for synthesis. ".repeat(10)
    );

    group.bench_function("minimal", |b| {
        b.iter(|| {
            let _: Result<SynthesisRequest, _> = serde_json::from_str(black_box(minimal));
        });
    });
    group.bench_function("full", |b| {
        b.iter(|| {
            let _: Result<SynthesisRequest, _> = serde_json::from_str(black_box(&full));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_hint_parsing,
    bench_planning,
    bench_finalize,
    bench_fallback,
    bench_classification,
    bench_request_parsing
);
criterion_main!(benches);
