use std::collections::BTreeMap;
use std::sync::Arc;

use strata::index::{
    ArtifactStore, ErrorKind, GraphParams, IndexParams, InMemoryArtifactStore, Level,
    VectorRecord,
};
use strata::manifest::{validate, Manifest, ManifestError, ModelArtifact};
use strata::{
    build_generation, BuildPlan, ControlCommand, LevelInput, RetrievalService, StrataConfig,
    StrataError,
};

fn ring(level: Level, n: usize, phase: f32) -> Vec<VectorRecord> {
    (0..n)
        .map(|i| {
            let a = phase + i as f32 * 0.13;
            VectorRecord::new(format!("{level}-{i:03}"), level, vec![a.cos(), a.sin()])
        })
        .collect()
}

fn config(prefix: &str) -> StrataConfig {
    let mut levels = BTreeMap::new();
    levels.insert(Level::Sentence, IndexParams::Graph(GraphParams::default()));
    levels.insert(Level::Paragraph, IndexParams::Graph(GraphParams::default()));
    let mut config = StrataConfig::new(2, levels);
    config.storage.prefix = prefix.to_string();
    config
}

fn publish(store: &Arc<InMemoryArtifactStore>, prefix: &str, phase: f32) -> (Manifest, String) {
    let model_location = format!("{prefix}/models/sentence-encoder.bin");
    store.put(&model_location, b"sentence encoder weights").unwrap();
    let plan = BuildPlan::new(format!("rev-{prefix}"))
        .with_model(ModelArtifact {
            name: "sentence-encoder".into(),
            version: "1.2.0".into(),
            level: Level::Sentence,
            location: model_location,
            dimension: 2,
        })
        .with_level(LevelInput::new(Level::Sentence, ring(Level::Sentence, 30, phase)))
        .with_level(LevelInput::new(Level::Paragraph, ring(Level::Paragraph, 12, phase)));
    let built = build_generation(&plan, store.clone(), &config(prefix)).unwrap();
    (built.manifest, built.manifest_location)
}

fn flip_one_byte(store: &InMemoryArtifactStore, location: &str, at: usize) {
    let mut bytes = store.get(location).unwrap().unwrap();
    let at = at % bytes.len();
    bytes[at] ^= 0x01;
    store.put(location, &bytes).unwrap();
}

#[test]
fn any_single_byte_mutation_is_a_digest_mismatch() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let (manifest, _) = publish(&store, "gen-1", 0.0);
    let config = config("gen-1");
    validate(&manifest, &*store, &config.manifest).unwrap();

    let locations: Vec<String> = manifest
        .artifact_locations()
        .map(|(location, _)| location.to_string())
        .collect();
    assert_eq!(locations.len(), 3);

    for location in &locations {
        for at in [0, 7, usize::MAX] {
            let original = store.get(location).unwrap().unwrap();
            flip_one_byte(&store, location, at);
            let err = validate(&manifest, &*store, &config.manifest).unwrap_err();
            assert!(
                matches!(err, ManifestError::DigestMismatch { location: ref l, .. } if l == location),
                "{location}@{at}: {err}"
            );
            assert_eq!(err.kind(), ErrorKind::DigestMismatch);
            store.put(location, &original).unwrap();
        }
    }
    validate(&manifest, &*store, &config.manifest).unwrap();
}

#[test]
fn missing_artifact_is_reported() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let (manifest, _) = publish(&store, "gen-1", 0.0);
    store.remove("gen-1/paragraph.idx");
    let err = validate(&manifest, &*store, &config("gen-1").manifest).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingArtifact);
}

#[test]
fn tampered_generation_never_replaces_the_active_one() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let (_, first) = publish(&store, "gen-1", 0.0);
    let (_, second) = publish(&store, "gen-2", 0.5);

    let service = RetrievalService::new(&config("gen-1"), store.clone()).unwrap();
    service
        .handle(ControlCommand::Reload { manifest: first })
        .unwrap();

    flip_one_byte(&store, "gen-2/sentence.idx", 40);
    let err = service
        .handle(ControlCommand::Reload { manifest: second })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DigestMismatch);

    let active = service.manifests().active().unwrap();
    assert_eq!(active.manifest().revision, "rev-gen-1");
    assert_eq!(service.generations().len(), 1);
}

#[test]
fn republishing_a_prefix_cannot_break_rollback() {
    let store = Arc::new(InMemoryArtifactStore::new());
    let (_, first) = publish(&store, "gen", 0.0);
    let service = RetrievalService::new(&config("gen"), store.clone()).unwrap();
    service
        .handle(ControlCommand::Reload {
            manifest: first.clone(),
        })
        .unwrap();
    let generation_one = service.manifests().active().unwrap().id();
    let first_bytes = store.get(&first).unwrap().unwrap();

    let plan = BuildPlan::new("rev-again")
        .with_level(LevelInput::new(Level::Sentence, ring(Level::Sentence, 30, 0.5)))
        .with_level(LevelInput::new(Level::Paragraph, ring(Level::Paragraph, 12, 0.5)));
    let err = build_generation(&plan, store.clone(), &config("gen")).unwrap_err();
    assert!(matches!(err, StrataError::ArtifactExists(_)), "{err}");
    assert_eq!(store.get(&first).unwrap().unwrap(), first_bytes);

    let (_, second) = publish(&store, "gen-b", 0.5);
    service
        .handle(ControlCommand::Reload { manifest: second })
        .unwrap();
    service
        .handle(ControlCommand::Rollback {
            generation: generation_one,
        })
        .unwrap();
    let active = service.manifests().active().unwrap();
    assert_eq!(active.manifest().revision, "rev-gen");
}
