use std::sync::Arc;

use strata::index::{
    BuilderConfig, GraphParams, IndexBuilder, IndexHandle, IndexSet, InMemoryArtifactStore,
    Level, Neighbor, VectorIndex, VectorRecord,
};
use strata::router::{
    fuse, fuse_rrf, FusionMethod, LevelHits, OmissionReason, QueryVectors, ResultLevel,
    RouteError, RouteRequest, Router, RouterConfig,
};

fn hits(ids: &[&str]) -> Vec<Neighbor> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| Neighbor {
            id: id.to_string(),
            score: 1.0 - i as f32 * 0.05,
        })
        .collect()
}

fn ring(level: Level, n: usize) -> Vec<VectorRecord> {
    (0..n)
        .map(|i| {
            let a = i as f32 * std::f32::consts::TAU / n as f32;
            VectorRecord::new(format!("{level}-{i:03}"), level, vec![a.cos(), a.sin()])
        })
        .collect()
}

/// Sentence and paragraph loaded, document described but never loaded.
fn index_set_without_document() -> IndexSet {
    let store = Arc::new(InMemoryArtifactStore::new());
    let builder = IndexBuilder::new(BuilderConfig::new(2), store);
    let mut set = IndexSet::new();
    for level in [Level::Sentence, Level::Paragraph, Level::Document] {
        let built = builder
            .build_graph(level, &ring(level, 24), GraphParams::default())
            .unwrap();
        let handle = if level == Level::Document {
            IndexHandle::new(built.descriptor)
        } else {
            IndexHandle::resident(built.descriptor, built.index)
        };
        set.insert(level, Arc::new(handle) as Arc<dyn VectorIndex>);
    }
    set
}

#[test]
fn fusion_is_byte_identical_across_calls() {
    let lists = vec![
        LevelHits::new(Level::Sentence, hits(&["a", "b", "c", "d"])),
        LevelHits::new(Level::Paragraph, hits(&["c", "a", "e"])),
        LevelHits::new(Level::Document, hits(&["e", "f", "a"])),
    ];
    for method in [FusionMethod::Rrf, FusionMethod::MaxSim] {
        let first = serde_json::to_vec(&fuse(&lists, method, 60.0, 5)).unwrap();
        let second = serde_json::to_vec(&fuse(&lists, method, 60.0, 5)).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn rrf_scenario_scores() {
    let both = vec![
        LevelHits::new(Level::Sentence, hits(&["A"])),
        LevelHits::new(Level::Document, hits(&["A"])),
    ];
    let fused = fuse_rrf(&both, 60.0, 10);
    assert_eq!(fused.len(), 1);
    assert!((fused[0].score - 2.0 / 60.0).abs() < 1e-12);
    assert_eq!(fused[0].level, ResultLevel::Multi);

    let single = fuse_rrf(&both[..1], 60.0, 10);
    assert!((single[0].score - 1.0 / 60.0).abs() < 1e-12);
    assert_eq!(single[0].level, ResultLevel::Single(Level::Sentence));
}

#[test]
fn top_everywhere_outranks_top_once() {
    for kappa in [0.01, 1.0, 60.0, 1_000.0] {
        let lists = vec![
            LevelHits::new(Level::Sentence, hits(&["shared", "x"])),
            LevelHits::new(Level::Paragraph, hits(&["shared", "y"])),
            LevelHits::new(Level::Document, hits(&["shared", "z"])),
        ];
        let fused = fuse_rrf(&lists, kappa, 10);
        assert_eq!(fused[0].id, "shared");

        let solo = vec![LevelHits::new(Level::Sentence, hits(&["solo"]))];
        let solo_score = fuse_rrf(&solo, kappa, 1)[0].score;
        assert!(fused[0].score >= solo_score);
    }
}

#[tokio::test]
async fn unloaded_document_level_is_omitted() {
    let router = Router::new(RouterConfig::default()).unwrap();
    let set = index_set_without_document();
    let request = RouteRequest::new(
        QueryVectors::Shared(vec![1.0, 0.0]),
        [Level::Sentence, Level::Paragraph, Level::Document],
        5,
        FusionMethod::Rrf,
    );
    let response = router.route(&set, &request).await.unwrap();
    assert_eq!(response.searched, vec![Level::Sentence, Level::Paragraph]);
    assert_eq!(response.omitted.len(), 1);
    assert_eq!(response.omitted[0].level, Level::Document);
    assert_eq!(response.omitted[0].reason, OmissionReason::NotLoaded);
    assert!(response.is_partial());
    assert_eq!(response.results.len(), 5);
    assert!(response
        .results
        .iter()
        .all(|r| r.trace.iter().all(|c| c.level != Level::Document)));
}

#[tokio::test]
async fn only_unloaded_levels_is_an_error() {
    let router = Router::new(RouterConfig::default()).unwrap();
    let set = index_set_without_document();
    let request = RouteRequest::new(
        QueryVectors::Shared(vec![0.0, 1.0]),
        [Level::Document],
        5,
        FusionMethod::MaxSim,
    );
    let err = router.route(&set, &request).await.unwrap_err();
    assert!(matches!(err, RouteError::NoLevelsAvailable { ref omitted } if omitted.len() == 1));
}
