//! Determinism goldens for the commitment engine.
//!
//! Two builds over identical input byte streams and identical configuration
//! must yield identical Merkle roots and snapshot identities.

use std::sync::Arc;

use civic_atlas_kernel::{
    AtlasBuilder, AtlasConfig, BuildScope, InMemoryFetcher, Layer, ProgressSender, SourceId,
    SourceRegistry,
};
use civic_atlas_kernel::canonical::{dequantize_coord, quantize_coord};
use civic_atlas_kernel::commit::{encode_leaf, leaf_bytes};
use civic_atlas_kernel::types::{
    AuthorityLevel, BoundaryGeometry, BoundaryLevel, CanonicalBoundary, LegalStatus, Provenance,
};
use chrono::DateTime;
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn wisconsin_fixture() -> String {
    let features: Vec<String> = (0..8)
        .map(|i| {
            let x = -92.0 + i as f64 * 0.5;
            format!(
                r#"{{"type":"Feature","properties":{{"GEOID":"55{i:02}","NAMELSAD":"District {i}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x},43.0],[{x2},43.0],[{x2},43.45],[{x},43.45],[{x},43.0]]]}}}}"#,
                x = x,
                x2 = x + 0.49,
            )
        })
        .collect();
    format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    )
}

async fn build_once(checkpoint_dir: &std::path::Path) -> civic_atlas_kernel::BuildResult {
    let fetcher = InMemoryFetcher::new();
    fetcher.insert(
        &SourceId::new(Layer::CongressionalDistrict, "55", 2024),
        wisconsin_fixture(),
    );
    let mut config = AtlasConfig::default();
    config.batch_ingestion.checkpoint_dir = checkpoint_dir.to_path_buf();
    let builder = Arc::new(AtlasBuilder::new(
        Arc::new(fetcher),
        Arc::new(SourceRegistry::new()),
        config,
        ProgressSender::disabled(),
    ));
    builder
        .build(BuildScope {
            states: vec!["55".to_string()],
            layers: vec![Layer::CongressionalDistrict],
            year: 2024,
        })
        .await
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// DETERMINISM TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_identical_builds_yield_identical_roots() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let a = build_once(dir_a.path()).await;
    let b = build_once(dir_b.path()).await;

    assert_eq!(a.snapshot.merkle_root, b.snapshot.merkle_root);
    assert_eq!(a.snapshot.snapshot_id, b.snapshot.snapshot_id);
    assert_eq!(a.snapshot.leaf_count, b.snapshot.leaf_count);
    assert_eq!(a.snapshot.layer_counts, b.snapshot.layer_counts);
}

#[tokio::test]
async fn test_ten_repeat_builds_stable_root() {
    let mut roots = Vec::new();
    for _ in 0..10 {
        let dir = tempfile::tempdir().unwrap();
        roots.push(build_once(dir.path()).await.snapshot.merkle_root);
    }
    for root in &roots[1..] {
        assert_eq!(root, &roots[0]);
    }
}

#[tokio::test]
async fn test_changed_input_changes_root() {
    let dir_a = tempfile::tempdir().unwrap();
    let a = build_once(dir_a.path()).await;

    // Same scope, one vertex nudged beyond the quantization precision.
    let fetcher = InMemoryFetcher::new();
    fetcher.insert(
        &SourceId::new(Layer::CongressionalDistrict, "55", 2024),
        wisconsin_fixture().replace("43.45", "43.451"),
    );
    let dir_b = tempfile::tempdir().unwrap();
    let mut config = AtlasConfig::default();
    config.batch_ingestion.checkpoint_dir = dir_b.path().to_path_buf();
    let builder = Arc::new(AtlasBuilder::new(
        Arc::new(fetcher),
        Arc::new(SourceRegistry::new()),
        config,
        ProgressSender::disabled(),
    ));
    let b = builder
        .build(BuildScope {
            states: vec!["55".to_string()],
            layers: vec![Layer::CongressionalDistrict],
            year: 2024,
        })
        .await
        .unwrap();

    assert_ne!(a.snapshot.merkle_root, b.snapshot.merkle_root);
}

// ─────────────────────────────────────────────────────────────────────────────
// PROPERTY TESTS
// ─────────────────────────────────────────────────────────────────────────────

fn boundary_with_origin(lon: f64, lat: f64) -> CanonicalBoundary {
    let ring = vec![
        [lon, lat],
        [lon + 0.1, lat],
        [lon + 0.1, lat + 0.1],
        [lon, lat + 0.1],
        [lon, lat],
    ];
    CanonicalBoundary {
        id: "5501".to_string(),
        name: "District 5501".to_string(),
        level: BoundaryLevel::District,
        geometry: BoundaryGeometry::from_rings(vec![vec![ring]]),
        provenance: Provenance {
            provider: "US Census Bureau".into(),
            url: "https://example.test/x.zip".into(),
            vintage: 2024,
            license: "public-domain".into(),
            retrieved_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            content_sha256: "ab".repeat(32),
            authority_level: AuthorityLevel::Federal,
            legal_status: LegalStatus::Enacted,
            coordinate_system: "EPSG:4326".into(),
        },
    }
}

proptest! {
    #[test]
    fn prop_quantization_is_idempotent(value in -180.0f64..180.0) {
        let once = quantize_coord(value);
        let twice = quantize_coord(dequantize_coord(once));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_leaf_bytes_deterministic(lon in -179.0f64..178.0, lat in -89.0f64..88.0) {
        let boundary = boundary_with_origin(lon, lat);
        prop_assert_eq!(leaf_bytes(&boundary), leaf_bytes(&boundary));
        prop_assert_eq!(encode_leaf(&boundary), encode_leaf(&boundary));
    }

    #[test]
    fn prop_sub_precision_noise_is_invisible(
        lon_units in -1_790_000_000i64..1_780_000_000,
        lat_units in -890_000_000i64..880_000_000,
    ) {
        // Start from coordinates exactly on the quantization grid so the
        // injected noise is far from any rounding boundary.
        let lon = dequantize_coord(lon_units);
        let lat = dequantize_coord(lat_units);
        let a = boundary_with_origin(lon, lat);
        let b = boundary_with_origin(lon + 1e-12, lat - 1e-12);
        prop_assert_eq!(encode_leaf(&a), encode_leaf(&b));
    }
}
