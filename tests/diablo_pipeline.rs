//! Integration tests for block (s)PLS-DA.

use omics_integration::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Three blocks (5, 8 and 3 features) over 10 samples with a binary outcome.
fn create_blocks() -> (MultiAssay, Outcome) {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let ids: Vec<String> = (1..=10).map(|i| format!("S{:02}", i)).collect();
    let labels: Vec<String> = (0..10)
        .map(|i| if i < 5 { "case" } else { "control" }.to_string())
        .collect();

    let mut block = |name: &str, p: usize| {
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|i| {
                let shift = if i < 5 { 1.0 } else { -1.0 };
                (0..p)
                    .map(|j| if j % 2 == 0 { shift } else { 0.0 } + noise.sample(&mut rng))
                    .collect()
            })
            .collect();
        let features = (1..=p).map(|j| format!("{}_{}", name, j)).collect();
        (name.to_string(), AssayTable::from_rows(&rows, ids.clone(), features).unwrap())
    };
    let blocks = vec![block("A", 5), block("B", 8), block("C", 3)];
    let assays = MultiAssay::new(blocks).unwrap();
    let outcome = Outcome::categorical(ids, labels).unwrap();
    (assays, outcome)
}

#[test]
fn test_non_sparse_keeps_every_feature() {
    let (assays, outcome) = create_blocks();
    let model = block_plsda(&assays, &outcome, 2).unwrap();

    assert!(!model.sparse);
    assert_eq!(model.averaged_variates.shape(), (10, 2));
    for (block, p) in model.blocks.iter().zip([5, 8, 3]) {
        assert_eq!(block.loadings.shape(), (p, 2));
        assert_eq!(block.variates.shape(), (10, 2));
        for comp in 0..2 {
            assert_eq!(block.n_selected(comp), p, "block {} comp {}", block.name, comp);
        }
    }
}

#[test]
fn test_sparse_keep_counts_are_exact() {
    let (assays, outcome) = create_blocks();
    let keep = KeepX::new()
        .with("A", &[2, 2])
        .with("B", &[3, 1])
        .with("C", &[1, 1]);
    let model = block_splsda(&assays, &outcome, 2, keep).unwrap();

    let b = model.block("B").unwrap();
    let comp1 = b.component_loadings(0);
    assert_eq!(comp1.iter().filter(|v| **v != 0.0).count(), 3);
    assert_eq!(comp1.iter().filter(|v| **v == 0.0).count(), 5);
    assert_eq!(b.n_selected(1), 1);
    assert_eq!(model.block("A").unwrap().n_selected(0), 2);
    assert_eq!(model.block("C").unwrap().n_selected(1), 1);

    let selected = model.selected_features("B", 0).unwrap();
    assert_eq!(selected.len(), 3);
    assert!(selected[0].loading.abs() >= selected[2].loading.abs());
}

#[test]
fn test_keep_length_mismatch_rejected() {
    let (assays, outcome) = create_blocks();
    let keep = KeepX::new().with("B", &[3]);
    let result = block_splsda(&assays, &outcome, 2, keep);
    assert!(matches!(result, Err(OmicsError::InvalidParameter(_))));
}

#[test]
fn test_keep_beyond_varying_features_rejected() {
    let (assays, outcome) = create_blocks();
    let ids = assays.sample_ids().to_vec();
    let rows: Vec<Vec<f64>> = (0..10)
        .map(|i| vec![i as f64, 3.0, (i % 3) as f64, 3.0])
        .collect();
    let features = (1..=4).map(|j| format!("B_{}", j)).collect();
    let b = AssayTable::from_rows(&rows, ids, features).unwrap();
    let blocks = MultiAssay::new(vec![
        ("A".to_string(), assays.get("A").unwrap().clone()),
        ("B".to_string(), b),
    ])
    .unwrap();

    let too_many = block_splsda(&blocks, &outcome, 2, KeepX::new().with("B", &[3, 3]));
    assert!(matches!(too_many, Err(OmicsError::InvalidParameter(_))));

    let model = block_splsda(&blocks, &outcome, 2, KeepX::new().with("B", &[2, 2])).unwrap();
    let b = model.block("B").unwrap();
    assert_eq!(b.n_selected(0), 2);
    assert_eq!(b.n_selected(1), 2);
}

#[test]
fn test_misaligned_blocks_rejected() {
    let ids: Vec<String> = (1..=4).map(|i| format!("S{}", i)).collect();
    let mut reversed = ids.clone();
    reversed.reverse();
    let rows = vec![vec![1.0, 2.0]; 4];
    let features = vec!["x".to_string(), "y".to_string()];

    let a = AssayTable::from_rows(&rows, ids.clone(), features.clone()).unwrap();
    let b = AssayTable::from_rows(&rows, reversed, features.clone()).unwrap();
    let c = AssayTable::from_rows(&rows[..3], ids[..3].to_vec(), features).unwrap();

    let order = MultiAssay::new(vec![("a".to_string(), a.clone()), ("b".to_string(), b)]);
    assert!(matches!(order, Err(OmicsError::SampleMismatch(_))));
    let count = MultiAssay::new(vec![("a".to_string(), a), ("c".to_string(), c)]);
    assert!(matches!(count, Err(OmicsError::SampleMismatch(_))));
}

#[test]
fn test_synthetic_subtypes_are_separated() {
    let data = generate_synthetic(&SyntheticConfig::small().with_seed(3)).unwrap();
    let keep = KeepX::new()
        .with("A", &[2, 2])
        .with("B", &[3, 3])
        .with("C", &[1, 1]);
    let model = block_splsda(&data.assays, &data.outcome, 2, keep).unwrap();

    let prediction = model.predict(&data.assays).unwrap();
    assert!(prediction.accuracy(&model.labels) >= 0.9);

    let selected = model.selected_features("B", 0).unwrap();
    assert!(selected
        .iter()
        .any(|f| data.ground_truth.is_informative("B", &f.feature_id)));

    let circle = model.correlation_circle(0, 1).unwrap();
    assert!(circle.iter().all(|p| p.x.abs() <= 1.0 + 1e-9 && p.y.abs() <= 1.0 + 1e-9));
}

#[test]
fn test_model_json_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let (assays, outcome) = create_blocks();
    let model = block_plsda(&assays, &outcome, 2).unwrap();

    let path = dir.path().join("plsda.json");
    omics_integration::persist::save_plsda_model(&path, &model).unwrap();
    let loaded = omics_integration::persist::load_plsda_model(&path).unwrap();
    assert_eq!(loaded.averaged_variates, model.averaged_variates);
    assert_eq!(loaded.blocks[1].loadings, model.blocks[1].loadings);
}
