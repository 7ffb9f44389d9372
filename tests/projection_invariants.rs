use dx_sanitizer::mechanism::{squared_distance, MechanismError, NearestNeighborProjector};
use dx_sanitizer::types::TokenId;
use dx_sanitizer::vocabulary::EmbeddingTable;
use ndarray::{array, Array2, Array3, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_table(rng: &mut StdRng, vocabulary: usize, dimension: usize) -> EmbeddingTable {
    EmbeddingTable::new(Array2::from_shape_fn((vocabulary, dimension), |_| {
        rng.gen_range(-1.0f32..1.0)
    }))
}

/// Reference argmin over the full vocabulary, Euclidean distance.
fn brute_force(table: &EmbeddingTable, point: ArrayView1<'_, f32>) -> TokenId {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (v, row) in table.rows().outer_iter().enumerate() {
        let distance = row
            .iter()
            .zip(point.iter())
            .map(|(&a, &b)| f64::from(a - b).powi(2))
            .sum::<f64>()
            .sqrt();
        if distance < best_distance {
            best_distance = distance;
            best = v as TokenId;
        }
    }
    best
}

#[test]
fn projection_matches_brute_force_argmin() {
    let mut rng = StdRng::seed_from_u64(42);
    let table = random_table(&mut rng, 37, 6);
    let points = Array3::from_shape_fn((4, 9, 6), |_| rng.gen_range(-1.5f32..1.5));

    let ids = NearestNeighborProjector::new(&table).project(points.view()).unwrap();

    assert_eq!(ids.dim(), (4, 9));
    for n in 0..4 {
        for l in 0..9 {
            let point = points.slice(ndarray::s![n, l, ..]);
            assert_eq!(ids[[n, l]], brute_force(&table, point), "position ({n},{l})");
        }
    }
}

#[test]
fn unperturbed_embeddings_project_to_themselves() {
    let mut rng = StdRng::seed_from_u64(5);
    let table = random_table(&mut rng, 20, 4);
    let ids = array![[3u32, 0, 19], [7, 7, 1]];
    let embeddings = table.embed(ids.view()).unwrap();

    let projected = NearestNeighborProjector::new(&table)
        .project(embeddings.view())
        .unwrap();
    assert_eq!(projected, ids);
}

#[test]
fn ties_resolve_to_lowest_id() {
    // rows 1 and 3 are identical; the midpoint between rows 0 and 2 is
    // equidistant from both
    let table = EmbeddingTable::from_rows(vec![
        vec![-1.0, 0.0],
        vec![5.0, 5.0],
        vec![1.0, 0.0],
        vec![5.0, 5.0],
    ])
    .unwrap();
    let points = array![[[5.0f32, 5.0], [0.0, 0.0]]];

    let ids = NearestNeighborProjector::new(&table).project(points.view()).unwrap();
    assert_eq!(ids, array![[1u32, 0]]);
}

#[test]
fn dimension_mismatch_is_rejected() {
    let table = EmbeddingTable::from_rows(vec![vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
    let points = Array3::<f32>::zeros((1, 2, 3));

    let result = NearestNeighborProjector::new(&table).project(points.view());
    assert!(matches!(result, Err(MechanismError::ShapeMismatch { .. })));
}

#[test]
fn empty_vocabulary_is_rejected() {
    let table = EmbeddingTable::new(Array2::zeros((0, 2)));
    let points = Array3::<f32>::zeros((1, 1, 2));

    let result = NearestNeighborProjector::new(&table).project(points.view());
    assert_eq!(result, Err(MechanismError::EmptyVocabulary));
}

#[test]
fn squared_distance_is_sum_of_squares() {
    let a = array![1.0f32, 2.0, 3.0];
    let b = array![1.0f32, 0.0, -1.0];
    assert_eq!(squared_distance(a.view(), b.view()), 20.0);
    assert_eq!(squared_distance(a.view(), a.view()), 0.0);
}
