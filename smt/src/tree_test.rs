use rand::{Rng, SeedableRng};
use tenor_primitives::testing::MixHasher;
use tenor_primitives::{FieldHasher, Fr};

use crate::{fold_proof, SmtError, SmtTree};

type Tree = SmtTree<MixHasher>;

fn h(inputs: &[Fr]) -> Fr {
    MixHasher::hash(inputs)
}

#[test]
fn empty_tree_root_is_nested_default_hash() {
    let tree = Tree::new(&[], 3, Fr::zero()).unwrap();
    let d1 = h(&[Fr::zero(), Fr::zero()]);
    let d2 = h(&[d1, d1]);
    let d3 = h(&[d2, d2]);
    assert_eq!(tree.root(), d3);
    assert_eq!(tree.default_root(), d3);
}

#[test]
fn height_three_full_tree_matches_manual_fold() {
    // Leaves 1..=8, default 0.
    let leaves: Vec<Fr> = (1u64..=8).map(Fr::from).collect();
    let tree = Tree::new(&leaves, 3, Fr::zero()).unwrap();

    let l = h(&[
        h(&[Fr::from(1u64), Fr::from(2u64)]),
        h(&[Fr::from(3u64), Fr::from(4u64)]),
    ]);
    let r = h(&[
        h(&[Fr::from(5u64), Fr::from(6u64)]),
        h(&[Fr::from(7u64), Fr::from(8u64)]),
    ]);
    assert_eq!(tree.root(), h(&[l, r]));
}

#[test]
fn unwritten_leaves_read_as_default() {
    let default = Fr::from(99u64);
    let mut tree = Tree::new(&[], 8, default).unwrap();
    for i in [0u64, 1, 17, 255] {
        assert_eq!(tree.leaf(i).unwrap(), default);
    }
    tree.update_leaf(17, Fr::from(5u64)).unwrap();
    assert_eq!(tree.leaf(17).unwrap(), Fr::from(5u64));
    assert_eq!(tree.leaf(16).unwrap(), default);
}

#[test]
fn proofs_fold_back_to_the_root() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xfeed);
    let mut tree = Tree::new(&[], 8, Fr::zero()).unwrap();
    for _ in 0..50 {
        let leaf_id = rng.gen_range(0..256u64);
        tree.update_leaf(leaf_id, Fr::from(rng.gen::<u64>())).unwrap();
    }
    for leaf_id in 0..256u64 {
        let leaf = tree.leaf(leaf_id).unwrap();
        let proof = tree.proof(leaf_id).unwrap();
        assert_eq!(proof.len(), 8);
        assert_eq!(fold_proof::<MixHasher>(8, leaf_id, leaf, &proof), tree.root());
    }
}

#[test]
fn update_is_idempotent() {
    let mut tree = Tree::new(&[], 4, Fr::zero()).unwrap();
    tree.update_leaf(3, Fr::from(77u64)).unwrap();
    let root = tree.root();
    tree.update_leaf(3, Fr::from(77u64)).unwrap();
    assert_eq!(tree.root(), root);
}

#[test]
fn update_order_does_not_matter() {
    let mut a = Tree::new(&[], 5, Fr::zero()).unwrap();
    let mut b = Tree::new(&[], 5, Fr::zero()).unwrap();
    let writes = [(0u64, 10u64), (31, 20), (7, 30), (16, 40)];
    for (i, v) in writes {
        a.update_leaf(i, Fr::from(v)).unwrap();
    }
    for (i, v) in writes.iter().rev() {
        b.update_leaf(*i, Fr::from(*v)).unwrap();
    }
    assert_eq!(a.root(), b.root());
}

#[test]
fn constructor_applies_leaves_in_index_order() {
    let leaves: Vec<Fr> = (0u64..4).map(|i| Fr::from(i + 100)).collect();
    let built = Tree::new(&leaves, 2, Fr::zero()).unwrap();
    let mut incremental = Tree::new(&[], 2, Fr::zero()).unwrap();
    for (i, leaf) in leaves.iter().enumerate() {
        incremental.update_leaf(i as u64, *leaf).unwrap();
    }
    assert_eq!(built.root(), incremental.root());
}

#[test]
fn out_of_range_leaf_is_rejected() {
    let mut tree = Tree::new(&[], 3, Fr::zero()).unwrap();
    assert_eq!(
        tree.leaf(8),
        Err(SmtError::LeafOutOfRange { leaf_id: 8, height: 3 })
    );
    assert!(tree.update_leaf(1 << 3, Fr::one()).is_err());
    assert!(tree.proof(100).is_err());
}
