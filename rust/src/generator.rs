//! Deterministic benchmark trees
//!
//! `generate(n)` always builds the same tree for the same `n`: the shape and
//! every leaf come from a ChaCha stream seeded by `n`. The root is a map with
//! `n` entries, each a record that touches every value kind.

use crate::value::ValueTree;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SEED_BASE: u64 = 0x6d73_6770_6163_6b21;

const WORDS: [&str; 12] = [
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliett",
    "kilo", "lima",
];

/// Build the benchmark tree for `target_size`.
///
/// Node count is linear in `target_size`; `0` gives an empty map.
///
/// ```
/// use treepack::{generate, ValueTree};
///
/// assert_eq!(generate(0), ValueTree::Map(vec![]));
/// assert_eq!(generate(16), generate(16));
/// ```
pub fn generate(target_size: usize) -> ValueTree {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED_BASE ^ target_size as u64);

    let entries = (0..target_size)
        .map(|i| (ValueTree::Str(format!("entry{i}").into_bytes()), record(&mut rng, i)))
        .collect();
    let tree = ValueTree::Map(entries);

    tracing::debug!(target_size, nodes = tree.node_count(), "generated benchmark tree");
    tree
}

fn word(rng: &mut ChaCha8Rng) -> &'static str {
    WORDS[rng.random_range(0..WORDS.len())]
}

fn record(rng: &mut ChaCha8Rng, index: usize) -> ValueTree {
    let tag_count = rng.random_range(0..4usize);
    let tags = (0..tag_count).map(|_| ValueTree::str(word(rng))).collect();

    let sample_count = rng.random_range(1..8usize);
    let samples = (0..sample_count)
        .map(|_| ValueTree::Int(rng.random_range(-40_000i64..40_000)))
        .collect();

    let name = format!("{}-{}", word(rng), index);

    ValueTree::map([
        ("id", ValueTree::UInt(index as u64)),
        ("name", ValueTree::Str(name.into_bytes())),
        ("active", ValueTree::Bool(rng.random_bool(0.5))),
        ("score", ValueTree::Double(rng.random::<f64>() * 100.0)),
        ("offset", ValueTree::Int(-rng.random_range(1i64..1_000_000))),
        ("hash", ValueTree::UInt(rng.random::<u64>())),
        ("parent", ValueTree::Nil),
        ("tags", ValueTree::Array(tags)),
        ("samples", ValueTree::Array(samples)),
    ])
}
