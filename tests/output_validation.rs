//! Validate encoded output: headers, element counts, determinism

use treepack::{
    decode, generate, hash_bytes, to_vec, BenchmarkCase, ByteSink, Decoder, EncoderConfig,
    GrowableBuffer, StreamEncoder, ValueTree,
};

/// Walk one encoded value, checking every container header against the tree
/// and returning how many bytes it spanned.
fn check_headers(bytes: &[u8], tree: &ValueTree) -> usize {
    let mut rd = bytes;
    match tree {
        ValueTree::Array(items) => {
            let n = rmp::decode::read_array_len(&mut rd).unwrap();
            assert_eq!(n as usize, items.len(), "array header count");
            let mut used = bytes.len() - rd.len();
            for item in items {
                used += check_headers(&bytes[used..], item);
            }
            used
        }
        ValueTree::Map(entries) => {
            let n = rmp::decode::read_map_len(&mut rd).unwrap();
            assert_eq!(n as usize, entries.len(), "map header count");
            let mut used = bytes.len() - rd.len();
            for (key, value) in entries {
                used += check_headers(&bytes[used..], key);
                used += check_headers(&bytes[used..], value);
            }
            used
        }
        _ => {
            let mut decoder = Decoder::new(bytes);
            let scalar = decoder.read_value().unwrap();
            assert_eq!(scalar, tree.clone().canonical());
            decoder.position()
        }
    }
}

#[test]
fn test_empty_generator_is_single_header() {
    let bytes = to_vec(&generate(0)).unwrap();
    assert_eq!(bytes, [0x80], "size 0 must encode as an empty fixmap");
}

#[test]
fn test_header_counts_match_tree() {
    for size in [1, 15, 16, 17, 300] {
        let tree = generate(size);
        let bytes = to_vec(&tree).unwrap();
        let used = check_headers(&bytes, &tree);
        assert_eq!(used, bytes.len(), "size {}: every byte belongs to a node", size);
        println!("✅ generate({}): {} nodes, {} bytes", size, tree.node_count(), bytes.len());
    }
}

#[test]
fn test_map_scenario_pairs_in_order() {
    let tree = ValueTree::map([("a", ValueTree::Bool(true)), ("b", ValueTree::Nil)]);
    let bytes = to_vec(&tree).unwrap();

    let mut rd = &bytes[..];
    assert_eq!(rmp::decode::read_map_len(&mut rd).unwrap(), 2);
    assert_eq!(rd, &[0xa1, b'a', 0xc3, 0xa1, b'b', 0xc0]);
}

#[test]
fn test_array_scenario_round_trip() {
    let tree = ValueTree::array([ValueTree::Int(1), ValueTree::Int(2), ValueTree::Int(3)]);
    let bytes = to_vec(&tree).unwrap();
    assert_eq!(decode(&bytes).unwrap(), tree);
}

#[test]
fn test_encoding_is_deterministic() {
    for size in [0, 5, 250] {
        let first = to_vec(&generate(size)).unwrap();
        let second = to_vec(&generate(size)).unwrap();
        assert_eq!(first, second, "size {} not reproducible", size);
    }
}

#[test]
fn test_buffer_policy_does_not_change_output() {
    let tree = generate(200);
    let reference = to_vec(&tree).unwrap();

    for (initial, factor) in [(0usize, 1.5f64), (16, 2.0), (4096, 3.0)] {
        let mut config = EncoderConfig::default();
        config.buffer.initial_capacity = initial;
        config.buffer.growth_factor = factor;
        let encoder = StreamEncoder::new(config).unwrap();

        let mut buffer = GrowableBuffer::with_policy(encoder.config().buffer.clone());
        encoder.encode(&tree, &mut buffer).unwrap();
        assert_eq!(buffer.as_slice(), &reference[..]);
        assert!(
            buffer.reallocations() <= 64,
            "policy ({}, {}) reallocated {} times",
            initial,
            factor,
            buffer.reallocations()
        );
    }
}

#[test]
fn test_benchmark_hash_is_stable() {
    let case = BenchmarkCase::setup(100, EncoderConfig::default()).unwrap();
    let bytes = to_vec(case.root()).unwrap();

    let mut expected = 0u32;
    for _ in 0..4 {
        expected = hash_bytes(expected, &bytes);
    }
    assert_eq!(case.run_iterations(4, 0).unwrap(), expected);
    case.teardown();
}
