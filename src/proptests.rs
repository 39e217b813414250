use super::*;

use proptest::prelude::*;
use std::{collections::BTreeMap, str::FromStr};

fn id8(value: u8) -> Id {
    Id::from_u64(8, value as u64).unwrap()
}

fn bucket(local: u8, key: u8) -> usize {
    8 - (local ^ key).leading_zeros() as usize
}

/// Store order of `key` around `local`.
fn rank(local: u8, key: u8) -> (usize, u8) {
    (bucket(local, key), key)
}

#[derive(Clone, Debug)]
enum Op {
    Put(u8, u32),
    Remove(u8),
    Get(u8),
    ClearRange(u8, u8),
    RangePut(u8, u8, u8, u32),
    Closest(u8, usize),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        6 => (any::<u8>(), any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        2 => any::<u8>().prop_map(Op::Remove),
        2 => any::<u8>().prop_map(Op::Get),
        1 => (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::ClearRange(a, b)),
        2 => (any::<u8>(), any::<u8>(), any::<u8>(), any::<u32>())
            .prop_map(|(a, b, k, v)| Op::RangePut(a, b, k, v)),
        2 => (any::<u8>(), 0..12usize).prop_map(|(t, n)| Op::Closest(t, n)),
    ];

    prop::collection::vec(op, 1..300)
}

fn bucket_len(model: &BTreeMap<u8, u32>, local: u8, index: usize) -> usize {
    model.keys().filter(|k| bucket(local, **k) == index).count()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(local in any::<u8>(), capacity in 1..5usize, ops in ops_strategy()) {
        let store: BucketStore<u32> = BucketStore::with_capacity(id8(local), capacity);
        let mut model: BTreeMap<u8, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    let outcome = store.put(id8(key), value).unwrap();

                    let expected = match model.get(&key) {
                        Some(previous) => PutOutcome::Replaced(*previous),
                        None if bucket_len(&model, local, bucket(local, key)) >= capacity => {
                            PutOutcome::Rejected(value)
                        }
                        None => PutOutcome::Inserted,
                    };
                    if !expected.is_rejected() {
                        model.insert(key, value);
                    }

                    prop_assert_eq!(outcome, expected);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(store.remove(&id8(key)).unwrap(), model.remove(&key));
                }
                Op::Get(key) => {
                    prop_assert_eq!(store.get(&id8(key)).unwrap(), model.get(&key).copied());
                }
                Op::ClearRange(from, to) => {
                    match store.sub_map(id8(from), id8(to)) {
                        Ok(range) => {
                            prop_assert!(rank(local, from) <= rank(local, to));

                            let within = |k: &u8| rank(local, from) <= rank(local, *k) && rank(local, *k) < rank(local, to);
                            let expected = model.keys().filter(|k| within(*k)).count();
                            prop_assert_eq!(range.len(), expected);

                            range.clear();
                            model.retain(|k, _| !within(k));
                        }
                        Err(Error::InvalidRange(_)) => {
                            prop_assert!(rank(local, from) > rank(local, to));
                        }
                        Err(error) => prop_assert!(false, "unexpected error {error}"),
                    }
                }
                Op::RangePut(from, to, key, value) => {
                    if let Ok(range) = store.tail_map(id8(from)).and_then(|tail| tail.head_map(id8(to))) {
                        let within = rank(local, from) <= rank(local, key) && rank(local, key) < rank(local, to);

                        match range.put(id8(key), value) {
                            Ok(outcome) => {
                                prop_assert!(within);
                                if !outcome.is_rejected() {
                                    model.insert(key, value);
                                }
                            }
                            Err(Error::OutOfBounds(_)) => prop_assert!(!within),
                            Err(error) => prop_assert!(false, "unexpected error {error}"),
                        }
                    }
                }
                Op::Closest(target, count) => {
                    let closest: Vec<u8> = store
                        .closest_entries(&id8(target), count)
                        .unwrap()
                        .into_iter()
                        .map(|(key, _)| key.as_bytes()[0])
                        .collect();

                    let mut expected: Vec<u8> = model.keys().copied().filter(|k| *k != local).collect();
                    expected.sort_by_key(|k| (k ^ target, *k));
                    expected.truncate(count);

                    prop_assert_eq!(closest, expected);
                }
            }

            prop_assert_eq!(store.len(), model.len());
        }

        store.check_invariants();

        let mut expected: Vec<u8> = model.keys().copied().collect();
        expected.sort_by_key(|k| rank(local, *k));
        let got: Vec<u8> = store.key_set().iter().map(|key| key.as_bytes()[0]).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_iterator_remove(local in any::<u8>(), keys in prop::collection::vec(any::<u8>(), 0..100), modulo in 2..5u8) {
        let store: BucketStore<u8> = BucketStore::with_capacity(id8(local), 4);
        for key in keys {
            let _ = store.put(id8(key), key).unwrap();
        }
        let before = store.len();

        let mut removed = 0;
        let mut iter = store.iter();
        while let Some((_, value)) = iter.next() {
            if value % modulo == 0 {
                iter.remove().unwrap();
                removed += 1;
            }
        }

        prop_assert_eq!(store.len(), before - removed);
        prop_assert!(store.values().iter().all(|value| value % modulo != 0));
        store.check_invariants();
    }

    #[test]
    fn prop_distance(a in any::<[u8; 20]>(), b in any::<[u8; 20]>(), c in any::<[u8; 20]>()) {
        let a = Id::from_bytes(a).unwrap();
        let b = Id::from_bytes(b).unwrap();
        let c = Id::from_bytes(c).unwrap();

        prop_assert!(a.distance(&a).is_zero());
        prop_assert_eq!(a.distance(&b), b.distance(&a));
        prop_assert_eq!(a.bucket_position(&b), a.distance(&b).bit_length());

        // XOR distances can't be longer than the longest of the two legs.
        let bits = a.distance(&c).bit_length();
        prop_assert!(bits <= a.distance(&b).bit_length().max(b.distance(&c).bit_length()));
    }

    #[test]
    fn prop_hex(bits in 1..=160usize) {
        let id = Id::random_with_bits(bits);

        let parsed = Id::from_str(&id.to_string()).unwrap();

        // Hex digits carry 4 bits, so only the value survives odd lengths.
        prop_assert_eq!(parsed.as_bytes().last(), id.as_bytes().last());
        prop_assert_eq!(parsed.bit_length(), bits.div_ceil(4) * 4);
        if bits % 4 == 0 {
            prop_assert_eq!(parsed, id);
        }
    }
}
