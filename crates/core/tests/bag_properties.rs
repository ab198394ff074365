use nous_core::{Bag, Budget, CurveBag, DelayBag, Entry, Forgetting, PutResult, TaskQueue};
use proptest::prelude::*;

type E = Entry<u8>;

fn arb_entry() -> impl Strategy<Value = E> {
    (0u8..32, 0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0)
        .prop_map(|(k, p, d, q)| Entry::new(k, Budget::new(p, d, q)))
}

fn bags(capacity: usize) -> Vec<Box<dyn Bag<E>>> {
    vec![
        Box::new(CurveBag::with_seed(capacity, 1)),
        Box::new(DelayBag::new(capacity)),
    ]
}

// ── Capacity invariant ───────────────────────────────────────────────

proptest! {
    #[test]
    fn size_never_exceeds_capacity(
        capacity in 0usize..8,
        items in prop::collection::vec(arb_entry(), 0..64),
    ) {
        for mut bag in bags(capacity) {
            for item in items.clone() {
                let _ = bag.put(item);
                prop_assert!(bag.len() <= capacity);
            }
            bag.check_invariants();
        }
    }
}

// ── No duplicate keys ────────────────────────────────────────────────

proptest! {
    #[test]
    fn keys_are_unique(items in prop::collection::vec(arb_entry(), 0..64)) {
        for mut bag in bags(16) {
            for item in items.clone() {
                let _ = bag.put(item);
            }
            let mut keys: Vec<u8> = bag.iter().map(|e| e.key).collect();
            let total = keys.len();
            keys.sort_unstable();
            keys.dedup();
            prop_assert_eq!(keys.len(), total);
        }
    }
}

// ── Monotonic rejection ──────────────────────────────────────────────

proptest! {
    #[test]
    fn weakest_put_leaves_full_bag_unchanged(
        priorities in prop::collection::vec(0.2f32..=1.0, 4),
        weak in 0.0f32..0.1,
    ) {
        for mut bag in bags(4) {
            for (k, p) in priorities.iter().enumerate() {
                let _ = bag.put(Entry::new(k as u8, Budget::new(*p, 0.5, 0.5)));
            }
            let before = bag.snapshot();
            let result = bag.put(Entry::new(200, Budget::new(weak, 0.5, 0.5)));
            prop_assert!(matches!(result, PutResult::Rejected(_)));
            prop_assert_eq!(bag.snapshot(), before);
        }
    }

    #[test]
    fn eviction_removes_the_minimum(items in prop::collection::vec(arb_entry(), 1..64)) {
        for mut bag in bags(4) {
            for item in items.clone() {
                let min_before = bag.min_rank();
                let full = bag.len() == bag.capacity();
                if let PutResult::Evicted(evicted) = bag.put(item) {
                    prop_assert!(full);
                    let min = min_before.expect("full bag has a minimum");
                    prop_assert_eq!(evicted.budget.priority(), min.priority());
                    prop_assert!(!bag.contains(&evicted.key));
                }
            }
        }
    }
}

// ── Decay boundedness ────────────────────────────────────────────────

proptest! {
    #[test]
    fn decay_stays_between_floor_and_prior(
        p in 0.0f32..=1.0,
        d in 0.0f32..=1.0,
        q in 0.0f32..=1.0,
        rate in 0.0f32..=1.0,
        eps in 0.0f32..0.2,
        rounds in 1usize..200,
    ) {
        let mut budget = Budget::new(p, d, q);
        let floor = p.min(q * eps);
        for _ in 0..rounds {
            let prior = budget.priority();
            budget.decay(rate, eps);
            prop_assert!(budget.priority() <= prior);
            prop_assert!(budget.priority() >= 0.0);
            prop_assert!(budget.priority() >= floor - 1e-6);
            prop_assert!(budget.is_valid());
        }
    }

    #[test]
    fn forgetting_keeps_bag_consistent(
        items in prop::collection::vec(arb_entry(), 1..32),
        rounds in 1usize..64,
    ) {
        let mut bag = CurveBag::with_seed(8, 3);
        for item in items {
            let _ = bag.put(item);
        }
        let forgetting = Forgetting::new(0.5, 0.05);
        for _ in 0..rounds {
            let Some(fired) = bag.forget_next(&forgetting) else {
                break;
            };
            bag.check_invariants();
            match bag.get(&fired.key) {
                Some(kept) => prop_assert!(kept.budget.priority() > 0.05),
                None => prop_assert!(fired.budget.priority() <= 0.05),
            }
        }
    }
}

// ── Task queue ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn task_queue_drains_in_descending_order(
        items in prop::collection::vec(arb_entry(), 0..64),
        capacity in 1usize..16,
    ) {
        let mut queue = TaskQueue::new(capacity);
        for item in items {
            let _ = queue.push(item);
            prop_assert!(queue.len() <= capacity);
        }
        let drained = queue.drain_descending(usize::MAX);
        for pair in drained.windows(2) {
            prop_assert!(pair[0].budget.priority() >= pair[1].budget.priority());
        }
        prop_assert!(queue.is_empty());
    }
}
