use bson::Bson;
use mangrove::Expr;
use proptest::prelude::*;
use proptest::sample::subsequence;

// The full set of distinct comparison operators the accumulator can place on
// one field. Applying any subset in any order must produce the same operator
// map (order-independent for distinct symbols).
const OPERATORS: [&str; 8] = ["$gt", "$gte", "$lt", "$lte", "$ne", "$exists", "$size", "$type"];

fn apply(expr: Expr, op: &str, value: i32) -> Expr {
    expr.operator(op, value)
}

proptest! {
    #[test]
    fn prop_operator_map_is_order_independent(
        ops in subsequence(OPERATORS.to_vec(), 1..OPERATORS.len()),
        values in proptest::collection::vec(any::<i32>(), 8),
        shuffle_seed in any::<u64>(),
    ) {
        let pairs: Vec<(&str, i32)> =
            ops.iter().enumerate().map(|(i, op)| (*op, values[i])).collect();

        // a cheap deterministic shuffle of the same pairs
        let mut shuffled = pairs.clone();
        let mut state = shuffle_seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let mut a = Expr::new().field("f");
        for (op, value) in &pairs {
            a = apply(a, op, *value);
        }
        let mut b = Expr::new().field("f");
        for (op, value) in &shuffled {
            b = apply(b, op, *value);
        }

        let map_a = match a.criteria().get("f") {
            Some(Bson::Document(doc)) => doc.clone(),
            other => panic!("expected operator map, got {other:?}"),
        };
        let map_b = match b.criteria().get("f") {
            Some(Bson::Document(doc)) => doc.clone(),
            other => panic!("expected operator map, got {other:?}"),
        };

        let mut entries_a: Vec<(String, Bson)> = map_a.into_iter().collect();
        let mut entries_b: Vec<(String, Bson)> = map_b.into_iter().collect();
        entries_a.sort_by(|x, y| x.0.cmp(&y.0));
        entries_b.sort_by(|x, y| x.0.cmp(&y.0));
        prop_assert_eq!(entries_a, entries_b);
    }

    #[test]
    fn prop_last_write_wins_per_operator(first in any::<i32>(), second in any::<i32>()) {
        let expr = Expr::new().field("f").gt(first).gt(second);
        prop_assert_eq!(
            expr.criteria().get("f").and_then(|v| v.as_document()).and_then(|d| d.get("$gt")),
            Some(&Bson::Int32(second))
        );
    }
}
