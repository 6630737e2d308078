// Dense competition ranking over an arbitrary numeric key.

use std::cmp::Ordering;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    Ascending,
    Descending,
}

/// An item with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub item: T,
    pub rank: usize,
}

/// Sort `items` by `value_of` and assign ranks.
///
/// Equal values share a rank and the rank grows by exactly one whenever the
/// value changes, so ranks never skip (1, 1, 2, 3, 3, 4). The sort is stable:
/// items with equal values keep their input order. NaN values sort after
/// every number in either order and share the last rank.
///
/// Returns the ranked items and the highest rank assigned (0 when empty).
pub fn rank_by<T, F>(items: Vec<T>, value_of: F, order: RankOrder) -> (Vec<Ranked<T>>, usize)
where
    F: Fn(&T) -> f64,
{
    let mut keyed: Vec<(f64, T)> = items.into_iter().map(|item| (value_of(&item), item)).collect();
    keyed.sort_by(|a, b| compare(a.0, b.0, order));

    let mut ranked = Vec::with_capacity(keyed.len());
    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for (value, item) in keyed {
        let changed = match previous {
            None => true,
            Some(p) => compare(p, value, order) != Ordering::Equal,
        };
        if changed {
            rank += 1;
        }
        previous = Some(value);
        ranked.push(Ranked { item, rank });
    }

    (ranked, rank)
}

/// Total order over values: numbers by `order`, then every NaN.
fn compare(a: f64, b: f64, order: RankOrder) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            // Neither side is NaN, so the comparison is defined; -0.0 == 0.0.
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match order {
                RankOrder::Ascending => ord,
                RankOrder::Descending => ord.reverse(),
            }
        }
    }
}
