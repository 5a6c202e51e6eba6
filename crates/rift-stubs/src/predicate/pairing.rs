//! One-to-one pairing of declared and observed elements for unordered
//! comparisons (JSON arrays, XML children).

/// True when every declared element can be paired with a distinct observed
/// element it is compatible with, and no observed element is left over.
///
/// Compatibility is evaluated once per pair, then a maximum bipartite
/// matching is grown with augmenting paths.
pub(crate) fn perfect_pairing<E, A>(
    expected: &[E],
    actual: &[A],
    compatible: impl Fn(&E, &A) -> bool,
) -> bool {
    if expected.len() != actual.len() {
        return false;
    }

    let candidates: Vec<Vec<usize>> = expected
        .iter()
        .map(|e| {
            actual
                .iter()
                .enumerate()
                .filter(|(_, a)| compatible(e, a))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();
    if candidates.iter().any(Vec::is_empty) {
        return false;
    }

    // owner[j] is the declared element currently paired with observed j.
    let mut owner: Vec<Option<usize>> = vec![None; actual.len()];
    for declared in 0..expected.len() {
        let mut visited = vec![false; actual.len()];
        if !augment(declared, &candidates, &mut owner, &mut visited) {
            return false;
        }
    }
    true
}

fn augment(
    declared: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &observed in &candidates[declared] {
        if visited[observed] {
            continue;
        }
        visited[observed] = true;
        let free = match owner[observed] {
            None => true,
            Some(other) => augment(other, candidates, owner, visited),
        };
        if free {
            owner[observed] = Some(declared);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_requires_distinct_partners() {
        // Both declared elements only accept observed 0.
        assert!(!perfect_pairing(&[0, 0], &[0, 1], |e, a| e == a));
        assert!(perfect_pairing(&[1, 0], &[0, 1], |e, a| e == a));
    }

    #[test]
    fn test_pairing_reassigns_earlier_choice() {
        // Declared 0 accepts either; declared 1 accepts only observed 0.
        let accepts = |e: &usize, a: &usize| *e == 0 || *a == 0;
        assert!(perfect_pairing(&[0, 1], &[0, 1], accepts));
    }

    #[test]
    fn test_pairing_length_mismatch() {
        assert!(!perfect_pairing(&[1, 2], &[1], |e, a| e == a));
        assert!(perfect_pairing::<u8, u8>(&[], &[], |_, _| false));
    }

    #[test]
    fn test_pairing_large_interchangeable_input() {
        // Every element accepts every partner except its own index; plain
        // backtracking would explore factorially many orders here.
        let values: Vec<usize> = (0..200).collect();
        assert!(perfect_pairing(&values, &values, |e, a| e != a));

        let mut skewed = values.clone();
        skewed[199] = 0;
        assert!(!perfect_pairing(&values, &skewed, |e, a| e == a));
    }
}
