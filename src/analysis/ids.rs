//! Deterministic small-integer id assignment.
//!
//! Ids live in `1..=255`; `0` is the reserved "unset" tag. Forced ids are reserved first, then the
//! remaining candidates are sorted by `(name, discovery order)` and each takes the lowest free id. The
//! result depends only on the candidate set, so re-running an unchanged pass yields the same mapping.
//!
//! Adding a candidate keeps existing ids when the newcomer sorts after every unforced name or forces an
//! unused id. An unforced newcomer that sorts earlier shifts the unforced ids behind it; forcing an id
//! is how a variant pins its tag.

use std::collections::BTreeSet;

/// Highest assignable id.
pub const MAX_ID: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCandidate<'a> {
    pub name: &'a str,
    pub forced: Option<u8>,
}

impl<'a> IdCandidate<'a> {
    pub fn new(name: &'a str, forced: Option<u8>) -> Self {
        Self { name, forced }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("`{first}` and `{second}` both force id {id}")]
    DuplicateForced { id: u8, first: String, second: String },

    #[error("`{name}` forces the reserved id 0")]
    ReservedId { name: String },

    #[error("{count} candidates exceed the {max} available ids", max = MAX_ID)]
    Capacity { count: usize },
}

/// Assign ids to `candidates`; the result is aligned with the input order.
pub fn assign_ids(candidates: &[IdCandidate<'_>]) -> Result<Vec<u8>, IdError> {
    if candidates.len() > usize::from(MAX_ID) {
        return Err(IdError::Capacity {
            count: candidates.len(),
        });
    }

    let mut assigned = vec![0u8; candidates.len()];
    let mut used = BTreeSet::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let Some(id) = candidate.forced else { continue };
        if id == 0 {
            return Err(IdError::ReservedId {
                name: candidate.name.to_string(),
            });
        }
        if !used.insert(id) {
            let first = candidates[..i]
                .iter()
                .find(|c| c.forced == Some(id))
                .map_or_else(String::new, |c| c.name.to_string());
            return Err(IdError::DuplicateForced {
                id,
                first,
                second: candidate.name.to_string(),
            });
        }
        assigned[i] = id;
    }

    let mut unforced: Vec<usize> = (0..candidates.len()).filter(|&i| candidates[i].forced.is_none()).collect();
    unforced.sort_by(|&a, &b| candidates[a].name.cmp(candidates[b].name).then(a.cmp(&b)));

    let mut free = (1..=MAX_ID).filter(|id| !used.contains(id));
    for i in unforced {
        match free.next() {
            Some(id) => assigned[i] = id,
            None => {
                return Err(IdError::Capacity {
                    count: candidates.len(),
                });
            }
        }
    }
    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&'static str]) -> Vec<IdCandidate<'static>> {
        n.iter().map(|&name| IdCandidate::new(name, None)).collect()
    }

    #[test]
    fn test_unforced_ids_follow_name_order() {
        let ids = assign_ids(&names(&["Triangle", "Circle", "Square"])).unwrap();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_forced_id_is_reserved_first() {
        let candidates = vec![
            IdCandidate::new("Circle", None),
            IdCandidate::new("Square", None),
            IdCandidate::new("Triangle", Some(1)),
        ];
        assert_eq!(assign_ids(&candidates).unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn test_leading_newcomer_shifts_unforced_ids() {
        let eight = ["B", "C", "D", "E", "F", "G", "H", "I"];
        assert_eq!(assign_ids(&names(&eight)).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let mut nine = eight.to_vec();
        nine.push("A");
        assert_eq!(assign_ids(&names(&nine)).unwrap(), vec![2, 3, 4, 5, 6, 7, 8, 9, 1]);

        nine.push("J");
        let mut pinned = names(&nine);
        pinned[8].forced = Some(9);
        assert_eq!(assign_ids(&pinned).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_equal_names_fall_back_to_discovery_order() {
        let ids = assign_ids(&names(&["A", "A", "B"])).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_forced_ids() {
        let candidates = vec![IdCandidate::new("A", Some(4)), IdCandidate::new("B", Some(4))];
        assert_eq!(
            assign_ids(&candidates),
            Err(IdError::DuplicateForced {
                id: 4,
                first: "A".into(),
                second: "B".into()
            })
        );
    }

    #[test]
    fn test_reserved_and_capacity() {
        assert!(matches!(
            assign_ids(&[IdCandidate::new("Zero", Some(0))]),
            Err(IdError::ReservedId { .. })
        ));
        let many: Vec<String> = (0..256).map(|i| format!("V{i:03}")).collect();
        let candidates: Vec<_> = many.iter().map(|n| IdCandidate::new(n, None)).collect();
        assert_eq!(assign_ids(&candidates), Err(IdError::Capacity { count: 256 }));
        assert!(assign_ids(&candidates[..255]).is_ok());
    }
}
