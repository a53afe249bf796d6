//! Entity identity across snapshots.
//!
//! Every column, index, constraint and table carries an optional
//! [`PairingId`], minted once by the editing context when the entity is
//! created and echoed unchanged on every later snapshot. Two snapshots of
//! "the same" entity are recognised by equal pairing ids, so a rename is
//! reported as a modification instead of a drop followed by an add.
//!
//! Entities without a usable id (legacy or externally produced data, or
//! ids duplicated inside one snapshot) fall back to name equality. That
//! degrades rename detection to drop + add, which is accepted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a logical entity.
///
/// Deliberately not comparable with `str`: pairing ids and names live in
/// different namespaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingId(String);

impl PairingId {
    /// Wraps an identifier received from the editing context.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An entity that can be paired between two snapshots.
pub trait Paired {
    /// The pairing id, if one was assigned.
    fn pairing_id(&self) -> Option<&PairingId>;

    /// Mutable access used when minting ids.
    fn pairing_id_mut(&mut self) -> &mut Option<PairingId>;

    /// Key used for name-based fallback matching.
    fn fallback_key(&self) -> String;
}

/// One result of [`match_entities`].
#[derive(Debug, PartialEq)]
pub struct EntityPair<'a, T> {
    /// The entity in the "before" snapshot; `None` signals an addition.
    pub before: Option<&'a T>,
    /// The entity in the "after" snapshot; `None` signals a removal.
    pub after: Option<&'a T>,
}

// Manual impls: a derive would require `T: Clone`.
impl<T> Clone for EntityPair<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntityPair<'_, T> {}

/// Data-quality issues found while matching. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityWarning {
    /// The entity carries no pairing id; it was matched by name.
    MissingPairingId {
        /// Fallback key of the entity.
        name: String,
    },
    /// The same pairing id appears more than once within one snapshot;
    /// entities carrying it were matched by name.
    DuplicatePairingId {
        /// The duplicated id.
        id: PairingId,
        /// Which snapshot contained the duplicate.
        side: Side,
    },
}

/// Which of the two snapshots an observation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The snapshot before the edit.
    Before,
    /// The snapshot after the edit.
    After,
}

/// Pairs plus the warnings raised while building them.
#[derive(Debug)]
pub struct Matching<'a, T> {
    /// Pairs in a stable order: every "before" entity in its original
    /// order, then after-only entities in their order.
    pub pairs: Vec<EntityPair<'a, T>>,
    /// Identity problems encountered.
    pub warnings: Vec<IdentityWarning>,
}

fn usable_ids<'a, T: Paired>(
    entities: &'a [T],
    side: Side,
    warnings: &mut Vec<IdentityWarning>,
) -> BTreeMap<&'a PairingId, usize> {
    let mut counts: BTreeMap<&PairingId, usize> = BTreeMap::new();
    for entity in entities {
        match entity.pairing_id() {
            Some(id) => *counts.entry(id).or_default() += 1,
            None => warnings.push(IdentityWarning::MissingPairingId {
                name: entity.fallback_key(),
            }),
        }
    }

    let mut usable = BTreeMap::new();
    for (index, entity) in entities.iter().enumerate() {
        if let Some(id) = entity.pairing_id() {
            if counts[id] == 1 {
                usable.insert(id, index);
            }
        }
    }
    for (id, count) in counts {
        if count > 1 {
            warnings.push(IdentityWarning::DuplicatePairingId {
                id: id.clone(),
                side,
            });
        }
    }
    usable
}

/// Pairs `before` and `after` entities.
///
/// Entities with equal, unique pairing ids are paired. Entities left over
/// are paired by [`Paired::fallback_key`] equality, but only when at
/// least one side of the candidate pair has no usable id: two entities
/// with the same name and different ids stay unrelated.
pub fn match_entities<'a, T: Paired>(before: &'a [T], after: &'a [T]) -> Matching<'a, T> {
    let mut warnings = Vec::new();
    let before_ids = usable_ids(before, Side::Before, &mut warnings);
    let after_ids = usable_ids(after, Side::After, &mut warnings);

    let mut partner: Vec<Option<usize>> = vec![None; before.len()];
    let mut taken = vec![false; after.len()];

    for (id, &b) in &before_ids {
        if let Some(&a) = after_ids.get(id) {
            partner[b] = Some(a);
            taken[a] = true;
        }
    }

    for (b, entity) in before.iter().enumerate() {
        if partner[b].is_some() {
            continue;
        }
        let before_usable = entity
            .pairing_id()
            .is_some_and(|id| before_ids.contains_key(id));
        let key = entity.fallback_key();
        let candidate = after.iter().enumerate().position(|(a, other)| {
            let after_usable = other
                .pairing_id()
                .is_some_and(|id| after_ids.contains_key(id));
            !taken[a] && !(before_usable && after_usable) && other.fallback_key() == key
        });
        if let Some(a) = candidate {
            partner[b] = Some(a);
            taken[a] = true;
        }
    }

    let mut pairs: Vec<EntityPair<'a, T>> = before
        .iter()
        .zip(&partner)
        .map(|(entity, a)| EntityPair {
            before: Some(entity),
            after: a.map(|a| &after[a]),
        })
        .collect();
    pairs.extend(
        after
            .iter()
            .zip(&taken)
            .filter(|(_, taken)| !**taken)
            .map(|(entity, _)| EntityPair {
                before: None,
                after: Some(entity),
            }),
    );

    Matching { pairs, warnings }
}

/// Source of fresh pairing ids, owned by the editing context.
pub trait PairingIdSource {
    /// Returns an id never handed out before.
    fn next_id(&mut self) -> PairingId;
}

/// Random (uuid v4) pairing ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidPairingIds;

impl PairingIdSource for UuidPairingIds {
    fn next_id(&mut self) -> PairingId {
        PairingId::random()
    }
}

/// Deterministic `prefix-1`, `prefix-2`, ... ids.
#[derive(Debug, Clone)]
pub struct SequentialPairingIds {
    prefix: String,
    next: u64,
}

impl SequentialPairingIds {
    /// Creates a sequence starting at 1.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl PairingIdSource for SequentialPairingIds {
    fn next_id(&mut self) -> PairingId {
        let id = PairingId(format!("{}-{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

/// Returns the entity's pairing id, minting one first if it has none.
///
/// Calling it again on the same entity returns the same id.
pub fn assign_pairing_id<E: Paired + ?Sized>(
    entity: &mut E,
    source: &mut impl PairingIdSource,
) -> PairingId {
    entity
        .pairing_id_mut()
        .get_or_insert_with(|| source.next_id())
        .clone()
}

/// Returns `true` if `a` and `b` are the same logical entity: equal
/// pairing ids, or equal names when either side has no id.
pub fn same_entity<T: Paired + ?Sized>(a: &T, b: &T) -> bool {
    match (a.pairing_id(), b.pairing_id()) {
        (Some(x), Some(y)) => x == y,
        _ => a.fallback_key() == b.fallback_key(),
    }
}

/// Finds the counterpart of `entity` among `candidates`.
pub fn counterpart<'a, T: Paired>(candidates: &'a [T], entity: &T) -> Option<&'a T> {
    candidates.iter().find(|c| same_entity(*c, entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Thing {
        name: &'static str,
        id: Option<PairingId>,
    }

    fn thing(name: &'static str, id: Option<&str>) -> Thing {
        Thing {
            name,
            id: id.map(PairingId::new),
        }
    }

    impl Paired for Thing {
        fn pairing_id(&self) -> Option<&PairingId> {
            self.id.as_ref()
        }

        fn pairing_id_mut(&mut self) -> &mut Option<PairingId> {
            &mut self.id
        }

        fn fallback_key(&self) -> String {
            self.name.to_string()
        }
    }

    fn names<'a>(pairs: &[EntityPair<'a, Thing>]) -> Vec<(Option<&'a str>, Option<&'a str>)> {
        pairs
            .iter()
            .map(|p| (p.before.map(|t| t.name), p.after.map(|t| t.name)))
            .collect()
    }

    #[test]
    fn pairs_by_id_across_rename() {
        let before = vec![thing("a", Some("1")), thing("b", Some("2"))];
        let after = vec![thing("b", Some("2")), thing("renamed", Some("1"))];
        let m = match_entities(&before, &after);
        assert!(m.warnings.is_empty());
        assert_eq!(
            names(&m.pairs),
            vec![(Some("a"), Some("renamed")), (Some("b"), Some("b"))]
        );
    }

    #[test]
    fn additions_and_removals() {
        let before = vec![thing("gone", Some("1")), thing("kept", Some("2"))];
        let after = vec![thing("kept", Some("2")), thing("new", Some("3"))];
        let m = match_entities(&before, &after);
        assert_eq!(
            names(&m.pairs),
            vec![
                (Some("gone"), None),
                (Some("kept"), Some("kept")),
                (None, Some("new")),
            ]
        );
    }

    #[test]
    fn same_name_different_ids_are_unrelated() {
        let before = vec![thing("a", Some("1"))];
        let after = vec![thing("a", Some("2"))];
        let m = match_entities(&before, &after);
        assert_eq!(names(&m.pairs), vec![(Some("a"), None), (None, Some("a"))]);
    }

    #[test]
    fn missing_ids_fall_back_to_names() {
        let before = vec![thing("a", None), thing("b", None)];
        let after = vec![thing("b", None), thing("c", None)];
        let m = match_entities(&before, &after);
        assert_eq!(
            names(&m.pairs),
            vec![(Some("a"), None), (Some("b"), Some("b")), (None, Some("c"))]
        );
        assert_eq!(m.warnings.len(), 4);
    }

    #[test]
    fn duplicate_ids_are_reported_and_matched_by_name() {
        let before = vec![thing("a", Some("1")), thing("b", Some("1"))];
        let after = vec![thing("a", Some("1")), thing("b", Some("1"))];
        let m = match_entities(&before, &after);
        assert_eq!(
            names(&m.pairs),
            vec![(Some("a"), Some("a")), (Some("b"), Some("b"))]
        );
        assert!(m.warnings.contains(&IdentityWarning::DuplicatePairingId {
            id: PairingId::new("1"),
            side: Side::Before,
        }));
    }

    #[test]
    fn assign_is_idempotent() {
        let mut source = SequentialPairingIds::new("col");
        let mut t = thing("a", None);
        let first = assign_pairing_id(&mut t, &mut source);
        let second = assign_pairing_id(&mut t, &mut source);
        assert_eq!(first, PairingId::new("col-1"));
        assert_eq!(first, second);
    }

    #[test]
    fn counterpart_prefers_ids_over_names() {
        let before = vec![thing("a", Some("1")), thing("b", Some("2")), thing("c", None)];
        assert_eq!(counterpart(&before, &thing("renamed", Some("2"))), Some(&before[1]));
        assert_eq!(counterpart(&before, &thing("a", Some("9"))), None);
        assert_eq!(counterpart(&before, &thing("c", Some("3"))), Some(&before[2]));
    }

    #[test]
    fn uuid_ids_are_distinct() {
        let mut source = UuidPairingIds;
        assert_ne!(source.next_id(), source.next_id());
    }
}
