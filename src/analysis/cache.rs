//! Fingerprints and the incremental cache gate.
//!
//! A pass is split into two phases per work unit: a cheap [`Fingerprint`] over everything the unit's
//! result reads, and an expensive materialize step. [`CacheGate`] serves a stored value whenever the
//! fingerprint is unchanged, so the materialize closure never runs for unchanged inputs and the output
//! is reused byte for byte.
//!
//! ## Notes
//! - Probing is `&self` and safe to do from many worker threads; only [`CacheGate::commit`] mutates.
//! - A cancelled pass never reaches `commit`, so the gate keeps the previous pass's entries intact.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::io;

use derivgen_syntax::parser::parse_statement;
use derivgen_syntax::{Stmt, TypeSyntax, visit};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use xxhash_rust::xxh3::Xxh3;

use super::{Cancelled, check_cancelled};
use crate::host::{SymbolKey, SymbolOracle, TypeDecl, TypeRef};

/// 128-bit content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u128);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Adapts the streaming hasher to `io::Write` so values serialize straight into it.
struct HashWriter(Xxh3);

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Incrementally hashes tagged, serializable parts.
pub struct FingerprintBuilder {
    writer: HashWriter,
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self {
            writer: HashWriter(Xxh3::new()),
        }
    }

    /// Hash `value` under `tag`. Tags keep adjacent parts from running into each other.
    pub fn add<T: Serialize + ?Sized>(&mut self, tag: &str, value: &T) -> &mut Self {
        self.writer.0.update(tag.as_bytes());
        self.writer.0.update(&[0]);
        serde_json::to_writer(&mut self.writer, value)
            .expect("INVARIANT: fingerprinted values serialize to JSON with string keys");
        self.writer.0.update(&[0xff]);
        self
    }

    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.writer.0.digest128())
    }
}

impl Fingerprint {
    /// Hash a single serializable value.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Fingerprint {
        FingerprintBuilder::new().add("value", value).finish()
    }

    /// Hash the declarations in the dependency closure of `roots`, plus `extras` (settings and any
    /// cross-declaration data the result reads).
    pub fn of_declarations<E: Serialize + ?Sized>(
        oracle: &dyn SymbolOracle,
        roots: &[SymbolKey],
        extras: &E,
        cancel: &CancellationToken,
    ) -> Result<Fingerprint, Cancelled> {
        let closure = dependency_closure(oracle, roots, cancel)?;
        let mut builder = FingerprintBuilder::new();
        for key in &closure {
            builder.add("key", &key.to_string());
            match oracle.declaration(key) {
                Some(decl) => builder.add("decl", decl),
                None => builder.add("missing", &()),
            };
        }
        builder.add("extras", extras);
        Ok(builder.finish())
    }
}

/// Every declaration the result for `roots` can read: supertypes, member types, containing types, types
/// mentioned in method bodies, and (when bodies exist) the declarations contributing extension methods.
/// Sorted, so the closure is independent of discovery order.
pub fn dependency_closure(
    oracle: &dyn SymbolOracle,
    roots: &[SymbolKey],
    cancel: &CancellationToken,
) -> Result<Vec<SymbolKey>, Cancelled> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();
    let mut has_bodies = false;

    for root in roots {
        queue.push_back(root.clone());
        let Some(decl) = oracle.declaration(root) else { continue };
        for method in &decl.methods {
            for statement in &method.body {
                has_bodies = true;
                for mentioned in body_mentions(statement.text()) {
                    enqueue_type(oracle, root, &mentioned, &mut queue);
                }
            }
        }
    }
    if has_bodies {
        for decl in oracle.declarations() {
            if decl.methods.iter().any(|m| m.is_extension) {
                queue.push_back(SymbolKey::of_decl(decl));
            }
        }
    }

    while let Some(key) = queue.pop_front() {
        check_cancelled(cancel)?;
        if !seen.insert(key.clone()) {
            continue;
        }
        let Some(decl) = oracle.declaration(&key) else { continue };
        if let Some(containing) = &decl.containing {
            enqueue_type(oracle, &key, &TypeSyntax::named(containing.clone()), &mut queue);
        }
        for ty in referenced_types(decl) {
            enqueue_type(oracle, &key, ty, &mut queue);
        }
    }
    Ok(seen.into_iter().collect())
}

fn referenced_types(decl: &TypeDecl) -> impl Iterator<Item = &TypeRef> {
    decl.base
        .iter()
        .chain(decl.interfaces.iter())
        .chain(decl.fields.iter().map(|f| &f.ty))
        .chain(decl.properties.iter().map(|p| &p.ty))
        .chain(decl.methods.iter().flat_map(|m| std::iter::once(&m.returns).chain(m.params.iter().map(|p| &p.ty))))
}

fn enqueue_type(oracle: &dyn SymbolOracle, context: &SymbolKey, ty: &TypeSyntax, queue: &mut VecDeque<SymbolKey>) {
    let Some(resolved) = oracle.resolve_type(context, ty) else {
        return;
    };
    let mut stack = vec![resolved];
    while let Some(t) = stack.pop() {
        if oracle.declaration(&SymbolKey::of(&t)).is_some() {
            queue.push_back(SymbolKey::of(&t));
        }
        stack.extend(t.args);
    }
}

/// Type names a body statement can bind to: written types plus every identifier (a bare identifier may
/// name a type used as a qualifier).
fn body_mentions(text: &str) -> Vec<TypeSyntax> {
    let Ok(stmt) = parse_statement(text) else {
        return Vec::new();
    };
    let expr = match &stmt.node {
        Stmt::Assign { value, .. } => value,
        Stmt::Expr(expr) => expr,
    };
    let mut out = Vec::new();
    visit::for_each_type(expr, &mut |t| out.push(t.clone()));
    visit::for_each_name(expr, &mut |n| out.push(TypeSyntax::named(n.ident())));
    out
}

/// Hit/miss counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Entries dropped because their declaration vanished or their fingerprint changed.
    pub swept: usize,
}

/// A unit's result for this pass, tagged with whether it came from the cache.
#[derive(Debug, Clone)]
pub struct Computed<K, V> {
    pub key: K,
    pub fingerprint: Fingerprint,
    pub value: V,
    pub hit: bool,
}

/// Fingerprint-keyed memoization across passes.
#[derive(Debug)]
pub struct CacheGate<K, V> {
    entries: BTreeMap<K, (Fingerprint, V)>,
    last: CacheStats,
}

impl<K: Ord, V> Default for CacheGate<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            last: CacheStats::default(),
        }
    }
}

impl<K: Ord + Clone + fmt::Debug, V: Clone> CacheGate<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored value for `key`, if it was produced from the same fingerprint.
    pub fn probe(&self, key: &K, fingerprint: Fingerprint) -> Option<&V> {
        match self.entries.get(key) {
            Some((stored, value)) if *stored == fingerprint => Some(value),
            _ => None,
        }
    }

    /// Serve `key` from the cache or run `materialize`. Nothing is stored until [`commit`](Self::commit).
    pub fn get_or_materialize<E>(
        &self,
        key: K,
        fingerprint: Fingerprint,
        materialize: impl FnOnce() -> Result<V, E>,
    ) -> Result<Computed<K, V>, E> {
        if let Some(value) = self.probe(&key, fingerprint) {
            tracing::debug!(?key, %fingerprint, "cache hit");
            return Ok(Computed {
                key,
                fingerprint,
                value: value.clone(),
                hit: true,
            });
        }
        tracing::debug!(?key, %fingerprint, "cache miss");
        let value = materialize()?;
        Ok(Computed {
            key,
            fingerprint,
            value,
            hit: false,
        })
    }

    /// Replace the stored entries with this pass's results. Entries not produced this pass are swept.
    pub fn commit(&mut self, computed: impl IntoIterator<Item = Computed<K, V>>) -> CacheStats {
        let mut stats = CacheStats::default();
        let mut next = BTreeMap::new();
        for c in computed {
            if c.hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
            next.insert(c.key, (c.fingerprint, c.value));
        }
        stats.swept = self
            .entries
            .iter()
            .filter(|(key, (fp, _))| next.get(*key).is_none_or(|(new_fp, _)| new_fp != fp))
            .count();
        self.entries = next;
        self.last = stats;
        stats
    }

    /// Counters from the most recent commit.
    pub fn last_stats(&self) -> CacheStats {
        self.last
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModelHost;
    use std::cell::Cell;

    fn host(enemy_field: &str) -> ModelHost {
        ModelHost::from_json(&format!(
            r#"{{ "types": [
                {{ "name": "Game.Stats", "kind": "struct", "fields": [{{ "name": "Hp", "type": "{enemy_field}" }}] }},
                {{ "name": "Game.Enemy", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "fields": [{{ "name": "Stats", "type": "Stats" }}] }},
                {{ "name": "Game.Unrelated", "kind": "class" }}
            ] }}"#
        ))
        .unwrap()
    }

    fn fp(host: &ModelHost, root: &str) -> Fingerprint {
        Fingerprint::of_declarations(host, &[SymbolKey::new(root, 0)], &(), &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_fingerprint_follows_member_types() {
        assert_eq!(fp(&host("int"), "Game.Enemy"), fp(&host("int"), "Game.Enemy"));
        assert_ne!(fp(&host("int"), "Game.Enemy"), fp(&host("float"), "Game.Enemy"));
        assert_eq!(fp(&host("int"), "Game.Unrelated"), fp(&host("float"), "Game.Unrelated"));
    }

    #[test]
    fn test_closure_includes_base_chain() {
        let host = host("int");
        let closure = dependency_closure(&host, &[SymbolKey::new("Game.Enemy", 0)], &CancellationToken::new()).unwrap();
        let names: Vec<_> = closure.iter().map(|k| k.name.as_str()).collect();
        assert!(names.contains(&"Game.Stats"));
        assert!(names.contains(&"UnityEngine.MonoBehaviour"));
        assert!(names.contains(&"UnityEngine.Object"));
        assert!(!names.contains(&"Game.Unrelated"));
    }

    #[test]
    fn test_cancelled_closure() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let host = host("int");
        assert_eq!(
            dependency_closure(&host, &[SymbolKey::new("Game.Enemy", 0)], &cancel),
            Err(Cancelled)
        );
    }

    #[test]
    fn test_gate_reuses_value_without_materializing() {
        let mut gate: CacheGate<String, String> = CacheGate::new();
        let first = gate
            .get_or_materialize::<()>("A".into(), Fingerprint(1), || Ok("generated".into()))
            .unwrap();
        assert!(!first.hit);
        assert_eq!(gate.commit([first]), CacheStats { hits: 0, misses: 1, swept: 0 });

        let calls = Cell::new(0);
        let second = gate
            .get_or_materialize::<()>("A".into(), Fingerprint(1), || {
                calls.set(calls.get() + 1);
                Ok("other".into())
            })
            .unwrap();
        assert!(second.hit);
        assert_eq!(second.value, "generated");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_commit_sweeps_stale_and_vanished_entries() {
        let mut gate: CacheGate<&'static str, u32> = CacheGate::new();
        gate.commit([
            Computed { key: "A", fingerprint: Fingerprint(1), value: 1, hit: false },
            Computed { key: "B", fingerprint: Fingerprint(2), value: 2, hit: false },
        ]);
        let stats = gate.commit([Computed { key: "A", fingerprint: Fingerprint(9), value: 3, hit: false }]);
        assert_eq!(stats, CacheStats { hits: 0, misses: 1, swept: 2 });
        assert_eq!(gate.len(), 1);
        assert!(gate.probe(&"A", Fingerprint(1)).is_none());
        assert_eq!(gate.probe(&"A", Fingerprint(9)), Some(&3));
    }
}
