//! Thread-local pools of scratch collections.
//!
//! Traversals that need a temporary `Vec`/`HashSet` rent one with [`rent`]. The returned guard derefs to
//! the collection and, when dropped on any exit path, clears it and hands it back to the calling thread's
//! pool, so a rayon worker reuses the same allocations across declarations.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

/// Pooled buffers kept per type and thread.
const MAX_POOLED: usize = 8;

/// A collection that can be pooled: it must come back empty.
pub trait Scratch: Default + 'static {
    fn reset(&mut self);
}

impl<T: 'static> Scratch for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T: 'static> Scratch for VecDeque<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T: Eq + Hash + 'static> Scratch for HashSet<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<K: Eq + Hash + 'static, V: 'static> Scratch for HashMap<K, V> {
    fn reset(&mut self) {
        self.clear();
    }
}

thread_local! {
    static POOL: RefCell<HashMap<TypeId, Vec<Box<dyn Any>>>> = RefCell::new(HashMap::new());
}

/// RAII guard over a rented collection.
pub struct Rented<T: Scratch> {
    value: T,
}

impl<T: Scratch> Deref for Rented<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Scratch> DerefMut for Rented<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Scratch> Drop for Rented<T> {
    fn drop(&mut self) {
        let mut value = std::mem::take(&mut self.value);
        value.reset();
        // The pool may already be gone during thread teardown; the buffer is simply dropped then.
        let _ = POOL.try_with(|pool| {
            let mut pool = pool.borrow_mut();
            let slot = pool.entry(TypeId::of::<T>()).or_default();
            if slot.len() < MAX_POOLED {
                slot.push(Box::new(value));
            }
        });
    }
}

/// Rent an empty `T` from the current thread's pool.
pub fn rent<T: Scratch>() -> Rented<T> {
    let pooled = POOL
        .try_with(|pool| pool.borrow_mut().get_mut(&TypeId::of::<T>()).and_then(Vec::pop))
        .ok()
        .flatten();
    let value = match pooled.map(|boxed| boxed.downcast::<T>()) {
        Some(Ok(boxed)) => *boxed,
        _ => T::default(),
    };
    Rented { value }
}

#[cfg(test)]
fn pooled_count<T: Scratch>() -> usize {
    POOL.with(|pool| pool.borrow().get(&TypeId::of::<T>()).map_or(0, Vec::len))
}
