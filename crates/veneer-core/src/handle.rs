// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Opaque resource handles and the registry that maps them to records.

use std::collections::HashMap;
use std::fmt;

/// An opaque, non-zero 64-bit reference to a translator resource.
///
/// Handles carry no type information. `Handle::NULL` is the "no resource"
/// value and is accepted everywhere as an unbind or a no-op.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(u64);

impl Handle {
    /// The "no resource" sentinel.
    pub const NULL: Handle = Handle(0);

    /// Rebuilds a handle from its raw value, e.g. after it crossed a host boundary.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value.
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` for [`Handle::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#018x})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// The SplitMix64 finalizer. A bijection on `u64` that maps 0 to 0.
pub(crate) const fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Issues handles and owns the records they refer to.
///
/// Handles are a monotonic counter passed through a keyed bijective mixer, so
/// a value is never issued twice by the same registry and released handles
/// can never alias a later resource.
#[derive(Debug)]
pub struct HandleRegistry<R> {
    key: u64,
    counter: u64,
    records: HashMap<Handle, R>,
}

impl<R> HandleRegistry<R> {
    /// Creates a registry with a random mixing key.
    pub fn new() -> Self {
        Self::with_key(rand::random())
    }

    /// Creates a registry with a fixed mixing key, for reproducible handles.
    pub fn with_key(key: u64) -> Self {
        Self {
            key,
            counter: 0,
            records: HashMap::new(),
        }
    }

    /// Issues a fresh handle. It is never [`Handle::NULL`] and never a value
    /// this registry issued before.
    pub fn allocate(&mut self) -> Handle {
        loop {
            self.counter = self.counter.wrapping_add(1);
            let raw = mix64(self.counter.wrapping_add(self.key));
            if raw != 0 {
                return Handle(raw);
            }
        }
    }

    /// Associates `record` with `handle`, returning any record it replaced.
    ///
    /// Binding to [`Handle::NULL`] is refused and hands the record back.
    pub fn bind(&mut self, handle: Handle, record: R) -> Option<R> {
        if handle.is_null() {
            return Some(record);
        }
        self.records.insert(handle, record)
    }

    /// Allocates a handle and binds `record` to it.
    pub fn insert(&mut self, record: R) -> Handle {
        let handle = self.allocate();
        self.records.insert(handle, record);
        handle
    }

    /// Looks up the record behind a handle.
    pub fn lookup(&self, handle: Handle) -> Option<&R> {
        self.records.get(&handle)
    }

    /// Looks up the record behind a handle for mutation.
    pub fn lookup_mut(&mut self, handle: Handle) -> Option<&mut R> {
        self.records.get_mut(&handle)
    }

    /// Removes and returns the record behind a handle.
    pub fn release(&mut self, handle: Handle) -> Option<R> {
        self.records.remove(&handle)
    }

    /// Returns `true` if the handle currently refers to a record.
    pub fn contains(&self, handle: Handle) -> bool {
        self.records.contains_key(&handle)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record is live.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over live handles and their records.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &R)> {
        self.records.iter().map(|(h, r)| (*h, r))
    }

    /// Removes every record.
    pub fn drain(&mut self) -> Vec<(Handle, R)> {
        self.records.drain().collect()
    }
}

impl<R> Default for HandleRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mix64_keeps_zero_fixed() {
        assert_eq!(mix64(0), 0);
        assert_ne!(mix64(1), 0);
    }

    #[test]
    fn test_allocate_never_repeats() {
        let mut registry: HandleRegistry<()> = HandleRegistry::with_key(0x1234);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let handle = registry.allocate();
            assert!(!handle.is_null());
            assert!(seen.insert(handle), "handle {handle:?} issued twice");
        }
    }

    #[test]
    fn test_allocate_skips_zero() {
        // Key chosen so that the first counter value mixes to zero.
        let mut registry: HandleRegistry<()> = HandleRegistry::with_key(u64::MAX);
        let handle = registry.allocate();
        assert!(!handle.is_null());
    }

    #[test]
    fn test_released_handle_does_not_resolve() {
        let mut registry = HandleRegistry::with_key(7);
        let handle = registry.insert("buffer");
        assert_eq!(registry.lookup(handle), Some(&"buffer"));

        assert_eq!(registry.release(handle), Some("buffer"));
        assert!(registry.lookup(handle).is_none());
        assert!(registry.release(handle).is_none());

        // Later allocations never hand the released value back.
        for _ in 0..1000 {
            let next = registry.insert("other");
            assert_ne!(next, handle);
        }
        assert!(registry.lookup(handle).is_none());
    }

    #[test]
    fn test_bind_null_is_refused() {
        let mut registry = HandleRegistry::with_key(7);
        assert_eq!(registry.bind(Handle::NULL, 5), Some(5));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_look_random() {
        let mut registry: HandleRegistry<()> = HandleRegistry::with_key(99);
        let a = registry.allocate().to_raw();
        let b = registry.allocate().to_raw();
        // Consecutive handles should differ in many bits.
        assert!((a ^ b).count_ones() > 8);
    }

    #[test]
    fn test_handle_debug_format() {
        assert_eq!(
            format!("{:?}", Handle::from_raw(0xab)),
            "Handle(0x00000000000000ab)"
        );
    }
}
