#[cfg(feature = "serde")]
use std::fmt;
#[cfg(feature = "serde")]
use std::iter;
#[cfg(feature = "serde")]
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde::de::{Deserialize, MapAccess, SeqAccess, Visitor};

/// Reduce `items` to the first occurrence of every distinct element, keeping
/// their relative order. Equality is `PartialEq`, so this is quadratic.
pub(crate) fn dedupe_in_place<T: PartialEq>(items: &mut Vec<T>) {
    let mut kept = 0;
    for idx in 0..items.len() {
        if !items[..kept].contains(&items[idx]) {
            items.swap(kept, idx);
            kept += 1;
        }
    }
    items.truncate(kept);
}

/// Collect up to `limit` (0 is unlimited) items, optionally skipping any
/// item equal to one already collected.
pub(crate) fn collect_limited<T, I>(iter: I, dedupe: bool, limit: usize) -> Vec<T>
where
    T: PartialEq,
    I: Iterator<Item = T>,
{
    let mut out = Vec::new();
    for item in iter {
        if limit > 0 && out.len() >= limit {
            break;
        }
        if dedupe && out.contains(&item) {
            continue;
        }
        out.push(item);
    }
    out
}

#[cfg(feature = "serde")]
pub(crate) struct MapCollector<T, K, V>(PhantomData<(T, K, V)>);

#[cfg(feature = "serde")]
impl<T, K, V> MapCollector<T, K, V> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, K, V> Visitor<'de> for MapCollector<T, K, V>
where
    T: FromIterator<(K, V)>,
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        iter::from_fn(|| access.next_entry().transpose()).collect()
    }
}

#[cfg(feature = "serde")]
pub(crate) struct SeqCollector<T, E>(PhantomData<(T, E)>);

#[cfg(feature = "serde")]
impl<T, E> SeqCollector<T, E> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, E> Visitor<'de> for SeqCollector<T, E>
where
    T: FromIterator<E>,
    E: Deserialize<'de>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        iter::from_fn(|| access.next_element().transpose()).collect()
    }
}
