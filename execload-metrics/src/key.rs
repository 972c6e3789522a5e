use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Interned string id used for metric names, tag keys and tag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

impl From<u32> for KeyId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<KeyId> for u32 {
    fn from(v: KeyId) -> Self {
        v.0
    }
}

#[derive(Default, Debug)]
pub struct Interner {
    map: RwLock<HashMap<Arc<str>, u32>>,
    vec: RwLock<Vec<Arc<str>>>,
}

impl Interner {
    pub fn get_or_intern(&self, s: &str) -> KeyId {
        {
            let map = self.map.read();
            if let Some(&id) = map.get(s) {
                return KeyId(id);
            }
        }

        let mut map = self.map.write();
        let mut vec = self.vec.write();

        // Another writer may have won the race between the read and write locks.
        if let Some(&id) = map.get(s) {
            return KeyId(id);
        }

        let id = vec.len() as u32;
        let s: Arc<str> = Arc::from(s);
        vec.push(s.clone());
        map.insert(s, id);

        KeyId(id)
    }

    pub fn resolve(&self, id: KeyId) -> Option<Arc<str>> {
        let vec = self.vec.read();
        vec.get(id.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.vec.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_resolvable() {
        let interner = Interner::default();
        let a = interner.get_or_intern("sessionId");
        let b = interner.get_or_intern("status");
        let a_again = interner.get_or_intern("sessionId");

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.resolve(b).as_deref(), Some("status"));
        assert_eq!(interner.resolve(KeyId::from(99)), None);
    }
}
