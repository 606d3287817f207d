use core::any::{Any, TypeId};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

use crate::{any::TypeInfo, build_key::BuildKey};

type AnyPolicy = Arc<dyn Any + Send + Sync>;
type PolicySet = HashMap<TypeId, AnyPolicy>;
type NamedPolicySets = HashMap<Option<Arc<str>>, PolicySet>;

/// Policies of type `P` are kept as `Arc<P>`, so `P` may be a trait object
#[inline]
fn erase<P: ?Sized + Send + Sync + 'static>(policy: Arc<P>) -> AnyPolicy {
    Arc::new(policy)
}

#[inline]
fn restore<P: ?Sized + 'static>(policy: &AnyPolicy) -> Option<Arc<P>> {
    policy.downcast_ref::<Arc<P>>().cloned()
}

/// Hierarchical store of build policies keyed by (type, name, policy kind).
///
/// Lookups walk the parent chain, writes are always local.
/// Every container owns one list whose parent is the list of the parent container.
#[derive(Default)]
pub struct PolicyList {
    parent: Option<Arc<PolicyList>>,
    entries: RwLock<HashMap<TypeInfo, NamedPolicySets>>,
    defaults: RwLock<PolicySet>,
}

impl PolicyList {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_parent(parent: Arc<PolicyList>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<PolicyList>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn root(self: &Arc<Self>) -> Arc<PolicyList> {
        let mut list = self;
        while let Some(parent) = &list.parent {
            list = parent;
        }
        list.clone()
    }

    /// Exact key through the chain, then the generic definition key through the chain, then defaults
    #[inline]
    #[must_use]
    pub fn get<P: ?Sized + 'static>(self: &Arc<Self>, key: &BuildKey) -> Option<Arc<P>> {
        self.get_with_list(key).map(|(policy, _)| policy)
    }

    /// Same as [`PolicyList::get`], also returns the list the policy was found in
    #[must_use]
    pub fn get_with_list<P: ?Sized + 'static>(self: &Arc<Self>, key: &BuildKey) -> Option<(Arc<P>, Arc<PolicyList>)> {
        self.get_exact_with_list(key)
            .or_else(|| {
                let definition = key.generic_definition_key()?;
                self.get_exact_with_list(&definition)
            })
            .or_else(|| self.get_default_with_list())
    }

    #[inline]
    #[must_use]
    pub fn get_exact<P: ?Sized + 'static>(self: &Arc<Self>, key: &BuildKey) -> Option<Arc<P>> {
        self.get_exact_with_list(key).map(|(policy, _)| policy)
    }

    /// Exact key only, walking the parent chain
    #[must_use]
    pub fn get_exact_with_list<P: ?Sized + 'static>(self: &Arc<Self>, key: &BuildKey) -> Option<(Arc<P>, Arc<PolicyList>)> {
        let mut list = self;
        loop {
            if let Some(policy) = list.get_local::<P>(key) {
                return Some((policy, list.clone()));
            }
            list = list.parent.as_ref()?;
        }
    }

    /// Exact key in this list only
    #[must_use]
    pub fn get_local<P: ?Sized + 'static>(&self, key: &BuildKey) -> Option<Arc<P>> {
        let entries = self.entries.read();
        let policy = entries.get(key.type_info())?.get(&key.name)?.get(&TypeId::of::<P>())?;
        restore(policy)
    }

    #[inline]
    #[must_use]
    pub fn get_default<P: ?Sized + 'static>(self: &Arc<Self>) -> Option<Arc<P>> {
        self.get_default_with_list().map(|(policy, _)| policy)
    }

    fn get_default_with_list<P: ?Sized + 'static>(self: &Arc<Self>) -> Option<(Arc<P>, Arc<PolicyList>)> {
        let mut list = self;
        loop {
            if let Some(policy) = list.defaults.read().get(&TypeId::of::<P>()).and_then(restore) {
                return Some((policy, list.clone()));
            }
            list = list.parent.as_ref()?;
        }
    }

    pub fn set<P: ?Sized + Send + Sync + 'static>(&self, key: &BuildKey, policy: Arc<P>) {
        self.entries
            .write()
            .entry(key.type_info().clone())
            .or_default()
            .entry(key.name.clone())
            .or_default()
            .insert(TypeId::of::<P>(), erase(policy));
    }

    /// Stores `policy` unless this list already holds one of the same kind for `key`.
    /// Returns the policy that ended up stored.
    pub fn set_if_absent<P: ?Sized + Send + Sync + 'static>(&self, key: &BuildKey, policy: Arc<P>) -> Arc<P> {
        let mut entries = self.entries.write();
        let set = entries
            .entry(key.type_info().clone())
            .or_default()
            .entry(key.name.clone())
            .or_default();

        if let Some(existing) = set.get(&TypeId::of::<P>()).and_then(restore::<P>) {
            return existing;
        }
        set.insert(TypeId::of::<P>(), erase(policy.clone()));
        policy
    }

    pub fn set_default<P: ?Sized + Send + Sync + 'static>(&self, policy: Arc<P>) {
        self.defaults.write().insert(TypeId::of::<P>(), erase(policy));
    }

    /// Removes the local policy of kind `P` for `key`
    pub fn clear<P: ?Sized + 'static>(&self, key: &BuildKey) -> Option<Arc<P>> {
        let mut entries = self.entries.write();
        let named = entries.get_mut(key.type_info())?;
        let set = named.get_mut(&key.name)?;
        let removed = set.remove(&TypeId::of::<P>());

        if set.is_empty() {
            named.remove(&key.name);
            if named.is_empty() {
                entries.remove(key.type_info());
            }
        }
        removed.as_ref().and_then(restore)
    }

    /// Removes local policies of kind `P` whose key matches `predicate`
    pub fn clear_where<P: ?Sized + 'static>(&self, predicate: impl Fn(&BuildKey) -> bool) -> usize {
        let mut entries = self.entries.write();
        let mut removed = 0;

        for (type_info, named) in entries.iter_mut() {
            for (name, set) in named.iter_mut() {
                let key = BuildKey::from_parts(type_info.clone(), name.clone());
                if predicate(&key) && set.remove(&TypeId::of::<P>()).is_some() {
                    removed += 1;
                }
            }
            named.retain(|_, set| !set.is_empty());
        }
        entries.retain(|_, named| !named.is_empty());
        removed
    }

    pub fn clear_default<P: ?Sized + 'static>(&self) -> Option<Arc<P>> {
        self.defaults.write().remove(&TypeId::of::<P>()).as_ref().and_then(restore)
    }

    /// Removes every local policy of `key`
    pub fn clear_key(&self, key: &BuildKey) -> bool {
        let mut entries = self.entries.write();
        let Some(named) = entries.get_mut(key.type_info()) else {
            return false;
        };
        let removed = named.remove(&key.name).is_some();
        if named.is_empty() {
            entries.remove(key.type_info());
        }
        removed
    }

    pub fn clear_all(&self) {
        self.entries.write().clear();
        self.defaults.write().clear();
    }

    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &BuildKey) -> bool {
        self.entries
            .read()
            .get(key.type_info())
            .is_some_and(|named| named.contains_key(&key.name))
    }

    /// Local keys that hold at least one policy
    #[must_use]
    pub fn keys(&self) -> Vec<BuildKey> {
        self.entries
            .read()
            .iter()
            .flat_map(|(type_info, named)| {
                named
                    .keys()
                    .map(move |name| BuildKey::from_parts(type_info.clone(), name.clone()))
            })
            .collect()
    }
}
