//! Resource pools and the ledgers that expose them to processors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named quantity with a capacity. Amount stays within `0..=capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub name: String,
    pub amount: f64,
    pub capacity: f64,
}

impl ResourcePool {
    pub fn new(name: impl Into<String>, amount: f64, capacity: f64) -> Self {
        let capacity = capacity.max(0.0);
        Self {
            name: name.into(),
            amount: amount.clamp(0.0, capacity),
            capacity,
        }
    }

    /// Remove up to `amount`; returns what was actually taken.
    pub fn withdraw(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        if amount <= self.amount {
            self.amount -= amount;
            amount
        } else {
            let taken = self.amount;
            self.amount = 0.0;
            taken
        }
    }

    /// Add up to the free space; returns what was actually stored.
    pub fn deposit(&mut self, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let room = (self.capacity - self.amount).max(0.0);
        let stored = amount.min(room);
        self.amount = (self.amount + stored).min(self.capacity);
        stored
    }

    /// Fill level as a fraction of capacity (0 when capacity is 0).
    pub fn fraction(&self) -> f64 {
        if self.capacity > 0.0 {
            (self.amount / self.capacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.amount <= 0.0
    }
}

/// Read/write access to a vessel's named resources.
pub trait ResourceLedger {
    fn has_resource(&self, name: &str) -> bool;
    fn available(&self, name: &str) -> f64;
    fn capacity(&self, name: &str) -> f64;
    /// Remove up to `amount`, never going below zero. Returns the amount taken.
    fn withdraw(&mut self, name: &str, amount: f64) -> f64;
    /// Add up to the free capacity. Returns the amount stored.
    fn deposit(&mut self, name: &str, amount: f64) -> f64;
    /// One aggregated pool per resource, in name order.
    fn totals(&self) -> Vec<ResourcePool>;
}

/// Pools of a vessel that is live in the host: one pool per resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LivePools {
    pub pools: BTreeMap<String, ResourcePool>,
}

impl LivePools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pool: ResourcePool) {
        self.pools.insert(pool.name.clone(), pool);
    }

    pub fn pool(&self, name: &str) -> Option<&ResourcePool> {
        self.pools.get(name)
    }

    pub fn pool_mut(&mut self, name: &str) -> Option<&mut ResourcePool> {
        self.pools.get_mut(name)
    }
}

impl ResourceLedger for LivePools {
    fn has_resource(&self, name: &str) -> bool {
        self.pools.contains_key(name)
    }

    fn available(&self, name: &str) -> f64 {
        self.pools.get(name).map(|p| p.amount).unwrap_or(0.0)
    }

    fn capacity(&self, name: &str) -> f64 {
        self.pools.get(name).map(|p| p.capacity).unwrap_or(0.0)
    }

    fn withdraw(&mut self, name: &str, amount: f64) -> f64 {
        self.pools
            .get_mut(name)
            .map(|p| p.withdraw(amount))
            .unwrap_or(0.0)
    }

    fn deposit(&mut self, name: &str, amount: f64) -> f64 {
        self.pools
            .get_mut(name)
            .map(|p| p.deposit(amount))
            .unwrap_or(0.0)
    }

    fn totals(&self) -> Vec<ResourcePool> {
        self.pools.values().cloned().collect()
    }
}

/// Stored resources of one part in a frozen snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartSnapshot {
    pub name: String,
    pub resources: Vec<ResourcePool>,
}

/// Pools of a vessel that is not active in the host, kept as per-part
/// sub-pools. Withdrawals and deposits walk the parts in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPools {
    pub parts: Vec<PartSnapshot>,
}

impl SnapshotPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_part(&mut self, part: PartSnapshot) {
        self.parts.push(part);
    }

    fn sub_pools<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ResourcePool> + 'a {
        self.parts
            .iter()
            .flat_map(|part| part.resources.iter())
            .filter(move |pool| pool.name == name)
    }

    fn sub_pools_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut ResourcePool> + 'a {
        self.parts
            .iter_mut()
            .flat_map(|part| part.resources.iter_mut())
            .filter(move |pool| pool.name == name)
    }
}

impl ResourceLedger for SnapshotPools {
    fn has_resource(&self, name: &str) -> bool {
        self.sub_pools(name).next().is_some()
    }

    fn available(&self, name: &str) -> f64 {
        self.sub_pools(name).map(|p| p.amount).sum()
    }

    fn capacity(&self, name: &str) -> f64 {
        self.sub_pools(name).map(|p| p.capacity).sum()
    }

    fn withdraw(&mut self, name: &str, amount: f64) -> f64 {
        let mut remaining = amount.max(0.0);
        let mut taken = 0.0;
        for pool in self.sub_pools_mut(name) {
            if remaining <= 0.0 {
                break;
            }
            let got = pool.withdraw(remaining);
            remaining -= got;
            taken += got;
        }
        taken
    }

    fn deposit(&mut self, name: &str, amount: f64) -> f64 {
        let mut remaining = amount.max(0.0);
        let mut stored = 0.0;
        for pool in self.sub_pools_mut(name) {
            if remaining <= 0.0 {
                break;
            }
            let put = pool.deposit(remaining);
            remaining -= put;
            stored += put;
        }
        stored
    }

    fn totals(&self) -> Vec<ResourcePool> {
        let mut totals: BTreeMap<String, ResourcePool> = BTreeMap::new();
        for pool in self.parts.iter().flat_map(|p| p.resources.iter()) {
            let entry = totals
                .entry(pool.name.clone())
                .or_insert_with(|| ResourcePool::new(pool.name.clone(), 0.0, 0.0));
            entry.amount += pool.amount;
            entry.capacity += pool.capacity;
        }
        totals.into_values().collect()
    }
}

/// A vessel's ledger: live pools or a frozen part snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VesselLedger {
    Live(LivePools),
    Snapshot(SnapshotPools),
}

impl Default for VesselLedger {
    fn default() -> Self {
        VesselLedger::Live(LivePools::default())
    }
}

impl VesselLedger {
    pub fn is_live(&self) -> bool {
        matches!(self, VesselLedger::Live(_))
    }

    fn inner(&self) -> &dyn ResourceLedger {
        match self {
            VesselLedger::Live(pools) => pools,
            VesselLedger::Snapshot(pools) => pools,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ResourceLedger {
        match self {
            VesselLedger::Live(pools) => pools,
            VesselLedger::Snapshot(pools) => pools,
        }
    }
}

impl ResourceLedger for VesselLedger {
    fn has_resource(&self, name: &str) -> bool {
        self.inner().has_resource(name)
    }

    fn available(&self, name: &str) -> f64 {
        self.inner().available(name)
    }

    fn capacity(&self, name: &str) -> f64 {
        self.inner().capacity(name)
    }

    fn withdraw(&mut self, name: &str, amount: f64) -> f64 {
        self.inner_mut().withdraw(name, amount)
    }

    fn deposit(&mut self, name: &str, amount: f64) -> f64 {
        self.inner_mut().deposit(name, amount)
    }

    fn totals(&self) -> Vec<ResourcePool> {
        self.inner().totals()
    }
}
