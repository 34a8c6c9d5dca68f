//! Shard registry: the single owner of every shard.
//!
//! The registry holds each shard's descriptor and store behind one per-shard
//! lock, routes fresh inserts through the active [`PlacementStrategy`], runs
//! scatter-gather searches and moves vectors between shards for rebalance and
//! drain.
//!
//! # Locking
//!
//! ```text
//! placement (Mutex)      fresh inserts and strategy switches
//! maintenance (Mutex)    one rebalance or drain at a time
//! topology (RwLock)      shard membership; write only for add/remove
//!   └─ slot.state (RwLock) per shard, always acquired in registration order
//! ```
//!
//! Locks are taken top to bottom and per-shard locks in registration order,
//! so multi-shard operations cannot deadlock. Readers that span shards (`get`,
//! `search`, `snapshot`) hold read guards on every shard they visit at once,
//! and transfers hold write guards on both ends, so a vector in transit is
//! never observable as missing or duplicated.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{ShardError, ShardResult};
use crate::shard::placement::{PlacementCandidate, PlacementStrategy, StrategyKind};
use crate::shard::snapshot::{RegistrySnapshot, ShardSnapshot, SnapshotRecord};
use crate::shard::store::{ShardStore, StoredRecord};
use crate::shard::{MigrationReport, ShardDescriptor, ShardId, ShardStats, ShardStatus};
use crate::vector::{SearchHit, VectorRecord, compare_hits};

/// Descriptor and store of one shard, guarded together.
#[derive(Debug)]
struct ShardState {
    descriptor: ShardDescriptor,
    store: ShardStore,
}

impl ShardState {
    fn new(mut descriptor: ShardDescriptor) -> Self {
        descriptor.current_size = 0;
        let store = ShardStore::new(descriptor.id.clone(), descriptor.capacity);
        Self { descriptor, store }
    }

    fn accepts_fresh(&self) -> bool {
        self.descriptor.is_active() && self.descriptor.has_room()
    }

    /// `current_size` must track the store exactly.
    fn check(&self) -> ShardResult<()> {
        if self.descriptor.current_size != self.store.len() {
            return Err(ShardError::InvariantViolation {
                reason: format!(
                    "shard '{}' reports {} vectors but its store holds {}",
                    self.descriptor.id,
                    self.descriptor.current_size,
                    self.store.len()
                ),
            });
        }
        if !self.descriptor.is_unlimited() && self.store.len() > self.descriptor.capacity {
            return Err(ShardError::InvariantViolation {
                reason: format!(
                    "shard '{}' holds {} vectors, above its capacity of {}",
                    self.descriptor.id,
                    self.store.len(),
                    self.descriptor.capacity
                ),
            });
        }
        self.store.check_consistency()
    }

    fn add(&mut self, stored: StoredRecord) -> ShardResult<()> {
        let fresh = !self.store.contains(&stored.record.id);
        self.store.insert_stored(stored)?;
        if fresh {
            self.descriptor.current_size += 1;
        }
        self.check()
    }

    fn take(&mut self, id: &str) -> ShardResult<Option<StoredRecord>> {
        let taken = self.store.take(id);
        if taken.is_some() {
            self.descriptor.current_size = self.descriptor.current_size.saturating_sub(1);
        }
        self.check()?;
        Ok(taken)
    }
}

#[derive(Debug)]
struct ShardSlot {
    state: RwLock<ShardState>,
}

/// Shards in registration order.
#[derive(Debug, Default)]
struct Topology {
    slots: Vec<ShardSlot>,
}

impl Topology {
    fn position(&self, id: &ShardId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| &slot.state.read().descriptor.id == id)
    }

    fn read_all(&self) -> Vec<RwLockReadGuard<'_, ShardState>> {
        self.slots.iter().map(|slot| slot.state.read()).collect()
    }

    fn write_all(&self) -> Vec<RwLockWriteGuard<'_, ShardState>> {
        self.slots.iter().map(|slot| slot.state.write()).collect()
    }

    /// Write guards on two distinct shards, acquired in registration order.
    fn write_pair(
        &self,
        a: usize,
        b: usize,
    ) -> (RwLockWriteGuard<'_, ShardState>, RwLockWriteGuard<'_, ShardState>) {
        debug_assert_ne!(a, b);
        if a < b {
            let first = self.slots[a].state.write();
            let second = self.slots[b].state.write();
            (first, second)
        } else {
            let second = self.slots[b].state.write();
            let first = self.slots[a].state.write();
            (first, second)
        }
    }
}

/// Moves one record from `src` to `dst`.
///
/// The destination receives the record before the source gives it up, so a
/// failure part way leaves a duplicate at worst, never a loss. Both guards are
/// held by the caller, so readers see neither state. Returns `false` if the
/// record is absent or the destination has no room.
fn transfer(src: &mut ShardState, dst: &mut ShardState, id: &str) -> ShardResult<bool> {
    if !dst.descriptor.has_room() {
        return Ok(false);
    }
    let Some(stored) = src.store.get_stored(id).cloned() else {
        return Ok(false);
    };

    dst.add(stored)?;
    src.take(id)?;

    debug!(
        "Moved vector '{}' from shard '{}' to '{}'",
        id, src.descriptor.id, dst.descriptor.id
    );
    Ok(true)
}

/// Owner of all shards and entry point for every engine operation.
#[derive(Debug)]
pub struct ShardRegistry {
    topology: RwLock<Topology>,
    placement: Mutex<PlacementStrategy>,
    maintenance: Mutex<()>,
    next_sequence: AtomicU64,
}

impl Default for ShardRegistry {
    fn default() -> Self {
        Self::new(StrategyKind::default())
    }
}

impl ShardRegistry {
    /// Creates an empty registry using the given placement strategy.
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            topology: RwLock::new(Topology::default()),
            placement: Mutex::new(PlacementStrategy::new(strategy)),
            maintenance: Mutex::new(()),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Creates a registry with the configured strategy and bootstrap shards.
    pub fn from_settings(settings: &Settings) -> ShardResult<Self> {
        let registry = Self::new(settings.placement.strategy);
        for shard in &settings.shards {
            registry.add_shard(shard.to_descriptor())?;
        }
        Ok(registry)
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Registers a new, empty shard.
    ///
    /// Any `current_size` on the descriptor is ignored; the shard starts empty.
    pub fn add_shard(&self, descriptor: ShardDescriptor) -> ShardResult<()> {
        let mut topology = self.topology.write();
        if topology.position(&descriptor.id).is_some() {
            warn!("Refusing to register duplicate shard '{}'", descriptor.id);
            return Err(ShardError::DuplicateShardId { id: descriptor.id });
        }

        info!(
            "Registered shard '{}' ({}) with capacity {}",
            descriptor.id,
            descriptor.name,
            if descriptor.is_unlimited() {
                "unlimited".to_string()
            } else {
                descriptor.capacity.to_string()
            }
        );
        topology.slots.push(ShardSlot {
            state: RwLock::new(ShardState::new(descriptor)),
        });
        Ok(())
    }

    /// Removes an empty shard.
    ///
    /// Returns `false` and changes nothing if the shard still holds vectors
    /// or is not registered.
    pub fn remove_shard(&self, id: &ShardId) -> bool {
        let mut topology = self.topology.write();
        let Some(pos) = topology.position(id) else {
            return false;
        };

        let size = topology.slots[pos].state.read().descriptor.current_size;
        if size > 0 {
            warn!("Refusing to remove shard '{id}': it still holds {size} vectors");
            return false;
        }

        topology.slots.remove(pos);
        info!("Removed shard '{id}'");
        true
    }

    /// Looks up a shard descriptor.
    pub fn get_shard(&self, id: &ShardId) -> Option<ShardDescriptor> {
        let topology = self.topology.read();
        topology
            .slots
            .iter()
            .map(|slot| slot.state.read())
            .find(|state| &state.descriptor.id == id)
            .map(|state| state.descriptor.clone())
    }

    /// All shards in registration order.
    pub fn get_shards(&self) -> Vec<ShardDescriptor> {
        let topology = self.topology.read();
        topology
            .read_all()
            .iter()
            .map(|state| state.descriptor.clone())
            .collect()
    }

    /// Shards currently accepting traffic, in registration order.
    pub fn get_active_shards(&self) -> Vec<ShardDescriptor> {
        self.get_shards()
            .into_iter()
            .filter(ShardDescriptor::is_active)
            .collect()
    }

    /// Load report for every shard.
    pub fn get_shard_stats(&self) -> Vec<ShardStats> {
        self.get_shards().iter().map(ShardStats::from).collect()
    }

    /// Marks a shard active or offline. Vectors stay where they are.
    pub fn set_shard_status(&self, id: &ShardId, status: ShardStatus) -> ShardResult<()> {
        let topology = self.topology.read();
        let pos = topology
            .position(id)
            .ok_or_else(|| ShardError::ShardNotFound { id: id.clone() })?;

        let mut state = topology.slots[pos].state.write();
        if state.descriptor.status != status {
            info!("Shard '{id}' is now {status}");
            state.descriptor.status = status;
        }
        Ok(())
    }

    /// Number of vectors across all shards.
    pub fn total_vectors(&self) -> usize {
        let topology = self.topology.read();
        topology
            .read_all()
            .iter()
            .map(|state| state.descriptor.current_size)
            .sum()
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    /// Switches the placement policy for future inserts.
    ///
    /// Existing vectors stay where they are. Switching resets the
    /// round-robin cursor.
    pub fn set_strategy(&self, kind: StrategyKind) {
        let mut placement = self.placement.lock();
        info!("Placement strategy switched from {} to {kind}", placement.kind());
        *placement = PlacementStrategy::new(kind);
    }

    pub fn strategy(&self) -> StrategyKind {
        self.placement.lock().kind()
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Stores a record and returns the shard that took it.
    ///
    /// Returns `Ok(None)` when no active shard has room. If the id is already
    /// stored, the record is replaced in the shard holding it.
    pub fn insert(&self, record: VectorRecord) -> ShardResult<Option<ShardId>> {
        let mut placement = self.placement.lock();
        let topology = self.topology.read();

        // Update in place if the id already lives somewhere. A concurrent
        // transfer may move it between lookup and lock, hence the loop.
        while let Some(pos) = Self::locate_in(&topology, &record.id) {
            let mut state = topology.slots[pos].state.write();
            if state.store.contains(&record.id) {
                let sequence = state
                    .store
                    .get_stored(&record.id)
                    .map_or(0, |stored| stored.sequence);
                state.add(StoredRecord { record, sequence })?;
                debug!("Updated vector in shard '{}'", state.descriptor.id);
                return Ok(Some(state.descriptor.id.clone()));
            }
        }

        let mut rejected = vec![false; topology.slots.len()];
        loop {
            let candidates: Vec<PlacementCandidate> = topology
                .slots
                .iter()
                .zip(&rejected)
                .map(|(slot, &skip)| {
                    let state = slot.state.read();
                    PlacementCandidate {
                        active: state.descriptor.is_active(),
                        has_room: !skip && state.descriptor.has_room(),
                    }
                })
                .collect();

            let Some(pos) = placement.select(&record.id, &candidates) else {
                warn!("No shard can accept vector '{}': all shards full or offline", record.id);
                return Ok(None);
            };

            // Capacity may have changed since the candidates were read
            let mut state = topology.slots[pos].state.write();
            if !state.accepts_fresh() {
                rejected[pos] = true;
                continue;
            }

            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Placed vector '{}' on shard '{}' via {}",
                record.id,
                state.descriptor.id,
                placement.kind()
            );
            state.add(StoredRecord { record, sequence })?;
            return Ok(Some(state.descriptor.id.clone()));
        }
    }

    /// Fetches a record by id from whichever shard holds it.
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        let topology = self.topology.read();
        let guards = topology.read_all();
        guards
            .iter()
            .find_map(|state| state.store.get(id).cloned())
    }

    /// Shard currently holding `id`.
    pub fn locate(&self, id: &str) -> Option<ShardId> {
        let topology = self.topology.read();
        Self::locate_in(&topology, id)
            .map(|pos| topology.slots[pos].state.read().descriptor.id.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    /// Deletes a record. Returns `false` if no shard holds it.
    pub fn remove(&self, id: &str) -> ShardResult<bool> {
        let topology = self.topology.read();
        while let Some(pos) = Self::locate_in(&topology, id) {
            let mut state = topology.slots[pos].state.write();
            if state.take(id)?.is_some() {
                debug!("Removed vector '{id}' from shard '{}'", state.descriptor.id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn locate_in(topology: &Topology, id: &str) -> Option<usize> {
        let guards = topology.read_all();
        guards.iter().position(|state| state.store.contains(id))
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Scatter-gather nearest-neighbor search across active shards.
    ///
    /// Every active shard scores its vectors in parallel; the per-shard
    /// results are merged by score descending, ties going to the earliest
    /// insert, and truncated to `limit`. Offline shards are skipped.
    pub fn search(&self, query: &[f32], limit: usize, min_score: f32) -> Vec<SearchHit> {
        if limit == 0 {
            return Vec::new();
        }

        let topology = self.topology.read();
        let guards: Vec<_> = topology
            .read_all()
            .into_iter()
            .filter(|state| state.descriptor.is_active())
            .collect();

        let mut hits: Vec<SearchHit> = guards
            .par_iter()
            .flat_map_iter(|state| {
                let mut local = state.store.score_all(query, min_score);
                local.sort_by(compare_hits);
                local.truncate(limit);
                local
            })
            .collect();

        hits.sort_by(compare_hits);
        hits.truncate(limit);
        debug!(
            "Search over {} active shards returned {} hits",
            guards.len(),
            hits.len()
        );
        hits
    }

    // ------------------------------------------------------------------
    // Rebalance / drain
    // ------------------------------------------------------------------

    /// Evens out vector counts across active shards.
    ///
    /// Repeatedly moves the oldest vector from the fullest active shard to the
    /// emptiest active shard with room, until counts differ by at most one or
    /// no move would help. Total count is unchanged.
    pub fn rebalance(&self) -> ShardResult<MigrationReport> {
        let _maintenance = self.maintenance.lock();
        let topology = self.topology.read();
        let mut report = MigrationReport::default();

        loop {
            let loads: Vec<(usize, usize, bool)> = topology
                .slots
                .iter()
                .enumerate()
                .filter_map(|(pos, slot)| {
                    let state = slot.state.read();
                    state.descriptor.is_active().then(|| {
                        (pos, state.descriptor.current_size, state.descriptor.has_room())
                    })
                })
                .collect();

            let Some(&(src, src_size, _)) = loads.iter().max_by_key(|(pos, size, _)| {
                (*size, std::cmp::Reverse(*pos))
            }) else {
                break;
            };
            let Some(&(dst, dst_size, _)) = loads
                .iter()
                .filter(|(pos, _, has_room)| *pos != src && *has_room)
                .min_by_key(|(pos, size, _)| (*size, *pos))
            else {
                break;
            };
            if src_size <= dst_size + 1 {
                break;
            }

            let (mut source, mut target) = topology.write_pair(src, dst);
            // Concurrent inserts may have shifted the picture
            if !source.descriptor.is_active()
                || !target.descriptor.is_active()
                || source.descriptor.current_size <= target.descriptor.current_size + 1
            {
                continue;
            }
            let Some(id) = source.store.oldest_id().map(str::to_string) else {
                break;
            };
            if !transfer(&mut source, &mut target, &id)? {
                break;
            }
            report.moved += 1;
        }

        info!("Rebalance moved {} vectors", report.moved);
        Ok(report)
    }

    /// Moves every vector off `id` onto the other active shards.
    ///
    /// All-or-nothing: if the other active shards cannot absorb the shard's
    /// vectors, fails with [`ShardError::NoCapacity`] and moves nothing. The
    /// drained shard keeps its status; remove it or mark it offline afterwards.
    pub fn drain_shard(&self, id: &ShardId) -> ShardResult<MigrationReport> {
        let _maintenance = self.maintenance.lock();
        let topology = self.topology.read();
        let pos = topology
            .position(id)
            .ok_or_else(|| ShardError::ShardNotFound { id: id.clone() })?;

        let mut guards = topology.write_all();
        let mut source = guards.remove(pos);
        let mut targets: Vec<_> = guards
            .into_iter()
            .filter(|state| state.descriptor.is_active())
            .collect();

        let required = source.store.len();
        if required == 0 {
            return Ok(MigrationReport::default());
        }

        let available = targets
            .iter()
            .map(|state| state.descriptor.free_slots().unwrap_or(usize::MAX))
            .fold(0usize, usize::saturating_add);
        if available < required {
            warn!(
                "Cannot drain shard '{id}': {required} vectors, {available} free slots on active shards"
            );
            return Err(ShardError::NoCapacity {
                shard: id.clone(),
                required,
                available,
            });
        }

        let ids: Vec<String> = source.store.ids().map(str::to_string).collect();
        let mut report = MigrationReport::default();
        for vector_id in ids {
            let target = targets
                .iter_mut()
                .filter(|state| state.descriptor.has_room())
                .min_by_key(|state| state.descriptor.current_size)
                .ok_or_else(|| ShardError::InvariantViolation {
                    reason: format!("drain of shard '{id}' ran out of room after capacity check"),
                })?;
            if !transfer(&mut source, target, &vector_id)? {
                return Err(ShardError::InvariantViolation {
                    reason: format!("vector '{vector_id}' vanished from shard '{id}' during drain"),
                });
            }
            report.moved += 1;
        }

        info!("Drained {} vectors from shard '{id}'", report.moved);
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Consistency / snapshots
    // ------------------------------------------------------------------

    /// Checks size bookkeeping, capacity bounds and id uniqueness.
    pub fn verify_invariants(&self) -> ShardResult<()> {
        let topology = self.topology.read();
        let guards = topology.read_all();
        let mut owners: HashMap<&str, &ShardId> = HashMap::new();

        for state in &guards {
            state.check()?;
            for vector_id in state.store.ids() {
                if let Some(other) = owners.insert(vector_id, &state.descriptor.id) {
                    return Err(ShardError::InvariantViolation {
                        reason: format!(
                            "vector '{vector_id}' is held by both '{other}' and '{}'",
                            state.descriptor.id
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Consistent copy of every shard and record.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let strategy = self.strategy();
        let topology = self.topology.read();
        let guards = topology.read_all();

        let shards = guards
            .iter()
            .map(|state| ShardSnapshot {
                descriptor: state.descriptor.clone(),
                records: state
                    .store
                    .stored_records()
                    .map(|stored| SnapshotRecord {
                        sequence: stored.sequence,
                        record: stored.record.clone(),
                    })
                    .collect(),
            })
            .collect();

        RegistrySnapshot::new(strategy, self.next_sequence.load(Ordering::Relaxed), shards)
    }

    /// Rebuilds a registry from a snapshot.
    ///
    /// Fails if the snapshot would violate a registry invariant: duplicate
    /// shard ids, a vector in two shards, a shard over capacity or a size
    /// that does not match its records.
    pub fn restore(snapshot: RegistrySnapshot) -> ShardResult<Self> {
        let registry = Self::new(snapshot.strategy);
        let mut next_sequence = snapshot.next_sequence.max(1);

        for shard in snapshot.shards {
            let declared = shard.descriptor.current_size;
            let shard_id = shard.descriptor.id.clone();
            let mut state = ShardState::new(shard.descriptor);

            for entry in shard.records {
                let after = entry.sequence.checked_add(1).ok_or_else(|| {
                    ShardError::InvariantViolation {
                        reason: format!(
                            "snapshot sequence {} for vector '{}' in shard '{shard_id}' is out of range",
                            entry.sequence, entry.record.id
                        ),
                    }
                })?;
                next_sequence = next_sequence.max(after);
                if state.store.contains(&entry.record.id) {
                    return Err(ShardError::InvariantViolation {
                        reason: format!(
                            "snapshot lists vector '{}' twice in shard '{shard_id}'",
                            entry.record.id
                        ),
                    });
                }
                state.add(StoredRecord {
                    record: entry.record,
                    sequence: entry.sequence,
                })?;
            }
            if declared != state.descriptor.current_size {
                return Err(ShardError::InvariantViolation {
                    reason: format!(
                        "snapshot declares {declared} vectors for shard '{shard_id}' but lists {}",
                        state.descriptor.current_size
                    ),
                });
            }

            let mut topology = registry.topology.write();
            if topology.position(&shard_id).is_some() {
                return Err(ShardError::DuplicateShardId { id: shard_id });
            }
            topology.slots.push(ShardSlot {
                state: RwLock::new(state),
            });
        }

        registry
            .next_sequence
            .store(next_sequence, Ordering::Relaxed);
        registry.verify_invariants()?;
        info!(
            "Restored {} shards holding {} vectors",
            registry.get_shards().len(),
            registry.total_vectors()
        );
        Ok(registry)
    }
}
