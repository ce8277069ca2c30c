//! Temperature-based tile queues with Zipf-distributed sizes.
//!
//! Tiles that have never been polled sit in the burning queue; every other
//! tile lives in exactly one temperature queue, ranked by upstream
//! modification time (hottest first). Selection is round-robin across
//! queues, taking the least-recently-checked tile within a queue.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use domain::coords::TileCoord;
use domain::record::TileRecord;

use super::zipf::zipf_queue_sizes;

#[derive(Debug, Clone, Copy)]
struct TileMeta {
    last_checked: i64,
    last_update: i64,
}

impl TileMeta {
    fn is_burning(&self) -> bool {
        self.last_checked == 0
    }
}

/// In-memory queue state over the tiles of all Active projects. Rebuilt at
/// startup from the persistent `tile` rows; the cursor survives rebuilds so
/// no queue gets starved.
pub struct TileQueueSystem {
    min_hottest_size: usize,
    metas: HashMap<TileCoord, TileMeta>,
    /// Oldest `first_seen` among the projects overlapping each tile; burning
    /// tiles from established projects are polled before newer ones.
    project_first_seen: HashMap<TileCoord, i64>,
    burning: Vec<TileCoord>,
    /// Temperature queues, hottest first.
    temperature: Vec<Vec<TileCoord>>,
    cursor: usize,
}

impl TileQueueSystem {
    #[must_use]
    pub fn new(
        min_hottest_size: usize,
        records: &[TileRecord],
        project_first_seen: HashMap<TileCoord, i64>,
    ) -> Self {
        let metas = records
            .iter()
            .map(|record| {
                (
                    record.tile,
                    TileMeta {
                        last_checked: record.last_checked,
                        last_update: record.last_update,
                    },
                )
            })
            .collect();

        let mut system = Self {
            min_hottest_size,
            metas,
            project_first_seen,
            burning: Vec::new(),
            temperature: Vec::new(),
            cursor: 0,
        };
        system.rebuild();
        system
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    #[must_use]
    pub fn burning_len(&self) -> usize {
        self.burning.len()
    }

    /// Current temperature queue sizes, hottest first.
    #[must_use]
    pub fn queue_sizes(&self) -> Vec<usize> {
        self.temperature.iter().map(Vec::len).collect()
    }

    /// Advisory heat level for persistence: 999 for burning tiles, otherwise
    /// the temperature level (hottest queue has the highest level, coldest
    /// has 0).
    #[must_use]
    pub fn heat(&self, tile: TileCoord) -> u16 {
        if self.burning.contains(&tile) {
            return TileRecord::BURNING_HEAT;
        }
        let levels = self.temperature.len();
        self.temperature
            .iter()
            .position(|queue| queue.contains(&tile))
            .map_or(TileRecord::BURNING_HEAT, |index| {
                (levels - 1 - index) as u16
            })
    }

    fn queue_count(&self) -> usize {
        1 + self.temperature.len()
    }

    fn last_update_of(&self, tile: TileCoord) -> i64 {
        self.metas.get(&tile).map_or(0, |meta| meta.last_update)
    }

    fn rebuild(&mut self) {
        self.burning.clear();
        self.temperature.clear();

        let mut temp_tiles: Vec<TileCoord> = Vec::new();
        for (tile, meta) in &self.metas {
            if meta.is_burning() {
                self.burning.push(*tile);
            } else {
                temp_tiles.push(*tile);
            }
        }
        self.burning.sort_unstable_by_key(TileCoord::id);

        if temp_tiles.is_empty() {
            debug!("No temperature tiles, only burning queue");
            if self.cursor >= self.queue_count() {
                self.cursor = 0;
            }
            return;
        }

        // Most recently modified first; tile id breaks ties deterministically.
        temp_tiles.sort_unstable_by_key(|tile| (Reverse(self.last_update_of(*tile)), tile.id()));

        let sizes = zipf_queue_sizes(temp_tiles.len(), self.min_hottest_size);
        info!(
            "Queue distribution (Zipf): {:?} for {} tiles",
            sizes,
            temp_tiles.len()
        );

        let mut remaining = temp_tiles.into_iter();
        for size in sizes {
            self.temperature.push(remaining.by_ref().take(size).collect());
        }

        // Keep the round-robin position across rebuilds to avoid starvation.
        if self.cursor >= self.queue_count() {
            self.cursor %= self.queue_count();
        }
    }

    /// Picks the tile to poll this cycle, advancing the round-robin cursor.
    pub fn select_next_tile(&mut self) -> Option<TileCoord> {
        if self.metas.is_empty() {
            return None;
        }

        let queue_count = self.queue_count();
        for _ in 0..queue_count {
            let index = self.cursor;
            self.cursor = (self.cursor + 1) % queue_count;

            let selected = if index == 0 {
                self.select_burning()
            } else {
                self.select_temperature(index - 1)
            };
            if let Some(tile) = selected {
                let queue = if index == 0 {
                    "burning queue".to_string()
                } else {
                    format!("temp={} queue", self.temperature.len() - index)
                };
                debug!("Examining tile {tile} from {queue}");
                return Some(tile);
            }
        }

        warn!("All queues empty but tile metadata is not - rebuilding");
        self.rebuild();
        None
    }

    fn select_burning(&self) -> Option<TileCoord> {
        // Tiles of the longest-established project first, so a new large
        // project cannot starve older ones of their bootstrap polls.
        self.burning.iter().copied().min_by_key(|tile| {
            (
                self.project_first_seen
                    .get(tile)
                    .copied()
                    .unwrap_or(i64::MAX),
                tile.id(),
            )
        })
    }

    fn select_temperature(&self, index: usize) -> Option<TileCoord> {
        let queue = self.temperature.get(index)?;
        queue.iter().copied().min_by_key(|tile| {
            (
                self.metas.get(tile).map_or(0, |meta| meta.last_checked),
                tile.id(),
            )
        })
    }

    /// Rewinds the round-robin cursor so the same queue is retried next
    /// cycle. Call after a transient fetch failure.
    pub fn retry_current_queue(&mut self) {
        let queue_count = self.queue_count();
        self.cursor = (self.cursor + queue_count - 1) % queue_count;
    }

    /// Applies the result of a successful poll: records the check time, the
    /// (monotonic) upstream modification time, and moves the tile to its
    /// new queue. `modified_time` of 0 means unknown.
    pub fn update_after_check(&mut self, tile: TileCoord, now: i64, modified_time: i64) {
        let Some(meta) = self.metas.get_mut(&tile) else {
            warn!("Tile {tile} not in queue metadata");
            return;
        };

        let was_burning = meta.is_burning();
        let old_last_update = meta.last_update;

        meta.last_checked = now;
        if modified_time > 0 {
            // Upstream modification times only move forward.
            meta.last_update = old_last_update.max(modified_time);
        }
        let new_last_update = meta.last_update;

        if was_burning {
            // Graduation changes the temperature tile count, so the Zipf
            // split has to be recomputed.
            self.rebuild();
        } else if modified_time > 0 && new_last_update != old_last_update {
            self.reposition(tile);
        }
    }

    /// Surgically moves a tile to the queue matching its new rank, keeping
    /// every queue at its exact size by cascading displaced tiles coldward.
    fn reposition(&mut self, tile: TileCoord) {
        if self.temperature.is_empty() {
            return;
        }

        let Some(old_index) = self
            .temperature
            .iter()
            .position(|queue| queue.contains(&tile))
        else {
            warn!("Tile {tile} not found in any temperature queue during reposition");
            return;
        };

        let mut ranked: Vec<TileCoord> = self
            .metas
            .iter()
            .filter(|(_, meta)| !meta.is_burning())
            .map(|(tile, _)| *tile)
            .collect();
        ranked.sort_unstable_by_key(|tile| (Reverse(self.last_update_of(*tile)), tile.id()));
        let Some(position) = ranked.iter().position(|candidate| *candidate == tile) else {
            return;
        };

        let sizes = self.queue_sizes();
        let mut cumulative = 0;
        let mut target_index = self.temperature.len() - 1;
        for (index, size) in sizes.iter().enumerate() {
            if position < cumulative + size {
                target_index = index;
                break;
            }
            cumulative += size;
        }

        if target_index == old_index {
            return;
        }
        // Modification times are monotonic, so a colder move is impossible.
        assert!(
            target_index < old_index,
            "tile {tile} moving to a colder queue"
        );

        if let Some(queue) = self.temperature.get_mut(old_index) {
            queue.retain(|candidate| *candidate != tile);
        }

        // Push the tile into its target queue and bump each queue's coldest
        // tile one queue colder, so every size stays unchanged.
        let mut carried = tile;
        let mut cascade_complete = true;
        for index in target_index..old_index {
            let coldest = {
                let Some(queue) = self.temperature.get_mut(index) else {
                    return;
                };
                if queue.is_empty() {
                    queue.push(carried);
                    cascade_complete = false;
                    break;
                }
                let coldest_position = Self::coldest_position(&self.metas, queue);
                let coldest = queue.swap_remove(coldest_position);
                queue.push(carried);
                coldest
            };
            carried = coldest;
        }
        if cascade_complete {
            if let Some(queue) = self.temperature.get_mut(old_index) {
                queue.push(carried);
            }
        }
    }

    // Mirror of the rank order: among equal modification times the larger
    // tile id ranks colder.
    fn coldest_position(metas: &HashMap<TileCoord, TileMeta>, queue: &[TileCoord]) -> usize {
        queue
            .iter()
            .enumerate()
            .min_by_key(|(_, tile)| {
                (
                    metas.get(tile).map_or(0, |meta| meta.last_update),
                    Reverse(tile.id()),
                )
            })
            .map_or(0, |(position, _)| position)
    }

    /// Registers new tiles (typically from a new project) as burning.
    pub fn add_tiles(&mut self, tiles: &BTreeSet<TileCoord>, first_seen: i64) {
        let mut changed = false;
        for tile in tiles {
            if !self.metas.contains_key(tile) {
                self.metas.insert(
                    *tile,
                    TileMeta {
                        last_checked: 0,
                        last_update: 0,
                    },
                );
                changed = true;
            }
            let entry = self.project_first_seen.entry(*tile).or_insert(first_seen);
            *entry = (*entry).min(first_seen);
        }
        if changed {
            self.rebuild();
        }
    }

    /// Drops tiles no longer referenced by any project.
    pub fn remove_tiles(&mut self, tiles: &BTreeSet<TileCoord>) {
        let mut changed = false;
        for tile in tiles {
            if self.metas.remove(tile).is_some() {
                changed = true;
            }
            self.project_first_seen.remove(tile);
        }
        if changed {
            self.rebuild();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::TileQueueSystem;
    use domain::coords::TileCoord;
    use domain::record::TileRecord;
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashMap};

    const NOW: i64 = 1_700_000_000;

    fn burning_record(x: u16, y: u16) -> TileRecord {
        TileRecord::new_burning(TileCoord::new(x, y))
    }

    fn checked_record(x: u16, y: u16, last_update: i64) -> TileRecord {
        TileRecord {
            tile: TileCoord::new(x, y),
            heat: 0,
            last_checked: last_update,
            last_update,
            etag: String::new(),
        }
    }

    /// Thirty checked tiles with last_update 1000, 2000, ..., 30000.
    fn thirty_tiles() -> Vec<TileRecord> {
        (0..30u16)
            .map(|i| checked_record(i, 0, i64::from(i + 1) * 1000))
            .collect()
    }

    fn membership(system: &TileQueueSystem, tile: TileCoord) -> Vec<usize> {
        let mut found = Vec::new();
        if system.burning.contains(&tile) {
            found.push(usize::MAX);
        }
        for (index, queue) in system.temperature.iter().enumerate() {
            if queue.contains(&tile) {
                found.push(index);
            }
        }
        found
    }

    #[test]
    fn empty_system_selects_nothing() {
        let mut system = TileQueueSystem::new(4, &[], HashMap::new());
        assert!(system.select_next_tile().is_none());
        assert!(system.is_empty());
    }

    #[test]
    fn burning_tiles_graduate_round_robin() {
        let records = [
            burning_record(0, 0),
            burning_record(1, 0),
            burning_record(2, 0),
        ];
        let mut system = TileQueueSystem::new(4, &records, HashMap::new());
        assert_eq!(system.burning_len(), 3);

        // While only the burning queue exists the cursor stays on it; once
        // tiles graduate, the round robin alternates with the temperature
        // queue. Six calls drain the burning queue completely.
        let mut selected = Vec::new();
        for step in 0..6 {
            let tile = system.select_next_tile().unwrap();
            selected.push(tile);
            system.update_after_check(tile, NOW + step, 500 + step);
        }

        assert_eq!(system.burning_len(), 0);
        assert_eq!(system.queue_sizes().iter().sum::<usize>(), 3);
        for record in &records {
            assert!(selected.contains(&record.tile));
        }
        // The first two picks come straight from the burning queue.
        assert_eq!(selected[0], TileCoord::new(0, 0));
        assert_eq!(selected[1], TileCoord::new(1, 0));
    }

    #[test]
    fn burning_queue_prefers_oldest_project() {
        let a = TileCoord::new(0, 0);
        let b = TileCoord::new(1, 0);
        let c = TileCoord::new(2, 0);
        let records = [
            burning_record(0, 0),
            burning_record(1, 0),
            burning_record(2, 0),
        ];
        let first_seen = HashMap::from([(a, 100), (b, 50), (c, 75)]);
        let mut system = TileQueueSystem::new(4, &records, first_seen);

        // Interleaved with temperature-queue picks, the burning queue is
        // drained in order of the owning projects' first_seen.
        let mut burning_order = Vec::new();
        for step in 0..6 {
            let tile = system.select_next_tile().unwrap();
            if system.heat(tile) == TileRecord::BURNING_HEAT {
                burning_order.push(tile);
            }
            system.update_after_check(tile, NOW + step, 0);
        }
        assert_eq!(burning_order, vec![b, c, a]);
    }

    #[test]
    fn burning_without_projects_sorts_last() {
        let known = TileCoord::new(5, 5);
        let orphan = TileCoord::new(0, 0);
        let records = [burning_record(5, 5), burning_record(0, 0)];
        let first_seen = HashMap::from([(known, 10)]);
        let mut system = TileQueueSystem::new(4, &records, first_seen);
        assert_eq!(system.select_next_tile().unwrap(), known);
        system.update_after_check(known, NOW, 0);
        assert_eq!(system.select_next_tile().unwrap(), orphan);
    }

    #[test]
    fn temperature_selection_takes_least_recently_checked() {
        let mut records = vec![
            checked_record(0, 0, 5000),
            checked_record(1, 0, 4000),
            checked_record(2, 0, 3000),
        ];
        records[0].last_checked = 300;
        records[1].last_checked = 100;
        records[2].last_checked = 200;
        let mut system = TileQueueSystem::new(4, &records, HashMap::new());
        // Single temperature queue (3 <= 4); oldest check first.
        assert_eq!(system.select_next_tile().unwrap(), TileCoord::new(1, 0));
    }

    #[test]
    fn retry_rewinds_to_the_same_queue() {
        let records = [
            burning_record(0, 0),
            checked_record(1, 0, 1000),
            checked_record(2, 0, 2000),
        ];
        let mut system = TileQueueSystem::new(4, &records, HashMap::new());

        let first = system.select_next_tile().unwrap();
        system.retry_current_queue();
        let second = system.select_next_tile().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn thirty_tiles_get_three_queues() {
        let system = TileQueueSystem::new(4, &thirty_tiles(), HashMap::new());
        assert_eq!(system.queue_sizes(), vec![5, 8, 17]);
        assert_eq!(system.burning_len(), 0);
    }

    #[test]
    fn reposition_cascades_hotward() {
        let mut system = TileQueueSystem::new(4, &thirty_tiles(), HashMap::new());
        assert_eq!(system.queue_sizes(), vec![5, 8, 17]);

        // Hottest five are last_update 30000..26000; queue 1 bottoms out at
        // 18000; the coldest tile of all is 1000.
        let coldest = TileCoord::new(0, 0);
        let hottest_queue_coldest = TileCoord::new(25, 0); // last_update 26000
        let middle_queue_coldest = TileCoord::new(17, 0); // last_update 18000
        assert_eq!(membership(&system, coldest), vec![2]);
        assert_eq!(membership(&system, hottest_queue_coldest), vec![0]);
        assert_eq!(membership(&system, middle_queue_coldest), vec![1]);

        system.update_after_check(coldest, NOW, 35_000);

        assert_eq!(system.queue_sizes(), vec![5, 8, 17]);
        assert_eq!(membership(&system, coldest), vec![0]);
        assert_eq!(membership(&system, hottest_queue_coldest), vec![1]);
        assert_eq!(membership(&system, middle_queue_coldest), vec![2]);

        // Every tile is still in exactly one queue.
        for record in thirty_tiles() {
            assert_eq!(membership(&system, record.tile).len(), 1);
        }
    }

    #[test]
    fn reposition_within_same_queue_is_noop() {
        let mut system = TileQueueSystem::new(4, &thirty_tiles(), HashMap::new());
        let hottest = TileCoord::new(29, 0); // last_update 30000
        system.update_after_check(hottest, NOW, 40_000);
        assert_eq!(system.queue_sizes(), vec![5, 8, 17]);
        assert_eq!(membership(&system, hottest), vec![0]);
    }

    #[test]
    fn heat_levels_are_hottest_highest() {
        let system = TileQueueSystem::new(
            4,
            &[burning_record(9, 9), checked_record(0, 0, 1000)],
            HashMap::new(),
        );
        assert_eq!(system.heat(TileCoord::new(9, 9)), TileRecord::BURNING_HEAT);
        assert_eq!(system.heat(TileCoord::new(0, 0)), 0);

        let system30 = TileQueueSystem::new(4, &thirty_tiles(), HashMap::new());
        assert_eq!(system30.heat(TileCoord::new(29, 0)), 2);
        assert_eq!(system30.heat(TileCoord::new(0, 0)), 0);
    }

    #[test]
    fn add_and_remove_tiles_rebuild() {
        let mut system = TileQueueSystem::new(4, &thirty_tiles(), HashMap::new());
        let new_tiles: BTreeSet<TileCoord> =
            [TileCoord::new(100, 100), TileCoord::new(101, 100)].into();
        system.add_tiles(&new_tiles, NOW);
        assert_eq!(system.len(), 32);
        assert_eq!(system.burning_len(), 2);

        system.remove_tiles(&new_tiles);
        assert_eq!(system.len(), 30);
        assert_eq!(system.burning_len(), 0);

        // Removing everything leaves a selectable-nothing system.
        let all: BTreeSet<TileCoord> = thirty_tiles().iter().map(|record| record.tile).collect();
        system.remove_tiles(&all);
        assert!(system.select_next_tile().is_none());
    }

    #[test]
    fn update_for_unknown_tile_is_ignored() {
        let mut system = TileQueueSystem::new(4, &thirty_tiles(), HashMap::new());
        system.update_after_check(TileCoord::new(200, 200), NOW, 99_999);
        assert_eq!(system.len(), 30);
        assert_eq!(system.queue_sizes(), vec![5, 8, 17]);
    }

    #[test]
    fn single_tile_cursor_wraps() {
        let mut system = TileQueueSystem::new(4, &[checked_record(3, 3, 100)], HashMap::new());
        for _ in 0..5 {
            assert_eq!(system.select_next_tile().unwrap(), TileCoord::new(3, 3));
        }
    }

    proptest! {
        #[test]
        fn updates_keep_tiles_in_exactly_one_queue(
            seeds in proptest::collection::vec((0u16..40, 0i64..100_000), 1..60),
            bumps in proptest::collection::vec((0usize..60, 1i64..50_000), 0..30),
        ) {
            let records: Vec<TileRecord> = seeds
                .iter()
                .enumerate()
                .map(|(index, (x, last_update))| {
                    let tile = TileCoord::new(*x, index as u16);
                    if *last_update == 0 {
                        TileRecord::new_burning(tile)
                    } else {
                        TileRecord {
                            tile,
                            heat: 0,
                            last_checked: *last_update,
                            last_update: *last_update,
                            etag: String::new(),
                        }
                    }
                })
                .collect();
            let tiles: Vec<TileCoord> = records.iter().map(|record| record.tile).collect();
            let mut system = TileQueueSystem::new(4, &records, HashMap::new());

            for (pick, delta) in bumps {
                let tile = tiles[pick % tiles.len()];
                let old_queue = membership(&system, tile);
                let new_update = system.last_update_of(tile) + delta;
                system.update_after_check(tile, NOW, new_update);
                let new_queue = membership(&system, tile);
                prop_assert_eq!(new_queue.len(), 1);
                // A bumped non-burning tile never moves colder.
                if old_queue != vec![usize::MAX] {
                    prop_assert!(new_queue[0] <= old_queue[0]);
                }
            }

            let queue_total: usize =
                system.queue_sizes().iter().sum::<usize>() + system.burning_len();
            prop_assert_eq!(queue_total, system.len());
            for tile in &tiles {
                prop_assert_eq!(membership(&system, *tile).len(), 1);
            }
        }
    }
}
