use std::collections::HashMap;

use domain::coords::{Rectangle, TileCoord};
use domain::record::ProjectRecord;

/// Seconds of tile-update history kept on a project.
const TILE_UPDATE_RETENTION: i64 = 86_400;

/// A monitored project: its persistent record plus the in-memory tile-update
/// bookkeeping maintained between diffs.
#[derive(Debug, Clone)]
pub struct Project {
    pub record: ProjectRecord,
    tile_last_update: HashMap<TileCoord, i64>,
    tile_updates_24h: Vec<(TileCoord, i64)>,
}

impl Project {
    #[must_use]
    pub fn new(record: ProjectRecord) -> Self {
        Self {
            record,
            tile_last_update: HashMap::new(),
            tile_updates_24h: Vec::new(),
        }
    }

    #[must_use]
    pub fn rect(&self) -> Rectangle {
        self.record.rectangle()
    }

    /// Records a tile update if it is newer than what we already know for
    /// that tile.
    pub fn record_tile_update(&mut self, tile: TileCoord, timestamp: i64) {
        let known = self.tile_last_update.get(&tile).copied().unwrap_or(0);
        if timestamp <= known {
            return;
        }
        self.tile_last_update.insert(tile, timestamp);
        if !self.tile_updates_24h.contains(&(tile, timestamp)) {
            self.tile_updates_24h.push((tile, timestamp));
        }
    }

    /// Drops 24-hour list entries older than `last_check - 24h`.
    pub fn prune_old_tile_updates(&mut self) {
        let cutoff = self.record.last_check - TILE_UPDATE_RETENTION;
        self.tile_updates_24h
            .retain(|(_, timestamp)| *timestamp >= cutoff);
    }

    #[must_use]
    pub fn last_update_for(&self, tile: TileCoord) -> Option<i64> {
        self.tile_last_update.get(&tile).copied()
    }

    #[must_use]
    pub fn recent_tile_updates(&self) -> &[(TileCoord, i64)] {
        &self.tile_updates_24h
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::Project;
    use domain::coords::{Point, Rectangle, Size, TileCoord};
    use domain::record::ProjectRecord;

    const NOW: i64 = 1_700_000_000;

    fn project() -> Project {
        let rect = Rectangle::from_point_size(Point::new(0, 0), Size::new(10, 10));
        Project::new(ProjectRecord::from_rect(1, "p", rect, NOW))
    }

    #[test]
    fn tile_updates_only_move_forward() {
        let mut project = project();
        let tile = TileCoord::new(0, 0);
        project.record_tile_update(tile, 100);
        project.record_tile_update(tile, 50);
        assert_eq!(project.last_update_for(tile), Some(100));
        assert_eq!(project.recent_tile_updates().len(), 1);

        project.record_tile_update(tile, 150);
        assert_eq!(project.last_update_for(tile), Some(150));
        assert_eq!(project.recent_tile_updates().len(), 2);
    }

    #[test]
    fn prune_drops_entries_past_the_window() {
        let mut project = project();
        let tile = TileCoord::new(0, 0);
        project.record.last_check = NOW;
        project.record_tile_update(tile, NOW - 90_000);
        project.record_tile_update(tile, NOW - 100);
        project.prune_old_tile_updates();
        assert_eq!(project.recent_tile_updates(), &[(tile, NOW - 100)]);
        // The per-tile map keeps the newest value regardless.
        assert_eq!(project.last_update_for(tile), Some(NOW - 100));
    }
}
