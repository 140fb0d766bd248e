//! Breadth-first pursuit pathing.

use crate::grid::GridQuery;
use delve_common::TileCoord;
use pathfinding::prelude::bfs;
use std::collections::VecDeque;
use tracing::trace;

/// Finds a shortest 4-connected walkable path from `start` to `goal`.
///
/// The returned path excludes `start` and ends on `goal`. `start` itself is
/// not required to be walkable, since an agent may be knocked onto an odd
/// tile, but every step of the path is. Returns `None` when the goal cannot
/// be reached; `start == goal` yields an empty path.
pub fn find_path<G: GridQuery + ?Sized>(
    grid: &G,
    start: TileCoord,
    goal: TileCoord,
) -> Option<Vec<TileCoord>> {
    let result = bfs(
        &start,
        |tile| {
            tile.cardinal_neighbors()
                .into_iter()
                .filter(move |next| grid.is_walkable(*next))
        },
        |tile| *tile == goal,
    );

    match result {
        Some(mut path) => {
            path.remove(0);
            Some(path)
        },
        None => {
            trace!("No path from {} to {}", start, goal);
            None
        },
    }
}

/// Cached pursuit path.
///
/// A fresh search only happens when the cache is empty or the goal moved.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    steps: VecDeque<TileCoord>,
    goal: Option<TileCoord>,
}

impl PathCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a new search is needed to reach `goal`.
    #[must_use]
    pub fn needs_recompute(&self, goal: TileCoord) -> bool {
        self.steps.is_empty() || self.goal != Some(goal)
    }

    /// Replaces the cached path.
    pub fn store(&mut self, goal: TileCoord, path: Vec<TileCoord>) {
        self.steps = path.into();
        self.goal = Some(goal);
    }

    /// Next step without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<TileCoord> {
        self.steps.front().copied()
    }

    /// Consumes the next step.
    pub fn pop(&mut self) -> Option<TileCoord> {
        self.steps.pop_front()
    }

    /// Drops the cached path and goal.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.goal = None;
    }

    /// Whether no steps remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of remaining steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Goal the cached path was computed for.
    #[must_use]
    pub const fn goal(&self) -> Option<TileCoord> {
        self.goal
    }

    /// Remaining steps in order.
    pub fn steps(&self) -> impl Iterator<Item = &TileCoord> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;
    use proptest::prelude::*;

    const MAZE: &str = "
        ##########
        #........#
        #.######.#
        #.#....#.#
        #.#.##.#.#
        #...#..#.#
        ######...#
        ##########
    ";

    const SEALED: &str = "
        #######
        #..#..#
        #..#..#
        #######
    ";

    #[test]
    fn test_path_excludes_start_includes_goal() {
        let grid = TileGrid::open(5, 5);
        let path = find_path(&grid, TileCoord::new(0, 0), TileCoord::new(2, 0)).unwrap();
        assert_eq!(path, vec![TileCoord::new(1, 0), TileCoord::new(2, 0)]);
    }

    #[test]
    fn test_path_to_self_is_empty() {
        let grid = TileGrid::open(3, 3);
        let path = find_path(&grid, TileCoord::new(1, 1), TileCoord::new(1, 1)).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn test_path_is_shortest() {
        let grid = TileGrid::from_ascii(MAZE).unwrap();
        let start = TileCoord::new(1, 1);
        let goal = TileCoord::new(3, 3);
        let path = find_path(&grid, start, goal).unwrap();
        // Around the left wall and in through the bottom gap.
        assert_eq!(path.len(), 8);
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_unreachable_sealed_room() {
        let grid = TileGrid::from_ascii(SEALED).unwrap();
        assert!(find_path(&grid, TileCoord::new(1, 1), TileCoord::new(5, 2)).is_none());
    }

    #[test]
    fn test_unwalkable_goal() {
        let grid = TileGrid::from_ascii(SEALED).unwrap();
        assert!(find_path(&grid, TileCoord::new(1, 1), TileCoord::new(3, 1)).is_none());
    }

    #[test]
    fn test_cache_recompute_policy() {
        let mut cache = PathCache::new();
        let goal = TileCoord::new(3, 0);
        assert!(cache.needs_recompute(goal));

        cache.store(goal, vec![TileCoord::new(1, 0), TileCoord::new(2, 0), goal]);
        assert!(!cache.needs_recompute(goal));
        assert!(cache.needs_recompute(TileCoord::new(3, 1)));

        assert_eq!(cache.pop(), Some(TileCoord::new(1, 0)));
        assert_eq!(cache.peek(), Some(TileCoord::new(2, 0)));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.goal(), None);
        assert!(cache.needs_recompute(goal));
    }

    fn maze_floor() -> Vec<TileCoord> {
        TileGrid::from_ascii(MAZE).unwrap().walkable_tiles().collect()
    }

    proptest! {
        #[test]
        fn prop_paths_are_walkable_and_adjacent(a in 0usize..64, b in 0usize..64) {
            let grid = TileGrid::from_ascii(MAZE).unwrap();
            let floor = maze_floor();
            let start = floor[a % floor.len()];
            let goal = floor[b % floor.len()];

            let path = find_path(&grid, start, goal);
            prop_assert!(path.is_some());
            let path = path.unwrap();

            let mut previous = start;
            for tile in &path {
                prop_assert!(grid.is_walkable(*tile));
                prop_assert!(previous.is_cardinal_neighbor(*tile));
                previous = *tile;
            }
            prop_assert_eq!(previous, goal);
        }

        #[test]
        fn prop_sealed_rooms_never_connect(ly in 1i32..3, lx in 1i32..3, ry in 1i32..3, rx in 4i32..6) {
            let grid = TileGrid::from_ascii(SEALED).unwrap();
            prop_assert!(find_path(&grid, TileCoord::new(lx, ly), TileCoord::new(rx, ry)).is_none());
        }
    }
}
