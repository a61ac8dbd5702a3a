use std::collections::{HashMap, HashSet};

use crate::config::{LayoutConfig, OverlapStrategy};

/// Resolves a preferred card position to a free one at the same depth and
/// records it as taken.
pub(super) enum Placer {
    Free,
    Shift(ShiftPlacer),
    Grid(OccupancyGrid),
}

impl Placer {
    pub(super) fn new(config: &LayoutConfig) -> Self {
        match config.overlap {
            OverlapStrategy::None => Self::Free,
            OverlapStrategy::Shift => Self::Shift(ShiftPlacer::new(config)),
            OverlapStrategy::Grid => Self::Grid(OccupancyGrid::new(config)),
        }
    }

    pub(super) fn place(&mut self, depth: usize, preferred: (f32, f32)) -> (f32, f32) {
        match self {
            Self::Free => preferred,
            Self::Shift(placer) => placer.place(depth, preferred),
            Self::Grid(grid) => {
                let position = grid.find_position(depth, preferred);
                grid.reserve(depth, position);
                position
            }
        }
    }
}

pub(super) struct ShiftPlacer {
    min_distance: f32,
    step: f32,
    max_attempts: usize,
    placed: HashMap<usize, Vec<f32>>,
}

impl ShiftPlacer {
    fn new(config: &LayoutConfig) -> Self {
        Self {
            min_distance: config.shift_min_distance,
            step: config.shift_step.max(1.0),
            max_attempts: config.max_attempts,
            placed: HashMap::new(),
        }
    }

    fn place(&mut self, depth: usize, (mut x, y): (f32, f32)) -> (f32, f32) {
        let row = self.placed.entry(depth).or_default();
        let mut attempts = 0;
        while attempts < self.max_attempts
            && row.iter().any(|other| (other - x).abs() < self.min_distance)
        {
            x += self.step;
            attempts += 1;
        }
        row.push(x);
        (x, y)
    }
}

type Cell = (i64, i64);

/// Coarse occupancy map, one layer per depth. Each card reserves its own
/// rectangle inflated by half the configured gaps.
pub(super) struct OccupancyGrid {
    cell: f32,
    half_width: f32,
    half_height: f32,
    ring_step: f32,
    vertical_gap: f32,
    max_attempts: usize,
    levels: HashMap<usize, HashSet<Cell>>,
}

impl OccupancyGrid {
    fn new(config: &LayoutConfig) -> Self {
        Self {
            cell: config.grid_cell.max(1.0),
            half_width: config.card_width / 2.0 + config.min_horizontal_gap / 2.0,
            half_height: config.card_height / 2.0 + config.min_vertical_gap / 2.0,
            ring_step: config.card_width + config.min_horizontal_gap,
            vertical_gap: config.min_vertical_gap,
            max_attempts: config.max_attempts,
            levels: HashMap::new(),
        }
    }

    fn footprint(&self, (x, y): (f32, f32)) -> Vec<Cell> {
        let steps_x = ((self.half_width * 2.0) / self.cell).floor() as i64;
        let steps_y = ((self.half_height * 2.0) / self.cell).floor() as i64;
        let mut cells = Vec::with_capacity(((steps_x + 1) * (steps_y + 1)) as usize);
        for i in 0..=steps_x {
            let check_x = x - self.half_width + i as f32 * self.cell;
            for j in 0..=steps_y {
                let check_y = y - self.half_height + j as f32 * self.cell;
                cells.push((
                    (check_x / self.cell).round() as i64,
                    (check_y / self.cell).round() as i64,
                ));
            }
        }
        cells
    }

    pub(super) fn is_occupied(&self, depth: usize, position: (f32, f32)) -> bool {
        let Some(level) = self.levels.get(&depth) else {
            return false;
        };
        self.footprint(position)
            .iter()
            .any(|cell| level.contains(cell))
    }

    pub(super) fn reserve(&mut self, depth: usize, position: (f32, f32)) {
        let cells = self.footprint(position);
        self.levels.entry(depth).or_default().extend(cells);
    }

    /// First free spot on expanding rings around `preferred`; falls back to
    /// `preferred` when every ring is taken.
    pub(super) fn find_position(&self, depth: usize, preferred: (f32, f32)) -> (f32, f32) {
        if !self.is_occupied(depth, preferred) {
            return preferred;
        }
        let (px, py) = preferred;
        let gap = self.vertical_gap;
        for attempt in 1..=self.max_attempts {
            let radius = attempt as f32 * self.ring_step;
            let candidates = [
                (px + radius, py),
                (px - radius, py),
                (px, py + gap),
                (px, py - gap),
                (px + radius / 2.0, py + gap / 2.0),
                (px - radius / 2.0, py + gap / 2.0),
                (px + radius / 2.0, py - gap / 2.0),
                (px - radius / 2.0, py - gap / 2.0),
            ];
            if let Some(free) = candidates
                .into_iter()
                .find(|candidate| !self.is_occupied(depth, *candidate))
            {
                return free;
            }
        }
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_keeps_depths_independent() {
        let mut grid = OccupancyGrid::new(&LayoutConfig::default());
        grid.reserve(2, (0.0, 0.0));
        assert!(grid.is_occupied(2, (100.0, 0.0)));
        assert!(!grid.is_occupied(3, (0.0, 0.0)));
        assert!(!grid.is_occupied(2, (1000.0, 0.0)));
    }

    #[test]
    fn ring_search_moves_off_a_taken_spot() {
        let mut grid = OccupancyGrid::new(&LayoutConfig::default());
        grid.reserve(2, (0.0, 0.0));
        let found = grid.find_position(2, (0.0, 0.0));
        assert_ne!(found, (0.0, 0.0));
        assert!(!grid.is_occupied(2, found));
    }

    #[test]
    fn shift_pushes_right_until_clear() {
        let config = LayoutConfig {
            overlap: OverlapStrategy::Shift,
            ..LayoutConfig::default()
        };
        let mut placer = Placer::new(&config);
        assert_eq!(placer.place(2, (0.0, 10.0)), (0.0, 10.0));
        assert_eq!(placer.place(2, (100.0, 10.0)), (480.0, 10.0));
        assert_eq!(placer.place(3, (100.0, 20.0)), (100.0, 20.0));
    }
}
