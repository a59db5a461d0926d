//! # Coverage モジュール
//!
//! 捜索領域を覆う正方グリッド上で、各セルを何機の異なるドローンが走査したかを記録します。
//!
//! 各セルの走査回数は最大3（三重冗長カバレッジ）で、同じドローンが同じセルを
//! 何度通過しても回数は1しか増えません。回数が減ることはありません。

use serde::Serialize;

use crate::models::{GridCell, Position3D};
use crate::scenario::WorldConfig;

/// 冗長カバレッジの上限
pub const MAX_COVERAGE: u8 = 3;

/// 開始時の走査済み領域に記録する識別子
pub const BASE_SCANNER_ID: &str = "base";

/// グリッドの1セル
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageCell {
    /// 走査した異なるドローンの数 [0, 3]
    pub count: u8,
    /// 走査に寄与したドローンID
    pub scanned_by: Vec<String>,
}

/// カバレッジ階層ごとのセル一覧
#[derive(Debug, Clone, Default)]
pub struct CoverageTiers {
    pub unexplored: Vec<GridCell>,
    pub partial: Vec<GridCell>,
    pub almost: Vec<GridCell>,
    pub cleared: Vec<GridCell>,
}

/// 被覆グリッド
///
/// 行優先の平坦な配列で保持し、セル単位の参照・更新はO(1)です。
#[derive(Debug, Clone)]
pub struct CoverageGrid {
    size: usize,
    cell_size: f64,
    cells: Vec<CoverageCell>,
}

impl CoverageGrid {
    /// すべてのセルが未走査のグリッドを作成
    pub fn new(size: usize, cell_size: f64) -> Self {
        Self {
            size,
            cell_size,
            cells: vec![CoverageCell::default(); size * size],
        }
    }

    /// 世界設定からグリッドを作成し、基地周辺を走査済みにします
    pub fn from_world(world: &WorldConfig) -> Self {
        let mut grid = Self::new(world.grid_size, world.cell_size_m);
        grid.seed_base_area(world.prescanned_cells);
        grid
    }

    /// 原点側の `extent × extent` セルを走査済み（回数1）にします
    pub fn seed_base_area(&mut self, extent: usize) {
        let extent = extent.min(self.size);
        for cy in 0..extent {
            for cx in 0..extent {
                self.scan((cx, cy), BASE_SCANNER_ID);
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        let (cx, cy) = cell;
        if cx < self.size && cy < self.size {
            Some(cy * self.size + cx)
        } else {
            None
        }
    }

    pub fn cell(&self, cell: GridCell) -> Option<&CoverageCell> {
        self.index(cell).map(|i| &self.cells[i])
    }

    /// セルを走査します
    ///
    /// 未記録のドローンで、かつ回数が上限未満の場合にのみ回数を増やします。
    /// 変化があった場合にtrueを返します。
    pub fn scan(&mut self, cell: GridCell, drone_id: &str) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        let entry = &mut self.cells[index];

        if entry.count >= MAX_COVERAGE || entry.scanned_by.iter().any(|id| id == drone_id) {
            return false;
        }

        entry.scanned_by.push(drone_id.to_string());
        entry.count += 1;
        true
    }

    /// 位置を中心に半径 `radius` セルの正方領域を走査し、変化したセル数を返します
    pub fn scan_area(&mut self, position: &Position3D, radius: usize, drone_id: &str) -> usize {
        let (cx, cy) = self.cell_of(position);
        let radius = radius as isize;
        let mut changed = 0;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let nx = cx as isize + dx;
                let ny = cy as isize + dy;
                if nx < 0 || ny < 0 {
                    continue;
                }
                if self.scan((nx as usize, ny as usize), drone_id) {
                    changed += 1;
                }
            }
        }

        changed
    }

    /// セルのカバレッジ階層 [0, 3]（範囲外は0）
    pub fn coverage_level(&self, cell: GridCell) -> u8 {
        self.cell(cell).map(|c| c.count).unwrap_or(0)
    }

    /// 全セルが三重走査済みか
    pub fn is_fully_covered(&self) -> bool {
        self.cells.iter().all(|c| c.count >= MAX_COVERAGE)
    }

    /// 位置を含むセル（グリッド範囲にクランプ）
    pub fn cell_of(&self, position: &Position3D) -> GridCell {
        let max_index = self.size.saturating_sub(1) as f64;
        let cx = (position.x / self.cell_size).floor().clamp(0.0, max_index);
        let cy = (position.y / self.cell_size).floor().clamp(0.0, max_index);
        (cx as usize, cy as usize)
    }

    /// セル中心のワールド座標
    pub fn cell_center(&self, cell: GridCell, altitude: f64) -> Position3D {
        cell_center(cell, self.cell_size, altitude)
    }

    /// 階層ごとにセルを分類します（x優先で走査）
    pub fn tiers(&self) -> CoverageTiers {
        let mut tiers = CoverageTiers::default();
        for cx in 0..self.size {
            for cy in 0..self.size {
                let cell = (cx, cy);
                match self.coverage_level(cell) {
                    0 => tiers.unexplored.push(cell),
                    1 => tiers.partial.push(cell),
                    2 => tiers.almost.push(cell),
                    _ => tiers.cleared.push(cell),
                }
            }
        }
        tiers
    }

    /// 1回以上走査されたセル
    pub fn scanned_cells(&self) -> Vec<GridCell> {
        let mut scanned = Vec::new();
        for cx in 0..self.size {
            for cy in 0..self.size {
                if self.coverage_level((cx, cy)) > 0 {
                    scanned.push((cx, cy));
                }
            }
        }
        scanned
    }

    /// 送出用の回数行列（[行][列]）
    pub fn counts(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.size.max(1))
            .map(|row| row.iter().map(|c| c.count).collect())
            .collect()
    }

    /// 1回以上走査されたセルの割合
    pub fn coverage_ratio(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        let scanned = self.cells.iter().filter(|c| c.count > 0).count();
        scanned as f64 / self.cells.len() as f64
    }
}

/// セル中心のワールド座標
pub fn cell_center(cell: GridCell, cell_size: f64, altitude: f64) -> Position3D {
    Position3D::new(
        cell.0 as f64 * cell_size + cell_size / 2.0,
        cell.1 as f64 * cell_size + cell_size / 2.0,
        altitude,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_counts_distinct_drones_up_to_three() {
        let mut grid = CoverageGrid::new(4, 500.0);

        assert!(grid.scan((1, 1), "a"));
        assert!(!grid.scan((1, 1), "a"));
        assert_eq!(grid.coverage_level((1, 1)), 1);

        assert!(grid.scan((1, 1), "b"));
        assert!(grid.scan((1, 1), "c"));
        assert!(!grid.scan((1, 1), "d"));
        assert_eq!(grid.coverage_level((1, 1)), 3);
        assert_eq!(grid.cell((1, 1)).map(|c| c.scanned_by.len()), Some(3));

        assert!(!grid.scan((9, 9), "a"));
    }

    #[test]
    fn test_scan_area_clips_to_grid() {
        let mut grid = CoverageGrid::new(10, 500.0);
        let changed = grid.scan_area(&Position3D::new(100.0, 100.0, 20.0), 2, "a");

        // (0..=2) x (0..=2)
        assert_eq!(changed, 9);
        assert_eq!(grid.coverage_level((2, 2)), 1);
        assert_eq!(grid.coverage_level((3, 0)), 0);

        // 静止したドローンは回数を増やさない
        assert_eq!(grid.scan_area(&Position3D::new(100.0, 100.0, 20.0), 2, "a"), 0);
    }

    #[test]
    fn test_seed_base_area_and_tiers() {
        let mut grid = CoverageGrid::new(6, 500.0);
        grid.seed_base_area(2);

        let tiers = grid.tiers();
        assert_eq!(tiers.partial.len(), 4);
        assert_eq!(tiers.unexplored.len(), 32);
        assert!(tiers.almost.is_empty() && tiers.cleared.is_empty());
        assert_eq!(grid.scanned_cells().len(), 4);
        assert!((grid.coverage_ratio() - 4.0 / 36.0).abs() < 1e-12);
    }

    #[test]
    fn test_fully_covered() {
        let mut grid = CoverageGrid::new(2, 500.0);
        for id in ["a", "b"] {
            grid.scan_area(&Position3D::new(0.0, 0.0, 0.0), 1, id);
        }
        assert!(!grid.is_fully_covered());
        grid.scan_area(&Position3D::new(0.0, 0.0, 0.0), 1, "c");
        assert!(grid.is_fully_covered());
    }

    #[test]
    fn test_cell_of_clamps_and_centers() {
        let grid = CoverageGrid::new(30, 500.0);
        assert_eq!(grid.cell_of(&Position3D::new(-50.0, 15_000.0, 0.0)), (0, 29));
        assert_eq!(grid.cell_of(&Position3D::new(749.0, 1001.0, 0.0)), (1, 2));
        assert_eq!(grid.cell_center((1, 2), 20.0), Position3D::new(750.0, 1250.0, 20.0));
    }

    #[test]
    fn test_counts_layout_is_row_major() {
        let mut grid = CoverageGrid::new(3, 1.0);
        grid.scan((2, 0), "a");
        let counts = grid.counts();
        assert_eq!(counts[0], vec![0, 0, 1]);
        assert_eq!(counts.len(), 3);
    }
}
