//! # Pathfinding モジュール
//!
//! 被覆グリッドと同じ正方グリッド上のA*探索を提供します。
//!
//! - 8近傍（上下左右 + 斜め）、直進コスト1、斜めコスト√2
//! - ヒューリスティックはゴールセルまでのユークリッド距離（許容的かつ無矛盾）
//! - 出力はスタートセルからゴールセルまでのセル中心座標列
//! - 経路が存在しない場合は `[start, goal]` の直線経路にフォールバック
//!
//! 同じ入力に対して常に同じ経路を返します（f値が等しい場合は先に積まれたノードを優先）。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::f64::consts::SQRT_2;

use crate::coverage::cell_center;
use crate::models::{GridCell, IPathPlanner, Position3D};
use crate::scenario::WorldConfig;

const NEIGHBORS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// オープンリストの要素
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    seq: u64,
    index: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // BinaryHeapは最大ヒープなので逆順: f最小 → 積まれた順
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// ワールド座標をグリッド範囲内のセルに変換
fn to_cell(position: &Position3D, grid_size: usize, cell_size: f64) -> GridCell {
    let max_index = grid_size.saturating_sub(1) as f64;
    (
        (position.x / cell_size).floor().clamp(0.0, max_index) as usize,
        (position.y / cell_size).floor().clamp(0.0, max_index) as usize,
    )
}

fn heuristic(a: GridCell, b: GridCell) -> f64 {
    let dx = a.0 as f64 - b.0 as f64;
    let dy = a.1 as f64 - b.1 as f64;
    (dx * dx + dy * dy).sqrt()
}

/// A*探索
///
/// # 引数
///
/// * `start` - 開始位置（ワールド座標）
/// * `goal` - 目標位置（ワールド座標）
/// * `grid_size` - グリッドの一辺のセル数
/// * `cell_size` - 1セルの一辺
/// * `obstacles` - 通行不可セル（任意）
///
/// # 戻り値
///
/// ウェイポイント列。開始セルと目標セルが同じ場合は `[goal]`。
pub fn a_star_search(
    start: Position3D,
    goal: Position3D,
    grid_size: usize,
    cell_size: f64,
    obstacles: Option<&HashSet<GridCell>>,
) -> Vec<Position3D> {
    if grid_size == 0 {
        return vec![start, goal];
    }

    let start_cell = to_cell(&start, grid_size, cell_size);
    let goal_cell = to_cell(&goal, grid_size, cell_size);

    if start_cell == goal_cell {
        return vec![goal];
    }

    let is_blocked = |cell: GridCell| obstacles.is_some_and(|set| set.contains(&cell));
    let index_of = |cell: GridCell| cell.1 * grid_size + cell.0;

    let node_count = grid_size * grid_size;
    let mut g_score = vec![f64::INFINITY; node_count];
    let mut parent: Vec<Option<usize>> = vec![None; node_count];
    let mut closed = vec![false; node_count];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    let start_index = index_of(start_cell);
    let goal_index = index_of(goal_cell);
    g_score[start_index] = 0.0;
    open.push(OpenNode {
        f: heuristic(start_cell, goal_cell),
        seq,
        index: start_index,
    });

    while let Some(current) = open.pop() {
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        if current.index == goal_index {
            return reconstruct(&parent, goal_index, grid_size, cell_size, start.z);
        }

        let cx = (current.index % grid_size) as isize;
        let cy = (current.index / grid_size) as isize;

        for (dx, dy) in NEIGHBORS {
            let nx = cx + dx;
            let ny = cy + dy;
            if nx < 0 || ny < 0 || nx >= grid_size as isize || ny >= grid_size as isize {
                continue;
            }

            let neighbor = (nx as usize, ny as usize);
            let neighbor_index = index_of(neighbor);
            if closed[neighbor_index] || is_blocked(neighbor) {
                continue;
            }

            let step_cost = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
            let tentative_g = g_score[current.index] + step_cost;
            if tentative_g < g_score[neighbor_index] {
                g_score[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current.index);
                seq += 1;
                open.push(OpenNode {
                    f: tentative_g + heuristic(neighbor, goal_cell),
                    seq,
                    index: neighbor_index,
                });
            }
        }
    }

    // 開けたグリッドでは起こり得ないが、障害物で塞がれた場合は直線経路
    vec![start, goal]
}

fn reconstruct(
    parent: &[Option<usize>],
    goal_index: usize,
    grid_size: usize,
    cell_size: f64,
    altitude: f64,
) -> Vec<Position3D> {
    let mut path = Vec::new();
    let mut cursor = Some(goal_index);
    while let Some(index) = cursor {
        let cell = (index % grid_size, index / grid_size);
        path.push(cell_center(cell, cell_size, altitude));
        cursor = parent[index];
    }
    path.reverse();
    path
}

/// グリッドA*による経路計画
#[derive(Debug, Clone)]
pub struct GridPathfinder {
    pub grid_size: usize,
    pub cell_size: f64,
}

impl GridPathfinder {
    pub fn new(grid_size: usize, cell_size: f64) -> Self {
        Self {
            grid_size,
            cell_size,
        }
    }

    pub fn from_world(world: &WorldConfig) -> Self {
        Self::new(world.grid_size, world.cell_size_m)
    }
}

impl IPathPlanner for GridPathfinder {
    fn plan(&self, start: Position3D, goal: Position3D) -> Vec<Position3D> {
        a_star_search(start, goal, self.grid_size, self.cell_size, None)
    }
}
