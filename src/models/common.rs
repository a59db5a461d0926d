use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// 3次元位置を表す構造体
///
/// zは固定の飛行高度であり、2次元のロジック（移動・距離・被覆）では使用しません。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64, // world units
    pub y: f64, // world units
    pub z: f64, // 飛行高度
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// XY平面での2次元距離を計算
    pub fn distance_xy(&self, other: &Position3D) -> f64 {
        self.distance_sq_xy(other).sqrt()
    }

    /// XY平面での距離の2乗（平方根を避けたい比較用）
    pub fn distance_sq_xy(&self, other: &Position3D) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    /// 他の位置へのXY平面ベクトル
    pub fn vector_to(&self, other: &Position3D) -> Vector2D {
        Vector2D::new(other.x - self.x, other.y - self.y)
    }

    /// 同じ高度を保ったままXY座標を置き換えた位置
    pub fn with_xy(&self, x: f64, y: f64) -> Self {
        Self::new(x, y, self.z)
    }

    /// XY座標を矩形領域 [0, extent] に収める
    pub fn clamp_to_world(&self, extent: f64) -> Self {
        Self::new(self.x.clamp(0.0, extent), self.y.clamp(0.0, extent), self.z)
    }
}

impl Add<Vector2D> for Position3D {
    type Output = Self;

    fn add(self, offset: Vector2D) -> Self::Output {
        Self::new(self.x + offset.x, self.y + offset.y, self.z)
    }
}

impl Sub for Position3D {
    type Output = Vector2D;

    fn sub(self, other: Self) -> Self::Output {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

/// XY平面上の変位・力を表す2次元ベクトル
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// ベクトルの大きさ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    /// 単位ベクトル（大きさ0の場合はそのまま）
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag)
        } else {
            *self
        }
    }

    /// 大きさ制限（最大値でクリップ）
    pub fn clamp_magnitude(&self, max_magnitude: f64) -> Self {
        let mag = self.magnitude();
        if mag > max_magnitude && mag > 0.0 {
            let factor = max_magnitude / mag;
            Self::new(self.x * factor, self.y * factor)
        } else {
            *self
        }
    }
}

impl Add for Vector2D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Mul<f64> for Vector2D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// グリッドセルの座標 (列, 行)
pub type GridCell = (usize, usize);

/// シミュレーション時刻（ティック番号）
///
/// 生成時刻・検知時刻・アラート時刻はすべてティック番号で記録し、再現性を保ちます。
pub type Tick = u64;
