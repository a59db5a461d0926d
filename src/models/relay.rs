use serde::Serialize;

use crate::models::{
    common::Position3D,
    traits::IAgent,
};

/// 中継機の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Active,
    Inactive,
}

/// 通信中継機
///
/// 重量機が設置し、半径内の通信カバレッジを提供します。
#[derive(Debug, Clone, Serialize)]
pub struct CommRelay {
    pub id: String,
    pub position: Position3D,
    /// 通信半径（world units）
    pub radius: f64,
    pub status: RelayStatus,
}

impl CommRelay {
    pub fn new(id: String, position: Position3D, radius: f64) -> Self {
        Self {
            id,
            position,
            radius,
            status: RelayStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RelayStatus::Active
    }

    /// 位置が実効半径（radius × coverage_ratio）内にあるか
    pub fn covers(&self, position: &Position3D, coverage_ratio: f64) -> bool {
        self.is_active() && self.position.distance_xy(position) < self.radius * coverage_ratio
    }
}

impl IAgent for CommRelay {
    fn get_position(&self) -> Position3D {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_uses_effective_radius() {
        let mut relay = CommRelay::new("r1".to_string(), Position3D::new(0.0, 0.0, 0.0), 1000.0);

        assert!(relay.covers(&Position3D::new(899.0, 0.0, 0.0), 0.9));
        assert!(!relay.covers(&Position3D::new(900.0, 0.0, 0.0), 0.9));

        relay.status = RelayStatus::Inactive;
        assert!(!relay.covers(&Position3D::new(10.0, 0.0, 0.0), 0.9));
    }
}
