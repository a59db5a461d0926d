use serde::{Deserialize, Serialize};

use crate::models::{
    common::Position3D,
    traits::IAgent,
};
use crate::scenario::{FleetConfig, WorldConfig};

/// ドローンの機体種別
///
/// 受け入れ可能なミッション種別を決定します。
/// 偵察機（scout）は探索ミッション、重量機（heavy）は中継機設置ミッションを担当します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DroneKind {
    Scout,
    Heavy,
}

/// ドローンの行動状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DroneStatus {
    Idle,
    Scanning,
    Responding,
    Returning,
    Charging,
}

/// 制御モード
///
/// Manualのドローンは自動ミッション割り当ての対象外となり、
/// 外部から投入されたウェイポイントのみに従います。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Auto,
    Manual,
}

/// ドローンエージェント
///
/// 捜索救助フリートの最小単位です。位置・バッテリー・ミッション・経路を保持し、
/// 毎ティック、ディスパッチャーと移動積分器によって更新されます。
#[derive(Debug, Clone, Serialize)]
pub struct Drone {
    /// ドローンの一意識別子
    pub id: String,
    /// 表示名
    pub name: String,
    /// 機体種別
    pub kind: DroneKind,
    /// 現在位置（zは固定高度）
    pub position: Position3D,
    /// 行動状態
    pub status: DroneStatus,
    /// バッテリー残量 [0, 1]
    pub battery: f64,
    /// 制御モード
    pub control_mode: ControlMode,
    /// 実行中のミッションID
    pub current_mission: Option<String>,
    /// 計画された経路
    pub waypoints: Vec<Position3D>,
    /// 経路上の次のウェイポイントを指すカーソル
    pub waypoint_index: usize,
}

impl Drone {
    /// 新しいドローンを作成します（待機状態、満充電、自動制御）
    pub fn new(id: String, name: String, kind: DroneKind, position: Position3D) -> Self {
        Self {
            id,
            name,
            kind,
            position,
            status: DroneStatus::Idle,
            battery: 1.0,
            control_mode: ControlMode::Auto,
            current_mission: None,
            waypoints: Vec::new(),
            waypoint_index: 0,
        }
    }

    pub fn is_auto(&self) -> bool {
        self.control_mode == ControlMode::Auto
    }

    /// 未到達のウェイポイントが残っているか
    pub fn has_remaining_waypoints(&self) -> bool {
        self.waypoint_index < self.waypoints.len()
    }

    /// 現在目指しているウェイポイント
    pub fn current_waypoint(&self) -> Option<Position3D> {
        self.waypoints.get(self.waypoint_index).copied()
    }

    /// 新しい経路を設定します
    ///
    /// 経路の先頭は現在位置のセルなので、2点以上ある場合はカーソルを1から開始します。
    pub fn set_path(&mut self, path: Vec<Position3D>) {
        self.waypoint_index = if path.len() > 1 { 1 } else { 0 };
        self.waypoints = path;
    }

    /// 経路を破棄します
    pub fn clear_path(&mut self) {
        self.waypoints.clear();
        self.waypoint_index = 0;
    }

    /// バッテリーを消費します（0未満にはならない）
    pub fn drain_battery(&mut self, amount: f64) {
        self.battery = (self.battery - amount).clamp(0.0, 1.0);
    }
}

impl IAgent for Drone {
    fn get_position(&self) -> Position3D {
        self.position
    }
}

/// 設定からフリートの初期編成を生成します
///
/// 基地を起点に `formation_columns` 列の格子状に並べて配置します。
pub fn create_roster(fleet: &FleetConfig, world: &WorldConfig) -> Vec<Drone> {
    let columns = fleet.formation_columns.max(1);

    fleet
        .drones
        .iter()
        .enumerate()
        .map(|(i, drone_config)| {
            let row = i / columns;
            let col = i % columns;
            let position = Position3D::new(
                world.base.x_m + col as f64 * fleet.formation_spacing_m,
                world.base.y_m + row as f64 * fleet.formation_spacing_m,
                world.altitude_m,
            );
            Drone::new(
                drone_config.id.clone(),
                drone_config.name.clone(),
                drone_config.kind,
                position,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioConfig;

    #[test]
    fn test_set_path_cursor() {
        let mut drone = Drone::new(
            "d1".to_string(),
            "D-1".to_string(),
            DroneKind::Scout,
            Position3D::new(0.0, 0.0, 20.0),
        );

        drone.set_path(vec![Position3D::new(250.0, 250.0, 20.0)]);
        assert_eq!(drone.waypoint_index, 0);
        assert!(drone.has_remaining_waypoints());

        drone.set_path(vec![
            Position3D::new(250.0, 250.0, 20.0),
            Position3D::new(750.0, 250.0, 20.0),
        ]);
        assert_eq!(drone.waypoint_index, 1);
        assert_eq!(drone.current_waypoint(), Some(Position3D::new(750.0, 250.0, 20.0)));

        drone.clear_path();
        assert!(!drone.has_remaining_waypoints());
        assert_eq!(drone.current_waypoint(), None);
    }

    #[test]
    fn test_drain_battery_floor() {
        let mut drone = Drone::new(
            "d1".to_string(),
            "D-1".to_string(),
            DroneKind::Scout,
            Position3D::new(0.0, 0.0, 20.0),
        );
        drone.battery = 0.0002;
        drone.drain_battery(0.0005);
        assert_eq!(drone.battery, 0.0);
    }

    #[test]
    fn test_create_roster_formation() {
        let config = ScenarioConfig::default();
        let roster = create_roster(&config.fleet, &config.world);

        assert_eq!(roster.len(), 10);
        assert_eq!(roster[0].id, "drone_alpha");
        assert_eq!(roster[0].position.x, 500.0);
        assert_eq!(roster[0].position.y, 500.0);
        // 6機目は2行目の先頭
        assert_eq!(roster[5].position.x, 500.0);
        assert_eq!(roster[5].position.y, 600.0);
        assert!(roster.iter().all(|d| d.status == DroneStatus::Idle && d.battery == 1.0));
        assert_eq!(roster.iter().filter(|d| d.kind == DroneKind::Heavy).count(), 2);
    }
}
