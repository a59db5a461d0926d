//! # Movement モジュール
//!
//! 毎ティックのドローン移動を積分します。
//!
//! 処理はロスター順に1機ずつ行い、他機との分離ベクトルはティック開始時点の
//! 位置スナップショットから計算します。移動後にミッション完了判定、バッテリー消費、
//! 被覆グリッドの更新を行います。

use rand::Rng;
use serde_json::json;
use tracing::{debug, info};

use crate::events::{CommandInbox, ManualCommand};
use crate::models::{
    Alert, AlertType, CommRelay, ControlMode, Drone, DroneStatus, MissionBoard, MissionStatus,
    MissionType, Position3D, Vector2D,
};
use crate::scenario::{MovementConfig, ScenarioConfig};
use crate::state::FleetState;

/// 1ティック分の移動結果
#[derive(Debug, Default)]
pub struct MovementOutcome {
    pub alerts: Vec<Alert>,
    /// 被覆グリッドに変化があったか
    pub coverage_changed: bool,
    /// 移動したドローン数
    pub moved: usize,
}

/// 移動積分器
pub struct MovementIntegrator {
    movement: MovementConfig,
    scan_radius: usize,
    extent: f64,
    altitude: f64,
    relay_radius: f64,
}

impl MovementIntegrator {
    pub fn new(config: &ScenarioConfig) -> Self {
        Self {
            movement: config.movement.clone(),
            scan_radius: config.coverage.scan_radius_cells,
            extent: config.world.extent(),
            altitude: config.world.altitude_m,
            relay_radius: config.relay.initial_radius_m,
        }
    }

    /// 全ドローンを1ティック分移動させます
    ///
    /// # 引数
    ///
    /// * `state` - フリート状態
    /// * `inbox` - 未処理の手動コマンド（各ドローンの処理開始時に取り出す）
    /// * `rng` - 重なったドローンの押し出しに使用する乱数生成器
    pub fn integrate<R: Rng>(
        &self,
        state: &mut FleetState,
        inbox: &mut CommandInbox,
        rng: &mut R,
    ) -> MovementOutcome {
        let snapshot: Vec<Position3D> = state.drones.iter().map(|d| d.position).collect();
        let mut outcome = MovementOutcome::default();

        for index in 0..state.drones.len() {
            let drone_id = state.drones[index].id.clone();

            if let Some(command) = inbox.take(&drone_id) {
                self.apply_command(state, index, command);
            }

            let separation = self.separation(index, &snapshot, rng);
            let mission_target = state
                .missions
                .active(state.drones[index].current_mission.as_deref())
                .map(|m| m.target);

            let drone = &mut state.drones[index];
            let planned = self.advance(drone, mission_target, separation);
            if planned.is_some() {
                drone.drain_battery(self.movement.battery_drain_per_tick);
                outcome.moved += 1;
            }

            if let Some(alert) = self.check_completion(state, index, planned) {
                outcome.alerts.push(alert);
            }

            settle(&mut state.drones[index], &state.missions);

            let position = state.drones[index].position;
            if state.coverage.scan_area(&position, self.scan_radius, &drone_id) > 0 {
                outcome.coverage_changed = true;
            }
        }

        outcome
    }

    /// 手動コマンドを適用します
    ///
    /// 手動制御へ切り替えた場合、保持していたミッションは失敗扱いになります。
    /// ウェイポイントが指定された場合はカーソルを先頭に戻します。
    fn apply_command(&self, state: &mut FleetState, index: usize, command: ManualCommand) {
        let waypoints = command.waypoint_positions(self.altitude);
        let drone = &mut state.drones[index];

        if let Some(mode) = command.mode {
            if mode != drone.control_mode {
                info!("{}: 制御モード変更 {:?} -> {:?}", drone.id, drone.control_mode, mode);
                if mode == ControlMode::Manual && waypoints.is_none() {
                    drone.clear_path();
                }
            }
            drone.control_mode = mode;
        }

        if drone.control_mode == ControlMode::Manual && drone.current_mission.is_some() {
            let superseded = state.missions.supersede_active(&drone.id);
            debug!("{}: 手動制御によりミッション{}件を中断", drone.id, superseded);
            drone.current_mission = None;
        }

        if let Some(points) = waypoints {
            drone.waypoints = points;
            drone.waypoint_index = 0;
            if drone.current_mission.is_none() {
                drone.status = if drone.has_remaining_waypoints() {
                    DroneStatus::Scanning
                } else {
                    DroneStatus::Idle
                };
            }
            debug!("{}: ウェイポイント{}点を設定", drone.id, drone.waypoints.len());
        }
    }

    /// 他機との分離ベクトル
    ///
    /// 最小間隔より近い機体から線形の強さで離れる方向の力を合成し、
    /// 速度の一定割合でクリップします。完全に重なった機体はランダムに押し出します。
    pub fn separation<R: Rng>(
        &self,
        index: usize,
        snapshot: &[Position3D],
        rng: &mut R,
    ) -> Vector2D {
        let me = snapshot[index];
        let min = self.movement.min_separation_m;
        let speed = self.movement.speed_per_tick;
        let mut force = Vector2D::zero();

        for (other_index, other) in snapshot.iter().enumerate() {
            if other_index == index {
                continue;
            }

            let offset = me - *other;
            let distance = offset.magnitude();
            if distance >= min {
                continue;
            }

            if distance == 0.0 {
                let jitter = speed * self.movement.coincident_jitter_ratio;
                force += Vector2D::new(
                    rng.gen_range(-jitter..=jitter),
                    rng.gen_range(-jitter..=jitter),
                );
            } else {
                let strength = (min - distance) / min;
                force += offset.normalize() * (strength * speed * self.movement.separation_gain);
            }
        }

        force.clamp_magnitude(speed * self.movement.separation_limit_ratio)
    }

    /// ドローンを目標へ1ステップ進めます
    ///
    /// ウェイポイントがあればそれに従い、無い場合は自動制御機に限りミッション目標へ直接向かいます。
    /// 移動した場合は分離ベクトルを加える前の到達予定位置を返します。
    fn advance(
        &self,
        drone: &mut Drone,
        mission_target: Option<Position3D>,
        separation: Vector2D,
    ) -> Option<Position3D> {
        let mut following = false;
        let mut goal = None;

        if let Some(waypoint) = drone.current_waypoint() {
            if drone.position.distance_xy(&waypoint) < self.movement.waypoint_arrival_m {
                drone.waypoint_index += 1;
            }
            goal = drone.current_waypoint();
            following = goal.is_some();
        }

        if goal.is_none() && drone.is_auto() {
            goal = mission_target;
        }

        let goal = goal?;
        let offset = drone.position.vector_to(&goal);
        let distance = offset.magnitude();
        if distance <= f64::EPSILON {
            if following {
                drone.waypoint_index += 1;
            }
            return None;
        }

        let travel = distance.min(self.movement.speed_per_tick);
        let planned = drone.position + offset.normalize() * travel;
        drone.position = (planned + separation).clamp_to_world(self.extent);

        // ステップでウェイポイントに到達した場合は次へ進める
        if following && travel >= distance {
            drone.waypoint_index += 1;
        }

        Some(planned)
    }

    /// ミッション完了判定
    ///
    /// 移動後の位置、または分離前の到達予定位置が目標の完了半径内にあれば完了とします。
    fn check_completion(
        &self,
        state: &mut FleetState,
        index: usize,
        planned: Option<Position3D>,
    ) -> Option<Alert> {
        let drone = &state.drones[index];
        let mission = state.missions.active(drone.current_mission.as_deref())?;

        let radius = self.movement.mission_arrival_m;
        let reached = drone.position.distance_xy(&mission.target) < radius
            || planned.is_some_and(|p| p.distance_xy(&mission.target) < radius);
        if !reached {
            return None;
        }

        let mission_id = mission.id.clone();
        let mission_type = mission.mission_type;
        let target = mission.target;
        let survivor_id = mission.survivor_id.clone();
        let tick = state.tick;

        if let Some(mission) = state.missions.get_mut(&mission_id) {
            mission.status = MissionStatus::Completed;
        }

        let drone = &mut state.drones[index];
        drone.status = DroneStatus::Idle;
        drone.current_mission = None;
        drone.clear_path();
        let drone_id = drone.id.clone();

        match mission_type {
            MissionType::Scan => {
                debug!("{}: 探索ミッション完了 {}", drone_id, mission_id);
                None
            }
            MissionType::Rescue => {
                let survivor_id = survivor_id.unwrap_or_default();
                if let Some(survivor) = state.survivor_mut(&survivor_id) {
                    survivor.rescued = true;
                }
                info!("{}: 生存者 {} の救助完了", drone_id, survivor_id);
                Some(Alert::new(
                    AlertType::MissionComplete,
                    format!("{} が生存者 {} の救助を完了", drone_id, survivor_id),
                    json!({
                        "drone_id": drone_id,
                        "survivor_id": survivor_id,
                        "mission_id": mission_id,
                    }),
                    tick,
                ))
            }
            MissionType::Return => {
                drone.battery = 1.0;
                info!("{}: 基地に帰還し充電完了", drone_id);
                Some(Alert::new(
                    AlertType::DroneRecharged,
                    format!("{} が基地で充電を完了", drone_id),
                    json!({ "drone_id": drone_id, "battery": 1.0 }),
                    tick,
                ))
            }
            MissionType::DeployRelay => {
                let relay_id = state.next_relay_id();
                state
                    .relays
                    .push(CommRelay::new(relay_id.clone(), target, self.relay_radius));
                info!(
                    "{}: 中継機 {} を設置 ({:.0}, {:.0})",
                    drone_id, relay_id, target.x, target.y
                );
                Some(Alert::new(
                    AlertType::RelayDeployed,
                    format!("{} が中継機 {} を設置", drone_id, relay_id),
                    json!({
                        "relay_id": relay_id,
                        "drone_id": drone_id,
                        "location": { "x": target.x, "y": target.y },
                        "radius": self.relay_radius,
                    }),
                    tick,
                ))
            }
        }
    }
}

/// ミッションを持たないドローンの状態を整えます
///
/// 失効したミッション参照は破棄します。経路を走り終えたドローン、および
/// ミッションを失った自動制御の探索中ドローンは待機へ戻します。
fn settle(drone: &mut Drone, missions: &MissionBoard) {
    if missions.active(drone.current_mission.as_deref()).is_some() {
        return;
    }
    drone.current_mission = None;

    let finished = !drone.has_remaining_waypoints()
        || (drone.is_auto() && drone.status == DroneStatus::Scanning);
    if finished && drone.status != DroneStatus::Idle {
        debug!("{}: {:?} -> 待機", drone.id, drone.status);
        drone.status = DroneStatus::Idle;
    }
}
