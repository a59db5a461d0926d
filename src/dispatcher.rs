//! # Dispatcher モジュール
//!
//! フリートへのミッション割り当てを行います。
//!
//! - 探索: カバレッジ階層の低いセルから目標を選び、近さと他機との分散を考慮して偵察機へ割り当て
//! - 救助: 高信頼度の未救助生存者へ最寄りの待機/探索中ドローンを派遣
//! - 帰還: バッテリー低下機を基地へ帰還させる
//! - 中継機設置: 既存中継機の外側の走査済み地点へ重量機を派遣

use rand::Rng;
use rand::seq::{SliceRandom, index};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::coverage::CoverageGrid;
use crate::models::{
    Alert, AlertType, DroneKind, DroneStatus, IPathPlanner, Mission, MissionType, Position3D,
    nearest_index,
};
use crate::scenario::{DispatchConfig, RelayConfig, ScenarioConfig};
use crate::state::FleetState;

/// ミッションディスパッチャー
pub struct MissionDispatcher {
    dispatch: DispatchConfig,
    relay: RelayConfig,
    base: Position3D,
    altitude: f64,
    extent: f64,
    planner: Box<dyn IPathPlanner + Send + Sync>,
}

impl MissionDispatcher {
    /// 新しいディスパッチャーを作成します
    ///
    /// # 引数
    ///
    /// * `config` - シナリオ設定
    /// * `planner` - 経路計画に使用するプランナー
    pub fn new(config: &ScenarioConfig, planner: Box<dyn IPathPlanner + Send + Sync>) -> Self {
        Self {
            dispatch: config.dispatch.clone(),
            relay: config.relay.clone(),
            base: Position3D::new(
                config.world.base.x_m,
                config.world.base.y_m,
                config.world.altitude_m,
            ),
            altitude: config.world.altitude_m,
            extent: config.world.extent(),
            planner,
        }
    }

    pub fn base(&self) -> Position3D {
        self.base
    }

    /// 経路を計画し、終点が目標と一致しない場合は目標そのものを追加します
    fn plan_route(&self, start: Position3D, target: Position3D) -> Vec<Position3D> {
        let mut path = self.planner.plan(start, target);
        let ends_at_target = path
            .last()
            .map(|last| last.distance_sq_xy(&target) < 1e-9)
            .unwrap_or(false);
        if !ends_at_target {
            path.push(target);
        }
        path
    }

    /// ドローンにミッションを割り当てます
    ///
    /// 既存のアクティブミッションは失敗扱いにしてから新しいミッションを登録し、
    /// 状態・ミッションID・経路を更新します。
    fn assign_mission(
        &self,
        state: &mut FleetState,
        drone_index: usize,
        mission: Mission,
        status: DroneStatus,
    ) {
        let start = state.drones[drone_index].position;
        let path = self.plan_route(start, mission.target);

        let superseded = state.missions.supersede_active(&mission.drone_id);
        if superseded > 0 {
            debug!("{}: 既存ミッション{}件を置き換え", mission.drone_id, superseded);
        }

        let drone = &mut state.drones[drone_index];
        drone.current_mission = Some(mission.id.clone());
        drone.status = status;
        drone.set_path(path);

        state.missions.push(mission);
    }

    /// 探索ミッションを割り当てます
    ///
    /// 重量機への中継機設置を先に行い、その後で待機中の偵察機に探索目標を配分します。
    /// 戻り値は割り当てた探索ミッション数です。
    pub fn dispatch_scan<R: Rng>(&self, state: &mut FleetState, rng: &mut R) -> usize {
        self.dispatch_relays(state);

        // ミッションを失った探索中ドローンを待機へ戻す
        for drone in state.drones.iter_mut().filter(|d| d.is_auto()) {
            if drone.status == DroneStatus::Scanning
                && state.missions.active(drone.current_mission.as_deref()).is_none()
            {
                drone.status = DroneStatus::Idle;
                drone.current_mission = None;
            }
        }

        let mut targets = self.select_scan_targets(&state.coverage, rng);
        if targets.is_empty() {
            return 0;
        }
        targets.shuffle(rng);

        let existing: Vec<Position3D> = state
            .missions
            .active_of_type(MissionType::Scan)
            .map(|m| m.target)
            .collect();
        let mut claimed: Vec<Position3D> = Vec::new();
        let tick = state.tick;
        let mut assigned = 0;

        for drone_index in 0..state.drones.len() {
            if targets.is_empty() {
                break;
            }

            let drone = &state.drones[drone_index];
            let eligible = drone.is_auto()
                && drone.kind == DroneKind::Scout
                && drone.status == DroneStatus::Idle
                && drone.battery > self.dispatch.scan_min_battery;
            if !eligible {
                continue;
            }

            let pool: Vec<usize> = if targets.len() > self.dispatch.candidate_sample_size {
                index::sample(rng, targets.len(), self.dispatch.candidate_sample_size).into_vec()
            } else {
                (0..targets.len()).collect()
            };

            let position = drone.position;
            let Some(best) = pool.into_iter().min_by(|&a, &b| {
                let cost_a = self.scan_cost(&position, &targets[a], &existing, &claimed);
                let cost_b = self.scan_cost(&position, &targets[b], &existing, &claimed);
                cost_a.total_cmp(&cost_b)
            }) else {
                continue;
            };

            let target = targets.remove(best);
            claimed.push(target);

            let drone_id = drone.id.clone();
            let mission = Mission::new(
                format!("explore_{}_{}", drone_id, tick),
                drone_id.clone(),
                MissionType::Scan,
                target,
                tick,
            );
            self.assign_mission(state, drone_index, mission, DroneStatus::Scanning);
            assigned += 1;

            debug!("探索割り当て: {} -> ({:.0}, {:.0})", drone_id, target.x, target.y);
        }

        if assigned > 0 {
            info!("探索ミッション割り当て: {}件 (ティック {})", assigned, tick);
        }
        assigned
    }

    /// 探索目標の候補を選びます
    ///
    /// 未走査 → 1回走査 → 2回走査の順に最初に空でない階層を使い、
    /// すべて三重走査済みの場合は走査済みセルから一部をランダムに巡回対象とします。
    fn select_scan_targets<R: Rng>(&self, grid: &CoverageGrid, rng: &mut R) -> Vec<Position3D> {
        let tiers = grid.tiers();

        let cells = if !tiers.unexplored.is_empty() {
            tiers.unexplored
        } else if !tiers.partial.is_empty() {
            tiers.partial
        } else if !tiers.almost.is_empty() {
            tiers.almost
        } else {
            let scanned = grid.scanned_cells();
            let count = ((scanned.len() as f64 * self.dispatch.patrol_ratio) as usize).max(1);
            scanned.choose_multiple(rng, count).copied().collect()
        };

        cells
            .into_iter()
            .map(|cell| grid.cell_center(cell, self.altitude))
            .collect()
    }

    /// 探索目標のコスト（距離 + 他機の目標からの反発）
    fn scan_cost(
        &self,
        position: &Position3D,
        target: &Position3D,
        existing: &[Position3D],
        claimed: &[Position3D],
    ) -> f64 {
        let repulsion: f64 = existing
            .iter()
            .chain(claimed.iter())
            .map(|other| self.dispatch.repulsion_strength / target.distance_sq_xy(other).max(1.0))
            .sum();
        position.distance_xy(target) + repulsion
    }

    /// 救助ミッションを割り当てます
    ///
    /// 高信頼度の未救助生存者を検知順に処理し、最寄りの利用可能ドローンを派遣します。
    /// 割り当てた時点で生存者は救助済みとなります。
    pub fn dispatch_rescue(&self, state: &mut FleetState) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let tick = state.tick;

        let survivors: Vec<usize> = state
            .survivors
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.rescued && s.confidence > self.dispatch.rescue_confidence)
            .map(|(i, _)| i)
            .collect();

        let mut available: Vec<usize> = state
            .drones
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                d.is_auto()
                    && matches!(d.status, DroneStatus::Idle | DroneStatus::Scanning)
                    && d.battery > self.dispatch.rescue_min_battery
            })
            .map(|(i, _)| i)
            .collect();

        let limit = available.len();
        for survivor_index in survivors.into_iter().take(limit) {
            let survivor_position = state.survivors[survivor_index].position;
            let candidates: Vec<_> = available.iter().map(|&i| &state.drones[i]).collect();
            let Some(pick) = nearest_index(&candidates, &survivor_position) else {
                break;
            };
            let drone_index = available.remove(pick);
            let drone_id = state.drones[drone_index].id.clone();

            let survivor = &mut state.survivors[survivor_index];
            survivor.rescued = true;
            let survivor_id = survivor.id.clone();

            let mission = Mission::new(
                format!("rescue_{}", survivor_id),
                drone_id.clone(),
                MissionType::Rescue,
                survivor_position,
                tick,
            )
            .with_survivor(survivor_id.clone());
            self.assign_mission(state, drone_index, mission, DroneStatus::Responding);

            info!(
                "救助派遣: {} -> {} ({:.0}, {:.0})",
                drone_id, survivor_id, survivor_position.x, survivor_position.y
            );

            alerts.push(Alert::new(
                AlertType::RescueNeeded,
                format!("{} を生存者 {} の救助に派遣", drone_id, survivor_id),
                json!({
                    "survivor_id": survivor_id,
                    "drone_id": drone_id,
                    "location": { "x": survivor_position.x, "y": survivor_position.y },
                }),
                tick,
            ));
        }

        alerts
    }

    /// バッテリー低下機を基地へ帰還させます
    pub fn coordinate_fleet(&self, state: &mut FleetState) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let tick = state.tick;

        for drone_index in 0..state.drones.len() {
            let drone = &state.drones[drone_index];
            if !drone.is_auto()
                || drone.status == DroneStatus::Returning
                || drone.battery >= self.dispatch.low_battery_threshold
            {
                continue;
            }

            let drone_id = drone.id.clone();
            let battery = drone.battery;
            let mission = Mission::new(
                format!("return_{}_{}", drone_id, tick),
                drone_id.clone(),
                MissionType::Return,
                self.base,
                tick,
            );
            self.assign_mission(state, drone_index, mission, DroneStatus::Returning);

            warn!("バッテリー低下: {} ({:.1}%) 基地へ帰還", drone_id, battery * 100.0);

            alerts.push(Alert::new(
                AlertType::DroneLowBattery,
                format!("{} のバッテリー残量 {:.0}%、基地へ帰還", drone_id, battery * 100.0),
                json!({ "drone_id": drone_id, "battery": battery }),
                tick,
            ));
        }

        alerts
    }

    /// 中継機設置ミッションを割り当てます
    ///
    /// 既存の稼働中継機から東西南北へ `expansion_distance_m` 離れた地点のうち、
    /// 領域内・未カバー・走査済みで、かつ近くに設置ミッションが無いものを候補とします。
    /// 戻り値は割り当てた件数です。
    pub fn dispatch_relays(&self, state: &mut FleetState) -> usize {
        let distance = self.relay.expansion_distance_m;
        let offsets = [(0.0, distance), (0.0, -distance), (distance, 0.0), (-distance, 0.0)];

        let mut candidates = Vec::new();
        for relay in state.relays.iter().filter(|r| r.is_active()) {
            for (dx, dy) in offsets {
                let point = Position3D::new(
                    relay.position.x + dx,
                    relay.position.y + dy,
                    self.altitude,
                );
                if !(0.0..self.extent).contains(&point.x)
                    || !(0.0..self.extent).contains(&point.y)
                {
                    continue;
                }
                if state.relays.iter().any(|r| r.covers(&point, self.relay.coverage_ratio)) {
                    continue;
                }
                if state.coverage.coverage_level(state.coverage.cell_of(&point)) == 0 {
                    continue;
                }
                candidates.push(point);
            }
        }
        if candidates.is_empty() {
            return 0;
        }

        let heavies: Vec<usize> = state
            .drones
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                d.is_auto()
                    && d.kind == DroneKind::Heavy
                    && d.status == DroneStatus::Idle
                    && d.battery > self.relay.min_battery
            })
            .map(|(i, _)| i)
            .collect();
        let mut heavies = heavies.into_iter();

        let tick = state.tick;
        let mut assigned = 0;
        for point in candidates {
            let duplicate = state
                .missions
                .active_of_type(MissionType::DeployRelay)
                .any(|m| m.target.distance_xy(&point) < self.relay.duplicate_radius_m);
            if duplicate {
                continue;
            }

            let Some(drone_index) = heavies.next() else {
                break;
            };
            let drone_id = state.drones[drone_index].id.clone();
            let mission = Mission::new(
                format!("deploy_{}_{}", drone_id, tick),
                drone_id.clone(),
                MissionType::DeployRelay,
                point,
                tick,
            );
            self.assign_mission(state, drone_index, mission, DroneStatus::Scanning);
            assigned += 1;

            info!("中継機設置派遣: {} -> ({:.0}, {:.0})", drone_id, point.x, point.y);
        }

        assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MissionStatus, SurvivorLocation};
    use crate::pathfinding::GridPathfinder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn setup() -> (ScenarioConfig, MissionDispatcher, FleetState, ChaCha8Rng) {
        let config = ScenarioConfig::default();
        let dispatcher =
            MissionDispatcher::new(&config, Box::new(GridPathfinder::from_world(&config.world)));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let state = FleetState::new(&config, &mut rng);
        (config, dispatcher, state, rng)
    }

    fn survivor(id: &str, x: f64, y: f64, confidence: f64) -> SurvivorLocation {
        SurvivorLocation {
            id: id.to_string(),
            position: Position3D::new(x, y, 20.0),
            confidence,
            detected_by: "drone_alpha".to_string(),
            rescued: false,
            timestamp: 0,
        }
    }

    fn assert_single_active_missions(state: &FleetState) {
        for drone in &state.drones {
            assert!(state.missions.active_count_for(&drone.id) <= 1, "{}", drone.id);
        }
    }

    #[test]
    fn test_initial_scan_dispatch_assigns_distinct_unexplored_targets() {
        let (_, dispatcher, mut state, mut rng) = setup();

        let assigned = dispatcher.dispatch_scan(&mut state, &mut rng);
        assert_eq!(assigned, 8);

        let targets: Vec<_> = state
            .missions
            .active_of_type(MissionType::Scan)
            .map(|m| state.coverage.cell_of(&m.target))
            .collect();
        let distinct: HashSet<_> = targets.iter().copied().collect();
        assert_eq!(distinct.len(), 8);
        for cell in &targets {
            assert_eq!(state.coverage.coverage_level(*cell), 0);
        }

        for drone in state.drones.iter().filter(|d| d.kind == DroneKind::Scout) {
            assert_eq!(drone.status, DroneStatus::Scanning);
            assert!(drone.current_mission.is_some());
            assert!(drone.has_remaining_waypoints());
        }
        assert_single_active_missions(&state);
    }

    #[test]
    fn test_scan_dispatch_sends_heavy_drones_to_relay_points() {
        let (_, dispatcher, mut state, mut rng) = setup();

        // 初期中継機 (500, 500) の北 (500, 2500) と東 (2500, 500) は走査済み
        state.coverage.scan((1, 5), "drone_alpha");
        state.coverage.scan((5, 1), "drone_alpha");

        dispatcher.dispatch_scan(&mut state, &mut rng);

        let deploys: Vec<_> = state.missions.active_of_type(MissionType::DeployRelay).collect();
        assert_eq!(deploys.len(), 2);
        assert_eq!(deploys[0].drone_id, "drone_iota");
        assert_eq!(deploys[0].target, Position3D::new(500.0, 2500.0, 20.0));
        assert_eq!(deploys[1].drone_id, "drone_kappa");
        assert_eq!(deploys[1].target, Position3D::new(2500.0, 500.0, 20.0));

        let iota = state.drone("drone_iota").unwrap();
        assert_eq!(iota.status, DroneStatus::Scanning);
        assert_eq!(iota.waypoints.last(), Some(&Position3D::new(500.0, 2500.0, 20.0)));
    }

    #[test]
    fn test_relay_dispatch_skips_unscanned_and_duplicate_points() {
        let (_, dispatcher, mut state, _) = setup();

        assert_eq!(dispatcher.dispatch_relays(&mut state), 0);

        state.coverage.scan((1, 5), "drone_alpha");
        assert_eq!(dispatcher.dispatch_relays(&mut state), 1);

        // 同じ地点へは再派遣しない
        assert_eq!(dispatcher.dispatch_relays(&mut state), 0);
    }

    #[test]
    fn test_scan_dispatch_resets_orphaned_scanning_drones() {
        let (_, dispatcher, mut state, mut rng) = setup();
        let drone = state.drone_mut("drone_alpha").unwrap();
        drone.status = DroneStatus::Scanning;
        drone.current_mission = Some("gone".to_string());

        dispatcher.dispatch_scan(&mut state, &mut rng);

        let drone = state.drone("drone_alpha").unwrap();
        assert_eq!(drone.status, DroneStatus::Scanning);
        assert!(drone.current_mission.as_deref().is_some_and(|id| id.starts_with("explore_")));
    }

    #[test]
    fn test_scan_dispatch_skips_low_battery_and_manual() {
        let (_, dispatcher, mut state, mut rng) = setup();
        state.drone_mut("drone_alpha").unwrap().battery = 0.2;
        state.drone_mut("drone_beta").unwrap().control_mode = crate::models::ControlMode::Manual;

        assert_eq!(dispatcher.dispatch_scan(&mut state, &mut rng), 6);
        assert_eq!(state.drone("drone_alpha").unwrap().status, DroneStatus::Idle);
        assert_eq!(state.drone("drone_beta").unwrap().status, DroneStatus::Idle);
    }

    #[test]
    fn test_scan_target_repelled_by_existing_mission() {
        let (_, dispatcher, mut state, mut rng) = setup();
        let near = (6, 1);
        let far = (29, 29);
        for cx in 0..30 {
            for cy in 0..30 {
                if (cx, cy) != near && (cx, cy) != far {
                    state.coverage.scan((cx, cy), "base");
                }
            }
        }
        for drone in state.drones.iter_mut().filter(|d| d.id != "drone_alpha") {
            drone.control_mode = crate::models::ControlMode::Manual;
        }

        // 近いセルには既に別機の探索ミッションがある
        let near_center = state.coverage.cell_center(near, 20.0);
        state.missions.push(Mission::new(
            "explore_drone_beta_0".to_string(),
            "drone_beta".to_string(),
            MissionType::Scan,
            near_center,
            0,
        ));

        assert_eq!(dispatcher.dispatch_scan(&mut state, &mut rng), 1);

        let alpha = state.drone("drone_alpha").unwrap();
        let mission = state.missions.active(alpha.current_mission.as_deref()).unwrap();
        assert_eq!(state.coverage.cell_of(&mission.target), far);
    }

    #[test]
    fn test_scan_target_nearest_without_repulsion() {
        let (_, dispatcher, mut state, mut rng) = setup();
        let near = (6, 1);
        let far = (29, 29);
        for cx in 0..30 {
            for cy in 0..30 {
                if (cx, cy) != near && (cx, cy) != far {
                    state.coverage.scan((cx, cy), "base");
                }
            }
        }
        for drone in state.drones.iter_mut().filter(|d| d.id != "drone_alpha") {
            drone.control_mode = crate::models::ControlMode::Manual;
        }

        assert_eq!(dispatcher.dispatch_scan(&mut state, &mut rng), 1);

        let alpha = state.drone("drone_alpha").unwrap();
        let mission = state.missions.active(alpha.current_mission.as_deref()).unwrap();
        assert_eq!(state.coverage.cell_of(&mission.target), near);
    }

    #[test]
    fn test_scan_candidates_subsampled_when_pool_is_large() {
        let mut config = ScenarioConfig::default();
        config.dispatch.candidate_sample_size = 1;
        let dispatcher =
            MissionDispatcher::new(&config, Box::new(GridPathfinder::from_world(&config.world)));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut state = FleetState::new(&config, &mut rng);

        assert_eq!(dispatcher.dispatch_scan(&mut state, &mut rng), 8);

        let mut cells = HashSet::new();
        let mut farthest: f64 = 0.0;
        for mission in state.missions.active_of_type(MissionType::Scan) {
            let cell = state.coverage.cell_of(&mission.target);
            assert_eq!(state.coverage.coverage_level(cell), 0);
            assert!(cells.insert(cell));
            let drone = state.drone(&mission.drone_id).unwrap();
            farthest = farthest.max(drone.position.distance_xy(&mission.target));
        }
        // 候補1件のランダム抽出なので、基地近傍の最寄りセルだけに偏らない
        assert!(farthest > 4000.0, "farthest {}", farthest);
    }

    #[test]
    fn test_patrol_targets_when_fully_covered() {
        let (_, dispatcher, mut state, mut rng) = setup();
        for id in ["a", "b", "c"] {
            for cx in 0..30 {
                for cy in 0..30 {
                    state.coverage.scan((cx, cy), id);
                }
            }
        }

        let targets = dispatcher.select_scan_targets(&state.coverage, &mut rng);
        assert_eq!(targets.len(), 135);
    }

    #[test]
    fn test_rescue_dispatch_picks_nearest_and_marks_rescued() {
        let (_, dispatcher, mut state, _) = setup();
        state.drone_mut("drone_alpha").unwrap().position = Position3D::new(5000.0, 5000.0, 20.0);
        state.survivors.push(survivor("s1", 5200.0, 5100.0, 0.9));
        state.survivors.push(survivor("s2", 3000.0, 3000.0, 0.7));

        let alerts = dispatcher.dispatch_rescue(&mut state);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RescueNeeded);
        assert_eq!(alerts[0].payload["drone_id"], "drone_alpha");
        assert_eq!(alerts[0].payload["survivor_id"], "s1");
        assert_eq!(alerts[0].payload["location"]["x"], 5200.0);

        assert!(state.survivors[0].rescued);
        assert!(!state.survivors[1].rescued);

        let drone = state.drone("drone_alpha").unwrap();
        assert_eq!(drone.status, DroneStatus::Responding);
        assert_eq!(drone.current_mission.as_deref(), Some("rescue_s1"));
        assert_eq!(drone.waypoints.last(), Some(&Position3D::new(5200.0, 5100.0, 20.0)));

        let mission = state.missions.get("rescue_s1").unwrap();
        assert_eq!(mission.survivor_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_rescue_dispatch_supersedes_scan_mission() {
        let (_, dispatcher, mut state, mut rng) = setup();
        dispatcher.dispatch_scan(&mut state, &mut rng);
        let previous = state.drone("drone_alpha").unwrap().current_mission.clone().unwrap();

        let alpha = state.drone("drone_alpha").unwrap().position;
        state.survivors.push(survivor("s1", alpha.x, alpha.y, 0.95));
        dispatcher.dispatch_rescue(&mut state);

        assert_eq!(state.missions.get(&previous).map(|m| m.status), Some(MissionStatus::Failed));
        assert_single_active_missions(&state);
    }

    #[test]
    fn test_rescue_dispatch_limited_by_available_drones() {
        let (_, dispatcher, mut state, _) = setup();
        for drone in state.drones.iter_mut().skip(1) {
            drone.status = DroneStatus::Returning;
        }
        state.survivors.push(survivor("s1", 4000.0, 4000.0, 0.9));
        state.survivors.push(survivor("s2", 600.0, 600.0, 0.9));

        let alerts = dispatcher.dispatch_rescue(&mut state);

        assert_eq!(alerts.len(), 1);
        assert!(state.survivors[0].rescued);
        assert!(!state.survivors[1].rescued);
    }

    #[test]
    fn test_coordinate_returns_low_battery_drones() {
        let (_, dispatcher, mut state, _) = setup();
        state.drones[0].battery = 0.2;
        state.drones[1].battery = 0.1;
        state.drones[1].status = DroneStatus::Returning;
        state.drones[2].battery = 0.1;
        state.drones[2].control_mode = crate::models::ControlMode::Manual;

        let alerts = dispatcher.coordinate_fleet(&mut state);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::DroneLowBattery);
        assert_eq!(alerts[0].payload["drone_id"], "drone_alpha");

        let drone = &state.drones[0];
        assert_eq!(drone.status, DroneStatus::Returning);
        assert_eq!(drone.waypoints.last(), Some(&dispatcher.base()));
        let mission_id = drone.current_mission.clone().unwrap();
        assert_eq!(
            state.missions.get(&mission_id).map(|m| m.mission_type),
            Some(MissionType::Return)
        );

        // 帰還中のドローンには再度割り当てない
        assert!(dispatcher.coordinate_fleet(&mut state).is_empty());
    }
}
