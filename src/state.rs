//! # State モジュール
//!
//! 1セッション分のフリート全体の状態を保持します。
//!
//! ドローン編成・ミッション一覧・生存者リスト・中継機・被覆グリッドは、ティックの
//! 処理中はパイプラインが排他的に所有し、外部へはスナップショットとしてのみ渡します。

use rand::Rng;

use crate::coverage::CoverageGrid;
use crate::models::{
    CommRelay, Drone, HeatSignature, MissionBoard, Position3D, SurvivorLocation, Tick,
    create_roster, generate_heat_signatures,
};
use crate::scenario::ScenarioConfig;

/// フリート全体の状態
#[derive(Debug, Clone)]
pub struct FleetState {
    pub tick: Tick,
    pub drones: Vec<Drone>,
    pub missions: MissionBoard,
    pub survivors: Vec<SurvivorLocation>,
    pub relays: Vec<CommRelay>,
    pub coverage: CoverageGrid,
    pub heat_signatures: Vec<HeatSignature>,
    survivor_seq: u64,
    relay_seq: u64,
}

impl FleetState {
    /// 設定から初期状態を構築します
    ///
    /// 基地に初期中継機を1基置き、基地周辺のセルを走査済みにします。
    pub fn new<R: Rng>(config: &ScenarioConfig, rng: &mut R) -> Self {
        let mut state = Self::empty(config);
        state.drones = create_roster(&config.fleet, &config.world);
        state.heat_signatures = generate_heat_signatures(&config.fleet, &config.world, rng);

        let base = Position3D::new(
            config.world.base.x_m,
            config.world.base.y_m,
            config.world.altitude_m,
        );
        let relay_id = state.next_relay_id();
        state
            .relays
            .push(CommRelay::new(relay_id, base, config.relay.initial_radius_m));

        state
    }

    /// ドローン・中継機・熱源を持たない状態（被覆グリッドのみ初期化済み）
    pub fn empty(config: &ScenarioConfig) -> Self {
        Self {
            tick: 0,
            drones: Vec::new(),
            missions: MissionBoard::new(),
            survivors: Vec::new(),
            relays: Vec::new(),
            coverage: CoverageGrid::from_world(&config.world),
            heat_signatures: Vec::new(),
            survivor_seq: 0,
            relay_seq: 0,
        }
    }

    pub fn drone(&self, drone_id: &str) -> Option<&Drone> {
        self.drones.iter().find(|d| d.id == drone_id)
    }

    pub fn drone_mut(&mut self, drone_id: &str) -> Option<&mut Drone> {
        self.drones.iter_mut().find(|d| d.id == drone_id)
    }

    pub fn survivor_mut(&mut self, survivor_id: &str) -> Option<&mut SurvivorLocation> {
        self.survivors.iter_mut().find(|s| s.id == survivor_id)
    }

    pub fn next_survivor_id(&mut self) -> String {
        self.survivor_seq += 1;
        format!("survivor_{:05}", self.survivor_seq)
    }

    pub fn next_relay_id(&mut self) -> String {
        self.relay_seq += 1;
        format!("relay_{:03}", self.relay_seq)
    }

    /// 未救助の生存者数
    pub fn unrescued_count(&self) -> usize {
        self.survivors.iter().filter(|s| !s.rescued).count()
    }
}
