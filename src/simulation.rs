//! # Simulation モジュール
//!
//! 捜索救助フリートのシミュレーションエンジンを提供します。
//!
//! このモジュールは固定間隔のティックループを管理し、各ティックで
//! フリート調整パイプラインを1周実行します。パイプラインの状態遷移は
//! [`PipelineStage`] と [`FleetAction`] による型付きの遷移として表現されます。
//!
//! ## パイプライン
//!
//! ```text
//! ANALYZE → {DISPATCH_SCAN | DISPATCH_RESCUE | COORDINATE | SKIP} → MOVE → DETECT → ANALYZE
//! ```
//!
//! 1. **ANALYZE**: ティックを進め、状況を評価して分岐を決定
//! 2. **DISPATCH_* / COORDINATE**: ミッション割り当て（SKIPは何もしない）
//! 3. **MOVE**: 手動コマンド適用、移動、ミッション完了判定、被覆更新
//! 4. **DETECT**: 生存者の確率的検知
//!
//! ## 使用例
//!
//! ```ignore
//! let config = ScenarioConfig::from_file("scenarios/search_and_rescue.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1)?;
//!
//! let report = engine.step();
//! for event in engine.tick_events(report) {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::detection::DetectionSimulator;
use crate::dispatcher::MissionDispatcher;
use crate::events::{CommandInbox, InboundMessage, SimEvent};
use crate::models::{Alert, AlertType, DroneStatus, Tick};
use crate::movement::MovementIntegrator;
use crate::pathfinding::GridPathfinder;
use crate::scenario::{DispatchConfig, ScenarioConfig, ScenarioError};
use crate::state::FleetState;

/// ANALYZEステージが選択する分岐
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FleetAction {
    DispatchScan,
    DispatchRescue,
    Coordinate,
    Skip,
}

/// パイプラインのステージ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Analyze,
    DispatchScan,
    DispatchRescue,
    Coordinate,
    Skip,
    Move,
    Detect,
}

impl From<FleetAction> for PipelineStage {
    fn from(action: FleetAction) -> Self {
        match action {
            FleetAction::DispatchScan => PipelineStage::DispatchScan,
            FleetAction::DispatchRescue => PipelineStage::DispatchRescue,
            FleetAction::Coordinate => PipelineStage::Coordinate,
            FleetAction::Skip => PipelineStage::Skip,
        }
    }
}

/// 状況を評価して分岐を決定します
///
/// 優先順位: バッテリー低下 → 高信頼度の未救助生存者 → 待機中の自動制御機 → なし
pub fn decide_action(state: &FleetState, dispatch: &DispatchConfig) -> FleetAction {
    let low_battery = state
        .drones
        .iter()
        .any(|d| d.battery < dispatch.low_battery_threshold);
    if low_battery {
        return FleetAction::Coordinate;
    }

    let rescue_needed = state
        .survivors
        .iter()
        .any(|s| !s.rescued && s.confidence > dispatch.rescue_confidence);
    if rescue_needed {
        return FleetAction::DispatchRescue;
    }

    let idle = state
        .drones
        .iter()
        .any(|d| d.is_auto() && d.status == DroneStatus::Idle);
    if idle {
        return FleetAction::DispatchScan;
    }

    FleetAction::Skip
}

/// 1ティックの処理結果
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: Tick,
    pub action: FleetAction,
    pub alerts: Vec<Alert>,
    pub coverage_changed: bool,
}

/// 実行結果の概要
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: Tick,
    pub coverage_ratio: f64,
    /// 全セルが三重走査済みか
    pub fully_covered: bool,
    pub survivors: usize,
    pub unrescued: usize,
    pub relays: usize,
}

/// シミュレーションエラー
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("シナリオ設定が不正です: {0}")]
    InvalidScenario(#[from] ScenarioError),
}

pub struct SimulationEngine {
    pub config: ScenarioConfig,
    pub verbose_level: u8,
    pub state: FleetState,

    inbox: CommandInbox,
    rng: ChaCha8Rng,
    dispatcher: MissionDispatcher,
    movement: MovementIntegrator,
    detection: DetectionSimulator,
}

impl SimulationEngine {
    /// シミュレーションエンジンを作成し、初期状態を構築します
    ///
    /// # 引数
    ///
    /// * `config` - シナリオ設定
    /// * `verbose_level` - 進行状況ログの詳細度（0: なし）
    pub fn new(config: ScenarioConfig, verbose_level: u8) -> Result<Self, SimulationError> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.sim.seed);
        let state = FleetState::new(&config, &mut rng);
        let planner = GridPathfinder::from_world(&config.world);

        let engine = Self {
            dispatcher: MissionDispatcher::new(&config, Box::new(planner)),
            movement: MovementIntegrator::new(&config),
            detection: DetectionSimulator::new(&config),
            inbox: CommandInbox::new(),
            rng,
            state,
            config,
            verbose_level,
        };

        if engine.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化:");
            info!("  ドローン: {}機", engine.state.drones.len());
            info!(
                "  グリッド: {}x{} (走査済み {}セル)",
                engine.state.coverage.size(),
                engine.state.coverage.size(),
                engine.state.coverage.scanned_cells().len()
            );
            info!("  中継機: {}基", engine.state.relays.len());
        }

        Ok(engine)
    }

    /// 初期状態に戻します（乱数生成器も再シード）
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.sim.seed);
        self.state = FleetState::new(&self.config, &mut self.rng);
        self.inbox.clear();
        info!("シミュレーションをリセット");
    }

    /// セッション開始時に送出するイベント
    pub fn session_start_events(&self, message: &str) -> Vec<SimEvent> {
        vec![
            SimEvent::InitialState {
                tick: self.state.tick,
                drones: self.state.drones.clone(),
                heat_signatures: self.state.heat_signatures.clone(),
                relays: self.state.relays.clone(),
                coverage: self.state.coverage.counts(),
            },
            SimEvent::Alert(Alert::new(
                AlertType::System,
                message.to_string(),
                json!({ "drones": self.state.drones.len() }),
                self.state.tick,
            )),
        ]
    }

    /// 受信メッセージを処理します
    ///
    /// 手動コマンドは次のMOVEステージまで保留し、リセットは即座に実行します。
    /// 戻り値は直ちに送出すべきイベントです。
    pub fn handle_inbound(&mut self, message: InboundMessage) -> Vec<SimEvent> {
        match message {
            InboundMessage::Manual(command) => {
                debug!("手動コマンド受信: {}", command.drone_id);
                self.inbox.submit(command);
                Vec::new()
            }
            InboundMessage::Reset => {
                self.reset();
                self.session_start_events("シミュレーションをリセットしました")
            }
        }
    }

    /// パイプラインを1周実行します
    pub fn step(&mut self) -> TickReport {
        let mut stage = PipelineStage::Analyze;
        let mut action = FleetAction::Skip;
        let mut alerts = Vec::new();
        let mut coverage_changed = false;

        loop {
            stage = match stage {
                PipelineStage::Analyze => {
                    action = self.analyze();
                    action.into()
                }
                PipelineStage::DispatchScan => {
                    self.dispatcher.dispatch_scan(&mut self.state, &mut self.rng);
                    PipelineStage::Move
                }
                PipelineStage::DispatchRescue => {
                    alerts.extend(self.dispatcher.dispatch_rescue(&mut self.state));
                    PipelineStage::Move
                }
                PipelineStage::Coordinate => {
                    alerts.extend(self.dispatcher.coordinate_fleet(&mut self.state));
                    PipelineStage::Move
                }
                PipelineStage::Skip => PipelineStage::Move,
                PipelineStage::Move => {
                    let outcome = self
                        .movement
                        .integrate(&mut self.state, &mut self.inbox, &mut self.rng);
                    alerts.extend(outcome.alerts);
                    coverage_changed = outcome.coverage_changed;
                    PipelineStage::Detect
                }
                PipelineStage::Detect => {
                    alerts.extend(self.detection.detect(&mut self.state, &mut self.rng));
                    break;
                }
            };
        }

        TickReport {
            tick: self.state.tick,
            action,
            alerts,
            coverage_changed,
        }
    }

    /// ANALYZEステージ
    fn analyze(&mut self) -> FleetAction {
        self.state.tick += 1;

        let purged = self
            .state
            .missions
            .purge_terminal(self.config.dispatch.completed_mission_retention);
        if purged > 0 {
            trace!("終了済みミッション{}件を削除", purged);
        }

        let action = decide_action(&self.state, &self.config.dispatch);
        if self.verbose_level > 2 {
            trace!("ティック {}: {:?}", self.state.tick, action);
        }
        action
    }

    /// ティックの処理結果から送出イベントを作成します
    pub fn tick_events(&self, report: TickReport) -> Vec<SimEvent> {
        let mut events = Vec::with_capacity(report.alerts.len() + 2);
        events.push(SimEvent::DroneUpdate {
            tick: report.tick,
            drones: self.state.drones.clone(),
        });
        if report.coverage_changed {
            events.push(SimEvent::ScanUpdate {
                tick: report.tick,
                cells: self.state.coverage.counts(),
            });
        }
        events.extend(report.alerts.into_iter().map(SimEvent::Alert));
        events
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.state.tick,
            coverage_ratio: self.state.coverage.coverage_ratio(),
            fully_covered: self.state.coverage.is_fully_covered(),
            survivors: self.state.survivors.len(),
            unrescued: self.state.unrescued_count(),
            relays: self.state.relays.len(),
        }
    }

    /// 固定間隔でシミュレーションを実行します
    ///
    /// 停止要求（`shutdown` がtrueになる、または送信側が破棄される）か、
    /// 設定された最大ティック数に達するまで継続します。停止要求はティックの間でのみ
    /// 確認されるため、途中まで処理されたティックが観測されることはありません。
    ///
    /// # 引数
    ///
    /// * `events` - 送出イベントの送信先
    /// * `inbound` - 手動コマンド・リセット要求の受信元
    /// * `shutdown` - 停止要求
    pub async fn run(
        &mut self,
        events: mpsc::UnboundedSender<SimEvent>,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> RunSummary {
        info!("=== シミュレーション実行開始 ===");

        let mut receiver_closed = false;
        let mut emit = |event: SimEvent| {
            if events.send(event).is_err() && !receiver_closed {
                warn!("イベントの送出先が閉じられました");
                receiver_closed = true;
            }
        };

        for event in self.session_start_events("シミュレーションを開始しました") {
            emit(event);
        }

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.sim.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Some(max_ticks) = self.config.sim.max_ticks {
                if self.state.tick >= max_ticks {
                    break;
                }
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("停止シグナルの送信側が破棄されました");
                        break;
                    }
                    continue;
                }
                _ = interval.tick() => {}
            }

            while let Ok(message) = inbound.try_recv() {
                for event in self.handle_inbound(message) {
                    emit(event);
                }
            }

            let report = self.step();
            let tick = report.tick;
            for event in self.tick_events(report) {
                emit(event);
            }

            if tick % 100 == 0 && self.verbose_level > 0 {
                info!(
                    "進行状況: ティック {} (走査率 {:.1}%, 未救助 {}名)",
                    tick,
                    self.state.coverage.coverage_ratio() * 100.0,
                    self.state.unrescued_count()
                );
            }
        }

        let summary = self.summary();
        info!("=== シミュレーション完了 ===");
        info!("総ティック数: {}", summary.ticks);
        info!("走査率: {:.1}%", summary.coverage_ratio * 100.0);
        if summary.fully_covered {
            info!("全域の三重走査が完了しています");
        }
        summary
    }
}
