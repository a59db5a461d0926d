//! # Detection モジュール
//!
//! 探索中のドローンによる生存者検知を確率的に模擬します。

use rand::Rng;
use tracing::{info, trace};

use crate::models::{
    Alert, AlertType, DroneStatus, Position3D, SurvivorLocation, apply_retention,
};
use crate::scenario::{DetectionConfig, ScenarioConfig};
use crate::state::FleetState;

/// 生存者検知シミュレーター
pub struct DetectionSimulator {
    config: DetectionConfig,
    extent: f64,
}

impl DetectionSimulator {
    pub fn new(config: &ScenarioConfig) -> Self {
        Self {
            config: config.detection.clone(),
            extent: config.world.extent(),
        }
    }

    /// 探索中の各ドローンについて1回ずつ検知判定を行います
    ///
    /// 検知に成功すると、ドローン位置の周辺に生存者を生成して
    /// `SURVIVOR_DETECTED` アラートを発行します。最後に保持ポリシーを適用します。
    ///
    /// # 戻り値
    ///
    /// 生成したアラートのリスト
    pub fn detect<R: Rng>(&self, state: &mut FleetState, rng: &mut R) -> Vec<Alert> {
        let scanning: Vec<(String, Position3D)> = state
            .drones
            .iter()
            .filter(|d| d.status == DroneStatus::Scanning)
            .map(|d| (d.id.clone(), d.position))
            .collect();

        let mut alerts = Vec::new();
        let jitter = self.config.jitter_m;

        for (drone_id, position) in scanning {
            if !rng.gen_bool(self.config.probability) {
                continue;
            }

            let offset_x = rng.gen_range(-jitter..=jitter);
            let offset_y = rng.gen_range(-jitter..=jitter);
            let confidence = rng.gen_range(self.config.confidence_min..=self.config.confidence_max);

            let survivor = SurvivorLocation {
                id: state.next_survivor_id(),
                position: position
                    .with_xy(position.x + offset_x, position.y + offset_y)
                    .clamp_to_world(self.extent),
                confidence,
                detected_by: drone_id.clone(),
                rescued: false,
                timestamp: state.tick,
            };

            info!(
                "生存者検知: {} by {} ({:.0}, {:.0}) 信頼度 {:.0}%",
                survivor.id,
                drone_id,
                survivor.position.x,
                survivor.position.y,
                confidence * 100.0
            );

            alerts.push(Alert::new(
                AlertType::SurvivorDetected,
                format!("{} が生存者を検知 (信頼度 {:.0}%)", drone_id, confidence * 100.0),
                serde_json::to_value(&survivor).unwrap_or_default(),
                state.tick,
            ));
            state.survivors.push(survivor);
        }

        let removed = apply_retention(
            &mut state.survivors,
            self.config.rescued_retention,
            self.config.max_survivors,
        );
        if removed > 0 {
            trace!("生存者リストから{}件を削除", removed);
        }

        alerts
    }
}
