use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::DroneKind;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default_search_and_rescue".to_string(),
            description: "10機のドローンによる30x30グリッドの捜索救助".to_string(),
        }
    }
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// ティック間隔（ミリ秒）
    pub tick_interval_ms: u64,
    pub seed: u64,
    /// 最大ティック数（未指定の場合は外部から停止されるまで継続）
    pub max_ticks: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            seed: 42,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Position2D {
    pub x_m: f64,
    pub y_m: f64,
}

/// 世界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    /// グリッドの一辺のセル数
    pub grid_size: usize,
    /// 1セルの一辺（world units）
    pub cell_size_m: f64,
    /// 固定飛行高度
    pub altitude_m: f64,
    /// 基地位置（帰還ミッションの目標）
    pub base: Position2D,
    /// 開始時に走査済みとする基地周辺の領域（一辺のセル数）
    pub prescanned_cells: usize,
}

impl WorldConfig {
    /// 世界の一辺の長さ
    pub fn extent(&self) -> f64 {
        self.grid_size as f64 * self.cell_size_m
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: 30,
            cell_size_m: 500.0,
            altitude_m: 20.0,
            base: Position2D { x_m: 500.0, y_m: 500.0 },
            prescanned_cells: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DroneConfig {
    pub id: String,
    pub name: String,
    pub kind: DroneKind,
}

/// フリート編成設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FleetConfig {
    pub drones: Vec<DroneConfig>,
    pub formation_columns: usize,
    pub formation_spacing_m: f64,
    pub heat_signature_count: usize,
    pub heat_signature_padding_m: f64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        let names = [
            "Alpha", "Beta", "Gamma", "Delta", "Epsilon",
            "Zeta", "Eta", "Theta", "Iota", "Kappa",
        ];
        let drones = names
            .iter()
            .enumerate()
            .map(|(i, name)| DroneConfig {
                id: format!("drone_{}", name.to_lowercase()),
                name: format!("D-{}", name),
                kind: if i >= 8 { DroneKind::Heavy } else { DroneKind::Scout },
            })
            .collect();

        Self {
            drones,
            formation_columns: 5,
            formation_spacing_m: 100.0,
            heat_signature_count: 15,
            heat_signature_padding_m: 1000.0,
        }
    }
}

/// 移動・衝突回避設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MovementConfig {
    /// 1ティックあたりの移動量
    pub speed_per_tick: f64,
    /// ウェイポイント到達判定距離
    pub waypoint_arrival_m: f64,
    /// ミッション目標到達判定距離
    pub mission_arrival_m: f64,
    /// 他機との最小安全距離
    pub min_separation_m: f64,
    /// 分離力の強さ（速度に対する比）
    pub separation_gain: f64,
    /// 分離力の上限（速度に対する比）
    pub separation_limit_ratio: f64,
    /// 完全に重なった場合のランダム反発（速度に対する比）
    pub coincident_jitter_ratio: f64,
    /// 移動1ティックあたりのバッテリー消費
    pub battery_drain_per_tick: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed_per_tick: 500.0,
            waypoint_arrival_m: 50.0,
            mission_arrival_m: 100.0,
            min_separation_m: 800.0,
            separation_gain: 0.5,
            separation_limit_ratio: 0.3,
            coincident_jitter_ratio: 0.3,
            battery_drain_per_tick: 0.0005,
        }
    }
}

/// 被覆グリッド設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// 走査半径（セル数）
    pub scan_radius_cells: usize,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self { scan_radius_cells: 2 }
    }
}

/// ミッション割り当て設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub scan_min_battery: f64,
    pub rescue_min_battery: f64,
    pub low_battery_threshold: f64,
    pub rescue_confidence: f64,
    /// 候補目標が多い場合に評価するランダム標本数
    pub candidate_sample_size: usize,
    /// 既存目標からの反発ペナルティ係数
    pub repulsion_strength: f64,
    /// 全域走査完了後の巡回目標の割合
    pub patrol_ratio: f64,
    /// 保持する終端ミッション数
    pub completed_mission_retention: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            scan_min_battery: 0.20,
            rescue_min_battery: 0.30,
            low_battery_threshold: 0.25,
            rescue_confidence: 0.8,
            candidate_sample_size: 50,
            repulsion_strength: 2.0e7,
            patrol_ratio: 0.15,
            completed_mission_retention: 50,
        }
    }
}

/// 中継機設置設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub initial_radius_m: f64,
    pub expansion_distance_m: f64,
    pub coverage_ratio: f64,
    pub duplicate_radius_m: f64,
    pub min_battery: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            initial_radius_m: 2000.0,
            expansion_distance_m: 2000.0,
            coverage_ratio: 0.9,
            duplicate_radius_m: 1000.0,
            min_battery: 0.4,
        }
    }
}

/// 生存者検知設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// 走査中ドローン1機・1ティックあたりの検知確率
    pub probability: f64,
    /// 検知位置のばらつき（各軸 ±jitter_m）
    pub jitter_m: f64,
    pub confidence_min: f64,
    pub confidence_max: f64,
    pub rescued_retention: usize,
    pub max_survivors: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            probability: 0.005,
            jitter_m: 300.0,
            confidence_min: 0.65,
            confidence_max: 0.98,
            rescued_retention: 20,
            max_survivors: 200,
        }
    }
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    pub fleet: FleetConfig,
    pub movement: MovementConfig,
    pub coverage: CoverageConfig,
    pub dispatch: DispatchConfig,
    pub relay: RelayConfig,
    pub detection: DetectionConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config = Self::from_yaml_str(&contents)
            .map_err(|e| match e {
                ScenarioError::ParseError(_, err) => {
                    ScenarioError::ParseError(path.to_path_buf(), err)
                }
                other => other,
            })?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(PathBuf::from("<inline>"), e))?;

        config.validate()?;

        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sim.tick_interval_ms == 0 {
            return Err(ScenarioError::ValidationError(
                "tick_interval_ms must be positive".to_string(),
            ));
        }

        if self.world.grid_size == 0 || self.world.cell_size_m <= 0.0 {
            return Err(ScenarioError::ValidationError("Invalid grid dimensions".to_string()));
        }

        // 基地位置の検証
        let base = &self.world.base;
        if !self.is_position_in_bounds(base.x_m, base.y_m) {
            return Err(ScenarioError::ValidationError("Base outside world bounds".to_string()));
        }

        if self.world.prescanned_cells > self.world.grid_size {
            return Err(ScenarioError::ValidationError(
                "prescanned_cells exceeds grid_size".to_string(),
            ));
        }

        if self.fleet.drones.is_empty() {
            return Err(ScenarioError::ValidationError("Fleet roster is empty".to_string()));
        }

        // ドローンIDの重複チェック
        let mut ids: Vec<&str> = self.fleet.drones.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ScenarioError::ValidationError(format!("Duplicate drone id {}", pair[0])));
        }

        if self.movement.speed_per_tick <= 0.0 {
            return Err(ScenarioError::ValidationError(
                "speed_per_tick must be positive".to_string(),
            ));
        }

        for (name, value) in [
            ("scan_min_battery", self.dispatch.scan_min_battery),
            ("rescue_min_battery", self.dispatch.rescue_min_battery),
            ("low_battery_threshold", self.dispatch.low_battery_threshold),
            ("rescue_confidence", self.dispatch.rescue_confidence),
            ("patrol_ratio", self.dispatch.patrol_ratio),
            ("relay.min_battery", self.relay.min_battery),
            ("detection.probability", self.detection.probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScenarioError::ValidationError(format!(
                    "{} must be within [0, 1]",
                    name
                )));
            }
        }

        // 乱数の範囲や距離として使う値は負を許さない（NaNも弾く）
        let movement = &self.movement;
        for (name, value) in [
            ("waypoint_arrival_m", movement.waypoint_arrival_m),
            ("mission_arrival_m", movement.mission_arrival_m),
            ("min_separation_m", movement.min_separation_m),
            ("separation_gain", movement.separation_gain),
            ("separation_limit_ratio", movement.separation_limit_ratio),
            ("coincident_jitter_ratio", movement.coincident_jitter_ratio),
            ("battery_drain_per_tick", movement.battery_drain_per_tick),
            ("repulsion_strength", self.dispatch.repulsion_strength),
            ("formation_spacing_m", self.fleet.formation_spacing_m),
            ("relay.initial_radius_m", self.relay.initial_radius_m),
            ("relay.expansion_distance_m", self.relay.expansion_distance_m),
            ("relay.coverage_ratio", self.relay.coverage_ratio),
            ("relay.duplicate_radius_m", self.relay.duplicate_radius_m),
            ("detection.jitter_m", self.detection.jitter_m),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ScenarioError::ValidationError(format!(
                    "{} must not be negative",
                    name
                )));
            }
        }

        if self.dispatch.candidate_sample_size == 0 {
            return Err(ScenarioError::ValidationError(
                "candidate_sample_size must be positive".to_string(),
            ));
        }

        let detection = &self.detection;
        if detection.confidence_min > detection.confidence_max
            || detection.confidence_min < 0.0
            || detection.confidence_max > 1.0
        {
            return Err(ScenarioError::ValidationError("Invalid confidence band".to_string()));
        }

        if self.fleet.heat_signature_padding_m * 2.0 > self.world.extent() {
            return Err(ScenarioError::ValidationError(
                "heat_signature_padding_m too large".to_string(),
            ));
        }

        Ok(())
    }

    /// 位置が領域内かどうかをチェック
    fn is_position_in_bounds(&self, x: f64, y: f64) -> bool {
        let extent = self.world.extent();
        x >= 0.0 && x <= extent && y >= 0.0 && y <= extent
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("ティック間隔: {}ミリ秒", self.sim.tick_interval_ms);
        match self.sim.max_ticks {
            Some(max) => println!("最大ティック数: {}", max),
            None => println!("最大ティック数: 無制限"),
        }
        println!("シード値: {}", self.sim.seed);
        println!();

        println!("=== 世界 ===");
        println!(
            "グリッド: {}x{} (セル {:.0}, 一辺 {:.0})",
            self.world.grid_size,
            self.world.grid_size,
            self.world.cell_size_m,
            self.world.extent()
        );
        println!("基地: ({:.0}, {:.0})", self.world.base.x_m, self.world.base.y_m);
        println!();

        println!("=== フリート ===");
        println!("ドローン: {}機", self.fleet.drones.len());
        let heavy = self.fleet.drones.iter().filter(|d| d.kind == DroneKind::Heavy).count();
        println!("  偵察機: {}機", self.fleet.drones.len() - heavy);
        println!("  重量機: {}機", heavy);
        for drone in &self.fleet.drones {
            println!("  {}: {} ({:?})", drone.id, drone.name, drone.kind);
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScenarioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.world.extent(), 15_000.0);
        assert_eq!(config.fleet.drones.len(), 10);
    }

    #[test]
    fn test_partial_yaml_falls_back_to_defaults() {
        let yaml = "sim:\n  seed: 7\n  max_ticks: 30\nmovement:\n  speed_per_tick: 250.0\n";
        let config = ScenarioConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.sim.seed, 7);
        assert_eq!(config.sim.max_ticks, Some(30));
        assert_eq!(config.sim.tick_interval_ms, 100);
        assert_eq!(config.movement.speed_per_tick, 250.0);
        assert_eq!(config.movement.mission_arrival_m, 100.0);
        assert_eq!(config.world.grid_size, 30);
    }

    #[test]
    fn test_roster_kind_parsing() {
        let yaml = "fleet:\n  drones:\n    - {id: a, name: A, kind: scout}\n    - {id: b, name: B, kind: heavy}\n";
        let config = ScenarioConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.fleet.drones[1].kind, DroneKind::Heavy);
        assert_eq!(config.fleet.formation_columns, 5);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ScenarioConfig::default();
        config.world.base = Position2D { x_m: 20_000.0, y_m: 0.0 };
        assert!(matches!(config.validate(), Err(ScenarioError::ValidationError(_))));

        let mut config = ScenarioConfig::default();
        config.fleet.drones[1].id = config.fleet.drones[0].id.clone();
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.detection.confidence_min = 0.99;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.fleet.drones.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_jitter_and_ratios_rejected() {
        let mut config = ScenarioConfig::default();
        config.movement.coincident_jitter_ratio = -0.1;
        assert!(matches!(config.validate(), Err(ScenarioError::ValidationError(_))));

        let mut config = ScenarioConfig::default();
        config.detection.jitter_m = -300.0;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.movement.separation_limit_ratio = -0.3;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.movement.separation_gain = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.dispatch.candidate_sample_size = 0;
        assert!(config.validate().is_err());

        // 0は有効（ジッターなし）
        let mut config = ScenarioConfig::default();
        config.detection.jitter_m = 0.0;
        config.movement.coincident_jitter_ratio = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = ScenarioConfig::from_file("scenarios/does_not_exist.yaml");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_bundled_scenario_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/search_and_rescue.yaml");
        let config = ScenarioConfig::from_file(path).unwrap();
        assert_eq!(config.fleet.drones.len(), 10);
        assert_eq!(config.world.grid_size, 30);
    }
}
