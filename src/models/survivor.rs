use rand::Rng;
use serde::Serialize;

use crate::models::{
    common::{Position3D, Tick},
    traits::IAgent,
};
use crate::scenario::{FleetConfig, WorldConfig};

/// 検知された生存者
#[derive(Debug, Clone, Serialize)]
pub struct SurvivorLocation {
    /// 生存者の一意識別子
    pub id: String,
    /// 推定位置
    pub position: Position3D,
    /// 検知信頼度 [0, 1]
    pub confidence: f64,
    /// 検知したドローンのID
    pub detected_by: String,
    /// 救助済み（救助ミッション割り当て時点でtrue）
    pub rescued: bool,
    /// 検知ティック
    pub timestamp: Tick,
}

impl IAgent for SurvivorLocation {
    fn get_position(&self) -> Position3D {
        self.position
    }
}

/// 地図上の熱源（表示用オーバーレイ）
///
/// シミュレーションのロジックには関与せず、初期状態の送出にのみ含まれます。
#[derive(Debug, Clone, Serialize)]
pub struct HeatSignature {
    pub id: String,
    pub position: Position3D,
    /// 強度 [0.5, 1.0]
    pub intensity: f64,
    /// 半径（world units）
    pub size: f64,
}

/// 熱源オーバーレイを生成します
pub fn generate_heat_signatures<R: Rng>(
    fleet: &FleetConfig,
    world: &WorldConfig,
    rng: &mut R,
) -> Vec<HeatSignature> {
    let extent = world.extent();
    let padding = fleet.heat_signature_padding_m.min(extent / 2.0);

    (0..fleet.heat_signature_count)
        .map(|i| HeatSignature {
            id: format!("heat_{:03}", i + 1),
            position: Position3D::new(
                rng.gen_range(padding..=extent - padding),
                rng.gen_range(padding..=extent - padding),
                0.0,
            ),
            intensity: rng.gen_range(0.5..=1.0),
            size: rng.gen_range(300.0..=800.0),
        })
        .collect()
}

/// 生存者リストの保持ポリシーを適用します
///
/// 未救助はすべて保持し、救助済みは最新 `rescued_retention` 件に絞ります。
/// その上で総数が `max_total` を超える場合は古いものから削除します。
/// 戻り値は削除した件数です。
pub fn apply_retention(
    survivors: &mut Vec<SurvivorLocation>,
    rescued_retention: usize,
    max_total: usize,
) -> usize {
    let before = survivors.len();

    let rescued_total = survivors.iter().filter(|s| s.rescued).count();
    let mut rescued_to_drop = rescued_total.saturating_sub(rescued_retention);
    survivors.retain(|s| {
        if s.rescued && rescued_to_drop > 0 {
            rescued_to_drop -= 1;
            false
        } else {
            true
        }
    });

    if survivors.len() > max_total {
        let overflow = survivors.len() - max_total;
        survivors.drain(..overflow);
    }

    before - survivors.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn survivor(id: usize, rescued: bool) -> SurvivorLocation {
        SurvivorLocation {
            id: format!("s{}", id),
            position: Position3D::new(0.0, 0.0, 0.0),
            confidence: 0.9,
            detected_by: "d1".to_string(),
            rescued,
            timestamp: id as Tick,
        }
    }

    #[test]
    fn test_retention_keeps_unrescued_and_recent_rescued() {
        let mut survivors: Vec<_> = (0..10).map(|i| survivor(i, i % 2 == 0)).collect();

        let removed = apply_retention(&mut survivors, 2, 100);

        assert_eq!(removed, 3);
        assert_eq!(survivors.iter().filter(|s| !s.rescued).count(), 5);
        let rescued: Vec<_> = survivors
            .iter()
            .filter(|s| s.rescued)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(rescued, vec!["s6", "s8"]);
    }

    #[test]
    fn test_retention_enforces_global_cap() {
        let mut survivors: Vec<_> = (0..10).map(|i| survivor(i, false)).collect();

        apply_retention(&mut survivors, 20, 4);

        assert_eq!(survivors.len(), 4);
        assert_eq!(survivors[0].id, "s6");
    }

    #[test]
    fn test_heat_signatures_inside_padding() {
        let config = ScenarioConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let signatures = generate_heat_signatures(&config.fleet, &config.world, &mut rng);

        assert_eq!(signatures.len(), 15);
        for sig in &signatures {
            assert!(sig.position.x >= 1000.0 && sig.position.x <= 14_000.0);
            assert!(sig.position.y >= 1000.0 && sig.position.y <= 14_000.0);
            assert!(sig.intensity >= 0.5 && sig.intensity <= 1.0);
        }
    }
}
