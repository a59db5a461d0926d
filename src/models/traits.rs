use crate::models::common::Position3D;

/// 位置を持つすべてのシミュレーションエージェントが実装する基本インターフェース
pub trait IAgent {
    /// 現在位置の取得
    fn get_position(&self) -> Position3D;

    /// XY平面での距離
    fn distance_to(&self, position: &Position3D) -> f64 {
        self.get_position().distance_xy(position)
    }
}

/// 経路計画のインターフェース
///
/// 実装は純粋関数として振る舞い、同一入力に対して常に同一の経路を返す必要があります。
pub trait IPathPlanner {
    /// 開始位置から目標位置までのウェイポイント列を計算
    fn plan(&self, start: Position3D, goal: Position3D) -> Vec<Position3D>;
}

/// 最も近いエージェントのインデックスを返します
///
/// 距離が等しい場合は先に現れたものを選びます。
pub fn nearest_index<A: IAgent>(agents: &[&A], position: &Position3D) -> Option<usize> {
    agents
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (index, agent)| {
            let distance = agent.distance_to(position);
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((index, distance)),
            }
        })
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(Position3D);

    impl IAgent for Marker {
        fn get_position(&self) -> Position3D {
            self.0
        }
    }

    #[test]
    fn test_nearest_index_prefers_first_on_tie() {
        let a = Marker(Position3D::new(10.0, 0.0, 0.0));
        let b = Marker(Position3D::new(-10.0, 0.0, 0.0));
        let c = Marker(Position3D::new(3.0, 0.0, 0.0));
        let origin = Position3D::new(0.0, 0.0, 0.0);

        assert_eq!(nearest_index(&[&a, &b], &origin), Some(0));
        assert_eq!(nearest_index(&[&a, &b, &c], &origin), Some(2));
        assert_eq!(nearest_index::<Marker>(&[], &origin), None);
    }
}
