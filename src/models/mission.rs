use serde::{Deserialize, Serialize};

use crate::models::common::{Position3D, Tick};

/// ミッション種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionType {
    Scan,
    Rescue,
    Return,
    DeployRelay,
}

/// ミッション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl MissionStatus {
    /// 完了または失敗した終端状態か
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Completed | MissionStatus::Failed)
    }
}

/// ドローン1機に割り当てられた1つの作業
#[derive(Debug, Clone, Serialize)]
pub struct Mission {
    /// ミッションの一意識別子
    pub id: String,
    /// 担当ドローンのID
    pub drone_id: String,
    /// ミッション種別
    pub mission_type: MissionType,
    /// 目標位置
    pub target: Position3D,
    /// ミッション状態
    pub status: MissionStatus,
    /// 生成ティック
    pub created_at: Tick,
    /// 救助ミッションの対象生存者ID
    pub survivor_id: Option<String>,
}

impl Mission {
    /// アクティブ状態のミッションを作成します
    pub fn new(
        id: String,
        drone_id: String,
        mission_type: MissionType,
        target: Position3D,
        created_at: Tick,
    ) -> Self {
        Self {
            id,
            drone_id,
            mission_type,
            target,
            status: MissionStatus::Active,
            created_at,
            survivor_id: None,
        }
    }

    pub fn with_survivor(mut self, survivor_id: String) -> Self {
        self.survivor_id = Some(survivor_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == MissionStatus::Active
    }
}

/// ミッション一覧
///
/// 追加順を保持し、ドローンごとのアクティブミッションが高々1件であることを
/// `supersede_active` と組み合わせて保証します。
#[derive(Debug, Clone, Default)]
pub struct MissionBoard {
    missions: Vec<Mission>,
}

impl MissionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mission: Mission) {
        self.missions.push(mission);
    }

    pub fn get(&self, mission_id: &str) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id == mission_id)
    }

    pub fn get_mut(&mut self, mission_id: &str) -> Option<&mut Mission> {
        self.missions.iter_mut().find(|m| m.id == mission_id)
    }

    /// IDが指すミッションがアクティブな場合のみ返します
    ///
    /// 存在しないIDや終端状態のミッションは「ミッションなし」として扱います。
    pub fn active(&self, mission_id: Option<&str>) -> Option<&Mission> {
        mission_id
            .and_then(|id| self.get(id))
            .filter(|m| m.is_active())
    }

    /// 指定種別のアクティブミッション
    pub fn active_of_type(&self, mission_type: MissionType) -> impl Iterator<Item = &Mission> {
        self.missions
            .iter()
            .filter(move |m| m.is_active() && m.mission_type == mission_type)
    }

    /// ドローンが保持するアクティブミッション数
    pub fn active_count_for(&self, drone_id: &str) -> usize {
        self.missions
            .iter()
            .filter(|m| m.is_active() && m.drone_id == drone_id)
            .count()
    }

    /// ドローンのアクティブミッションをすべて失敗扱いにします
    ///
    /// 新しいミッションを割り当てる直前、または手動制御への切り替え時に呼び出します。
    pub fn supersede_active(&mut self, drone_id: &str) -> usize {
        let mut superseded = 0;
        for mission in self
            .missions
            .iter_mut()
            .filter(|m| m.is_active() && m.drone_id == drone_id)
        {
            mission.status = MissionStatus::Failed;
            superseded += 1;
        }
        superseded
    }

    /// 終端状態のミッションを最新 `retention` 件まで残して削除します
    pub fn purge_terminal(&mut self, retention: usize) -> usize {
        let terminal = self.missions.iter().filter(|m| m.status.is_terminal()).count();
        if terminal <= retention {
            return 0;
        }

        let mut to_remove = terminal - retention;
        let before = self.missions.len();
        self.missions.retain(|m| {
            if to_remove > 0 && m.status.is_terminal() {
                to_remove -= 1;
                false
            } else {
                true
            }
        });
        before - self.missions.len()
    }

    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }
}
