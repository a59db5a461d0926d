//! # Events モジュール
//!
//! シミュレーションと外部（表示・オペレーター）との間でやり取りするメッセージを定義します。
//!
//! 送出イベントは1行1件のJSONとして書き出され、受信コマンドも1行1件のJSONとして
//! 読み込まれます。手動コマンドの解析は寛容で、不正なフィールドは無視されます。

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::models::{
    Alert, CommRelay, ControlMode, Drone, HeatSignature, Position3D, Tick,
};

/// 外部へ送出するイベント
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SimEvent {
    /// セッション開始時（およびリセット時）の全体スナップショット
    InitialState {
        tick: Tick,
        drones: Vec<Drone>,
        heat_signatures: Vec<HeatSignature>,
        relays: Vec<CommRelay>,
        coverage: Vec<Vec<u8>>,
    },
    /// 毎ティックのドローン状態
    DroneUpdate { tick: Tick, drones: Vec<Drone> },
    /// 被覆グリッドが変化したティックの回数行列
    ScanUpdate { tick: Tick, cells: Vec<Vec<u8>> },
    Alert(Alert),
}

/// オペレーターからの手動制御コマンド
#[derive(Debug, Clone, PartialEq)]
pub struct ManualCommand {
    pub drone_id: String,
    pub mode: Option<ControlMode>,
    /// XY座標の列（高度は適用時に補完）
    pub waypoints: Option<Vec<(f64, f64)>>,
}

impl ManualCommand {
    /// JSON値から手動コマンドを解析します
    ///
    /// `drone_id` が無い場合のみ失敗し、`mode` と `waypoints` は解釈できなければ
    /// 指定なしとして扱います。
    pub fn from_value(value: &Value) -> Option<Self> {
        let drone_id = value.get("drone_id")?.as_str()?.to_string();

        let mode = value
            .get("mode")
            .and_then(|m| serde_json::from_value::<ControlMode>(m.clone()).ok());

        let waypoints = value.get("waypoints").and_then(parse_waypoints);

        Some(Self {
            drone_id,
            mode,
            waypoints,
        })
    }

    /// 後から届いたコマンドの指定項目で上書きします
    fn merge(&mut self, newer: ManualCommand) {
        if newer.mode.is_some() {
            self.mode = newer.mode;
        }
        if newer.waypoints.is_some() {
            self.waypoints = newer.waypoints;
        }
    }

    /// ウェイポイントを飛行高度付きの位置へ変換
    pub fn waypoint_positions(&self, altitude: f64) -> Option<Vec<Position3D>> {
        self.waypoints.as_ref().map(|points| {
            points
                .iter()
                .map(|&(x, y)| Position3D::new(x, y, altitude))
                .collect()
        })
    }
}

/// `[[x, y], ...]` 形式のウェイポイント列（1点でも不正なら全体を無効とする）
fn parse_waypoints(value: &Value) -> Option<Vec<(f64, f64)>> {
    value
        .as_array()?
        .iter()
        .map(|point| {
            let pair = point.as_array()?;
            match pair.as_slice() {
                [x, y, ..] => Some((x.as_f64()?, y.as_f64()?)),
                _ => None,
            }
        })
        .collect()
}

/// 受信メッセージ
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Manual(ManualCommand),
    /// セッションを初期状態から再開
    Reset,
}

impl InboundMessage {
    /// 1行のJSONを解析します
    ///
    /// `{"type": "reset"}` はリセット、それ以外は手動コマンドとして解釈します。
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;

        if value.get("type").and_then(Value::as_str) == Some("reset") {
            return Some(InboundMessage::Reset);
        }

        ManualCommand::from_value(&value).map(InboundMessage::Manual)
    }
}

/// ドローンごとの未処理コマンド
///
/// 各コマンドはMOVEステージで対象ドローンが処理される際に一度だけ取り出されます。
#[derive(Debug, Default)]
pub struct CommandInbox {
    pending: HashMap<String, ManualCommand>,
}

impl CommandInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// コマンドを登録します（同一ドローンの未処理コマンドとは項目単位で統合）
    pub fn submit(&mut self, command: ManualCommand) {
        match self.pending.get_mut(&command.drone_id) {
            Some(existing) => existing.merge(command),
            None => {
                self.pending.insert(command.drone_id.clone(), command);
            }
        }
    }

    pub fn take(&mut self, drone_id: &str) -> Option<ManualCommand> {
        self.pending.remove(drone_id)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, DroneKind};
    use serde_json::json;

    #[test]
    fn test_parse_full_manual_command() {
        let line = r#"{"drone_id": "drone_alpha", "mode": "manual", "waypoints": [[100, 200], [300.5, 400]]}"#;

        let Some(InboundMessage::Manual(command)) = InboundMessage::parse(line) else {
            panic!("manual command expected");
        };

        assert_eq!(command.drone_id, "drone_alpha");
        assert_eq!(command.mode, Some(ControlMode::Manual));
        assert_eq!(command.waypoints, Some(vec![(100.0, 200.0), (300.5, 400.0)]));
        assert_eq!(
            command.waypoint_positions(20.0).unwrap()[1],
            Position3D::new(300.5, 400.0, 20.0)
        );
    }

    #[test]
    fn test_parse_ignores_invalid_fields() {
        let line = r#"{"drone_id": "drone_beta", "mode": "hover", "waypoints": [[1, 2], ["x", 3]]}"#;

        let Some(InboundMessage::Manual(command)) = InboundMessage::parse(line) else {
            panic!("manual command expected");
        };

        assert_eq!(command.mode, None);
        assert_eq!(command.waypoints, None);
    }

    #[test]
    fn test_parse_reset_and_garbage() {
        assert_eq!(InboundMessage::parse(r#"{"type": "reset"}"#), Some(InboundMessage::Reset));
        assert_eq!(InboundMessage::parse("not json"), None);
        assert_eq!(InboundMessage::parse(r#"{"mode": "auto"}"#), None);
    }

    #[test]
    fn test_inbox_merges_and_takes_once() {
        let mut inbox = CommandInbox::new();
        inbox.submit(ManualCommand {
            drone_id: "d1".to_string(),
            mode: Some(ControlMode::Manual),
            waypoints: None,
        });
        inbox.submit(ManualCommand {
            drone_id: "d1".to_string(),
            mode: None,
            waypoints: Some(vec![(1.0, 2.0)]),
        });
        assert_eq!(inbox.len(), 1);

        let command = inbox.take("d1").unwrap();
        assert_eq!(command.mode, Some(ControlMode::Manual));
        assert_eq!(command.waypoints, Some(vec![(1.0, 2.0)]));
        assert!(inbox.take("d1").is_none());
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_event_wire_format() {
        let drone = Drone::new(
            "d1".to_string(),
            "D-1".to_string(),
            DroneKind::Scout,
            Position3D::new(1.0, 2.0, 20.0),
        );
        let update = SimEvent::DroneUpdate { tick: 4, drones: vec![drone] };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["event"], "drone_update");
        assert_eq!(value["data"]["tick"], 4);
        assert_eq!(value["data"]["drones"][0]["status"], "idle");
        assert_eq!(value["data"]["drones"][0]["control_mode"], "auto");

        let alert = SimEvent::Alert(Alert::new(
            AlertType::System,
            "start".to_string(),
            json!({}),
            0,
        ));
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["event"], "alert");
        assert_eq!(value["data"]["type"], "SYSTEM");
    }
}
