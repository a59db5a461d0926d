use serde::Serialize;
use serde_json::Value;

use crate::models::common::Tick;

/// アラート種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    SurvivorDetected,
    DroneLowBattery,
    MissionComplete,
    RescueNeeded,
    DroneRecharged,
    RelayDeployed,
    System,
}

/// 外部へ送出する通知
///
/// 同一ティック内で生成・送出され、永続化されません。
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub payload: Value,
    pub timestamp: Tick,
}

impl Alert {
    pub fn new(alert_type: AlertType, message: String, payload: Value, timestamp: Tick) -> Self {
        Self {
            alert_type,
            message,
            payload,
            timestamp,
        }
    }
}
