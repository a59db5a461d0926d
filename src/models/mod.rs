// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// フリートを構成する各エンティティ
pub mod drone;
pub mod mission;
pub mod survivor;
pub mod relay;
pub mod alert;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use drone::{Drone, DroneKind, DroneStatus, ControlMode, create_roster};
pub use mission::{Mission, MissionBoard, MissionStatus, MissionType};
pub use survivor::{SurvivorLocation, HeatSignature, apply_retention, generate_heat_signatures};
pub use relay::CommRelay;
pub use alert::{Alert, AlertType};
