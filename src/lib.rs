pub mod datatypes;
pub mod record;
pub mod plugin;
pub mod subrecord;
pub mod utils;

// 重新导出主要结构
pub use datatypes::RecordFlags;
pub use plugin::{HeaderStats, PluginDiagnostic, PluginFile, PluginSummary};
pub use record::{Record, RecordStyle};
pub use subrecord::{Subrecord, SubrecordType};
pub use utils::EspError;

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["esp", "esm", "esl"];
