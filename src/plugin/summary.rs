use super::PluginFile;
use crate::utils::EspError;
use serde::Serialize;

/// 插件元数据摘要
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub plugin_type: String,
    pub revision: u32,
    pub version: f32,
    pub num_records: i32,
    pub next_object_id: u32,
    pub author: String,
    pub description: String,
    pub masters: Vec<String>,
    pub is_master: bool,
    pub is_light: bool,
    pub is_localized: bool,
    pub is_compressed: bool,
    pub is_dummy: bool,
    pub legacy_style: bool,
    pub warnings: Vec<String>,
}

impl PluginSummary {
    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String, EspError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for PluginSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let yes_no = |v: bool| if v { "是" } else { "否" };

        writeln!(f, "=== 插件信息 ===")?;
        writeln!(f, "名称: {}", self.name)?;
        writeln!(f, "类型: {}", self.plugin_type)?;
        writeln!(f, "修订号: {}", self.revision)?;
        writeln!(f, "格式版本: {:.2}", self.version)?;
        writeln!(f, "记录数: {}", self.num_records)?;
        writeln!(f, "下一个对象ID: 0x{:08X}", self.next_object_id)?;
        writeln!(f, "作者: {}", self.author)?;
        writeln!(f, "描述: {}", self.description)?;
        writeln!(f, "主文件: {}", yes_no(self.is_master))?;
        writeln!(f, "轻量插件: {}", yes_no(self.is_light))?;
        writeln!(f, "本地化: {}", yes_no(self.is_localized))?;
        writeln!(f, "压缩: {}", yes_no(self.is_compressed))?;
        writeln!(f, "空插件: {}", yes_no(self.is_dummy))?;
        writeln!(f, "依赖主文件数: {}", self.masters.len())?;
        for master in &self.masters {
            writeln!(f, "  - {}", master)?;
        }
        for warning in &self.warnings {
            writeln!(f, "警告: {}", warning)?;
        }
        Ok(())
    }
}

impl PluginFile {
    /// 获取元数据摘要
    pub fn summary(&self) -> PluginSummary {
        PluginSummary {
            name: self.get_name(),
            plugin_type: self.get_type().to_string(),
            revision: self.revision(),
            version: self.version(),
            num_records: self.num_records(),
            next_object_id: self.next_object_id(),
            author: self.author().to_string(),
            description: self.description().to_string(),
            masters: self.masters().iter().cloned().collect(),
            is_master: self.is_master(),
            is_light: self.is_light(),
            is_localized: self.is_localized(),
            is_compressed: self.is_compressed(),
            is_dummy: self.is_dummy(),
            legacy_style: self.main_record().is_legacy(),
            warnings: self.diagnostics().iter().map(|d| d.to_string()).collect(),
        }
    }
}
