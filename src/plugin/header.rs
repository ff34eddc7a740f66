use crate::datatypes::{read_f32, read_i32, read_u32};
use serde::Serialize;
use std::io::Cursor;

/// HEDR 子记录数据大小：版本(f32) + 记录数(i32) + 下一个对象ID(u32)
pub const HEADER_STATS_SIZE: usize = 12;

/// 插件头部统计信息（HEDR）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeaderStats {
    pub version: f32,
    pub num_records: i32,
    pub next_object_id: u32,
}

impl Default for HeaderStats {
    /// 缺少 HEDR 时使用：记录数为 1，避免被当成空插件
    fn default() -> Self {
        HeaderStats {
            version: 0.0,
            num_records: 1,
            next_object_id: 0,
        }
    }
}

impl HeaderStats {
    /// 解析 HEDR 数据，大小不是 12 字节时返回 `None`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() != HEADER_STATS_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        Some(HeaderStats {
            version: read_f32(&mut cursor).ok()?,
            num_records: read_i32(&mut cursor).ok()?,
            next_object_id: read_u32(&mut cursor).ok()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_STATS_SIZE] {
        let mut bytes = [0u8; HEADER_STATS_SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.num_records.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.next_object_id.to_le_bytes());
        bytes
    }
}
