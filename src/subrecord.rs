use crate::datatypes::{read_fully, read_u16, write_u16};
use crate::utils::EspError;
use std::io::{Cursor, Read, Write};

/// 子记录头部大小：4字节类型 + 2字节大小
pub const SUBRECORD_HEADER_SIZE: usize = 6;

/// 已知的子记录类型
///
/// 不认识的类型仍然是结构上合法的子记录，保留原始标签以便调用方跳过。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubrecordType {
    /// 头部统计信息（版本、记录数、下一个对象ID）
    Hedr,
    /// 依赖的主文件名
    Mast,
    /// 作者
    Cnam,
    /// 描述
    Snam,
    Unknown([u8; 4]),
}

impl SubrecordType {
    pub fn from_tag(tag: [u8; 4]) -> Self {
        match &tag {
            b"HEDR" => SubrecordType::Hedr,
            b"MAST" => SubrecordType::Mast,
            b"CNAM" => SubrecordType::Cnam,
            b"SNAM" => SubrecordType::Snam,
            _ => SubrecordType::Unknown(tag),
        }
    }

    pub fn tag(&self) -> [u8; 4] {
        match self {
            SubrecordType::Hedr => *b"HEDR",
            SubrecordType::Mast => *b"MAST",
            SubrecordType::Cnam => *b"CNAM",
            SubrecordType::Snam => *b"SNAM",
            SubrecordType::Unknown(tag) => *tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SubrecordType::Unknown(_))
    }
}

/// 子记录结构
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subrecord {
    /// 记录类型
    pub record_type: SubrecordType,
    /// 原始数据（大小字段由数据长度推导）
    pub data: Vec<u8>,
}

impl Subrecord {
    pub fn new(tag: [u8; 4], data: Vec<u8>) -> Self {
        Subrecord {
            record_type: SubrecordType::from_tag(tag),
            data,
        }
    }

    /// 从记录数据中解析一个子记录
    ///
    /// 游标没有剩余字节时返回 `Ok(None)`，表示数据正常结束；
    /// 头部或数据读到一半时返回 `TruncatedSubRecord`，此后游标位置不再可信。
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Option<Self>, EspError> {
        let offset = cursor.position();
        let remaining = remaining_bytes(cursor);
        if remaining == 0 {
            return Ok(None);
        }

        // 读取记录类型 (4字节)
        let mut type_bytes = [0u8; 4];
        let read = read_fully(cursor, &mut type_bytes)?;
        if read < type_bytes.len() || remaining < SUBRECORD_HEADER_SIZE {
            return Err(EspError::TruncatedSubRecord {
                offset,
                expected: SUBRECORD_HEADER_SIZE,
                available: remaining,
            });
        }

        // 读取数据大小 (2字节)
        let size = read_u16(cursor)? as usize;

        // 检查是否有足够的数据
        let available = remaining_bytes(cursor);
        if available < size {
            return Err(EspError::TruncatedSubRecord {
                offset,
                expected: size,
                available,
            });
        }

        let mut data = vec![0u8; size];
        cursor.read_exact(&mut data)?;

        Ok(Some(Subrecord {
            record_type: SubrecordType::from_tag(type_bytes),
            data,
        }))
    }

    /// 写出子记录（类型 + 大小 + 数据）
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), EspError> {
        let size = u16::try_from(self.data.len())
            .map_err(|_| EspError::SubrecordTooLarge(self.data.len()))?;
        writer.write_all(&self.record_type.tag())?;
        write_u16(writer, size)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// 获取子记录类型标签（字符串形式）
    pub fn get_type(&self) -> String {
        String::from_utf8_lossy(&self.record_type.tag()).into_owned()
    }

    /// 获取数据
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    /// 在磁盘上占用的字节数
    pub fn size(&self) -> usize {
        SUBRECORD_HEADER_SIZE + self.data.len()
    }
}

fn remaining_bytes(cursor: &Cursor<&[u8]>) -> usize {
    let len = cursor.get_ref().len() as u64;
    len.saturating_sub(cursor.position()) as usize
}
