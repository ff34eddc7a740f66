use crate::datatypes::{read_fully, read_u32, write_u32, RecordFlags};
use crate::utils::EspError;
use std::io::{Cursor, Read, Write};

/// 记录头部大小：类型(4) + 数据大小(4) + 标志位(4) + ID(4) + 修订号(4)
pub const RECORD_HEADER_SIZE: usize = 20;

/// 版本标记大小（仅新式记录）
pub const VERSION_MARKER_SIZE: usize = 4;

/// 记录在磁盘上的布局风格
///
/// 解析时探测一次：头部之后紧跟 "HEDR" 的是旧式记录（没有版本标记，
/// 这 4 字节属于数据），否则这 4 字节是新式记录的版本标记。
/// 之后的大小计算和写出都只看这里保存的风格，不再重新探测。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStyle {
    Legacy,
    Modern { version_marker: [u8; 4] },
}

/// 记录结构（不包含记录特定的解析）
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 记录类型（原始4字节）
    pub record_type: [u8; 4],
    /// 标志位
    pub flags: RecordFlags,
    /// 数字ID
    pub form_id: u32,
    /// 修订号
    pub revision: u32,
    /// 布局风格
    pub style: RecordStyle,
    /// 记录数据，数据大小字段始终由它推导
    data: Vec<u8>,
}

impl Record {
    pub fn new(
        record_type: [u8; 4],
        flags: RecordFlags,
        form_id: u32,
        revision: u32,
        style: RecordStyle,
        data: Vec<u8>,
    ) -> Self {
        Record {
            record_type,
            flags,
            form_id,
            revision,
            style,
            data,
        }
    }

    /// 解析记录
    ///
    /// 流中没有任何字节时返回 `Ok(None)`；头部只读到一部分或数据不足时
    /// 返回 `TruncatedRecord`。
    pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>, EspError> {
        let mut header = [0u8; RECORD_HEADER_SIZE];
        let read = read_fully(reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < RECORD_HEADER_SIZE {
            return Err(EspError::TruncatedRecord(format!(
                "header has {} of {} bytes",
                read, RECORD_HEADER_SIZE
            )));
        }

        let mut header_cursor = Cursor::new(&header[4..]);
        let record_type = [header[0], header[1], header[2], header[3]];
        let data_size = read_u32(&mut header_cursor)?;
        let flags = RecordFlags::from_bits_retain(read_u32(&mut header_cursor)?);
        let form_id = read_u32(&mut header_cursor)?;
        let revision = read_u32(&mut header_cursor)?;

        let mut marker = [0u8; VERSION_MARKER_SIZE];
        let read = read_fully(reader, &mut marker)?;
        if read < VERSION_MARKER_SIZE {
            return Err(EspError::TruncatedRecord(format!(
                "{} ended before its version marker",
                String::from_utf8_lossy(&record_type)
            )));
        }

        let expected = data_size as usize;
        // 旧式记录：这 4 字节是数据开头，放回数据流
        let (style, mut data) = if &marker == b"HEDR" {
            // 数据以子记录标签开头，不可能短于标签本身
            if expected < VERSION_MARKER_SIZE {
                return Err(EspError::TruncatedRecord(format!(
                    "{} data size {} is shorter than its leading HEDR tag",
                    String::from_utf8_lossy(&record_type),
                    expected
                )));
            }
            (RecordStyle::Legacy, marker.to_vec())
        } else {
            (RecordStyle::Modern { version_marker: marker }, Vec::new())
        };

        // 按实际可读字节增长，避免损坏的 data_size 导致一次性大分配
        reader
            .take((expected - data.len()) as u64)
            .read_to_end(&mut data)?;
        if data.len() < expected {
            return Err(EspError::TruncatedRecord(format!(
                "{} expected {} data bytes, got {}",
                String::from_utf8_lossy(&record_type),
                expected,
                data.len()
            )));
        }

        tracing::debug!(
            record_type = %String::from_utf8_lossy(&record_type),
            data_size,
            flags = format_args!("0x{:08X}", flags.bits()),
            legacy = matches!(style, RecordStyle::Legacy),
            "parsed record"
        );

        Ok(Some(Record {
            record_type,
            flags,
            form_id,
            revision,
            style,
            data,
        }))
    }

    /// 写出记录：头部 + 版本标记（仅新式）+ 原始数据
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), EspError> {
        let data_size = self.data_size()?;

        writer.write_all(&self.record_type)?;
        write_u32(writer, data_size)?;
        write_u32(writer, self.flags.bits())?;
        write_u32(writer, self.form_id)?;
        write_u32(writer, self.revision)?;
        if let RecordStyle::Modern { version_marker } = &self.style {
            writer.write_all(version_marker)?;
        }
        writer.write_all(&self.data)?;
        Ok(())
    }

    /// 记录在磁盘上占用的字节数
    pub fn size(&self) -> usize {
        let marker = match self.style {
            RecordStyle::Legacy => 0,
            RecordStyle::Modern { .. } => VERSION_MARKER_SIZE,
        };
        RECORD_HEADER_SIZE + self.data.len() + marker
    }

    /// 数据大小字段
    pub fn data_size(&self) -> Result<u32, EspError> {
        u32::try_from(self.data.len()).map_err(|_| EspError::RecordTooLarge(self.data.len()))
    }

    /// 获取记录类型
    pub fn get_type(&self) -> String {
        String::from_utf8_lossy(&self.record_type).into_owned()
    }

    /// 获取数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_legacy(&self) -> bool {
        self.style == RecordStyle::Legacy
    }

    /// 检查标志位
    pub fn has_flag(&self, flag: RecordFlags) -> bool {
        self.flags.intersects(flag)
    }

    /// 设置或清除标志位（不影响数据和大小）
    pub fn set_flag(&mut self, flag: RecordFlags, enable: bool) {
        self.flags.set(flag, enable);
    }
}
