use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

// 基础整数类型读取函数（所有字段均为小端序）
pub fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16, std::io::Error> {
    reader.read_u16::<LittleEndian>()
}

pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32, std::io::Error> {
    reader.read_u32::<LittleEndian>()
}

pub fn read_i32<R: Read + ?Sized>(reader: &mut R) -> Result<i32, std::io::Error> {
    reader.read_i32::<LittleEndian>()
}

pub fn read_f32<R: Read + ?Sized>(reader: &mut R) -> Result<f32, std::io::Error> {
    reader.read_f32::<LittleEndian>()
}

// 基础整数类型写入函数
pub fn write_u16<W: Write + ?Sized>(writer: &mut W, value: u16) -> Result<(), std::io::Error> {
    writer.write_u16::<LittleEndian>(value)
}

pub fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<(), std::io::Error> {
    writer.write_u32::<LittleEndian>(value)
}

/// 尽量读满缓冲区，返回实际读取的字节数
///
/// 与 `read_exact` 不同，遇到 EOF 时不报错，由调用方根据字节数区分
/// "干净结束"（0 字节）与"结构截断"（部分字节）。
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// 支持的编码
const SUPPORTED_ENCODINGS: &[&str] = &["utf-8", "windows-1252", "windows-1250", "windows-1251"];

#[derive(Debug, Clone)]
pub struct RawString {
    pub content: String,
    pub encoding: String,
}

impl RawString {
    /// 尝试多种编码解码
    pub fn decode(data: &[u8]) -> Self {
        for encoding_name in SUPPORTED_ENCODINGS {
            if let Some(encoding) = encoding_rs::Encoding::for_label(encoding_name.as_bytes()) {
                let (decoded, _, had_errors) = encoding.decode(data);
                if !had_errors {
                    return RawString {
                        content: decoded.into_owned(),
                        encoding: encoding_name.to_string(),
                    };
                }
            }
        }

        // 回退到UTF-8，忽略错误
        RawString {
            content: String::from_utf8_lossy(data).into_owned(),
            encoding: "utf-8".to_string(),
        }
    }

    /// Z字符串解析(以null结尾，没有null时取全部字节)
    pub fn parse_zstring(data: &[u8]) -> Self {
        let null_pos = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        Self::decode(&data[..null_pos])
    }
}

// 主记录标志位定义
bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RecordFlags: u32 {
        const MASTER_FILE = 0x00000001;        // ESM标志
        const LOCALIZED = 0x00000080;          // 本地化
        const LIGHT_MASTER = 0x00000200;       // 轻量级主文件 (ESL)
        const COMPRESSED = 0x00040000;         // 压缩

        // 其余位原样保留
        const _ = !0;
    }
}
