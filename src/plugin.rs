use crate::datatypes::{read_fully, RawString, RecordFlags};
use crate::record::Record;
use crate::subrecord::{Subrecord, SubrecordType};
use crate::utils::EspError;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

mod header;
mod summary;

pub use header::{HeaderStats, HEADER_STATS_SIZE};
pub use summary::PluginSummary;

/// 主记录类型（文件签名）
pub const MAIN_RECORD_TYPE: &[u8; 4] = b"TES4";

/// 重写文件时复制剩余数据的块大小
const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// 解析主记录时发现的可容忍问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginDiagnostic {
    /// HEDR 数据大小不是 12 字节
    InvalidHeaderSize { actual: usize },
    /// 主记录中没有 HEDR
    MissingHeader,
}

impl std::fmt::Display for PluginDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginDiagnostic::InvalidHeaderSize { actual } => write!(
                f,
                "invalid header size: {} bytes (expected {})",
                actual, HEADER_STATS_SIZE
            ),
            PluginDiagnostic::MissingHeader => write!(f, "main record has no HEDR subrecord"),
        }
    }
}

/// ESP/ESM/ESL 插件文件
///
/// 只解析开头的 TES4 主记录；之后的所有数据在 [`PluginFile::write`] 时原样复制。
/// 源文件句柄在整个生命周期内保持打开。
#[derive(Debug)]
pub struct PluginFile {
    /// 文件路径
    path: PathBuf,
    /// 源文件
    file: BufReader<File>,
    /// 主记录
    main_record: Record,
    /// 主记录在源文件中的原始大小
    main_record_size: u64,
    header: HeaderStats,
    /// 主文件列表（去重）
    masters: BTreeSet<String>,
    author: String,
    description: String,
    diagnostics: Vec<PluginDiagnostic>,
}

impl PluginFile {
    /// 打开插件文件并解析主记录
    ///
    /// # 错误
    /// - 文件无法打开、不足 4 字节或签名不是 TES4：`InvalidFile`
    /// - 主记录或其子记录不完整：`TruncatedRecord` / `TruncatedSubRecord`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EspError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| EspError::InvalidFile(format!("file not found: {} ({})", path.display(), e)))?;
        let mut file = BufReader::new(file);

        // 先检查签名，再从头解析完整的主记录
        let mut signature = [0u8; 4];
        let read = read_fully(&mut file, &mut signature)
            .map_err(|e| EspError::InvalidFile(format!("file unreadable: {} ({})", path.display(), e)))?;
        if read < signature.len() {
            return Err(EspError::InvalidFile("file incomplete".to_string()));
        }
        if &signature != MAIN_RECORD_TYPE {
            return Err(EspError::InvalidFile(format!(
                "invalid file type: {}",
                String::from_utf8_lossy(&signature)
            )));
        }
        file.seek(SeekFrom::Start(0))?;

        let main_record = Record::parse(&mut file)?
            .ok_or_else(|| EspError::TruncatedRecord("main record missing".to_string()))?;
        let main_record_size = main_record.size() as u64;

        let mut plugin = PluginFile {
            path,
            file,
            main_record,
            main_record_size,
            header: HeaderStats::default(),
            masters: BTreeSet::new(),
            author: String::new(),
            description: String::new(),
            diagnostics: Vec::new(),
        };
        plugin.read_subrecords()?;

        tracing::debug!(
            path = %plugin.path.display(),
            revision = plugin.revision(),
            masters = plugin.masters.len(),
            "opened plugin"
        );

        Ok(plugin)
    }

    /// 按顺序解析主记录的子记录并更新元数据
    fn read_subrecords(&mut self) -> Result<(), EspError> {
        let data = self.main_record.data().to_vec();
        let mut cursor = Cursor::new(&data[..]);
        let mut seen_header = false;

        while let Some(subrecord) = Subrecord::parse(&mut cursor)? {
            match subrecord.record_type {
                SubrecordType::Hedr => {
                    seen_header = true;
                    self.on_hedr(&subrecord);
                }
                SubrecordType::Mast => self.on_mast(&subrecord),
                SubrecordType::Cnam => self.on_cnam(&subrecord),
                SubrecordType::Snam => self.on_snam(&subrecord),
                SubrecordType::Unknown(_) => {}
            }
        }

        if !seen_header {
            tracing::warn!(path = %self.path.display(), "main record has no HEDR subrecord");
            self.diagnostics.push(PluginDiagnostic::MissingHeader);
        }
        Ok(())
    }

    fn on_hedr(&mut self, subrecord: &Subrecord) {
        match HeaderStats::parse(&subrecord.data) {
            Some(stats) => self.header = stats,
            None => {
                tracing::warn!(
                    path = %self.path.display(),
                    size = subrecord.data.len(),
                    "invalid header size"
                );
                // 记录数设为 1，防止被当成空插件（大小错误的 HEDR 不算空插件）
                self.header.version = 0.0;
                self.header.num_records = 1;
                self.diagnostics.push(PluginDiagnostic::InvalidHeaderSize {
                    actual: subrecord.data.len(),
                });
            }
        }
    }

    fn on_mast(&mut self, subrecord: &Subrecord) {
        if !subrecord.data.is_empty() {
            self.masters.insert(RawString::parse_zstring(&subrecord.data).content);
        }
    }

    fn on_cnam(&mut self, subrecord: &Subrecord) {
        if !subrecord.data.is_empty() {
            self.author = RawString::parse_zstring(&subrecord.data).content;
        }
    }

    fn on_snam(&mut self, subrecord: &Subrecord) {
        if !subrecord.data.is_empty() {
            self.description = RawString::parse_zstring(&subrecord.data).content;
        }
    }

    /// 写出插件：主记录（可能修改过标志位）+ 源文件中主记录之后的全部原始字节
    ///
    /// 目标文件不是原子写入，失败时内容不确定；需要原子性的调用方
    /// 应先写到临时路径再重命名。目标不能是源文件本身。
    pub fn write<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EspError> {
        let path = path.as_ref();
        if self.is_source_path(path) {
            return Err(EspError::SameFile(path.to_path_buf()));
        }

        // 确保父目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut output = BufWriter::new(File::create(path)?);
        self.main_record.write_to(&mut output)?;

        self.file.seek(SeekFrom::Start(self.main_record_size))?;
        let copied = copy_chunks(&mut self.file, &mut output)?;

        output.flush()?;
        output
            .into_inner()
            .map_err(|e| EspError::IoError(e.into_error()))?
            .sync_all()?;

        tracing::debug!(
            path = %path.display(),
            header_bytes = self.main_record.size(),
            copied,
            "wrote plugin"
        );
        Ok(())
    }

    fn is_source_path(&self, path: &Path) -> bool {
        match (std::fs::canonicalize(&self.path), std::fs::canonicalize(path)) {
            (Ok(source), Ok(dest)) => source == dest,
            _ => false,
        }
    }

    /// 获取插件名称
    pub fn get_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// 获取插件类型（按扩展名）
    pub fn get_type(&self) -> &str {
        let extension = self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        match extension.as_deref() {
            Some("esp") => "插件 (ESP)",
            Some("esm") => "主文件 (ESM)",
            Some("esl") => "轻量级文件 (ESL)",
            _ => "未知",
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn main_record(&self) -> &Record {
        &self.main_record
    }

    pub fn header_stats(&self) -> &HeaderStats {
        &self.header
    }

    pub fn revision(&self) -> u32 {
        self.main_record.revision
    }

    /// 格式版本（HEDR）
    pub fn version(&self) -> f32 {
        self.header.version
    }

    pub fn num_records(&self) -> i32 {
        self.header.num_records
    }

    pub fn next_object_id(&self) -> u32 {
        self.header.next_object_id
    }

    /// 作者（最后一个 CNAM）
    pub fn author(&self) -> &str {
        &self.author
    }

    /// 描述（最后一个 SNAM）
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn masters(&self) -> &BTreeSet<String> {
        &self.masters
    }

    /// 解析时发现的可容忍问题
    pub fn diagnostics(&self) -> &[PluginDiagnostic] {
        &self.diagnostics
    }

    /// 是否为主文件 (ESM 标志)
    pub fn is_master(&self) -> bool {
        self.main_record.has_flag(RecordFlags::MASTER_FILE)
    }

    /// 是否为轻量插件 (ESL 标志)
    pub fn is_light(&self) -> bool {
        self.main_record.has_flag(RecordFlags::LIGHT_MASTER)
    }

    pub fn is_localized(&self) -> bool {
        self.main_record.has_flag(RecordFlags::LOCALIZED)
    }

    pub fn is_compressed(&self) -> bool {
        self.main_record.has_flag(RecordFlags::COMPRESSED)
    }

    /// 记录数恰好为 0 的插件
    pub fn is_dummy(&self) -> bool {
        self.header.num_records == 0
    }

    /// 设置或清除轻量插件标志，只修改内存中的主记录，调用 `write` 后才写入文件
    pub fn set_light(&mut self, enabled: bool) {
        self.main_record.set_flag(RecordFlags::LIGHT_MASTER, enabled);
    }
}

/// 按固定块大小复制，直到源数据结束
fn copy_chunks<R: Read, W: Write>(source: &mut R, dest: &mut W) -> Result<u64, EspError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let count = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => count,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        dest.write_all(&buffer[..count])?;
        total += count as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_chunks_handles_partial_last_chunk() {
        let len = COPY_BUFFER_SIZE * 2 + 123;
        let source: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut dest = Vec::new();

        let copied = copy_chunks(&mut Cursor::new(&source[..]), &mut dest).unwrap();

        assert_eq!(copied, len as u64);
        assert_eq!(dest, source);
    }

    #[test]
    fn test_copy_chunks_exact_multiple() {
        let source = vec![7u8; COPY_BUFFER_SIZE];
        let mut dest = Vec::new();
        copy_chunks(&mut Cursor::new(&source[..]), &mut dest).unwrap();
        assert_eq!(dest.len(), COPY_BUFFER_SIZE);
    }

    #[test]
    fn test_copy_chunks_empty_source() {
        let mut dest = Vec::new();
        assert_eq!(copy_chunks(&mut Cursor::new(Vec::<u8>::new()), &mut dest).unwrap(), 0);
        assert!(dest.is_empty());
    }

    #[test]
    fn test_diagnostic_messages() {
        assert_eq!(
            PluginDiagnostic::InvalidHeaderSize { actual: 8 }.to_string(),
            "invalid header size: 8 bytes (expected 12)"
        );
    }
}
