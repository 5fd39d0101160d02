//! 结果写入服务 - 业务能力层
//!
//! 只负责"写结果 CSV"能力：每个号码处理完立即追加一行，
//! 文件为空时才写表头。本次运行的结果同时保存在内存中用于导出。

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{Item, Outcome};

const HEADER: [&str; 2] = ["telefono", "status"];

/// 结果 CSV 写入器
///
/// 职责：
/// - 每次追加都是打开、写入、关闭，进程中断也不会丢失已写入的行
/// - 条目只追加，不重排，不改写
/// - `seal` 之后拒绝追加
pub struct CsvResultLog {
    path: PathBuf,
    entries: Vec<(Item, Outcome)>,
    sealed: bool,
}

impl CsvResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            sealed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn entries(&self) -> &[(Item, Outcome)] {
        &self.entries
    }

    /// 追加一条结果
    ///
    /// 写文件失败时条目仍保留在内存中，错误返回给调用方记录。
    pub fn append(&mut self, item: &Item, outcome: &Outcome) -> Result<()> {
        if self.sealed {
            bail!("结果文件已封存，拒绝追加: {}", item);
        }
        self.entries.push((item.clone(), outcome.clone()));
        self.write_row(item, outcome)
            .with_context(|| format!("无法写入结果文件: {}", self.path.display()))
    }

    fn write_row(&self, item: &Item, outcome: &Outcome) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::Writer::from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        writer.write_record([item.as_str(), outcome.value.as_str()])?;
        writer.flush()?;

        debug!("写入结果: {} -> {}", item, outcome.value);
        Ok(())
    }

    /// 封存，之后不再接受追加
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!("结果文件封存: {} 条", self.entries.len());
        }
        self.sealed = true;
    }

    /// 导出本次运行的全部结果（按处理顺序）
    pub fn export(&self) -> Vec<(Item, Outcome)> {
        if !self.sealed {
            warn!("结果文件尚未封存，导出的是当前快照");
        }
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("resultados.csv");
        let mut log = CsvResultLog::new(&path);

        log.append(&Item::new("5512345678"), &Outcome::resolved("SUCCESS", "$150.00", None))
            .unwrap();
        log.append(&Item::new("5500000000"), &Outcome::failure("N/A", None)).unwrap();

        assert_eq!(read(&path), "telefono,status\n5512345678,$150.00\n5500000000,N/A\n");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn existing_file_is_appended_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resultados.csv");
        std::fs::write(&path, "telefono,status\n5511111111,BAJA\n").unwrap();

        let mut log = CsvResultLog::new(&path);
        log.append(&Item::new("5522222222"), &Outcome::resolved("PAGADO", "PAGADO", None))
            .unwrap();

        assert_eq!(read(&path), "telefono,status\n5511111111,BAJA\n5522222222,PAGADO\n");
        // 内存中只有本次运行的条目
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn values_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resultados.csv");
        let mut log = CsvResultLog::new(&path);
        log.append(
            &Item::new("5512345678"),
            &Outcome::resolved("PROVEEDOR", "RADIOMOVIL DIPSA, S.A. DE C.V.", None),
        )
        .unwrap();
        assert!(read(&path).contains("\"RADIOMOVIL DIPSA, S.A. DE C.V.\""));
    }

    #[test]
    fn sealed_log_rejects_appends_and_exports_stably() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CsvResultLog::new(dir.path().join("r.csv"));
        log.append(&Item::new("1"), &Outcome::failure("ERROR", None)).unwrap();
        log.seal();

        assert!(log.append(&Item::new("2"), &Outcome::failure("ERROR", None)).is_err());
        assert_eq!(log.export(), log.export());
        assert_eq!(log.export().len(), 1);
    }

    #[test]
    fn entry_kept_when_file_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        // 目录占用了文件路径，打开必然失败
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();

        let mut log = CsvResultLog::new(&path);
        assert!(log.append(&Item::new("5512345678"), &Outcome::failure("ERROR", None)).is_err());
        assert_eq!(log.len(), 1);
    }
}
