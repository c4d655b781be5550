//! Output Sinks Implementation
//!
//! メモリ、ディレクトリ、ZIPアーカイブへの出力先の実装を提供するモジュール。

use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::DarfError;
use crate::output::OutputSink;
use crate::security::validate_entry_name;

/// メモリ上に出力を保持する出力先
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Vec<(String, Vec<u8>)>,
    finalized: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 書き込まれた`(名前, バイト列)`の一覧（書き込み順）
    pub fn documents(&self) -> &[(String, Vec<u8>)] {
        &self.documents
    }

    /// 書き込まれた出力名の一覧
    pub fn names(&self) -> Vec<&str> {
        self.documents.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// `finalize`が呼び出されたか
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn into_documents(self) -> Vec<(String, Vec<u8>)> {
        self.documents
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), DarfError> {
        validate_entry_name(name)?;
        self.documents.push((name.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DarfError> {
        self.finalized = true;
        Ok(())
    }
}

/// ディレクトリにファイルとして出力する出力先
///
/// ディレクトリが存在しなければ作成します。既存のファイルを削除することはありません
/// （同名のファイルは上書きされます）。
#[derive(Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// 出力先ディレクトリを開く（なければ作成する）
    pub fn new<P: AsRef<Path>>(directory: P) -> Result<Self, DarfError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            written: Vec::new(),
        })
    }

    /// 出力先ディレクトリ
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 書き込んだファイルのパス
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl OutputSink for DirectorySink {
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), DarfError> {
        validate_entry_name(name)?;
        let path = self.directory.join(name);
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "wrote document");
        self.written.push(path);
        Ok(())
    }
}

/// ZIPアーカイブ（deflate圧縮）に出力する出力先
///
/// `finalize`でアーカイブの中央ディレクトリを書き込みます。
pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
    finished: Option<W>,
    entries: usize,
}

impl ZipSink<File> {
    /// ZIPファイルを作成する（親ディレクトリがなければ作成する）
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, DarfError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write + Seek> ZipSink<W> {
    /// 任意のライターに書き込むZIPアーカイブを作成する
    pub fn new(writer: W) -> Self {
        Self {
            writer: ZipWriter::new(writer),
            finished: None,
            entries: 0,
        }
    }

    /// 書き込んだエントリ数
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// 完成したアーカイブのライターを取り出す（`finalize`前は`None`）
    pub fn into_inner(self) -> Option<W> {
        self.finished
    }
}

impl<W: Write + Seek> OutputSink for ZipSink<W> {
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), DarfError> {
        validate_entry_name(name)?;
        if self.finished.is_some() {
            return Err(DarfError::Zip("Archive is already finalized".to_string()));
        }

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(name, options)?;
        self.writer.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), DarfError> {
        if self.finished.is_none() {
            self.finished = Some(self.writer.finish()?);
            tracing::debug!(entries = self.entries, "finished archive");
        }
        Ok(())
    }
}
