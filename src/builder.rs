//! Builder Module
//!
//! Fluent Builder APIを提供し、`Batch`インスタンスを段階的に構築する。
//! `Batch`はデータセットの各行をテンプレートに書き込み、出力名を付けて返すファサードです。

use std::collections::BTreeMap;
use std::slice;

use rayon::prelude::*;

use crate::api::{CancellationToken, FailurePolicy, FillMode, NumericPolicy, TextAlignment};
use crate::error::DarfError;
use crate::mapper::RowMapper;
use crate::naming::NamingPolicy;
use crate::output::OutputSink;
use crate::report::{BatchReport, RowFailure};
use crate::schema::FieldSchema;
use crate::template::{fill, FillOptions, TemplateDocument};
use crate::types::{Dataset, GeneratedDocument, RawRow};

/// バッチ処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct BatchConfig {
    /// フィールドスキーマ
    pub schema: FieldSchema,

    /// テンプレートへの書き込みオプション
    pub fill_options: FillOptions,

    /// 金額フィールドの既定の表示方針
    pub numeric_policy: NumericPolicy,

    /// フィールドごとの表示方針
    pub field_numeric_policy: BTreeMap<String, NumericPolicy>,

    /// 出力名の組み立て方
    pub naming: NamingPolicy,

    /// 行の失敗時の方針
    pub failure_policy: FailurePolicy,

    /// 並列度（1なら逐次処理）
    pub parallelism: usize,

    /// キャンセルトークン
    pub cancellation: Option<CancellationToken>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            schema: FieldSchema::darf(),
            fill_options: FillOptions::new(FillMode::Live),
            numeric_policy: NumericPolicy::Formatted,
            field_numeric_policy: BTreeMap::new(),
            naming: NamingPolicy::default(),
            failure_policy: FailurePolicy::SkipRow,
            parallelism: 1,
            cancellation: None,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// テンプレート以外のすべての設定項目にデフォルト値が設定されており、
/// 必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use darfbatch::{BatchBuilder, FillMode, TemplateDocument};
///
/// # fn main() -> Result<(), darfbatch::DarfError> {
/// let batch = BatchBuilder::new()
///     .with_template(TemplateDocument::open("modelos/darf.pdf")?)
///     .with_fill_mode(FillMode::FlattenMerge)
///     .with_parallelism(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BatchBuilder {
    /// 内部設定（構築中）
    config: BatchConfig,

    /// テンプレート（必須）
    template: Option<TemplateDocument>,
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - スキーマ: DARFの8フィールド
    /// - 書き込みモード: `Live`（外観の再計算を要求する）
    /// - 金額の表示方針: `Formatted`
    /// - 出力名: `DARF_<行番号>_<名前>_<期間>.pdf`
    /// - 失敗時の方針: `SkipRow`
    /// - 並列度: 1
    pub fn new() -> Self {
        Self {
            config: BatchConfig::default(),
            template: None,
        }
    }

    /// 書き込み先のテンプレートを指定する（必須）
    pub fn with_template(mut self, template: TemplateDocument) -> Self {
        self.template = Some(template);
        self
    }

    /// 列とフィールドの対応表を指定する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use darfbatch::{BatchBuilder, FieldKind, FieldMapping, FieldSchema};
    ///
    /// let schema = FieldSchema::new(vec![
    ///     FieldMapping::new("Contribuinte", "Nome", FieldKind::Text),
    ///     FieldMapping::new("Total", "Total", FieldKind::Amount),
    /// ]);
    /// let builder = BatchBuilder::new().with_schema(schema);
    /// ```
    pub fn with_schema(mut self, schema: FieldSchema) -> Self {
        self.config.schema = schema;
        self
    }

    /// 書き込みモードを指定する
    pub fn with_fill_mode(mut self, mode: FillMode) -> Self {
        self.config.fill_options.mode = mode;
        self
    }

    /// ビューアに外観の再計算を要求するか（`/NeedAppearances`）を指定する
    ///
    /// # 引数
    ///
    /// * `enabled: bool`:
    ///   * `true`: 再計算を要求する（デフォルト）
    ///   * `false`: 生成した外観ストリームのみを使う
    pub fn force_recompute(mut self, enabled: bool) -> Self {
        self.config.fill_options.force_recompute = enabled;
        self
    }

    /// フィールドのテキスト配置を指定する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use darfbatch::{BatchBuilder, TextAlignment};
    ///
    /// let builder = BatchBuilder::new()
    ///     .with_field_alignment("Total", TextAlignment::Right)
    ///     .with_field_alignment("Principal", TextAlignment::Right);
    /// ```
    pub fn with_field_alignment(mut self, field: &str, alignment: TextAlignment) -> Self {
        self.config
            .fill_options
            .field_alignment
            .insert(field.to_string(), alignment);
        self
    }

    /// 金額フィールドの既定の表示方針を指定する
    pub fn with_numeric_policy(mut self, policy: NumericPolicy) -> Self {
        self.config.numeric_policy = policy;
        self
    }

    /// 特定のフィールドの表示方針を指定する
    pub fn with_field_numeric_policy(mut self, field: &str, policy: NumericPolicy) -> Self {
        self.config
            .field_numeric_policy
            .insert(field.to_string(), policy);
        self
    }

    /// 出力名の組み立て方を指定する
    pub fn with_naming_policy(mut self, naming: NamingPolicy) -> Self {
        self.config.naming = naming;
        self
    }

    /// 出力名の接頭辞だけを変更する
    pub fn with_file_prefix(mut self, prefix: &str) -> Self {
        self.config.naming.prefix = prefix.to_string();
        self
    }

    /// 行の失敗時の方針を指定する
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// 並列度を指定する（1以上）
    ///
    /// 2以上の場合、`write_to`は専用のrayonスレッドプールで`parallelism`行ずつ処理します。
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    /// キャンセルトークンを指定する
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    /// 設定を検証し、`Batch`インスタンスを生成する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Batch)`: 設定が有効な場合
    /// * `Err(DarfError::Config)`: 設定が無効な場合
    ///
    /// # 発生し得るエラー
    ///
    /// * `DarfError::Config(String)`:
    ///   * テンプレートが指定されていない
    ///   * スキーマが空、またはフィールドが重複している
    ///   * 並列度が0
    ///   * 出力名の接頭辞や拡張子が空、またはパスを含む
    ///   * `FillMode::FlattenMerge`と`NumericPolicy::RawDecimal`の組み合わせ
    pub fn build(self) -> Result<Batch, DarfError> {
        // 1. テンプレート
        let template = self
            .template
            .ok_or_else(|| DarfError::Config("A template document is required".to_string()))?;

        // 2. スキーマと出力名
        self.config.schema.validate()?;
        self.config.naming.validate()?;

        // 3. 並列度
        if self.config.parallelism == 0 {
            return Err(DarfError::Config(
                "Parallelism must be at least 1".to_string(),
            ));
        }

        // 4. 焼き込みではビューア側の書式スクリプトが動かない
        if self.config.fill_options.mode == FillMode::FlattenMerge {
            if self.config.numeric_policy == NumericPolicy::RawDecimal {
                return Err(DarfError::Config(
                    "The raw decimal numeric policy cannot be combined with flatten-merge".to_string(),
                ));
            }
            if let Some((field, _)) = self
                .config
                .field_numeric_policy
                .iter()
                .find(|(_, policy)| **policy == NumericPolicy::RawDecimal)
            {
                return Err(DarfError::Config(format!(
                    "Field '{}' uses the raw decimal numeric policy, which cannot be combined with flatten-merge",
                    field
                )));
            }
        }

        Ok(Batch {
            config: self.config,
            template,
        })
    }
}

/// バッチ処理のファサード
///
/// 構築後の設定とテンプレートは読み取り専用で、同じ`Batch`で何度でも実行できます。
///
/// # 使用例
///
/// ```rust,no_run
/// use darfbatch::{BatchBuilder, Dataset, DirectorySink, TemplateDocument};
///
/// # fn main() -> Result<(), darfbatch::DarfError> {
/// let batch = BatchBuilder::new()
///     .with_template(TemplateDocument::open("modelos/darf.pdf")?)
///     .build()?;
/// let dataset = Dataset::open("planilha_darf.xlsx")?;
///
/// let mut sink = DirectorySink::new("saida")?;
/// let report = batch.write_to(&dataset, &mut sink)?;
/// println!("{} generated, {} failed", report.generated.len(), report.failed.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Batch {
    config: BatchConfig,
    template: TemplateDocument,
}

impl Batch {
    /// テンプレート
    pub fn template(&self) -> &TemplateDocument {
        &self.template
    }

    /// フィールドスキーマ
    pub fn schema(&self) -> &FieldSchema {
        &self.config.schema
    }

    /// データセットの各行を順番に処理する遅延イテレータを返す
    ///
    /// 必須列の検証は行の処理より前に行われ、失敗した場合は出力を1件も生成しません。
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchRun)` - 行の順序で`Result<GeneratedDocument, DarfError>`を返すイテレータ
    /// * `Err(DarfError::MissingColumns)` - 必須列が欠けている場合
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use darfbatch::{BatchBuilder, Dataset, TemplateDocument};
    ///
    /// # fn main() -> Result<(), darfbatch::DarfError> {
    /// let batch = BatchBuilder::new()
    ///     .with_template(TemplateDocument::open("modelos/darf.pdf")?)
    ///     .build()?;
    /// let dataset = Dataset::open("planilha_darf.xlsx")?;
    ///
    /// let mut run = batch.run(&dataset)?;
    /// for document in run.by_ref() {
    ///     let document = document?;
    ///     std::fs::write(&document.name, &document.bytes)?;
    /// }
    /// println!("{:?}", run.report());
    /// # Ok(())
    /// # }
    /// ```
    pub fn run<'a>(&'a self, dataset: &'a Dataset) -> Result<BatchRun<'a>, DarfError> {
        let mapper = self.prepare(dataset)?;
        Ok(BatchRun {
            batch: self,
            mapper,
            rows: dataset.rows().iter().enumerate(),
            report: BatchReport::new(dataset.len()),
            done: false,
        })
    }

    /// データセットの全行を処理し、出力を入力行の順序で`sink`へ書き込む
    ///
    /// 並列度が2以上の場合、専用のrayonスレッドプールで`parallelism`行ずつ処理します。
    /// 書き込みの順序は並列度に関係なく常に入力行の順序です。
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchReport)` - 生成した出力名、失敗した行、キャンセルの有無
    /// * `Err(DarfError::MissingColumns)` - 必須列が欠けている場合（出力なし）
    /// * `Err(DarfError::Row)` - `FailurePolicy::AbortBatch`で行が失敗した場合
    /// * `Err(_)` - 出力先の確定（`OutputSink::finalize`）に失敗した場合
    ///
    /// 1件の出力の書き込みに失敗した場合は、その行の失敗として失敗時の方針に従います。
    pub fn write_to<S: OutputSink + ?Sized>(
        &self,
        dataset: &Dataset,
        sink: &mut S,
    ) -> Result<BatchReport, DarfError> {
        let mapper = self.prepare(dataset)?;
        let mut report = BatchReport::new(dataset.len());

        if self.config.parallelism <= 1 {
            for (index, row) in dataset.rows().iter().enumerate() {
                if self.is_cancelled() {
                    report.cancelled = true;
                    tracing::info!("batch cancelled");
                    break;
                }
                let result = self.process_row(&mapper, index, row);
                self.emit(sink, &mut report, result)?;
            }
        } else {
            self.write_parallel(dataset, &mapper, sink, &mut report)?;
        }

        sink.finalize()?;
        tracing::info!(
            total = report.total_rows,
            generated = report.generated.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "batch finished"
        );
        Ok(report)
    }

    fn write_parallel<S: OutputSink + ?Sized>(
        &self,
        dataset: &Dataset,
        mapper: &RowMapper<'_>,
        sink: &mut S,
        report: &mut BatchReport,
    ) -> Result<(), DarfError> {
        let chunk_size = self.config.parallelism;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(chunk_size)
            .build()
            .map_err(|e| DarfError::Config(format!("Failed to build thread pool: {}", e)))?;

        for (chunk_index, chunk) in dataset.rows().chunks(chunk_size).enumerate() {
            let base = chunk_index * chunk_size;

            // キャンセル後に開始予定だった行は`None`
            let results: Vec<Option<Result<GeneratedDocument, RowFailure>>> = pool.install(|| {
                chunk
                    .par_iter()
                    .enumerate()
                    .map(|(offset, row)| {
                        if self.is_cancelled() {
                            None
                        } else {
                            Some(self.process_row(mapper, base + offset, row))
                        }
                    })
                    .collect()
            });

            for result in results {
                let Some(result) = result else {
                    report.cancelled = true;
                    tracing::info!("batch cancelled");
                    return Ok(());
                };
                self.emit(sink, report, result)?;
            }
        }

        Ok(())
    }

    /// 1行分の結果を出力先へ書き込み、レポートに記録する
    ///
    /// 書き込みの失敗は、生成の失敗と同じく行の失敗として扱います。
    fn emit<S: OutputSink + ?Sized>(
        &self,
        sink: &mut S,
        report: &mut BatchReport,
        result: Result<GeneratedDocument, RowFailure>,
    ) -> Result<(), DarfError> {
        let document = match result {
            Ok(document) => document,
            Err(failure) => return self.handle_failure(report, failure),
        };

        match sink.write(&document.name, &document.bytes) {
            Ok(()) => {
                report.record_success(document.name);
                Ok(())
            }
            Err(e) => self.handle_failure(
                report,
                RowFailure {
                    row_number: document.row_number,
                    message: format!("Failed to write '{}': {}", document.name, e),
                },
            ),
        }
    }

    /// 必須列を検証し、行マッパーを用意する
    fn prepare(&self, dataset: &Dataset) -> Result<RowMapper<'_>, DarfError> {
        let mapper = RowMapper::new(&self.config.schema);
        mapper.validate_columns(dataset.headers())?;

        for mapping in self.config.schema.mappings() {
            if self.template.field(&mapping.target_field).is_none() {
                tracing::warn!(
                    field = %mapping.target_field,
                    "template has no field with this name; values will be ignored"
                );
            }
        }

        tracing::info!(
            rows = dataset.len(),
            mode = ?self.config.fill_options.mode,
            parallelism = self.config.parallelism,
            "batch started"
        );
        Ok(mapper)
    }

    /// 1行を処理する
    fn process_row(
        &self,
        mapper: &RowMapper<'_>,
        index: usize,
        row: &RawRow,
    ) -> Result<GeneratedDocument, RowFailure> {
        let row_number = index + 1;
        let record = mapper.map_row(row);
        let values = mapper.field_values(
            &record,
            self.config.numeric_policy,
            &self.config.field_numeric_policy,
        );

        let filled =
            fill(&self.template, &values, &self.config.fill_options).map_err(|e| RowFailure {
                row_number,
                message: e.to_string(),
            })?;
        let name = self.config.naming.output_name(index, row);
        tracing::debug!(row = row_number, name = %name, size = filled.bytes.len(), "generated document");

        Ok(GeneratedDocument {
            row_number,
            name,
            bytes: filled.bytes,
        })
    }

    /// 失敗した行を方針に従って処理する（`AbortBatch`ならエラーを返す）
    fn handle_failure(&self, report: &mut BatchReport, failure: RowFailure) -> Result<(), DarfError> {
        report.record_failure(failure.row_number, failure.message.clone());
        match self.config.failure_policy {
            FailurePolicy::SkipRow => Ok(()),
            FailurePolicy::AbortBatch => Err(DarfError::Row {
                row: failure.row_number,
                message: failure.message,
            }),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.config
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// `Batch::run`が返す遅延イテレータ
///
/// 1回だけ走査でき、行の順序で結果を返します。`FailurePolicy::SkipRow`では失敗した行を
/// レポートに記録して次の行へ進み、`FailurePolicy::AbortBatch`では`Err`を1回返して終了します。
pub struct BatchRun<'a> {
    batch: &'a Batch,
    mapper: RowMapper<'a>,
    rows: std::iter::Enumerate<slice::Iter<'a, RawRow>>,
    report: BatchReport,
    done: bool,
}

impl<'a> BatchRun<'a> {
    /// ここまでの実行結果
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    /// 実行結果を取り出す
    pub fn into_report(self) -> BatchReport {
        self.report
    }
}

impl<'a> Iterator for BatchRun<'a> {
    type Item = Result<GeneratedDocument, DarfError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.batch.is_cancelled() {
                self.done = true;
                self.report.cancelled = true;
                tracing::info!("batch cancelled");
                return None;
            }

            let Some((index, row)) = self.rows.next() else {
                self.done = true;
                return None;
            };

            match self.batch.process_row(&self.mapper, index, row) {
                Ok(document) => {
                    self.report.record_success(document.name.clone());
                    return Some(Ok(document));
                }
                Err(failure) => {
                    if let Err(e) = self.batch.handle_failure(&mut self.report, failure) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for BatchRun<'_> {}
