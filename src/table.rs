//! The typed, SQL-queryable view of the tagged dataset.
//!
//! Lines are validated into [`PageView`] rows, packed into an Arrow
//! [`RecordBatch`] and registered with a DataFusion session. [`HitsTable`]
//! is that session handle; it is built explicitly and dropped when done.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use datafusion::datasource::MemTable;
use datafusion::prelude::{col, lit, DataFrame, SessionContext};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::record::{MalformedPolicy, PageView};

/// Table name used when the caller does not pick one.
pub const DEFAULT_TABLE: &str = "wikiHits";

/// `date, hour, lang, site, hits, size`, none nullable.
pub fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("date", DataType::Int64, false),
        Field::new("hour", DataType::Int64, false),
        Field::new("lang", DataType::Utf8, false),
        Field::new("site", DataType::Utf8, false),
        Field::new("hits", DataType::Int64, false),
        Field::new("size", DataType::Int64, false),
    ]))
}

/// Parses lines into rows, handing failures to `policy`.
pub fn parse_rows<'a, I>(lines: I, policy: MalformedPolicy) -> Result<Vec<PageView>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut rows = Vec::new();
    for line in lines {
        if let Some(row) = policy.screen(PageView::parse(line))? {
            rows.push(row);
        }
    }
    Ok(rows)
}

pub fn rows_to_batch(rows: &[PageView]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.date))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.hour))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.lang.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.site.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.hits))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.size))),
    ];
    Ok(RecordBatch::try_new(schema(), columns)?)
}

/// The first `n` rows across `batches`.
pub fn head(batches: &[RecordBatch], n: usize) -> Vec<RecordBatch> {
    let mut left = n;
    let mut out = Vec::new();
    for batch in batches {
        if left == 0 {
            break;
        }
        let take = left.min(batch.num_rows());
        out.push(batch.slice(0, take));
        left -= take;
    }
    out
}

/// Renders batches as an ASCII table.
pub fn render(batches: &[RecordBatch]) -> Result<String> {
    Ok(pretty_format_batches(batches)?.to_string())
}

/// Writes batches to a Snappy-compressed Parquet file.
pub fn write_parquet(path: &Path, batches: &[RecordBatch]) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    // WriterProperties can be used to set Parquet file options
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema(), Some(props))?;
    let mut rows = 0;
    for batch in batches {
        writer.write(batch)?;
        rows += batch.num_rows();
    }
    // writer must be closed to write footer
    writer.close()?;
    Ok(rows)
}

/// A query session with the page views registered as one table.
pub struct HitsTable {
    ctx: SessionContext,
    name: String,
    batches: Vec<RecordBatch>,
}

impl HitsTable {
    pub fn new(name: &str, rows: &[PageView]) -> Result<Self> {
        let batches = vec![rows_to_batch(rows)?];
        let ctx = SessionContext::new();
        let table = MemTable::try_new(schema(), vec![batches.clone()])?;
        ctx.register_table(name, Arc::new(table))?;
        info!(table = name, rows = rows.len(), "registered table");
        Ok(Self {
            ctx,
            name: name.to_string(),
            batches,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// A tree listing of the columns, one per line.
    pub fn print_schema(&self) -> String {
        let mut out = String::from("root\n");
        for field in schema().fields() {
            out.push_str(&format!(
                " |-- {}: {} (nullable = {})\n",
                field.name(),
                field.data_type(),
                field.is_nullable()
            ));
        }
        out
    }

    pub async fn frame(&self) -> Result<DataFrame> {
        Ok(self.ctx.table(self.name.as_str()).await?)
    }

    pub async fn select(&self, columns: &[&str]) -> Result<Vec<RecordBatch>> {
        Ok(self.frame().await?.select_columns(columns)?.collect().await?)
    }

    /// Rows whose string `column` equals `value`.
    pub async fn filter_eq(&self, column: &str, value: &str) -> Result<Vec<RecordBatch>> {
        Ok(self
            .frame()
            .await?
            .filter(col(column).eq(lit(value)))?
            .collect()
            .await?)
    }

    /// Row count per distinct value of `column`, most frequent first.
    pub async fn count_by(&self, column: &str) -> Result<Vec<RecordBatch>> {
        self.sql(&format!(
            "SELECT {column}, count(*) AS \"count\" FROM {} GROUP BY {column} ORDER BY \"count\" DESC, {column}",
            self.name
        ))
        .await
    }

    pub async fn sql(&self, query: &str) -> Result<Vec<RecordBatch>> {
        let df = self
            .ctx
            .sql(query)
            .await
            .with_context(|| format!("planning query: {query}"))?;
        Ok(df.collect().await?)
    }
}
