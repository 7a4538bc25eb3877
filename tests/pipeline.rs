use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use flate2::{write::GzEncoder, Compression};
use pagecounts::config::{EngineConfig, Layout};
use pagecounts::output::{parse_count_row, parse_median_row};
use pagecounts::plan::{Action, Materialized, Plan};
use pagecounts::record::{MalformedPolicy, PageView};
use pagecounts::standalone::engine::{Engine, SUCCESS_MARKER};
use pagecounts::table::{self, HitsTable, DEFAULT_TABLE};
use pagecounts::utils::string_from_bytes;
use pagecounts::workload;

const HOUR_11: &str = "en Barack_Obama 13890 2291741206\n\
                       en Barack_Obama%2C_Sr. 6 181699\n\
                       de Barack_Obama 700 100\n\
                       fr Paris 3 50\n";
const HOUR_12: &str = "en Barack_Obama 10 2291741000\n\
                       en Public_image_of_Barack_Obama 41 1256906\n\
                       zh-min-nan Barack_Obama 2 300\n\
                       truncated\n";

fn write_gz(path: &Path, content: &str) {
    let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    enc.write_all(content.as_bytes()).unwrap();
    enc.finish().unwrap();
}

fn engine() -> Engine {
    Engine::new(EngineConfig {
        threads: Some(3),
        partitions: 4,
        reduce_partitions: 3,
        ..EngineConfig::default()
    })
    .unwrap()
}

/// Writes two raw dumps under `<base>/raw` and tags them into `<base>/dated`.
fn tagged(base: &Path, engine: &Engine) -> Layout {
    let layout = Layout::new(base);
    fs::create_dir_all(base.join("raw")).unwrap();
    write_gz(&base.join("raw/pagecounts-20081104-110000.gz"), HOUR_11);
    write_gz(&base.join("raw/pagecounts-20081104-120000.gz"), HOUR_12);

    let plan = Plan::read(layout.raw_glob())
        .workload(workload::named("tag").unwrap(), engine.config().partitions);
    let saved = engine
        .materialize(&plan, Action::Save(layout.dated_dir()))
        .unwrap();
    assert!(matches!(saved, Materialized::Saved { files: 4, records: 8, .. }));
    layout
}

fn dated_lines(layout: &Layout) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in glob::glob(&layout.dated_glob()).unwrap() {
        let content = fs::read_to_string(entry.unwrap()).unwrap();
        lines.extend(content.lines().map(str::to_string));
    }
    lines
}

fn hit_counts(records: Vec<pagecounts::KeyValue>) -> BTreeMap<String, u64> {
    records
        .into_iter()
        .map(|kv| {
            let (key, count) = parse_count_row(&string_from_bytes(kv.value).unwrap()).unwrap();
            (key.encode(), count)
        })
        .collect()
}

#[test]
fn tagging_prefixes_every_line() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    let layout = tagged(dir.path(), &engine);

    let mut lines = dated_lines(&layout);
    lines.sort();
    assert_eq!(lines.len(), 8);
    assert!(lines.contains(&"20081104 110000 en Barack_Obama 13890 2291741206".to_string()));
    assert!(lines.contains(&"20081104 120000 truncated".to_string()));
    assert!(lines
        .iter()
        .all(|l| l.starts_with("20081104 110000 ") || l.starts_with("20081104 120000 ")));
    assert!(layout.dated_dir().join(SUCCESS_MARKER).exists());

    // lines of one file keep their relative order inside each partition
    for entry in glob::glob(&layout.dated_glob()).unwrap() {
        let content = fs::read_to_string(entry.unwrap()).unwrap();
        let from_11: Vec<&str> = content
            .lines()
            .filter(|l| l.starts_with("20081104 110000 "))
            .collect();
        let expected: Vec<String> = HOUR_11
            .lines()
            .map(|l| format!("20081104 110000 {l}"))
            .filter(|l| from_11.contains(&l.as_str()))
            .collect();
        assert_eq!(from_11, expected);
    }

    // a second run does not clobber the first
    let plan = Plan::read(layout.raw_glob()).workload(workload::named("tag").unwrap(), 2);
    assert!(engine
        .materialize(&plan, Action::Save(layout.dated_dir()))
        .is_err());
}

#[test]
fn badly_named_dump_aborts_tagging() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("README"), "not a dump\n").unwrap();
    let plan = Plan::read(format!("{}/*", dir.path().display()))
        .workload(workload::named("tag").unwrap(), 2);
    let out = dir.path().join("dated");
    assert!(engine().materialize(&plan, Action::Save(out.clone())).is_err());
    assert!(!out.exists());
}

#[test]
fn hits_are_summed_per_date_hour_language() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine();
    let layout = tagged(dir.path(), &engine);

    let plan = Plan::read(layout.dated_glob())
        .with_args(&["--regex".to_string(), "Barack_Obama".to_string()])?
        .workload(workload::named("hits")?, 3)
        .repartition(1);

    let counts = hit_counts(engine.materialize(&plan, Action::Collect)?.records()?);
    let expected: BTreeMap<String, u64> = [
        ("20081104-110000-en", 13896),
        ("20081104-110000-de", 700),
        ("20081104-120000-en", 51),
        ("20081104-120000-zh-min-nan", 2),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    assert_eq!(counts, expected);

    let out = dir.path().join("obama-counts");
    engine.materialize(&plan, Action::Save(out.clone()))?;
    let written = fs::read_to_string(out.join("part-00000"))?;
    let mut rows: Vec<&str> = written.lines().collect();
    rows.sort();
    assert_eq!(
        rows,
        vec![
            "20081104,110000,de,700",
            "20081104,110000,en,13896",
            "20081104,120000,en,51",
            "20081104,120000,zh-min-nan,2",
        ]
    );
    Ok(())
}

#[test]
fn language_filter_narrows_hits() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine();
    let layout = tagged(dir.path(), &engine);

    let plan = Plan::read(layout.dated_glob())
        .with_args(&["--lang".to_string(), "en".to_string()])?
        .workload(workload::named("hits")?, 2);
    let counts = hit_counts(engine.materialize(&plan, Action::Collect)?.records()?);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["20081104-110000-en"], 13896);
    Ok(())
}

#[test]
fn sums_do_not_depend_on_line_order_or_layout() -> Result<()> {
    let lines = [
        "20081104 110000 en Barack_Obama 5 1",
        "20081104 110000 en Barack_Obama 7 1",
        "20081104 110000 de Barack_Obama 1 1",
        "20081104 120000 en Barack_Obama 11 1",
        "20081104 110000 en Barack_Obama 13 1",
    ];
    let engine = engine();
    let mut results = Vec::new();
    for (files, reducers) in [(1, 1), (2, 3), (5, 7)] {
        let dir = tempfile::tempdir()?;
        // reversed and dealt across a varying number of files
        for (i, line) in lines.iter().rev().enumerate() {
            let path = dir.path().join(format!("part-{:05}", i % files));
            let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(f, "{line}")?;
        }
        let plan = Plan::read(format!("{}/part-*", dir.path().display()))
            .workload(workload::named("hits")?, reducers);
        results.push(hit_counts(engine.materialize(&plan, Action::Collect)?.records()?));
    }
    assert_eq!(results[0]["20081104-110000-en"], 25);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
    Ok(())
}

#[test]
fn median_page_size_per_language() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine();
    let layout = tagged(dir.path(), &engine);

    let plan = Plan::read(layout.dated_glob()).workload(workload::named("median")?, 3);
    let medians: BTreeMap<String, f64> = engine
        .materialize(&plan, Action::Collect)?
        .records()?
        .into_iter()
        .map(|kv| parse_median_row(&string_from_bytes(kv.value)?))
        .collect::<Result<_>>()?;

    // en sizes: 2291741206, 181699, 2291741000, 1256906
    assert_eq!(medians["en"], (1256906.0 + 2291741000.0) / 2.0);
    assert_eq!(medians["de"], 100.0);
    assert_eq!(medians["fr"], 50.0);
    assert_eq!(medians["zh-min-nan"], 300.0);
    assert_eq!(medians.len(), 4);
    Ok(())
}

#[test]
fn count_and_find_actions() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine();
    let layout = tagged(dir.path(), &engine);

    let lines = Plan::read(layout.dated_glob()).map(workload::lines::map);
    assert_eq!(engine.materialize(&lines, Action::Count)?.count()?, 8);
    assert_eq!(engine.materialize(&lines, Action::Take(3))?.records()?.len(), 3);

    let find = Plan::read(layout.dated_glob())
        .with_args(&["--lang".to_string(), "en".to_string()])?
        .map(workload::find::map);
    assert_eq!(engine.materialize(&find, Action::Count)?.count()?, 4);

    let strict = Plan::read(layout.dated_glob())
        .with_args(&["--malformed".to_string(), "fail".to_string()])?
        .map(workload::find::map);
    assert!(engine.materialize(&strict, Action::Count).is_err());
    Ok(())
}

#[tokio::test]
async fn sql_over_tagged_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = engine();
    let layout = tagged(dir.path(), &engine);

    let plan = Plan::read(layout.dated_glob()).map(workload::lines::map);
    let lines: Vec<String> = engine
        .materialize(&plan, Action::Collect)?
        .records()?
        .into_iter()
        .map(|kv| string_from_bytes(kv.value))
        .collect::<Result<_>>()?;
    let rows = table::parse_rows(lines.iter().map(String::as_str), MalformedPolicy::Drop)?;
    assert_eq!(rows.len(), 7);
    assert!(rows.contains(&PageView::parse("20081104 110000 fr Paris 3 50")?));

    let hits = HitsTable::new(DEFAULT_TABLE, &rows)?;
    let summary = hits
        .sql("SELECT lang, count(*) AS n FROM wikiHits GROUP BY lang ORDER BY n DESC, lang LIMIT 20")
        .await?;
    let rendered = table::render(&summary)?;
    let first_row = rendered.lines().nth(3).unwrap_or_default();
    assert!(first_row.contains("en"), "{rendered}");
    assert!(first_row.contains('4'), "{rendered}");

    let out = dir.path().join("hits.parquet");
    assert_eq!(table::write_parquet(&out, hits.batches())?, 7);
    Ok(())
}
