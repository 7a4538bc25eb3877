use anyhow::{Context, Result};
use clap::Parser;
use pagecounts::plan::{Action, Materialized, Plan};
use pagecounts::standalone::{engine::Engine, Args, Commands, TableArgs};
use pagecounts::table::{self, HitsTable};
use pagecounts::utils::string_from_bytes;
use pagecounts::{workload, KeyValue};
use tracing_subscriber::EnvFilter;

/// Rows printed by the `frame` examples.
const SHOW_ROWS: usize = 20;

fn print_values(records: Vec<KeyValue>) -> Result<()> {
    for kv in records {
        println!("{}", string_from_bytes(kv.value)?);
    }
    Ok(())
}

fn report(saved: Materialized) {
    if let Materialized::Saved { dir, files, records } = saved {
        println!("Wrote {records} lines to {files} files in {}", dir.display());
    }
}

/// Reads the tagged lines and registers them as a table.
fn load_table(engine: &Engine, args: &Args, table: &TableArgs) -> Result<HitsTable> {
    let input = table
        .input
        .clone()
        .unwrap_or_else(|| args.layout().dated_glob());
    let plan = Plan::read(input).map(workload::lines::map);
    let records = engine.materialize(&plan, Action::Collect)?.records()?;
    let lines = records
        .into_iter()
        .map(|kv| string_from_bytes(kv.value))
        .collect::<Result<Vec<_>>>()?;
    let rows = table::parse_rows(lines.iter().map(String::as_str), engine.config().malformed)?;
    HitsTable::new(&table.table, &rows)
}

async fn run(engine: &Engine, args: &Args) -> Result<()> {
    let config = engine.config();
    let layout = args.layout();
    let dated = |input: &Option<String>| input.clone().unwrap_or_else(|| layout.dated_glob());

    match &args.command {
        Commands::Tag { input, output } => {
            let input = input.clone().unwrap_or_else(|| layout.raw_glob());
            let output = output.clone().unwrap_or_else(|| layout.dated_dir());
            let plan = Plan::read(input).workload(workload::named("tag")?, config.partitions);
            report(engine.materialize(&plan, Action::Save(output))?);
        }
        Commands::Count { input } => {
            let plan = Plan::read(dated(input)).map(workload::lines::map);
            let num = engine.materialize(&plan, Action::Count)?.count()?;
            println!("There are {num} lines.");
        }
        Commands::Take { input, n } => {
            let plan = Plan::read(dated(input)).map(workload::lines::map);
            print_values(engine.materialize(&plan, Action::Take(*n))?.records()?)?;
        }
        Commands::Find {
            input,
            filter,
            count,
            n,
        } => {
            let plan = Plan::read(dated(input))
                .with_args(&filter.to_argv(config.malformed))?
                .map(workload::find::map);
            if *count {
                let num = engine.materialize(&plan, Action::Count)?.count()?;
                println!("{num} matching lines.");
            } else {
                print_values(engine.materialize(&plan, Action::Take(*n))?.records()?)?;
            }
        }
        Commands::Hits {
            input,
            output,
            filter,
        } => {
            let output = output.clone().unwrap_or_else(|| layout.counts_dir());
            // a single output file
            let plan = Plan::read(dated(input))
                .with_args(&filter.to_argv(config.malformed))?
                .workload(workload::named("hits")?, config.reduce_partitions)
                .repartition(1);
            report(engine.materialize(&plan, Action::Save(output))?);
        }
        Commands::Median { input } => {
            let plan = Plan::read(dated(input))
                .with_args(&["--malformed".to_string(), config.malformed.as_str().to_string()])?
                .workload(workload::named("median")?, config.reduce_partitions);
            let mut rows = engine
                .materialize(&plan, Action::Collect)?
                .records()?
                .into_iter()
                .map(|kv| string_from_bytes(kv.value))
                .collect::<Result<Vec<_>>>()?;
            rows.sort();
            for row in rows {
                println!("{row}");
            }
        }
        Commands::Frame { table: t, lang } => {
            let hits = load_table(engine, args, t)?;
            print!("{}", hits.print_schema());
            let sites = hits.select(&["site"]).await?;
            println!("{}", table::render(&table::head(&sites, SHOW_ROWS))?);
            let in_lang = hits.filter_eq("lang", lang).await?;
            println!("{}", table::render(&table::head(&in_lang, SHOW_ROWS))?);
            let by_lang = hits.count_by("lang").await?;
            println!("{}", table::render(&table::head(&by_lang, SHOW_ROWS))?);
        }
        Commands::Sql { table: t, query } => {
            let hits = load_table(engine, args, t)?;
            let results = hits.sql(query).await?;
            println!("{}", table::render(&results)?);
        }
        Commands::Export { table: t, output } => {
            let hits = load_table(engine, args, t)?;
            let rows = table::write_parquet(output, hits.batches())
                .with_context(|| format!("exporting {}", hits.name()))?;
            println!("Wrote {rows} rows to {}", output.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let engine = Engine::new(args.engine_config())?;
    let result = run(&engine, &args).await;
    engine.shutdown();
    result
}
