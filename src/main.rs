use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rusty_etl::config::{JobConfig, SourceConfig, load_config};
use rusty_etl::data::model::{Dataset, Table};
use rusty_etl::labels::{column_headers, label_template, sample_headers};
use rusty_etl::layout::{RunLayout, merge_only};
use rusty_etl::pipeline::{default_imports, process};
use rusty_etl::source::DataSource;
use rusty_etl::writer::{Sheet, export_entries, write_workbook};

#[derive(Parser)]
#[command(
    name = "rusty-etl",
    version,
    about = "Merge measurement files into computed spreadsheets"
)]
struct Cli {
    /// Job file (TOML). Falls back to $RUSTY_ETL_CONFIG
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every data source and write the workbook
    Run {
        /// Workbook to write
        #[arg(short, long, default_value = "output.xlsx")]
        output: PathBuf,

        /// Also export the numeric entries as CSV files into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Only merge the imported data, skipping every function
        #[arg(long)]
        no_functions: bool,
    },

    /// Print the column label template of each data source
    Labels,

    /// Validate the job file without loading any data
    Check,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let job = load_config(cli.config)?;

    match cli.command {
        Commands::Run {
            output,
            csv_dir,
            no_functions,
        } => run(&job, &output, csv_dir.as_deref(), no_functions),
        Commands::Labels => {
            for source_config in &job.sources {
                let source = source_config.build_source()?;
                println!("{}\n", label_template(&source));
            }
            Ok(())
        }
        Commands::Check => {
            for source_config in &job.sources {
                let source = source_config.build_source()?;
                let entries: usize = source_config
                    .datasets
                    .iter()
                    .flat_map(|d| &d.samples)
                    .map(|s| s.entries.len())
                    .sum();
                println!(
                    "{source}: ok ({} datasets, {entries} entries)",
                    source_config.datasets.len()
                );
            }
            Ok(())
        }
    }
}

/// Merged tables, split numeric entries and the layout of one source.
fn process_source(
    source_config: &SourceConfig,
    source: &DataSource,
    no_functions: bool,
) -> Result<(Vec<Table>, Vec<Dataset>, RunLayout)> {
    let datasets = source_config.load_datasets(source)?;

    if no_functions {
        let (tables, layout) = merge_only(datasets);
        let entries = layout.split(tables.clone())?;
        return Ok((tables, entries, layout));
    }

    let imports = default_imports(source, &datasets);
    let processed = process(source, datasets, imports)?;
    Ok((processed.formula_tables, processed.entries, processed.layout))
}

fn run(
    job: &JobConfig,
    output: &Path,
    csv_dir: Option<&Path>,
    no_functions: bool,
) -> Result<()> {
    let mut sheets = Vec::new();
    for source_config in &job.sources {
        let source = source_config.build_source()?;
        let (tables, entries, layout) = process_source(source_config, &source, no_functions)
            .with_context(|| format!("processing {source}"))?;

        let (row_offset, column_offset) = source.excel_offsets();
        for (i, table) in tables.into_iter().enumerate() {
            sheets.push(Sheet {
                name: source_config.sheet_name(i),
                samples: sample_headers(&source_config.sample_names(i), &layout, i),
                column_labels: column_headers(&source, &layout, i),
                table,
                row_offset,
                column_offset,
                styles: source.styles().clone(),
            });
        }

        if let Some(dir) = csv_dir {
            export_entries(dir, source.name(), &entries)?;
        }
    }

    write_workbook(output, &sheets)?;
    println!("Wrote {} sheets to {}", sheets.len(), output.display());
    Ok(())
}
