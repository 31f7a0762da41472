// main.rs

// --- External Crate Imports ---
use anyhow::{anyhow, Error, Result};
use clap::Parser;
use fnc_prep::{DatasetLoader, PreparedDataset};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::time::Instant;

// --- Main Function ---
fn main() -> Result<(), Error> {
    let total_time_start = Instant::now();
    let cli_args = cli::CliArgs::parse();

    // Initialize logger
    let log_level = cli_args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: Invalid log level '{}' provided. Defaulting to Info.",
                cli_args.log_level
            );
            log::LevelFilter::Info
        });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    info!("Starting fnc_prep with args: {:?}", cli_args);

    // Configure Rayon thread pool
    let num_threads = cli_args.threads.unwrap_or_else(num_cpus::get);
    info!("Using {} threads for parallel operations.", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    // --- 1. Load and prepare ---
    let layout = cli_args.layout();
    let split_sizes = cli_args.split_sizes(&layout)?;
    info!(
        "Preparing dataset in {} ({} subjects x {} components x {} timepoints, keeping {} components).",
        cli_args.root.display(),
        layout.subjects,
        layout.raw_components,
        layout.timepoints,
        layout.selected_components
    );

    let pb_style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} subjects ({percent}%) ETA: {eta}",
        )
        .map_err(|e| anyhow!("Failed to create progress bar style: {}", e))?
        .progress_chars("=> ");
    let pb_subjects = ProgressBar::new(layout.subjects as u64).with_style(pb_style);

    let dataset = DatasetLoader::new(&cli_args.root, layout)
        .with_progress(pb_subjects)
        .load()?;

    // --- 2. Write Outputs ---
    if let Some(prefix) = &cli_args.output_prefix {
        let split_sizes = cli_args.split.then_some(split_sizes);
        output_writer::write_dataset(prefix, &dataset, split_sizes.as_ref())?;
    }

    println!("..............Done with file reading and preprocessing.............");
    print_summary(&dataset);

    info!(
        "fnc_prep finished successfully in {:.2?}.",
        total_time_start.elapsed()
    );
    Ok(())
}

fn print_summary(dataset: &PreparedDataset) {
    println!("Correlation Matrix: {:?}", dataset.correlations.shape());
    println!("Data: {:?}", dataset.time_series.shape());
    println!("Flattened FC: {:?}", dataset.fnc.shape());
    println!("Labels: {:?}", dataset.labels.shape());
}

// --- Module Implementations ---

mod cli {
    use anyhow::{anyhow, Result};
    use clap::Parser;
    use fnc_prep::{DatasetLayout, SplitSizes};
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(author, version, about = "Functional-connectivity feature preparation from ICA time courses.", long_about = None, propagate_version = true)]
    pub(crate) struct CliArgs {
        /// Directory holding the array archive and the three index files.
        #[arg(default_value = "./OASIS")]
        pub(crate) root: PathBuf,

        #[arg(short, long = "out")]
        pub(crate) output_prefix: Option<String>,

        /// With --out, also write train/test/val archives.
        #[arg(long, requires = "output_prefix")]
        pub(crate) split: bool,

        /// TRAIN,TEST,VAL subject counts; defaults to the OASIS-3 proportions
        /// of the cohort size.
        #[arg(long, value_delimiter = ',', requires = "split")]
        pub(crate) split_sizes: Option<Vec<usize>>,

        #[arg(short = 't', long)]
        pub(crate) threads: Option<usize>,

        #[arg(long, default_value = "Info")]
        pub(crate) log_level: String,

        #[arg(long)]
        pub(crate) dataset_key: Option<String>,

        #[arg(long)]
        pub(crate) subjects: Option<usize>,

        #[arg(long)]
        pub(crate) raw_components: Option<usize>,

        #[arg(long)]
        pub(crate) timepoints: Option<usize>,

        #[arg(long)]
        pub(crate) selected_components: Option<usize>,
    }

    impl CliArgs {
        pub(crate) fn layout(&self) -> DatasetLayout {
            let defaults = DatasetLayout::oasis3();
            DatasetLayout {
                dataset_key: self
                    .dataset_key
                    .clone()
                    .unwrap_or_else(|| defaults.dataset_key.clone()),
                subjects: self.subjects.unwrap_or(defaults.subjects),
                raw_components: self.raw_components.unwrap_or(defaults.raw_components),
                timepoints: self.timepoints.unwrap_or(defaults.timepoints),
                selected_components: self
                    .selected_components
                    .unwrap_or(defaults.selected_components),
                ..defaults
            }
        }

        pub(crate) fn split_sizes(&self, layout: &DatasetLayout) -> Result<SplitSizes> {
            match self.split_sizes.as_deref() {
                None => Ok(SplitSizes::scaled_to(layout.subjects)),
                Some(&[train, test, validation]) => Ok(SplitSizes {
                    train,
                    test,
                    validation,
                }),
                Some(other) => Err(anyhow!(
                    "--split-sizes expects TRAIN,TEST,VAL, got {} values.",
                    other.len()
                )),
            }
        }
    }

}

mod output_writer {
    use super::{anyhow, info, PreparedDataset, Result};
    use fnc_prep::array_store::write_prepared;
    use fnc_prep::SplitSizes;
    use std::path::PathBuf;

    fn output_path(prefix: &str, suffix: &str) -> Result<PathBuf> {
        let path = PathBuf::from(format!("{}.{}", prefix, suffix));
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow!("Failed to create output directory {}: {}", parent.display(), e)
                })?;
                info!("Created output directory: {}", parent.display());
            }
        }
        Ok(path)
    }

    pub(crate) fn write_dataset(
        output_prefix: &str,
        dataset: &PreparedDataset,
        split_sizes: Option<&SplitSizes>,
    ) -> Result<()> {
        info!("Writing results to files with prefix '{}'...", output_prefix);
        write_prepared(&output_path(output_prefix, "fnc.npz")?, dataset)?;

        if let Some(sizes) = split_sizes {
            let splits = dataset.split(sizes);
            info!(
                "Split sizes: train={}, test={}, val={}",
                splits.train.subject_count(),
                splits.test.subject_count(),
                splits.validation.subject_count()
            );
            write_prepared(&output_path(output_prefix, "train.npz")?, &splits.train)?;
            write_prepared(&output_path(output_prefix, "test.npz")?, &splits.test)?;
            write_prepared(&output_path(output_prefix, "val.npz")?, &splits.validation)?;
        }
        Ok(())
    }
}
