use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use treeclassif::corpus::{read_das, read_trees};
use treeclassif::{Classifier, ClassifierConfig, DialogueAct, ValidationSet};

#[derive(Parser)]
#[command(author, version, about = "Tree to dialogue act item classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a classifier and save the best checkpoint.
    Train {
        /// JSON configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Training dialogue acts, one per line
        #[arg(long)]
        das: PathBuf,

        /// Training trees, one per line, parallel to the DAs
        #[arg(long)]
        trees: PathBuf,

        /// Where to write the model record (parameters go next to it)
        #[arg(short, long)]
        output: PathBuf,

        /// Portion of the training data to use
        #[arg(long = "portion", default_value = "1.0")]
        data_portion: f64,

        /// Validation dialogue acts
        #[arg(long, requires = "valid_trees")]
        valid_das: Option<PathBuf>,

        /// Validation trees; give the option twice for two paraphrases per DA
        #[arg(long, requires = "valid_das", num_args = 1)]
        valid_trees: Vec<PathBuf>,
    },

    /// Print the labels a saved classifier predicts for each tree.
    Classify {
        #[arg(short, long)]
        model: PathBuf,

        #[arg(long)]
        trees: PathBuf,
    },

    /// Check trees against a dialogue act.
    Coverage {
        #[arg(short, long)]
        model: PathBuf,

        /// Dialogue act in compact form, e.g. `inform(food=Chinese)`
        #[arg(long)]
        da: String,

        #[arg(long)]
        trees: PathBuf,
    },
}

fn train(
    config: Option<PathBuf>,
    das: PathBuf,
    trees: PathBuf,
    output: PathBuf,
    data_portion: f64,
    valid_das: Option<PathBuf>,
    valid_trees: Vec<PathBuf>,
) -> Result<()> {
    let config = match config {
        Some(path) => ClassifierConfig::from_file(&path)
            .with_context(|| format!("Failed to read configuration {:?}", path))?,
        None => ClassifierConfig::default(),
    };
    let das = read_das(&das).with_context(|| format!("Failed to read DAs from {:?}", das))?;
    let trees = read_trees(&trees).with_context(|| format!("Failed to read trees from {:?}", trees))?;

    let mut builder = Classifier::builder()
        .with_config(config)?
        .with_training_data(das, trees)
        .with_data_portion(data_portion);

    if let Some(path) = valid_das {
        let valid_das = read_das(&path).with_context(|| format!("Failed to read DAs from {:?}", path))?;
        let mut refs = valid_trees
            .iter()
            .map(|p| read_trees(p).with_context(|| format!("Failed to read trees from {:?}", p)))
            .collect::<Result<Vec<_>>>()?;
        let validation = match refs.len() {
            1 => ValidationSet::single(valid_das, refs.remove(0))?,
            2 => {
                let second = refs.remove(1);
                ValidationSet::paired(valid_das, refs.remove(0), second)?
            }
            n => bail!("Expected one or two validation tree files, got {}", n),
        };
        builder = builder.with_validation_data(validation);
    }

    let start = Instant::now();
    let mut trainer = builder.build()?;
    let report = trainer.train()?;
    info!("Training took {:.2?}", start.elapsed());
    if !report.checkpoint_passes().is_empty() {
        info!("Checkpoints written after passes {:?}", report.checkpoint_passes());
    }
    trainer
        .save_to_file(&output)
        .with_context(|| format!("Failed to save model to {:?}", output))?;
    println!("Model saved to {}", output.display());
    Ok(())
}

fn classify(model: PathBuf, trees: PathBuf) -> Result<()> {
    let classifier = Classifier::load_from_file(&model)
        .with_context(|| format!("Failed to load model from {:?}", model))?;
    let trees = read_trees(&trees).with_context(|| format!("Failed to read trees from {:?}", trees))?;
    let predicted = classifier.classify(&trees);
    for (tree, row) in trees.iter().zip(predicted.rows()) {
        let labels: Vec<&str> = row
            .iter()
            .zip(classifier.labels())
            .filter(|(on, _)| **on != 0)
            .map(|(_, label)| label.as_str())
            .collect();
        println!("{}\t{}", tree, labels.join(" "));
    }
    Ok(())
}

fn coverage(model: PathBuf, da: String, trees: PathBuf) -> Result<()> {
    let classifier = Classifier::load_from_file(&model)
        .with_context(|| format!("Failed to load model from {:?}", model))?;
    let da: DialogueAct = da.parse()?;
    let trees = read_trees(&trees).with_context(|| format!("Failed to read trees from {:?}", trees))?;

    let run = classifier.init_run(&da);
    let subset = classifier.is_subset_of_cur_da(&run, &trees)?;
    let exact = classifier.corresponds_to_cur_da(&run, &trees)?;
    let dist = classifier.dist_to_cur_da(&run, &trees)?;
    println!("subset\texact\tdist\ttree");
    for (i, tree) in trees.iter().enumerate() {
        println!("{}\t{}\t{}\t{}", subset[i], exact[i], dist[i], tree);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            das,
            trees,
            output,
            data_portion,
            valid_das,
            valid_trees,
        } => train(config, das, trees, output, data_portion, valid_das, valid_trees),
        Command::Classify { model, trees } => classify(model, trees),
        Command::Coverage { model, da, trees } => coverage(model, da, trees),
    }
}
