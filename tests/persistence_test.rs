use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use treeclassif::model_manager::{self, ModelRecord};
use treeclassif::{
    Classifier, ClassifierConfig, ClassifierError, DialogueAct, InputEncoder, ModelError, Trainer, Tree,
    ValidationSet,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("treeclassif-persist-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn parse_das(lines: &[&str]) -> Vec<DialogueAct> {
    lines.iter().map(|s| s.parse().unwrap()).collect()
}

fn parse_trees(lines: &[&str]) -> Vec<Tree> {
    lines.iter().map(|s| s.parse().unwrap()).collect()
}

fn train(config: ClassifierConfig, das: &[&str], trees: &[&str], dir: &Path) -> Trainer {
    let mut trainer = Classifier::builder()
        .with_config(config)
        .unwrap()
        .with_training_data(parse_das(das), parse_trees(trees))
        .with_checkpoint_dir(dir)
        .build()
        .unwrap();
    trainer.train().unwrap();
    trainer
}

fn small_config() -> ClassifierConfig {
    ClassifierConfig {
        num_hidden_units: 8,
        passes: 20,
        alpha: 0.05,
        seed: Some(13),
        ..ClassifierConfig::default()
    }
}

const DAS: [&str; 3] = ["inform(food=Chinese)", "inform(area=north)", "inform(price=cheap)"];
const TREES: [&str; 3] = [
    "serve|v:fin chinese|adj:attr food|n:obj",
    "be|v:fin north|n:in+X part|n:of+X",
    "cost|v:fin cheap|adj:compl",
];
const HELD_OUT: [&str; 4] = [
    "serve|v:fin food|n:obj",
    "be|v:fin cheap|adj:compl north|n:in+X",
    "unknown|n:subj",
    "",
];

#[test]
fn test_round_trip_preserves_classification() -> Result<(), Box<dyn std::error::Error>> {
    let dir = scratch_dir("round-trip");
    let path = dir.join("model.json");
    let held_out = parse_trees(&HELD_OUT);

    let classifier = train(small_config(), &DAS, &TREES, &dir).into_classifier();
    classifier.save_to_file(&path)?;
    assert!(model_manager::params_path(&path).exists());

    let loaded = Classifier::load_from_file(&path)?;
    assert_eq!(loaded.classify(&held_out), classifier.classify(&held_out));
    assert_eq!(loaded.scores(&held_out), classifier.scores(&held_out));
    assert_eq!(loaded.info(), classifier.info());
    assert_eq!(loaded.config(), classifier.config());

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_round_trip_recurrent() -> Result<(), Box<dyn std::error::Error>> {
    let dir = scratch_dir("round-trip-rnn");
    let path = dir.join("rnn.json");
    let config = ClassifierConfig {
        nn: "emb".into(),
        nn_shape: "rnn".into(),
        emb_size: 6,
        max_tree_len: 5,
        ..small_config()
    };
    let held_out = parse_trees(&HELD_OUT);

    let classifier = train(config, &DAS, &TREES, &dir).into_classifier();
    classifier.save_to_file(&path)?;
    let loaded = Classifier::load_from_file(&path)?;
    assert!(matches!(loaded.input_encoder(), InputEncoder::Embeddings(_)));
    assert_eq!(loaded.classify(&held_out), classifier.classify(&held_out));

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_trainer_saves_best_checkpoint() -> Result<(), Box<dyn std::error::Error>> {
    let dir = scratch_dir("best");
    let path = dir.join("best.json");
    let config = ClassifierConfig {
        passes: 7,
        validation_freq: 5,
        ..small_config()
    };
    let trees = parse_trees(&TREES);
    let mut trainer = Classifier::builder()
        .with_config(config)?
        .with_training_data(parse_das(&DAS), trees.clone())
        .with_validation_data(ValidationSet::single(parse_das(&DAS), trees.clone())?)
        .with_checkpoint_dir(&dir)
        .build()?;
    trainer.train()?;
    trainer.save_to_file(&path)?;

    // the saved parameters are those of pass 5, not the final ones
    let loaded = Classifier::load_from_file(&path)?;
    trainer.restore_checkpoint()?;
    assert_eq!(loaded.scores(&trees), trainer.classifier().scores(&trees));

    drop(trainer);
    let leftover: Vec<_> = fs::read_dir(&dir)?
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "ckpt"))
        .collect();
    assert!(leftover.is_empty(), "checkpoint not cleaned up: {:?}", leftover);

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_stale_record_shape_mismatch() -> Result<(), Box<dyn std::error::Error>> {
    let dir = scratch_dir("stale");
    let small_path = dir.join("small.json");
    let large_path = dir.join("large.json");

    train(small_config(), &DAS[..2], &TREES[..2], &dir)
        .into_classifier()
        .save_to_file(&small_path)?;
    train(small_config(), &DAS, &TREES, &dir)
        .into_classifier()
        .save_to_file(&large_path)?;

    // pair the small record with the large model's parameters
    let large_params = model_manager::params_path(&large_path);
    fs::copy(&large_params, model_manager::params_path(&small_path))?;
    let mut record: ModelRecord = serde_json::from_slice(&fs::read(&small_path)?)?;
    record.params_sha256 = model_manager::file_sha256(&large_params)?;
    model_manager::save_record(&small_path, &record)?;

    let err = Classifier::load_from_file(&small_path).unwrap_err();
    assert!(matches!(err, ClassifierError::ShapeMismatch { .. }), "got {:?}", err);

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_tampered_params_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = scratch_dir("tampered");
    let path = dir.join("model.json");
    train(small_config(), &DAS, &TREES, &dir)
        .into_classifier()
        .save_to_file(&path)?;

    let params = model_manager::params_path(&path);
    let mut bytes = fs::read(&params)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&params, bytes)?;

    let err = Classifier::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ClassifierError::Model(ModelError::HashMismatch { .. })), "got {:?}", err);

    fs::remove_file(&params)?;
    let err = Classifier::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ClassifierError::Model(ModelError::MissingFile(_))), "got {:?}", err);

    fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn test_inconsistent_record_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = scratch_dir("inconsistent");
    let path = dir.join("model.json");
    train(small_config(), &DAS, &TREES, &dir)
        .into_classifier()
        .save_to_file(&path)?;

    let mut record: ModelRecord = serde_json::from_slice(&fs::read(&path)?)?;
    record.num_outputs += 1;
    fs::write(&path, serde_json::to_vec(&record)?)?;

    let err = Classifier::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ClassifierError::Model(ModelError::InvalidRecord(_))), "got {:?}", err);

    fs::remove_dir_all(&dir)?;
    Ok(())
}
