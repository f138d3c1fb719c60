use criterion::{black_box, criterion_group, criterion_main, Criterion};
use treeclassif::classifier::TreeEmbeddingExtractor;
use treeclassif::{Classifier, ClassifierConfig, DialogueAct, Tree};

fn synthetic_data(n: usize) -> (Vec<DialogueAct>, Vec<Tree>) {
    let das = (0..n)
        .map(|i| format!("inform(slot{}=value{})", i % 7, i % 5).parse().unwrap())
        .collect();
    let trees = (0..n)
        .map(|i| {
            format!(
                "be|v:fin slot{}|n:subj value{}|adj:attr extra{}|n:obj",
                i % 7,
                i % 5,
                i % 11
            )
            .parse()
            .unwrap()
        })
        .collect();
    (das, trees)
}

fn setup_benchmark_classifier(config: ClassifierConfig) -> Classifier {
    let (das, trees) = synthetic_data(40);
    let mut trainer = Classifier::builder()
        .with_config(config)
        .unwrap()
        .with_training_data(das, trees)
        .build()
        .unwrap();
    trainer.train().unwrap();
    trainer.into_classifier()
}

fn bench_embedding_extraction(c: &mut Criterion) {
    let (_, trees) = synthetic_data(200);
    let mut extractor = TreeEmbeddingExtractor::new(25);
    extractor.init_dict(&trees);

    c.bench_function("get_embeddings_200", |b| {
        b.iter(|| {
            for tree in black_box(&trees) {
                black_box(extractor.get_embeddings(tree));
            }
        })
    });
}

fn bench_training_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("Training");
    group.sample_size(20);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let configs = vec![
        ("ff2", ClassifierConfig { nn_shape: "ff".into(), ..Default::default() }),
        ("rnn", ClassifierConfig { nn: "emb".into(), nn_shape: "rnn".into(), ..Default::default() }),
    ];

    for (name, config) in configs {
        let config = ClassifierConfig {
            num_hidden_units: 64,
            emb_size: 16,
            max_tree_len: 8,
            passes: 1,
            seed: Some(1),
            ..config
        };
        let (das, trees) = synthetic_data(40);
        group.bench_function(format!("one_pass_{}", name), |b| {
            b.iter(|| {
                let mut trainer = Classifier::builder()
                    .with_config(config.clone())
                    .unwrap()
                    .with_training_data(das.clone(), trees.clone())
                    .build()
                    .unwrap();
                black_box(trainer.train().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_coverage(c: &mut Criterion) {
    let mut group = c.benchmark_group("Coverage");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let (das, trees) = synthetic_data(200);
    for (name, max_cores) in [("single_thread", Some(1)), ("all_cores", None)] {
        let classifier = setup_benchmark_classifier(ClassifierConfig {
            num_hidden_units: 64,
            passes: 2,
            seed: Some(1),
            max_cores,
            ..Default::default()
        });
        let run = classifier.init_run(&das[0]);

        group.bench_function(format!("classify_200_{}", name), |b| {
            b.iter(|| classifier.classify(black_box(&trees)))
        });
        group.bench_function(format!("is_subset_of_cur_da_200_{}", name), |b| {
            b.iter(|| classifier.is_subset_of_cur_da(&run, black_box(&trees)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_embedding_extraction, bench_training_pass, bench_coverage);
criterion_main!(benches);
