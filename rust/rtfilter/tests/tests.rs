use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{
    Arc,
    Mutex,
};

use tracing::{
    Event,
    Subscriber,
};
use tracing_subscriber::layer::{
    Context,
    SubscriberExt,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use rtfilter::classifier::ClassifierMethod;
use rtfilter::io::{
    read_inputs,
    write_outputs,
};
use rtfilter::{
    AlignmentTable,
    ColumnNames,
    ExclusionPolicy,
    FilterSpec,
    RawTable,
    RtFilterConfig,
    Strictness,
    process,
};

const HEADERS: [&str; 7] = [
    "Sequence",
    "Raw file",
    "Retention time",
    "Retention length",
    "PEP",
    "Proteins",
    "Leading razor protein",
];

const RUNS: [&str; 4] = ["run_01", "run_02", "run_03", "run_04"];

struct Obs {
    seq: String,
    run: &'static str,
    rt: f64,
    pep: String,
    protein: String,
}

fn to_raw(input_id: usize, obs: &[&Obs]) -> RawTable {
    RawTable::new(
        input_id,
        HEADERS,
        obs.iter().map(|o| {
            vec![
                o.seq.clone(),
                o.run.to_string(),
                o.rt.to_string(),
                "0.1".to_string(),
                o.pep.clone(),
                o.protein.clone(),
                o.protein.clone(),
            ]
        }),
    )
}

/// Runs 01 and 02 go to the first input, 03 and 04 to the second.
fn split_inputs(obs: &[Obs]) -> Vec<RawTable> {
    let first: Vec<&Obs> = obs
        .iter()
        .filter(|o| o.run == "run_01" || o.run == "run_02")
        .collect();
    let second: Vec<&Obs> = obs
        .iter()
        .filter(|o| o.run == "run_03" || o.run == "run_04")
        .collect();
    vec![to_raw(0, &first), to_raw(1, &second)]
}

fn target_peps(k: usize) -> [f64; 4] {
    [
        0.001 * (1 + k % 5) as f64,
        0.01 + 0.0005 * k as f64,
        0.05,
        0.002,
    ]
}

fn dataset(num_targets: usize, extra: &[(String, [f64; 4], String)]) -> Vec<Obs> {
    let mut out = Vec::new();
    for (r, &run) in RUNS.iter().enumerate() {
        for k in 0..num_targets {
            out.push(Obs {
                seq: format!("TARGET{:03}K", k),
                run,
                rt: 10.0 + k as f64 * 0.5 + r as f64 * 0.1,
                pep: target_peps(k)[r].to_string(),
                protein: format!("sp|P{:05}", k),
            });
        }
        for (j, (seq, peps, protein)) in extra.iter().enumerate() {
            out.push(Obs {
                seq: seq.clone(),
                run,
                rt: 50.0 + j as f64 * 0.5 + r as f64 * 0.1,
                pep: peps[r].to_string(),
                protein: protein.clone(),
            });
        }
    }
    out
}

fn decoys(n: usize) -> Vec<(String, [f64; 4], String)> {
    (0..n)
        .map(|j| {
            let j_f = j as f64;
            (
                format!("DECOY{:03}R", j),
                [0.30 + 0.001 * j_f, 0.32, 0.31, 0.33 - 0.001 * j_f],
                format!("REV__sp|Q{:05}", j),
            )
        })
        .collect()
}

fn config() -> RtFilterConfig {
    let mut config = RtFilterConfig::with_columns(ColumnNames {
        sequence: Some("Sequence".to_string()),
        raw_file: Some("Raw file".to_string()),
        retention_time: Some("Retention time".to_string()),
        retention_length: Some("Retention length".to_string()),
        pep: Some("PEP".to_string()),
        proteins: Some("Proteins".to_string()),
        leading_protein: Some("Leading razor protein".to_string()),
        ..Default::default()
    });
    config.use_unmodified_sequence = true;
    config.min_psms_per_experiment = 5;
    config
}

fn flagged_sequences(output: &rtfilter::PipelineOutput) -> BTreeSet<String> {
    output
        .table
        .psms
        .iter()
        .filter(|p| p.flagged)
        .map(|p| p.sequence.clone())
        .collect()
}

#[test]
fn test_decoy_classifier_end_to_end() {
    let raw = split_inputs(&dataset(60, &decoys(20)));
    let mut config = config();
    config.protein_decoy_tag = Some("REV__".to_string());

    let output = process(&raw, &config).unwrap();
    assert_eq!(output.classifier.method, ClassifierMethod::Svm);
    assert_eq!(output.classifier.num_qualifying, 80);
    assert!(output.classifier.auc.unwrap() > 0.9);
    assert!(!output.classifier.inverted);

    let flagged = flagged_sequences(&output);
    assert!(flagged.iter().all(|s| s.starts_with("DECOY")), "{:?}", flagged);
    assert!(flagged.len() >= 10, "Only {} decoys flagged", flagged.len());
}

#[test]
fn test_pipeline_is_deterministic() {
    let raw = split_inputs(&dataset(60, &decoys(20)));
    let mut config = config();
    config.protein_decoy_tag = Some("REV__".to_string());
    config.filters = vec![FilterSpec::Smears {
        value: Some(0.5),
        dynamic: Some(true),
    }];

    let a = process(&raw, &config).unwrap();
    let b = process(&raw, &config).unwrap();
    assert_eq!(a.table.flags(), b.table.flags());
    assert_eq!(a.classifier, b.classifier);
    let cutoff = a.classifier.cutoff.unwrap();
    assert_eq!(cutoff.to_bits(), b.classifier.cutoff.unwrap().to_bits());
}

#[test]
fn test_fallback_heuristic_without_decoy_labels() {
    let extra = vec![
        // min 0.049 > 0.01 and a cv of about 0.015
        (
            "STABLEK".to_string(),
            [0.050, 0.051, 0.049, 0.050],
            "sp|X1".to_string(),
        ),
        // cv is low, but min 0.005 is confident enough
        (
            "CONFIDENTK".to_string(),
            [0.005, 0.0052, 0.0051, 0.005],
            "sp|X2".to_string(),
        ),
    ];
    let raw = split_inputs(&dataset(20, &extra));
    let output = process(&raw, &config()).unwrap();

    assert_eq!(output.classifier.method, ClassifierMethod::Heuristic);
    let flagged = flagged_sequences(&output);
    assert_eq!(flagged, BTreeSet::from(["STABLEK".to_string()]));
}

#[test]
fn test_degenerate_classifier_is_noop() {
    // Tag configured, but no peptide carries it.
    let raw = split_inputs(&dataset(20, &[]));
    let mut config = config();
    config.protein_decoy_tag = Some("REV__".to_string());
    let output = process(&raw, &config).unwrap();
    assert_eq!(output.classifier.method, ClassifierMethod::Skipped);
    assert_eq!(output.table.num_flagged(), 0);
}

#[test]
fn test_zero_pep_rows_stay_in_the_table() {
    let mut obs = dataset(10, &[]);
    for r in 0..RUNS.len() {
        obs[r * 10].pep = "0".to_string();
    }
    let raw = split_inputs(&obs);
    let output = process(&raw, &config()).unwrap();
    assert_eq!(output.table.len(), obs.len());
    assert!(output.dropped_ids.is_empty());
    let zero_ids: Vec<usize> = output
        .table
        .psms
        .iter()
        .filter(|p| p.pep == 0.0)
        .map(|p| p.id)
        .collect();
    assert_eq!(zero_ids, vec![0, 10, 20, 30]);

    let alignment = AlignmentTable::build(&output.table, ExclusionPolicy::Exclude, 0.5);
    assert_eq!(alignment.len(), obs.len());
}

#[test]
fn test_null_pep_rows_are_removed() {
    let mut obs = dataset(10, &[]);
    obs[3].pep = "".to_string();
    obs[4].pep = "NaN".to_string();
    let raw = split_inputs(&obs);
    let output = process(&raw, &config()).unwrap();
    assert_eq!(output.table.len(), obs.len() - 2);
    assert_eq!(output.dropped_ids, vec![3, 4]);
    assert!(output.table.psms.iter().all(|p| p.id != 3 && p.id != 4));
}

#[test]
fn test_num_exps_filter_end_to_end() {
    let mut obs = dataset(10, &[]);
    // TARGET000K only confidently seen in runs 01 and 02
    for o in obs.iter_mut() {
        if o.seq == "TARGET000K" && (o.run == "run_03" || o.run == "run_04") {
            o.pep = "0.9".to_string();
        }
    }
    let raw = split_inputs(&obs);
    let mut config = config();
    config.filters = vec![FilterSpec::NumExps { value: Some(3) }];
    let output = process(&raw, &config).unwrap();
    assert_eq!(
        flagged_sequences(&output),
        BTreeSet::from(["TARGET000K".to_string()])
    );
}

#[test]
fn test_strict_and_lenient_retention_length() {
    let raw = split_inputs(&dataset(10, &[]));
    let mut config = config();
    // Larger than any retention time in the data.
    config.filters = vec![FilterSpec::RetentionLength {
        value: Some(1000.0),
        dynamic: None,
    }];

    config.strictness = Strictness::Strict;
    let err = process(&raw, &config).unwrap_err();
    assert!(err.is_config_error());

    config.strictness = Strictness::Lenient;
    let output = process(&raw, &config).unwrap();
    assert_eq!(output.table.num_flagged(), 0);
}

#[test]
fn test_single_experiment_is_rejected() {
    let obs: Vec<Obs> = dataset(10, &[])
        .into_iter()
        .filter(|o| o.run == "run_01")
        .collect();
    let refs: Vec<&Obs> = obs.iter().collect();
    let mut config = config();
    config.num_experiments = 1;
    let err = process(&[to_raw(0, &refs)], &config).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_seeded_remove_column_skips_filters() {
    let obs = dataset(10, &[]);
    let mut raw = split_inputs(&obs);
    for table in raw.iter_mut() {
        let mut headers: Vec<String> = table.headers.iter().map(|h| h.to_string()).collect();
        headers.push("remove".to_string());
        table.headers = headers.into_iter().collect();
        let seq_col = table.column_index("Sequence").unwrap();
        for row in table.rows.iter_mut() {
            let flag = if row.get(seq_col) == Some("TARGET001K") {
                "True"
            } else {
                "False"
            };
            row.push_field(flag);
        }
    }
    let mut config = config();
    config.col_names.remove = Some("remove".to_string());
    // Would flag every row if it ran.
    config.filters = vec![FilterSpec::Pep {
        value: Some(0.0001),
    }];

    let output = process(&raw, &config).unwrap();
    assert_eq!(
        flagged_sequences(&output),
        BTreeSet::from(["TARGET001K".to_string()])
    );
}

#[test]
fn test_remove_policy_output_is_reranked_and_sorted() {
    let raw = split_inputs(&dataset(10, &[]));
    let mut config = config();
    config.policy = ExclusionPolicy::Remove;
    config.filters = vec![FilterSpec::ExcludeFilename {
        expr: Some("run_01".to_string()),
    }];

    let output = process(&raw, &config).unwrap();
    let alignment = AlignmentTable::build(&output.table, config.policy, config.pep_threshold);
    assert_eq!(alignment.len(), 30);
    let exps: BTreeSet<usize> = alignment.rows.iter().map(|r| r.exp_id).collect();
    assert_eq!(exps, BTreeSet::from([0, 1, 2]));
    assert!(alignment.rows.iter().all(|r| r.raw_file != "run_01"));

    let keys: Vec<(usize, usize)> = alignment
        .rows
        .iter()
        .map(|r| (r.peptide_id, r.exp_id))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_outputs_written_to_disk() {
    let dir = std::env::temp_dir().join("rtfilter_integration_outputs");
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    let input_dir = dir.join("inputs");
    std::fs::create_dir_all(&input_dir).unwrap();

    let mut inputs: Vec<PathBuf> = Vec::new();
    for raw in split_inputs(&dataset(10, &[])) {
        let path = input_dir.join(format!("evidence_{}.txt", raw.input_id));
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .unwrap();
        wtr.write_record(&raw.headers).unwrap();
        for row in raw.rows.iter() {
            wtr.write_record(row).unwrap();
        }
        wtr.flush().unwrap();
        inputs.push(path);
    }

    let mut config = config();
    config.input = inputs;
    config.output.directory = Some(dir.join("out"));
    config.output.save_separate_output = true;
    config.output.save_annotated_input = true;

    let raw = read_inputs(&config).unwrap();
    let output = process(&raw, &config).unwrap();
    let written = write_outputs(&raw, &output, &config).unwrap();
    assert_eq!(written.len(), 4);

    let out_dir = dir.join("out");
    let combined = std::fs::read_to_string(out_dir.join("converted.txt")).unwrap();
    let mut lines = combined.lines();
    assert_eq!(
        lines.next().unwrap(),
        "sequence\traw_file\tretention_time\tpep\texp_id\tpeptide_id\tinput_id\tid\texclude"
    );
    assert_eq!(lines.count(), 40);

    for i in 0..2 {
        let name = format!("evidence_{}_converted_{}.txt", i, i);
        let separate = std::fs::read_to_string(out_dir.join(name)).unwrap();
        assert_eq!(separate.lines().count(), 21);
    }

    let annotated = std::fs::read_to_string(out_dir.join("annotated_input.txt")).unwrap();
    let header = annotated.lines().next().unwrap();
    assert!(header.ends_with("\tinput_id\tid\texclude"), "{}", header);
    assert_eq!(annotated.lines().count(), 41);
}

/// Records, for every event, whether it was emitted inside the run span.
#[derive(Clone, Default)]
struct RunSpanRecorder {
    events: Arc<Mutex<Vec<(String, bool)>>>,
}

impl<S> Layer<S> for RunSpanRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let inside = ctx
            .event_scope(event)
            .map(|mut scope| scope.any(|span| span.name() == "rtfilter_run"))
            .unwrap_or(false);
        self.events
            .lock()
            .unwrap()
            .push((event.metadata().target().to_string(), inside));
    }
}

#[test]
fn test_every_stage_logs_inside_the_run_span() {
    let raw = split_inputs(&dataset(20, &decoys(10)));
    let mut config = config();
    config.protein_decoy_tag = Some("REV__".to_string());
    config.filters = vec![FilterSpec::Pep { value: Some(0.9) }];

    let recorder = RunSpanRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    tracing::subscriber::with_default(subscriber, || {
        process(&raw, &config).unwrap();
    });

    let events = recorder.events.lock().unwrap();
    let targets: BTreeSet<&str> = events.iter().map(|(t, _)| t.as_str()).collect();
    for module in [
        "rtfilter::convert",
        "rtfilter::filters",
        "rtfilter::pipeline",
        "rtfilter::classifier",
    ] {
        assert!(targets.contains(module), "No events from {}", module);
    }
    let outside: Vec<&String> = events
        .iter()
        .filter(|(_, inside)| !inside)
        .map(|(t, _)| t)
        .collect();
    assert!(outside.is_empty(), "Events outside the run span: {:?}", outside);
}
