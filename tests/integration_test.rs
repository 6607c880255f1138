//! Integration test: config load, corpus parse, feature widths, end-to-end training,
//! bundle round-trip and the online skip path.

use ids_agent::{
    alert::{AlertDispatcher, SeverityEngine},
    capture::{NdjsonReplay, RawPacket, TCP_ACK, TCP_SYN},
    config::{ClassifierKind, IdsConfig, PipelineConfig},
    corpus::{read_kdd, AttributeValue, RawRecord, KDD_COLUMNS},
    error::IdsError,
    features::{FeatureExtractor, Label, LIVE_FIELD_COUNT, LIVE_FIELD_NAMES},
    model::{Classifier, ModelBundle},
    pipeline::{evaluate, train, DetectionPipeline, Verdict},
};
use std::io::Cursor;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn record(label: Label, a: f64, b: f64, c: f64, proto: &str) -> RawRecord {
    RawRecord::new(label)
        .numeric("a", a)
        .numeric("b", b)
        .numeric("c", c)
        .categorical("proto", proto)
}

/// Two tight normal rows, two looser attack rows.
fn four_records() -> Vec<RawRecord> {
    vec![
        record(Label::Normal, 1.0, 2.0, 3.0, "tcp"),
        record(Label::Normal, 1.0, 2.0, 3.1, "tcp"),
        record(Label::Attack, 10.0, 20.0, 30.0, "udp"),
        record(Label::Attack, 10.0, 20.0, 31.0, "udp"),
    ]
}

/// Twelve numeric columns so live packets fit the fitted width.
fn wide_records() -> Vec<RawRecord> {
    (0..8)
        .map(|i| {
            let label = if i % 2 == 0 { Label::Normal } else { Label::Attack };
            let offset = if label == Label::Attack { 50.0 } else { 0.0 };
            (0..12).fold(RawRecord::new(label), |r, j| {
                r.numeric(format!("f{j:02}"), ((i * (j + 1)) % 7) as f64 + offset)
            })
        })
        .collect()
}

fn config(components: usize, classifier: ClassifierKind, k: usize) -> PipelineConfig {
    let mut c = PipelineConfig::default();
    c.components = components;
    c.classifier = classifier;
    c.knn.k = k;
    c
}

fn kdd_line(protocol: &str, label: &str) -> String {
    let mut fields: Vec<String> = KDD_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, _)| format!("{}", i % 3))
        .collect();
    fields[1] = protocol.to_string();
    fields[2] = "http".to_string();
    fields[3] = "SF".to_string();
    fields.push(label.to_string());
    fields.join(",")
}

#[test]
fn config_load_default() {
    let c = IdsConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.pipeline.components, 27);
    assert_eq!(c.pipeline.classifier, ClassifierKind::Svm);
    assert_eq!(c.pipeline.svm.max_iter, 1000);
    assert_eq!(c.pipeline.svm.seed, 42);
    assert!(!c.alerts.email.enabled);
    assert!(!c.alerts.sms.enabled);
    assert!(c.alerts.audit.enabled);
}

#[test]
fn config_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"pipeline":{"classifier":"knn","knn":{"k":7}}}"#).unwrap();
    let c = IdsConfig::load(&path);
    assert_eq!(c.pipeline.classifier, ClassifierKind::Knn);
    assert_eq!(c.pipeline.knn.k, 7);
    assert_eq!(c.pipeline.components, 27);
    assert_eq!(c.audit_path(), Path::new(".ids").join("audit.db"));
}

#[test]
fn kdd_rows_parse_and_labels_collapse() {
    let data = format!(
        "{}\n{}\n{}\n",
        kdd_line("tcp", "normal."),
        kdd_line("udp", "smurf."),
        kdd_line("icmp", "neptune.")
    );
    let records = read_kdd(Cursor::new(data)).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].label, Label::Normal);
    assert_eq!(records[1].label, Label::Attack);
    assert_eq!(records[2].label, Label::Attack);
    assert_eq!(
        records[1].get("protocol_type"),
        Some(&AttributeValue::Categorical("udp".into()))
    );
    assert_eq!(records[0].attributes.len(), KDD_COLUMNS.len());
}

#[test]
fn kdd_short_row_names_line() {
    let data = format!("{}\n0,tcp,http\n", kdd_line("tcp", "normal."));
    match read_kdd(Cursor::new(data)) {
        Err(IdsError::Corpus { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected corpus error, got {other:?}"),
    }
}

#[test]
fn training_and_live_widths_match() {
    let records = wide_records();
    let mut extractor = FeatureExtractor::new();
    extractor.fit(&records).unwrap();

    let encoding = extractor.encoding().unwrap();
    assert_eq!(
        extractor.dim().unwrap(),
        encoding.numeric_count() + encoding.categorical_count()
    );

    let trained = extractor.encode_training(&records[0]).unwrap();
    let packet = RawPacket::tcp(ip("10.0.0.1"), ip("10.0.0.2"), 60, 64, (40000, 80), 1024, TCP_SYN | TCP_ACK);
    let live = extractor.encode_live(&packet).unwrap().unwrap();
    assert_eq!(trained.dim(), live.dim());
    assert!(live.values[LIVE_FIELD_COUNT..].iter().all(|v| *v == 0.0));
    assert_eq!(live.values[0], 6.0);
    assert_eq!(live.values[1], 60.0);
}

#[test]
fn kdd_live_layout_is_positional() {
    let data = format!("{}\n{}\n", kdd_line("tcp", "normal."), kdd_line("udp", "smurf."));
    let records = read_kdd(Cursor::new(data)).unwrap();
    let mut extractor = FeatureExtractor::new();
    extractor.fit(&records).unwrap();

    let names: Vec<&str> = extractor.encoding().unwrap().feature_names().take(LIVE_FIELD_COUNT).collect();
    assert_eq!(&names[..3], &["Count", "Duration", "Flag=SF"]);
    assert!(names.iter().zip(LIVE_FIELD_NAMES).all(|(n, live)| *n != live));

    let packet = RawPacket::udp(ip("10.0.0.1"), ip("10.0.0.2"), 80, 64, (5353, 53));
    let v = extractor.encode_live(&packet).unwrap().unwrap();
    assert_eq!(v.values[0], 17.0);
    assert_eq!(v.values[extractor.encoding().unwrap().index_of("Count").unwrap()], 17.0);
}

#[test]
fn categorical_width_counts_distinct_values() {
    let mut extractor = FeatureExtractor::new();
    extractor.fit(&four_records()).unwrap();
    // a, b, c, proto=tcp, proto=udp
    assert_eq!(extractor.dim().unwrap(), 5);

    let unseen = record(Label::Normal, 1.0, 2.0, 3.0, "icmp");
    let v = extractor.encode_training(&unseen).unwrap();
    let encoding = extractor.encoding().unwrap();
    assert_eq!(v.values[encoding.index_of("proto=tcp").unwrap()], 0.0);
    assert_eq!(v.values[encoding.index_of("proto=udp").unwrap()], 0.0);
    assert_eq!(v.values[encoding.index_of("a").unwrap()], 1.0);
}

#[test]
fn narrow_schema_keeps_leading_live_fields() {
    let mut extractor = FeatureExtractor::new();
    extractor.fit(&four_records()).unwrap();
    assert_eq!(extractor.dim().unwrap(), 5);

    let packet = RawPacket::udp(ip("10.0.0.1"), ip("10.0.0.2"), 80, 64, (5353, 53));
    let v = extractor.encode_live(&packet).unwrap().unwrap();
    assert_eq!(v.as_slice(), &[17.0, 80.0, 64.0, 5353.0, 53.0]);
    assert!(extractor.encode_live(&RawPacket::non_ip(42)).unwrap().is_none());
}

#[test]
fn narrow_schema_skips_headerless_packet_then_classifies() {
    let (bundle, _) = train(&four_records(), &config(2, ClassifierKind::Knn, 3)).unwrap();
    let pipeline =
        DetectionPipeline::new(Arc::new(bundle), AlertDispatcher::new(), SeverityEngine::default())
            .unwrap();

    assert_eq!(pipeline.process(&RawPacket::non_ip(42)).unwrap(), Verdict::Skipped);
    let stats = pipeline.stats();
    assert_eq!((stats.skipped, stats.classified, stats.errors), (1, 0, 0));

    let packet = RawPacket::tcp(ip("10.0.0.1"), ip("10.0.0.2"), 60, 64, (40000, 80), 1024, TCP_SYN);
    assert!(pipeline.process(&packet).unwrap().label().is_some());
    let stats = pipeline.stats();
    assert_eq!((stats.received, stats.skipped, stats.classified, stats.errors), (2, 1, 1, 0));
}

#[test]
fn end_to_end_knn_returns_training_label() {
    let records = four_records();
    let (bundle, report) = train(&records, &config(2, ClassifierKind::Knn, 3)).unwrap();
    assert_eq!(report.input_dim, 5);
    assert_eq!(report.components, 2);
    assert_eq!(report.normal, 2);
    assert_eq!(report.attack, 2);

    let prediction = bundle.classify_record(&records[0]).unwrap();
    assert_eq!(prediction.label, Label::Normal);
}

#[test]
fn end_to_end_svm_separates_clusters() {
    let records = wide_records();
    let (bundle, _) = train(&records, &config(2, ClassifierKind::Svm, 5)).unwrap();
    let eval = evaluate(&bundle, &records).unwrap();
    assert_eq!(eval.total(), records.len());
    assert_eq!(eval.accuracy, 1.0);
    assert_eq!(eval.detection_rate(), 1.0);
    assert_eq!(eval.false_alarm_rate(), 0.0);
}

#[test]
fn bundle_round_trips_exactly() {
    let records = wide_records();
    let (bundle, _) = train(&records, &config(3, ClassifierKind::Svm, 5)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("model.bundle");
    bundle.save(&path).unwrap();
    let loaded = ModelBundle::load(&path).unwrap();

    assert_eq!(loaded.projector.model().unwrap(), bundle.projector.model().unwrap());
    assert_eq!(loaded.normalizer.model().unwrap(), bundle.normalizer.model().unwrap());
    assert_eq!(loaded.extractor.encoding().unwrap(), bundle.extractor.encoding().unwrap());
    assert_eq!(loaded.to_artifact().unwrap(), bundle.to_artifact().unwrap());
    for r in &records {
        assert_eq!(
            loaded.classify_record(r).unwrap(),
            bundle.classify_record(r).unwrap()
        );
    }
}

#[test]
fn tampered_bundle_is_rejected() {
    let (bundle, _) = train(&wide_records(), &config(2, ClassifierKind::Knn, 3)).unwrap();
    let artifact = bundle.to_artifact().unwrap();
    let tampered = artifact.replacen("\"f00\"", "\"g00\"", 1);
    assert_ne!(artifact, tampered);
    assert!(matches!(
        ModelBundle::from_artifact(&tampered),
        Err(IdsError::ArtifactCorrupted(_))
    ));
}

#[test]
fn missing_bundle_is_model_not_loaded() {
    let err = ModelBundle::load(Path::new("does/not/exist.bundle")).unwrap_err();
    assert!(matches!(err, IdsError::ModelNotLoaded(_)));
    assert!(err.is_model_missing());
}

#[test]
fn unfitted_bundle_cannot_start_detection() {
    let bundle = Arc::new(ModelBundle::new(&PipelineConfig::default()));
    let result = DetectionPipeline::new(bundle, AlertDispatcher::new(), SeverityEngine::default());
    assert!(matches!(result, Err(IdsError::ModelNotLoaded(_))));
}

#[test]
fn packet_without_ip_header_is_skipped() {
    let (bundle, _) = train(&wide_records(), &config(2, ClassifierKind::Knn, 3)).unwrap();
    let pipeline =
        DetectionPipeline::new(Arc::new(bundle), AlertDispatcher::new(), SeverityEngine::default())
            .unwrap();

    let verdict = pipeline.process(&RawPacket::non_ip(42)).unwrap();
    assert_eq!(verdict, Verdict::Skipped);
    let stats = pipeline.stats();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.classified, 0);

    let packet = RawPacket::tcp(ip("10.0.0.1"), ip("10.0.0.2"), 60, 64, (40000, 80), 1024, TCP_SYN);
    let verdict = pipeline.process(&packet).unwrap();
    assert!(verdict.label().is_some());
    let stats = pipeline.stats();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.classified, 1);
    assert_eq!(stats.received, 2);
}

#[test]
fn replay_loop_counts_and_writes_verdicts() {
    let (bundle, _) = train(&wide_records(), &config(2, ClassifierKind::Svm, 3)).unwrap();
    let pipeline =
        DetectionPipeline::new(Arc::new(bundle), AlertDispatcher::new(), SeverityEngine::default())
            .unwrap();

    let tcp = RawPacket::tcp(ip("192.168.1.5"), ip("10.0.0.9"), 1500, 128, (51000, 443), 65535, TCP_ACK);
    let input = format!(
        "{}\nnot json\n\n{}\n",
        serde_json::to_string(&tcp).unwrap(),
        serde_json::to_string(&RawPacket::non_ip(60)).unwrap()
    );
    let mut source = NdjsonReplay::new(Cursor::new(input));
    let stop = AtomicBool::new(false);
    let mut out = Vec::new();
    let stats = pipeline.run(&mut source, &stop, &mut out).unwrap();

    assert_eq!(stats.received, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.classified, 1);
    assert_eq!(stats.errors, 1);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(v["src"], "192.168.1.5");
    assert_eq!(v["dst"], "10.0.0.9");
}

#[test]
fn non_utf8_line_is_counted_and_skipped() {
    let (bundle, _) = train(&wide_records(), &config(2, ClassifierKind::Knn, 3)).unwrap();
    let pipeline =
        DetectionPipeline::new(Arc::new(bundle), AlertDispatcher::new(), SeverityEngine::default())
            .unwrap();

    let mut input = b"\xff\xfe garbage\n".to_vec();
    input.extend_from_slice(serde_json::to_string(&RawPacket::non_ip(60)).unwrap().as_bytes());
    input.push(b'\n');
    let mut source = NdjsonReplay::new(Cursor::new(input));
    let stats = pipeline.run(&mut source, &AtomicBool::new(false), &mut Vec::new()).unwrap();

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.received, 1);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn stopped_loop_reads_nothing() {
    let (bundle, _) = train(&wide_records(), &config(2, ClassifierKind::Knn, 3)).unwrap();
    let pipeline =
        DetectionPipeline::new(Arc::new(bundle), AlertDispatcher::new(), SeverityEngine::default())
            .unwrap();
    let input = serde_json::to_string(&RawPacket::non_ip(60)).unwrap();
    let mut source = NdjsonReplay::new(Cursor::new(input));
    let stop = AtomicBool::new(true);
    let stats = pipeline.run(&mut source, &stop, &mut Vec::new()).unwrap();
    assert_eq!(stats.received, 0);
    assert_eq!(pipeline.bundle().classifier().name(), "knn");
}
