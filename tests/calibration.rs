use calkit::export::touchstone::read_dir;
use calkit::export::vendor::{ARCHIVE_FILE, HEADER_FILE, HEADER_LEN};
use calkit::export::VENDOR_DIR;
use calkit::prelude::*;

struct CountingOperator {
    steps: Vec<String>,
}

impl Operator for CountingOperator {
    fn connect(&mut self, step: &ConnectionStep) -> Result<()> {
        self.steps.push(step.to_string());
        Ok(())
    }
}

fn limits() -> LimitFile {
    LimitFile::from_json(
        r#"{
            "THRU TRANSMISSION": [
                {"x1": 0, "x2": 7e9, "y1": -10, "y2": -10, "type": "dB", "limit": "min"}
            ],
            "OPEN": [
                {"x1": 0, "x2": 7e9, "y1": 0, "y2": 0, "type": "dB", "limit": "max"}
            ],
            "ISOLATION": [
                {"x1": 0, "x2": 7e9, "y1": 0, "y2": 0, "type": "whatever", "limit": "max"}
            ]
        }"#,
    )
    .unwrap()
}

#[test]
fn two_channel_four_port_run() {
    let mut unit = SimulatedUnit::new(4);
    let mut vna = SimulatedVna::new(2).with_points(11);
    let mut operator = CountingOperator { steps: vec![] };
    let limits = limits();

    let outcome = CalibrationRun::new(CalConfig::default(), &mut unit, &mut vna, &mut operator)
        .execute(Some(&limits))
        .unwrap();

    assert_eq!(operator.steps.len(), 6);
    assert_eq!(outcome.steps.len(), 6);
    // every standard stored exactly once across all steps
    let mut stored: Vec<String> = outcome.steps.iter().flat_map(|s| s.stored.clone()).collect();
    assert_eq!(stored.len(), 12 + 6);
    stored.sort();
    stored.dedup();
    assert_eq!(stored.len(), 18);
    assert_eq!(outcome.standards.throughs().len(), 6);
    // 6 one-port sweeps over the first two steps, one sweep per pair
    assert_eq!(vna.sweeps(), 12);
    assert_eq!(outcome.sweeps(), 12);

    let report = outcome.validation.as_ref().unwrap();
    assert_eq!(report.skipped, vec!["ISOLATION".to_string()]);
    assert_eq!(report.checks["THRU TRANSMISSION"], 6 * 2 * 11);
    assert_eq!(report.checks["OPEN"], 4 * 11);
    assert_eq!(unit.port_state(1), Some(PortState::None));
}

#[test]
fn run_then_export_everything() {
    let mut unit = SimulatedUnit::new(4);
    let mut vna = SimulatedVna::new(4).with_points(21);
    let mut operator = LoggingOperator;
    let config = CalConfig {
        coefficient_comments: vec!["factory calibration".to_string()],
        vendor: VendorConfig {
            serial: "SIM0001".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2025, 1, 2),
            ..VendorConfig::default()
        },
        ..CalConfig::default()
    };
    let outcome = CalibrationRun::new(config.clone(), &mut unit, &mut vna, &mut operator)
        .execute(None)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let results = export_all(
        &outcome.standards,
        &config,
        &ExportFormat::ALL,
        dir.path(),
        Some(&mut unit),
    );
    for (format, res) in results.iter() {
        assert!(res.is_ok(), "{} failed: {:?}", format, res);
    }

    let coeff = unit.coefficient("FACTORY", "P34_THROUGH").unwrap();
    assert_eq!(coeff.points.len(), 21);
    assert_eq!(coeff.comments, vec!["factory calibration".to_string()]);
    assert_eq!(unit.coefficients().len(), 18);

    let back = read_dir(dir.path(), 4).unwrap();
    assert_eq!(back.opens().len(), 4);
    assert_eq!(back.throughs().len(), 6);
    assert_eq!(back.get(StandardKind::Load, 2).unwrap().len(), 21);

    let vendor = dir.path().join(VENDOR_DIR);
    assert!(vendor.join(ARCHIVE_FILE).exists());
    assert_eq!(std::fs::read(vendor.join(HEADER_FILE)).unwrap().len(), HEADER_LEN);
}

#[test]
fn malformed_limits_fail_before_measuring() {
    let mut unit = SimulatedUnit::new(4);
    let mut vna = SimulatedVna::new(2).with_points(3);
    let mut operator = CountingOperator { steps: vec![] };
    let limits = LimitFile::from_json(
        r#"{"LOAD": [{"x1": 0, "x2": 1, "y1": 0, "y2": 0, "type": "vswr", "limit": "max"}]}"#,
    )
    .unwrap();
    let err = CalibrationRun::new(CalConfig::default(), &mut unit, &mut vna, &mut operator)
        .execute(Some(&limits))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(operator.steps.is_empty());
    assert_eq!(vna.sweeps(), 0);
}

#[test]
fn limit_violation_after_all_measurements() {
    let mut unit = SimulatedUnit::new(4);
    let mut vna = SimulatedVna::new(2).with_points(5);
    let mut operator = CountingOperator { steps: vec![] };
    // simulated loads reflect at 0.9, far above -20 dB
    let limits = LimitFile::from_json(
        r#"{"LOAD": [{"x1": 0, "x2": 7e9, "y1": -20, "y2": -20, "type": "dB", "limit": "max"}]}"#,
    )
    .unwrap();
    let err = CalibrationRun::new(CalConfig::default(), &mut unit, &mut vna, &mut operator)
        .execute(Some(&limits))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitViolation);
    assert_eq!(operator.steps.len(), 6);
    assert_eq!(vna.sweeps(), 12);
}
