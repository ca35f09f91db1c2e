use std::path::PathBuf;

use vmsim_bench::{
    config::{BenchConfig, ConfigLoader, FrameGrid},
    policy::Policy,
    sweep::DuplicateMode,
};

fn config_loader() -> ConfigLoader {
    ConfigLoader::new(env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn bundled_config_matches_defaults() {
    let config = config_loader()
        .load("configs/default.yaml")
        .expect("bundled config parses");
    assert_eq!(config, BenchConfig::default());
    assert_eq!(config.duplicates, DuplicateMode::Allow);
    assert_eq!(
        config.traces,
        [
            PathBuf::from("test/gcc.trace"),
            PathBuf::from("test/gzip.trace"),
            PathBuf::from("test/swim.trace"),
        ]
    );
}

#[test]
fn loader_fills_in_omitted_keys() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        temp.path().join("bench.yaml"),
        "simulator: /opt/vmsim\n\
         traces: [a.trace]\n\
         timeout_secs: 30\n\
         duplicates: reject\n\
         comparison:\n  policies: [lru]\n\
         sensitivity:\n  frames: {from: 2, to: 10, step: 2}\n",
    )
    .unwrap();

    let config = ConfigLoader::new(temp.path()).load("bench.yaml").unwrap();
    assert_eq!(config.simulator, PathBuf::from("/opt/vmsim"));
    assert_eq!(config.timeout().map(|t| t.as_secs()), Some(30));
    assert_eq!(config.sweep_options().duplicates, DuplicateMode::Reject);

    let comparison = config.comparison.unwrap();
    assert_eq!(comparison.policies, [Policy::Lru]);
    assert_eq!(comparison.frames, FrameGrid::List(vec![8, 16, 32, 64]));

    let sensitivity = config.sensitivity.unwrap();
    assert_eq!(sensitivity.policy, Policy::Second);
    assert_eq!(sensitivity.frames.frame_counts(), [2, 4, 6, 8, 10]);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn loader_reports_the_failing_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("bad.yaml"), "traces: []\n").unwrap();

    let err = ConfigLoader::new(temp.path()).load("bad.yaml").unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("bad.yaml"), "{message}");
    assert!(message.contains("at least one trace"), "{message}");

    let err = ConfigLoader::new(temp.path()).load("absent.yaml").unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}
