//! Scoring routine run as an external process
//!
//! The process starts in the directory holding the model, so routines that
//! read fixed filenames from their working directory keep working. The exact
//! paths are also passed as `MODEL_PATH` and `DATASET_PATH`.
//!
//! Unless configured otherwise, the routine is the bundled `score.py`, run
//! inline with `python3 -c`.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::ScoringRoutine;
use crate::error::{Result, ServiceError};
use crate::models::{ScoringOutput, DECISION_THRESHOLD};
use crate::util::truncate_string;

/// Scoring script bundled with the crate
pub const BUNDLED_SCORING_SCRIPT: &str = include_str!("score.py");

/// Command line that runs the bundled script
pub fn bundled_scoring_command() -> Vec<String> {
    vec![
        "python3".to_string(),
        "-c".to_string(),
        BUNDLED_SCORING_SCRIPT.to_string(),
    ]
}

/// Runs a configured program and parses one JSON object from its stdout
#[derive(Debug, Clone)]
pub struct ProcessScoringRoutine {
    program: String,
    args: Vec<String>,
}

impl ProcessScoringRoutine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` command line.
    ///
    /// The routine runs inside the scratch directory, so relative paths that
    /// name files in the current directory are made absolute here.
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ServiceError::configuration("Scoring command must not be empty"))?;
        let base = std::env::current_dir().map_err(|e| {
            ServiceError::configuration(format!("Cannot resolve working directory: {}", e))
        })?;
        Ok(Self::new(
            anchor_path(program, &base),
            args.iter().map(|arg| anchor_path(arg, &base)).collect(),
        ))
    }
}

fn anchor_path(arg: &str, base: &Path) -> String {
    let candidate = Path::new(arg);
    if arg.starts_with('-') || candidate.is_absolute() {
        return arg.to_string();
    }
    let anchored = base.join(candidate);
    if anchored.is_file() {
        anchored.to_string_lossy().into_owned()
    } else {
        arg.to_string()
    }
}

#[async_trait]
impl ScoringRoutine for ProcessScoringRoutine {
    async fn score(&self, model_path: &Path, dataset_path: &Path) -> Result<ScoringOutput> {
        let workdir = model_path.parent().unwrap_or_else(|| Path::new("."));
        info!(program = %self.program, workdir = %workdir.display(), "running scoring routine");

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(workdir)
            .env("MODEL_PATH", model_path)
            .env("DATASET_PATH", dataset_path)
            .env("DECISION_THRESHOLD", DECISION_THRESHOLD.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ServiceError::process(format!("Failed to start scoring routine {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::process(format!(
                "Scoring routine exited with {}: {}",
                output.status,
                truncate_string(stderr.trim(), 500)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(bytes = output.stdout.len(), "scoring routine finished");

        serde_json::from_str::<ScoringOutput>(stdout.trim()).map_err(|e| {
            ServiceError::parsing(format!(
                "Malformed scoring output ({}): {}",
                e,
                truncate_string(stdout.trim(), 200)
            ))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::models::ConfusionMatrix;

    /// Stand-in for joblib whose model scores each row by its first feature
    const STUB_JOBLIB: &str = "class _Model:\n    def predict_proba(self, rows):\n        return [[1.0 - r[0], r[0]] for r in rows]\n\n\ndef load(path):\n    return _Model()\n";

    fn shell(script: &str) -> ProcessScoringRoutine {
        ProcessScoringRoutine::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    async fn scratch_with_inputs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("xgb_model.joblib"), b"model").await.unwrap();
        tokio::fs::write(dir.path().join("validation.libsvm"), b"1 1:0.5\n").await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_parses_routine_output() {
        let dir = scratch_with_inputs().await;
        let routine = shell(
            r#"test -f xgb_model.joblib && test -f "$DATASET_PATH" && echo '{"predictions":[0.9,0.2],"accuracy":1.0,"auc":1.0,"confusion_matrix":{"true_positive":1,"true_negative":1,"false_positive":0,"false_negative":0},"sample_count":2}'"#,
        );

        let output = routine
            .score(&dir.path().join("xgb_model.joblib"), &dir.path().join("validation.libsvm"))
            .await
            .unwrap();

        assert_eq!(output.predictions, vec![0.9, 0.2]);
        assert_eq!(output.sample_count, 2);
        assert_eq!(
            output.confusion_counts(),
            ConfusionMatrix {
                true_positive: 1,
                true_negative: 1,
                false_positive: 0,
                false_negative: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_fatal() {
        let dir = scratch_with_inputs().await;
        let routine = shell("echo 'model file is corrupt' >&2; exit 3");

        let err = routine
            .score(&dir.path().join("xgb_model.joblib"), &dir.path().join("validation.libsvm"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Process(_)));
        assert!(err.to_string().contains("model file is corrupt"));
    }

    #[tokio::test]
    async fn test_malformed_output_is_fatal() {
        let dir = scratch_with_inputs().await;
        let routine = shell("echo 'accuracy: 0.8'");

        let err = routine
            .score(&dir.path().join("xgb_model.joblib"), &dir.path().join("validation.libsvm"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Parsing(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_fatal() {
        let dir = scratch_with_inputs().await;
        let routine = ProcessScoringRoutine::new("definitely-not-a-scoring-binary", Vec::new());

        let err = routine
            .score(&dir.path().join("xgb_model.joblib"), &dir.path().join("validation.libsvm"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Process(_)));
    }

    #[test]
    fn test_relative_script_is_anchored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("score.py"), "print('{}')").unwrap();

        assert_eq!(
            anchor_path("score.py", dir.path()),
            dir.path().join("score.py").to_string_lossy()
        );
        assert_eq!(anchor_path("python3", dir.path()), "python3");
        assert_eq!(anchor_path("-m", dir.path()), "-m");
        assert_eq!(anchor_path("trader.score", dir.path()), "trader.score");
        assert_eq!(anchor_path("/opt/score.py", dir.path()), "/opt/score.py");
    }

    #[test]
    fn test_default_command_runs_bundled_script() {
        let command = OrchestratorConfig::default().scoring_command;
        assert_eq!(command, bundled_scoring_command());
        assert_eq!(command[..2], ["python3".to_string(), "-c".to_string()]);
        assert!(command[2].contains("DATASET_PATH"));
    }

    #[tokio::test]
    async fn test_default_routine_scores_end_to_end() {
        let python = std::process::Command::new("python3").arg("--version").output();
        if !python.map(|o| o.status.success()).unwrap_or(false) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("xgb_model.joblib"), b"model").await.unwrap();
        tokio::fs::write(
            dir.path().join("validation.libsvm"),
            b"1 1:0.9\n0 1:0.2\n1 1:0.4\n0 1:0.1\n",
        )
        .await
        .unwrap();
        // The routine's working directory comes first on the import path
        tokio::fs::write(dir.path().join("joblib.py"), STUB_JOBLIB).await.unwrap();

        let routine =
            ProcessScoringRoutine::from_command(&OrchestratorConfig::default().scoring_command).unwrap();
        let output = routine
            .score(&dir.path().join("xgb_model.joblib"), &dir.path().join("validation.libsvm"))
            .await
            .unwrap();

        assert_eq!(output.predictions, vec![0.9, 0.2, 0.4, 0.1]);
        assert_eq!(output.sample_count, 4);
        assert_eq!(output.accuracy, 0.75);
        assert_eq!(output.auc, 1.0);
        assert_eq!(
            output.confusion_counts(),
            ConfusionMatrix {
                true_positive: 1,
                true_negative: 2,
                false_positive: 0,
                false_negative: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_bundled_script_zeroes_single_class_matrix() {
        let python = std::process::Command::new("python3").arg("--version").output();
        if !python.map(|o| o.status.success()).unwrap_or(false) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("xgb_model.joblib"), b"model").await.unwrap();
        tokio::fs::write(dir.path().join("validation.libsvm"), b"1 1:0.9\n1 1:0.8\n")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("joblib.py"), STUB_JOBLIB).await.unwrap();

        let output = ProcessScoringRoutine::from_command(&bundled_scoring_command())
            .unwrap()
            .score(&dir.path().join("xgb_model.joblib"), &dir.path().join("validation.libsvm"))
            .await
            .unwrap();

        assert_eq!(output.accuracy, 1.0);
        assert_eq!(output.auc, 0.5);
        assert_eq!(output.confusion_counts(), ConfusionMatrix::default());
    }
}
