//! Synthesis of the shell batch-runner that executes every generated
//! artifact and ships its output to the data sink.
//!
//! The emitted program emulates exceptions over process exit codes:
//! `try` opens a subshell with fail-fast enabled, `catch` captures the
//! subshell's exit code, and the per-item handler classifies it. Two
//! sentinel codes are recognized and swallowed; any other non-zero code
//! is rethrown inside the handler's own subshell, so it terminates only
//! that item's stanza and the script proceeds to the next one. Artifact
//! quality is not guaranteed, so the runner has to survive an arbitrary
//! number of independently generated, unverified programs.

use std::fmt::Write as _;

use crate::slug::to_slug;

/// Exit code signalling an artifact produced no data at all.
pub const NO_DATA_EXIT_CODE: u32 = 100;
/// Exit code signalling an artifact produced only part of its data.
pub const PARTIAL_DATA_EXIT_CODE: u32 = 101;

/// Builder for the synthesized deploy script.
#[derive(Clone, Debug)]
pub struct DeployScript {
    items: Vec<String>,
    data_sink: String,
    owner_id: String,
    runner: String,
    entry: String,
    data_glob: String,
    copy_command: String,
}

impl DeployScript {
    /// Creates a script over the full original item list. Items whose
    /// generation failed still get a stanza; they fail at execution
    /// time rather than build time.
    pub fn new(
        items: &[String],
        data_sink: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            items: items.to_vec(),
            data_sink: data_sink.into(),
            owner_id: owner_id.into(),
            runner: "python".to_owned(),
            entry: "main.py".to_owned(),
            data_glob: "*.csv".to_owned(),
            copy_command: "aws s3 cp".to_owned(),
        }
    }

    /// Sets the interpreter used to run each artifact.
    #[inline]
    pub fn with_runner(mut self, runner: impl Into<String>) -> Self {
        self.runner = runner.into();
        self
    }

    /// Sets the artifact entry file name.
    #[inline]
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Sets the filter for output files worth uploading.
    #[inline]
    pub fn with_data_glob(mut self, data_glob: impl Into<String>) -> Self {
        self.data_glob = data_glob.into();
        self
    }

    /// Replaces the upload command, e.g. to stub it out in tests.
    #[inline]
    pub fn with_copy_command(
        mut self,
        copy_command: impl Into<String>,
    ) -> Self {
        self.copy_command = copy_command.into();
        self
    }

    /// Renders the script text.
    pub fn render(&self) -> String {
        let mut script = String::new();
        script.push_str("#!/bin/bash\n\n");
        let _ = writeln!(script, "export NoDataException={NO_DATA_EXIT_CODE}");
        let _ = writeln!(
            script,
            "export PartialDataException={PARTIAL_DATA_EXIT_CODE}"
        );
        script.push_str("\nrun_artifact() {\n");
        script.push_str("    echo \"Starting $1 at\" `date`\n");
        script.push_str("    cd \"$1\" || return $?\n");
        script.push_str("    local run_code=0\n");
        let _ = writeln!(
            script,
            "    {} {} || run_code=$?",
            self.runner, self.entry
        );
        script.push_str("    local copy_code=0\n");
        let _ = writeln!(
            script,
            "    {} . \"$2\" --recursive --exclude \"*\" --include \"{}\" \
             || copy_code=$?",
            self.copy_command, self.data_glob
        );
        script.push_str("    cd ..\n");
        // The artifact's own exit code takes precedence over the
        // upload's.
        script.push_str("    if [ \"$run_code\" -ne 0 ]; then\n");
        script.push_str("        return \"$run_code\"\n");
        script.push_str("    fi\n");
        script.push_str("    return \"$copy_code\"\n");
        script.push_str("}\n");
        script.push_str(PRIMITIVES);

        for item in &self.items {
            let slug = to_slug(item);
            let destination = format!(
                "{}/{}/{}/",
                self.data_sink, self.owner_id, slug
            );
            let _ = write!(
                script,
                r#"
# {item}
try
(
    throwErrors
    echo "Begin processing {slug}"
    run_artifact "{slug}" "{destination}"
    echo "finished"
)
catch || (
    case $ex_code in
        $NoDataException)
            echo "NoDataException was thrown"
        ;;
        $PartialDataException)
            echo "PartialDataException was thrown"
        ;;
        *)
            echo "An unexpected exception was thrown"
            throw $ex_code
        ;;
    esac
)
"#
            );
        }

        script.push_str("\necho \"All stanzas attempted\"\nexit 0\n");
        script
    }
}

// Cooperative exception emulation over exit codes. `try` saves whether
// fail-fast was enabled and disables it so the subshell's exit code
// reaches `catch`; `catch` re-enables fail-fast only if it was enabled
// at save time and yields the captured code for inspection.
const PRIMITIVES: &str = r#"
function try()
{
    [[ $- = *e* ]]; SAVED_OPT_E=$?
    set +e
}

function throw()
{
    exit $1
}

function catch()
{
    export ex_code=$?
    (( SAVED_OPT_E == 0 )) && set -e
    return $ex_code
}

function throwErrors()
{
    set -e
}

function ignoreErrors()
{
    set +e
}
"#;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::process::Command;

    use super::*;

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn test_render_stanzas() {
        let script = DeployScript::new(
            &items(&["Alpha Press", "Beta Lathe"]),
            "s3://data-bucket",
            "alice",
        )
        .render();

        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("export NoDataException=100"));
        assert!(script.contains("export PartialDataException=101"));
        assert!(script.contains("python main.py"));
        assert!(script.contains(
            "run_artifact \"alpha-press\" \"s3://data-bucket/alice/alpha-press/\""
        ));
        assert!(script.contains(
            "run_artifact \"beta-lathe\" \"s3://data-bucket/alice/beta-lathe/\""
        ));
        assert_eq!(script.matches("catch || (").count(), 2);
    }

    fn write_artifact(dir: &std::path::Path, slug: &str, body: &str) {
        let artifact_dir = dir.join(slug);
        fs::create_dir_all(&artifact_dir).unwrap();
        fs::write(artifact_dir.join("main.sh"), body).unwrap();
    }

    fn run_script(dir: &std::path::Path, script: &str) -> (String, bool) {
        fs::write(dir.join("deploy.sh"), script).unwrap();
        let output = Command::new("bash")
            .arg("deploy.sh")
            .current_dir(dir)
            .output()
            .unwrap();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        (stdout, output.status.success())
    }

    #[test]
    fn test_sentinel_codes_are_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "alpha", "exit 100\n");
        write_artifact(dir.path(), "beta", "exit 101\n");
        write_artifact(dir.path(), "gamma", "echo data > out.csv\n");

        let script = DeployScript::new(
            &items(&["Alpha", "Beta", "Gamma"]),
            "s3://data",
            "alice",
        )
        .with_runner("bash")
        .with_entry("main.sh")
        .with_copy_command("true")
        .render();

        let (stdout, success) = run_script(dir.path(), &script);
        assert!(success, "script should exit 0, stdout:\n{stdout}");
        assert!(stdout.contains("NoDataException was thrown"));
        assert!(stdout.contains("PartialDataException was thrown"));
        assert!(!stdout.contains("An unexpected exception was thrown"));
        // The healthy stanza still ran to completion.
        assert!(stdout.contains("finished"));
    }

    #[test]
    fn test_unknown_exit_terminates_only_its_stanza() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "alpha", "exit 7\n");
        write_artifact(dir.path(), "beta", "echo data > out.csv\n");

        let script = DeployScript::new(
            &items(&["Alpha", "Beta"]),
            "s3://data",
            "alice",
        )
        .with_runner("bash")
        .with_entry("main.sh")
        .with_copy_command("true")
        .render();

        let (stdout, success) = run_script(dir.path(), &script);
        assert!(success, "script should exit 0, stdout:\n{stdout}");

        let unexpected_idx =
            stdout.find("An unexpected exception was thrown").unwrap();
        let beta_idx = stdout.find("Begin processing beta").unwrap();
        assert!(unexpected_idx < beta_idx, "stdout:\n{stdout}");
        assert!(stdout.contains("All stanzas attempted"));
    }

    #[test]
    fn test_missing_artifact_directory_is_unexpected() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "beta", "echo ok\n");

        // Alpha's generation failed, so its directory never appeared;
        // the stanza exists anyway and fails at execution time.
        let script = DeployScript::new(
            &items(&["Alpha", "Beta"]),
            "s3://data",
            "alice",
        )
        .with_runner("bash")
        .with_entry("main.sh")
        .with_copy_command("true")
        .render();

        let (stdout, success) = run_script(dir.path(), &script);
        assert!(success, "stdout:\n{stdout}");
        assert!(stdout.contains("An unexpected exception was thrown"));
        assert!(stdout.contains("Begin processing beta"));
    }

    #[test]
    fn test_artifact_exit_code_beats_upload_code() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "alpha", "exit 100\n");

        // The stubbed upload fails with an unrecognized code; the
        // artifact's sentinel must still win the classification.
        let script =
            DeployScript::new(&items(&["Alpha"]), "s3://data", "alice")
                .with_runner("bash")
                .with_entry("main.sh")
                .with_copy_command("false")
                .render();

        let (stdout, success) = run_script(dir.path(), &script);
        assert!(success, "stdout:\n{stdout}");
        assert!(stdout.contains("NoDataException was thrown"));
        assert!(!stdout.contains("An unexpected exception was thrown"));
    }
}
