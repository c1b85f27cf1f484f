//! A minimal async test runner for `harness = false` test targets.
//!
//! Output follows libtest's format so `cargo test` output reads the same.

use crate::guard::panic_guard;
use errors::HarnessError;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

type TrialFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// One named test body.
pub struct Trial {
    name: String,
    body: Box<dyn Fn() -> TrialFuture + Send + Sync>
}

impl Trial {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static
    {
        Self {
            name: name.into(),
            body: Box::new(move || Box::pin(body()))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered collection of trials with libtest-style name filtering.
#[derive(Default)]
pub struct Suite {
    trials: Vec<Trial>,
    filter: Option<String>,
    skip: Vec<String>,
    exact: bool,
    list: bool,
    ignored: bool,
    terse: bool
}

// libtest flags whose value is the following argument.
const VALUE_FLAGS: &[&str] = &[
    "--test-threads",
    "--format",
    "--color",
    "--logfile",
    "--shuffle-seed",
    "-Z"
];

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suite filtered by this process's command-line arguments.
    pub fn from_args() -> Self {
        Self::new().with_args(std::env::args().skip(1))
    }

    /// Apply libtest arguments: the first positional argument is a name
    /// filter, `--exact` makes it exact, `--skip <pattern>` excludes names.
    /// `--list` asks for the selected names instead of a run, and
    /// `--ignored` selects nothing since no trial is ignored.
    /// Other flags are accepted and ignored.
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = String>
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--exact" {
                self.exact = true;
            } else if arg == "--list" {
                self.list = true;
            } else if arg == "--ignored" {
                self.ignored = true;
            } else if arg == "--skip" {
                if let Some(pattern) = args.next() {
                    self.skip.push(pattern);
                }
            } else if arg == "--format" {
                self.terse = args.next().as_deref() == Some("terse");
            } else if let Some(format) = arg.strip_prefix("--format=") {
                self.terse = format == "terse";
            } else if VALUE_FLAGS.contains(&arg.as_str()) {
                args.next();
            } else if arg.starts_with('-') {
                continue;
            } else if self.filter.is_none() {
                self.filter = Some(arg);
            }
        }
        self
    }

    pub fn trial<F, Fut>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static
    {
        self.add(Trial::new(name, body))
    }

    pub fn add(mut self, trial: Trial) -> Self {
        self.trials.push(trial);
        self
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    /// Whether `--list` was passed.
    pub fn is_listing(&self) -> bool {
        self.list
    }

    pub fn selected_count(&self) -> usize {
        self.trials.iter().filter(|t| self.selects(&t.name)).count()
    }

    /// The `--list` output: `<name>: test` per selected trial, followed by a
    /// count unless `--format terse` was given.
    pub fn list_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .trials
            .iter()
            .filter(|t| self.selects(&t.name))
            .map(|t| format!("{}: test", t.name))
            .collect();
        if !self.terse {
            let count = lines.len();
            lines.push(String::new());
            lines.push(format!("{} tests, 0 benchmarks", count));
        }
        lines
    }

    pub fn print_list(&self) {
        for line in self.list_lines() {
            println!("{}", line);
        }
    }

    /// Report a run in which the filters selected nothing, without running
    /// anything.
    pub fn report_unselected(&self) -> SuiteReport {
        let report = SuiteReport {
            filtered_out: self.trials.len(),
            ..SuiteReport::default()
        };
        print_header(0);
        print_summary(&report, 0.0);
        report
    }

    fn selects(&self, name: &str) -> bool {
        if self.ignored {
            return false;
        }

        let matches = |pattern: &str| {
            if self.exact {
                name == pattern
            } else {
                name.contains(pattern)
            }
        };

        let included = self.filter.as_deref().map(matches).unwrap_or(true);
        included && !self.skip.iter().any(|pattern| matches(pattern))
    }

    /// Run every selected trial in order. A failing or panicking trial does
    /// not stop the ones after it.
    pub async fn run(&self) -> SuiteReport {
        let started = Instant::now();
        let selected: Vec<&Trial> = self.trials.iter().filter(|t| self.selects(&t.name)).collect();
        let mut report = SuiteReport {
            filtered_out: self.trials.len() - selected.len(),
            ..SuiteReport::default()
        };

        print_header(selected.len());

        for trial in selected {
            tracing::debug!(test = %trial.name, "Running test");
            match panic_guard(&trial.name, (trial.body)()).await {
                Ok(()) => {
                    println!("test {} ... ok", trial.name);
                    report.passed.push(trial.name.clone());
                }
                Err(e) => {
                    println!("test {} ... FAILED", trial.name);
                    report.failed.push((trial.name.clone(), e));
                }
            }
        }

        if !report.failed.is_empty() {
            println!();
            println!("failures:");
            for (name, error) in &report.failed {
                println!("    {}: {}", name, error);
            }
        }

        print_summary(&report, started.elapsed().as_secs_f64());
        report
    }
}

fn print_header(count: usize) {
    println!();
    println!("running {} tests", count);
}

fn print_summary(report: &SuiteReport, seconds: f64) {
    println!();
    println!(
        "test result: {}. {} passed; {} failed; 0 ignored; 0 measured; {} filtered out; finished in {:.2}s",
        if report.is_success() { "ok" } else { "FAILED" },
        report.passed.len(),
        report.failed.len(),
        report.filtered_out,
        seconds
    );
    println!();
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    pub passed: Vec<String>,
    pub failed: Vec<(String, HarnessError)>,
    pub filtered_out: usize
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn names(suite: &Suite) -> Vec<&str> {
        suite
            .trials
            .iter()
            .filter(|t| suite.selects(t.name()))
            .map(Trial::name)
            .collect()
    }

    fn three() -> Suite {
        Suite::new()
            .trial("insert_document", || async { Ok(()) })
            .trial("find_document", || async { Ok(()) })
            .trial("ping_primary", || async { Ok(()) })
    }

    #[test]
    fn test_no_filter_selects_all() {
        let suite = three().with_args(args(&["--nocapture"]));
        assert_eq!(suite.len(), 3);
        assert_eq!(names(&suite).len(), 3);
    }

    #[test]
    fn test_substring_filter() {
        let suite = three().with_args(args(&["document"]));
        assert_eq!(names(&suite), vec!["insert_document", "find_document"]);
    }

    #[test]
    fn test_exact_filter() {
        let suite = three().with_args(args(&["--exact", "document"]));
        assert!(names(&suite).is_empty());

        let suite = three().with_args(args(&["find_document", "--exact"]));
        assert_eq!(names(&suite), vec!["find_document"]);
    }

    #[test]
    fn test_skip_and_value_flags() {
        let suite = three().with_args(args(&[
            "--test-threads",
            "1",
            "--skip",
            "insert",
            "--format",
            "pretty"
        ]));
        assert_eq!(names(&suite), vec!["find_document", "ping_primary"]);
    }

    #[test]
    fn test_list_prints_selected_names() {
        let suite = three().with_args(args(&["--list", "document"]));
        assert!(suite.is_listing());
        assert_eq!(
            suite.list_lines(),
            vec![
                "insert_document: test".to_string(),
                "find_document: test".to_string(),
                String::new(),
                "2 tests, 0 benchmarks".to_string()
            ]
        );
    }

    #[test]
    fn test_terse_list_has_no_count() {
        let suite = three().with_args(args(&["--list", "--format", "terse"]));
        assert_eq!(
            suite.list_lines(),
            vec![
                "insert_document: test".to_string(),
                "find_document: test".to_string(),
                "ping_primary: test".to_string()
            ]
        );

        let suite = three().with_args(args(&["--format=terse", "--list", "--ignored"]));
        assert!(suite.list_lines().is_empty());
    }

    #[test]
    fn test_ignored_selects_nothing() {
        let suite = three().with_args(args(&["--ignored"]));
        assert!(!suite.is_listing());
        assert_eq!(suite.selected_count(), 0);
    }

    #[test]
    fn test_unmatched_filter_reports_everything_filtered() {
        let suite = three().with_args(args(&["some_unit_name"]));
        assert_eq!(suite.selected_count(), 0);

        let report = suite.report_unselected();
        assert!(report.passed.is_empty());
        assert_eq!(report.filtered_out, 3);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_trials() {
        let ran = Arc::new(AtomicU32::new(0));
        let counter = ran.clone();

        let suite = Suite::new()
            .trial("fails", || async { anyhow::bail!("wrong count") })
            .trial("panics", || async {
                let empty: Vec<u32> = Vec::new();
                assert_eq!(empty.len(), 1, "collection should hold one document");
                Ok(())
            })
            .trial("passes", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        let report = suite.run().await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(report.passed, vec!["passes".to_string()]);
        assert_eq!(report.failed.len(), 2);
        assert!(matches!(report.failed[0].1, HarnessError::TestFailed { .. }));
        assert!(matches!(report.failed[1].1, HarnessError::Panicked { .. }));
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_filtered_run_counts() {
        let report = three().with_args(args(&["ping"])).run().await;
        assert_eq!(report.passed, vec!["ping_primary".to_string()]);
        assert_eq!(report.filtered_out, 2);
        assert_eq!(report.exit_code(), 0);
    }
}
