use clap::Parser;
use newsagg::manifest::load_run_config;
use newsagg::{execute, Args, DuplicatePolicy, PipelineError, PipelineOptions, RunSummary};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory holding both manifests, the three lists and the batch files.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(batches: &[Vec<Value>]) -> Self {
        Self::with_forbidden(batches, &["the", "and", "a"])
    }

    fn with_forbidden(batches: &[Vec<Value>], forbidden: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut manifest = format!("{}\n", batches.len());
        for (i, batch) in batches.iter().enumerate() {
            let name = format!("batch_{i}.json");
            fs::write(root.join(&name), serde_json::to_string(batch).unwrap()).unwrap();
            manifest.push_str(&name);
            manifest.push('\n');
        }
        fs::write(root.join("articles.txt"), manifest).unwrap();

        fs::write(
            root.join("inputs.txt"),
            "3\nlanguages.txt\ncategories.txt\nenglish_linking_words.txt\n",
        )
        .unwrap();
        fs::write(root.join("languages.txt"), "3\nenglish\nfrench\nspanish\n").unwrap();
        fs::write(
            root.join("categories.txt"),
            "3\nSports\nArts, Culture and Entertainment\nPolitics\n",
        )
        .unwrap();
        fs::write(
            root.join("english_linking_words.txt"),
            format!("{}\n{}\n", forbidden.len(), forbidden.join("\n")),
        )
        .unwrap();

        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn out_dir(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    fn run(
        &self,
        workers: usize,
        policy: DuplicatePolicy,
        out: &str,
    ) -> anyhow::Result<RunSummary> {
        let config = load_run_config(
            &self.root().join("articles.txt"),
            &self.root().join("inputs.txt"),
        )?;
        execute(
            &config,
            &PipelineOptions {
                workers,
                output_dir: self.out_dir(out),
                policy,
            },
        )
    }
}

fn article(
    uuid: &str,
    title: &str,
    author: &str,
    language: &str,
    published: &str,
    text: &str,
    categories: &[&str],
) -> Value {
    json!({
        "uuid": uuid,
        "title": title,
        "author": author,
        "url": format!("https://n/{uuid}"),
        "text": text,
        "published": published,
        "language": language,
        "categories": categories,
        "thread": { "site": "ignored" },
    })
}

fn newsroom() -> Vec<Vec<Value>> {
    vec![
        vec![
            article("n1", "Cup final", "Ann", "english", "2024-05-01T12:00:00",
                "The final was a thriller and the crowd roared", &["Sports"]),
            article("n2", "Gallery opens", "Bob", "english", "2024-05-03T08:00:00",
                "A gallery opens. The crowd cheered!",
                &["Arts, Culture and Entertainment", "Sports"]),
            article("n3", "Election", "Ann", "french", "2024-05-03T08:00:00",
                "la foule", &["Politics", "Weather"]),
        ],
        vec![
            article("n4", "Cup final", "Cid", "english", "2024-05-04T00:00:00",
                "crowd", &["Sports"]),
            article("n2", "Gallery opens (updated)", "Bob", "english", "2024-05-05T00:00:00",
                "updated text", &["Sports"]),
            article("n5", "Budget vote", "Ann", "spanish", "2024-04-30T23:59:59",
                "x", &["Politics"]),
            article("n6", "Mystery", "Dee", "klingon", "2024-05-02",
                "crowd", &[]),
        ],
    ]
}

fn read_outputs(dir: &Path) -> BTreeMap<String, String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, fs::read_to_string(&path).unwrap())
        })
        .collect()
}

fn lines(content: &str) -> Vec<&str> {
    content.lines().collect()
}

#[test]
fn test_keep_first_newsroom_reports() {
    let fixture = Fixture::new(&newsroom());
    // KeepFirst depends on arrival order, which a single worker fixes to manifest order.
    let summary = fixture.run(1, DuplicatePolicy::KeepFirst, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    assert_eq!(summary.total_seen, 7);
    assert_eq!(summary.report.unique_articles, 5);
    assert_eq!(
        lines(&outputs["reports.txt"]),
        vec![
            "duplicates_found - 2",
            "unique_articles - 5",
            "best_author - Ann 3",
            "top_language - english 2",
            "top_category - Politics 2",
            "most_recent_article - 2024-05-03T08:00:00 https://n/n2",
            "top_keyword_en - crowd 2",
        ]
    );

    assert_eq!(outputs["Sports.txt"], "n1\nn2\n");
    assert_eq!(outputs["Politics.txt"], "n3\nn5\n");
    assert_eq!(outputs["Arts_Culture_and_Entertainment.txt"], "n2\n");
    assert_eq!(outputs["english.txt"], "n1\nn2\n");
    assert_eq!(outputs["french.txt"], "n3\n");
    assert_eq!(outputs["spanish.txt"], "n5\n");
    assert_eq!(
        lines(&outputs["all_articles.txt"]),
        vec![
            "n2 2024-05-03T08:00:00",
            "n3 2024-05-03T08:00:00",
            "n6 2024-05-02",
            "n1 2024-05-01T12:00:00",
            "n5 2024-04-30T23:59:59",
        ]
    );
    assert_eq!(
        lines(&outputs["keywords_count.txt"]),
        vec![
            "crowd 2", "cheered 1", "final 1", "gallery 1", "opens 1", "roared 1",
            "thriller 1", "was 1",
        ]
    );
    assert!(!outputs.contains_key("Weather.txt"));
    assert!(!outputs.contains_key("klingon.txt"));
    assert_eq!(summary.files_written, outputs.len());
}

#[test]
fn test_failed_report_write_is_skipped() {
    let fixture = Fixture::new(&newsroom());
    let baseline = fixture.run(1, DuplicatePolicy::KeepFirst, "baseline").unwrap();

    let out = fixture.out_dir("blocked");
    fs::create_dir_all(out.join("Sports.txt")).unwrap();
    let summary = fixture.run(1, DuplicatePolicy::KeepFirst, "blocked").unwrap();

    assert_eq!(summary.files_written, baseline.files_written - 1);
    assert!(out.join("Sports.txt").is_dir());
    assert_eq!(fs::read_to_string(out.join("Politics.txt")).unwrap(), "n3\nn5\n");

    let report = fs::read_to_string(out.join("reports.txt")).unwrap();
    assert_eq!(lines(&report).len(), 7);
    assert_eq!(
        report,
        fs::read_to_string(fixture.out_dir("baseline").join("reports.txt")).unwrap()
    );
    assert!(report.contains("top_category - Politics 2"));
}

#[test]
fn test_drop_all_newsroom_reports() {
    let fixture = Fixture::new(&newsroom());
    let summary = fixture.run(3, DuplicatePolicy::DropAll, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    assert_eq!(summary.report.duplicates_found, 4);
    assert_eq!(
        lines(&outputs["reports.txt"]),
        vec![
            "duplicates_found - 4",
            "unique_articles - 3",
            "best_author - Ann 2",
            "top_language - french 1",
            "top_category - Politics 2",
            "most_recent_article - 2024-05-03T08:00:00 https://n/n3",
            "top_keyword_en - none",
        ]
    );
    assert_eq!(outputs["Politics.txt"], "n3\nn5\n");
    assert_eq!(outputs["keywords_count.txt"], "");
    assert!(!outputs.contains_key("Sports.txt"));
    assert!(!outputs.contains_key("english.txt"));
    assert_eq!(
        lines(&outputs["all_articles.txt"]),
        vec![
            "n3 2024-05-03T08:00:00",
            "n6 2024-05-02",
            "n5 2024-04-30T23:59:59",
        ]
    );
}

#[test]
fn test_duplicate_title_scenario_keeps_first_seen() {
    let batches = vec![
        vec![article("a1", "X", "Ann", "english", "2024-01-01", "one", &[])],
        vec![article("a2", "X", "Bob", "english", "2024-01-02", "two", &[])],
    ];
    let fixture = Fixture::new(&batches);
    fixture.run(1, DuplicatePolicy::KeepFirst, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    assert_eq!(lines(&outputs["reports.txt"])[0], "duplicates_found - 1");
    assert_eq!(outputs["english.txt"], "a1\n");
}

#[test]
fn test_duplicate_title_default_drops_both() {
    let batches = vec![
        vec![article("a1", "X", "Ann", "english", "2024-01-01", "one", &[])],
        vec![article("a2", "X", "Bob", "english", "2024-01-02", "two", &[])],
    ];
    let fixture = Fixture::new(&batches);
    let summary = fixture.run(2, DuplicatePolicy::DropAll, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    assert_eq!(summary.report.duplicates_found, 2);
    assert_eq!(summary.report.unique_articles, 0);
    assert!(!outputs.contains_key("english.txt"));
    assert_eq!(outputs["all_articles.txt"], "");
}

#[test]
fn test_forbidden_words_are_not_counted() {
    let batches = vec![vec![article(
        "a1", "T", "Ann", "english", "2024-01-01", "The cat sat.", &[],
    )]];
    let fixture = Fixture::with_forbidden(&batches, &["the"]);
    fixture.run(1, DuplicatePolicy::DropAll, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    assert_eq!(outputs["keywords_count.txt"], "cat 1\nsat 1\n");
}

#[test]
fn test_keyword_counts_distinct_english_articles() {
    let batches = vec![vec![
        article("k1", "t1", "Ann", "english", "1", "apple apple Apple banana", &[]),
        article("k2", "t2", "Ann", "english", "2", "APPLE, cherry!", &[]),
        article("k3", "t3", "Ann", "french", "3", "apple apple", &[]),
    ]];
    let fixture = Fixture::new(&batches);
    fixture.run(2, DuplicatePolicy::DropAll, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    assert_eq!(outputs["keywords_count.txt"], "apple 2\nbanana 1\ncherry 1\n");
}

// Deterministic batch set with repeated ids and titles spread across files.
fn generated_batches() -> Vec<Vec<Value>> {
    let languages = ["english", "french", "spanish", "german"];
    let categories = ["Sports", "Politics", "Arts, Culture and Entertainment", "Science"];
    let words = ["crowd", "market", "the", "vote", "goal", "stage", "rain", "a", "court"];
    let authors = ["Ann", "Bob", "Cid", "Dee", "Eve"];

    (0..24)
        .map(|b| {
            (0..25)
                .map(|i| {
                    let n = b * 25 + i;
                    let uuid = format!("g{:03}", n % 500);
                    let title = format!("title {}", (n * 7) % 480);
                    let text: Vec<&str> =
                        (0..6).map(|w| words[(n + w * w) % words.len()]).collect();
                    let cats = [categories[n % 4], categories[(n / 3) % 4]];
                    article(
                        &uuid,
                        &title,
                        authors[n % authors.len()],
                        languages[n % languages.len()],
                        &format!("2024-{:02}-{:02}", 1 + n % 12, 1 + n % 28),
                        &text.join(" "),
                        &cats,
                    )
                })
                .collect()
        })
        .collect()
}

#[test]
fn test_worker_count_does_not_change_output() {
    let fixture = Fixture::new(&generated_batches());

    fixture.run(1, DuplicatePolicy::DropAll, "one").unwrap();
    fixture.run(8, DuplicatePolicy::DropAll, "eight").unwrap();
    fixture.run(8, DuplicatePolicy::DropAll, "eight_again").unwrap();

    let one = read_outputs(&fixture.out_dir("one"));
    let eight = read_outputs(&fixture.out_dir("eight"));
    let again = read_outputs(&fixture.out_dir("eight_again"));
    assert!(one.contains_key("reports.txt"));
    assert_eq!(one, eight);
    assert_eq!(eight, again);
}

#[test]
fn test_member_files_are_strictly_ascending() {
    let fixture = Fixture::new(&generated_batches());
    fixture.run(6, DuplicatePolicy::DropAll, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    for name in ["english.txt", "french.txt", "spanish.txt", "Sports.txt", "Politics.txt"] {
        let members = lines(&outputs[name]);
        assert!(!members.is_empty(), "{name} should not be empty");
        assert!(
            members.windows(2).all(|pair| pair[0] < pair[1]),
            "{name} is not strictly ascending"
        );
    }
    assert!(!outputs.contains_key("german.txt"));
    assert!(!outputs.contains_key("Science.txt"));
}

#[test]
fn test_all_articles_ordering_and_uniqueness() {
    let fixture = Fixture::new(&generated_batches());
    let summary = fixture.run(5, DuplicatePolicy::DropAll, "out").unwrap();
    let outputs = read_outputs(&fixture.out_dir("out"));

    let rows: Vec<(&str, &str)> = outputs["all_articles.txt"]
        .lines()
        .map(|line| line.split_once(' ').unwrap())
        .collect();
    assert_eq!(rows.len(), summary.report.unique_articles);

    for pair in rows.windows(2) {
        let ((id_a, ts_a), (id_b, ts_b)) = (pair[0], pair[1]);
        assert!(ts_a > ts_b || (ts_a == ts_b && id_a < id_b));
    }

    let mut ids: Vec<_> = rows.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), rows.len());

    // 600 articles over 500 ids: both copies of the 100 repeated ids go.
    assert_eq!(summary.total_seen, 600);
    assert!(summary.report.unique_articles <= 400);
    assert_eq!(
        summary.report.duplicates_found,
        600 - summary.report.unique_articles
    );
}

#[test]
fn test_malformed_batch_is_fatal_and_writes_nothing() {
    let fixture = Fixture::new(&newsroom());
    fs::write(fixture.root().join("batch_1.json"), "[{\"uuid\": ").unwrap();

    let err = fixture.run(4, DuplicatePolicy::DropAll, "out").unwrap_err();
    assert!(format!("{err:#}").contains("Failed to decode"));
    assert!(read_outputs(&fixture.out_dir("out")).is_empty());
}

#[test]
fn test_missing_batch_is_fatal() {
    let fixture = Fixture::new(&newsroom());
    fs::remove_file(fixture.root().join("batch_0.json")).unwrap();

    let err = fixture.run(2, DuplicatePolicy::DropAll, "out").unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read article batch"));
}

#[test]
fn test_zero_workers_is_rejected() {
    let fixture = Fixture::new(&newsroom());
    let err = fixture.run(0, DuplicatePolicy::DropAll, "out").unwrap_err();
    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::InvalidWorkerCount)
    );
}

#[test]
fn test_more_workers_than_batches() {
    let fixture = Fixture::new(&newsroom());
    // Whichever copy wins each collision, one copy of n1/n4 and of n2 survives.
    let summary = fixture.run(16, DuplicatePolicy::KeepFirst, "out").unwrap();
    assert_eq!(summary.report.unique_articles, 5);
    assert_eq!(summary.phase_durations.len(), 5);
}

#[test]
fn test_run_from_command_line_args() {
    let fixture = Fixture::new(&newsroom());
    let out = fixture.out_dir("cli");
    let args = Args::parse_from([
        "newsagg".into(),
        fixture.root().join("articles.txt").into_os_string(),
        fixture.root().join("inputs.txt").into_os_string(),
        "--workers".into(),
        "3".into(),
        "--output-dir".into(),
        out.clone().into_os_string(),
    ]);

    let summary = newsagg::run(&args).unwrap();
    assert_eq!(summary.workers, 3);
    assert_eq!(summary.report.duplicates_found, 4);
    assert_eq!(summary.report.top_keyword, None);
    assert!(out.join("reports.txt").is_file());
}
