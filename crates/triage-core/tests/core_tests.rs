use std::fs;
use std::io::Write;
use tempfile::TempDir;

use triage_core::data_processor::DataProcessor;
use triage_core::types::Category;

#[test]
fn feedback_file_skips_header_and_strips_prefix() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("feedback.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "User Feedback Log").unwrap();
    writeln!(f, "Feedback #1: The password reset email never arrived.").unwrap();
    writeln!(f).unwrap();
    writeln!(f, "Feedback #12:   Dark mode is great   ").unwrap();

    let processor = DataProcessor::new().expect("processor");
    let records = processor.load_feedbacks(&file_path).expect("load");

    assert_eq!(records.len(), 2, "header and blank lines are dropped");
    assert_eq!(records[0].content, "The password reset email never arrived.");
    assert_eq!(records[1].content, "Dark mode is great");
    assert!(records.iter().all(|r| r.category == Category::Feedbacks));
}

#[test]
fn bug_file_splits_on_five_newlines_and_drops_title_line() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("bugs.txt");
    let body = "Bug Report #1\nTitle: Login crash\nSeverity: High\n\n\n\n\nBug Report #2\nTitle: Slow search\nSeverity: Low";
    fs::write(&file_path, body).unwrap();

    let processor = DataProcessor::new().expect("processor");
    let records = processor.load_bug_reports(&file_path).expect("load");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].content, "Title: Login crash\nSeverity: High");
    assert_eq!(records[1].content, "Title: Slow search\nSeverity: Low");
    assert!(records.iter().all(|r| r.category == Category::Bugs));
}

#[test]
fn load_all_keeps_feedbacks_before_bugs() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("f.txt"), "header\nFeedback #1: alpha").unwrap();
    fs::write(dir.join("b.txt"), "Bug #1\nbravo").unwrap();

    let processor = DataProcessor::new().expect("processor");
    let records = processor.load_all(&dir.join("f.txt"), &dir.join("b.txt")).expect("load all");

    let categories: Vec<Category> = records.iter().map(|r| r.category).collect();
    assert_eq!(categories, vec![Category::Feedbacks, Category::Bugs]);
}

#[test]
fn missing_file_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let processor = DataProcessor::new().expect("processor");
    let err = processor.load_feedbacks(&tmp.path().join("nope.txt")).unwrap_err();
    assert_eq!(err.kind(), "io");
}
