use super::types::TestResults;
use crate::runner::state::{ExecutionResult, FailureKind, NotebookStatus};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(\x07|\x1b\\)")
            .expect("ansi pattern is valid")
    })
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Tool output with colour codes and characters XML 1.0 forbids removed
fn xml_text(raw: &str) -> String {
    ansi_pattern()
        .replace_all(raw, "")
        .chars()
        .filter(|c| is_xml_char(*c))
        .collect()
}

/// Generate JUnit XML report string from TestResults
pub fn generate_junit_xml(results: &TestResults) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    // Timeouts and assertion-style cell errors are failures; a tool that
    // never ran or was killed is an error
    let total_tests = results.results.len();
    let failures = count_kinds(results, &[FailureKind::ExecutionError, FailureKind::Timeout]);
    let errors = count_kinds(
        results,
        &[FailureKind::ToolInvocation, FailureKind::Interrupted],
    );
    let total_duration: u64 = results.results.iter().map(|r| r.duration_ms).sum();

    // <testsuites>
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "nb-tester-run"));
    suites_start.push_attribute(("tests", total_tests.to_string().as_str()));
    suites_start.push_attribute(("failures", failures.to_string().as_str()));
    suites_start.push_attribute(("errors", errors.to_string().as_str()));
    suites_start.push_attribute(("time", seconds(total_duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    // <testsuite>
    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", "notebooks"));
    suite_start.push_attribute(("tests", total_tests.to_string().as_str()));
    suite_start.push_attribute(("failures", failures.to_string().as_str()));
    suite_start.push_attribute(("errors", errors.to_string().as_str()));
    suite_start.push_attribute(("skipped", "0"));
    suite_start.push_attribute(("id", results.session_id.as_str()));
    suite_start.push_attribute(("time", seconds(total_duration).as_str()));
    suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for result in &results.results {
        write_test_case(&mut writer, result)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    Ok(xml)
}

fn count_kinds(results: &TestResults, kinds: &[FailureKind]) -> usize {
    results
        .results
        .iter()
        .filter_map(|r| r.status.failure_kind())
        .filter(|k| kinds.contains(k))
        .count()
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    result: &ExecutionResult,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    // Directory becomes the classname: basics/intro.ipynb -> basics
    let classname = Path::new(&result.path)
        .parent()
        .map(|p| p.to_string_lossy().replace(['/', '\\'], "."))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "notebooks".to_string());

    case_start.push_attribute(("name", result.path.as_str()));
    case_start.push_attribute(("classname", classname.as_str()));
    case_start.push_attribute(("time", seconds(result.duration_ms).as_str()));
    writer.write_event(Event::Start(case_start))?;

    if let NotebookStatus::Failed { kind, message } = &result.status {
        let tag = match kind {
            FailureKind::ExecutionError | FailureKind::Timeout => "failure",
            FailureKind::ToolInvocation | FailureKind::Interrupted => "error",
        };
        let mut fail_start = BytesStart::new(tag);
        fail_start.push_attribute(("message", xml_text(message).as_str()));
        fail_start.push_attribute(("type", kind.label()));
        writer.write_event(Event::Start(fail_start))?;
        writer.write_event(Event::Text(BytesText::new(&xml_text(&result.stderr))))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }

    if !result.stdout.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&xml_text(&result.stdout))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }
    if !result.stderr.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("system-err")))?;
        writer.write_event(Event::Text(BytesText::new(&xml_text(&result.stderr))))?;
        writer.write_event(Event::End(BytesEnd::new("system-err")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Generate JUnit report to a file or stdout
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let xml = generate_junit_xml(results)?;
    if let Some(path) = output {
        std::fs::write(path, xml)?;
        println!("JUnit report saved to: {}", path.display());
    } else {
        println!("{}", xml);
    }
    Ok(())
}

/// Write report to file
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<()> {
    generate(results, Some(&output_dir.join("junit.xml")))
}
