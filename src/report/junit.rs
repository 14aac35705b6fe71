use super::types::SuiteReport;
use crate::runner::state::TestResult;
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

/// Generate a JUnit XML document for one suite report
pub fn generate_junit_xml(report: &SuiteReport, suite_name: &str) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let total = report.total.to_string();
    let failures = report.failed.to_string();

    // <testsuites>
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "qms-e2e"));
    suites_start.push_attribute(("tests", total.as_str()));
    suites_start.push_attribute(("failures", failures.as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", suite_name));
    suite_start.push_attribute(("tests", total.as_str()));
    suite_start.push_attribute(("failures", failures.as_str()));
    suite_start.push_attribute(("skipped", "0"));
    suite_start.push_attribute(("timestamp", report.date.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for result in &report.tests {
        write_test_case(&mut writer, suite_name, result)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let xml = String::from_utf8(writer.into_inner().into_inner())?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    suite_name: &str,
    result: &TestResult,
) -> Result<()> {
    let classname = format!("qms_e2e.{}", suite_name);
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", result.title.as_str()));
    case_start.push_attribute(("classname", classname.as_str()));

    if result.is_passed() {
        writer.write_event(Event::Empty(case_start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(case_start))?;

    // The error text starts with its class, e.g. "AssertionFailure: ..."
    let kind = result
        .error
        .split_once(':')
        .map(|(kind, _)| kind)
        .filter(|kind| !kind.contains(' '))
        .unwrap_or("Failure");
    let mut fail_start = BytesStart::new("failure");
    fail_start.push_attribute(("message", result.error.as_str()));
    fail_start.push_attribute(("type", kind));
    writer.write_event(Event::Start(fail_start))?;
    writer.write_event(Event::Text(BytesText::new(&result.error)))?;
    writer.write_event(Event::End(BytesEnd::new("failure")))?;

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write `<suite_name>_junit.xml` into `output_dir`
pub fn write_report(report: &SuiteReport, suite_name: &str, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let xml = generate_junit_xml(report, suite_name)?;
    let path = output_dir.join(format!("{}_junit.xml", suite_name));
    std::fs::write(&path, xml)?;
    println!("    Generated JUnit report: {}", path.display());
    Ok(())
}
