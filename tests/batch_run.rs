use std::time::Duration;

use ecotox_harvester::{BatchRunner, ResultLogs};
use ecotox_query::testing::{EcotoxSite, SiteResponse, SiteRow};
use ecotox_query::{BatchInput, QueryDriver, QueryError, QueryTimeouts};

fn quick_timeouts() -> QueryTimeouts {
    QueryTimeouts {
        wait: Duration::from_millis(300),
        input_settle: Duration::ZERO,
        panel_animation: Duration::ZERO,
        refresh_delay: Duration::ZERO,
    }
}

fn two_species_batch() -> BatchInput {
    BatchInput {
        chemicals: vec!["DDT".into(), "heptachlor".into()],
        species: vec!["Lepomis".into(), "Bufo".into()],
        endpoints: vec!["LC50".into(), "LC50".into()],
        durations: vec![4, 1],
    }
}

#[test]
fn mismatched_lists_fail_before_any_browser_work() {
    let site = EcotoxSite::new(vec![]);
    let mut input = two_species_batch();
    input.durations.pop();

    let err = BatchRunner::new(&input).unwrap_err();
    assert!(matches!(err, QueryError::Precondition(_)));
    assert!(site.journal().is_empty());
}

#[tokio::test]
async fn batch_writes_detail_lines_and_matrix_rows() {
    let site = EcotoxSite::new(vec![
        SiteResponse::Rows(vec![
            SiteRow::new("LC50", "4 Day(s)", "AI\n1.2 mg/L"),
            SiteRow::new("LC50", "4 Day(s)", "AI\n3.0 mg/L"),
        ]),
        SiteResponse::Empty,
        SiteResponse::Rows(vec![SiteRow::new("LC50", "1 Day(s)", "AI\n0.00001 mg/L")]),
        SiteResponse::Rows(vec![
            SiteRow::new("LC50", "1 Day(s)", "AI\n~2 mg/L"),
            SiteRow::new("LC50", "4 Day(s)", "AI\n2 mg/L"),
        ]),
    ]);
    let dir = tempfile::tempdir().unwrap();
    let detail = dir.path().join("log_file.txt");
    let matrix = dir.path().join("result_file.txt");

    let input = two_species_batch();
    let runner = BatchRunner::new(&input).unwrap();
    let mut logs = ResultLogs::open(&detail, &matrix).await.unwrap();
    let mut driver = QueryDriver::new(site.session()).with_timeouts(quick_timeouts());

    let summary = runner.run(&mut driver, &mut logs).await.unwrap();
    assert_eq!(summary.queries, 4);
    assert_eq!(summary.empty_queries, 2);
    assert_eq!(summary.run_id, runner.run_id());
    assert_eq!(site.submits(), 4);

    assert_eq!(
        std::fs::read_to_string(&detail).unwrap(),
        "Lepomis\tDDT\tLC50\t4_Day(s)\t1.89737\t[1.2, 3.0]\n\
         Lepomis\theptachlor\tLC50\t4_Day(s)\t0.00000\t[]\n\
         Bufo\tDDT\tLC50\t1_Day(s)\t0.00001\t[1e-05]\n\
         Bufo\theptachlor\tLC50\t1_Day(s)\t0.00000\t[]\n"
    );
    assert_eq!(
        std::fs::read_to_string(&matrix).unwrap(),
        "1.89737\t0.00000\tLepomis\n0.00001\t0.00000\tBufo\n"
    );
}

#[tokio::test]
async fn failure_keeps_completed_lines() {
    let site = EcotoxSite::new(vec![
        SiteResponse::Rows(vec![SiteRow::new("LC50", "4 Day(s)", "AI\n5 mg/L")]),
        SiteResponse::Hang,
    ]);
    let dir = tempfile::tempdir().unwrap();
    let detail = dir.path().join("log_file.txt");
    let matrix = dir.path().join("result_file.txt");

    let input = two_species_batch();
    let runner = BatchRunner::new(&input).unwrap();
    let mut logs = ResultLogs::open(&detail, &matrix).await.unwrap();
    let mut driver = QueryDriver::new(site.session()).with_timeouts(quick_timeouts());

    let err = runner.run(&mut driver, &mut logs).await.unwrap_err();
    let cause = err.downcast_ref::<QueryError>().unwrap();
    assert!(matches!(cause, QueryError::Timeout(_)));
    assert!(err.to_string().contains("query 2/4 failed"));

    assert_eq!(
        std::fs::read_to_string(&detail).unwrap(),
        "Lepomis\tDDT\tLC50\t4_Day(s)\t5.00000\t[5.0]\n"
    );
    assert_eq!(std::fs::read_to_string(&matrix).unwrap(), "5.00000\t");
    assert_eq!(site.submits(), 2);
}
