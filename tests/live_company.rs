use filingwatch::edgar::{CompanyOperations, Edgar};
use filingwatch::EdgarError;

#[tokio::test]
#[ignore]
async fn company_cik() {
    let edgar = Edgar::new("test_agent example@example.com").unwrap();
    let cik = edgar.company_cik("AAPL").await.unwrap();
    assert_eq!(cik, 320193);
}

#[tokio::test]
#[ignore]
async fn company_cik_not_found() {
    let edgar = Edgar::new("test_agent example@example.com").unwrap();
    let result = edgar.company_cik("INVALID").await;
    assert!(matches!(result, Err(EdgarError::TickerNotFound)));
}
