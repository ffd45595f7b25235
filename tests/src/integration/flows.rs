//! # Integration Test Flows
//!
//! Drives the real [`Connector`] (signer, codec, poller) against
//! [`FakeInvoiceService`], which verifies hashes and signatures the same way
//! the reporting service does.
//!
//! ## Flows Tested:
//!
//! 1. **Submit → poll → query**: a batch reaches `DONE` and becomes queryable
//! 2. **Credential failures**: wrong keys or passwords surface as `Auth`
//! 3. **Deadlines**: a timed-out poll keeps the handle usable
//! 4. **Transient failures**: status queries retry, submissions never do

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::NaiveDate;
    use nav_connector::{
        Connector, ConnectorConfig, ConnectorError, InvoiceConnectorApi, InvoiceDataQuery,
        InvoiceDataResult, InvoiceDirection, InvoiceOperation, InvoiceOperationBatch,
        ManualClock, OperationKind, PollOptions, SoftwareData, SoftwareOperation,
        TechnicalUser, TransportError,
    };
    use nav_telemetry::init_test_logging;
    use parking_lot::Mutex;

    use crate::fake_service::{FakeAccount, FakeInvoiceService, FakeTaxpayer};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    type TestConnector = Connector<Arc<FakeInvoiceService>, Arc<ManualClock>>;

    fn software() -> SoftwareData {
        SoftwareData {
            software_id: "HU12345678-1234567".to_string(),
            software_name: "Invoicing Suite".to_string(),
            software_operation: SoftwareOperation::LocalSoftware,
            software_main_version: "2.1".to_string(),
            software_dev_name: "Example Dev Kft.".to_string(),
            software_dev_contact: "dev@example.hu".to_string(),
            software_dev_country_code: Some("HU".to_string()),
            software_dev_tax_number: Some("12345678".to_string()),
        }
    }

    fn user_for(account: &FakeAccount) -> TechnicalUser {
        TechnicalUser::new(
            account.login.as_str(),
            account.password.as_str(),
            account.tax_number.as_str(),
            account.signing_key.as_str(),
            account.exchange_key.as_str(),
        )
    }

    fn setup_with(
        user: TechnicalUser,
        processing_polls: u32,
    ) -> (TestConnector, Arc<FakeInvoiceService>) {
        init_test_logging();
        let service = Arc::new(FakeInvoiceService::new(FakeAccount::sample(), processing_polls));
        let connector = Connector::with_parts(
            ConnectorConfig::for_testing(),
            user,
            software(),
            Arc::clone(&service),
            Arc::new(ManualClock::default()),
        )
        .unwrap();
        (connector, service)
    }

    fn setup(processing_polls: u32) -> (TestConnector, Arc<FakeInvoiceService>) {
        setup_with(user_for(&FakeAccount::sample()), processing_polls)
    }

    fn invoice_xml(number: &str) -> String {
        format!(
            "<InvoiceData xmlns=\"http://schemas.nav.gov.hu/OSA/2.0/data\">\
             <invoiceNumber>{}</invoiceNumber>\
             <invoiceIssueDate>2026-10-01</invoiceIssueDate>\
             </InvoiceData>",
            number
        )
    }

    fn create_batch(numbers: &[&str]) -> InvoiceOperationBatch {
        InvoiceOperationBatch::new(
            numbers
                .iter()
                .map(|n| InvoiceOperation::new(OperationKind::Create, invoice_xml(n)))
                .collect(),
        )
    }

    // =============================================================================
    // SUBMIT → POLL → QUERY
    // =============================================================================

    #[tokio::test]
    async fn test_batch_reaches_done_and_is_queryable() {
        let (connector, service) = setup(2);
        let batch = create_batch(&["INV-2026-001", "INV-2026-002"]);

        let managed = connector
            .manage_invoice(&batch, &PollOptions::for_testing())
            .await
            .unwrap();

        assert_eq!(managed.results.len(), 2);
        for (i, result) in managed.results.iter().enumerate() {
            assert_eq!(result.index, i as u32 + 1);
            assert_eq!(result.status.as_str(), "DONE");
            assert!(!result.has_errors());
        }
        assert_eq!(
            service.calls(),
            vec![
                "tokenExchange",
                "manageInvoice",
                "queryTransactionStatus",
                "queryTransactionStatus",
                "queryTransactionStatus",
            ]
        );

        let detail = connector
            .query_invoice_data(&InvoiceDataQuery::by_invoice_number(
                "INV-2026-002",
                InvoiceDirection::Outbound,
            ))
            .await
            .unwrap();
        let detail = detail.detail().expect("invoice stored after DONE");
        assert_eq!(detail.invoice_data, invoice_xml("INV-2026-002").into_bytes());
        assert_eq!(
            detail.audit_data.transaction_id.as_deref(),
            Some(managed.handle.as_str())
        );
        assert_eq!(detail.audit_data.index, Some(2));
    }

    #[tokio::test]
    async fn test_missing_invoice_is_empty() {
        let (connector, _) = setup(0);
        let result = connector
            .query_invoice_data(&InvoiceDataQuery::by_invoice_number(
                "NO-SUCH-INVOICE",
                InvoiceDirection::Outbound,
            ))
            .await
            .unwrap();
        assert_eq!(result, InvoiceDataResult::Empty);
    }

    #[tokio::test]
    async fn test_digest_query_lists_stored_invoices() {
        let (connector, _) = setup(0);
        connector
            .manage_invoice(&create_batch(&["B-2", "A-1"]), &PollOptions::for_testing())
            .await
            .unwrap();

        let query = InvoiceDataQuery::by_issue_date(
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
            InvoiceDirection::Outbound,
        );
        match connector.query_invoice_data(&query).await.unwrap() {
            InvoiceDataResult::Digest(page) => {
                assert_eq!(page.current_page, 1);
                let numbers: Vec<&str> =
                    page.digests.iter().map(|d| d.invoice_number.as_str()).collect();
                assert_eq!(numbers, vec!["A-1", "B-2"]);
            }
            other => panic!("expected digest page, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_invoice_is_aborted() {
        let (connector, _) = setup(0);
        let batch = InvoiceOperationBatch::new(vec![
            InvoiceOperation::new(OperationKind::Create, invoice_xml("GOOD-1")),
            InvoiceOperation::new(OperationKind::Create, "not xml at all"),
        ]);

        let managed = connector
            .manage_invoice(&batch, &PollOptions::for_testing())
            .await
            .unwrap();

        assert_eq!(managed.results[0].status.as_str(), "DONE");
        assert_eq!(managed.results[1].status.as_str(), "ABORTED");
        assert!(managed.results[1].has_errors());
        assert_eq!(
            managed.results[1].technical_messages[0].error_code.as_deref(),
            Some("SCHEMA_VIOLATION")
        );
    }

    #[tokio::test]
    async fn test_status_query_returns_original_request() {
        let (connector, _) = setup(0);
        let handle = connector
            .submit_invoices(&create_batch(&["ORIG-1"]))
            .await
            .unwrap();

        let results = connector
            .query_transaction_status(&handle, true)
            .await
            .unwrap();
        assert_eq!(
            results[0].original_request.as_deref(),
            Some(invoice_xml("ORIG-1").as_bytes())
        );
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_handles() {
        let (connector, service) = setup(1);
        let first = create_batch(&["C-1"]);
        let second = create_batch(&["C-2"]);
        let options = PollOptions::for_testing();

        let (a, b) = tokio::join!(
            connector.manage_invoice(&first, &options),
            connector.manage_invoice(&second, &options)
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.handle, b.handle);
        assert_eq!(service.transaction_count(), 2);
    }

    // =============================================================================
    // CREDENTIAL FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_wrong_signing_key_is_auth_error() {
        let mut account = FakeAccount::sample();
        account.signing_key = "tampered-signing-key".to_string();
        let (connector, service) = setup_with(user_for(&account), 0);

        match connector.submit_invoices(&create_batch(&["X-1"])).await {
            Err(ConnectorError::Auth(fault)) => {
                assert_eq!(fault.error_code.as_deref(), Some("INVALID_REQUEST_SIGNATURE"))
            }
            other => panic!("expected auth error, got {:?}", other),
        }
        assert_eq!(service.calls(), vec!["tokenExchange"]);
        assert_eq!(service.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_error() {
        let mut account = FakeAccount::sample();
        account.password = "wrong".to_string();
        let (connector, _) = setup_with(user_for(&account), 0);

        assert!(matches!(
            connector.test_connection().await,
            Err(ConnectorError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_exchange_key_fails_token_decoding() {
        let mut account = FakeAccount::sample();
        account.exchange_key = "0000000000000000".to_string();
        let (connector, _) = setup_with(user_for(&account), 0);

        assert!(matches!(
            connector.test_connection().await,
            Err(ConnectorError::ExchangeToken(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_decodes_token() {
        let (connector, _) = setup(0);
        connector.test_connection().await.unwrap();

        let token = connector.token_exchange().await.unwrap();
        assert!(token.token.expose().starts_with("exchange-token-"));
        assert!(token.valid_to > token.valid_from);
    }

    // =============================================================================
    // DEADLINES
    // =============================================================================

    #[tokio::test]
    async fn test_zero_wait_times_out_and_handle_survives() {
        let (connector, _) = setup(3);
        let batch = create_batch(&["SLOW-1"]);
        let options = PollOptions::for_testing().with_max_wait(Duration::ZERO);

        let handle = match connector.manage_invoice(&batch, &options).await {
            Err(ConnectorError::PollTimeout {
                handle,
                last_results,
                ..
            }) => {
                assert_eq!(last_results.len(), 1);
                assert_eq!(last_results[0].status.as_str(), "PROCESSING");
                handle
            }
            other => panic!("expected timeout, got {:?}", other),
        };

        let results = connector
            .await_results(&handle, &PollOptions::for_testing())
            .await
            .unwrap();
        assert_eq!(results[0].status.as_str(), "DONE");
    }

    // =============================================================================
    // TRANSIENT FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_status_polling_survives_service_unavailable() {
        let (connector, service) = setup(0);
        let handle = connector
            .submit_invoices(&create_batch(&["RETRY-1"]))
            .await
            .unwrap();

        service.inject_response("queryTransactionStatus", 503, b"<html>Service Unavailable</html>");
        let results = connector
            .await_results(&handle, &PollOptions::for_testing())
            .await
            .unwrap();

        assert_eq!(results[0].status.as_str(), "DONE");
        assert_eq!(
            service
                .calls()
                .iter()
                .filter(|c| c.as_str() == "queryTransactionStatus")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_submission_is_never_retried() {
        let (connector, service) = setup(0);
        service.inject_response("tokenExchange", 200, b"<html>ok</html>");

        assert!(matches!(
            connector.submit_invoices(&create_batch(&["ONCE-1"])).await,
            Err(ConnectorError::MalformedResponse(_))
        ));

        service.inject_response("manageInvoice", 503, b"<html>Service Unavailable</html>");
        let err = connector
            .submit_invoices(&create_batch(&["ONCE-1"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Transport(TransportError::Status { status: 503 })
        ));
        assert_eq!(
            service.calls(),
            vec!["tokenExchange", "tokenExchange", "manageInvoice"]
        );
        assert_eq!(service.transaction_count(), 0);
    }

    // =============================================================================
    // TAXPAYER
    // =============================================================================

    #[tokio::test]
    async fn test_taxpayer_lookup() {
        let (connector, service) = setup(0);
        service.add_taxpayer(
            "24291763",
            FakeTaxpayer {
                name: "Példa Kereskedelmi Kft.".to_string(),
                short_name: Some("Példa Kft.".to_string()),
                city: "Budapest".to_string(),
                postal_code: "1051".to_string(),
            },
        );

        let known = connector.query_taxpayer("24291763").await.unwrap();
        assert!(known.validity);
        let data = known.data.unwrap();
        assert_eq!(data.name, "Példa Kereskedelmi Kft.");
        assert_eq!(data.address.unwrap().city.as_deref(), Some("Budapest"));

        let unknown = connector.query_taxpayer("87654321").await.unwrap();
        assert!(!unknown.validity);
        assert!(unknown.data.is_none());
    }

    // =============================================================================
    // LOG FIELDS
    // =============================================================================

    /// Buffer the JSON formatter writes into.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_transaction_events_carry_structured_ids() {
        let (connector, _service) = setup(1);
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let handle = connector
            .submit_invoices(&create_batch(&["INV-2026-900"]))
            .await
            .unwrap();
        connector
            .await_results(&handle, &PollOptions::for_testing())
            .await
            .unwrap();

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        let field = format!("\"transaction_id\":\"{}\"", handle);
        let submitted = output
            .lines()
            .any(|line| line.contains(&field) && line.contains("Batch submitted"));
        let done = output
            .lines()
            .any(|line| line.contains(&field) && line.contains("Transaction done"));
        assert!(submitted && done, "missing {} in:\n{}", field, output);
        assert!(output.contains("\"request_id\":\""));
    }
}
