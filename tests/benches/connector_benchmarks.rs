//! # Connector Benchmarks
//!
//! Per-request CPU cost outside the network:
//!
//! | Path | Work per call |
//! |------|---------------|
//! | Request signature | one SHA3-512 |
//! | Batch signature | one SHA3-512 per operation, plus base64 of each payload |
//! | Envelope encode/decode | XML write and parse of a `manageInvoice` request |

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use nav_connector::codec::requests::{manage_invoice_body, request_envelope};
use nav_connector::{
    InvoiceOperation, InvoiceOperationBatch, OperationKind, RequestContext, RequestEnvelopeCodec,
    RequestId, SoftwareData, SoftwareOperation, TechnicalUser,
};
use nav_crypto::{batch_signature, request_signature};

fn batch(size: usize) -> InvoiceOperationBatch {
    InvoiceOperationBatch::new(
        (0..size)
            .map(|i| {
                let payload = format!(
                    "<InvoiceData><invoiceNumber>BENCH-{:05}</invoiceNumber>{}</InvoiceData>",
                    i,
                    "<line>x</line>".repeat(50)
                );
                InvoiceOperation::new(OperationKind::Create, payload)
            })
            .collect(),
    )
}

fn bench_signatures(c: &mut Criterion) {
    let mut group = c.benchmark_group("signing");
    let timestamp = Utc::now();

    group.bench_function("request_signature", |b| {
        b.iter(|| black_box(request_signature("RID123456789", &timestamp, "signing-key")))
    });

    for size in [1usize, 10, 100] {
        let batch = batch(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("batch_signature", size), &batch, |b, batch| {
            b.iter(|| {
                black_box(batch_signature(
                    "RID123456789",
                    &timestamp,
                    "signing-key",
                    &batch.signed_operations(),
                ))
            })
        });
    }
    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");
    let user = TechnicalUser::new("benchuser", "password", "12345678", "signing-key", "0123456789abcdef");
    let software = SoftwareData {
        software_id: "HU12345678-0000001".to_string(),
        software_name: "bench".to_string(),
        software_operation: SoftwareOperation::LocalSoftware,
        software_main_version: "1.0".to_string(),
        software_dev_name: "bench".to_string(),
        software_dev_contact: "bench@example.com".to_string(),
        software_dev_country_code: None,
        software_dev_tax_number: None,
    };

    for size in [1usize, 100] {
        let batch = batch(size);
        let context = RequestContext::new(RequestId::generate(), Utc::now(), "SIG".to_string());
        let envelope = request_envelope(
            nav_connector::ServiceOperation::ManageInvoice,
            &context,
            &user,
            &software,
            manage_invoice_body("token", &batch),
        );
        let encoded = RequestEnvelopeCodec::encode(&envelope).unwrap();

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &envelope, |b, envelope| {
            b.iter(|| black_box(RequestEnvelopeCodec::encode(envelope).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| black_box(RequestEnvelopeCodec::decode_envelope(encoded).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_signatures, bench_envelope);
criterion_main!(benches);
