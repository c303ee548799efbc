//! # Mirror EVM Engine Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | Interpreter | Full call through the service, by loop length |
//! | Pricing | Gas price lookup and multiplier saturation |
//! | Codec | Token service input decoding, by batch size |
//! | Versions | Timestamp resolution over the default table |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mirror_evm::adapters::{StaticExchangeRates, StaticFeeSchedule};
use mirror_evm::config::DEFAULT_VERSION_TABLE;
use mirror_evm::domain::transactions::Functionality;
use mirror_evm::domain::value_objects::Timestamp;
use mirror_evm::evm::VersionRegistry;
use mirror_evm::ports::inbound::SimulationApi;
use mirror_evm::precompile::abi::{encode_call, Token};
use mirror_evm::precompile::codec;
use mirror_evm::precompile::TokenFunction;
use mirror_evm::pricing::{saturating_price, ExchangeRate, PricesSource};
use mirror_evm_tests::integration::fixtures::{
    addr, call_to, contract, service, snapshot_with, token_schedule, CONTRACT,
};
use std::sync::Arc;
use std::time::Duration;

/// Counts down from the PUSH2 operand to zero.
fn countdown(iterations: u16) -> Vec<u8> {
    let [hi, lo] = iterations.to_be_bytes();
    vec![
        0x61, hi, lo, 0x5b, 0x60, 0x01, 0x90, 0x03, 0x80, 0x60, 0x03, 0x57, 0x00,
    ]
}

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Runtime::new().expect("runtime");

    for iterations in [10u16, 100, 1_000] {
        let service = service(snapshot_with(vec![contract(CONTRACT, &countdown(iterations))]));
        group.throughput(Throughput::Elements(u64::from(iterations)));
        group.bench_with_input(
            BenchmarkId::new("countdown_call", iterations),
            &service,
            |b, service| {
                b.iter(|| {
                    let result = runtime
                        .block_on(service.call(call_to(CONTRACT, Vec::new())))
                        .expect("call");
                    black_box(result.gas_used)
                })
            },
        );
    }

    group.finish();
}

fn bench_pricing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pricing");
    let schedule: Arc<StaticFeeSchedule> = Arc::new(token_schedule());
    let source = PricesSource::new(
        schedule,
        Arc::new(StaticExchangeRates::fixed(ExchangeRate::new(1, 12))),
    );
    let now = Timestamp::from_seconds(1_000);

    group.bench_function("current_gas_price", |b| {
        b.iter(|| {
            black_box(
                source
                    .current_gas_price(black_box(now), Functionality::ContractCall)
                    .expect("priced"),
            )
        })
    });
    group.bench_function("saturating_price", |b| {
        b.iter(|| black_box(saturating_price(black_box(1_000), black_box(i64::MAX / 999))))
    });

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let selector = TokenFunction::AssociateTokens.selector();

    for batch in [1usize, 10, 100] {
        let input = encode_call(
            selector,
            &[
                Token::Address(addr(CONTRACT)),
                Token::Array(
                    (0..batch)
                        .map(|i| Token::Address(addr(2_000 + i as u64)))
                        .collect(),
                ),
            ],
        );
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(
            BenchmarkId::new("decode_associate_tokens", batch),
            &input,
            |b, input| {
                b.iter(|| black_box(codec::decode_relations(selector, input, true).expect("decoded")))
            },
        );
    }

    group.finish();
}

fn bench_version_resolution(c: &mut Criterion) {
    let registry = VersionRegistry::new(&DEFAULT_VERSION_TABLE).expect("default table");
    c.bench_function("resolve_version", |b| {
        b.iter(|| {
            black_box(
                registry
                    .resolve(black_box(Timestamp::from_seconds(1_700_000_000)), None)
                    .version(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_interpreter,
    bench_pricing,
    bench_codec,
    bench_version_resolution,
);
criterion_main!(benches);
