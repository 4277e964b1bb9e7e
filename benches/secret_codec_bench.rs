//! 性能基准测试 - 秘密加解密与链上费用/端点构建
//!
//! 测试场景:
//! 1. 不同 PBKDF2 迭代次数下的 seal / unseal 耗时
//! 2. 助记词派生地址耗时
//! 3. 端点列表构建
//!
//! 性能目标:
//! - 默认迭代次数下单次 unseal: < 500ms（release）

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keyvault_core::{
    domain::{derivation::AccountDeriver, secret::Secret},
    infrastructure::{encryption::SecretCodec, pbkdf2, rpc_selector},
};

const MNEMONIC: &str = "test test test test test test test test test test test junk";
const PASSWORD: &str = "bench-password";

// ============ 加解密 ============

fn bench_seal_unseal(c: &mut Criterion) {
    let mut group = c.benchmark_group("secret_codec");
    group.sample_size(10);

    for iterations in [pbkdf2::MIN_ITERATIONS, pbkdf2::DEFAULT_ITERATIONS] {
        let codec = SecretCodec::new(iterations).unwrap();
        let sealed = codec.seal(MNEMONIC.as_bytes(), PASSWORD).unwrap();

        group.bench_with_input(BenchmarkId::new("seal", iterations), &codec, |b, codec| {
            b.iter(|| codec.seal(black_box(MNEMONIC.as_bytes()), black_box(PASSWORD)))
        });

        group.bench_with_input(BenchmarkId::new("unseal", iterations), &codec, |b, codec| {
            b.iter(|| codec.unseal(black_box(&sealed), black_box(PASSWORD)))
        });
    }

    group.finish();
}

// ============ 派生 ============

fn bench_derive_account(c: &mut Criterion) {
    let deriver = AccountDeriver::new();
    let secret = Secret::parse(MNEMONIC).unwrap();

    c.bench_function("derive_account_from_mnemonic", |b| {
        b.iter(|| deriver.derive_account(black_box(&secret), 0))
    });
}

// ============ 端点列表 ============

fn bench_endpoint_list(c: &mut Criterion) {
    let backups = rpc_selector::default_public_backups();

    c.bench_function("build_endpoint_list_fallback_chain", |b| {
        b.iter(|| {
            rpc_selector::build_endpoint_list(
                black_box(1),
                black_box("https://eth-mainnet.g.alchemy.com/v2/key"),
                1,
                &backups,
            )
        })
    });
}

criterion_group!(
    benches,
    bench_seal_unseal,
    bench_derive_account,
    bench_endpoint_list
);
criterion_main!(benches);
