use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use recomposer::data::genotype::GenotypeColumn;
use recomposer::io::window::FunctionBlockBuilder;
use recomposer::model::allele_block::{partition, AlleleSet};
use recomposer::model::merger::merge;
use recomposer::pipelines::Recomposer;
use recomposer::{InMemoryReference, SimplePosition};
use std::hint::black_box;

const BASES: [u8; 4] = *b"ACGT";
const GENOTYPES: [&str; 4] = ["0|1", "1|0", "1|1", "0|0"];

fn synthetic_sequence(len: usize) -> Vec<u8> {
    (0..len).map(|i| BASES[(i * 7 + i / 5) % 4]).collect()
}

/// Clusters of three SNVs two bases apart, clusters ten bases apart
fn synthetic_positions(sequence: &[u8], n_clusters: usize, n_samples: usize) -> Vec<SimplePosition> {
    let mut positions = Vec::with_capacity(n_clusters * 3);
    for c in 0..n_clusters {
        for k in 0..3 {
            let start = (c * 10 + k * 2 + 1) as u32;
            let ref_base = sequence[start as usize - 1];
            let alt_base = BASES[(BASES.iter().position(|&b| b == ref_base).unwrap_or(0) + 1) % 4];
            let samples: Vec<&str> = (0..n_samples)
                .map(|s| GENOTYPES[(s + c + k) % GENOTYPES.len()])
                .collect();
            positions.push(
                SimplePosition::new(
                    "chr1",
                    start,
                    (ref_base as char).to_string(),
                    vec![(alt_base as char).to_string()],
                )
                .with_samples("GT", &samples),
            );
        }
    }
    positions
}

/// Full recomposition of one chromosome
fn bench_recompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompose");
    let n_samples = 32;

    for n_clusters in [100, 1_000, 5_000] {
        let sequence = synthetic_sequence(n_clusters * 10 + 10);
        let reference = InMemoryReference::new().with_sequence("chr1", &sequence);
        let positions = synthetic_positions(&sequence, n_clusters, n_samples);
        let block_ends = FunctionBlockBuilder::new().build(&positions);
        group.throughput(Throughput::Elements(positions.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("clusters", n_clusters),
            &n_clusters,
            |b, _| {
                let recomposer = Recomposer::new(&reference);
                b.iter(|| {
                    let result = recomposer
                        .recompose(black_box(&positions), black_box(&block_ends))
                        .unwrap();
                    black_box(result.variants.len())
                })
            },
        );
    }

    group.finish();
}

/// Partition and merge of a single window group
fn bench_partition_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_merge");

    for n_samples in [16, 128, 1024] {
        let sequence = synthetic_sequence(20);
        let positions = synthetic_positions(&sequence, 1, n_samples);
        let block_ends = FunctionBlockBuilder::new().build(&positions);
        let columns: Vec<GenotypeColumn> = positions
            .iter()
            .map(|p| GenotypeColumn::encode(p).unwrap())
            .collect();
        group.throughput(Throughput::Elements(n_samples as u64));

        group.bench_with_input(
            BenchmarkId::new("samples", n_samples),
            &n_samples,
            |b, _| {
                b.iter(|| {
                    let set = AlleleSet::from_slice(black_box(&positions), &block_ends);
                    let partition = partition(&set, black_box(&columns));
                    black_box(merge(&partition).len())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_recompose, bench_partition_merge);
criterion_main!(benches);
