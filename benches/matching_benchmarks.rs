/// Performance benchmarks for name parsing, name matching and hit reduction
///
/// Run with: cargo bench
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use taxmatch::hit_reducer::{reduce_hits, ReduceConfig};
use taxmatch::hits::{AlignmentHit, Hsp, QueryHits};
use taxmatch::name_match::match_name;
use taxmatch::name_parse::parse_name;
use taxmatch::taxon_index::TaxonIndex;

const GENERA: &[&str] = &[
    "Escherichia",
    "Bacillus",
    "Lactobacillus",
    "Streptomyces",
    "Pseudomonas",
    "Vibrio",
    "Clostridium",
    "Methanococcus",
];

const SPECIES: &[&str] = &["coli", "subtilis", "casei", "griseus", "putida", "fischeri"];

const STRAIN_FORMS: &[&str] = &["str. K-{}", "ATCC {}", "DSM:{}", "subsp. alpha LMG {}", "WCFS{}"];

/// Synthetic reference names with varied strain formatting
fn generate_names(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| {
            let genus = GENERA[i % GENERA.len()];
            let species = SPECIES[(i / GENERA.len()) % SPECIES.len()];
            let strain = STRAIN_FORMS[i % STRAIN_FORMS.len()].replace("{}", &(i * 7).to_string());
            (format!("R{i}"), format!("{genus} {species} {strain}"))
        })
        .collect()
}

fn bench_parse_name(c: &mut Criterion) {
    let names = generate_names(1000);
    let mut group = c.benchmark_group("parse_name");
    group.throughput(Throughput::Elements(names.len() as u64));
    group.bench_function("mixed_strains", |b| {
        b.iter(|| {
            for (_, name) in &names {
                black_box(parse_name(black_box(name)));
            }
        })
    });
    group.finish();
}

fn bench_match_name(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_name");

    for size in [1000, 10000].iter() {
        let references = generate_names(*size);
        let index = TaxonIndex::build(
            references
                .iter()
                .map(|(id, name)| (id.as_str(), name.as_str())),
        );
        // Every other query misses the exact tier and falls through to token matching
        let queries: Vec<String> = references
            .iter()
            .step_by(10)
            .enumerate()
            .map(|(i, (_, name))| {
                if i % 2 == 0 {
                    name.clone()
                } else {
                    format!("{name} substr. X{i}")
                }
            })
            .collect();

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &queries, |b, queries| {
            b.iter(|| {
                for query in queries {
                    black_box(match_name(query, &index, true));
                }
            })
        });
    }
    group.finish();
}

fn bench_reduce_hits(c: &mut Criterion) {
    let queries: Vec<QueryHits> = (0..1000)
        .map(|q| QueryHits {
            query_id: format!("G{q}"),
            hits: (0..50)
                .map(|t| {
                    let hsp = Hsp {
                        raw_score: (2700 - t * 10) as f64,
                        identical: 1500 - (t as u32 % 20),
                        query_len: 1500,
                        target_len: 1500,
                        aligned_query_len: 1500,
                        aligned_target_len: 1500,
                    };
                    AlignmentHit::new(format!("R{t}"), vec![hsp])
                })
                .collect(),
        })
        .collect();

    let config = ReduceConfig::default();
    c.bench_function("reduce_hits_1000x50", |b| {
        b.iter(|| black_box(reduce_hits(black_box(&queries), &config)))
    });
}

criterion_group!(benches, bench_parse_name, bench_match_name, bench_reduce_hits);
criterion_main!(benches);
