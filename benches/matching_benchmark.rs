//! Matching hot path: normalize, classify, match and build identities
//! over a batch of listing titles

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tcg_stock_watch::domain::identity::{SeriesTable, build_identity};
use tcg_stock_watch::domain::keywords::{ProductQuery, SynonymTable};
use tcg_stock_watch::domain::matcher::{MatchSettings, best_query};
use tcg_stock_watch::domain::normalizer::normalize;
use tcg_stock_watch::domain::product_type::classify;

const TITLES: &[&str] = &[
    "Pokémon TCG: Journey Together (SV09) – 36er Display (EN)",
    "Pokémon TCG: Journey Together (SV09) – Checklane Blister (EN)",
    "Karmesin & Purpur Reisegefährten Booster Display (DE)",
    "Prismatische Entwicklungen Top Trainer Box",
    "Destined Rivals Elite Trainer Box English",
    "One Piece OP-10 Royal Blood Booster Display JP",
    "Mega Evolution Premium Collection",
    "Stellarkrone Build & Battle Box",
    "Pokémon Booster Display 18er",
    "Yu-Gi-Oh! Rage of the Abyss Booster Display",
];

fn titles(repeat: usize) -> Vec<String> {
    TITLES.iter().cycle().take(TITLES.len() * repeat).map(|t| (*t).to_string()).collect()
}

fn matching_benchmark(c: &mut Criterion) {
    let synonyms: SynonymTable = serde_json::from_str(r#"{"display": ["box", "36er"], "etb": ["elite trainer box"]}"#)
        .unwrap();
    let queries = ProductQuery::from_lines(
        ["Journey Together display", "Reisegefährten display", "Destined Rivals etb", "Royal Blood display"],
        &synonyms,
    );
    let settings = MatchSettings::default();
    let series = SeriesTable::builtin();
    let batch = titles(50);

    c.bench_function("normalize 500 titles", |b| {
        b.iter(|| batch.iter().map(|t| normalize(black_box(t)).len()).sum::<usize>());
    });

    c.bench_function("classify 500 titles", |b| {
        b.iter(|| batch.iter().map(|t| classify(black_box(t))).filter(|t| t.is_display()).count());
    });

    c.bench_function("best query over 500 titles", |b| {
        b.iter(|| {
            batch
                .iter()
                .filter(|t| best_query(&queries, black_box(t), &settings).is_some())
                .count()
        });
    });

    c.bench_function("build identity for 500 titles", |b| {
        b.iter(|| {
            batch
                .iter()
                .map(|t| build_identity("tcgviert", black_box(t), &series))
                .count()
        });
    });
}

criterion_group!(benches, matching_benchmark);
criterion_main!(benches);
