use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bw_core::{CosmeticMap, MatchTrie, Matcher, Request, Rule, RuleSet};

fn build_rule_set(count: usize) -> RuleSet {
    let mut trie = MatchTrie::new();
    for i in 0..count {
        trie.insert(Rule {
            needs_domain_check: true,
            ..Rule::new(format!("ads{i}.tracker{}.com", i % 97))
        });
        trie.insert(Rule::new(format!("/banner{i}/")));
    }
    RuleSet::new(trie, CosmeticMap::new(), CosmeticMap::new(), String::new())
}

fn bench_is_blocked(c: &mut Criterion) {
    let rules = build_rule_set(20_000);
    let matcher = Matcher::new(&rules);

    let miss = Request::new("https://www.example.com/assets/app/main.bundle.js?v=1234567890");
    let hit = Request::new("https://ads42.tracker42.com/pixel.gif");

    c.bench_function("is_blocked/miss", |b| {
        b.iter(|| matcher.is_blocked(black_box(&miss), "https://www.example.com/"))
    });
    c.bench_function("is_blocked/hit", |b| {
        b.iter(|| matcher.is_blocked(black_box(&hit), "https://www.example.com/"))
    });
}

criterion_group!(benches, bench_is_blocked);
criterion_main!(benches);
