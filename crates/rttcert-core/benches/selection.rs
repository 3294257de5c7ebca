use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rttcert_core::bank::{BankInfo, QuestionBank};
use rttcert_core::distribution::{apportion, TierProfile};
use rttcert_core::model::{Category, CertificationTier, Difficulty, OptionLabel, Question, QuestionId};
use rttcert_core::selector::{select, ExclusionPolicy, SelectionRequest};

fn make_bank(per_cell: usize) -> QuestionBank {
    let mut questions = Vec::new();
    for category in Category::ALL {
        for difficulty in Difficulty::ALL {
            for n in 0..per_cell {
                questions.push(Question {
                    id: QuestionId::new(format!("{}-{difficulty}-{n:03}", category.slug())),
                    category,
                    difficulty,
                    topic: "bench".into(),
                    prompt: "Which RTT code applies?".into(),
                    options: vec!["10".into(), "30".into(), "33".into(), "98".into()],
                    correct: OptionLabel::from_index(1).unwrap(),
                    explanation: None,
                });
            }
        }
    }
    QuestionBank::from_questions(BankInfo::new("bench", "Bench Bank", 1), questions).unwrap()
}

fn bench_apportion(c: &mut Criterion) {
    let profile = TierProfile::default_for(CertificationTier::Practitioner);
    c.bench_function("apportion/6x4/100", |b| {
        b.iter(|| apportion(black_box(&Category::ALL), black_box(&profile), black_box(100)))
    });
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    let bank = make_bank(50);

    group.bench_function("practitioner/100", |b| {
        let request = SelectionRequest::new(CertificationTier::Practitioner, 100).with_seed(7);
        b.iter(|| select(black_box(&bank), black_box(&request)))
    });

    group.bench_function("expert/100/cohort", |b| {
        let request = SelectionRequest::new(CertificationTier::Expert, 100)
            .with_seed(7)
            .with_cohort_seed(2025);
        b.iter(|| select(black_box(&bank), black_box(&request)))
    });

    let excluded: Vec<QuestionId> = bank.questions().iter().step_by(2).map(|q| q.id.clone()).collect();
    group.bench_function("foundation/100/half-excluded-strict", |b| {
        let request = SelectionRequest::new(CertificationTier::Foundation, 100)
            .with_seed(7)
            .excluding(excluded.clone())
            .with_policy(ExclusionPolicy::Strict);
        b.iter(|| select(black_box(&bank), black_box(&request)))
    });

    group.finish();
}

criterion_group!(benches, bench_apportion, bench_select);
criterion_main!(benches);
