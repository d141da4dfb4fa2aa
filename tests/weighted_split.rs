//! Statistical properties of weighted traffic splitting

mod common;

use common::*;
use inference_router::registry::{Criticality, ModelRegistry};

#[test]
fn even_split_lands_near_half() {
    let registry = ModelRegistry::new();
    let model = inference_model(
        "split",
        "m",
        Criticality::Standard,
        vec![("m-v1", Some(50)), ("m-v2", Some(50))],
        0,
    );

    let draws = 10_000;
    let mut v1 = 0usize;
    for _ in 0..draws {
        match registry.pick_target(&model).as_deref() {
            Some("m-v1") => v1 += 1,
            Some("m-v2") => {}
            other => panic!("unexpected target {:?}", other),
        }
    }

    let share = v1 as f64 / draws as f64;
    assert!(
        (0.48..=0.52).contains(&share),
        "m-v1 share was {} over {} draws",
        share,
        draws
    );
}

#[test]
fn equal_weights_are_uniform() {
    let registry = ModelRegistry::new();
    let targets = ["t0", "t1", "t2", "t3"];
    let model = inference_model(
        "uniform",
        "m",
        Criticality::Standard,
        targets.iter().map(|t| (*t, Some(1))).collect(),
        0,
    );

    let draws = 100_000;
    let mut counts = std::collections::HashMap::new();
    for _ in 0..draws {
        let target = registry.pick_target(&model).unwrap();
        *counts.entry(target).or_insert(0usize) += 1;
    }

    let expected = 1.0 / targets.len() as f64;
    for target in targets {
        let share = counts[target] as f64 / draws as f64;
        assert!(
            (share - expected).abs() < 0.02,
            "{} share was {} (expected ~{})",
            target,
            share,
            expected
        );
    }
}

#[test]
fn skewed_weights_respected() {
    let registry = ModelRegistry::new();
    let model = inference_model(
        "skewed",
        "m",
        Criticality::Standard,
        vec![("heavy", Some(90)), ("light", Some(10))],
        0,
    );

    let draws = 50_000;
    let mut heavy = 0usize;
    for _ in 0..draws {
        if registry.pick_target(&model).as_deref() == Some("heavy") {
            heavy += 1;
        }
    }

    let share = heavy as f64 / draws as f64;
    assert!(
        (share - 0.9).abs() < 0.02,
        "heavy share was {} over {} draws",
        share,
        draws
    );
}
