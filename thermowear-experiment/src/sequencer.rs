//! Builds the ordered trial list a participant receives.
//!
//! Every external-condition block starts with the counterbalance trial; the
//! rest of the block is the repeated template in random order.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use thermowear_core::Trial;
use tracing::debug;

use crate::config::ExperimentConfig;
use crate::error::SequencingError;

/// Builds the full trial sequence.
///
/// `first_option` picks the external-condition option whose block comes
/// first; the other options follow in the order the experiment file lists
/// them. It is ignored when no external condition is configured, and `None`
/// selects the first listed option. `counterbalance` indexes the repeated
/// template of each block.
pub fn build_trials<R: Rng + ?Sized>(
    config: &ExperimentConfig,
    first_option: Option<&str>,
    counterbalance: usize,
    rng: &mut R,
) -> Result<Vec<Trial>, SequencingError> {
    let blocks = block_order(config, first_option)?;
    let repetitions = config.repetitions();
    let mut trials = Vec::with_capacity(blocks.len() * repetitions * config.trials.len());

    for label in &blocks {
        let template = template_trials(config, label, rng)?;

        let mut working = Vec::with_capacity(template.len() * repetitions);
        for _ in 0..repetitions {
            working.extend(template.iter().cloned());
        }

        if counterbalance >= working.len() {
            return Err(SequencingError::CounterbalanceOutOfRange {
                index: counterbalance,
                len: working.len(),
            });
        }
        let counterbalance_trial = working.remove(counterbalance);
        working.shuffle(rng);

        debug!(
            block = %label,
            trials = working.len() + 1,
            "built condition block"
        );
        trials.push(counterbalance_trial);
        trials.append(&mut working);
    }

    Ok(trials)
}

/// External-condition labels in block order. A single empty label when none
/// is configured.
fn block_order(
    config: &ExperimentConfig,
    first_option: Option<&str>,
) -> Result<Vec<String>, SequencingError> {
    let Some(external) = &config.external_condition else {
        return Ok(vec![String::new()]);
    };

    let first_index = match first_option {
        None => 0,
        Some(option) => external
            .options
            .iter()
            .position(|candidate| candidate == option)
            .ok_or_else(|| SequencingError::UnknownExternalCondition {
                label: external.label.clone(),
                option: option.to_string(),
            })?,
    };

    let mut order = Vec::with_capacity(external.options.len());
    order.push(external.options[first_index].clone());
    order.extend(
        external
            .options
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != first_index)
            .map(|(_, option)| option.clone()),
    );
    Ok(order)
}

/// One pass over the trial definitions in file order. Audio pools are
/// reshuffled for every pass and drawn from without replacement.
fn template_trials<R: Rng + ?Sized>(
    config: &ExperimentConfig,
    label: &str,
    rng: &mut R,
) -> Result<Vec<Trial>, SequencingError> {
    let mut pools: BTreeMap<&str, Vec<&str>> = config
        .audio_files
        .iter()
        .map(|(tag, files)| {
            let mut files: Vec<&str> = files.iter().map(String::as_str).collect();
            files.shuffle(rng);
            (tag.as_str(), files)
        })
        .collect();

    config
        .trials
        .iter()
        .map(|definition| -> Result<Trial, SequencingError> {
            let audio_file = match (&definition.audio_file, &definition.audio_type) {
                (Some(file), _) => Some(file.clone()),
                (None, Some(tag)) => {
                    let drawn = pools.get_mut(tag.as_str()).and_then(Vec::pop);
                    let file = drawn.ok_or_else(|| SequencingError::AudioPoolExhausted {
                        tag: tag.clone(),
                    })?;
                    Some(file.to_string())
                }
                (None, None) => None,
            };

            Ok(Trial::new(
                audio_file,
                definition.condition.clone(),
                definition.intensity,
                label,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExternalCondition, TrialDefinition};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;
    use thermowear_core::Condition;

    fn config(definitions: Vec<TrialDefinition>, repetitions: i64) -> ExperimentConfig {
        ExperimentConfig {
            trials: definitions,
            repetitions,
            ..Default::default()
        }
    }

    fn fabric(config: ExperimentConfig) -> ExperimentConfig {
        ExperimentConfig {
            external_condition: Some(ExternalCondition {
                label: "Fabric".into(),
                options: vec!["on".into(), "off".into()],
            }),
            ..config
        }
    }

    fn counts(trials: &[Trial]) -> HashMap<&Trial, usize> {
        let mut counts = HashMap::new();
        for trial in trials {
            *counts.entry(trial).or_insert(0) += 1;
        }
        counts
    }

    fn cool_warm() -> Vec<TrialDefinition> {
        vec![
            TrialDefinition::new(Condition::Cool, 3),
            TrialDefinition::new(Condition::Warm, 5),
        ]
    }

    #[test]
    fn counterbalance_trial_leads_shuffled_repetitions() {
        let config = config(cool_warm(), 2);
        let cool = Trial::new(None, Condition::Cool, 3, "");
        let warm = Trial::new(None, Condition::Warm, 5, "");

        for seed in 0..50 {
            let trials = build_trials(&config, None, 1, &mut StdRng::seed_from_u64(seed)).unwrap();
            assert_eq!(trials.len(), 4);
            assert_eq!(trials[0], warm);
            assert_eq!(
                counts(&trials[1..]),
                counts(&[cool.clone(), cool.clone(), warm.clone()])
            );
        }
    }

    #[test]
    fn length_covers_repetitions_and_blocks() {
        let definitions = vec![
            TrialDefinition::new(Condition::Cool, 1),
            TrialDefinition::new(Condition::Warm, 2),
            TrialDefinition::new(Condition::Baseline, 0),
        ];
        let mut rng = StdRng::seed_from_u64(7);

        let single = build_trials(&config(definitions.clone(), 3), None, 0, &mut rng).unwrap();
        assert_eq!(single.len(), 9);

        let blocked = build_trials(&fabric(config(definitions, 3)), None, 0, &mut rng).unwrap();
        assert_eq!(blocked.len(), 18);
    }

    #[test]
    fn every_block_starts_with_its_counterbalance_trial() {
        let config = fabric(config(cool_warm(), 3));
        let trials = build_trials(&config, Some("off"), 1, &mut StdRng::seed_from_u64(3)).unwrap();
        let (first_block, second_block) = trials.split_at(6);

        assert_eq!(first_block[0], Trial::new(None, Condition::Warm, 5, "off"));
        assert_eq!(second_block[0], Trial::new(None, Condition::Warm, 5, "on"));
        assert!(first_block.iter().all(|t| t.external_condition == "off"));
        assert!(second_block.iter().all(|t| t.external_condition == "on"));

        let cool = Trial::new(None, Condition::Cool, 3, "on");
        let warm = Trial::new(None, Condition::Warm, 5, "on");
        assert_eq!(
            counts(&second_block[1..]),
            counts(&[cool.clone(), cool.clone(), cool, warm.clone(), warm])
        );
    }

    #[test]
    fn without_first_option_blocks_follow_file_order() {
        let config = fabric(config(cool_warm(), 1));
        let trials = build_trials(&config, None, 0, &mut StdRng::seed_from_u64(1)).unwrap();
        let labels: Vec<&str> = trials.iter().map(|t| t.external_condition.as_str()).collect();
        assert_eq!(labels, vec!["on", "on", "off", "off"]);
    }

    #[test]
    fn first_option_is_ignored_without_external_condition() {
        let trials = build_trials(
            &config(cool_warm(), 1),
            Some("on"),
            0,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap();
        assert!(trials.iter().all(|t| t.external_condition.is_empty()));
    }

    #[test]
    fn unknown_first_option_is_rejected() {
        let config = fabric(config(cool_warm(), 1));
        let err = build_trials(&config, Some("sleeve"), 0, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(
            err,
            SequencingError::UnknownExternalCondition {
                label: "Fabric".into(),
                option: "sleeve".into(),
            }
        );
    }

    #[test]
    fn counterbalance_out_of_range_fails() {
        let err = build_trials(&config(cool_warm(), 2), None, 4, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, SequencingError::CounterbalanceOutOfRange { index: 4, len: 4 });

        let err = build_trials(&config(Vec::new(), 1), None, 0, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, SequencingError::CounterbalanceOutOfRange { index: 0, len: 0 });
    }

    #[test]
    fn same_seed_same_sequence() {
        let config = config(
            (1..=6).map(|i| TrialDefinition::new(Condition::Warm, i)).collect(),
            2,
        );
        let a = build_trials(&config, None, 0, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = build_trials(&config, None, 0, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    fn audio_config() -> ExperimentConfig {
        let mut tagged = TrialDefinition::new(Condition::Warm, 2);
        tagged.audio_type = Some("positive".into());
        let mut explicit = TrialDefinition::new(Condition::Cool, 2);
        explicit.audio_file = Some("fixed.mp3".into());
        explicit.audio_type = Some("positive".into());

        let mut config = config(vec![tagged.clone(), tagged, explicit], 1);
        config.audio_files.insert(
            "positive".into(),
            vec!["a.mp3".into(), "b.mp3".into(), "c.mp3".into()],
        );
        config
    }

    #[test]
    fn audio_pools_draw_without_replacement() {
        let config = audio_config();
        let trials = build_trials(&config, None, 2, &mut StdRng::seed_from_u64(9)).unwrap();

        // Counterbalance trial is the explicit file; the two tagged ones differ.
        assert_eq!(trials[0].audio_file.as_deref(), Some("fixed.mp3"));
        let drawn: Vec<&str> = trials[1..]
            .iter()
            .map(|t| t.audio_file.as_deref().unwrap())
            .collect();
        assert_eq!(drawn.len(), 2);
        assert_ne!(drawn[0], drawn[1]);
        assert!(drawn.iter().all(|file| ["a.mp3", "b.mp3", "c.mp3"].contains(file)));
    }

    #[test]
    fn audio_pools_refill_for_each_block() {
        let mut config = fabric(audio_config());
        config.audio_files.insert("positive".into(), vec!["a.mp3".into(), "b.mp3".into()]);

        let trials = build_trials(&config, None, 0, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(trials.len(), 6);
        assert!(trials.iter().all(|t| t.has_audio()));
    }

    #[test]
    fn exhausted_pool_fails() {
        let mut config = audio_config();
        config.audio_files.insert("positive".into(), vec!["a.mp3".into()]);

        let err = build_trials(&config, None, 0, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, SequencingError::AudioPoolExhausted { tag: "positive".into() });
    }

    #[test]
    fn unknown_pool_counts_as_exhausted() {
        let mut definition = TrialDefinition::new(Condition::Warm, 1);
        definition.audio_type = Some("neutral".into());
        let err = build_trials(&config(vec![definition], 1), None, 0, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, SequencingError::AudioPoolExhausted { tag: "neutral".into() });
    }
}
