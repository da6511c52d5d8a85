//! Action enrichment and the time-constraint override (`spec.md` §4.2).

use lingua_core::{ModuleSource, WordId};
use lingua_data::WordRecord;

/// Cap on `target_word_ids` for any single decision (`spec.md` §4.2).
pub const MAX_TARGET_WORDS: usize = 20;

/// Minutes below which `story_engine` is replaced by a quick drill
/// (`spec.md` §4.2 "Time-constraint override").
pub const TIME_CONSTRAINT_MINUTES: f32 = 5.0;

/// Outcome of enrichment: the (possibly overridden) module, its
/// targets, and whether the override fired.
pub struct Enriched {
    pub module: ModuleSource,
    pub target_word_ids: Vec<WordId>,
    pub target_concept: Option<String>,
    pub reason: String,
    pub time_constraint_applied: bool,
}

/// Applies the time-constraint override, then the per-action target
/// enrichment table, to a raw algorithm recommendation.
pub fn enrich(
    module: ModuleSource,
    base_reason: String,
    estimated_available_minutes: f32,
    words: &[WordRecord],
    weakest_concept_tag: Option<&str>,
) -> Enriched {
    let (module, reason, time_constraint_applied) =
        if module == ModuleSource::StoryEngine && estimated_available_minutes < TIME_CONSTRAINT_MINUTES {
            let has_low_production = words.iter().any(|w| w.is_low_production());
            let has_low_pronunciation = words.iter().any(|w| w.is_low_pronunciation());
            let replacement = if has_low_production {
                ModuleSource::AnkiDrill
            } else if has_low_pronunciation {
                ModuleSource::PronunciationSession
            } else {
                ModuleSource::Rest
            };
            let reason = format!(
                "time-constraint override: estimated_available_minutes={estimated_available_minutes:.1} below {TIME_CONSTRAINT_MINUTES}, replacing story_engine with a quick drill"
            );
            (replacement, reason, true)
        } else {
            (module, base_reason, false)
        };

    let (target_word_ids, target_concept) = match module {
        ModuleSource::AnkiDrill | ModuleSource::ConjugationDrill => {
            (top_low_production_words(words, MAX_TARGET_WORDS), None)
        }
        ModuleSource::PronunciationSession => (top_low_pronunciation_words(words, MAX_TARGET_WORDS), None),
        ModuleSource::GrammarLesson => (Vec::new(), weakest_concept_tag.map(str::to_string)),
        ModuleSource::StoryEngine | ModuleSource::Rest => (Vec::new(), None),
    };

    Enriched { module, target_word_ids, target_concept, reason, time_constraint_applied }
}

fn top_low_production_words(words: &[WordRecord], cap: usize) -> Vec<WordId> {
    let mut candidates: Vec<&WordRecord> = words.iter().filter(|w| w.is_low_production()).collect();
    candidates.sort_by(|a, b| a.production_score.partial_cmp(&b.production_score).expect("never NaN"));
    candidates.into_iter().take(cap).map(|w| w.word_id).collect()
}

fn top_low_pronunciation_words(words: &[WordRecord], cap: usize) -> Vec<WordId> {
    let mut candidates: Vec<&WordRecord> = words.iter().filter(|w| w.is_low_pronunciation()).collect();
    candidates.sort_by(|a, b| a.pronunciation_score.partial_cmp(&b.pronunciation_score).expect("never NaN"));
    candidates.into_iter().take(cap).map(|w| w.word_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::{UserId, WordStatus};

    fn word(production: f32, pronunciation: f32) -> WordRecord {
        WordRecord {
            word_id: WordId::new(),
            user_id: UserId::new(),
            lemma: "parler".to_string(),
            status: WordStatus::Due,
            ease_factor: 2.0,
            production_score: production,
            pronunciation_score: pronunciation,
            days_overdue: 1.0,
            topic_tags: vec![],
            last_story_mode_session_at: None,
            last_two_session_membership: [false, false],
        }
    }

    #[test]
    fn anki_drill_targets_low_production_words_ranked_ascending() {
        let words = vec![word(50.0, 90.0), word(10.0, 90.0), word(90.0, 90.0)];
        let enriched = enrich(ModuleSource::AnkiDrill, "reason".to_string(), 30.0, &words, None);
        assert_eq!(enriched.target_word_ids.len(), 2);
        assert_eq!(enriched.target_word_ids[0], words[1].word_id);
    }

    #[test]
    fn grammar_lesson_targets_the_weakest_concept() {
        let enriched = enrich(ModuleSource::GrammarLesson, "reason".to_string(), 30.0, &[], Some("subjunctive"));
        assert_eq!(enriched.target_concept.as_deref(), Some("subjunctive"));
        assert!(enriched.target_word_ids.is_empty());
    }

    #[test]
    fn story_engine_has_no_targets() {
        let enriched = enrich(ModuleSource::StoryEngine, "reason".to_string(), 30.0, &[], None);
        assert!(enriched.target_word_ids.is_empty());
        assert!(enriched.target_concept.is_none());
        assert!(!enriched.time_constraint_applied);
    }

    #[test]
    fn time_constraint_override_replaces_story_engine_when_low_production_words_exist() {
        let words = vec![word(10.0, 90.0)];
        let enriched = enrich(ModuleSource::StoryEngine, "reason".to_string(), 3.0, &words, None);
        assert_eq!(enriched.module, ModuleSource::AnkiDrill);
        assert!(enriched.time_constraint_applied);
    }

    #[test]
    fn time_constraint_override_falls_back_to_pronunciation_then_rest() {
        let with_low_pronunciation = vec![word(90.0, 10.0)];
        let enriched = enrich(ModuleSource::StoryEngine, "reason".to_string(), 3.0, &with_low_pronunciation, None);
        assert_eq!(enriched.module, ModuleSource::PronunciationSession);

        let enriched = enrich(ModuleSource::StoryEngine, "reason".to_string(), 3.0, &[], None);
        assert_eq!(enriched.module, ModuleSource::Rest);
    }

    #[test]
    fn time_constraint_override_does_not_fire_above_the_minute_threshold() {
        let enriched = enrich(ModuleSource::StoryEngine, "reason".to_string(), 10.0, &[], None);
        assert_eq!(enriched.module, ModuleSource::StoryEngine);
        assert!(!enriched.time_constraint_applied);
    }
}
