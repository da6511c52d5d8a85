//! Deterministic cold-start routing rules (`spec.md` §4.3).
//!
//! Used before a user has enough session history for the LinUCB bandit
//! to outperform a fixed heuristic.

use lingua_core::ModuleSource;

/// Inputs the cold-start cascade needs about one user, gathered by
/// RouterCore from KnowledgeTracer's fallback and recent session
/// history.
#[derive(Debug, Clone, Copy)]
pub struct ColdStartInputs<'a> {
    pub avg_production_score: f32,
    pub has_low_production_words: bool,
    pub avg_pronunciation_score: f32,
    pub has_low_pronunciation_words: bool,
    pub weakest_concept_score: f32,
    pub weakest_concept_tag: Option<&'a str>,
    pub cognitive_load_last_session: Option<f32>,
}

/// A cold-start recommendation: a module, a confidence, and the
/// human-readable reason that fired it (`spec.md` §4.3).
#[derive(Debug, Clone)]
pub struct ColdStartDecision {
    pub module: ModuleSource,
    pub concept_tag: Option<String>,
    pub confidence: f32,
    pub reason: String,
}

/// Evaluates the priority cascade top-down; first rule firing wins.
pub fn recommend(inputs: ColdStartInputs<'_>) -> ColdStartDecision {
    if inputs.avg_production_score < 0.4 || inputs.has_low_production_words {
        return ColdStartDecision {
            module: ModuleSource::ConjugationDrill,
            concept_tag: None,
            confidence: 0.7,
            reason: format!(
                "avg_production_score={:.2} below 0.4 or low-production words present",
                inputs.avg_production_score
            ),
        };
    }
    if inputs.avg_pronunciation_score < 0.3 || inputs.has_low_pronunciation_words {
        return ColdStartDecision {
            module: ModuleSource::PronunciationSession,
            concept_tag: None,
            confidence: 0.7,
            reason: format!(
                "avg_pronunciation_score={:.2} below 0.3 or low-pronunciation words present",
                inputs.avg_pronunciation_score
            ),
        };
    }
    if inputs.weakest_concept_score < 0.3 {
        if let Some(tag) = inputs.weakest_concept_tag {
            return ColdStartDecision {
                module: ModuleSource::GrammarLesson,
                concept_tag: Some(tag.to_string()),
                confidence: 0.65,
                reason: format!(
                    "weakest_concept_score={:.2} below 0.3 for concept '{tag}'",
                    inputs.weakest_concept_score
                ),
            };
        }
    }
    if let Some(load) = inputs.cognitive_load_last_session
        && load > 0.85
    {
        return ColdStartDecision {
            module: ModuleSource::Rest,
            concept_tag: None,
            confidence: 0.6,
            reason: format!("cognitive_load_last_session={load:.2} above 0.85"),
        };
    }
    ColdStartDecision {
        module: ModuleSource::StoryEngine,
        concept_tag: None,
        confidence: 0.5,
        reason: "no cold-start rule fired, defaulting to story_engine".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> ColdStartInputs<'static> {
        ColdStartInputs {
            avg_production_score: 0.9,
            has_low_production_words: false,
            avg_pronunciation_score: 0.9,
            has_low_pronunciation_words: false,
            weakest_concept_score: 0.9,
            weakest_concept_tag: None,
            cognitive_load_last_session: None,
        }
    }

    #[test]
    fn rule_1_fires_on_low_production_score() {
        let inputs = ColdStartInputs { avg_production_score: 0.3, ..base_inputs() };
        let decision = recommend(inputs);
        assert_eq!(decision.module, ModuleSource::ConjugationDrill);
        assert_eq!(decision.confidence, 0.7);
    }

    #[test]
    fn rule_2_fires_on_low_pronunciation_score() {
        let inputs = ColdStartInputs { avg_pronunciation_score: 0.2, ..base_inputs() };
        let decision = recommend(inputs);
        assert_eq!(decision.module, ModuleSource::PronunciationSession);
    }

    #[test]
    fn rule_3_fires_only_with_a_weakest_tag() {
        let inputs = ColdStartInputs {
            weakest_concept_score: 0.1,
            weakest_concept_tag: Some("subjunctive"),
            ..base_inputs()
        };
        let decision = recommend(inputs);
        assert_eq!(decision.module, ModuleSource::GrammarLesson);
        assert_eq!(decision.concept_tag.as_deref(), Some("subjunctive"));
    }

    #[test]
    fn rule_3_skipped_without_a_weakest_tag() {
        let inputs = ColdStartInputs { weakest_concept_score: 0.1, weakest_concept_tag: None, ..base_inputs() };
        let decision = recommend(inputs);
        assert_ne!(decision.module, ModuleSource::GrammarLesson);
    }

    #[test]
    fn rule_4_fires_on_high_last_session_load() {
        let inputs = ColdStartInputs { cognitive_load_last_session: Some(0.9), ..base_inputs() };
        let decision = recommend(inputs);
        assert_eq!(decision.module, ModuleSource::Rest);
    }

    #[test]
    fn default_rule_recommends_story_engine() {
        let decision = recommend(base_inputs());
        assert_eq!(decision.module, ModuleSource::StoryEngine);
        assert_eq!(decision.confidence, 0.5);
    }

    #[test]
    fn earlier_rule_takes_priority_over_later_ones() {
        let inputs = ColdStartInputs {
            avg_production_score: 0.1,
            cognitive_load_last_session: Some(0.95),
            ..base_inputs()
        };
        let decision = recommend(inputs);
        assert_eq!(decision.module, ModuleSource::ConjugationDrill);
    }
}
