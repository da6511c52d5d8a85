//! RouterCore's 24-dimensional state assembly (`spec.md` §4.2).

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};

use lingua_core::{LinguaError, ModuleSource, SessionSummary, UserId, UserState};
use lingua_data::{DataReader, WordRecord};
use lingua_tracer::KnowledgeTracer;

const DUE_WORD_CAP: f32 = 200.0;
const TOTAL_WORD_CAP: f32 = 2000.0;
const LOW_FLAG_CAP: f32 = 50.0;
const DAYS_SINCE_SESSION_CAP: f32 = 30.0;
const AVAILABLE_MINUTES_CAP: f32 = 60.0;
/// Window over which `session_completion_rate` is computed
/// (`spec.md` §4.2 dim `[23]`).
const COMPLETION_WINDOW: usize = 10;

/// Everything state assembly derived about a user, kept alongside the
/// packed [`UserState`] so cold-start rule evaluation and action
/// enrichment can reuse it without re-fetching (`spec.md` §4.2, §4.3).
pub struct StateContext {
    pub state: UserState,
    pub words: Vec<WordRecord>,
    pub low_production_word_ids: Vec<lingua_core::WordId>,
    pub has_low_pronunciation_words: bool,
    pub weakest_concept_tag: Option<String>,
    pub user_event_count: u64,
}

/// Sessions for `user_id`, newest-first by `started_at`.
async fn recent_sessions(
    data: &dyn DataReader,
    user_id: UserId,
) -> Result<Vec<SessionSummary>, LinguaError> {
    let mut sessions = data.list_user_sessions(user_id).await?;
    sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(sessions)
}

/// The last `n` modules used, newest-first, as consumed by state
/// assembly dim `[6..8]` and RewardAttribution's `monotony_penalty`.
pub fn last_n_modules(sessions: &[SessionSummary], n: usize) -> Vec<ModuleSource> {
    sessions.iter().take(n).map(|s| s.module_source).collect()
}

fn modules_norm(modules: &[ModuleSource]) -> [f32; 3] {
    let denom = (ModuleSource::count() - 1) as f32;
    let mut norm = [0.5f32; 3];
    for (slot, module) in norm.iter_mut().zip(modules) {
        *slot = module.index() as f32 / denom;
    }
    norm
}

fn dkt_summary(recalls: &mut [f32]) -> [f32; 6] {
    if recalls.is_empty() {
        return [0.5; 6];
    }
    recalls.sort_by(|a, b| a.partial_cmp(b).expect("recall is never NaN"));
    let n = recalls.len();
    let mean = recalls.iter().sum::<f32>() / n as f32;
    let variance = recalls.iter().map(|&r| (r - mean).powi(2)).sum::<f32>() / n as f32;
    let std = variance.sqrt();
    let percentile = |p: f32| -> f32 {
        let rank = p * (n - 1) as f32;
        let lo = rank.floor() as usize;
        let hi = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lo as f32;
        recalls[lo] + (recalls[hi] - recalls[lo]) * frac
    };
    [mean, std, recalls[0], recalls[n - 1], percentile(0.25), percentile(0.75)]
}

fn weakest_concept(
    concept_mastery: &std::collections::HashMap<String, f32>,
) -> (f32, Option<String>) {
    concept_mastery
        .iter()
        .min_by(|a, b| a.1.partial_cmp(b.1).expect("mastery is never NaN"))
        .map(|(tag, &mastery)| (mastery, Some(tag.clone())))
        .unwrap_or((1.0, None))
}

fn time_cyclical(now: DateTime<Utc>) -> [f32; 4] {
    use std::f32::consts::TAU;
    let hour = now.hour() as f32;
    let weekday = now.weekday().num_days_from_monday() as f32;
    [
        (TAU * hour / 24.0).sin(),
        (TAU * hour / 24.0).cos(),
        (TAU * weekday / 7.0).sin(),
        (TAU * weekday / 7.0).cos(),
    ]
}

fn completion_rate(sessions: &[SessionSummary]) -> f32 {
    let window: Vec<&SessionSummary> = sessions.iter().take(COMPLETION_WINDOW).collect();
    if window.is_empty() {
        return 1.0;
    }
    let completed = window.iter().filter(|s| s.completed_flag).count();
    completed as f32 / window.len() as f32
}

/// Reads the sources named in `spec.md` §4.2 and packs them into a
/// [`UserState`], alongside the derived [`StateContext`] needed by
/// cold-start evaluation and action enrichment.
pub async fn assemble(
    data: &dyn DataReader,
    tracer: Option<&Arc<KnowledgeTracer>>,
    user_id: UserId,
    estimated_available_minutes: f32,
    now: DateTime<Utc>,
) -> Result<StateContext, LinguaError> {
    let words = data.list_words(user_id).await?;
    let sessions = recent_sessions(data, user_id).await?;
    let user_event_count = data.list_user_events(user_id).await?.len() as u64;

    let (dkt, concept_mastery) = match tracer {
        Some(tracer) => {
            let knowledge = tracer.knowledge_state(user_id).await?;
            if knowledge.using_fallback {
                ([0.5; 6], std::collections::HashMap::new())
            } else {
                let mut recalls: Vec<f32> = knowledge.word_states.iter().map(|w| w.p_recall).collect();
                (dkt_summary(&mut recalls), knowledge.concept_mastery)
            }
        }
        None => ([0.5; 6], std::collections::HashMap::new()),
    };

    let (weakest_concept_mastery, weakest_concept_tag) = weakest_concept(&concept_mastery);

    let avg_production_score = if words.is_empty() {
        0.5
    } else {
        words.iter().map(|w| w.production_score).sum::<f32>() / words.len() as f32 / 100.0
    };
    let avg_pronunciation_score = if words.is_empty() {
        0.5
    } else {
        words.iter().map(|w| w.pronunciation_score).sum::<f32>() / words.len() as f32 / 100.0
    };

    let due_word_count = words
        .iter()
        .filter(|w| matches!(w.status, lingua_core::WordStatus::Due | lingua_core::WordStatus::New))
        .count();
    let low_production_word_ids: Vec<lingua_core::WordId> =
        words.iter().filter(|w| w.is_low_production()).map(|w| w.word_id).collect();
    let has_low_pronunciation_words = words.iter().any(|w| w.is_low_pronunciation());

    let cognitive_load_last_session =
        sessions.iter().find_map(|s| s.estimated_cognitive_load).unwrap_or(0.5);

    let days_since_last_session_norm = match sessions.first() {
        Some(s) => ((now - s.started_at).num_days() as f32 / DAYS_SINCE_SESSION_CAP).clamp(0.0, 1.0),
        None => 1.0,
    };

    let recent_modules = last_n_modules(&sessions, 3);

    let state = UserState {
        dkt_summary: dkt,
        last_modules_norm: modules_norm(&recent_modules),
        avg_production_score: avg_production_score.clamp(0.0, 1.0),
        avg_pronunciation_score: avg_pronunciation_score.clamp(0.0, 1.0),
        weakest_concept_mastery,
        cognitive_load_last_session,
        available_minutes_norm: (estimated_available_minutes / AVAILABLE_MINUTES_CAP).clamp(0.0, 1.0),
        days_since_last_session_norm,
        due_word_count_norm: (due_word_count as f32 / DUE_WORD_CAP).clamp(0.0, 1.0),
        total_word_count_norm: (words.len() as f32 / TOTAL_WORD_CAP).clamp(0.0, 1.0),
        low_production_count_norm: (low_production_word_ids.len() as f32 / LOW_FLAG_CAP).clamp(0.0, 1.0),
        low_pronunciation_count_norm: (words.iter().filter(|w| w.is_low_pronunciation()).count() as f32
            / LOW_FLAG_CAP)
            .clamp(0.0, 1.0),
        time_cyclical: time_cyclical(now),
        session_completion_rate: completion_rate(&sessions),
    };

    Ok(StateContext {
        state,
        words,
        low_production_word_ids,
        has_low_pronunciation_words,
        weakest_concept_tag,
        user_event_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::{UserId, WordId, WordStatus};
    use lingua_data::MockDataStore;
    use std::sync::Arc;

    fn word(user_id: UserId, production: f32, pronunciation: f32) -> WordRecord {
        WordRecord {
            word_id: WordId::new(),
            user_id,
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

    #[tokio::test]
    async fn assemble_defaults_to_neutral_scores_with_no_words() {
        let store = Arc::new(MockDataStore::new());
        let user_id = UserId::new();
        let ctx = assemble(&*store, None, user_id, 30.0, Utc::now()).await.unwrap();
        assert_eq!(ctx.state.avg_production_score, 0.5);
        assert_eq!(ctx.state.weakest_concept_mastery, 1.0);
        assert_eq!(ctx.state.dkt_summary, [0.5; 6]);
    }

    #[tokio::test]
    async fn assemble_flags_low_production_words() {
        let store = Arc::new(MockDataStore::new());
        let user_id = UserId::new();
        store.seed_words(user_id, vec![word(user_id, 10.0, 90.0), word(user_id, 90.0, 90.0)]);
        let ctx = assemble(&*store, None, user_id, 30.0, Utc::now()).await.unwrap();
        assert_eq!(ctx.low_production_word_ids.len(), 1);
        assert!(!ctx.has_low_pronunciation_words);
    }

    #[test]
    fn modules_norm_defaults_missing_slots_to_neutral() {
        let norm = modules_norm(&[ModuleSource::StoryEngine]);
        assert_eq!(norm[0], 0.0);
        assert_eq!(norm[1], 0.5);
        assert_eq!(norm[2], 0.5);
    }

    #[test]
    fn completion_rate_is_one_with_no_sessions() {
        assert_eq!(completion_rate(&[]), 1.0);
    }
}
